//! 命令行参数解析器, 供 `#[arg(value_parser = ...)]` 使用.

use std::fmt;

use grain_berry::morph::Reconstruction;

/// 输出位深.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BitDepth {
    /// `u8`.
    Eight,

    /// `u16`.
    Sixteen,
}

impl BitDepth {
    /// 位数.
    #[inline]
    pub fn bits(&self) -> u32 {
        match self {
            Self::Eight => 8,
            Self::Sixteen => 16,
        }
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// 数据维度.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Dimension {
    /// 二维图像.
    Two,

    /// 三维体数据.
    Three,
}

impl Dimension {
    /// 维数.
    #[inline]
    pub fn get(&self) -> usize {
        match self {
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}

/// 解析 `8` 或 `16`.
pub fn bit_depth(s: &str) -> Result<BitDepth, String> {
    match s.trim() {
        "8" => Ok(BitDepth::Eight),
        "16" => Ok(BitDepth::Sixteen),
        other => Err(format!("bit depth must be 8 or 16, got `{other}`")),
    }
}

/// 解析 `2` 或 `3`.
pub fn dimension(s: &str) -> Result<Dimension, String> {
    match s.trim() {
        "2" => Ok(Dimension::Two),
        "3" => Ok(Dimension::Three),
        other => Err(format!("dimension must be 2 or 3, got `{other}`")),
    }
}

/// 解析 `[0, 1]` 内的比例.
pub fn unit_interval(s: &str) -> Result<f64, String> {
    let v: f64 = s.trim().parse().map_err(|e| format!("`{s}`: {e}"))?;
    if (0.0..=1.0).contains(&v) {
        Ok(v)
    } else {
        Err(format!("value must lie in [0, 1], got {v}"))
    }
}

/// 解析正整数倍数.
pub fn positive_factor(s: &str) -> Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(0) => Err("factor must be at least 1".to_owned()),
        Ok(v) => Ok(v),
        Err(e) => Err(format!("`{s}`: {e}")),
    }
}

/// 解析正实数.
pub fn positive_f64(s: &str) -> Result<f64, String> {
    let v: f64 = s.trim().parse().map_err(|e| format!("`{s}`: {e}"))?;
    if v.is_finite() && v > 0.0 {
        Ok(v)
    } else {
        Err(format!("value must be positive, got {v}"))
    }
}

/// 解析 `hconvex`, `hminima` 或 `none`.
pub fn reconstruction(s: &str) -> Result<Reconstruction, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "hconvex" | "h-convex" => Ok(Reconstruction::HConvex),
        "hminima" | "h-minima" => Ok(Reconstruction::HMinima),
        "none" => Ok(Reconstruction::None),
        other => Err(format!(
            "reconstruction must be hconvex, hminima or none, got `{other}`"
        )),
    }
}

/// 解析 `alpha,beta`.
pub fn pair(s: &str) -> Result<(f64, f64), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `a,b`, got `{s}`"))?;
    let parse = |v: &str| v.trim().parse::<f64>().map_err(|e| format!("`{v}`: {e}"));
    Ok((parse(a)?, parse(b)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsers() {
        assert_eq!(bit_depth("16"), Ok(BitDepth::Sixteen));
        assert!(bit_depth("12").is_err());
        assert_eq!(dimension("2").map(|d| d.get()), Ok(2));
        assert!(dimension("4").is_err());
        assert_eq!(unit_interval("0.25"), Ok(0.25));
        assert!(unit_interval("1.5").is_err());
        assert!(unit_interval("abc").is_err());
        assert_eq!(positive_factor("4"), Ok(4));
        assert!(positive_factor("0").is_err());
        assert!(positive_f64("-1").is_err());
        assert_eq!(pair("10, 120"), Ok((10.0, 120.0)));
        assert_eq!(reconstruction("HMinima"), Ok(Reconstruction::HMinima));
        assert!(reconstruction("open").is_err());
    }
}
