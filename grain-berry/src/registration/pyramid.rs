//! 多分辨率金字塔.

use std::fmt;
use std::str::FromStr;

use log::debug;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::filter::{gaussian_smooth, shrink_uniform};
use crate::{BerryError, Result, Volume};

/// 金字塔的一层: 先以 `sigma` (物理单位) 高斯平滑, 再按 `shrink` 倍降采样.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PyramidLevel {
    /// 降采样倍数, 至少为 1.
    pub shrink: usize,

    /// 平滑标准差, 不大于 0 时不平滑.
    pub sigma: f64,
}

impl Default for PyramidLevel {
    /// 原分辨率, 不平滑.
    fn default() -> Self {
        Self {
            shrink: 1,
            sigma: 0.0,
        }
    }
}

impl PyramidLevel {
    /// 检查参数.
    pub fn validate(&self) -> Result<()> {
        if self.shrink == 0 {
            return Err(BerryError::config("pyramid shrink factor must be at least 1"));
        }
        if !self.sigma.is_finite() {
            return Err(BerryError::config(format!(
                "pyramid sigma must be finite, got {}",
                self.sigma
            )));
        }
        Ok(())
    }

    /// 是否为原分辨率且不平滑.
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.shrink == 1 && !(self.sigma > 0.0)
    }

    /// 得到该层使用的体数据.
    pub(crate) fn prepare(&self, volume: &Volume<f32>) -> Result<Volume<f32>> {
        if self.is_identity() {
            return Ok(volume.clone());
        }
        let smoothed = gaussian_smooth(volume, self.sigma);
        let out = shrink_uniform(&smoothed, self.shrink)?;
        debug!("pyramid level {self}: {:?} -> {:?}", volume.size(), out.size());
        Ok(out)
    }
}

impl fmt::Display for PyramidLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.sigma, self.shrink)
    }
}

/// 解析 `sigma:shrink`, 例如 `2.0:4`.
impl FromStr for PyramidLevel {
    type Err = BerryError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || BerryError::config(format!("expected `sigma:shrink`, got `{s}`"));
        let (sigma, shrink) = s.split_once(':').ok_or_else(invalid)?;
        let level = Self {
            shrink: shrink.trim().parse().map_err(|_| invalid())?,
            sigma: sigma.trim().parse().map_err(|_| invalid())?,
        };
        level.validate()?;
        Ok(level)
    }
}
