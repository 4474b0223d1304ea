//! 逐体素的灰度映射.

use itertools::{Itertools, MinMaxResult};

use crate::consts::gray::{BACKGROUND, FOREGROUND};
use crate::{BerryError, IntensityWindow, Result, Sample, Volume};

/// 位深转换方式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RescaleMode {
    /// 输入类型的 `[0, PIXEL_MAX]` 线性映射到输出类型的 `[0, PIXEL_MAX]`.
    #[default]
    FullRange,

    /// 输入数据的实际 `[min, max]` 线性映射到输出类型的 `[0, PIXEL_MAX]`.
    MinMax,
}

/// 把数据的 `[min, max]` 线性拉伸到 `[out_min, out_max]`.
///
/// # 注意
///
/// 数据为常数时所有体素映射为 `out_min`.
pub fn rescale_intensity<T: Sample, U: Sample>(
    volume: &Volume<T>,
    out_min: f64,
    out_max: f64,
) -> Volume<U> {
    let (lo, hi) = match volume.data().iter().map(|v| v.as_f64()).minmax() {
        MinMaxResult::NoElements => (0.0, 0.0),
        MinMaxResult::OneElement(v) => (v, v),
        MinMaxResult::MinMax(lo, hi) => (lo, hi),
    };
    let scale = if hi > lo {
        (out_max - out_min) / (hi - lo)
    } else {
        0.0
    };
    let shift = out_min - lo * scale;
    volume.map(|v| U::from_f64(v.as_f64() * scale + shift))
}

/// 转换体素类型.
///
/// 例如 `u8` 到 `u16` 的 [`RescaleMode::FullRange`] 转换把 255 映射为 65535, 0 映射为 0.
pub fn convert_bit_depth<T: Sample, U: Sample>(volume: &Volume<T>, mode: RescaleMode) -> Volume<U> {
    match mode {
        RescaleMode::FullRange => {
            let (src, dst) = (IntensityWindow::full_range::<T>(), IntensityWindow::full_range::<U>());
            volume.map(|v| U::from_f64(src.map_to(v.as_f64(), &dst).unwrap_or(0.0)))
        }
        RescaleMode::MinMax => rescale_intensity(volume, 0.0, U::PIXEL_MAX),
    }
}

/// Sigmoid 灰度映射: `(out_max - out_min) / (1 + exp(-(v - beta) / alpha)) + out_min`.
///
/// `alpha` 为 0 或非有限值时返回 `Err`.
pub fn sigmoid<T: Sample>(
    volume: &Volume<T>,
    alpha: f64,
    beta: f64,
    out_min: f64,
    out_max: f64,
) -> Result<Volume<T>> {
    if !(alpha.is_finite() && alpha != 0.0) || !beta.is_finite() {
        return Err(BerryError::config(format!(
            "sigmoid needs a finite non-zero alpha and finite beta, got alpha={alpha}, beta={beta}"
        )));
    }
    let range = out_max - out_min;
    Ok(volume.map(|v| {
        let e = (-(v.as_f64() - beta) / alpha).exp();
        T::from_f64(range / (1.0 + e) + out_min)
    }))
}

/// 二值化: `lower <= v <= upper` 的体素为前景 `1`, 其余为背景 `0`.
pub fn binary_threshold<T: Sample>(volume: &Volume<T>, lower: f64, upper: f64) -> Volume<u8> {
    volume.map(|v| {
        let v = v.as_f64();
        if lower <= v && v <= upper {
            FOREGROUND
        } else {
            BACKGROUND
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Geometry;
    use ndarray::Array3;

    fn line<T: Sample>(values: &[T]) -> Volume<T> {
        let data = Array3::from_shape_vec((1, 1, values.len()), values.to_vec()).unwrap();
        Volume::from_array(data, Geometry::default())
    }

    #[test]
    fn test_convert_bit_depth_full_range() {
        let v = line(&[0u8, 1, 128, 255]);
        let w: Volume<u16> = convert_bit_depth(&v, RescaleMode::FullRange);
        assert_eq!(w.data().as_slice().unwrap(), &[0, 257, 32896, 65535]);

        let back: Volume<u8> = convert_bit_depth(&w, RescaleMode::FullRange);
        assert_eq!(back, v);
    }

    #[test]
    fn test_convert_bit_depth_min_max() {
        let v = line(&[10u16, 20, 30]);
        let w: Volume<u8> = convert_bit_depth(&v, RescaleMode::MinMax);
        assert_eq!(w.data().as_slice().unwrap(), &[0, 128, 255]);
    }

    #[test]
    fn test_rescale_constant() {
        let v = line(&[7u8, 7, 7]);
        let w: Volume<f32> = rescale_intensity(&v, 2.0, 5.0);
        assert!(w.data().iter().all(|x| *x == 2.0));
    }

    #[test]
    fn test_sigmoid() {
        let v = line(&[0u8, 100, 200]);
        let s = sigmoid(&v, 10.0, 100.0, 0.0, 255.0).unwrap();
        assert_eq!(s[(0, 0, 1)], 128);
        assert_eq!(s[(0, 0, 0)], 0);
        assert_eq!(s[(0, 0, 2)], 255);
        assert!(sigmoid(&v, 0.0, 100.0, 0.0, 255.0).is_err());
    }

    #[test]
    fn test_binary_threshold() {
        let v = line(&[0.1f32, 0.5, 0.9]);
        let b = binary_threshold(&v, 0.5, f64::INFINITY);
        assert_eq!(b.data().as_slice().unwrap(), &[0, 1, 1]);
    }
}
