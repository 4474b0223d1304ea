//! 体素类型.

use std::fmt::Debug;
use std::path::Path;

use image::{DynamicImage, ImageBuffer, Luma};
use ndarray::{ArrayD, ArrayView3};
use nifti::writer::WriterOptions;
use nifti::{InMemNiftiVolume, IntoNdArray, NiftiHeader};

/// 体素类型. 目前支持 `u8`, `u16`, `f32`.
///
/// 除数值转换外, 该 trait 还承担各类型与 nifti / 栅格图像编解码之间的衔接,
/// 这样上层 I/O 代码可以对体素类型保持泛型.
pub trait Sample:
    Copy
    + Default
    + PartialOrd
    + Debug
    + Send
    + Sync
    + 'static
    + ndarray_npy::WritableElement
    + ndarray_npy::ReadableElement
{
    /// 像素名义最大值. 整型为其表示上限, `f32` 为 1.
    const PIXEL_MAX: f64;

    /// 位深.
    const BITS: u32;

    /// 是否为整型.
    const INTEGRAL: bool;

    /// 转换为 `f64`.
    fn as_f64(self) -> f64;

    /// 由 `f64` 转换. 整型会四舍五入并截断到表示范围, NaN 视为 0.
    fn from_f64(v: f64) -> Self;

    /// 把 `[0, 1]` 内的比例换算为灰度值 `frac * PIXEL_MAX`, 整型向下取整.
    #[inline]
    fn level(frac: f64) -> f64 {
        let v = frac * Self::PIXEL_MAX;
        if Self::INTEGRAL {
            v.floor()
        } else {
            v
        }
    }

    /// 从 nifti 体积读取数组, 轴顺序与文件一致 (`[x, y, z, ..]`).
    fn nifti_array(volume: InMemNiftiVolume) -> nifti::Result<ArrayD<Self>>;

    /// 按 `header` 给出的元信息写 nifti 文件. `data` 轴顺序为 `[x, y, z]`.
    fn write_nifti(path: &Path, header: &NiftiHeader, data: ArrayView3<Self>)
        -> nifti::Result<()>;

    /// 解码二维栅格图像, 返回 `(width, height, 行优先像素)`.
    fn from_raster(image: DynamicImage) -> (u32, u32, Vec<Self>);

    /// 编码二维栅格图像. `data` 长度与宽高不符时返回 `None`.
    fn to_raster(width: u32, height: u32, data: Vec<Self>) -> Option<DynamicImage>;
}

macro_rules! impl_integer_sample {
    ($($t: ty => $luma: ident, $variant: ident);+ $(;)?) => {
        $(
            impl Sample for $t {
                const PIXEL_MAX: f64 = <$t>::MAX as f64;
                const BITS: u32 = <$t>::BITS;
                const INTEGRAL: bool = true;

                #[inline]
                fn as_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn from_f64(v: f64) -> Self {
                    // `as` 会把 NaN 变成 0, 并饱和截断.
                    v.round() as $t
                }

                fn nifti_array(volume: InMemNiftiVolume) -> nifti::Result<ArrayD<Self>> {
                    volume.into_ndarray::<$t>()
                }

                fn write_nifti(
                    path: &Path,
                    header: &NiftiHeader,
                    data: ArrayView3<Self>,
                ) -> nifti::Result<()> {
                    WriterOptions::new(path).reference_header(header).write_nifti(&data)
                }

                fn from_raster(image: DynamicImage) -> (u32, u32, Vec<Self>) {
                    let buf = image.$luma();
                    let (w, h) = buf.dimensions();
                    (w, h, buf.into_raw())
                }

                fn to_raster(width: u32, height: u32, data: Vec<Self>) -> Option<DynamicImage> {
                    let buf = ImageBuffer::<Luma<$t>, Vec<$t>>::from_raw(width, height, data)?;
                    Some(DynamicImage::$variant(buf))
                }
            }
        )+
    };
}

impl_integer_sample! {
    u8 => into_luma8, ImageLuma8;
    u16 => into_luma16, ImageLuma16;
}

/// 栅格图像没有浮点灰度格式, 读写时经由 16 位整型中转, `[0, 1]` 对应 `[0, 65535]`.
impl Sample for f32 {
    const PIXEL_MAX: f64 = 1.0;
    const BITS: u32 = 32;
    const INTEGRAL: bool = false;

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }

    fn nifti_array(volume: InMemNiftiVolume) -> nifti::Result<ArrayD<Self>> {
        volume.into_ndarray::<f32>()
    }

    fn write_nifti(path: &Path, header: &NiftiHeader, data: ArrayView3<Self>) -> nifti::Result<()> {
        WriterOptions::new(path)
            .reference_header(header)
            .write_nifti(&data)
    }

    fn from_raster(image: DynamicImage) -> (u32, u32, Vec<Self>) {
        let buf = image.into_luma16();
        let (w, h) = buf.dimensions();
        (w, h, buf.into_raw().into_iter().map(|v| f32::from(v) / 65535.0).collect())
    }

    fn to_raster(width: u32, height: u32, data: Vec<Self>) -> Option<DynamicImage> {
        let data = data
            .into_iter()
            .map(|v| u16::from_f64(v as f64 * 65535.0))
            .collect();
        u16::to_raster(width, height, data)
    }
}

#[cfg(test)]
mod tests {
    use super::Sample;

    #[test]
    fn test_from_f64_saturates() {
        assert_eq!(u8::from_f64(300.0), 255);
        assert_eq!(u8::from_f64(-3.0), 0);
        assert_eq!(u8::from_f64(f64::NAN), 0);
        assert_eq!(u8::from_f64(127.5), 128);
        assert_eq!(u16::from_f64(65535.4), 65535);
        assert_eq!(f32::from_f64(0.25), 0.25);
    }

    #[test]
    fn test_pixel_max() {
        assert_eq!(u8::PIXEL_MAX, 255.0);
        assert_eq!(u16::PIXEL_MAX, 65535.0);
        assert_eq!(u8::BITS, 8);
        assert_eq!(u16::BITS, 16);
    }

    #[test]
    fn test_level() {
        assert_eq!(u8::level(0.5), 127.0);
        assert_eq!(u16::level(1.0), 65535.0);
        assert_eq!(f32::level(0.25), 0.25);
    }

    #[test]
    fn test_raster_round_trip_shape() {
        let img = u16::to_raster(3, 2, vec![0, 1, 2, 3, 4, 65535]).unwrap();
        let (w, h, data) = u16::from_raster(img);
        assert_eq!((w, h), (3, 2));
        assert_eq!(data, vec![0, 1, 2, 3, 4, 65535]);
        assert!(u8::to_raster(3, 2, vec![0; 5]).is_none());
    }
}
