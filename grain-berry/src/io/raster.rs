//! 二维栅格图像 (tif, png) 的读写. 栅格图像不携带几何信息.

use std::path::Path;

use ndarray::{Array2, ArrayView2};

use crate::{BerryError, Geometry, Result, Sample, Volume};

/// 读取灰度图像为 `(h, w)` 数组. 彩色图像会被转为灰度.
pub fn read_slice<T: Sample, P: AsRef<Path>>(path: P) -> Result<Array2<T>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(BerryError::FileNotFound(path.to_owned()));
    }
    let (w, h, data) = T::from_raster(image::open(path)?);
    Ok(Array2::from_shape_vec((h as usize, w as usize), data)?)
}

/// 读取灰度图像为单层体数据, 几何信息取默认值.
#[inline]
pub fn read_raster<T: Sample, P: AsRef<Path>>(path: P) -> Result<Volume<T>> {
    Ok(Volume::from_plane(read_slice(path)?, Geometry::default()))
}

/// 按原样保存一张切片. 图像格式由扩展名决定.
pub fn write_slice<T: Sample, P: AsRef<Path>>(path: P, slice: ArrayView2<T>) -> Result<()> {
    let path = path.as_ref();
    let (height, width) = slice.dim();
    let data = slice.iter().copied().collect();
    let image = T::to_raster(width as u32, height as u32, data).ok_or_else(|| {
        BerryError::write_failed(path, BerryError::config("slice does not fit a raster image"))
    })?;
    image
        .save(path)
        .map_err(|e| BerryError::write_failed(path, e.into()))
}

/// 保存单层体数据. 多层数据返回 `Err(DimensionMismatch)`.
pub fn write_raster<T: Sample, P: AsRef<Path>>(path: P, volume: &Volume<T>) -> Result<()> {
    if !volume.is_planar() {
        return Err(BerryError::DimensionMismatch {
            expected: 2,
            actual: volume.dimension(),
        });
    }
    write_slice(path, volume.slice_at(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        let plane = Array2::from_shape_fn((3, 5), |(h, w)| (h * 5 + w) as u8 * 10);
        let v = Volume::from_plane(plane, Geometry::default());
        write_raster(&path, &v).unwrap();
        assert_eq!(read_raster::<u8, _>(&path).unwrap(), v);
    }

    #[test]
    fn test_tif_u16_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tif");
        let plane = Array2::from_shape_fn((4, 2), |(h, w)| (h * 1000 + w) as u16);
        write_slice(&path, plane.view()).unwrap();
        assert_eq!(read_slice::<u16, _>(&path).unwrap(), plane);

        let thick = Volume::<u8>::new((2, 2, 2), Geometry::default());
        assert!(matches!(
            write_raster(dir.path().join("b.png"), &thick),
            Err(BerryError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(matches!(
            read_slice::<u8, _>(dir.path().join("c.png")),
            Err(BerryError::FileNotFound(_))
        ));
    }
}
