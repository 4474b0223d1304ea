//! 文件读写.
//!
//! [`read_volume`] 和 [`write_volume`] 根据扩展名选择格式:
//!
//! | 扩展名 | 格式 | 几何信息 |
//! |---|---|---|
//! | `.nii`, `.nii.gz` | nifti | 保留 |
//! | `.npz` | npz 归档 | 保留 |
//! | `.npy` | npy 数组 | 丢弃 |
//! | `.tif`, `.tiff`, `.png` | 二维栅格图像 | 丢弃 |

use std::path::Path;

use log::info;

use crate::{BerryError, Result, Sample, Volume};

pub mod config;
mod nii;
mod npz;
mod point_set;
mod raster;
mod series;
mod stream;

pub use config::RuntimeConfig;
pub use nii::{read_nii, write_nii};
pub use npz::{read_npy, read_npz, write_npy, write_npz, NpyChunkWriter};
pub use point_set::PointSet;
pub use raster::{read_raster, read_slice, write_raster, write_slice};
pub use series::{
    export_series, prepare_output_dir, read_series, read_series_chunks, write_series,
    SeriesFileNames, SliceLoader,
};
pub use stream::StreamPlan;

/// 体数据文件格式.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VolumeFormat {
    /// `.nii`, `.nii.gz`.
    Nifti,

    /// `.npz`.
    Npz,

    /// `.npy`.
    Npy,

    /// `.tif`, `.tiff`, `.png`.
    Raster,
}

impl VolumeFormat {
    /// 根据扩展名 (不区分大小写) 判断格式. 无法识别时返回 `Err(UnsupportedFormat)`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.ends_with(".nii") || name.ends_with(".nii.gz") {
            Ok(Self::Nifti)
        } else if name.ends_with(".npz") {
            Ok(Self::Npz)
        } else if name.ends_with(".npy") {
            Ok(Self::Npy)
        } else if name.ends_with(".tif") || name.ends_with(".tiff") || name.ends_with(".png") {
            Ok(Self::Raster)
        } else {
            Err(BerryError::UnsupportedFormat(path.to_owned()))
        }
    }
}

/// 读取体数据.
///
/// # 注意
///
/// 1. 文件不存在时返回 `Err(FileNotFound)`.
/// 2. 扩展名无法识别时返回 `Err(UnsupportedFormat)`.
pub fn read_volume<T: Sample, P: AsRef<Path>>(path: P) -> Result<Volume<T>> {
    let path = path.as_ref();
    let format = VolumeFormat::from_path(path)?;
    if !path.exists() {
        return Err(BerryError::FileNotFound(path.to_owned()));
    }
    let volume = match format {
        VolumeFormat::Nifti => read_nii(path)?,
        VolumeFormat::Npz => read_npz(path)?,
        VolumeFormat::Npy => read_npy(path)?,
        VolumeFormat::Raster => read_raster(path)?,
    };
    info!("read {} with size {:?}", path.display(), volume.size());
    Ok(volume)
}

/// 写入体数据. 栅格图像只能保存单层数据.
pub fn write_volume<T: Sample, P: AsRef<Path>>(path: P, volume: &Volume<T>) -> Result<()> {
    let path = path.as_ref();
    match VolumeFormat::from_path(path)? {
        VolumeFormat::Nifti => write_nii(path, volume)?,
        VolumeFormat::Npz => write_npz(path, volume)?,
        VolumeFormat::Npy => write_npy(path, volume)?,
        VolumeFormat::Raster => write_raster(path, volume)?,
    }
    info!("wrote {} with size {:?}", path.display(), volume.size());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Geometry;
    use ndarray::Array3;

    #[test]
    fn test_format_from_path() {
        let f = |s: &str| VolumeFormat::from_path(Path::new(s));
        assert_eq!(f("a/b.nii").unwrap(), VolumeFormat::Nifti);
        assert_eq!(f("b.NII.GZ").unwrap(), VolumeFormat::Nifti);
        assert_eq!(f("b.npz").unwrap(), VolumeFormat::Npz);
        assert_eq!(f("b.Npy").unwrap(), VolumeFormat::Npy);
        assert_eq!(f("b.tiff").unwrap(), VolumeFormat::Raster);
        assert_eq!(f("b.png").unwrap(), VolumeFormat::Raster);
        assert!(matches!(f("b.mha"), Err(BerryError::UnsupportedFormat(_))));
        assert!(matches!(f("b.gz"), Err(BerryError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_read_write_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let data = Array3::from_shape_fn((2, 3, 4), |(z, h, w)| (w + h + z) as u8);
        let v = Volume::from_array(data, Geometry::with_spacing([0.5, 0.5, 1.0]).unwrap());

        for name in ["v.nii.gz", "v.npz"] {
            let path = dir.path().join(name);
            write_volume(&path, &v).unwrap();
            let back: Volume<u8> = read_volume(&path).unwrap();
            assert_eq!(back.data(), v.data());
            assert_eq!(back.geometry().spacing(), [0.5, 0.5, 1.0]);
        }

        assert!(write_volume(dir.path().join("v.png"), &v).is_err());
        assert!(matches!(
            read_volume::<u8, _>(dir.path().join("missing.nii")),
            Err(BerryError::FileNotFound(_))
        ));
        assert!(matches!(
            read_volume::<u8, _>(dir.path().join("v.mha")),
            Err(BerryError::UnsupportedFormat(_))
        ));
    }
}
