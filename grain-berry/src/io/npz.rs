//! npz 归档格式.
//!
//! 归档包含四个数组:
//!
//! 1. `data.npy`: 体素, 按 `(z, h, w)` 组织.
//! 2. `spacing.npy`, `origin.npy`: 长度为 3 的 `f64` 数组, 按 `(x, y, z)` 组织.
//! 3. `direction.npy`: `3 × 3` 的 `f64` 数组, 行优先.
//!
//! 单独的 `.npy` 文件只保存体素, 不带几何信息. 它可以按 z 轴分块逐块写入,
//! 见 [`NpyChunkWriter`].

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::ops::Range;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use nalgebra::Matrix3;
use ndarray::{arr1, Array1, Array2, Array3, Ix1, Ix2, Ix3, OwnedRepr};
use ndarray_npy::{write_zeroed_npy, NpzReader, NpzWriter, WritableElement, WriteNpyError};

use crate::Idx3d;

use crate::{BerryError, Geometry, Result, Sample, Volume};

const DATA: &str = "data.npy";
const SPACING: &str = "spacing.npy";
const ORIGIN: &str = "origin.npy";
const DIRECTION: &str = "direction.npy";

/// 读取 npz 归档.
///
/// 归档中的体素类型与 `T` 不同时, 依次尝试按 `u8`, `u16`, `f32` 读取并逐体素转换 (不重标度).
pub fn read_npz<T: Sample, P: AsRef<Path>>(path: P) -> Result<Volume<T>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(BerryError::FileNotFound(path.to_owned()));
    }
    let mut npz = NpzReader::new(File::open(path)?)?;

    let data = match npz.by_name::<OwnedRepr<T>, Ix3>(DATA) {
        Ok(data) => data,
        Err(first) => read_converted(&mut npz).ok_or(first)?,
    };

    let spacing: Array1<f64> = npz.by_name::<OwnedRepr<f64>, Ix1>(SPACING)?;
    let origin: Array1<f64> = npz.by_name::<OwnedRepr<f64>, Ix1>(ORIGIN)?;
    let direction: Array2<f64> = npz.by_name::<OwnedRepr<f64>, Ix2>(DIRECTION)?;
    if spacing.len() != 3 || origin.len() != 3 || direction.dim() != (3, 3) {
        return Err(BerryError::config(format!(
            "{} holds malformed geometry arrays",
            path.display()
        )));
    }
    let geometry = Geometry::new(
        [spacing[0], spacing[1], spacing[2]],
        [origin[0], origin[1], origin[2]],
        Matrix3::from_fn(|r, c| direction[(r, c)]),
    )?;
    Ok(Volume::from_array(data, geometry))
}

fn read_converted<T: Sample>(npz: &mut NpzReader<File>) -> Option<Array3<T>> {
    fn convert<S: Sample, T: Sample>(a: Array3<S>) -> Array3<T> {
        a.mapv(|v| T::from_f64(v.as_f64()))
    }

    if let Ok(a) = npz.by_name::<OwnedRepr<u8>, Ix3>(DATA) {
        return Some(convert(a));
    }
    if let Ok(a) = npz.by_name::<OwnedRepr<u16>, Ix3>(DATA) {
        return Some(convert(a));
    }
    npz.by_name::<OwnedRepr<f32>, Ix3>(DATA).ok().map(convert)
}

/// 写入 npz 归档.
pub fn write_npz<T: Sample, P: AsRef<Path>>(path: P, volume: &Volume<T>) -> Result<()> {
    let path = path.as_ref();
    let write = || -> Result<()> {
        let g = volume.geometry();
        let mut npz = NpzWriter::new(File::create(path)?);
        npz.add_array(DATA, &volume.data())?;
        npz.add_array(SPACING, &arr1(&g.spacing()))?;
        npz.add_array(ORIGIN, &arr1(&<[f64; 3]>::from(g.origin().coords)))?;
        let d = g.direction();
        npz.add_array(DIRECTION, &Array2::from_shape_fn((3, 3), |(r, c)| d[(r, c)]))?;
        npz.finish()?;
        Ok(())
    };
    write().map_err(|e| BerryError::write_failed(path, e))
}

/// 读取 `.npy` 文件. 几何信息取默认值.
pub fn read_npy<T: Sample, P: AsRef<Path>>(path: P) -> Result<Volume<T>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(BerryError::FileNotFound(path.to_owned()));
    }
    let data: Array3<T> = ndarray_npy::read_npy(path)?;
    Ok(Volume::from_array(data, Geometry::default()))
}

/// 写入 `.npy` 文件. 几何信息被丢弃.
pub fn write_npy<T: Sample, P: AsRef<Path>>(path: P, volume: &Volume<T>) -> Result<()> {
    let path = path.as_ref();
    if *volume.geometry() != Geometry::default() {
        warn!("{} keeps voxels only, geometry is dropped", path.display());
    }
    ndarray_npy::write_npy(path, &volume.data())
        .map_err(|e| BerryError::write_failed(path, e.into()))
}

/// 按 z 轴分块写入的 `.npy` 文件.
///
/// 创建时按完整形状写入文件头并把数据区填零 (文件系统支持时为稀疏文件),
/// 之后每块直接写到数据区中对应的位置. 内存中只需要保留当前块.
pub struct NpyChunkWriter<T> {
    file: File,
    path: PathBuf,
    shape: Idx3d,
    data_offset: u64,
    written: usize,
    _marker: PhantomData<T>,
}

impl<T: Sample> NpyChunkWriter<T> {
    /// 为形状 `shape` 的体数据创建 `path`, 已存在时覆盖.
    pub fn create<P: AsRef<Path>>(path: P, shape: Idx3d) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let create = || -> std::result::Result<(File, u64), WriteNpyError> {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)?;
            write_zeroed_npy::<T, _>(&file, shape)?;
            // 写完文件头后, 读写位置停在数据区起点.
            let data_offset = file.stream_position()?;
            Ok((file, data_offset))
        };
        let (file, data_offset) = create().map_err(|e| BerryError::write_failed(&path, e.into()))?;
        debug!("{}: data starts at byte {data_offset}", path.display());
        Ok(Self {
            file,
            path,
            shape,
            data_offset,
            written: 0,
            _marker: PhantomData,
        })
    }

    /// 完整形状.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.shape
    }

    /// 把 `chunk` 写为第 `z` 层.
    ///
    /// # 注意
    ///
    /// `chunk` 的形状必须是 `(z.len(), h, w)`, 且 `z` 不能越过总层数,
    /// 否则返回 `Err(ShapeMismatch)`.
    pub fn write_chunk(&mut self, z: Range<usize>, chunk: &Array3<T>) -> Result<()> {
        let (depth, h, w) = self.shape;
        let expected = (z.len(), h, w);
        if z.end > depth || chunk.dim() != expected {
            return Err(BerryError::ShapeMismatch {
                expected,
                actual: chunk.dim(),
            });
        }
        let offset = self.data_offset + (z.start * h * w * std::mem::size_of::<T>()) as u64;
        let write = |file: &mut File| -> std::result::Result<(), WriteNpyError> {
            file.seek(SeekFrom::Start(offset))?;
            let mut writer = BufWriter::new(file);
            let chunk = chunk.as_standard_layout();
            if let Some(slice) = chunk.as_slice() {
                T::write_slice(slice, &mut writer)?;
            }
            writer.flush()?;
            Ok(())
        };
        write(&mut self.file).map_err(|e| BerryError::write_failed(&self.path, e.into()))?;
        self.written += z.len();
        Ok(())
    }

    /// 结束写入. 已写入的层数少于总层数时, 剩余层保持为 0 并记录警告.
    pub fn finish(self) -> Result<()> {
        if self.written < self.shape.0 {
            warn!(
                "{}: only {} of {} slices written",
                self.path.display(),
                self.written,
                self.shape.0
            );
        }
        self.file
            .sync_all()
            .map_err(|e| BerryError::write_failed(&self.path, e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_npz_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.npz");
        let direction = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let geometry = Geometry::new([0.5, 0.75, 2.0], [1.0, -2.0, 3.5], direction).unwrap();
        let data = Array3::from_shape_fn((2, 3, 4), |(z, h, w)| (w + 10 * h + 100 * z) as u16);
        let v = Volume::from_array(data, geometry);

        write_npz(&path, &v).unwrap();
        let back: Volume<u16> = read_npz(&path).unwrap();
        assert_eq!(back, v);

        // 类型不同时逐体素转换.
        let as_f32: Volume<f32> = read_npz(&path).unwrap();
        assert_eq!(as_f32[(1, 2, 3)], 123.0);
        assert_eq!(as_f32.geometry(), v.geometry());
    }

    #[test]
    fn test_npz_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_npz::<u8, _>(dir.path().join("none.npz")),
            Err(BerryError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_npy_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.npy");
        let data = Array3::from_shape_fn((5, 3, 4), |(z, h, w)| (w + 10 * h + 100 * z) as u16);

        let mut writer = NpyChunkWriter::<u16>::create(&path, (5, 3, 4)).unwrap();
        // 乱序写入.
        for z in [3..5, 0..2, 2..3] {
            let chunk = data.slice(ndarray::s![z.clone(), .., ..]).to_owned();
            writer.write_chunk(z, &chunk).unwrap();
        }
        writer.finish().unwrap();

        let back: Volume<u16> = read_npy(&path).unwrap();
        assert_eq!(back.data(), data.view());
        assert_eq!(back.geometry(), &Geometry::default());
    }

    #[test]
    fn test_npy_chunk_shape() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = NpyChunkWriter::<u8>::create(dir.path().join("v.npy"), (4, 2, 2)).unwrap();
        assert!(matches!(
            writer.write_chunk(0..2, &Array3::zeros((2, 2, 3))),
            Err(BerryError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            writer.write_chunk(3..5, &Array3::zeros((2, 2, 2))),
            Err(BerryError::ShapeMismatch { .. })
        ));
        writer.write_chunk(1..2, &Array3::from_elem((1, 2, 2), 7)).unwrap();
        writer.finish().unwrap();

        // 未写入的层为 0.
        let back: Volume<u8> = read_npy(dir.path().join("v.npy")).unwrap();
        assert_eq!(back[(0, 0, 0)], 0);
        assert_eq!(back[(1, 1, 1)], 7);
    }
}
