//! 图像序列: 一张切片一个文件.

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use ndarray::{s, Array3, Axis};

use super::config::RuntimeConfig;
use super::raster;
use super::stream::StreamPlan;
use crate::{BerryError, Geometry, Idx3d, Result, Sample, Volume};

/// printf 风格的序号格式, 支持 `%d`, `%Nd`, `%0Nd` 与转义 `%%`, 且恰好包含一个序号.
#[derive(Clone, Debug, Eq, PartialEq)]
struct NumberFormat {
    prefix: String,
    suffix: String,
    width: usize,
    zero_pad: bool,
}

impl NumberFormat {
    fn parse(pattern: &str) -> Result<Self> {
        let invalid = |why: &str| BerryError::InvalidPattern(format!("`{pattern}`: {why}"));
        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut conversion: Option<(usize, bool)> = None;

        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            let out = if conversion.is_some() { &mut suffix } else { &mut prefix };
            if c != '%' {
                out.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                out.push('%');
                continue;
            }
            if conversion.is_some() {
                return Err(invalid("more than one conversion"));
            }
            let zero_pad = chars.peek() == Some(&'0');
            let mut digits = String::new();
            while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                digits.push(*d);
                chars.next();
            }
            if chars.next() != Some('d') {
                return Err(invalid("only %d, %Nd and %0Nd are supported"));
            }
            let width = if digits.is_empty() {
                0
            } else {
                digits.parse().map_err(|_| invalid("width is too large"))?
            };
            conversion = Some((width, zero_pad));
        }
        let (width, zero_pad) = conversion.ok_or_else(|| invalid("no %d conversion"))?;
        Ok(Self {
            prefix,
            suffix,
            width,
            zero_pad,
        })
    }

    fn format(&self, n: i64) -> String {
        let (prefix, suffix, width) = (&self.prefix, &self.suffix, self.width);
        if self.zero_pad {
            format!("{prefix}{n:0width$}{suffix}")
        } else {
            format!("{prefix}{n:width$}{suffix}")
        }
    }
}

/// 序列文件名生成器: `dir/pattern(i)`, `i` 从 `start` 按 `increment` 递进到 `end` (含).
#[derive(Clone, Debug)]
pub struct SeriesFileNames {
    dir: PathBuf,
    format: NumberFormat,
    start: i64,
    end: i64,
    increment: i64,
}

impl SeriesFileNames {
    /// 创建生成器.
    ///
    /// # 注意
    ///
    /// `pattern` 不合法或 `increment` 为 0 时返回 `Err(InvalidPattern)`.
    /// `increment` 方向与 `start -> end` 相反时不产生任何文件名.
    pub fn new<P: AsRef<Path>>(
        dir: P,
        pattern: &str,
        start: i64,
        end: i64,
        increment: i64,
    ) -> Result<Self> {
        if increment == 0 {
            return Err(BerryError::InvalidPattern(
                "series increment must not be 0".to_owned(),
            ));
        }
        Ok(Self {
            dir: dir.as_ref().to_owned(),
            format: NumberFormat::parse(pattern)?,
            start,
            end,
            increment,
        })
    }

    /// 序号个数.
    pub fn len(&self) -> usize {
        let distance = self.end - self.start;
        if distance != 0 && distance.signum() != self.increment.signum() {
            return 0;
        }
        (distance / self.increment) as usize + 1
    }

    /// 是否不产生文件名.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 第 `i` 个文件名.
    #[inline]
    pub fn get(&self, i: usize) -> PathBuf {
        self.dir
            .join(self.format.format(self.start + i as i64 * self.increment))
    }

    /// 按序号顺序迭代所有文件名.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = PathBuf> + '_ {
        (0..self.len()).map(|i| self.get(i))
    }

    /// 收集所有文件名.
    #[inline]
    pub fn file_names(&self) -> Vec<PathBuf> {
        self.iter().collect()
    }
}

/// 确保 `dir` 是可写入的目录: 不存在则创建 (含父目录), 存在但不是目录时返回 `Err(NotADirectory)`.
pub fn prepare_output_dir<P: AsRef<Path>>(dir: P) -> Result<()> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(BerryError::NotADirectory(dir.to_owned()));
        }
        return Ok(());
    }
    info!("creating directory {}", dir.display());
    fs::create_dir_all(dir).map_err(|e| BerryError::write_failed(dir, e.into()))
}

/// 切片加载器, 按给定顺序逐张读取.
pub struct SliceLoader<T> {
    paths_rev: Vec<PathBuf>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Sample> SliceLoader<T> {
    /// 从有序路径创建.
    pub fn new<I: IntoIterator<Item = PathBuf>>(paths: I) -> Self {
        let mut paths_rev: Vec<PathBuf> = paths.into_iter().collect();
        paths_rev.reverse();
        Self {
            paths_rev,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: Sample> Iterator for SliceLoader<T> {
    type Item = (PathBuf, Result<ndarray::Array2<T>>);

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths_rev.pop()?;
        let slice = raster::read_slice(&path);
        Some((path, slice))
    }
}

impl<T: Sample> ExactSizeIterator for SliceLoader<T> {
    #[inline]
    fn len(&self) -> usize {
        self.paths_rev.len()
    }
}

/// 按 z 轴分块读取有序的切片文件. 第 `i` 个文件成为第 `i` 层.
///
/// 分块方案由 [`StreamPlan::new`] 按 `config` 给出. 每读满一块就把
/// `(层范围, 形状为 (层数, h, w) 的数组)` 交给 `sink`, 同一时刻只持有一块.
/// 返回完整形状 `(depth, h, w)`.
///
/// # 注意
///
/// 1. 至少需要一个文件, 否则返回 `Err`.
/// 2. 所有切片形状必须与第一张一致, 否则返回 `Err(ShapeMismatch)`.
/// 3. `sink` 返回 `Err` 时立即停止.
pub fn read_series_chunks<T, F>(
    paths: &[PathBuf],
    config: &RuntimeConfig,
    mut sink: F,
) -> Result<Idx3d>
where
    T: Sample,
    F: FnMut(Range<usize>, Array3<T>) -> Result<()>,
{
    let mut loader = SliceLoader::<T>::new(paths.iter().cloned());
    let (_, first) = loader
        .next()
        .ok_or_else(|| BerryError::config("image series is empty"))?;
    let mut first = Some(first?);
    let (h, w) = first.as_ref().map_or((0, 0), |f| f.dim());
    let depth = paths.len();

    let bytes = (depth * h * w * std::mem::size_of::<T>()) as u64;
    let plan = StreamPlan::new(depth, bytes, config);
    for range in plan.ranges() {
        debug!("reading slices {range:?}");
        let mut chunk = Array3::<T>::default((range.len(), h, w));
        for (i, mut layer) in chunk.axis_iter_mut(Axis(0)).enumerate() {
            let slice = match first.take() {
                Some(slice) => slice,
                None => {
                    let (path, slice) = loader
                        .next()
                        .ok_or_else(|| BerryError::config("image series ended early"))?;
                    let slice = slice?;
                    if slice.dim() != (h, w) {
                        let (sh, sw) = slice.dim();
                        warn!(
                            "slice {} (z = {}) has shape {sh}x{sw}, expected {h}x{w}",
                            path.display(),
                            range.start + i
                        );
                        return Err(BerryError::ShapeMismatch {
                            expected: (1, h, w),
                            actual: (1, sh, sw),
                        });
                    }
                    slice
                }
            };
            layer.assign(&slice);
        }
        sink(range, chunk)?;
    }
    info!("read {depth} slices of {w}x{h} in {} division(s)", plan.divisions());
    Ok((depth, h, w))
}

/// 读取有序的切片文件, 拼成体数据. 第 `i` 个文件成为第 `i` 层.
///
/// 结果需要完整驻留内存. 只需逐块处理时用 [`read_series_chunks`].
///
/// # 注意
///
/// 1. 至少需要一个文件, 否则返回 `Err`.
/// 2. 所有切片形状必须一致, 否则返回 `Err(ShapeMismatch)`.
/// 3. 切片不带几何信息, 结果的几何信息取默认值.
pub fn read_series<T: Sample>(paths: &[PathBuf]) -> Result<Volume<T>> {
    let depth = paths.len();
    let mut data: Option<Array3<T>> = None;
    let shape = read_series_chunks(paths, RuntimeConfig::global(), |range, chunk| {
        let (_, h, w) = chunk.dim();
        data.get_or_insert_with(|| Array3::default((depth, h, w)))
            .slice_mut(s![range, .., ..])
            .assign(&chunk);
        Ok(())
    })?;
    let data = data.ok_or(BerryError::ShapeMismatch {
        expected: shape,
        actual: (0, 0, 0),
    })?;
    Ok(Volume::from_array(data, Geometry::default()))
}

/// 把体数据逐层写为切片文件. `names` 给出的文件名个数必须与层数一致.
///
/// 体数据已在内存中, 分块只决定日志与写盘的批次.
pub fn write_series<T: Sample>(volume: &Volume<T>, names: &SeriesFileNames) -> Result<()> {
    if names.len() != volume.len_z() {
        return Err(BerryError::config(format!(
            "{} file names for {} slices",
            names.len(),
            volume.len_z()
        )));
    }
    let bytes = (volume.len() * std::mem::size_of::<T>()) as u64;
    let plan = StreamPlan::with_global(volume.len_z(), bytes);
    for range in plan.ranges() {
        debug!("writing slices {range:?}");
        for z in range {
            raster::write_slice(names.get(z), volume.slice_at(z))?;
        }
    }
    info!("wrote {} slices to {}", volume.len_z(), names.dir.display());
    Ok(())
}

/// 读取体数据文件 `input`, 在 `dir` 下按 `pattern` 逐层写为切片文件, 序号从 `start` 开始.
///
/// 输入读取成功且文件名模式合法后才会创建 `dir`, 失败时不留下空目录.
pub fn export_series<T: Sample, P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    dir: Q,
    pattern: &str,
    start: i64,
) -> Result<SeriesFileNames> {
    let volume: Volume<T> = super::read_volume(input)?;
    let last = start + volume.len_z() as i64 - 1;
    let names = SeriesFileNames::new(dir.as_ref(), pattern, start, last, 1)?;
    prepare_output_dir(dir)?;
    write_series(&volume, &names)?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_format() {
        let f = NumberFormat::parse("%04d.tif").unwrap();
        assert_eq!(f.format(7), "0007.tif");
        assert_eq!(f.format(12345), "12345.tif");
        assert_eq!(NumberFormat::parse("s_%d.png").unwrap().format(3), "s_3.png");
        assert_eq!(NumberFormat::parse("%3d").unwrap().format(3), "  3");
        assert_eq!(NumberFormat::parse("100%%_%02d").unwrap().format(3), "100%_03");

        for bad in ["plain.tif", "%d_%d", "%s", "%04x"] {
            assert!(matches!(
                NumberFormat::parse(bad),
                Err(BerryError::InvalidPattern(_))
            ));
        }
    }

    #[test]
    fn test_series_file_names() {
        let names = SeriesFileNames::new("/data", "%04d.tif", 0, 3, 1).unwrap();
        assert_eq!(names.len(), 4);
        assert_eq!(names.get(0), PathBuf::from("/data/0000.tif"));
        assert_eq!(names.file_names().last().unwrap(), &PathBuf::from("/data/0003.tif"));

        let names = SeriesFileNames::new("d", "%d", 10, 1, -3).unwrap();
        let got: Vec<_> = names.iter().collect();
        assert_eq!(got, ["d/10", "d/7", "d/4", "d/1"].map(PathBuf::from));

        assert!(SeriesFileNames::new("d", "%d", 0, 5, -1).unwrap().is_empty());
        assert!(SeriesFileNames::new("d", "%d", 1, 0, 2).unwrap().is_empty());
        assert_eq!(SeriesFileNames::new("d", "%d", 0, 5, 2).unwrap().len(), 3);
        assert!(SeriesFileNames::new("d", "%d", 0, 5, 0).is_err());
    }

    #[test]
    fn test_prepare_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        prepare_output_dir(&nested).unwrap();
        assert!(nested.is_dir());
        prepare_output_dir(&nested).unwrap();

        let file = dir.path().join("f.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            prepare_output_dir(&file),
            Err(BerryError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_series_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let data = Array3::from_shape_fn((5, 3, 4), |(z, h, w)| (w + 10 * h + 100 * z) as u16);
        let v = Volume::from_array(data, Geometry::default());

        let names = SeriesFileNames::new(dir.path(), "%04d.tif", 0, 4, 1).unwrap();
        write_series(&v, &names).unwrap();
        assert!(dir.path().join("0004.tif").exists());

        let back: Volume<u16> = read_series(&names.file_names()).unwrap();
        assert_eq!(back, v);

        let short = SeriesFileNames::new(dir.path(), "%04d.tif", 0, 2, 1).unwrap();
        assert!(write_series(&v, &short).is_err());
        assert!(read_series::<u16>(&[]).is_err());
    }

    #[test]
    fn test_series_shape_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        raster::write_slice(&a, ndarray::Array2::<u8>::zeros((2, 2)).view()).unwrap();
        raster::write_slice(&b, ndarray::Array2::<u8>::zeros((3, 2)).view()).unwrap();
        assert!(matches!(
            read_series::<u8>(&[a, b]),
            Err(BerryError::ShapeMismatch { .. })
        ));
    }

    /// 每块的层范围与形状都按分块方案给出, 拼接后与原数据一致.
    #[test]
    fn test_read_series_chunks_follow_plan() {
        let dir = tempfile::tempdir().unwrap();
        let data = Array3::from_shape_fn((10, 2, 3), |(z, h, w)| (w + 3 * h + 6 * z) as u8);
        let names = SeriesFileNames::new(dir.path(), "%02d.png", 0, 9, 1).unwrap();
        write_series(&Volume::from_array(data.clone(), Geometry::default()), &names).unwrap();

        // 10 * 2 * 3 = 60 字节, 60 * 4 / 60 = 4 块.
        let config = RuntimeConfig {
            memory_bytes: 60,
            safety_coefficient: 4.0,
            max_divisions: 32,
        };
        let plan = StreamPlan::new(10, 60, &config);
        let mut seen = Vec::new();
        let shape = read_series_chunks::<u8, _>(&names.file_names(), &config, |range, chunk| {
            assert_eq!(chunk.dim(), (range.len(), 2, 3));
            assert_eq!(chunk, data.slice(s![range.clone(), .., ..]));
            seen.push(range);
            Ok(())
        })
        .unwrap();
        assert_eq!(shape, (10, 2, 3));
        assert_eq!(seen, plan.ranges().collect::<Vec<_>>());
        assert_eq!(seen, vec![0..3, 3..6, 6..8, 8..10]);
    }

    #[test]
    fn test_read_series_chunks_stops_on_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        let names = SeriesFileNames::new(dir.path(), "%d.png", 0, 3, 1).unwrap();
        let v = Volume::from_array(Array3::<u8>::zeros((4, 2, 2)), Geometry::default());
        write_series(&v, &names).unwrap();

        let config = RuntimeConfig {
            memory_bytes: 1,
            safety_coefficient: 1.0,
            max_divisions: 4,
        };
        let mut calls = 0;
        let out = read_series_chunks::<u8, _>(&names.file_names(), &config, |_, _| {
            calls += 1;
            Err(BerryError::config("stop"))
        });
        assert!(matches!(out, Err(BerryError::InvalidConfig(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_export_series_creates_dir_last() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("slices");

        let missing = dir.path().join("missing.nii.gz");
        assert!(matches!(
            export_series::<u8, _, _>(&missing, &out, "%03d.png", 0),
            Err(BerryError::FileNotFound(_))
        ));
        assert!(!out.exists());

        let input = dir.path().join("v.npz");
        let v = Volume::from_array(Array3::<u8>::from_elem((3, 2, 2), 9), Geometry::default());
        super::super::write_volume(&input, &v).unwrap();
        assert!(matches!(
            export_series::<u8, _, _>(&input, &out, "no-number.png", 0),
            Err(BerryError::InvalidPattern(_))
        ));
        assert!(!out.exists());

        let names = export_series::<u8, _, _>(&input, &out, "%03d.png", 5).unwrap();
        assert_eq!(names.len(), 3);
        assert!(out.join("005.png").exists());
        assert!(out.join("007.png").exists());
    }
}
