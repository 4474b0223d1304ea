//! 点集及其文本格式.
//!
//! 文本格式: 第一行为点数, 第二行为维度, 之后每行一个点, 坐标以空白分隔.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::{Point3, Vector3};

use crate::transform::Similarity3d;
use crate::{BerryError, Result};

/// 解析时按声明点数预分配的上限.
const MAX_PREALLOCATED_POINTS: usize = 4096;

/// 有序点集. 插入顺序即点的编号.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointSet<const D: usize> {
    points: Vec<[f64; D]>,
}

impl<const D: usize> From<Vec<[f64; D]>> for PointSet<D> {
    #[inline]
    fn from(points: Vec<[f64; D]>) -> Self {
        Self { points }
    }
}

impl<const D: usize> FromIterator<[f64; D]> for PointSet<D> {
    fn from_iter<I: IntoIterator<Item = [f64; D]>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl<const D: usize> PointSet<D> {
    /// 空点集.
    #[inline]
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// 追加一个点.
    #[inline]
    pub fn push(&mut self, point: [f64; D]) {
        self.points.push(point);
    }

    /// 点数.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 按编号迭代.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, [f64; D]> {
        self.points.iter()
    }

    /// 所有点.
    #[inline]
    pub fn as_slice(&self) -> &[[f64; D]] {
        &self.points
    }

    /// 算术平均. 空点集返回 `None`.
    pub fn centroid(&self) -> Option<[f64; D]> {
        if self.is_empty() {
            return None;
        }
        let mut acc = [0.0; D];
        for p in self.iter() {
            acc.iter_mut().zip(p).for_each(|(a, v)| *a += v);
        }
        let n = self.len() as f64;
        Some(acc.map(|a| a / n))
    }

    /// 从文本解析.
    ///
    /// # 注意
    ///
    /// 1. 声明的维度与 `D` 不一致时返回 `Err(DimensionMismatch)`.
    /// 2. 点数不足, 坐标个数不对或坐标无法解析时返回 `Err(MalformedPointSet)`.
    ///   多余的空行被忽略.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader
            .lines()
            .enumerate()
            .map(|(i, l)| l.map(|l| (i + 1, l)))
            .filter(|l| !matches!(l, Ok((_, s)) if s.trim().is_empty()));

        let mut header = |what: &str| -> Result<usize> {
            let (line, text) = lines
                .next()
                .transpose()?
                .ok_or_else(|| malformed(0, format!("missing {what}")))?;
            text.trim()
                .parse::<usize>()
                .map_err(|e| malformed(line, format!("invalid {what} `{}`: {e}", text.trim())))
        };
        let count = header("point count")?;
        let dimension = header("dimension")?;
        if dimension != D {
            return Err(BerryError::DimensionMismatch {
                expected: D,
                actual: dimension,
            });
        }

        // 声明的点数来自文件, 不可信, 预分配设上限.
        let mut points = Vec::with_capacity(count.min(MAX_PREALLOCATED_POINTS));
        for item in lines.take(count) {
            let (line, text) = item?;
            let mut point = [0.0; D];
            let mut fields = text.split_whitespace();
            for (a, slot) in point.iter_mut().enumerate() {
                let field = fields
                    .next()
                    .ok_or_else(|| malformed(line, format!("expected {D} coordinates, got {a}")))?;
                *slot = field
                    .parse()
                    .map_err(|e| malformed(line, format!("invalid coordinate `{field}`: {e}")))?;
            }
            if fields.next().is_some() {
                return Err(malformed(line, format!("more than {D} coordinates")));
            }
            points.push(point);
        }
        if points.len() != count {
            return Err(malformed(
                0,
                format!("declared {count} points, found {}", points.len()),
            ));
        }
        Ok(Self { points })
    }

    /// 读取点集文件.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BerryError::FileNotFound(path.to_owned()));
        }
        Self::parse(BufReader::new(File::open(path)?))
    }

    /// 写出文本格式. 坐标使用 Rust 的最短往返表示, 读回后与原值完全相同.
    pub fn write_to<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        writeln!(w, "{}", self.len())?;
        writeln!(w, "{D}")?;
        for p in self.iter() {
            let mut first = true;
            for v in p {
                if !first {
                    write!(w, " ")?;
                }
                write!(w, "{v:?}")?;
                first = false;
            }
            writeln!(w)?;
        }
        w.flush()
    }

    /// 写入点集文件. 空点集也会被写出.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        File::create(path)
            .and_then(|f| self.write_to(BufWriter::new(f)))
            .map_err(|e| BerryError::write_failed(path, e.into()))
    }
}

impl<'a, const D: usize> IntoIterator for &'a PointSet<D> {
    type Item = &'a [f64; D];
    type IntoIter = std::slice::Iter<'a, [f64; D]>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl PointSet<2> {
    /// 补上 `z = 0` 升为三维点集.
    pub fn to_3d(&self) -> PointSet<3> {
        self.iter().map(|[x, y]| [*x, *y, 0.0]).collect()
    }
}

impl PointSet<3> {
    /// 逐点施加变换.
    pub fn transform(&self, t: &Similarity3d) -> PointSet<3> {
        self.iter()
            .map(|p| t.transform_point(&Point3::from(*p)).coords.into())
            .collect()
    }

    /// 逐点平移.
    pub fn translate(&self, v: &Vector3<f64>) -> PointSet<3> {
        self.iter().map(|p| (Vector3::from(*p) + v).into()).collect()
    }
}

fn malformed(line: usize, reason: String) -> BerryError {
    BerryError::MalformedPointSet { line, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> PointSet<3> {
        vec![[0.0, 1.5, -2.25], [1e-7, 3.0, 1.0 / 3.0], [100.0, -0.0, 7.0]].into()
    }

    #[test]
    fn test_text_round_trip() {
        let set = sample();
        let mut buf = Vec::new();
        set.write_to(&mut buf).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("3\n3\n"));
        assert_eq!(PointSet::<3>::parse(Cursor::new(buf)).unwrap(), set);
    }

    #[test]
    fn test_file_round_trip_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.txt");
        sample().write(&path).unwrap();
        assert_eq!(PointSet::<3>::read(&path).unwrap(), sample());

        PointSet::<3>::new().write(&path).unwrap();
        assert!(PointSet::<3>::read(&path).unwrap().is_empty());

        assert!(matches!(
            PointSet::<3>::read(dir.path().join("missing.txt")),
            Err(BerryError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_parse_errors() {
        let parse = |s: &str| PointSet::<3>::parse(Cursor::new(s.to_owned()));
        assert!(matches!(
            parse("1\n2\n0 0\n"),
            Err(BerryError::DimensionMismatch { expected: 3, actual: 2 })
        ));
        assert!(matches!(
            parse("2\n3\n0 0 0\n"),
            Err(BerryError::MalformedPointSet { .. })
        ));
        assert!(matches!(
            parse("1\n3\n0 x 0\n"),
            Err(BerryError::MalformedPointSet { line: 3, .. })
        ));
        assert!(matches!(
            parse("1\n3\n0 0\n"),
            Err(BerryError::MalformedPointSet { line: 3, .. })
        ));
        assert!(matches!(parse("abc\n"), Err(BerryError::MalformedPointSet { line: 1, .. })));
        assert_eq!(parse("1\n3\n\n1 2 3\n\n").unwrap().len(), 1);

        // 声明的点数远超实际.
        assert!(matches!(
            parse("18446744073709551615\n3\n1 2 3\n"),
            Err(BerryError::MalformedPointSet { line: 0, .. })
        ));
    }

    #[test]
    fn test_centroid_and_transform() {
        let set: PointSet<3> = vec![[0.0, 0.0, 0.0], [2.0, 4.0, 6.0]].into();
        assert_eq!(set.centroid(), Some([1.0, 2.0, 3.0]));
        assert_eq!(PointSet::<3>::new().centroid(), None);

        let moved = set.translate(&Vector3::new(1.0, 0.0, -1.0));
        assert_eq!(moved.as_slice()[1], [3.0, 4.0, 5.0]);

        let mut t = Similarity3d::identity();
        t.set_translation(Vector3::new(1.0, 0.0, -1.0));
        assert_eq!(set.transform(&t), moved);

        let flat: PointSet<2> = vec![[1.0, 2.0]].into();
        assert_eq!(flat.to_3d().as_slice(), &[[1.0, 2.0, 0.0]]);
    }
}
