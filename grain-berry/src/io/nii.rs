//! nifti (`.nii`, `.nii.gz`) 格式.
//!
//! 文件中数组按 `[x, y, z]` 组织, 读入后转为 `(z, h, w)`.
//! 几何信息按 sform, qform, pixdim 的优先级解析; 写出时同时填写 sform 与 qform.

use std::path::Path;

use nalgebra::{Matrix3, Quaternion, Rotation3, UnitQuaternion, Vector3};
use ndarray::{Array3, ArrayD, Axis, Ix3};
use nifti::{NiftiHeader, NiftiObject, ReaderOptions};

use crate::{BerryError, Geometry, Result, Sample, Volume};

/// 读取 nifti 文件.
///
/// 二维图像视为单层体数据; 四维及以上且多余轴长度为 1 的数据会被压缩为三维.
pub fn read_nii<T: Sample, P: AsRef<Path>>(path: P) -> Result<Volume<T>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(BerryError::FileNotFound(path.to_owned()));
    }
    let obj = ReaderOptions::new().read_file(path)?;
    let geometry = geometry_from_header(obj.header())?;

    let data = to_three_axes(T::nifti_array(obj.into_volume())?)?;

    // [x, y, z] -> [z, y, x].
    let data = data.permuted_axes([2, 1, 0]).as_standard_layout().into_owned();
    Ok(Volume::from_array(data, geometry))
}

/// 补齐或压缩为三个轴: 不足三轴时在末尾补长度为 1 的轴, 超出时逐个去掉末尾长度为 1 的轴.
fn to_three_axes<T>(mut data: ArrayD<T>) -> Result<Array3<T>> {
    while data.ndim() < 3 {
        let last = data.ndim();
        data.insert_axis_inplace(Axis(last));
    }
    while data.ndim() > 3 && data.shape()[data.ndim() - 1] == 1 {
        let last = data.ndim() - 1;
        data = data.index_axis_move(Axis(last), 0);
    }
    let actual = data.ndim();
    data.into_dimensionality::<Ix3>()
        .map_err(|_| BerryError::DimensionMismatch {
            expected: 3,
            actual,
        })
}

/// 写入 nifti 文件. 扩展名为 `.gz` 时压缩.
pub fn write_nii<T: Sample, P: AsRef<Path>>(path: P, volume: &Volume<T>) -> Result<()> {
    let path = path.as_ref();
    let header = header_from_geometry(volume.geometry());
    T::write_nifti(path, &header, volume.data().permuted_axes([2, 1, 0]))
        .map_err(|e| BerryError::write_failed(path, e.into()))
}

fn geometry_from_header(h: &NiftiHeader) -> Result<Geometry> {
    if h.sform_code > 0 {
        let m = Matrix3::new(
            h.srow_x[0], h.srow_x[1], h.srow_x[2],
            h.srow_y[0], h.srow_y[1], h.srow_y[2],
            h.srow_z[0], h.srow_z[1], h.srow_z[2],
        )
        .cast::<f64>();
        let origin = [h.srow_x[3], h.srow_y[3], h.srow_z[3]].map(f64::from);
        let (spacing, direction) = split_columns(&m);
        return Geometry::new(spacing, origin, direction);
    }

    let spacing = [h.pixdim[1], h.pixdim[2], h.pixdim[3]].map(|s| {
        let s = f64::from(s).abs();
        if s > 0.0 {
            s
        } else {
            1.0
        }
    });
    if h.qform_code > 0 {
        let [b, c, d] = [h.quatern_b, h.quatern_c, h.quatern_d].map(f64::from);
        let a = (1.0 - b * b - c * c - d * d).max(0.0).sqrt();
        let mut direction = UnitQuaternion::from_quaternion(Quaternion::new(a, b, c, d))
            .to_rotation_matrix()
            .into_inner();
        if h.pixdim[0] < 0.0 {
            direction.column_mut(2).neg_mut();
        }
        let origin = [h.quatern_x, h.quatern_y, h.quatern_z].map(f64::from);
        return Geometry::new(spacing, origin, direction);
    }
    Geometry::new(spacing, [0.0; 3], Matrix3::identity())
}

/// 把 `direction · diag(spacing)` 拆为间距与方向. 零列视为对应坐标轴, 间距为 1.
fn split_columns(m: &Matrix3<f64>) -> ([f64; 3], Matrix3<f64>) {
    let mut spacing = [1.0; 3];
    let mut direction = Matrix3::identity();
    for a in 0..3 {
        let col = m.column(a);
        let n = col.norm();
        if n > 0.0 {
            spacing[a] = n;
            direction.set_column(a, &(col / n));
        }
    }
    (spacing, direction)
}

fn header_from_geometry(g: &Geometry) -> NiftiHeader {
    let spacing = g.spacing();
    let origin = g.origin();
    let to_physical = g.direction() * Matrix3::from_diagonal(&Vector3::from(spacing));

    let mut h = NiftiHeader::default();
    h.sform_code = 1;
    h.qform_code = 1;
    let row = |r: usize, o: f64| {
        [
            to_physical[(r, 0)] as f32,
            to_physical[(r, 1)] as f32,
            to_physical[(r, 2)] as f32,
            o as f32,
        ]
    };
    h.srow_x = row(0, origin.x);
    h.srow_y = row(1, origin.y);
    h.srow_z = row(2, origin.z);

    // qform 只能表达真旋转, 左手系方向借助 qfac = -1 翻转 z 列.
    let mut rotation = *g.direction();
    let qfac = if rotation.determinant() < 0.0 {
        rotation.column_mut(2).neg_mut();
        -1.0
    } else {
        1.0
    };
    let q = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation));
    let q = if q.w < 0.0 { -q.into_inner() } else { q.into_inner() };
    h.quatern_b = q.i as f32;
    h.quatern_c = q.j as f32;
    h.quatern_d = q.k as f32;
    h.quatern_x = origin.x as f32;
    h.quatern_y = origin.y as f32;
    h.quatern_z = origin.z as f32;

    h.pixdim[0] = qfac;
    h.pixdim[1] = spacing[0] as f32;
    h.pixdim[2] = spacing[1] as f32;
    h.pixdim[3] = spacing[2] as f32;
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;
    use ndarray::Array3;

    fn assert_same_geometry(a: &Geometry, b: &Geometry) {
        for p in [[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [-4.0, 0.5, 7.0]] {
            let p = Vector3::from(p);
            assert!((a.index_to_physical(&p) - b.index_to_physical(&p)).norm() < 1e-5);
        }
    }

    fn sample_volume() -> Volume<u16> {
        let direction = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let geometry = Geometry::new([0.5, 0.75, 2.0], [1.0, -2.0, 3.5], direction).unwrap();
        let data = Array3::from_shape_fn((3, 4, 5), |(z, h, w)| (w + 10 * h + 100 * z) as u16);
        Volume::from_array(data, geometry)
    }

    #[test]
    fn test_nii_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let v = sample_volume();
        for name in ["v.nii", "v.nii.gz"] {
            let path = dir.path().join(name);
            write_nii(&path, &v).unwrap();
            let back: Volume<u16> = read_nii(&path).unwrap();
            assert_eq!(back.data(), v.data());
            assert_same_geometry(back.geometry(), v.geometry());
        }
    }

    /// 不带 sform 时从 qform 恢复方向.
    #[test]
    fn test_qform_fallback() {
        let v = sample_volume();
        let mut h = header_from_geometry(v.geometry());
        h.sform_code = 0;
        let g = geometry_from_header(&h).unwrap();
        assert_same_geometry(&g, v.geometry());

        h.qform_code = 0;
        let g = geometry_from_header(&h).unwrap();
        assert_eq!(g.spacing(), [0.5, 0.75, 2.0]);
        assert_eq!(g.origin(), Point3::origin());
    }

    #[test]
    fn test_to_three_axes() {
        let plane = ArrayD::from_shape_vec(vec![4, 3], (0..12u8).collect()).unwrap();
        let a = to_three_axes(plane).unwrap();
        assert_eq!(a.dim(), (4, 3, 1));
        assert_eq!(a[(3, 2, 0)], 11);

        let padded = ArrayD::from_shape_vec(vec![2, 3, 4, 1, 1], (0..24u16).collect()).unwrap();
        let a = to_three_axes(padded).unwrap();
        assert_eq!(a.dim(), (2, 3, 4));
        assert_eq!(a[(1, 2, 3)], 23);

        let series = ArrayD::<u8>::zeros(vec![2, 2, 2, 3]);
        assert!(matches!(
            to_three_axes(series),
            Err(BerryError::DimensionMismatch { expected: 3, actual: 4 })
        ));
    }

    #[test]
    fn test_left_handed_direction() {
        let direction = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, -1.0));
        let g = Geometry::new([1.0, 1.0, 1.0], [0.0; 3], direction).unwrap();
        let mut h = header_from_geometry(&g);
        assert_eq!(h.pixdim[0], -1.0);
        h.sform_code = 0;
        assert_same_geometry(&geometry_from_header(&h).unwrap(), &g);
    }
}
