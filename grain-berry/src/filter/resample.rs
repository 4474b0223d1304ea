//! 按空间变换重采样.

use ndarray::Array3;

use crate::data::idx_to_xyz;
use crate::transform::Similarity3d;
use crate::{Geometry, Idx3d, Sample, Volume};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use ndarray::Zip;
    }
}

/// 在参考网格上重采样浮动数据.
///
/// 输出形状为 `shape`, 几何信息为 `reference`. 对输出网格的每个体素 `p` (物理坐标),
/// 在 `moving` 的 `transform(p)` 处线性插值; 落在 `moving` 之外时取 `default`.
pub fn resample<T: Sample>(
    moving: &Volume<T>,
    transform: &Similarity3d,
    shape: Idx3d,
    reference: &Geometry,
    default: T,
) -> Volume<T> {
    let sample = |pos: Idx3d| {
        let p = reference.index_to_physical(&idx_to_xyz(pos));
        moving
            .interpolate_physical(&transform.transform_point(&p))
            .map_or(default, T::from_f64)
    };
    Volume::from_array(fill(shape, sample), *reference)
}

#[cfg(not(feature = "rayon"))]
fn fill<T: Sample, F: Fn(Idx3d) -> T + Sync>(shape: Idx3d, f: F) -> Array3<T> {
    Array3::from_shape_fn(shape, f)
}

/// 借助 `rayon`, 并行地填充输出网格.
#[cfg(feature = "rayon")]
fn fill<T: Sample, F: Fn(Idx3d) -> T + Sync>(shape: Idx3d, f: F) -> Array3<T> {
    let mut out = Array3::default(shape);
    Zip::indexed(&mut out).par_for_each(|pos, v| *v = f(pos));
    out
}

/// 以体数据自身的网格为参考重采样.
#[inline]
pub fn resample_like<T: Sample>(volume: &Volume<T>, transform: &Similarity3d, default: T) -> Volume<T> {
    resample(volume, transform, volume.shape(), volume.geometry(), default)
}

/// 绕几何中心依次绕 x, y, z 轴旋转 (单位: 度), 输出网格与输入相同, 外部取 0.
///
/// 变换把输出网格上的点映射到输入中的采样位置.
pub fn rotate_about_center<T: Sample>(volume: &Volume<T>, degrees: [f64; 3]) -> Volume<T> {
    let mut t = Similarity3d::identity();
    t.set_center(volume.geometric_center());
    t.set_rotation_degrees(degrees);
    resample_like(volume, &t, T::default())
}
