//! 整数倍降采样.

use nalgebra::Vector3;
use ndarray::Array3;

use crate::{BerryError, Result, Sample, Volume};

/// 按 `(x, y, z)` 方向各自的整数倍数降采样.
///
/// 输出每轴体素数为 `max(1, n / f)`. 输出体素取输入中索引为
/// `o * f + (f - 1) / 2` 的体素 (越界时截断), 体素间距乘以 `f`,
/// 原点移动到首个被取样体素处, 因此被取样体素的物理位置保持不变.
///
/// # 注意
///
/// 任一倍数为 0 时返回 `Err`.
pub fn shrink<T: Sample>(volume: &Volume<T>, factors: [usize; 3]) -> Result<Volume<T>> {
    if factors.contains(&0) {
        return Err(BerryError::config(format!(
            "shrink factors must be at least 1, got {factors:?}"
        )));
    }
    let size = volume.size();
    let mut out_size = [0usize; 3];
    let mut offset = [0usize; 3];
    for a in 0..3 {
        out_size[a] = (size[a] / factors[a]).max(1);
        offset[a] = ((factors[a] - 1) / 2).min(size[a].saturating_sub(1));
    }

    let src = volume.data();
    let pick = |o: usize, a: usize| (o * factors[a] + offset[a]).min(size[a].saturating_sub(1));
    let data = Array3::from_shape_fn((out_size[2], out_size[1], out_size[0]), |(z, h, w)| {
        src[(pick(z, 2), pick(h, 1), pick(w, 0))]
    });

    let g = volume.geometry();
    let spacing = g.spacing();
    let origin = g.index_to_physical(&Vector3::new(
        offset[0] as f64,
        offset[1] as f64,
        offset[2] as f64,
    ));
    let geometry = g.resampled(
        [
            spacing[0] * factors[0] as f64,
            spacing[1] * factors[1] as f64,
            spacing[2] * factors[2] as f64,
        ],
        origin,
    )?;
    Ok(Volume::from_array(data, geometry))
}

/// 各方向同倍数降采样. 单层数据的 z 方向保持不变.
pub fn shrink_uniform<T: Sample>(volume: &Volume<T>, factor: usize) -> Result<Volume<T>> {
    let fz = if volume.is_planar() { 1 } else { factor };
    shrink(volume, [factor, factor, fz])
}
