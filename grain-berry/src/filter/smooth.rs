//! 离散高斯平滑.

use ndarray::Axis;

use crate::Volume;

/// 生成归一化的一维高斯核, 半径 `ceil(3σ)`. `sigma` 以体素为单位.
fn kernel(sigma: f64) -> Vec<f64> {
    let radius = (3.0 * sigma).ceil() as usize;
    let mut k: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = k.iter().sum();
    k.iter_mut().for_each(|v| *v /= sum);
    k
}

/// 可分离高斯平滑. `sigma` 以物理单位给出, 每个轴按体素间距换算.
///
/// 边界外的体素取最近的边界体素. `sigma <= 0` 或某轴只有一个体素时该轴不做平滑.
pub fn gaussian_smooth(volume: &Volume<f32>, sigma: f64) -> Volume<f32> {
    let mut out = volume.clone();
    if !(sigma > 0.0) {
        return out;
    }
    let spacing = volume.geometry().spacing();
    // (x, y, z) -> 数组轴 (2, 1, 0).
    for (a, axis) in [(0usize, Axis(2)), (1, Axis(1)), (2, Axis(0))] {
        if out.data().len_of(axis) < 2 {
            continue;
        }
        let k = kernel(sigma / spacing[a]);
        let radius = (k.len() / 2) as i64;
        let mut data = out.data_mut();
        let mut buf = Vec::new();
        for mut lane in data.lanes_mut(axis) {
            let n = lane.len() as i64;
            buf.clear();
            buf.extend(lane.iter().map(|v| *v as f64));
            for (i, v) in lane.iter_mut().enumerate() {
                let mut acc = 0.0;
                for (j, w) in k.iter().enumerate() {
                    let src = (i as i64 + j as i64 - radius).clamp(0, n - 1) as usize;
                    acc += w * buf[src];
                }
                *v = acc as f32;
            }
        }
    }
    out
}
