//! 灰度形态学重建, 以及基于重建的 h-maxima, h-minima, h-convex 滤波.
//!
//! 重建采用优先队列泛洪: 每个体素按当前值入堆, 出堆时向邻居传播,
//! 邻居值被更新时重新入堆. 堆中过期的条目在出堆时跳过.

use binary_heap_plus::BinaryHeap;

use super::Connectivity;
use crate::{Idx3d, Volume};

/// 重建方向.
#[derive(Copy, Clone, Debug)]
enum Flood {
    /// 膨胀重建: 标记不大于掩膜, 结果是掩膜下方标记的最大扩张.
    Dilation,

    /// 腐蚀重建: 标记不小于掩膜, 结果是掩膜上方标记的最大收缩.
    Erosion,
}

fn reconstruct(
    marker: &Volume<f32>,
    mask: &Volume<f32>,
    connectivity: Connectivity,
    flood: Flood,
) -> Volume<f32> {
    debug_assert_eq!(marker.shape(), mask.shape());

    // 先把标记限制在掩膜的对应一侧.
    let mut out = marker.clone();
    out.data_mut().zip_mut_with(&mask.data(), |r, m| {
        *r = match flood {
            Flood::Dilation => r.min(*m),
            Flood::Erosion => r.max(*m),
        }
    });

    // 膨胀时堆顶为最大值, 腐蚀时堆顶为最小值.
    let mut heap: BinaryHeap<(f32, Idx3d), _> =
        BinaryHeap::new_by(|a: &(f32, Idx3d), b: &(f32, Idx3d)| match flood {
            Flood::Dilation => a.0.total_cmp(&b.0),
            Flood::Erosion => b.0.total_cmp(&a.0),
        });
    heap.reserve(out.len());
    for (pos, v) in out.data().indexed_iter() {
        heap.push((*v, pos));
    }

    while let Some((v, pos)) = heap.pop() {
        if v != out[pos] {
            continue;
        }
        for q in connectivity.neighbours(&out, pos) {
            let candidate = match flood {
                Flood::Dilation => v.min(mask[q]),
                Flood::Erosion => v.max(mask[q]),
            };
            let improves = match flood {
                Flood::Dilation => candidate > out[q],
                Flood::Erosion => candidate < out[q],
            };
            if improves {
                out[q] = candidate;
                heap.push((candidate, q));
            }
        }
    }
    out
}

/// 以 `mask` 为上界, 对 `marker` 做膨胀重建.
pub fn reconstruction_by_dilation(
    marker: &Volume<f32>,
    mask: &Volume<f32>,
    connectivity: Connectivity,
) -> Volume<f32> {
    reconstruct(marker, mask, connectivity, Flood::Dilation)
}

/// 以 `mask` 为下界, 对 `marker` 做腐蚀重建.
pub fn reconstruction_by_erosion(
    marker: &Volume<f32>,
    mask: &Volume<f32>,
    connectivity: Connectivity,
) -> Volume<f32> {
    reconstruct(marker, mask, connectivity, Flood::Erosion)
}

/// h-maxima: 压平高度不足 `h` 的局部极大值. 即 `f - h` 在 `f` 之下的膨胀重建.
pub fn h_maxima(volume: &Volume<f32>, h: f64, connectivity: Connectivity) -> Volume<f32> {
    let h = h as f32;
    let marker = volume.map(|v| v - h);
    reconstruction_by_dilation(&marker, volume, connectivity)
}

/// h-minima: 填平深度不足 `h` 的局部极小值. 即 `f + h` 在 `f` 之上的腐蚀重建.
pub fn h_minima(volume: &Volume<f32>, h: f64, connectivity: Connectivity) -> Volume<f32> {
    let h = h as f32;
    let marker = volume.map(|v| v + h);
    reconstruction_by_erosion(&marker, volume, connectivity)
}

/// h-convex: `f - h_maxima(f)`, 突出高度不超过 `h` 的局部极大值区域.
pub fn h_convex(volume: &Volume<f32>, h: f64, connectivity: Connectivity) -> Volume<f32> {
    let mut out = h_maxima(volume, h, connectivity);
    out.data_mut().zip_mut_with(&volume.data(), |r, f| *r = *f - *r);
    out
}
