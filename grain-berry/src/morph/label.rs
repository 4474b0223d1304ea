//! 连通域标记与形状统计.

use std::collections::VecDeque;

use nalgebra::Vector3;
use ndarray::Array3;

use super::{Connectivity, LabeledObject};
use crate::consts::{gray, BACKGROUND_LABEL};
use crate::data::idx_to_xyz;
use crate::{Idx3d, Volume};

/// 标记二值体数据的连通前景区域.
///
/// 按行优先序扫描, 每遇到未标记的前景体素就以广度优先搜索标记其所在区域,
/// 因此标签从 1 开始按区域首个体素的扫描顺序编号. 背景标签为 0.
///
/// # 返回值
///
/// `(标签数组, 区域个数)`.
pub fn label_components(mask: &Volume<u8>, connectivity: Connectivity) -> (Array3<u32>, u32) {
    let mut labels = Array3::from_elem(mask.shape(), BACKGROUND_LABEL);
    let mut bfs_q = VecDeque::with_capacity(64);
    let mut next = BACKGROUND_LABEL;

    for (pos, &pix) in mask.data().indexed_iter() {
        if gray::is_background(pix) || labels[pos] != BACKGROUND_LABEL {
            continue;
        }
        next += 1;
        labels[pos] = next;
        bfs_q.push_back(pos);
        while let Some(cur_pos) = bfs_q.pop_front() {
            for neigh in connectivity.neighbours(mask, cur_pos) {
                if gray::is_foreground(mask[neigh]) && labels[neigh] == BACKGROUND_LABEL {
                    labels[neigh] = next;
                    bfs_q.push_back(neigh);
                }
            }
        }
    }
    (labels, next)
}

/// 统计每个标签区域的体素数, 质心, 包围盒与物理体积.
///
/// 输出按标签升序排列, `id` 暂取 `label - 1`.
pub(crate) fn shape_statistics(
    labels: &Array3<u32>,
    count: u32,
    reference: &Volume<u8>,
) -> Vec<LabeledObject> {
    struct Acc {
        size: usize,
        sum: Vector3<f64>,
        lo: Idx3d,
        hi: Idx3d,
    }

    let mut acc: Vec<Option<Acc>> = (0..count).map(|_| None).collect();
    for (pos, &label) in labels.indexed_iter() {
        if label == BACKGROUND_LABEL {
            continue;
        }
        let slot = &mut acc[(label - 1) as usize];
        let a = slot.get_or_insert(Acc {
            size: 0,
            sum: Vector3::zeros(),
            lo: pos,
            hi: pos,
        });
        a.size += 1;
        a.sum += idx_to_xyz(pos);
        a.lo = (a.lo.0.min(pos.0), a.lo.1.min(pos.1), a.lo.2.min(pos.2));
        a.hi = (a.hi.0.max(pos.0), a.hi.1.max(pos.1), a.hi.2.max(pos.2));
    }

    let geometry = reference.geometry();
    let voxel = geometry.voxel_volume();
    acc.into_iter()
        .zip(1u32..)
        .filter_map(|(a, label)| {
            let a = a?;
            let mean = a.sum / a.size as f64;
            Some(LabeledObject {
                id: (label - 1) as usize,
                label,
                centroid: geometry.index_to_physical(&mean).coords.into(),
                size: a.size,
                bounding_box: [a.lo, a.hi],
                physical_size: a.size as f64 * voxel,
            })
        })
        .collect()
}
