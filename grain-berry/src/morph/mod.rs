//! 砂粒分割: 形态学重建, 重标度, 阈值化, 连通域标记, 目标统计.
//!
//! 整个流程由 [`segment`] 驱动, 每一步都是 `Volume -> Volume` 的纯函数,
//! 也可以单独调用 (见 [`reconstruct`] 与 [`crate::filter`]).

use log::{debug, info, warn};
use ndarray::Array3;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::MIN_OBJECT_SIZE;
use crate::filter::{binary_threshold, rescale_intensity};
use crate::io::PointSet;
use crate::{BerryError, Idx3d, Result, Sample, Volume};

mod label;
pub mod reconstruct;

pub use label::label_components;
pub use reconstruct::{
    h_convex, h_maxima, h_minima, reconstruction_by_dilation, reconstruction_by_erosion,
};

/// 邻接规则.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Connectivity {
    /// 面相邻. 三维 6 邻域, 二维 4 邻域.
    #[default]
    Face,

    /// 全相邻. 三维 26 邻域, 二维 8 邻域.
    Full,
}

impl Connectivity {
    /// `pos` 在 `volume` 内的邻居.
    #[inline]
    pub fn neighbours<T: Sample>(&self, volume: &Volume<T>, pos: Idx3d) -> Vec<Idx3d> {
        match self {
            Self::Face => volume.face_neighbours(pos),
            Self::Full => volume.full_neighbours(pos),
        }
    }
}

/// 阈值化之前的去噪重建.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Reconstruction {
    /// 不做重建, 直接重标度.
    None,

    /// h-minima, 填平浅的局部极小值.
    HMinima,

    /// h-convex, 只保留高度不超过 `h` 的局部极大值区域.
    #[default]
    HConvex,
}

/// 分割参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentParams {
    /// 重建方式.
    pub reconstruction: Reconstruction,

    /// 重建高度占像素最大值的比例, 取值 `[0, 1]`.
    pub height: f64,

    /// 阈值占像素最大值的比例, 取值 `[0, 1]`.
    pub threshold: f64,

    /// 最小目标体素数, 更小的目标被丢弃.
    pub min_size: usize,

    /// 重建与标记使用的邻接规则.
    pub connectivity: Connectivity,
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            reconstruction: Reconstruction::default(),
            height: 0.0,
            threshold: 0.5,
            min_size: MIN_OBJECT_SIZE,
            connectivity: Connectivity::default(),
        }
    }
}

impl SegmentParams {
    fn validate(&self) -> Result<()> {
        for (name, v) in [("height", self.height), ("threshold", self.threshold)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(BerryError::config(format!(
                    "{name} must lie in [0, 1], got {v}"
                )));
            }
        }
        Ok(())
    }
}

/// 一个连通目标.
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledObject {
    /// 过滤后的连续编号, 从 0 开始.
    pub id: usize,

    /// 在标签数组中的标签, 从 1 开始.
    pub label: u32,

    /// 物理质心 `[x, y, z]`.
    pub centroid: [f64; 3],

    /// 体素数.
    pub size: usize,

    /// 索引空间包围盒 `[min, max]` (含).
    pub bounding_box: [Idx3d; 2],

    /// 物理体积, 即体素数乘以单个体素体积.
    pub physical_size: f64,
}

/// 分割结果.
#[derive(Clone, Debug)]
pub struct Segmentation {
    mask: Volume<u8>,
    labels: Array3<u32>,
    objects: Vec<LabeledObject>,
}

impl Segmentation {
    /// 阈值化后的二值掩膜.
    #[inline]
    pub fn mask(&self) -> &Volume<u8> {
        &self.mask
    }

    /// 标签数组. 被过滤掉的目标仍保留原标签.
    #[inline]
    pub fn labels(&self) -> &Array3<u32> {
        &self.labels
    }

    /// 保留下来的目标, 按 `id` 升序.
    #[inline]
    pub fn objects(&self) -> &[LabeledObject] {
        &self.objects
    }

    /// 保留下来的目标个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// 是否没有任何目标?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// 把质心导出为 `D` 维点集.
    ///
    /// # 注意
    ///
    /// `D` 只能是 2 或 3; `D = 2` 时要求数据是单层的. 否则返回 `Err(DimensionMismatch)`.
    pub fn centroids<const D: usize>(&self) -> Result<PointSet<D>> {
        let dimension = self.mask.dimension();
        let fits = match D {
            2 => dimension == 2,
            3 => true,
            _ => false,
        };
        if !fits {
            return Err(BerryError::DimensionMismatch {
                expected: dimension,
                actual: D,
            });
        }
        Ok(self
            .objects
            .iter()
            .map(|o| {
                let mut p = [0.0; D];
                p.copy_from_slice(&o.centroid[..D]);
                p
            })
            .collect())
    }

    /// 标签图, 只包含保留下来的目标, 值为 `id + 1`, 超出 `T` 表示范围时截断.
    pub fn label_map<T: Sample>(&self) -> Volume<T> {
        let top = self.objects.iter().map(|o| o.label).max().unwrap_or(0);
        let mut remap = vec![0u32; top as usize + 1];
        for o in &self.objects {
            remap[o.label as usize] = o.id as u32 + 1;
        }
        let data = self.labels.mapv(|l| {
            let l = remap.get(l as usize).copied().unwrap_or(0);
            T::from_f64(f64::from(l))
        });
        Volume::from_array(data, *self.mask.geometry())
    }
}

/// 重建去噪并阈值化, 得到二值掩膜.
///
/// 重建高度为 `T::level(height)`, 重建结果被重标度到 `[0, T::PIXEL_MAX]`,
/// 不小于 `T::level(threshold)` 的体素为前景.
pub fn threshold_mask<T: Sample>(volume: &Volume<T>, params: &SegmentParams) -> Result<Volume<u8>> {
    params.validate()?;
    let h = T::level(params.height);
    let thresh = T::level(params.threshold);
    info!("h = {h} intensity units, threshold = {thresh}");

    let f = volume.to_f32();
    let filtered = match params.reconstruction {
        Reconstruction::None => f,
        Reconstruction::HMinima => h_minima(&f, h, params.connectivity),
        Reconstruction::HConvex => h_convex(&f, h, params.connectivity),
    };
    debug!("reconstruction {:?} done", params.reconstruction);

    let rescaled = rescale_intensity::<f32, T>(&filtered, 0.0, T::PIXEL_MAX);
    Ok(binary_threshold(&rescaled, thresh, f64::INFINITY))
}

/// 分割体数据, 统计每个连通目标的质心与体素数.
///
/// 体素数小于 `params.min_size` 的目标被丢弃, 剩余目标按标签顺序从 0 重新编号.
pub fn segment<T: Sample>(volume: &Volume<T>, params: &SegmentParams) -> Result<Segmentation> {
    let mask = threshold_mask(volume, params)?;
    let (labels, count) = label_components(&mask, params.connectivity);
    info!("{count} connected components");

    let mut objects = label::shape_statistics(&labels, count, &mask);
    objects.retain(|o| o.size >= params.min_size);
    for (id, o) in objects.iter_mut().enumerate() {
        o.id = id;
    }
    if objects.is_empty() {
        warn!("no object survives the size filter (min size {})", params.min_size);
    } else {
        info!(
            "{} objects kept, {} dropped",
            objects.len(),
            count as usize - objects.len()
        );
    }
    Ok(Segmentation {
        mask,
        labels,
        objects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Geometry;
    use nalgebra::Matrix3;

    fn binary_params() -> SegmentParams {
        SegmentParams {
            reconstruction: Reconstruction::None,
            ..Default::default()
        }
    }

    fn fill_cube(v: &mut Volume<u8>, (z0, h0, w0): Idx3d, edge: usize) {
        for z in z0..z0 + edge {
            for h in h0..h0 + edge {
                for w in w0..w0 + edge {
                    v[(z, h, w)] = 255;
                }
            }
        }
    }

    #[test]
    fn test_two_cubes() {
        let geometry =
            Geometry::new([0.5, 1.0, 2.0], [10.0, 0.0, -1.0], Matrix3::identity()).unwrap();
        let mut v = Volume::<u8>::new((5, 5, 10), geometry);
        fill_cube(&mut v, (1, 1, 1), 3);
        fill_cube(&mut v, (1, 1, 6), 3);

        for reconstruction in [Reconstruction::None, Reconstruction::HConvex] {
            let params = SegmentParams {
                reconstruction,
                height: 0.5,
                ..Default::default()
            };
            let seg = segment(&v, &params).unwrap();
            assert_eq!(seg.len(), 2);
            let [a, b] = [&seg.objects()[0], &seg.objects()[1]];
            assert_eq!((a.size, b.size), (27, 27));
            assert_eq!(a.centroid, [11.0, 2.0, 3.0]);
            assert_eq!(b.centroid, [13.5, 2.0, 3.0]);
            assert_eq!(a.bounding_box, [(1, 1, 1), (3, 3, 3)]);
            assert_eq!(b.physical_size, 27.0);
        }
    }

    #[test]
    fn test_size_filter() {
        let mut v = Volume::<u16>::new((1, 5, 5), Geometry::default());
        v[(0, 0, 0)] = 1000;
        v[(0, 4, 3)] = 1000;
        v[(0, 4, 4)] = 1000;
        v[(0, 2, 2)] = 1000;

        let seg = segment(&v, &binary_params()).unwrap();
        assert_eq!(seg.len(), 1);
        let only = &seg.objects()[0];
        assert_eq!((only.id, only.label, only.size), (0, 3, 2));
        assert_eq!(only.centroid, [3.5, 4.0, 0.0]);

        let pts = seg.centroids::<2>().unwrap();
        assert_eq!(pts.as_slice(), &[[3.5, 4.0]]);
        assert_eq!(seg.centroids::<3>().unwrap().as_slice(), &[[3.5, 4.0, 0.0]]);
        assert!(seg.centroids::<4>().is_err());

        let map = seg.label_map::<u8>();
        assert_eq!(map[(0, 4, 4)], 1);
        assert_eq!(map[(0, 0, 0)], 0);

        let keep_all = SegmentParams {
            min_size: 1,
            ..binary_params()
        };
        assert_eq!(segment(&v, &keep_all).unwrap().len(), 3);
    }

    #[test]
    fn test_connectivity() {
        let mut v = Volume::<u8>::new((2, 2, 2), Geometry::default());
        v[(0, 0, 0)] = 255;
        v[(1, 1, 1)] = 255;
        let keep_all = SegmentParams {
            min_size: 1,
            ..binary_params()
        };
        assert_eq!(segment(&v, &keep_all).unwrap().len(), 2);
        let full = SegmentParams {
            connectivity: Connectivity::Full,
            ..keep_all
        };
        let seg = segment(&v, &full).unwrap();
        assert_eq!(seg.len(), 1);
        assert_eq!(seg.objects()[0].centroid, [0.5, 0.5, 0.5]);
        assert!(seg.centroids::<2>().is_err());
    }

    #[test]
    fn test_empty_and_invalid() {
        let v = Volume::<u8>::new((2, 3, 3), Geometry::default());
        let seg = segment(&v, &binary_params()).unwrap();
        assert!(seg.is_empty());
        assert!(seg.centroids::<3>().unwrap().is_empty());

        let bad = SegmentParams {
            threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            segment(&v, &bad),
            Err(BerryError::InvalidConfig(_))
        ));
    }
}
