//! 配准度量.
//!
//! 度量是 (固定数据, 浮动数据, 候选变换) 的无状态函数, 返回代价与梯度.
//! 梯度由中心差分给出, 扰动方式与优化器更新参数的方式相同
//! (见 [`Similarity3d::update_parameters`]), 因此两者对参数的解释一致.

use log::warn;
use nalgebra::Point3;

use crate::io::PointSet;
use crate::transform::{Parameters, Similarity3d, N_PARAMETERS};
use crate::{BerryError, Result, Volume};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;
    }
}

/// 默认差分步长: versor 与缩放用 `1e-4`, 平移用 `1e-3` (物理单位).
pub const DIFFERENCE_STEPS: Parameters = [1e-4, 1e-4, 1e-4, 1e-3, 1e-3, 1e-3, 1e-4];

/// 代价函数.
pub trait Metric {
    /// 在 `transform` 处求代价.
    fn value(&self, transform: &Similarity3d) -> Result<f64>;

    /// 每个参数的差分步长.
    #[inline]
    fn difference_steps(&self) -> Parameters {
        DIFFERENCE_STEPS
    }

    /// 在 `transform` 处求代价与梯度.
    ///
    /// 一般使用中心差分. 缩放接近 0 以致反向扰动不合法时, 该分量改用前向差分.
    fn value_and_derivative(&self, transform: &Similarity3d) -> Result<(f64, Parameters)> {
        let value = self.value(transform)?;
        let steps = self.difference_steps();
        let mut gradient = [0.0; N_PARAMETERS];
        for (i, &h) in steps.iter().enumerate() {
            let perturbed = |d: f64| {
                let mut delta = [0.0; N_PARAMETERS];
                delta[i] = d;
                let mut t = *transform;
                t.update_parameters(&delta).map(|()| t)
            };
            gradient[i] = match (perturbed(h), perturbed(-h)) {
                (Ok(plus), Ok(minus)) => (self.value(&plus)? - self.value(&minus)?) / (2.0 * h),
                (Ok(plus), Err(_)) => (self.value(&plus)? - value) / h,
                (Err(_), Ok(minus)) => (value - self.value(&minus)?) / h,
                (Err(e), Err(_)) => return Err(e),
            };
        }
        Ok((value, gradient))
    }
}

/// 固定图像采样策略.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Sampling {
    /// 使用所有体素.
    #[default]
    Full,

    /// 按行优先序每隔 `n` 个体素取一个.
    Regular(usize),
}

/// 灰度均方差度量.
///
/// 在固定图像的采样点 `p` 处, 用线性插值读取浮动图像在 `T(p)` 处的值,
/// 累加平方差后取平均. `T(p)` 落在浮动图像之外的采样点直接跳过,
/// 不参与代价和梯度. 所有采样点都被跳过时代价为 NaN.
pub struct MeanSquaresMetric<'a> {
    moving: &'a Volume<f32>,
    samples: Vec<(Point3<f64>, f64)>,
}

impl<'a> MeanSquaresMetric<'a> {
    /// 按 `sampling` 预先计算固定图像采样点的物理坐标与灰度值.
    pub fn new(fixed: &Volume<f32>, moving: &'a Volume<f32>, sampling: Sampling) -> Result<Self> {
        let stride = match sampling {
            Sampling::Full => 1,
            Sampling::Regular(0) => {
                return Err(BerryError::config("sampling stride must be at least 1"))
            }
            Sampling::Regular(n) => n,
        };
        let geometry = fixed.geometry();
        let samples = fixed
            .data()
            .indexed_iter()
            .step_by(stride)
            .map(|(pos, v)| {
                (
                    geometry.index_to_physical(&crate::data::idx_to_xyz(pos)),
                    *v as f64,
                )
            })
            .collect();
        Ok(Self { moving, samples })
    }

    /// 采样点个数.
    #[inline]
    pub fn sample_len(&self) -> usize {
        self.samples.len()
    }

    /// 单个采样点的 (平方差, 是否有效).
    #[inline]
    fn residual(&self, transform: &Similarity3d, (p, fv): &(Point3<f64>, f64)) -> Option<f64> {
        let mv = self.moving.interpolate_physical(&transform.transform_point(p))?;
        Some((fv - mv).powi(2))
    }

    /// (平方差之和, 有效采样点数).
    #[cfg(not(feature = "rayon"))]
    fn accumulate(&self, transform: &Similarity3d) -> (f64, usize) {
        self.samples
            .iter()
            .filter_map(|s| self.residual(transform, s))
            .fold((0.0, 0usize), |(s, n), r| (s + r, n + 1))
    }

    /// 借助 `rayon`, 并行地求 (平方差之和, 有效采样点数).
    #[cfg(feature = "rayon")]
    fn accumulate(&self, transform: &Similarity3d) -> (f64, usize) {
        self.samples
            .par_iter()
            .filter_map(|s| self.residual(transform, s))
            .fold(|| (0.0, 0usize), |(s, n), r| (s + r, n + 1))
            .reduce(|| (0.0, 0usize), |(a, n), (b, m)| (a + b, n + m))
    }
}

impl Metric for MeanSquaresMetric<'_> {
    fn value(&self, transform: &Similarity3d) -> Result<f64> {
        let (sum, count) = self.accumulate(transform);
        if count == 0 {
            warn!("no fixed sample maps inside the moving volume");
            return Ok(f64::NAN);
        }
        Ok(sum / count as f64)
    }
}

/// 点集欧氏距离度量: `Σ |T(moving_i) - fixed_i|²`, 点按下标一一对应.
pub struct PointSetMetric<'a> {
    fixed: &'a PointSet<3>,
    moving: &'a PointSet<3>,
}

impl<'a> PointSetMetric<'a> {
    /// 两个点集长度必须一致, 否则返回 `Err(PointCountMismatch)`.
    pub fn new(fixed: &'a PointSet<3>, moving: &'a PointSet<3>) -> Result<Self> {
        if fixed.len() != moving.len() {
            return Err(BerryError::PointCountMismatch {
                fixed: fixed.len(),
                moving: moving.len(),
            });
        }
        Ok(Self { fixed, moving })
    }
}

impl Metric for PointSetMetric<'_> {
    fn value(&self, transform: &Similarity3d) -> Result<f64> {
        Ok(self
            .moving
            .iter()
            .zip(self.fixed.iter())
            .map(|(m, f)| (transform.transform_point(&Point3::from(*m)) - Point3::from(*f)).norm_squared())
            .sum())
    }

    /// 点集坐标量级通常比体素间距大, 平移差分步长放宽.
    #[inline]
    fn difference_steps(&self) -> Parameters {
        [1e-5, 1e-5, 1e-5, 1e-3, 1e-3, 1e-3, 1e-5]
    }
}
