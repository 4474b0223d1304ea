//! 配准: 度量, 优化器与驱动.
//!
//! 变换把固定数据空间中的点映射到浮动数据空间. 对体数据而言,
//! 固定图像的采样点经变换后在浮动图像中插值; 对点集而言,
//! 浮动点经变换后与对应的固定点比较.
//!
//! # 用法
//!
//! ```ignore
//! let initial = initialize_by_geometric_centers(&fixed, &moving);
//! let reg = ImageRegistration::new(RegularStepGradientDescent::new(OptimizerConfig::default())?);
//! let result = reg.run(&fixed, &moving, initial, |_| {})?;
//! println!("{}", result.transform.translation());
//! ```

use log::{info, warn};
use nalgebra::{Point3, Vector3};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::io::PointSet;
use crate::transform::Similarity3d;
use crate::{BerryError, Result, Sample, Volume};

pub mod metric;
pub mod optimizer;
mod pyramid;

pub use metric::{MeanSquaresMetric, Metric, PointSetMetric, Sampling};
pub use optimizer::{
    IterationReport, Optimization, OptimizerConfig, RegularStepGradientDescent, StopCondition,
};
pub use pyramid::PyramidLevel;

/// 初始化时取哪种中心.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CenterMode {
    /// 几何中心.
    #[default]
    Geometry,

    /// 灰度矩, 即以体素值为权重的质心. 总权重不为正时退回几何中心.
    Moments,
}

fn center_of<T: Sample>(volume: &Volume<T>, mode: CenterMode) -> Point3<f64> {
    match mode {
        CenterMode::Geometry => volume.geometric_center(),
        CenterMode::Moments => volume.intensity_centroid().unwrap_or_else(|| {
            warn!("total intensity is not positive, using geometric center");
            volume.geometric_center()
        }),
    }
}

/// 以两者的几何中心初始化: 中心取固定数据的中心, 平移使固定中心落到浮动中心.
/// 旋转为恒等, 缩放为 1.
#[inline]
pub fn initialize_by_geometric_centers<T: Sample, U: Sample>(
    fixed: &Volume<T>,
    moving: &Volume<U>,
) -> Similarity3d {
    initialize_with(fixed, moving, CenterMode::Geometry)
}

/// 按 `mode` 选取中心初始化, 见 [`initialize_by_geometric_centers`].
pub fn initialize_with<T: Sample, U: Sample>(
    fixed: &Volume<T>,
    moving: &Volume<U>,
    mode: CenterMode,
) -> Similarity3d {
    let fc = center_of(fixed, mode);
    let mc = center_of(moving, mode);
    let mut t = Similarity3d::identity();
    t.set_center(fc);
    t.set_translation(mc - fc);
    t
}

/// 点集初始化: 中心取浮动点集质心, 平移使其落到固定点集质心. 任一点集为空时返回恒等变换.
pub fn initialize_point_sets(fixed: &PointSet<3>, moving: &PointSet<3>) -> Similarity3d {
    let mut t = Similarity3d::identity();
    if let (Some(fc), Some(mc)) = (fixed.centroid(), moving.centroid()) {
        t.set_center(Point3::from(mc));
        t.set_translation(Vector3::from(fc) - Vector3::from(mc));
    }
    t
}

/// 金字塔某一层的结果.
#[derive(Clone, Debug)]
pub struct LevelReport {
    /// 层号, 从最粗一层的 0 开始.
    pub level: usize,

    /// 该层参数.
    pub pyramid: PyramidLevel,

    /// 该层完成的迭代次数.
    pub iterations: usize,

    /// 该层最终代价.
    pub value: f64,

    /// 该层终止状态.
    pub stop: StopCondition,
}

/// 配准结果. 优化器未收敛时结果依然可用.
#[derive(Clone, Debug)]
pub struct RegistrationResult {
    /// 最终变换.
    pub transform: Similarity3d,

    /// 最终代价 (最后一层).
    pub value: f64,

    /// 所有层的迭代次数之和.
    pub iterations: usize,

    /// 最后一层的终止状态.
    pub stop: StopCondition,

    /// 最后一层的终止原因.
    pub description: String,

    /// 每一层的结果.
    pub levels: Vec<LevelReport>,
}

impl From<Optimization> for RegistrationResult {
    fn from(o: Optimization) -> Self {
        Self {
            transform: o.transform,
            value: o.value,
            iterations: o.iterations,
            stop: o.stop,
            description: o.description,
            levels: Vec::new(),
        }
    }
}

/// 灰度配准驱动.
#[derive(Clone, Debug)]
pub struct ImageRegistration {
    optimizer: RegularStepGradientDescent,
    levels: Vec<PyramidLevel>,
    sampling: Sampling,
}

impl ImageRegistration {
    /// 单层, 全体素采样.
    pub fn new(optimizer: RegularStepGradientDescent) -> Self {
        Self {
            optimizer,
            levels: vec![PyramidLevel::default()],
            sampling: Sampling::Full,
        }
    }

    /// 设置金字塔, 按从粗到细的顺序给出. 不能为空.
    pub fn with_levels(mut self, levels: Vec<PyramidLevel>) -> Result<Self> {
        if levels.is_empty() {
            return Err(BerryError::config("at least one pyramid level is required"));
        }
        for l in &levels {
            l.validate()?;
        }
        self.levels = levels;
        Ok(self)
    }

    /// 设置固定图像采样策略.
    #[inline]
    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// 金字塔.
    #[inline]
    pub fn levels(&self) -> &[PyramidLevel] {
        &self.levels
    }

    /// 从 `initial` 出发配准. 每一层的结果作为下一层的起点.
    ///
    /// `observer` 在每次迭代求值后被调用, 迭代序号在每层重新从 0 开始.
    pub fn run<T, U, F>(
        &self,
        fixed: &Volume<T>,
        moving: &Volume<U>,
        initial: Similarity3d,
        mut observer: F,
    ) -> Result<RegistrationResult>
    where
        T: Sample,
        U: Sample,
        F: FnMut(&IterationReport),
    {
        let (fixed, moving) = (fixed.to_f32(), moving.to_f32());
        let mut current = initial;
        let mut reports = Vec::with_capacity(self.levels.len());
        let mut last: Option<Optimization> = None;

        for (level, pyramid) in self.levels.iter().enumerate() {
            let f = pyramid.prepare(&fixed)?;
            let m = pyramid.prepare(&moving)?;
            let metric = MeanSquaresMetric::new(&f, &m, self.sampling)?;
            info!(
                "level {level} ({pyramid}): {} samples, fixed size {:?}",
                metric.sample_len(),
                f.size()
            );

            let out = self.optimizer.optimize(&metric, current, &mut observer)?;
            info!(
                "level {level}: {} after {} iterations, value = {}",
                out.stop, out.iterations, out.value
            );
            current = out.transform;
            reports.push(LevelReport {
                level,
                pyramid: *pyramid,
                iterations: out.iterations,
                value: out.value,
                stop: out.stop,
            });
            last = Some(out);
        }

        let last = last.ok_or_else(|| BerryError::config("no pyramid level"))?;
        let mut result = RegistrationResult::from(last);
        result.iterations = reports.iter().map(|r| r.iterations).sum();
        result.levels = reports;
        Ok(result)
    }
}

/// 点集配准. 两个点集按下标一一对应.
pub fn register_point_sets<F>(
    fixed: &PointSet<3>,
    moving: &PointSet<3>,
    optimizer: &RegularStepGradientDescent,
    initial: Similarity3d,
    observer: F,
) -> Result<RegistrationResult>
where
    F: FnMut(&IterationReport),
{
    let metric = PointSetMetric::new(fixed, moving)?;
    let out = optimizer.optimize(&metric, initial, observer)?;
    info!(
        "point sets: {} after {} iterations, value = {}",
        out.stop, out.iterations, out.value
    );
    Ok(out.into())
}
