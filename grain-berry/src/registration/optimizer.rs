//! 正则步长梯度下降.
//!
//! # 算法
//!
//! 每次迭代:
//!
//! 1. 在当前参数处求代价与梯度; 代价非有限值时返回 `Err(NonFiniteCost)`.
//! 2. 梯度逐分量除以参数尺度, 抵消弧度, 毫米, 无量纲缩放之间的量纲差异.
//! 3. 若归一化梯度与上一次的点积为负 (方向反转), 步长乘以松弛系数;
//!   若方向一致且代价下降, 步长乘以增长系数, 但不超过初始步长.
//! 4. 步长低于最小步长即停止; 否则沿归一化梯度反方向走一个步长.
//!
//! 优化器独立记录代价最低的参数, 最终返回的是它, 而不一定是最后一次迭代的参数.

use std::fmt;

use log::debug;
use ordered_float::NotNan;

use super::metric::Metric;
use crate::consts::optim;
use crate::transform::{Parameters, Similarity3d, N_PARAMETERS};
use crate::{BerryError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 优化器配置.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OptimizerConfig {
    /// 最大迭代次数, 至少为 1.
    pub number_of_iterations: usize,

    /// 初始步长, 同时也是步长上限.
    pub learning_rate: f64,

    /// 最小步长.
    pub minimum_step_length: f64,

    /// 方向反转时的步长松弛系数, 取值 `(0, 1)`.
    pub relaxation_factor: f64,

    /// 同向且代价下降时的步长增长系数, 不小于 1.
    pub step_growth: f64,

    /// 归一化梯度模长低于该值视为收敛.
    pub gradient_tolerance: f64,

    /// 每个参数的尺度. 梯度逐分量除以它.
    pub scales: Parameters,

    /// 是否返回代价最低的参数. 否则返回最后一次迭代的参数.
    pub return_best_parameters: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            number_of_iterations: optim::NUMBER_OF_ITERATIONS,
            learning_rate: optim::LEARNING_RATE,
            minimum_step_length: optim::MINIMUM_STEP_LENGTH,
            relaxation_factor: optim::RELAXATION_FACTOR,
            step_growth: optim::STEP_GROWTH,
            gradient_tolerance: optim::GRADIENT_TOLERANCE,
            scales: optim::SCALES,
            return_best_parameters: true,
        }
    }
}

impl OptimizerConfig {
    /// 检查配置是否合法.
    pub fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if self.number_of_iterations == 0 {
            return Err(BerryError::config("number of iterations must be at least 1"));
        }
        if !positive(self.learning_rate) {
            return Err(BerryError::config(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !positive(self.minimum_step_length) {
            return Err(BerryError::config(format!(
                "minimum step length must be positive, got {}",
                self.minimum_step_length
            )));
        }
        if !(self.relaxation_factor > 0.0 && self.relaxation_factor < 1.0) {
            return Err(BerryError::config(format!(
                "relaxation factor must lie in (0, 1), got {}",
                self.relaxation_factor
            )));
        }
        if !(self.step_growth.is_finite() && self.step_growth >= 1.0) {
            return Err(BerryError::config(format!(
                "step growth must be at least 1, got {}",
                self.step_growth
            )));
        }
        if !(self.gradient_tolerance.is_finite() && self.gradient_tolerance >= 0.0) {
            return Err(BerryError::config(format!(
                "gradient tolerance must be non-negative, got {}",
                self.gradient_tolerance
            )));
        }
        if !self.scales.iter().all(|s| positive(*s)) {
            return Err(BerryError::config(format!(
                "scales must be positive, got {:?}",
                self.scales
            )));
        }
        Ok(())
    }
}

/// 终止状态. 三者都是正常结束.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StopCondition {
    /// 归一化梯度模长低于容差.
    Converged,

    /// 迭代次数耗尽.
    MaxIterationsReached,

    /// 步长低于最小步长.
    StepTooSmall,
}

impl StopCondition {
    /// 是否因满足收敛判据而停止.
    #[inline]
    pub fn is_converged(&self) -> bool {
        !matches!(self, Self::MaxIterationsReached)
    }
}

impl fmt::Display for StopCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Converged => "gradient magnitude tolerance met",
            Self::MaxIterationsReached => "maximum number of iterations reached",
            Self::StepTooSmall => "step too small",
        };
        f.write_str(s)
    }
}

/// 每次迭代回调收到的信息.
#[derive(Copy, Clone, Debug)]
pub struct IterationReport<'a> {
    /// 迭代序号, 从 0 开始.
    pub iteration: usize,

    /// 当前代价.
    pub value: f64,

    /// 当前参数.
    pub parameters: &'a Parameters,

    /// 本次迭代使用的步长.
    pub step_length: f64,
}

/// 优化结果.
#[derive(Clone, Debug)]
pub struct Optimization {
    /// 最终变换 (默认为代价最低的那一个).
    pub transform: Similarity3d,

    /// 最终变换对应的代价.
    pub value: f64,

    /// 完成的迭代次数.
    pub iterations: usize,

    /// 终止状态.
    pub stop: StopCondition,

    /// 终止原因描述.
    pub description: String,
}

/// 正则步长梯度下降优化器.
#[derive(Clone, Debug)]
pub struct RegularStepGradientDescent {
    config: OptimizerConfig,
}

impl RegularStepGradientDescent {
    /// 以 `config` 创建优化器. 配置不合法时返回 `Err`.
    pub fn new(config: OptimizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 配置.
    #[inline]
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// 从 `initial` 出发最小化 `metric`. 每次迭代求值后调用一次 `observer`.
    pub fn optimize<M, F>(
        &self,
        metric: &M,
        initial: Similarity3d,
        mut observer: F,
    ) -> Result<Optimization>
    where
        M: Metric + ?Sized,
        F: FnMut(&IterationReport),
    {
        let cfg = &self.config;
        let mut current = initial;
        let mut step = cfg.learning_rate;
        let mut previous: Option<(f64, Parameters)> = None;
        let mut best: Option<(NotNan<f64>, Similarity3d)> = None;
        let mut last_value = f64::NAN;

        for iteration in 0..cfg.number_of_iterations {
            let (value, derivative) = metric.value_and_derivative(&current)?;
            if !value.is_finite() || derivative.iter().any(|d| !d.is_finite()) {
                return Err(BerryError::NonFiniteCost { iteration });
            }
            last_value = value;

            let parameters = current.parameters();
            observer(&IterationReport {
                iteration,
                value,
                parameters: &parameters,
                step_length: step,
            });
            debug!("{iteration:>5}  {value:.6}  {parameters:?}");

            // `value` 已确认有限.
            let key = NotNan::new(value).map_err(|_| BerryError::NonFiniteCost { iteration })?;
            if best.as_ref().map_or(true, |(b, _)| key < *b) {
                best = Some((key, current));
            }

            let mut scaled = [0.0; N_PARAMETERS];
            for i in 0..N_PARAMETERS {
                scaled[i] = derivative[i] / cfg.scales[i];
            }
            let magnitude = scaled.iter().map(|g| g * g).sum::<f64>().sqrt();
            if magnitude < cfg.gradient_tolerance {
                return Ok(self.finish(
                    current,
                    value,
                    best,
                    iteration + 1,
                    StopCondition::Converged,
                    format!(
                        "Gradient magnitude tolerance met after {} iterations. \
                         Gradient magnitude ({magnitude}) is less than gradient magnitude tolerance ({}).",
                        iteration + 1,
                        cfg.gradient_tolerance
                    ),
                ));
            }

            if let Some((prev_value, prev_scaled)) = &previous {
                let dot: f64 = scaled.iter().zip(prev_scaled).map(|(a, b)| a * b).sum();
                if dot < 0.0 {
                    step *= cfg.relaxation_factor;
                } else if value < *prev_value {
                    step = (step * cfg.step_growth).min(cfg.learning_rate);
                }
            }
            if step < cfg.minimum_step_length {
                return Ok(self.step_too_small(current, value, best, iteration + 1, step));
            }

            // 步长使缩放变为非正时, 沿同一方向松弛步长后重试.
            loop {
                let factor = step / magnitude;
                let mut delta = [0.0; N_PARAMETERS];
                for i in 0..N_PARAMETERS {
                    delta[i] = -scaled[i] * factor;
                }
                match current.update_parameters(&delta) {
                    Ok(()) => break,
                    Err(BerryError::InvalidScale(scale)) => {
                        debug!("step {step} drives scale to {scale}, relaxing");
                        step *= cfg.relaxation_factor;
                        if step < cfg.minimum_step_length {
                            return Ok(self.step_too_small(current, value, best, iteration + 1, step));
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
            previous = Some((value, scaled));
        }

        Ok(self.finish(
            current,
            last_value,
            best,
            cfg.number_of_iterations,
            StopCondition::MaxIterationsReached,
            format!(
                "Maximum number of iterations ({}) exceeded.",
                cfg.number_of_iterations
            ),
        ))
    }

    fn step_too_small(
        &self,
        current: Similarity3d,
        value: f64,
        best: Option<(NotNan<f64>, Similarity3d)>,
        iterations: usize,
        step: f64,
    ) -> Optimization {
        self.finish(
            current,
            value,
            best,
            iterations,
            StopCondition::StepTooSmall,
            format!(
                "Step too small after {iterations} iterations. \
                 Current step ({step}) is less than minimum step ({}).",
                self.config.minimum_step_length
            ),
        )
    }

    fn finish(
        &self,
        current: Similarity3d,
        value: f64,
        best: Option<(NotNan<f64>, Similarity3d)>,
        iterations: usize,
        stop: StopCondition,
        description: String,
    ) -> Optimization {
        let (transform, value) = match best {
            Some((b, t)) if self.config.return_best_parameters => (t, b.into_inner()),
            _ => (current, value),
        };
        Optimization {
            transform,
            value,
            iterations,
            stop,
            description,
        }
    }
}
