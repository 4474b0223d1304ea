/// 灰度线性窗口, 包含下限与上限.
///
/// 窗口把 `[lower, upper]` 线性映射到 `[0, 1]`, 窗外的值被截断.
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntensityWindow {
    lower: f64,
    upper: f64,
}

impl IntensityWindow {
    /// 构建窗口.
    ///
    /// `lower` 和 `upper` 必须是有限值, 且 `lower < upper`, 否则返回 `None`.
    pub fn new(lower: f64, upper: f64) -> Option<IntensityWindow> {
        if lower.is_finite() && upper.is_finite() && lower < upper {
            Some(Self { lower, upper })
        } else {
            None
        }
    }

    /// 由窗位 `level` 和窗宽 `width` 构建.
    #[inline]
    pub fn from_level_width(level: f64, width: f64) -> Option<IntensityWindow> {
        Self::new(level - width / 2.0, level + width / 2.0)
    }

    /// 体素类型的整个表示范围 `[0, PIXEL_MAX]`.
    #[inline]
    pub fn full_range<T: crate::Sample>() -> IntensityWindow {
        Self {
            lower: 0.0,
            upper: T::PIXEL_MAX,
        }
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f64 {
        self.lower
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f64 {
        self.upper
    }

    /// 窗位.
    #[inline]
    pub fn level(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// 求 `v` 在窗口中的相对位置 (`0.0 <= value <= 1.0`).
    ///
    /// 如果 `v` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval(&self, v: f64) -> Option<f64> {
        if !v.is_finite() {
            return None;
        }
        if v <= self.lower {
            Some(0.0)
        } else if v >= self.upper {
            Some(1.0)
        } else {
            Some((v - self.lower) / self.width())
        }
    }

    /// 把 `v` 经由本窗口映射到 `target` 窗口, 结果在 `target` 的范围内.
    #[inline]
    pub fn map_to(&self, v: f64, target: &IntensityWindow) -> Option<f64> {
        self.eval(v).map(|t| target.lower + t * target.width())
    }
}
