//! 体数据的物理空间元信息.

use nalgebra::{Matrix3, Point3, Vector3};

use crate::{BerryError, Result};

/// 体素间距, 原点与方向矩阵. 三者均按 `(x, y, z)` 组织.
///
/// 索引到物理坐标的映射为 `physical = origin + direction · (spacing ⊙ index)`,
/// 其中 `index = (w, h, z)`.
///
/// 该结构是只读的. 若要修改几何信息, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Geometry {
    spacing: Vector3<f64>,
    origin: Point3<f64>,
    direction: Matrix3<f64>,

    /// `direction · diag(spacing)`.
    to_physical: Matrix3<f64>,

    /// `to_physical` 的逆.
    to_index: Matrix3<f64>,
}

impl Default for Geometry {
    #[inline]
    fn default() -> Self {
        Self {
            spacing: Vector3::repeat(1.0),
            origin: Point3::origin(),
            direction: Matrix3::identity(),
            to_physical: Matrix3::identity(),
            to_index: Matrix3::identity(),
        }
    }
}

impl Geometry {
    /// 构建几何信息.
    ///
    /// `spacing` 必须为正的有限值, `direction` 必须可逆, 否则返回 `Err`.
    pub fn new(spacing: [f64; 3], origin: [f64; 3], direction: Matrix3<f64>) -> Result<Self> {
        if spacing.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(BerryError::config(format!(
                "spacing must be positive, got {spacing:?}"
            )));
        }
        if origin.iter().any(|o| !o.is_finite()) {
            return Err(BerryError::config(format!(
                "origin must be finite, got {origin:?}"
            )));
        }
        let spacing = Vector3::from(spacing);
        let to_physical = direction * Matrix3::from_diagonal(&spacing);
        let to_index = to_physical.try_inverse().ok_or_else(|| {
            BerryError::config(format!("direction matrix is singular: {direction}"))
        })?;
        Ok(Self {
            spacing,
            origin: Point3::from(origin),
            direction,
            to_physical,
            to_index,
        })
    }

    /// 单位方向, 零原点, 给定间距.
    #[inline]
    pub fn with_spacing(spacing: [f64; 3]) -> Result<Self> {
        Self::new(spacing, [0.0; 3], Matrix3::identity())
    }

    /// 体素间距 `(x, y, z)`.
    #[inline]
    pub fn spacing(&self) -> [f64; 3] {
        self.spacing.into()
    }

    /// 索引 `(0, 0, 0)` 的物理坐标.
    #[inline]
    pub fn origin(&self) -> Point3<f64> {
        self.origin
    }

    /// 方向矩阵. 每一列是一个索引轴在物理空间中的方向.
    #[inline]
    pub fn direction(&self) -> &Matrix3<f64> {
        &self.direction
    }

    /// 单个体素的体积.
    #[inline]
    pub fn voxel_volume(&self) -> f64 {
        self.spacing.iter().product()
    }

    /// 连续索引 `(x, y, z)` 对应的物理坐标.
    #[inline]
    pub fn index_to_physical(&self, index: &Vector3<f64>) -> Point3<f64> {
        self.origin + self.to_physical * index
    }

    /// 物理坐标对应的连续索引 `(x, y, z)`.
    #[inline]
    pub fn physical_to_index(&self, point: &Point3<f64>) -> Vector3<f64> {
        self.to_index * (point - self.origin)
    }

    /// 以新的间距和原点构建, 方向不变.
    pub(crate) fn resampled(&self, spacing: [f64; 3], origin: Point3<f64>) -> Result<Self> {
        Self::new(spacing, origin.into(), self.direction)
    }
}
