//! 三维相似变换.
//!
//! 变换把点 `p` 映射为 `c + s · R · (p - c) + t`, 其中 `R` 由单位四元数 (versor) 给出,
//! `c` 为旋转/缩放中心, `t` 为平移, `s` 为各向同性缩放.
//!
//! 优化器看到的是扁平的 7 参数向量 `[qx, qy, qz, tx, ty, tz, s]`,
//! versor 的实部由单位模长隐含给出.

use nalgebra::{Matrix3, Point3, Quaternion, Unit, UnitQuaternion, Vector3};

use crate::{BerryError, Result};

#[cfg(feature = "serde")]
mod record;

#[cfg(feature = "serde")]
pub use record::{load_transform, save_transform, TransformRecord};

/// 参数个数.
pub const N_PARAMETERS: usize = 7;

/// 扁平参数向量 `[qx, qy, qz, tx, ty, tz, s]`.
pub type Parameters = [f64; N_PARAMETERS];

/// 旋转轴模长低于该值视为退化.
const AXIS_EPSILON: f64 = 1e-12;

/// 三维相似变换.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Similarity3d {
    versor: UnitQuaternion<f64>,
    translation: Vector3<f64>,
    scale: f64,
    center: Point3<f64>,
}

impl Default for Similarity3d {
    #[inline]
    fn default() -> Self {
        Self::identity()
    }
}

impl Similarity3d {
    /// 恒等变换, 中心位于原点.
    #[inline]
    pub fn identity() -> Self {
        Self {
            versor: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
            scale: 1.0,
            center: Point3::origin(),
        }
    }

    /// 以 `axis` 为轴旋转 `angle` 弧度. `axis` 不必是单位向量, 但模长不能接近 0.
    pub fn set_rotation(&mut self, axis: &Vector3<f64>, angle: f64) -> Result<()> {
        let norm = axis.norm();
        if !(norm > AXIS_EPSILON) || !angle.is_finite() {
            return Err(BerryError::InvalidAxis);
        }
        let axis = Unit::new_unchecked(axis / norm);
        self.versor = UnitQuaternion::from_axis_angle(&axis, angle);
        Ok(())
    }

    /// 依次绕 x, y, z 轴旋转给定角度 (单位: 度).
    pub fn set_rotation_degrees(&mut self, [rx, ry, rz]: [f64; 3]) {
        let q = |axis: Unit<Vector3<f64>>, deg: f64| UnitQuaternion::from_axis_angle(&axis, deg.to_radians());
        self.versor = q(Vector3::z_axis(), rz) * q(Vector3::y_axis(), ry) * q(Vector3::x_axis(), rx);
    }

    /// 直接设置 versor.
    #[inline]
    pub fn set_versor(&mut self, versor: UnitQuaternion<f64>) {
        self.versor = versor;
    }

    /// 设置平移.
    #[inline]
    pub fn set_translation(&mut self, translation: Vector3<f64>) {
        self.translation = translation;
    }

    /// 设置缩放. `scale` 必须为正的有限值.
    pub fn set_scale(&mut self, scale: f64) -> Result<()> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(BerryError::InvalidScale(scale));
        }
        self.scale = scale;
        Ok(())
    }

    /// 设置旋转与缩放中心. 中心不属于优化参数.
    #[inline]
    pub fn set_center(&mut self, center: Point3<f64>) {
        self.center = center;
    }

    /// versor.
    #[inline]
    pub fn versor(&self) -> &UnitQuaternion<f64> {
        &self.versor
    }

    /// 平移.
    #[inline]
    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    /// 缩放.
    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// 中心.
    #[inline]
    pub fn center(&self) -> &Point3<f64> {
        &self.center
    }

    /// 旋转矩阵 `R`.
    #[inline]
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.versor.to_rotation_matrix().into_inner()
    }

    /// 等价仿射映射的线性部分 `s · R`.
    #[inline]
    pub fn matrix(&self) -> Matrix3<f64> {
        self.rotation_matrix() * self.scale
    }

    /// 等价仿射映射的偏移, 满足 `T(p) = matrix · p + offset`.
    pub fn offset(&self) -> Vector3<f64> {
        let c = self.center.coords;
        self.translation + c - self.matrix() * c
    }

    /// 变换一个点.
    #[inline]
    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        self.center + self.versor * (p - self.center) * self.scale + self.translation
    }

    /// 扁平参数. versor 取实部非负的代表.
    pub fn parameters(&self) -> Parameters {
        let q = self.versor.quaternion();
        let sign = if q.w < 0.0 { -1.0 } else { 1.0 };
        let t = &self.translation;
        [
            sign * q.i,
            sign * q.j,
            sign * q.k,
            t.x,
            t.y,
            t.z,
            self.scale,
        ]
    }

    /// 由扁平参数设置旋转, 平移和缩放. 中心保持不变.
    ///
    /// versor 向量部分模长大于 1 时返回 `Err(DegenerateVersor)`,
    /// 缩放非正时返回 `Err(InvalidScale)`. 出错时 `self` 不变.
    pub fn set_parameters(&mut self, p: &Parameters) -> Result<()> {
        let v = Vector3::new(p[0], p[1], p[2]);
        let n2 = v.norm_squared();
        if !n2.is_finite() || n2 > 1.0 + 1e-12 {
            return Err(BerryError::DegenerateVersor(n2.sqrt()));
        }
        if !(p[6].is_finite() && p[6] > 0.0) {
            return Err(BerryError::InvalidScale(p[6]));
        }
        let w = (1.0 - n2).max(0.0).sqrt();
        self.versor = UnitQuaternion::from_quaternion(Quaternion::new(w, v.x, v.y, v.z));
        self.translation = Vector3::new(p[3], p[4], p[5]);
        self.scale = p[6];
        Ok(())
    }

    /// 按优化器步长更新参数.
    ///
    /// 旋转部分把 `step[0..3]` 视为 "轴 × 角度", 以 versor 乘法叠加到当前旋转上,
    /// 因此旋转始终保持单位模长. 平移与缩放直接相加.
    /// 缩放变为非正时返回 `Err(InvalidScale)`, 此时 `self` 不变.
    pub fn update_parameters(&mut self, step: &Parameters) -> Result<()> {
        let scale = self.scale + step[6];
        if !(scale.is_finite() && scale > 0.0) {
            return Err(BerryError::InvalidScale(scale));
        }
        let axis = Vector3::new(step[0], step[1], step[2]);
        let angle = axis.norm();
        if angle > 0.0 {
            let increment = UnitQuaternion::from_axis_angle(&Unit::new_unchecked(axis / angle), angle);
            self.versor = self.versor * increment;
        }
        self.translation += Vector3::new(step[3], step[4], step[5]);
        self.scale = scale;
        Ok(())
    }

    /// 逆变换. 中心保持不变.
    pub fn inverse(&self) -> Self {
        let versor = self.versor.inverse();
        let scale = 1.0 / self.scale;
        Self {
            versor,
            translation: -(versor * self.translation) * scale,
            scale,
            center: self.center,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn point_eq(a: &Point3<f64>, b: &Point3<f64>, tol: f64) -> bool {
        (a - b).norm() < tol
    }

    fn sample_points() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 3.0),
            Point3::new(-7.5, 0.25, 100.0),
            Point3::new(1e3, -1e3, 5.0),
        ]
    }

    #[test]
    fn test_identity() {
        let t = Similarity3d::identity();
        for p in sample_points() {
            assert_eq!(t.transform_point(&p), p);
        }
        assert_eq!(t.parameters(), [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_invalid_axis_and_scale() {
        let mut t = Similarity3d::identity();
        assert!(matches!(
            t.set_rotation(&Vector3::new(0.0, 0.0, 1e-14), 1.0),
            Err(BerryError::InvalidAxis)
        ));
        assert!(matches!(t.set_scale(0.0), Err(BerryError::InvalidScale(_))));
        assert!(matches!(t.set_scale(-2.0), Err(BerryError::InvalidScale(_))));
        assert!(matches!(
            t.set_parameters(&[0.9, 0.9, 0.0, 0.0, 0.0, 0.0, 1.0]),
            Err(BerryError::DegenerateVersor(_))
        ));
        assert_eq!(t, Similarity3d::identity());
    }

    /// 绕 z 轴旋转 90 度, 中心 (1, 1, 0).
    #[test]
    fn test_rotation_about_center() {
        let mut t = Similarity3d::identity();
        t.set_rotation(&Vector3::new(0.0, 0.0, 2.0), PI / 2.0).unwrap();
        t.set_center(Point3::new(1.0, 1.0, 0.0));
        let p = t.transform_point(&Point3::new(2.0, 1.0, 5.0));
        assert!(point_eq(&p, &Point3::new(1.0, 2.0, 5.0), 1e-12));

        t.set_scale(2.0).unwrap();
        t.set_translation(Vector3::new(0.0, 0.0, 1.0));
        let p = t.transform_point(&Point3::new(2.0, 1.0, 5.0));
        assert!(point_eq(&p, &Point3::new(1.0, 3.0, 11.0), 1e-12));
    }

    /// `T⁻¹(T(p)) == p` 对若干轴角组合成立.
    #[test]
    fn test_inverse_round_trip() {
        let axes = [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 1.0),
            Vector3::new(-0.3, 0.2, 0.9),
        ];
        let angles = [0.0, 0.3, -1.2, PI, 2.5 * PI];
        for axis in &axes {
            for &angle in &angles {
                let mut t = Similarity3d::identity();
                t.set_rotation(axis, angle).unwrap();
                t.set_translation(Vector3::new(3.0, -2.0, 0.5));
                t.set_scale(1.7).unwrap();
                t.set_center(Point3::new(10.0, 20.0, -5.0));
                let inv = t.inverse();
                for p in sample_points() {
                    let q = inv.transform_point(&t.transform_point(&p));
                    assert!(point_eq(&q, &p, 1e-9 * (1.0 + p.coords.norm())));
                }
            }
        }
    }

    /// 矩阵 + 偏移与直接变换一致.
    #[test]
    fn test_matrix_offset() {
        let mut t = Similarity3d::identity();
        t.set_rotation(&Vector3::new(1.0, 1.0, 0.0), 0.7).unwrap();
        t.set_translation(Vector3::new(-1.0, 4.0, 2.0));
        t.set_scale(0.8).unwrap();
        t.set_center(Point3::new(3.0, 3.0, 3.0));
        let (m, o) = (t.matrix(), t.offset());
        for p in sample_points() {
            let q = Point3::from(m * p.coords + o);
            assert!(point_eq(&q, &t.transform_point(&p), 1e-9 * (1.0 + p.coords.norm())));
        }
    }

    #[test]
    fn test_parameters_round_trip() {
        let mut t = Similarity3d::identity();
        t.set_rotation(&Vector3::new(0.2, -0.4, 1.0), 2.0).unwrap();
        t.set_translation(Vector3::new(1.0, 2.0, 3.0));
        t.set_scale(1.25).unwrap();
        let p = t.parameters();

        let mut u = Similarity3d::identity();
        u.set_parameters(&p).unwrap();
        let q = u.parameters();
        for i in 0..N_PARAMETERS {
            assert!((p[i] - q[i]).abs() < 1e-12);
        }
        for x in sample_points() {
            assert!(point_eq(&t.transform_point(&x), &u.transform_point(&x), 1e-9 * (1.0 + x.coords.norm())));
        }
    }

    /// 沿旋转轴的步长等价于追加同轴旋转.
    #[test]
    fn test_update_parameters() {
        let mut t = Similarity3d::identity();
        t.set_rotation(&Vector3::z(), 0.5).unwrap();
        t.update_parameters(&[0.0, 0.0, 0.25, 1.0, 0.0, 0.0, 0.5]).unwrap();

        let mut expect = Similarity3d::identity();
        expect.set_rotation(&Vector3::z(), 0.75).unwrap();
        expect.set_translation(Vector3::new(1.0, 0.0, 0.0));
        expect.set_scale(1.5).unwrap();
        for p in sample_points() {
            assert!(point_eq(&t.transform_point(&p), &expect.transform_point(&p), 1e-9 * (1.0 + p.coords.norm())));
        }

        assert!(t.update_parameters(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -1.5]).is_err());
        assert!((t.scale() - 1.5).abs() < 1e-15);
    }

    #[test]
    fn test_euler_degrees() {
        let mut t = Similarity3d::identity();
        t.set_rotation_degrees([90.0, 0.0, 0.0]);
        let p = t.transform_point(&Point3::new(0.0, 1.0, 0.0));
        assert!(point_eq(&p, &Point3::new(0.0, 0.0, 1.0), 1e-12));

        t.set_rotation_degrees([0.0, 0.0, 90.0]);
        let p = t.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert!(point_eq(&p, &Point3::new(0.0, 1.0, 0.0), 1e-12));
    }
}
