use std::ops::{Index, IndexMut};

use nalgebra::{Point3, Vector3};
use ndarray::{Array3, ArrayView2, ArrayView3, ArrayViewMut3, Axis};

use crate::{BerryError, Idx2d, Idx3d, Result};

mod geometry;
mod sample;
pub mod window;

pub use geometry::Geometry;
pub use sample::Sample;
pub use window::IntensityWindow;

/// 三维体数据, 包括体素数组和物理空间元信息.
///
/// 数据按 `(z, h, w)` 组织, 二维图像即 `z` 方向只有一层的体数据.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume<T> {
    data: Array3<T>,
    geometry: Geometry,
}

/// `(z, h, w)` 索引 -> `(x, y, z)` 连续索引.
#[inline]
pub(crate) fn idx_to_xyz((z, h, w): Idx3d) -> Vector3<f64> {
    Vector3::new(w as f64, h as f64, z as f64)
}

impl<T> Index<Idx3d> for Volume<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl<T> IndexMut<Idx3d> for Volume<T> {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl<T: Sample> Volume<T> {
    /// 创建形状为 `shape` 的全零体数据.
    pub fn new(shape: Idx3d, geometry: Geometry) -> Self {
        Self {
            data: Array3::default(shape),
            geometry,
        }
    }

    /// 由 `(z, h, w)` 组织的数组直接创建.
    #[inline]
    pub fn from_array(data: Array3<T>, geometry: Geometry) -> Self {
        Self { data, geometry }
    }

    /// 由 `(h, w)` 组织的二维数组创建单层体数据.
    pub fn from_plane(data: ndarray::Array2<T>, geometry: Geometry) -> Self {
        Self {
            data: data.insert_axis(Axis(0)),
            geometry,
        }
    }

    /// 数据形状 `(z, h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 每个轴的体素个数 `(x, y, z)`, 即 `(w, h, z)`.
    #[inline]
    pub fn size(&self) -> [usize; 3] {
        let (z, h, w) = self.shape();
        [w, h, z]
    }

    /// 单层切片形状 `(h, w)`.
    #[inline]
    pub fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 水平切片个数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 体素总数.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否不含任何体素.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 是否为单层 (二维) 数据.
    #[inline]
    pub fn is_planar(&self) -> bool {
        self.len_z() == 1
    }

    /// 数据的有效维度: 单层为 2, 否则为 3.
    #[inline]
    pub fn dimension(&self) -> usize {
        if self.is_planar() {
            2
        } else {
            3
        }
    }

    /// 检查索引是否合法.
    #[inline]
    pub fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 读取体素. 越界时返回 `Err(OutOfBounds)`.
    pub fn get(&self, index: Idx3d) -> Result<T> {
        self.data
            .get(index)
            .copied()
            .ok_or_else(|| self.out_of_bounds(index))
    }

    /// 写入体素. 越界时返回 `Err(OutOfBounds)`.
    pub fn set(&mut self, index: Idx3d, value: T) -> Result<()> {
        if !self.check(&index) {
            return Err(self.out_of_bounds(index));
        }
        self.data[index] = value;
        Ok(())
    }

    fn out_of_bounds(&self, (z, h, w): Idx3d) -> BerryError {
        BerryError::OutOfBounds {
            index: [z as i64, h as i64, w as i64],
            shape: self.shape(),
        }
    }

    /// 几何信息.
    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// 替换几何信息.
    #[inline]
    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.geometry = geometry;
    }

    /// 整数索引对应的物理坐标. 越界时返回 `Err(OutOfBounds)`.
    pub fn index_to_physical(&self, index: Idx3d) -> Result<Point3<f64>> {
        if !self.check(&index) {
            return Err(self.out_of_bounds(index));
        }
        Ok(self.geometry.index_to_physical(&idx_to_xyz(index)))
    }

    /// 物理坐标最近的整数索引. 落在数据范围外时返回 `Err(OutOfBounds)`.
    pub fn physical_to_index(&self, point: &Point3<f64>) -> Result<Idx3d> {
        let c = self.geometry.physical_to_index(point);
        let [x, y, z] = [c.x, c.y, c.z].map(|v| v.round() as i64);
        let [w, h, d] = self.size().map(|n| n as i64);
        if (0..w).contains(&x) && (0..h).contains(&y) && (0..d).contains(&z) {
            Ok((z as usize, y as usize, x as usize))
        } else {
            Err(BerryError::OutOfBounds {
                index: [z, y, x],
                shape: self.shape(),
            })
        }
    }

    /// 物理坐标对应的连续索引 `(x, y, z)`.
    #[inline]
    pub fn physical_to_continuous_index(&self, point: &Point3<f64>) -> Vector3<f64> {
        self.geometry.physical_to_index(point)
    }

    /// 几何中心的物理坐标, 即连续索引 `(size - 1) / 2` 处.
    pub fn geometric_center(&self) -> Point3<f64> {
        let [w, h, z] = self.size().map(|n| (n.max(1) - 1) as f64 / 2.0);
        self.geometry.index_to_physical(&Vector3::new(w, h, z))
    }

    /// 物理空间包围盒 `(min, max)`, 由网格 8 个角点的物理坐标逐分量取极值得到.
    pub fn physical_bounds(&self) -> (Point3<f64>, Point3<f64>) {
        let [w, h, z] = self.size().map(|n| n.max(1) as f64 - 1.0);
        let mut lo = Point3::from(Vector3::repeat(f64::INFINITY));
        let mut hi = Point3::from(Vector3::repeat(f64::NEG_INFINITY));
        for corner in 0..8u8 {
            let pick = |bit: u8, v: f64| if corner >> bit & 1 == 1 { v } else { 0.0 };
            let c = Vector3::new(pick(0, w), pick(1, h), pick(2, z));
            let p = self.geometry.index_to_physical(&c);
            lo = lo.inf(&p);
            hi = hi.sup(&p);
        }
        (lo, hi)
    }

    /// 在连续索引 `c = (x, y, z)` 处线性插值.
    ///
    /// 每个轴的连续索引落在 `[-0.5, n - 0.5)` 内才视为在数据内部, 否则返回 `None`.
    /// 插值邻居在边界处截断.
    pub fn interpolate(&self, c: &Vector3<f64>) -> Option<f64> {
        let size = self.size();
        let mut lo = [0usize; 3];
        let mut hi = [0usize; 3];
        let mut t = [0.0f64; 3];
        for a in 0..3 {
            let n = size[a];
            if n == 0 || !(c[a] >= -0.5 && c[a] < n as f64 - 0.5) {
                return None;
            }
            let base = c[a].floor();
            t[a] = c[a] - base;
            let base = base as i64;
            let last = n as i64 - 1;
            lo[a] = base.clamp(0, last) as usize;
            hi[a] = (base + 1).clamp(0, last) as usize;
        }

        let mut acc = 0.0;
        for corner in 0..8usize {
            let mut weight = 1.0;
            let mut idx = [0usize; 3];
            for a in 0..3 {
                if corner >> a & 1 == 1 {
                    weight *= t[a];
                    idx[a] = hi[a];
                } else {
                    weight *= 1.0 - t[a];
                    idx[a] = lo[a];
                }
            }
            if weight != 0.0 {
                acc += weight * self.data[(idx[2], idx[1], idx[0])].as_f64();
            }
        }
        Some(acc)
    }

    /// 在物理坐标处线性插值. 规则同 [`Volume::interpolate`].
    #[inline]
    pub fn interpolate_physical(&self, point: &Point3<f64>) -> Option<f64> {
        self.interpolate(&self.physical_to_continuous_index(point))
    }

    /// 获取 z 空间的第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ArrayView2<'_, T> {
        self.data.index_axis(Axis(0), z_index)
    }

    /// 获取能按升序迭代水平切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ArrayView2<'_, T>> {
        self.data.axis_iter(Axis(0))
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, T> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut3<'_, T> {
        self.data.view_mut()
    }

    /// 取出底层数组.
    #[inline]
    pub fn into_data(self) -> Array3<T> {
        self.data
    }

    /// 逐体素映射为新类型, 几何信息不变.
    pub fn map<U: Sample, F: Fn(T) -> U>(&self, f: F) -> Volume<U> {
        Volume {
            data: self.data.mapv(f),
            geometry: self.geometry,
        }
    }

    /// 转换为 `f32` 体数据 (不做重标度).
    #[inline]
    pub fn to_f32(&self) -> Volume<f32> {
        self.map(|v| v.as_f64() as f32)
    }

    /// 最小值与最大值. 空数据返回 `None`.
    pub fn min_max(&self) -> Option<(T, T)> {
        let mut it = self.data.iter().copied();
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), v| {
            (
                if v < lo { v } else { lo },
                if v > hi { v } else { hi },
            )
        }))
    }

    /// 以体素值为权重的物理质心. 总权重不为正时返回 `None`.
    pub fn intensity_centroid(&self) -> Option<Point3<f64>> {
        let mut mass = 0.0;
        let mut acc = Vector3::zeros();
        for (pos, v) in self.data.indexed_iter() {
            let v = v.as_f64();
            if v > 0.0 {
                mass += v;
                acc += idx_to_xyz(pos) * v;
            }
        }
        (mass > 0.0).then(|| self.geometry.index_to_physical(&(acc / mass)))
    }
}

/// 邻域查询
impl<T: Sample> Volume<T> {
    /// 获取 `pos` 面相邻的 6 个点的坐标 (单层数据只剩 4 个).
    ///
    /// 在数据范围外的坐标会被过滤掉, 不会包含在返回值中.
    pub fn face_neighbours(&self, (z, h, w): Idx3d) -> Vec<Idx3d> {
        self.check_collect([
            (z.wrapping_sub(1), h, w),
            (z.saturating_add(1), h, w),
            (z, h.wrapping_sub(1), w),
            (z, h.saturating_add(1), w),
            (z, h, w.wrapping_sub(1)),
            (z, h, w.saturating_add(1)),
        ])
    }

    /// 获取 `pos` 周围 26 个点的坐标 (单层数据只剩 8 个).
    ///
    /// 在数据范围外的坐标会被过滤掉, 不会包含在返回值中.
    pub fn full_neighbours(&self, (z, h, w): Idx3d) -> Vec<Idx3d> {
        let mut around = [(0, 0, 0); 26];
        let mut n = 0;
        for dz in -1isize..=1 {
            for dh in -1isize..=1 {
                for dw in -1isize..=1 {
                    if (dz, dh, dw) != (0, 0, 0) {
                        around[n] = (
                            z.wrapping_add_signed(dz),
                            h.wrapping_add_signed(dh),
                            w.wrapping_add_signed(dw),
                        );
                        n += 1;
                    }
                }
            }
        }
        self.check_collect(around)
    }

    /// 收集 `data` 中不越界的索引.
    #[inline]
    fn check_collect<B: FromIterator<Idx3d>, const N: usize>(&self, data: [Idx3d; N]) -> B {
        data.into_iter().filter(|p| self.check(p)).collect()
    }
}
