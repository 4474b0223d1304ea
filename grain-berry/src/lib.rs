#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供三维体数据 (及单层二维图像) 的刚性/相似变换配准,
//! 以及基于形态学重建 + 连通域标记的砂粒质心提取.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 体数据统一按 `(z, h, w)` 索引, 二维图像视为 `z` 方向只有一层的体数据.
//!   物理坐标统一按 `(x, y, z)` 组织, 其中 `x` 对应 `w`, `y` 对应 `h`.
//! 2. 可恢复的错误 (I/O, 参数, 数据域) 以 [`BerryError`] 返回;
//!   只有 API 被误用时程序才会 panic.
//! 3. 优化器未收敛 **不是** 错误, 其结果仍然可用, 见 [`StopCondition`].
//!
//! # 开发计划
//!
//! ### 体数据模型 ✅
//!
//! 尺寸, 体素间距, 原点, 方向矩阵; 索引与物理坐标的相互转换; 线性插值.
//!
//! 实现位于 `grain-berry/src/data`.
//!
//! ### 相似变换 ✅
//!
//! 以 versor 存储旋转, 7 参数 `[qx, qy, qz, tx, ty, tz, s]` 扁平表示.
//!
//! 实现位于 `grain-berry/src/transform`.
//!
//! ### 度量 + 正则步长梯度下降 + 配准驱动 ✅
//!
//! 1. 灰度均方差度量 (越界采样点直接跳过) 与点集欧氏距离度量. ✅
//! 2. 梯度按参数尺度归一化, 方向反转时步长松弛, 保留最优参数. ✅
//! 3. 几何中心 / 灰度矩初始化, 多分辨率金字塔. ✅
//!
//! 实现位于 `grain-berry/src/registration`.
//!
//! ### 砂粒分割 ✅
//!
//! h-minima / h-convex 重建, 重标度, 阈值化, 连通域标记, 质心与体素数统计, 小目标过滤.
//!
//! 实现位于 `grain-berry/src/morph`.
//!
//! ### 外部 I/O ✅
//!
//! 1. nifti / npz / 二维栅格图像读写, 保留几何信息. ✅
//! 2. 序列文件名生成与分块 (stream division) 读写. ✅
//! 3. 点集文本格式. ✅
//!
//! 实现位于 `grain-berry/src/io`.
//!
//! ### 滤波器 ✅
//!
//! 位深转换, 重标度, sigmoid, 二值阈值, 降采样, 高斯平滑, 重采样.
//!
//! 实现位于 `grain-berry/src/filter`.

/// 二维索引 `(h, w)`.
pub type Idx2d = (usize, usize);

/// 三维索引 `(z, h, w)`, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 三维体数据基础数据结构.
mod data;

pub use data::{Geometry, IntensityWindow, Sample, Volume};

pub mod consts;

mod error;

pub use error::{BerryError, ErrorKind, Result};

pub mod filter;

pub mod io;

pub mod morph;

pub mod registration;

pub use registration::StopCondition;

pub mod transform;

pub mod prelude;
