//! 运行时错误.

use std::path::PathBuf;

use crate::Idx3d;

/// 错误大类. 命令行工具据此决定如何向用户报告.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// 参数或配置不合法.
    Argument,

    /// 文件缺失, 不可写, 编解码失败.
    Io,

    /// 数据本身不满足算法前提, 例如维度不符, 变换参数非法, 代价非有限值.
    Domain,
}

/// 本 crate 的统一错误类型.
#[derive(Debug, thiserror::Error)]
pub enum BerryError {
    /// 索引越界. `index` 按 `(z, h, w)` 给出, 可能为负.
    #[error("index {index:?} is out of bounds for volume of shape {shape:?}")]
    OutOfBounds {
        /// 越界的索引.
        index: [i64; 3],
        /// 体数据形状.
        shape: Idx3d,
    },

    /// 旋转轴模长接近 0.
    #[error("rotation axis has near-zero norm")]
    InvalidAxis,

    /// 缩放系数必须为正的有限值.
    #[error("scale must be positive and finite, got {0}")]
    InvalidScale(f64),

    /// versor 向量部分模长大于 1, 无法补全实部.
    #[error("versor vector part has norm {0}, which exceeds 1")]
    DegenerateVersor(f64),

    /// 度量返回 NaN 或无穷.
    #[error("metric value is not finite at iteration {iteration}")]
    NonFiniteCost {
        /// 出错时的迭代序号.
        iteration: usize,
    },

    /// 维度不符.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// 期望维度.
        expected: usize,
        /// 实际维度.
        actual: usize,
    },

    /// 两个点集长度不一致, 无法按下标配对.
    #[error("point sets differ in length: fixed has {fixed}, moving has {moving}")]
    PointCountMismatch {
        /// 固定点集长度.
        fixed: usize,
        /// 浮动点集长度.
        moving: usize,
    },

    /// 形状不符.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// 期望形状.
        expected: Idx3d,
        /// 实际形状.
        actual: Idx3d,
    },

    /// 点集文本格式错误.
    #[error("malformed point set at line {line}: {reason}")]
    MalformedPointSet {
        /// 出错行号, 从 1 开始.
        line: usize,
        /// 原因.
        reason: String,
    },

    /// 配置不合法.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// 序列文件名模式不合法.
    #[error("invalid series pattern `{0}`")]
    InvalidPattern(String),

    /// 文件不存在.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// 无法根据扩展名识别格式.
    #[error("unsupported format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// 路径存在但不是目录.
    #[error("`{}` exists but is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// 写文件失败.
    #[error("failed to write `{}`", path.display())]
    WriteFailed {
        /// 目标路径.
        path: PathBuf,
        /// 底层错误.
        #[source]
        source: Box<BerryError>,
    },

    /// 底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// nifti 读写错误.
    #[error(transparent)]
    Nifti(#[from] nifti::NiftiError),

    /// 栅格图像编解码错误.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// npz 读取错误.
    #[error(transparent)]
    ReadNpz(#[from] ndarray_npy::ReadNpzError),

    /// npz 写入错误.
    #[error(transparent)]
    WriteNpz(#[from] ndarray_npy::WriteNpzError),

    /// npy 读取错误.
    #[error(transparent)]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),

    /// npy 写入错误.
    #[error(transparent)]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),

    /// 数组形状错误.
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    /// 变换记录编解码错误.
    #[cfg(feature = "serde")]
    #[error(transparent)]
    Bincode(#[from] bincode::Error),
}

/// `Result` 别名.
pub type Result<T> = std::result::Result<T, BerryError>;

impl BerryError {
    /// 构造 [`BerryError::InvalidConfig`].
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// 将底层错误包装为写失败.
    pub(crate) fn write_failed(path: impl Into<PathBuf>, source: BerryError) -> Self {
        Self::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// 错误大类.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) | Self::InvalidPattern(_) => ErrorKind::Argument,

            Self::FileNotFound(_)
            | Self::UnsupportedFormat(_)
            | Self::NotADirectory(_)
            | Self::WriteFailed { .. }
            | Self::Io(_)
            | Self::Nifti(_)
            | Self::Image(_)
            | Self::ReadNpz(_)
            | Self::WriteNpz(_)
            | Self::ReadNpy(_)
            | Self::WriteNpy(_) => ErrorKind::Io,

            #[cfg(feature = "serde")]
            Self::Bincode(_) => ErrorKind::Io,

            Self::OutOfBounds { .. }
            | Self::InvalidAxis
            | Self::InvalidScale(_)
            | Self::DegenerateVersor(_)
            | Self::NonFiniteCost { .. }
            | Self::DimensionMismatch { .. }
            | Self::PointCountMismatch { .. }
            | Self::ShapeMismatch { .. }
            | Self::MalformedPointSet { .. }
            | Self::Shape(_) => ErrorKind::Domain,
        }
    }
}
