//! 通用常量.

/// 二值掩膜像素值.
pub mod gray {
    /// 背景像素值.
    pub const BACKGROUND: u8 = 0;

    /// 前景像素值.
    pub const FOREGROUND: u8 = 1;

    /// 像素是否是前景?
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        p != BACKGROUND
    }

    /// 像素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, BACKGROUND)
    }
}

/// 优化器默认配置. 与原体数据配准工具一致.
pub mod optim {
    /// 初始步长.
    pub const LEARNING_RATE: f64 = 0.2;

    /// 最小步长, 低于该值即停止.
    pub const MINIMUM_STEP_LENGTH: f64 = 1e-3;

    /// 最大迭代次数.
    pub const NUMBER_OF_ITERATIONS: usize = 200;

    /// 平移参数尺度.
    pub const TRANSLATION_SCALE: f64 = 1.0 / 1000.0;

    /// 方向反转时的步长松弛系数.
    pub const RELAXATION_FACTOR: f64 = 0.5;

    /// 同向且代价下降时的步长增长系数. 步长不会超过初始步长.
    pub const STEP_GROWTH: f64 = 1.1;

    /// 梯度模长容差.
    pub const GRADIENT_TOLERANCE: f64 = 1e-4;

    /// 默认参数尺度 `[qx, qy, qz, tx, ty, tz, s]`.
    pub const SCALES: [f64; 7] = [
        1.0,
        1.0,
        1.0,
        TRANSLATION_SCALE,
        TRANSLATION_SCALE,
        TRANSLATION_SCALE,
        1.0,
    ];
}

/// 连通域标记中背景的标签.
pub const BACKGROUND_LABEL: u32 = 0;

/// 默认最小目标体素数. 单体素目标会被丢弃.
pub const MIN_OBJECT_SIZE: usize = 2;

/// 默认序列文件名模式.
pub const SERIES_PATTERN: &str = "%04d.tif";

/// 分块读写的默认最大块数.
pub const MAX_STREAM_DIVISIONS: usize = 32;

/// 分块读写的默认内存安全系数.
pub const SAFETY_COEFFICIENT: f64 = 4.0;

/// 无法探测可用内存时的兜底值, 4 GiB.
pub const FALLBACK_MEMORY_BYTES: u64 = 4 << 30;
