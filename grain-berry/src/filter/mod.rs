//! 体数据滤波器. 每个滤波器都是 `&Volume -> Volume` 的纯函数.

mod intensity;
mod resample;
mod shrink;
mod smooth;

pub use intensity::{binary_threshold, convert_bit_depth, rescale_intensity, sigmoid, RescaleMode};
pub use resample::{resample, resample_like, rotate_about_center};
pub use shrink::{shrink, shrink_uniform};
pub use smooth::gaussian_smooth;
