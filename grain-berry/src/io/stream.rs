//! 流式处理的分块规划.
//!
//! 体数据过大时, 按水平切片把 z 轴切分为若干连续块逐块处理.
//! 分块只发生在切片之间, 不会把一张切片拆开.

use std::ops::Range;

use log::debug;
use num::ToPrimitive;

use super::config::RuntimeConfig;

/// z 轴分块方案.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StreamPlan {
    depth: usize,
    divisions: usize,
}

impl StreamPlan {
    /// 为 `depth` 张切片, 共 `bytes` 字节的数据制定分块方案.
    ///
    /// 分块数为 `ceil(bytes * safety / memory)`, 并截断到 `[1, min(max_divisions, depth)]`.
    pub fn new(depth: usize, bytes: u64, config: &RuntimeConfig) -> Self {
        let upper = config.max_divisions.min(depth).max(1);
        let needed = (bytes as f64 * config.safety_coefficient / config.memory_bytes.max(1) as f64)
            .ceil()
            .to_usize()
            .unwrap_or(upper);
        let divisions = needed.clamp(1, upper);
        debug!("stream plan: {depth} slices, {bytes} bytes, {divisions} division(s)");
        Self { depth, divisions }
    }

    /// 按进程全局配置制定方案.
    #[inline]
    pub fn with_global(depth: usize, bytes: u64) -> Self {
        Self::new(depth, bytes, RuntimeConfig::global())
    }

    /// 分块数.
    #[inline]
    pub fn divisions(&self) -> usize {
        self.divisions
    }

    /// 切片总数.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// 按升序给出每块的切片范围. 各块长度至多相差 1, 所有块恰好覆盖 `0..depth`.
    pub fn ranges(&self) -> impl ExactSizeIterator<Item = Range<usize>> + '_ {
        let (q, r) = (self.depth / self.divisions, self.depth % self.divisions);
        (0..self.divisions).map(move |i| {
            let start = i * q + i.min(r);
            let len = q + usize::from(i < r);
            start..start + len
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(memory_bytes: u64) -> RuntimeConfig {
        RuntimeConfig {
            memory_bytes,
            safety_coefficient: 4.0,
            max_divisions: 32,
        }
    }

    #[test]
    fn test_divisions() {
        assert_eq!(StreamPlan::new(100, 1000, &config(1 << 30)).divisions(), 1);
        // 1000 * 4 / 1000 = 4.
        assert_eq!(StreamPlan::new(100, 1000, &config(1000)).divisions(), 4);
        assert_eq!(StreamPlan::new(100, 1001, &config(1000)).divisions(), 5);
        // 受限于 max_divisions 与 depth.
        assert_eq!(StreamPlan::new(100, 1 << 40, &config(1)).divisions(), 32);
        assert_eq!(StreamPlan::new(3, 1 << 40, &config(1)).divisions(), 3);
        assert_eq!(StreamPlan::new(0, 100, &config(1)).divisions(), 1);
    }

    #[test]
    fn test_ranges_cover_depth() {
        let plan = StreamPlan::new(10, 1000, &config(1000));
        let ranges: Vec<_> = plan.ranges().collect();
        assert_eq!(ranges, vec![0..3, 3..6, 6..8, 8..10]);

        let plan = StreamPlan::new(0, 0, &config(1000));
        assert_eq!(plan.ranges().collect::<Vec<_>>(), vec![0..0]);
    }
}
