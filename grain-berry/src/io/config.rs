//! 运行时配置. 进程内只从环境变量读取一次.
//!
//! | 环境变量 | 含义 | 默认值 |
//! |---|---|---|
//! | `GRAIN_BERRY_MEMORY_BYTES` | 可用内存字节数 | `/proc/meminfo` 的 `MemAvailable`, 否则 4 GiB |
//! | `GRAIN_BERRY_SAFETY_COEFFICIENT` | 内存安全系数 | 4.0 |
//! | `GRAIN_BERRY_MAX_DIVISIONS` | 流式处理的最大分块数 | 32 |

use std::env;
use std::fs;
use std::str::FromStr;

use log::warn;
use once_cell::sync::Lazy;

use crate::consts::{FALLBACK_MEMORY_BYTES, MAX_STREAM_DIVISIONS, SAFETY_COEFFICIENT};

/// 可用内存覆盖值.
pub const ENV_MEMORY_BYTES: &str = "GRAIN_BERRY_MEMORY_BYTES";

/// 内存安全系数.
pub const ENV_SAFETY_COEFFICIENT: &str = "GRAIN_BERRY_SAFETY_COEFFICIENT";

/// 最大分块数.
pub const ENV_MAX_DIVISIONS: &str = "GRAIN_BERRY_MAX_DIVISIONS";

static RUNTIME: Lazy<RuntimeConfig> = Lazy::new(RuntimeConfig::from_env);

/// 流式 I/O 的资源预算.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuntimeConfig {
    /// 可用物理内存 (字节).
    pub memory_bytes: u64,

    /// 数据实际占用内存按该系数放大后再与可用内存比较.
    pub safety_coefficient: f64,

    /// 分块数上限.
    pub max_divisions: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            memory_bytes: FALLBACK_MEMORY_BYTES,
            safety_coefficient: SAFETY_COEFFICIENT,
            max_divisions: MAX_STREAM_DIVISIONS,
        }
    }
}

impl RuntimeConfig {
    /// 进程内共享的配置, 首次访问时从环境变量读取.
    #[inline]
    pub fn global() -> &'static RuntimeConfig {
        &RUNTIME
    }

    /// 从环境变量读取. 非法取值会被忽略并记录警告.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok(), meminfo_available)
    }

    fn from_lookup<F, M>(lookup: F, available: M) -> Self
    where
        F: Fn(&str) -> Option<String>,
        M: FnOnce() -> Option<u64>,
    {
        let d = Self::default();
        let memory_bytes = parse_var(&lookup, ENV_MEMORY_BYTES, |v: &u64| *v > 0)
            .or_else(available)
            .unwrap_or(d.memory_bytes);
        let safety_coefficient =
            parse_var(&lookup, ENV_SAFETY_COEFFICIENT, |v: &f64| v.is_finite() && *v >= 1.0)
                .unwrap_or(d.safety_coefficient);
        let max_divisions = parse_var(&lookup, ENV_MAX_DIVISIONS, |v: &usize| *v > 0)
            .unwrap_or(d.max_divisions);
        Self {
            memory_bytes,
            safety_coefficient,
            max_divisions,
        }
    }
}

fn parse_var<T, F, V>(lookup: &F, key: &str, valid: V) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
    V: Fn(&T) -> bool,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) if valid(&v) => Some(v),
        _ => {
            warn!("ignoring invalid value `{raw}` of ${key}");
            None
        }
    }
}

/// `/proc/meminfo` 中的 `MemAvailable`, 单位为字节.
fn meminfo_available() -> Option<u64> {
    parse_meminfo(&fs::read_to_string("/proc/meminfo").ok()?)
}

fn parse_meminfo(text: &str) -> Option<u64> {
    let line = text.lines().find(|l| l.starts_with("MemAvailable:"))?;
    let kib: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    kib.checked_mul(1024)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults_and_overrides() {
        let c = RuntimeConfig::from_lookup(lookup(&[]), || None);
        assert_eq!(c, RuntimeConfig::default());

        let c = RuntimeConfig::from_lookup(lookup(&[]), || Some(1 << 20));
        assert_eq!(c.memory_bytes, 1 << 20);

        let c = RuntimeConfig::from_lookup(
            lookup(&[
                (ENV_MEMORY_BYTES, "1000"),
                (ENV_SAFETY_COEFFICIENT, "2.5"),
                (ENV_MAX_DIVISIONS, "8"),
            ]),
            || Some(1 << 20),
        );
        assert_eq!(c.memory_bytes, 1000);
        assert_eq!(c.safety_coefficient, 2.5);
        assert_eq!(c.max_divisions, 8);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let c = RuntimeConfig::from_lookup(
            lookup(&[
                (ENV_MEMORY_BYTES, "lots"),
                (ENV_SAFETY_COEFFICIENT, "0.5"),
                (ENV_MAX_DIVISIONS, "0"),
            ]),
            || None,
        );
        assert_eq!(c, RuntimeConfig::default());
    }

    #[test]
    fn test_parse_meminfo() {
        let text = "MemTotal:       16318480 kB\nMemFree:         1034104 kB\nMemAvailable:    8157240 kB\n";
        assert_eq!(parse_meminfo(text), Some(8157240 * 1024));
        assert_eq!(parse_meminfo("MemTotal: 1 kB\n"), None);
    }
}
