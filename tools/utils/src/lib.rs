//! 命令行工具依赖的通用组件.

use std::process::ExitCode;

use clap::Args;
use grain_berry::{BerryError, ErrorKind};
use log::LevelFilter;
use simple_logger::SimpleLogger;

pub mod args;
pub mod report;

pub use args::{BitDepth, Dimension};

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

/// 简单分隔线.
#[inline]
pub fn sep_to<W: std::io::Write>(mut w: W) -> std::io::Result<()> {
    writeln!(&mut w, "{SEP}")
}

/// 日志级别参数, 各工具通过 `#[command(flatten)]` 共用.
#[derive(Args, Debug, Clone, Copy)]
pub struct Verbosity {
    /// 输出更多日志, 可重复 (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// 只输出警告与错误.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

impl Verbosity {
    /// 对应的日志级别.
    pub fn level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Warn;
        }
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// 初始化日志. 环境变量 `RUST_LOG` 优先于命令行参数.
    pub fn init_logger(&self) {
        // 重复初始化只会失败, 不影响继续运行.
        if let Err(e) = SimpleLogger::new().with_level(self.level()).env().init() {
            eprintln!("logger already initialized: {e}");
        }
    }
}

/// 运行 `f`, 把错误打印到标准错误并转为退出码 1.
///
/// 参数解析错误由 clap 处理, 退出码为 2.
pub fn run_main<F>(f: F) -> ExitCode
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match f() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let kind = match e.downcast_ref::<BerryError>().map(BerryError::kind) {
                Some(ErrorKind::Argument) => "invalid argument",
                Some(ErrorKind::Io) => "I/O error",
                Some(ErrorKind::Domain) => "invalid data",
                None => "error",
            };
            eprintln!("{kind}: {e:#}");
            ExitCode::FAILURE
        }
    }
}
