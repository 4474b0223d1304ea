//! 把体数据逐层写为图像序列.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use grain_berry::consts::SERIES_PATTERN;
use grain_berry::prelude::*;
use utils::{args, BitDepth, Verbosity};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// 输入体数据.
    input: PathBuf,

    /// 输出目录, 不存在时创建.
    output_dir: PathBuf,

    /// 体素位深, 8 或 16.
    #[arg(value_parser = args::bit_depth)]
    bit_depth: BitDepth,

    /// printf 风格的文件名模式.
    #[arg(long, default_value = SERIES_PATTERN)]
    pattern: String,

    /// 首张切片的序号.
    #[arg(long, default_value_t = 0)]
    start: i64,

    #[command(flatten)]
    verbosity: Verbosity,
}

fn run<T: Sample>(cli: &Cli) -> anyhow::Result<()> {
    export_series::<T, _, _>(&cli.input, &cli.output_dir, &cli.pattern, cli.start)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.verbosity.init_logger();
    utils::run_main(|| match cli.bit_depth {
        BitDepth::Eight => run::<u8>(&cli),
        BitDepth::Sixteen => run::<u16>(&cli),
    })
}
