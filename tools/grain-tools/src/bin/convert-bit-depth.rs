//! 在 8 位与 16 位之间转换体数据或二维图像.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use grain_berry::prelude::*;
use log::info;
use utils::{args, BitDepth, Verbosity};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// 输入文件, 位深与 `--to` 相反.
    input: PathBuf,

    /// 输出文件.
    output: PathBuf,

    /// 目标位深, 8 或 16.
    #[arg(long, value_parser = args::bit_depth)]
    to: BitDepth,

    /// 把数据的实际 `[min, max]` 拉伸到输出的整个范围.
    #[arg(long)]
    stretch: bool,

    #[command(flatten)]
    verbosity: Verbosity,
}

fn convert<T: Sample, U: Sample>(cli: &Cli) -> anyhow::Result<()> {
    let mode = if cli.stretch {
        RescaleMode::MinMax
    } else {
        RescaleMode::FullRange
    };
    let volume: Volume<T> = read_volume(&cli.input)?;
    info!("{} bit -> {} bit, {mode:?}", T::BITS, U::BITS);
    let out: Volume<U> = convert_bit_depth(&volume, mode);
    write_volume(&cli.output, &out)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.verbosity.init_logger();
    utils::run_main(|| match cli.to {
        BitDepth::Eight => convert::<u16, u8>(&cli),
        BitDepth::Sixteen => convert::<u8, u16>(&cli),
    })
}
