//! 整数倍降采样.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use grain_berry::prelude::*;
use utils::{args, BitDepth, Verbosity};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// 降采样倍数.
    #[arg(value_parser = args::positive_factor)]
    factor: usize,

    /// 输入体数据.
    input: PathBuf,

    /// 输出体数据.
    output: PathBuf,

    /// 体素位深, 8 或 16.
    #[arg(long, default_value = "8", value_parser = args::bit_depth)]
    bit_depth: BitDepth,

    #[command(flatten)]
    verbosity: Verbosity,
}

fn run<T: Sample>(cli: &Cli) -> anyhow::Result<()> {
    let volume: Volume<T> = read_volume(&cli.input)?;
    let out = shrink_uniform(&volume, cli.factor)?;
    utils::sep();
    println!("Original size: {:?}", volume.size());
    println!("New size: {:?}", out.size());
    let (lo, hi) = out.physical_bounds();
    println!("Physical extent: [{:.3}, {:.3}, {:.3}] - [{:.3}, {:.3}, {:.3}]", lo.x, lo.y, lo.z, hi.x, hi.y, hi.z);
    utils::sep();
    write_volume(&cli.output, &out)?;
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
