//! 绕图像中心旋转体数据. 线性插值, 落在输入之外的体素取 0.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use grain_berry::prelude::*;
use log::info;
use utils::{args, BitDepth, Verbosity};

#[derive(Parser, Debug)]
#[command(version, about, allow_negative_numbers = true)]
struct Cli {
    /// 输入体数据.
    input: PathBuf,

    /// 输出体数据.
    output: PathBuf,

    /// 绕 x 轴旋转的角度 (度).
    rot_x: f64,

    /// 绕 y 轴旋转的角度 (度).
    rot_y: f64,

    /// 绕 z 轴旋转的角度 (度).
    rot_z: f64,

    /// 体素位深, 8 或 16.
    #[arg(long, default_value = "8", value_parser = args::bit_depth)]
    bit_depth: BitDepth,

    #[command(flatten)]
    verbosity: Verbosity,
}

fn run<T: Sample>(cli: &Cli) -> anyhow::Result<()> {
    let volume: Volume<T> = read_volume(&cli.input)?;
    let degrees = [cli.rot_x, cli.rot_y, cli.rot_z];
    info!("rotating {} by {degrees:?} degrees", cli.input.display());
    let out = rotate_about_center(&volume, degrees);
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
