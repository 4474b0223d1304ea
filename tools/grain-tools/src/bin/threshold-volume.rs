//! 重建去噪 (或 sigmoid 映射) 后阈值化, 输出二值掩膜.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use grain_berry::prelude::*;
use log::info;
use utils::{args, BitDepth, Verbosity};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// 输入体数据.
    input: PathBuf,

    /// 输出掩膜.
    output: PathBuf,

    /// 重建高度占像素最大值的比例, `[0, 1]`.
    #[arg(value_name = "H", value_parser = args::unit_interval)]
    height: f64,

    /// 阈值占像素最大值的比例, `[0, 1]`.
    #[arg(value_name = "THRESH", value_parser = args::unit_interval)]
    threshold: f64,

    /// 体素位深, 8 或 16.
    #[arg(value_parser = args::bit_depth)]
    bit_depth: BitDepth,

    /// 阈值化之前的重建: hconvex, hminima 或 none.
    #[arg(long, default_value = "hminima", value_parser = args::reconstruction)]
    reconstruction: Reconstruction,

    /// 先做 sigmoid 映射 `alpha,beta` 到 `[0, PIXEL_MAX]`.
    #[arg(long, value_parser = args::pair)]
    sigmoid: Option<(f64, f64)>,

    /// 输出连通域标签图而非二值掩膜, 值为目标编号加 1.
    #[arg(long)]
    labels: bool,

    #[command(flatten)]
    verbosity: Verbosity,
}

fn run<T: Sample>(cli: &Cli) -> anyhow::Result<()> {
    let mut volume: Volume<T> = read_volume(&cli.input)?;
    if let Some((alpha, beta)) = cli.sigmoid {
        info!("sigmoid alpha = {alpha}, beta = {beta}");
        volume = sigmoid(&volume, alpha, beta, 0.0, T::PIXEL_MAX)?;
    }
    let params = SegmentParams {
        reconstruction: cli.reconstruction,
        height: cli.height,
        threshold: cli.threshold,
        ..Default::default()
    };
    if cli.labels {
        let segmentation = segment(&volume, &params)?;
        println!("Objects: {}", segmentation.len());
        write_volume(&cli.output, &segmentation.label_map::<u16>())?;
    } else {
        let mask = threshold_mask(&volume, &params)?;
        write_volume(&cli.output, &mask)?;
    }
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
