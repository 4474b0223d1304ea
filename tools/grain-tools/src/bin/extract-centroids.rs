//! 分割砂粒, 把质心写为点集文件.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use grain_berry::prelude::*;
use utils::{args, BitDepth, Dimension, Verbosity};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// 输入体数据或二维图像.
    input: PathBuf,

    /// 输出点集文件.
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

    /// 数据维度, 2 或 3.
    #[arg(value_parser = args::dimension)]
    dimension: Dimension,

    /// 阈值化之前的重建: hconvex, hminima 或 none.
    #[arg(long, default_value = "hconvex", value_parser = args::reconstruction)]
    reconstruction: Reconstruction,

    /// 最小目标体素数.
    #[arg(long, default_value_t = MIN_OBJECT_SIZE)]
    min_size: usize,

    /// 使用全相邻 (26/8) 而非面相邻 (6/4).
    #[arg(long)]
    full_connectivity: bool,

    #[command(flatten)]
    verbosity: Verbosity,
}

impl Cli {
    fn params(&self) -> SegmentParams {
        SegmentParams {
            reconstruction: self.reconstruction,
            height: self.height,
            threshold: self.threshold,
            min_size: self.min_size,
            connectivity: if self.full_connectivity {
                Connectivity::Full
            } else {
                Connectivity::Face
            },
        }
    }
}

fn run<T: Sample, const D: usize>(cli: &Cli) -> anyhow::Result<()> {
    let volume: Volume<T> = read_volume(&cli.input)?;
    let params = cli.params();
    println!("hIntensityUnits: {}", T::level(params.height));
    println!("threshVal: {}", T::level(params.threshold));

    let segmentation = segment(&volume, &params)?;
    let points = segmentation.centroids::<D>()?;
    println!("Grains: {}", points.len());
    points.write(&cli.output)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.verbosity.init_logger();
    utils::run_main(|| match (cli.bit_depth, cli.dimension) {
        (BitDepth::Eight, Dimension::Two) => run::<u8, 2>(&cli),
        (BitDepth::Eight, Dimension::Three) => run::<u8, 3>(&cli),
        (BitDepth::Sixteen, Dimension::Two) => run::<u16, 2>(&cli),
        (BitDepth::Sixteen, Dimension::Three) => run::<u16, 3>(&cli),
    })
}
