//! 对三维点集施加相似变换: 绕 z 轴旋转, 平移, 缩放.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use grain_berry::prelude::*;
use log::info;
use nalgebra::Vector3;
use utils::{args, Verbosity};

#[derive(Parser, Debug)]
#[command(version, about, allow_negative_numbers = true)]
struct Cli {
    /// 输入点集文件.
    input: PathBuf,

    /// 输出点集文件.
    output: PathBuf,

    /// 绕 z 轴旋转的角度 (度).
    rot: f64,

    /// x 方向平移.
    tx: f64,

    /// y 方向平移.
    ty: f64,

    /// z 方向平移.
    tz: f64,

    /// 缩放, 必须为正.
    #[arg(value_parser = args::positive_f64)]
    scale: f64,

    #[command(flatten)]
    verbosity: Verbosity,
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut t = Similarity3d::identity();
    t.set_translation(Vector3::new(cli.tx, cli.ty, cli.tz));
    t.set_rotation(&Vector3::z(), cli.rot.to_radians())?;
    t.set_scale(cli.scale)?;

    let points = PointSet::<3>::read(&cli.input)?;
    let out = points.transform(&t);
    info!("transformed {} points", out.len());
    out.write(&cli.output)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.verbosity.init_logger();
    utils::run_main(|| run(&cli))
}
