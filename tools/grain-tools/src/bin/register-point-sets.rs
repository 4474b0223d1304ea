//! 配准两个按下标对应的三维点集, 打印变换后的浮动点.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use grain_berry::prelude::*;
use nalgebra::Point3;
use utils::{args, report, Verbosity};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// 固定点集文件.
    fixed: PathBuf,

    /// 浮动点集文件.
    moving: PathBuf,

    /// 最大迭代次数.
    #[arg(long, default_value_t = 1000, value_parser = args::positive_factor)]
    iterations: usize,

    /// 以两点集质心初始化, 否则从恒等变换开始.
    #[arg(long)]
    init_centroids: bool,

    /// 保存变换后的浮动点集.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 保存最终变换.
    #[arg(long)]
    save_transform: Option<PathBuf>,

    #[command(flatten)]
    verbosity: Verbosity,
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let fixed = PointSet::<3>::read(&cli.fixed)?;
    let moving = PointSet::<3>::read(&cli.moving)?;

    let initial = if cli.init_centroids {
        initialize_point_sets(&fixed, &moving)
    } else {
        Similarity3d::identity()
    };
    let optimizer = RegularStepGradientDescent::new(OptimizerConfig {
        number_of_iterations: cli.iterations,
        ..Default::default()
    })?;
    let result = register_point_sets(&fixed, &moving, &optimizer, initial, |r| {
        println!("{:.6}", r.value);
        println!("{:?}", r.parameters);
        println!();
    })?;
    report::print_registration(&result)?;

    let transformed = moving.transform(&result.transform);
    for p in &transformed {
        let p = Point3::from(*p);
        println!("[{:.6}, {:.6}, {:.6}]", p.x, p.y, p.z);
    }
    if let Some(path) = &cli.output {
        transformed.write(path)?;
    }
    if let Some(path) = &cli.save_transform {
        save_transform(path, &result.transform)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.verbosity.init_logger();
    utils::run_main(|| run(&cli))
}
