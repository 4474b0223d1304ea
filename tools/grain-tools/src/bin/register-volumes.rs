//! 灰度配准两个体数据, 打印相似变换的各分量.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use grain_berry::consts::optim;
use grain_berry::prelude::*;
use log::info;
use utils::{args, report, BitDepth, Verbosity};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// 固定体数据.
    fixed: PathBuf,

    /// 浮动体数据.
    moving: PathBuf,

    /// 金字塔 `sigma:shrink,...`, 从粗到细. 缺省为单层原分辨率.
    #[arg(long, value_delimiter = ',')]
    levels: Vec<PyramidLevel>,

    /// 每层最大迭代次数.
    #[arg(long, default_value_t = optim::NUMBER_OF_ITERATIONS, value_parser = args::positive_factor)]
    iterations: usize,

    /// 初始步长.
    #[arg(long, default_value_t = optim::LEARNING_RATE, value_parser = args::positive_f64)]
    learning_rate: f64,

    /// 最小步长.
    #[arg(long, default_value_t = optim::MINIMUM_STEP_LENGTH, value_parser = args::positive_f64)]
    min_step: f64,

    /// 固定图像每隔多少个体素取一个采样点.
    #[arg(long, value_parser = args::positive_factor)]
    sampling_stride: Option<usize>,

    /// 以灰度矩而非几何中心初始化.
    #[arg(long)]
    moments: bool,

    /// 从文件读取初始变换, 代替中心初始化.
    #[arg(long, conflicts_with = "moments")]
    initial_transform: Option<PathBuf>,

    /// 把浮动体数据重采样到固定网格并保存.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 保存最终变换.
    #[arg(long)]
    save_transform: Option<PathBuf>,

    /// 体素位深, 8 或 16.
    #[arg(long, default_value = "8", value_parser = args::bit_depth)]
    bit_depth: BitDepth,

    #[command(flatten)]
    verbosity: Verbosity,
}

fn run<T: Sample>(cli: &Cli) -> anyhow::Result<()> {
    let fixed: Volume<T> = read_volume(&cli.fixed)?;
    let moving: Volume<T> = read_volume(&cli.moving)?;

    let initial = match &cli.initial_transform {
        Some(path) => load_transform(path)?,
        None if cli.moments => initialize_with(&fixed, &moving, CenterMode::Moments),
        None => initialize_by_geometric_centers(&fixed, &moving),
    };
    info!("initial translation: {}", initial.translation().transpose());

    let optimizer = RegularStepGradientDescent::new(OptimizerConfig {
        number_of_iterations: cli.iterations,
        learning_rate: cli.learning_rate,
        minimum_step_length: cli.min_step,
        ..Default::default()
    })?;
    let mut registration = ImageRegistration::new(optimizer);
    if !cli.levels.is_empty() {
        registration = registration.with_levels(cli.levels.clone())?;
    }
    if let Some(n) = cli.sampling_stride {
        registration = registration.with_sampling(Sampling::Regular(n));
    }

    let result = registration.run(&fixed, &moving, initial, |r| {
        println!("{:>4}   {:.6}   {:?}", r.iteration, r.value, r.parameters);
    })?;
    report::print_registration(&result)?;

    if let Some(path) = &cli.save_transform {
        save_transform(path, &result.transform)?;
    }
    if let Some(path) = &cli.output {
        let resampled = resample(
            &moving,
            &result.transform,
            fixed.shape(),
            fixed.geometry(),
            T::default(),
        );
        write_volume(path, &resampled)?;
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
