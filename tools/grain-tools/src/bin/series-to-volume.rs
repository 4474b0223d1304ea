//! 把图像序列拼为一个体数据.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{ensure, Context};
use clap::Parser;
use grain_berry::consts::SERIES_PATTERN;
use grain_berry::io::VolumeFormat;
use grain_berry::prelude::*;
use utils::{args, BitDepth, Verbosity};

#[derive(Parser, Debug)]
#[command(version, about, allow_negative_numbers = true)]
struct Cli {
    /// 切片所在目录.
    input_dir: PathBuf,

    /// 首张切片的序号.
    first: i64,

    /// 末张切片的序号 (含).
    last: i64,

    /// 输出体数据. `.npy` 按分块逐块写入, 内存中只保留一块.
    output: PathBuf,

    /// printf 风格的文件名模式.
    #[arg(long, default_value = SERIES_PATTERN)]
    pattern: String,

    /// 序号步长.
    #[arg(long, default_value_t = 1)]
    increment: i64,

    /// 体素位深, 8 或 16.
    #[arg(long, default_value = "8", value_parser = args::bit_depth)]
    bit_depth: BitDepth,

    #[command(flatten)]
    verbosity: Verbosity,
}

fn run<T: Sample>(cli: &Cli) -> anyhow::Result<()> {
    ensure!(
        cli.input_dir.is_dir(),
        "{} is not a directory",
        cli.input_dir.display()
    );
    let names = SeriesFileNames::new(
        &cli.input_dir,
        &cli.pattern,
        cli.first,
        cli.last,
        cli.increment,
    )?;
    ensure!(!names.is_empty(), "no slice in [{}, {}]", cli.first, cli.last);
    let paths = names.file_names();
    let context = || format!("reading series from {}", cli.input_dir.display());

    // npy 可以逐块落盘, 其余格式需要完整的体数据.
    if VolumeFormat::from_path(&cli.output)? == VolumeFormat::Npy {
        let depth = paths.len();
        let mut writer: Option<NpyChunkWriter<T>> = None;
        read_series_chunks(&paths, RuntimeConfig::global(), |range, chunk| {
            if writer.is_none() {
                let (_, h, w) = chunk.dim();
                writer = Some(NpyChunkWriter::create(&cli.output, (depth, h, w))?);
            }
            match writer.as_mut() {
                Some(writer) => writer.write_chunk(range, &chunk),
                None => Ok(()),
            }
        })
        .with_context(context)?;
        if let Some(writer) = writer {
            writer.finish()?;
        }
        return Ok(());
    }

    let volume: Volume<T> = read_series(&paths).with_context(context)?;
    write_volume(&cli.output, &volume)?;
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
