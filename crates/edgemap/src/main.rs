//! edgemap: turn an image file into a binary edge map.
//!
//! Reads an image, runs the grayscale, box blur and Sobel stages, and
//! writes the thresholded edge map as PNG or BMP. Per-stage diagnostics
//! are printed to stdout, either as a report table or as JSON.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin edgemap -- [OPTIONS] <INPUT> -o <OUTPUT>
//! ```
//!
//! Set `RUST_LOG=debug` to see what each pipeline stage did.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use edgemap_export::ExportFormat;
use edgemap_pipeline::diagnostics::{Clock, PipelineDiagnostics, process_staged_with_diagnostics};
use edgemap_pipeline::{BorderMode, FilterConfig, RasterBuffer, StagedResult};
use log::info;

/// Binary edge maps from raster images.
///
/// Converts the input to grayscale (brightest channel), smooths it with
/// a 3x3 box blur and marks every pixel whose Sobel gradient magnitude
/// reaches the threshold.
#[derive(Parser)]
#[command(name = "edgemap", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    input: PathBuf,

    /// Path for the edge map (.png or .bmp).
    #[arg(short, long)]
    output: PathBuf,

    /// Gradient magnitude threshold; pixels at or above it are edges.
    #[arg(long, default_value_t = FilterConfig::DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Draw edges white on black instead of black on white.
    #[arg(long)]
    invert: bool,

    /// How the 3x3 windows treat pixels beyond the image border.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_BORDER)]
    border: Border,

    /// Output format. Inferred from the output extension when omitted.
    #[arg(long, value_enum)]
    format: Option<Format>,

    /// Also write the grayscale, blurred and edge rasters to this
    /// directory.
    #[arg(long)]
    stages_dir: Option<PathBuf>,

    /// Number of runs for averaging stage timings.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full filter config as a JSON string.
    ///
    /// When provided, `--threshold`, `--invert` and `--border` are
    /// ignored. Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Border handling selection.
#[derive(Clone, Copy, ValueEnum)]
enum Border {
    /// Drop samples outside the image.
    Omit,
    /// Repeat the outermost pixels.
    Replicate,
}

/// Output format selection.
#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Portable Network Graphics.
    Png,
    /// Windows bitmap.
    Bmp,
}

/// Maps a [`BorderMode`] to the local CLI [`Border`] enum.
const fn border_from_pipeline(b: BorderMode) -> Border {
    match b {
        BorderMode::Omit => Border::Omit,
        BorderMode::Replicate => Border::Replicate,
    }
}

/// The CLI default border. `BorderMode::default` is not const, so a
/// test keeps the two in step.
const CLI_DEFAULT_BORDER: Border = border_from_pipeline(BorderMode::Omit);

impl std::fmt::Display for Border {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Omit => f.write_str("omit"),
            Self::Replicate => f.write_str("replicate"),
        }
    }
}

/// Build a [`FilterConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual filter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<FilterConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str::<FilterConfig>(json)
            .map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        FilterConfig {
            threshold: cli.threshold,
            invert: cli.invert,
            border: match cli.border {
                Border::Omit => BorderMode::Omit,
                Border::Replicate => BorderMode::Replicate,
            },
        }
    };
    config
        .validate()
        .map_err(|e| format!("Invalid configuration: {e}"))?;
    Ok(config)
}

/// Resolve the output format from `--format` or the output extension.
fn format_from_cli(cli: &Cli) -> Result<ExportFormat, String> {
    match cli.format {
        Some(Format::Png) => Ok(ExportFormat::Png),
        Some(Format::Bmp) => Ok(ExportFormat::Bmp),
        None => ExportFormat::from_path(&cli.output).map_err(|e| e.to_string()),
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = config_from_cli(cli)?;
    let format = format_from_cli(cli)?;

    let image_bytes = std::fs::read(&cli.input)
        .map_err(|e| format!("Error reading {}: {e}", cli.input.display()))?;

    info!(
        "image: {} ({} bytes)",
        cli.input.display(),
        image_bytes.len(),
    );
    info!(
        "config: threshold={} invert={} border={}",
        config.threshold, config.invert, config.border,
    );

    let mut all_diagnostics = Vec::with_capacity(cli.runs);
    let mut first_result = None;

    for run in 0..cli.runs {
        if cli.runs > 1 {
            info!("run {}/{}", run + 1, cli.runs);
        }

        let (staged, diagnostics) =
            process_staged_with_diagnostics(&image_bytes, &config, &StdClock)
                .map_err(|e| format!("Pipeline error: {e}"))?;

        if cli.json {
            let json = serde_json::to_string_pretty(&diagnostics)
                .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
            println!("{json}");
        } else {
            println!("{}", diagnostics.report());
        }

        if first_result.is_none() {
            first_result = Some(staged);
        }
        all_diagnostics.push(diagnostics);
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    let Some(staged) = first_result else {
        return Err("pipeline produced no result".to_string());
    };

    write_raster(&cli.output, &staged.edges, format)?;

    if let Some(ref dir) = cli.stages_dir {
        write_stages(dir, &staged, format)?;
    }

    Ok(())
}

/// Encode a raster and write it to `path`.
fn write_raster(path: &Path, raster: &RasterBuffer, format: ExportFormat) -> Result<(), String> {
    let bytes = edgemap_export::encode(raster, format)
        .map_err(|e| format!("Error encoding {}: {e}", path.display()))?;
    std::fs::write(path, &bytes)
        .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    info!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Write every intermediate raster into `dir`, one file per stage.
fn write_stages(dir: &Path, staged: &StagedResult, format: ExportFormat) -> Result<(), String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("Error creating {}: {e}", dir.display()))?;
    let stages = [
        ("grayscale", &staged.grayscale),
        ("blur", &staged.blurred),
        ("edges", &staged.edges),
    ];
    for (name, raster) in stages {
        let path = dir.join(format!("{name}.{}", format.extension()));
        write_raster(&path, raster, format)?;
    }
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    for name in ["decode", "grayscale", "blur", "edges"] {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(|d| d.stage(name))
            .map(|s| s.duration.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
