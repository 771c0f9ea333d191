//! changemark: outline what changed between before/after photo pairs.
//!
//! Scans an input directory for `name.jpg` / `name~2.jpg` pairs (or reads
//! an explicit manifest), compares each pair, and writes `name~3.jpg`
//! with a red box around every changed region, plus a copy of the
//! "before" image, into the output directory.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin changemark -- [OPTIONS] [INPUT_DIR] [OUTPUT_DIR]
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;

use changemark_io::{BatchConfig, BatchError, NamingConvention, PairOutcome, PairingSource};
use changemark_pipeline::{Connectivity, DetectionConfig, RegionExtractorKind};
use clap::{ArgAction, Parser, ValueEnum};
use log::LevelFilter;

/// Outline changed regions between before/after image pairs.
///
/// Every pair is processed independently; a pair that cannot be
/// processed is skipped with a warning and the run continues.
#[derive(Parser)]
#[command(name = "changemark", version)]
struct Cli {
    /// Directory holding the image pairs.
    #[arg(default_value = BatchConfig::DEFAULT_INPUT_DIR)]
    input_dir: PathBuf,

    /// Directory receiving annotated results (created if missing).
    #[arg(default_value = BatchConfig::DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Intensity difference a pixel must exceed to count as changed (0-255).
    #[arg(long, default_value_t = DetectionConfig::DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Side of the square dilation kernel (odd).
    #[arg(long, default_value_t = DetectionConfig::DEFAULT_KERNEL_SIZE)]
    kernel_size: u32,

    /// Number of dilation passes.
    #[arg(long, default_value_t = DetectionConfig::DEFAULT_ITERATIONS)]
    iterations: u32,

    /// Minimum box area (width x height) in square pixels.
    #[arg(long, default_value_t = DetectionConfig::DEFAULT_MIN_AREA)]
    min_area: u64,

    /// Pixel adjacency for grouping changed pixels.
    #[arg(long, value_enum, default_value_t = Adjacency::Eight)]
    connectivity: Adjacency,

    /// Region extraction strategy.
    #[arg(long, value_enum, default_value_t = Extractor::Components)]
    extractor: Extractor,

    /// Full detection config as a JSON string.
    ///
    /// When provided, all other detection parameter flags are ignored.
    /// The JSON must be a valid `DetectionConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// JSON manifest listing pairs explicitly, instead of scanning
    /// INPUT_DIR by naming convention.
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Character separating the base name from its tag.
    #[arg(long, default_value_t = NamingConvention::DEFAULT_SEPARATOR)]
    separator: char,

    /// Tag marking the "after" image.
    #[arg(long, default_value = NamingConvention::DEFAULT_AFTER_TAG)]
    after_tag: String,

    /// Tag given to the annotated result.
    #[arg(long, default_value = NamingConvention::DEFAULT_RESULT_TAG)]
    result_tag: String,

    /// Worker threads (default: one per core).
    #[arg(long)]
    jobs: Option<NonZeroUsize>,

    /// Write a JSON run report to this file.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print per-stage timing and metrics for every processed pair.
    #[arg(long)]
    diagnostics: bool,

    /// More log output (repeat for trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Pixel adjacency selection.
#[derive(Clone, Copy, ValueEnum)]
enum Adjacency {
    /// Edge neighbours only.
    Four,
    /// Edge and corner neighbours.
    Eight,
}

/// Region extraction strategy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Extractor {
    /// Connected-component labelling.
    Components,
    /// Top-level outer borders only; nested regions are absorbed.
    OuterBorders,
}

/// Build a [`DetectionConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn detection_from_cli(cli: &Cli) -> Result<DetectionConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(DetectionConfig {
        threshold: cli.threshold,
        kernel_size: cli.kernel_size,
        iterations: cli.iterations,
        min_area: cli.min_area,
        connectivity: match cli.connectivity {
            Adjacency::Four => Connectivity::Four,
            Adjacency::Eight => Connectivity::Eight,
        },
        extractor: match cli.extractor {
            Extractor::Components => RegionExtractorKind::ConnectedComponents,
            Extractor::OuterBorders => RegionExtractorKind::OuterBorders,
        },
    })
}

fn batch_from_cli(cli: &Cli, detection: DetectionConfig) -> BatchConfig {
    BatchConfig {
        input_dir: cli.input_dir.clone(),
        output_dir: cli.output_dir.clone(),
        pairing: cli
            .manifest
            .clone()
            .map_or(PairingSource::Convention, PairingSource::Manifest),
        naming: NamingConvention {
            separator: cli.separator,
            after_tag: cli.after_tag.clone(),
            result_tag: cli.result_tag.clone(),
        },
        detection,
        jobs: cli.jobs,
        collect_diagnostics: cli.diagnostics,
    }
}

const fn log_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Warn;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn init_logging(level: LevelFilter) {
    // RUST_LOG, when set, still takes precedence.
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .parse_default_env()
        .init();
}

/// Text logged for a run-fatal error.
///
/// Every [`BatchError`] message already embeds its cause, so the source
/// chain is not appended.
fn fatal_message(err: &BatchError) -> String {
    err.to_string()
}

fn report_fatal(err: &BatchError) {
    log::error!("{}", fatal_message(err));
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(log_level(cli.verbose, cli.quiet));

    let detection = match detection_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let config = batch_from_cli(&cli, detection);
    log::debug!("config: {config:#?}");

    let result = match changemark_io::run_batch(&config) {
        Ok(result) => result,
        Err(e) => {
            report_fatal(&e);
            return ExitCode::FAILURE;
        }
    };

    if cli.diagnostics {
        for outcome in &result.outcomes {
            if let PairOutcome::Annotated {
                base_name,
                diagnostics: Some(diag),
                ..
            } = outcome
            {
                println!("[{base_name}]\n{}\n", diag.report());
            }
        }
    }

    if let Some(ref path) = cli.report
        && let Err(e) = changemark_io::RunReport::new(&config, &result).write(path)
    {
        report_fatal(&e);
        return ExitCode::FAILURE;
    }

    let summary = result.summary;
    println!(
        "{} pair(s): {} annotated, {} skipped ({} missing counterpart, {} load failure, {} dimension mismatch, {} write failure)",
        summary.total(),
        summary.annotated,
        summary.skipped,
        summary.missing_counterpart,
        summary.load_failure,
        summary.dimension_mismatch,
        summary.write_failure,
    );

    ExitCode::SUCCESS
}
