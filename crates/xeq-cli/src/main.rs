//! `xeq` - builds cross-framework equivalence datasets.
//!
//! Mutates code-pair corpora, keeps the mutants whose implementations still
//! agree, and turns model responses into pair and bug-prone value files.

#![forbid(unsafe_code)]

mod config;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{debug, info};
use serde::Serialize;
use serde_json::json;
use xeq_eval::{EquivalenceClassifier, evaluate_corpus};
use xeq_feedback::{
    DEFAULT_DATASET_SUFFIX, DEFAULT_MAX_EXAMPLES, build_datasets, extract_values_corpus,
    split_generation_corpus,
};
use xeq_mutate::mutate_corpus;

use crate::config::{ConfigLoader, Overrides, XeqConfig};

#[derive(Parser)]
#[command(
    name = "xeq",
    version,
    about = "Cross-framework equivalence dataset builder",
    long_about = "Expands numerical code pairs by mutating their array literals, runs every \
                  implementation and keeps the pairs whose results still agree."
)]
struct Cli {
    /// Log level; `RUST_LOG` applies when this is not given
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    /// JSON configuration file (defaults to ./xeq.json when present)
    #[arg(long, global = true, env = "XEQ_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Expand `<framework>/<api>_pairs.json` files with array-literal mutants
    Mutate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Mutants derived from each original pair
        #[arg(long)]
        count: Option<usize>,
    },
    /// Keep mutated pairs whose implementations produce equivalent results
    Evaluate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Largest pairwise distance still counted as equivalent
        #[arg(long)]
        threshold: Option<f64>,
        /// Which executor runs the snippets: python (default) or native
        #[arg(long)]
        executor: Option<String>,
        /// Interpreter used by the python executor
        #[arg(long)]
        python: Option<PathBuf>,
        /// Per-snippet wall-clock limit for the python executor; 0 disables it
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Importable libraries, comma separated (numpy,torch,tensorflow,mlx)
        #[arg(long, value_delimiter = ',')]
        modules: Option<Vec<String>>,
    },
    /// Split `<framework>/<api>.txt` generation responses into pair files
    SplitGenerations {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = DEFAULT_MAX_EXAMPLES)]
        max_examples: usize,
    },
    /// Extract bug-prone value lists from `*.txt` analysis responses
    ExtractValues {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Build conversion, generation and combined fine-tuning datasets
    BuildDatasets {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// File-name suffix of the pair files to read
        #[arg(long, default_value = DEFAULT_DATASET_SUFFIX)]
        suffix: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if let Some(level) = cli.log_level {
        builder.filter_level(level.filter());
    }
    builder.format(format_log_record).init();

    info!("xeq v{} starting", env!("CARGO_PKG_VERSION"));
    let mut config = ConfigLoader::load(cli.config.as_deref())?;

    match cli.command {
        Command::Mutate {
            input,
            output,
            count,
        } => {
            config.apply_overrides(Overrides {
                mutation_count: count,
                ..Overrides::default()
            });
            debug!("Configuration loaded: {config:?}");
            run_mutate(&config, &input, &output)
        }
        Command::Evaluate {
            input,
            output,
            threshold,
            executor,
            python,
            timeout_secs,
            modules,
        } => {
            config.apply_overrides(Overrides {
                threshold,
                executor,
                python,
                timeout_secs,
                modules,
                ..Overrides::default()
            });
            debug!("Configuration loaded: {config:?}");
            run_evaluate(&config, &input, &output)
        }
        Command::SplitGenerations {
            input,
            output,
            max_examples,
        } => {
            let report = split_generation_corpus(&input, &output, max_examples)
                .with_context(|| format!("splitting responses under {}", input.display()))?;
            info!(
                "wrote {} code pairs from {} responses",
                report.total_pairs(),
                report.files.len()
            );
            print_summary(&json!({
                "command": "split-generations",
                "total_pairs": report.total_pairs(),
                "files": report.files,
                "skipped_files": report.skipped_files,
            }))
        }
        Command::ExtractValues { input, output } => {
            let report = extract_values_corpus(&input, &output)
                .with_context(|| format!("extracting values under {}", input.display()))?;
            info!(
                "extracted {} values from {} responses",
                report.total_values(),
                report.values.len()
            );
            print_summary(&json!({
                "command": "extract-values",
                "total_values": report.total_values(),
                "responses": report.values.len(),
                "combined_path": report.combined_path,
                "skipped_files": report.skipped_files,
            }))
        }
        Command::BuildDatasets {
            input,
            output,
            suffix,
        } => {
            let report = build_datasets(&input, &output, &suffix)
                .with_context(|| format!("building datasets from {}", input.display()))?;
            info!(
                "built {} dataset records from {} files",
                report.combined_records(),
                report.files.len()
            );
            print_summary(&json!({
                "command": "build-datasets",
                "conversion_records": report.conversion_records,
                "generation_records": report.generation_records,
                "combined_records": report.combined_records(),
                "files": report.files,
                "skipped_files": report.skipped_files,
            }))
        }
    }
}

fn run_mutate(config: &XeqConfig, input: &Path, output: &Path) -> Result<()> {
    let mutator = config.mutator();
    info!(
        "mutating {} with {} mutants per pair",
        input.display(),
        mutator.mutation_count
    );
    let report = mutate_corpus(input, output, mutator)
        .with_context(|| format!("mutating code pairs under {}", input.display()))?;
    info!(
        "wrote {} code pairs across {} files",
        report.total_pairs_written(),
        report.files.len()
    );
    print_summary(&json!({
        "command": "mutate",
        "mutation_count": mutator.mutation_count,
        "total_pairs_written": report.total_pairs_written(),
        "files": report.files,
        "skipped_files": report.skipped_files,
    }))
}

fn run_evaluate(config: &XeqConfig, input: &Path, output: &Path) -> Result<()> {
    let threshold = config.threshold()?;
    let settings = config.executor_settings()?;
    info!("evaluating with the {} executor", settings.kind);
    let classifier = EquivalenceClassifier::new(settings.build(), threshold);
    let report = evaluate_corpus(input, output, &classifier)
        .with_context(|| format!("evaluating code pairs under {}", input.display()))?;
    print_summary(&json!({
        "command": "evaluate",
        "threshold": threshold,
        "executor": settings.kind.as_str(),
        "total_pairs": report.stats.total_pairs,
        "equivalent_pairs": report.stats.equivalent_pairs,
        "non_equivalent_pairs": report.stats.non_equivalent_pairs,
        "retention_rate": report.stats.retention_rate(),
        "files": report.files,
        "skipped_files": report.skipped_files,
    }))
}

fn print_summary<T: Serialize>(summary: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(summary).context("serializing run summary")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}").context("writing run summary")?;
    Ok(())
}

fn format_log_record(
    buf: &mut env_logger::fmt::Formatter,
    record: &log::Record,
) -> std::io::Result<()> {
    writeln!(
        buf,
        "[{} {:>5} {}] {}",
        buf.timestamp_millis(),
        record.level(),
        record.target(),
        record.args()
    )
}
