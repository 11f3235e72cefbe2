use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use crispr_indel_rs::{run_pipeline, OutputFormat, PipelineOptions, ScoringParams};

/// Demultiplex CRISPR amplicon reads and quantify indel editing outcomes.
#[derive(Parser, Debug)]
#[command(name = "crispr-indel-rs", version, about)]
struct Args {
    /// Input FASTQ file. Supports plain FASTQ (.fq, .fastq) and gzipped
    /// (.fq.gz, .fastq.gz).
    #[arg(long)]
    fastq: PathBuf,

    /// Metadata CSV with columns: sample, target, up, down, fp, rp.
    #[arg(long = "meta-csv")]
    meta_csv: PathBuf,

    /// Directory for demultiplexed per-sample .fq.gz files.
    #[arg(long = "demux-dir", default_value = "demultiplexed")]
    demux_dir: PathBuf,

    /// Directory for per-sample summaries and the combined summary.csv.
    #[arg(long = "result-dir", default_value = "results")]
    result_dir: PathBuf,

    /// Allowed mismatches when matching primers. Use 1 for moderate
    /// sequencing quality, 2 only for low-quality data.
    #[arg(long = "barcode-mismatch", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
    barcode_mismatch: u8,

    /// Minimum distance between forward and reverse primer; should exceed
    /// any UMI/linker length to avoid false positives.
    #[arg(long = "min-dist", default_value_t = 1)]
    min_dist: usize,

    /// Maximum distance between forward and reverse primer; adjust to the
    /// amplicon size.
    #[arg(long = "max-dist", default_value_t = 1000)]
    max_dist: usize,

    /// Allowed mismatches when matching up/down flank anchors.
    #[arg(long = "flank-mismatch", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
    flank_mismatch: u8,

    /// Per-sample summary format: 'txt' for a tab-separated table, 'json'
    /// for structured output with indel position maps.
    #[arg(long = "output-format", default_value = "txt", value_parser = ["txt", "json"])]
    output_format: String,

    /// Analyse samples in parallel on the rayon thread pool.
    #[arg(long)]
    parallel: bool,

    /// Enable debug-level logging.
    #[arg(long)]
    verbose: bool,
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&[
                "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏",
            ])
            .template("{spinner:.green} {msg}")
            .expect("Invalid spinner template"),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn main() {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    log::info!("program starts");

    let format = match OutputFormat::from_str(&args.output_format) {
        Ok(format) => format,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };

    let options = PipelineOptions {
        barcode_mismatch: args.barcode_mismatch as usize,
        flank_mismatch: args.flank_mismatch as usize,
        min_dist: args.min_dist,
        max_dist: args.max_dist,
        output_format: format,
        scoring: ScoringParams::default(),
        parallel: args.parallel,
    };

    let bar = spinner("Demultiplexing and analysing reads...");
    let results = match run_pipeline(
        &args.fastq,
        &args.meta_csv,
        &args.demux_dir,
        &args.result_dir,
        &options,
    ) {
        Ok(results) => {
            bar.finish_with_message("Analysis finished.");
            results
        }
        Err(e) => {
            bar.finish_with_message("Pipeline failed.");
            log::error!("pipeline failed: {e}");
            std::process::exit(1);
        }
    };

    for (sample, stats) in &results.summary {
        log::info!(
            "{sample}: {} unedited, {} ins ({:.1}%), {} del ({:.1}%), {} skipped",
            stats.num_other,
            stats.num_ins,
            stats.per_ins,
            stats.num_del,
            stats.per_del,
            stats.num_skip,
        );
    }

    log::info!("program ends");
}
