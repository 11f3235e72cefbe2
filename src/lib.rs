// src/lib.rs
pub mod align;
pub mod analyse;
pub mod demux;
pub mod error;
pub mod fastq;
pub mod helpers;
pub mod meta;
pub mod types;

use std::path::Path;

use ahash::AHashMap;

pub use crate::align::{GlobalAligner, ScoringParams};
pub use crate::analyse::{IndelAnalyser, OutputFormat};
pub use crate::demux::{Demultiplexer, UNKNOWN_SAMPLE};
pub use crate::error::PipelineError;
pub use crate::meta::{load_sample_sheet, load_sample_sheet_file, SampleSheet};
pub use crate::types::{FastqRecord, SampleSpec, SampleStats};

/// Matching and output parameters for a pipeline run. All externally
/// supplied; the pipeline itself holds no configuration state.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Allowed mismatches when matching primers (0-2).
    pub barcode_mismatch: usize,
    /// Allowed mismatches when matching flank anchors (0-2).
    pub flank_mismatch: usize,
    /// Minimum gap between forward and reverse primer.
    pub min_dist: usize,
    /// Maximum gap between forward and reverse primer.
    pub max_dist: usize,
    pub output_format: OutputFormat,
    pub scoring: ScoringParams,
    /// Analyse samples on the rayon pool instead of sequentially.
    pub parallel: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            barcode_mismatch: 0,
            flank_mismatch: 0,
            min_dist: 1,
            max_dist: 1000,
            output_format: OutputFormat::Txt,
            scoring: ScoringParams::default(),
            parallel: false,
        }
    }
}

/// Everything a full run produces, minus the files on disk.
pub struct PipelineResults {
    /// Demultiplexed read counts per sample in first-seen order, including
    /// `"unknown"`.
    pub sample_counts: Vec<(String, u64)>,

    /// Per-sample indel statistics in processing order.
    pub summary: Vec<(String, SampleStats)>,
}

impl PipelineResults {
    pub fn stats_for(&self, sample_id: &str) -> Option<&SampleStats> {
        self.summary
            .iter()
            .find(|(id, _)| id == sample_id)
            .map(|(_, stats)| stats)
    }

    pub fn count_for(&self, sample_id: &str) -> u64 {
        self.sample_counts
            .iter()
            .find(|(id, _)| id == sample_id)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// Runs the whole pipeline: load the sample sheet, demultiplex the FASTQ into
/// per-sample files, analyse indels per sample, and write per-sample reports
/// plus the combined `summary.csv` under `result_dir`.
///
/// Startup problems (unreadable sheet, missing columns, bad scoring or
/// distance window) abort with an error. Per-sample problems are logged and
/// skipped; a failed report write is logged but the run continues.
pub fn run_pipeline(
    fastq_path: &Path,
    meta_csv: &Path,
    demux_dir: &Path,
    result_dir: &Path,
    options: &PipelineOptions,
) -> Result<PipelineResults, PipelineError> {
    // 1. Load and validate metadata
    let sheet = load_sample_sheet_file(meta_csv)?;
    log::info!("loaded {} sample(s) from {}", sheet.len(), meta_csv.display());

    // 2. Demultiplex reads into per-sample files
    let mut demux = Demultiplexer::new(
        &sheet,
        options.barcode_mismatch,
        options.min_dist,
        options.max_dist,
        demux_dir,
    )?;
    demux.demultiplex(fastq_path)?;
    demux.close()?;

    let sample_counts = demux.counts();
    for (sample, count) in &sample_counts {
        log::info!("{sample}: {count} read(s)");
    }

    // 3. Analyse each sample that received reads
    let mut analyser = IndelAnalyser::new(
        &sheet,
        demux_dir,
        result_dir,
        options.flank_mismatch,
        options.scoring,
    )?;
    let samples = demux.samples_with_reads();
    if options.parallel {
        analyser.analyse_all_parallel(&samples, options.output_format);
    } else {
        analyser.analyse_all(&samples, options.output_format);
    }

    // 4. Combined summary; a write failure here must not discard the results
    let counts_map: AHashMap<String, u64> = sample_counts.iter().cloned().collect();
    let summary_path = result_dir.join("summary.csv");
    if let Err(e) = analyser.write_summary(&summary_path, &counts_map) {
        log::error!("failed to write {}: {e}", summary_path.display());
    } else if !analyser.summary().is_empty() {
        log::info!("combined results saved to {}", summary_path.display());
    }

    Ok(PipelineResults {
        sample_counts,
        summary: analyser.summary().to_vec(),
    })
}
