// src/analyse.rs

//! Indel frequency and position analysis.
//!
//! Per sample: each demuxed read is searched for the up/down flank anchors
//! (both orientations), the enclosed window is aligned globally against the
//! sample's target, and the gap pattern is classified as one insertion, one
//! deletion, or "other". Counts and position maps accumulate into
//! [`SampleStats`]; per-sample reports and a combined summary are written out.

use std::fs::File;
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ahash::AHashMap;
use rayon::prelude::*;
use serde::Serialize;

use crate::align::{GlobalAligner, ScoringParams};
use crate::error::PipelineError;
use crate::fastq::FastqReader;
use crate::helpers::{hamming_distance, reverse_complement};
use crate::meta::SampleSheet;
use crate::types::{FlankMatch, SampleSpec, SampleStats};

/// Per-sample report encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Tab-separated table, one header row plus one data row.
    Txt,
    /// Structured record with nested position maps.
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "txt" => Ok(OutputFormat::Txt),
            "json" => Ok(OutputFormat::Json),
            other => Err(PipelineError::Config(format!(
                "unknown output format: {other}"
            ))),
        }
    }
}

const SUMMARY_COLUMNS: [&str; 9] = [
    "sample", "num_ins", "num_del", "num_other", "num_skip", "per_ins", "per_del", "pos_ins",
    "pos_del",
];

#[derive(Serialize)]
struct SampleReport<'a> {
    sample: &'a str,
    num_ins: u32,
    num_del: u32,
    num_other: u32,
    num_skip: u32,
    per_ins: f64,
    per_del: f64,
    pos_ins: std::collections::BTreeMap<String, u32>,
    pos_del: std::collections::BTreeMap<usize, u32>,
}

impl<'a> SampleReport<'a> {
    fn new(sample: &'a str, stats: &SampleStats) -> Self {
        Self {
            sample,
            num_ins: stats.num_ins,
            num_del: stats.num_del,
            num_other: stats.num_other,
            num_skip: stats.num_skip,
            per_ins: stats.per_ins,
            per_del: stats.per_del,
            pos_ins: stats.pos_ins_keyed(),
            pos_del: stats.pos_del_sorted(),
        }
    }
}

/// Analyses indel frequency and positions in CRISPR-edited reads.
pub struct IndelAnalyser<'a> {
    sheet: &'a SampleSheet,
    demux_dir: PathBuf,
    result_dir: PathBuf,
    /// Allowed mismatches in the flanking anchors.
    mismatch: usize,
    aligner: GlobalAligner,
    summary: Vec<(String, SampleStats)>,
}

impl<'a> IndelAnalyser<'a> {
    pub fn new(
        sheet: &'a SampleSheet,
        demux_dir: impl Into<PathBuf>,
        result_dir: impl Into<PathBuf>,
        mismatch: usize,
        scoring: ScoringParams,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            sheet,
            demux_dir: demux_dir.into(),
            result_dir: result_dir.into(),
            mismatch,
            aligner: GlobalAligner::new(scoring)?,
            summary: Vec::new(),
        })
    }

    /// Locates both flank anchors in `seq`, leftmost-earliest inside-out:
    /// first valid `up` occurrence, then the first valid `down` occurrence at
    /// or after its end. Not an exhaustive best-pair search. Fails when
    /// either anchor is absent (empty after cleaning).
    pub fn match_flanks(&self, seq: &str, up: &str, down: &str) -> Option<FlankMatch> {
        if up.is_empty() || down.is_empty() {
            return None;
        }
        if seq.len() < up.len() {
            return None;
        }

        for i in 0..=seq.len() - up.len() {
            match hamming_distance(&seq[i..i + up.len()], up) {
                Some(d) if d <= self.mismatch => {}
                _ => continue,
            }
            let up_end = i + up.len();
            if seq.len() < down.len() {
                continue;
            }
            for j in up_end..=seq.len() - down.len() {
                match hamming_distance(&seq[j..j + down.len()], down) {
                    Some(d) if d <= self.mismatch => {
                        return Some(FlankMatch {
                            up_end,
                            down_start: j,
                        });
                    }
                    _ => {}
                }
            }
        }
        None
    }

    /// Classifies one read into the running stats: skip when no orientation
    /// matches both flanks, otherwise align the window and record the indel.
    fn process_read(&self, seq: &str, spec: &SampleSpec, stats: &mut SampleStats) {
        let window = if let Some(m) = self.match_flanks(seq, &spec.up, &spec.down) {
            seq[m.up_end..m.down_start].to_string()
        } else {
            let rc_seq = reverse_complement(seq);
            match self.match_flanks(&rc_seq, &spec.up, &spec.down) {
                Some(m) => rc_seq[m.up_end..m.down_start].to_string(),
                None => {
                    stats.num_skip += 1;
                    return;
                }
            }
        };

        let (aligned_query, aligned_ref) = self.aligner.align_global(&window, &spec.target);
        classify_alignment(&aligned_query, &aligned_ref, stats);
    }

    /// Analyses one sample's demuxed reads and writes its report.
    ///
    /// Returns `None` (with a warning) for an unknown sample id or a missing
    /// demuxed FASTQ; both are recoverable, the pipeline continues with the
    /// remaining samples. A report write failure is logged as an error but
    /// the in-memory stats are still returned for aggregation.
    pub fn analyse(&self, sample_id: &str, format: OutputFormat) -> Option<SampleStats> {
        let spec = match self.sheet.get(sample_id) {
            Some(spec) => spec,
            None => {
                log::warn!("sample {sample_id} not in metadata");
                return None;
            }
        };

        let fastq_path = self.demux_dir.join(format!("{sample_id}.fq.gz"));
        if !fastq_path.exists() {
            log::warn!("FASTQ not found: {}", fastq_path.display());
            return None;
        }
        let reader = match FastqReader::open(&fastq_path) {
            Ok(reader) => reader,
            Err(e) => {
                log::warn!("cannot open {}: {e}", fastq_path.display());
                return None;
            }
        };

        let mut stats = SampleStats::default();
        for record in reader {
            match record {
                Ok(record) => self.process_read(&record.seq, spec, &mut stats),
                Err(e) => {
                    log::warn!("read error in {}: {e}", fastq_path.display());
                    break;
                }
            }
        }
        stats.finalise();

        if let Err(e) = self.write_sample_report(sample_id, &stats, format) {
            log::error!("failed to write report for {sample_id}: {e}");
        }
        Some(stats)
    }

    /// Analyses the given samples sequentially in order, recording results
    /// for the combined summary.
    pub fn analyse_all<S: AsRef<str>>(&mut self, sample_ids: &[S], format: OutputFormat) {
        let results: Vec<(String, SampleStats)> = sample_ids
            .iter()
            .filter_map(|id| {
                let id = id.as_ref();
                self.analyse(id, format).map(|stats| (id.to_string(), stats))
            })
            .collect();
        self.summary.extend(results);
    }

    /// Parallel variant sharded by sample: each sample's stats are built by
    /// exactly one worker, result order still follows `sample_ids`.
    pub fn analyse_all_parallel<S: AsRef<str> + Sync>(
        &mut self,
        sample_ids: &[S],
        format: OutputFormat,
    ) {
        let results: Vec<(String, SampleStats)> = sample_ids
            .par_iter()
            .filter_map(|id| {
                let id = id.as_ref();
                self.analyse(id, format).map(|stats| (id.to_string(), stats))
            })
            .collect();
        self.summary.extend(results);
    }

    /// Analysed results in processing order.
    pub fn summary(&self) -> &[(String, SampleStats)] {
        &self.summary
    }

    fn write_sample_report(
        &self,
        sample_id: &str,
        stats: &SampleStats,
        format: OutputFormat,
    ) -> Result<(), PipelineError> {
        std::fs::create_dir_all(&self.result_dir)?;
        let path = self
            .result_dir
            .join(format!("{sample_id}_summary.{}", format.extension()));
        let report = SampleReport::new(sample_id, stats);

        match format {
            OutputFormat::Json => {
                let mut file = File::create(path)?;
                let json = serde_json::to_string_pretty(&report)?;
                file.write_all(json.as_bytes())?;
                file.write_all(b"\n")?;
            }
            OutputFormat::Txt => {
                let mut writer = csv::WriterBuilder::new()
                    .delimiter(b'\t')
                    .from_path(path)?;
                writer.write_record(SUMMARY_COLUMNS)?;
                writer.write_record(report_fields(&report)?)?;
                writer.flush()?;
            }
        }
        Ok(())
    }

    /// Writes the combined summary CSV: one row per analysed sample in
    /// processing order, with the demux read count per sample. Writes
    /// nothing when no sample was analysed.
    pub fn write_summary<P: AsRef<Path>>(
        &self,
        path: P,
        read_counts: &AHashMap<String, u64>,
    ) -> Result<(), PipelineError> {
        if self.summary.is_empty() {
            return Ok(());
        }
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(path)?;
        let mut header = vec!["sample", "num_reads"];
        header.extend(&SUMMARY_COLUMNS[1..]);
        writer.write_record(&header)?;

        for (sample_id, stats) in &self.summary {
            let report = SampleReport::new(sample_id, stats);
            let num_reads = read_counts.get(sample_id).copied().unwrap_or(0);
            let mut fields = vec![sample_id.clone(), num_reads.to_string()];
            fields.extend(report_fields(&report)?.into_iter().skip(1));
            writer.write_record(&fields)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn report_fields(report: &SampleReport<'_>) -> Result<Vec<String>, PipelineError> {
    Ok(vec![
        report.sample.to_string(),
        report.num_ins.to_string(),
        report.num_del.to_string(),
        report.num_other.to_string(),
        report.num_skip.to_string(),
        report.per_ins.to_string(),
        report.per_del.to_string(),
        serde_json::to_string(&report.pos_ins)?,
        serde_json::to_string(&report.pos_del)?,
    ])
}

/// Interprets an aligned pair's gap pattern into the running stats.
///
/// Gaps in the query only mean a deletion (recorded at the first gap index in
/// aligned coordinates); gaps in the reference only mean an insertion (the
/// contiguous run from the first gap, keyed by start position and inserted
/// bases). Gaps in both, or none, count as "other".
pub fn classify_alignment(aligned_query: &str, aligned_ref: &str, stats: &mut SampleStats) {
    let query_gap = aligned_query.find('-');
    let ref_gap = aligned_ref.find('-');

    match (query_gap, ref_gap) {
        (Some(pos), None) => {
            *stats.pos_del.entry(pos).or_insert(0) += 1;
            stats.num_del += 1;
        }
        (None, Some(start)) => {
            let ref_bytes = aligned_ref.as_bytes();
            let query_bytes = aligned_query.as_bytes();
            let mut inserted = String::new();
            let mut i = start;
            while i < ref_bytes.len() && ref_bytes[i] == b'-' {
                if let Some(&b) = query_bytes.get(i) {
                    inserted.push(b.to_ascii_uppercase() as char);
                }
                i += 1;
            }
            *stats.pos_ins.entry((start, inserted)).or_insert(0) += 1;
            stats.num_ins += 1;
        }
        _ => {
            stats.num_other += 1;
        }
    }
}
