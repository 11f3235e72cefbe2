// src/demux.rs

//! Read-to-sample assignment (demultiplexing).
//!
//! A read belongs to a sample when its forward and reverse primers are both
//! found (within the mismatch budget) in the right order and separated by a
//! gap inside the configured distance window. Both the read as given and its
//! reverse complement are tried. Reads matching no sample go to `"unknown"`.

use std::path::{Path, PathBuf};

use ahash::AHashMap;

use crate::error::PipelineError;
use crate::fastq::{FastqReader, GzFastqWriter};
use crate::helpers::find_subseq_with_mismatch;
use crate::meta::SampleSheet;
use crate::types::FastqRecord;

/// Bucket for reads that match no sample's primer pair.
pub const UNKNOWN_SAMPLE: &str = "unknown";

/// Demultiplexer for mixed CRISPR amplicon FASTQ files.
///
/// Writes one `<sample>.fq.gz` per observed sample (plus `unknown.fq.gz`)
/// into the output directory and keeps per-sample read counts.
#[derive(Debug)]
pub struct Demultiplexer<'a> {
    sheet: &'a SampleSheet,
    mismatch: usize,
    min_dist: usize,
    max_dist: usize,
    output_dir: PathBuf,
    writers: AHashMap<String, GzFastqWriter>,
    counts: AHashMap<String, u64>,
    seen_order: Vec<String>,
}

impl<'a> Demultiplexer<'a> {
    pub fn new(
        sheet: &'a SampleSheet,
        mismatch: usize,
        min_dist: usize,
        max_dist: usize,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, PipelineError> {
        if min_dist > max_dist {
            return Err(PipelineError::Config(format!(
                "min_dist ({min_dist}) must not exceed max_dist ({max_dist})"
            )));
        }
        Ok(Self {
            sheet,
            mismatch,
            min_dist,
            max_dist,
            output_dir: output_dir.into(),
            writers: AHashMap::new(),
            counts: AHashMap::new(),
            seen_order: Vec::new(),
        })
    }

    /// Classifies one read. Pure function over the read sequence and the
    /// sample sheet; every sample is tried in declaration order and the
    /// first qualifying primer pair wins, otherwise `"unknown"`.
    pub fn match_read(&self, seq: &str) -> &str {
        for (sample_id, spec) in self.sheet.iter() {
            // Forward orientation: fp strictly before rp.
            if self.primer_pair_found(seq, &spec.fp, &spec.rp) {
                return sample_id;
            }
            // Reverse-complement orientation: rp_rc plays the leading anchor.
            if self.primer_pair_found(seq, &spec.rp_rc, &spec.fp_rc) {
                return sample_id;
            }
        }
        UNKNOWN_SAMPLE
    }

    fn primer_pair_found(&self, seq: &str, lead: &str, trail: &str) -> bool {
        let lead_positions = find_subseq_with_mismatch(seq, lead, self.mismatch);
        if lead_positions.is_empty() {
            return false;
        }
        let trail_positions = find_subseq_with_mismatch(seq, trail, self.mismatch);

        for &lead_pos in &lead_positions {
            for &trail_pos in &trail_positions {
                if lead_pos < trail_pos {
                    let gap = trail_pos as i64 - (lead_pos + lead.len()) as i64;
                    if gap >= self.min_dist as i64 && gap <= self.max_dist as i64 {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Splits one FASTQ file into per-sample gzip files, counting reads per
    /// sample. May be called repeatedly to drain several input files into the
    /// same output set.
    pub fn demultiplex<P: AsRef<Path>>(&mut self, fastq_path: P) -> Result<(), PipelineError> {
        let fastq_path = fastq_path.as_ref();
        let reader = FastqReader::open(fastq_path)?;

        let mut total = 0u64;
        for record in reader {
            let record = record?;
            let sample = self.match_read(&record.seq).to_string();
            self.write_record(&sample, &record)?;
            *self.counts.entry(sample).or_insert(0) += 1;
            total += 1;
        }
        log::info!(
            "demultiplexed {} read(s) from {}",
            total,
            fastq_path.display()
        );
        Ok(())
    }

    fn write_record(&mut self, sample: &str, record: &FastqRecord) -> Result<(), PipelineError> {
        if !self.writers.contains_key(sample) {
            let path = self.output_dir.join(format!("{sample}.fq.gz"));
            self.writers
                .insert(sample.to_string(), GzFastqWriter::create(path)?);
            self.seen_order.push(sample.to_string());
        }
        // writer exists by construction
        if let Some(writer) = self.writers.get_mut(sample) {
            writer.write_record(record)?;
        }
        Ok(())
    }

    /// Flushes and closes all per-sample writers. Must be called before the
    /// demuxed files are read back.
    pub fn close(&mut self) -> Result<(), PipelineError> {
        for (_, writer) in self.writers.drain() {
            writer.finish()?;
        }
        Ok(())
    }

    /// Read counts per sample in first-seen order (including `"unknown"`).
    pub fn counts(&self) -> Vec<(String, u64)> {
        self.seen_order
            .iter()
            .map(|id| (id.clone(), self.counts.get(id).copied().unwrap_or(0)))
            .collect()
    }

    pub fn count_for(&self, sample: &str) -> u64 {
        self.counts.get(sample).copied().unwrap_or(0)
    }

    /// Sample ids with at least one read, first-seen order, `"unknown"`
    /// excluded. This is the processing order for the analysis stage.
    pub fn samples_with_reads(&self) -> Vec<String> {
        self.seen_order
            .iter()
            .filter(|id| id.as_str() != UNKNOWN_SAMPLE)
            .cloned()
            .collect()
    }
}
