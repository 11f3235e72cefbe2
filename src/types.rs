//src/types.rs

use ahash::AHashMap;
use std::collections::BTreeMap;

/// A minimal representation of a read.
#[derive(Debug, Clone)]
pub struct FastqRecord {
    pub id: String,
    pub header_line: String,
    pub seq: String,
    pub quals: String,
}

/// Per-sample reference and primer sequences, cleaned to `ATCG` and paired
/// with their reverse complements. Built once from the sample sheet and
/// shared read-only across all reads of that sample.
///
/// An empty field means "absent": it never matches anything.
#[derive(Debug, Clone, Default)]
pub struct SampleSpec {
    /// Reference sequence being edited.
    pub target: String,
    pub target_rc: String,
    /// Upstream flank bounding the editable window.
    pub up: String,
    pub up_rc: String,
    /// Downstream flank bounding the editable window.
    pub down: String,
    pub down_rc: String,
    /// Forward primer used for demultiplexing.
    pub fp: String,
    pub fp_rc: String,
    /// Reverse primer used for demultiplexing.
    pub rp: String,
    pub rp_rc: String,
}

/// Result of locating both flank anchors in a read.
///
/// `up_end` is the index just past the upstream flank, `down_start` the index
/// of the downstream flank; the window to align is `seq[up_end..down_start]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlankMatch {
    pub up_end: usize,
    pub down_start: usize,
}

/// Indel outcome counts and positions for one sample. Mutated incrementally
/// as reads are classified, then finalized once with [`SampleStats::finalise`].
#[derive(Debug, Clone, Default)]
pub struct SampleStats {
    pub num_ins: u32,
    pub num_del: u32,
    pub num_other: u32,
    /// Reads where neither orientation matched both flanks.
    pub num_skip: u32,
    /// Percent insertions of classified (non-skip) reads, 2 decimals.
    pub per_ins: f64,
    /// Percent deletions of classified (non-skip) reads, 2 decimals.
    pub per_del: f64,
    /// Deletion start position (aligned-reference coordinates) -> read count.
    pub pos_del: AHashMap<usize, u32>,
    /// (insertion start position, inserted bases) -> read count.
    pub pos_ins: AHashMap<(usize, String), u32>,
}

impl SampleStats {
    /// Computes `per_ins`/`per_del` from the final counts. Skipped reads are
    /// excluded from the denominator; both percentages are 0 when no read was
    /// classified.
    pub fn finalise(&mut self) {
        let total = self.num_ins + self.num_del + self.num_other;
        if total > 0 {
            self.per_ins = round2(100.0 * f64::from(self.num_ins) / f64::from(total));
            self.per_del = round2(100.0 * f64::from(self.num_del) / f64::from(total));
        } else {
            self.per_ins = 0.0;
            self.per_del = 0.0;
        }
    }

    /// Deletion position map in a stable, numerically sorted form.
    pub fn pos_del_sorted(&self) -> BTreeMap<usize, u32> {
        self.pos_del.iter().map(|(&p, &c)| (p, c)).collect()
    }

    /// Insertion position map keyed as `after:_<position>:<BASES>`, sorted.
    pub fn pos_ins_keyed(&self) -> BTreeMap<String, u32> {
        self.pos_ins
            .iter()
            .map(|((pos, bases), &c)| (format!("after:_{pos}:{bases}"), c))
            .collect()
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalise_computes_rounded_percentages() {
        let mut stats = SampleStats {
            num_ins: 1,
            num_del: 1,
            num_other: 1,
            num_skip: 5,
            ..SampleStats::default()
        };
        stats.finalise();
        assert_eq!(stats.per_ins, 33.33);
        assert_eq!(stats.per_del, 33.33);
        assert!(stats.per_ins + stats.per_del <= 100.0);
    }

    #[test]
    fn finalise_zero_total_gives_zero_percentages() {
        let mut stats = SampleStats {
            num_skip: 3,
            ..SampleStats::default()
        };
        stats.finalise();
        assert_eq!(stats.per_ins, 0.0);
        assert_eq!(stats.per_del, 0.0);
    }

    #[test]
    fn pos_ins_keys_have_structured_form() {
        let mut stats = SampleStats::default();
        stats.pos_ins.insert((10, "ATAT".to_string()), 2);
        stats.pos_ins.insert((3, "C".to_string()), 1);
        let keyed = stats.pos_ins_keyed();
        assert_eq!(keyed.get("after:_10:ATAT"), Some(&2));
        assert_eq!(keyed.get("after:_3:C"), Some(&1));
    }
}
