// src/align.rs

//! Global pairwise alignment adapter over `bio::alignment::pairwise`.
//!
//! The rest of the pipeline consumes alignment as a capability: give it two
//! sequences, get back two equal-length strings over `{A,C,G,T,-}` where `-`
//! marks a gap. Indel interpretation happens in the analysis stage, not here.

use bio::alignment::pairwise::Aligner;
use bio::alignment::AlignmentOperation;

use crate::error::PipelineError;

/// Substitution and affine-gap scoring. Gap penalties are stored as positive
/// magnitudes, matching how they are configured upstream.
#[derive(Debug, Clone, Copy)]
pub struct ScoringParams {
    pub match_score: i32,
    pub mismatch_score: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            match_score: 2,
            mismatch_score: -1,
            gap_open: 10,
            gap_extend: 1,
        }
    }
}

impl ScoringParams {
    /// Rejects configurations that cannot guarantee a traceback: a match must
    /// score positive, a mismatch must not score above a match, and gap
    /// penalties must be non-negative magnitudes.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.match_score <= 0 {
            return Err(PipelineError::Config(format!(
                "match score must be positive, got {}",
                self.match_score
            )));
        }
        if self.mismatch_score >= self.match_score {
            return Err(PipelineError::Config(format!(
                "mismatch score ({}) must be below match score ({})",
                self.mismatch_score, self.match_score
            )));
        }
        if self.gap_open < 0 || self.gap_extend < 0 {
            return Err(PipelineError::Config(format!(
                "gap penalties must be non-negative, got open={} extend={}",
                self.gap_open, self.gap_extend
            )));
        }
        Ok(())
    }
}

/// Needleman-Wunsch wrapper producing gapped sequence pairs.
#[derive(Debug, Clone, Copy)]
pub struct GlobalAligner {
    params: ScoringParams,
}

impl GlobalAligner {
    pub fn new(params: ScoringParams) -> Result<Self, PipelineError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Aligns `query` against `reference` end to end.
    ///
    /// Degenerate inputs skip the aligner: an empty side is paired with an
    /// all-gap string of the other side's length. If the traceback cannot be
    /// converted into a consistent gapped pair, the original sequences are
    /// returned unchanged as a last resort.
    pub fn align_global(&self, query: &str, reference: &str) -> (String, String) {
        if query.is_empty() {
            return ("-".repeat(reference.len()), reference.to_string());
        }
        if reference.is_empty() {
            return (query.to_string(), "-".repeat(query.len()));
        }

        let q = query.as_bytes();
        let r = reference.as_bytes();
        let score = |a: u8, b: u8| {
            if a == b {
                self.params.match_score
            } else {
                self.params.mismatch_score
            }
        };
        let mut aligner = Aligner::with_capacity(
            q.len(),
            r.len(),
            -self.params.gap_open,
            -self.params.gap_extend,
            score,
        );
        let alignment = aligner.global(q, r);

        match gapped_pair(q, r, &alignment.operations) {
            Some(pair) => pair,
            None => {
                log::warn!("alignment traceback was inconsistent; returning unaligned sequences");
                (query.to_string(), reference.to_string())
            }
        }
    }
}

/// Expands traceback operations into two equal-length gapped strings.
/// Operations are relative to x=query, y=reference: `Del` is a gap in the
/// query, `Ins` a gap in the reference. Returns `None` when the operations
/// do not consume both sequences exactly.
fn gapped_pair(
    query: &[u8],
    reference: &[u8],
    operations: &[AlignmentOperation],
) -> Option<(String, String)> {
    let mut aligned_query = String::with_capacity(operations.len());
    let mut aligned_ref = String::with_capacity(operations.len());
    let mut qi = 0;
    let mut ri = 0;

    for op in operations {
        match op {
            AlignmentOperation::Match | AlignmentOperation::Subst => {
                aligned_query.push(*query.get(qi)? as char);
                aligned_ref.push(*reference.get(ri)? as char);
                qi += 1;
                ri += 1;
            }
            AlignmentOperation::Del => {
                aligned_query.push('-');
                aligned_ref.push(*reference.get(ri)? as char);
                ri += 1;
            }
            AlignmentOperation::Ins => {
                aligned_query.push(*query.get(qi)? as char);
                aligned_ref.push('-');
                qi += 1;
            }
            // clipping never appears in a global alignment
            AlignmentOperation::Xclip(_) | AlignmentOperation::Yclip(_) => return None,
        }
    }

    if qi != query.len() || ri != reference.len() {
        return None;
    }
    Some((aligned_query, aligned_ref))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aligner() -> GlobalAligner {
        GlobalAligner::new(ScoringParams::default()).unwrap()
    }

    #[test]
    fn identical_sequences_have_no_gaps() {
        let (q, r) = aligner().align_global("AAACCCGGG", "AAACCCGGG");
        assert_eq!(q, "AAACCCGGG");
        assert_eq!(r, "AAACCCGGG");
    }

    #[test]
    fn deletion_in_query_opens_query_gap() {
        let (q, r) = aligner().align_global("AAAGGG", "AAATTTCCCCGGG");
        assert_eq!(q.len(), r.len());
        assert_eq!(r, "AAATTTCCCCGGG");
        // the seven missing bases become one gap run at positions 3..10
        assert_eq!(q, "AAA-------GGG");
    }

    #[test]
    fn insertion_in_query_opens_reference_gap() {
        let (q, r) = aligner().align_global("AAATTTCCCCTGGG", "AAATGGG");
        assert_eq!(q.len(), r.len());
        assert!(r.contains('-'));
        assert!(!q.contains('-'));
        assert!(q.replace('-', "").contains("TTTCCCC"));
    }

    #[test]
    fn mismatches_alone_do_not_open_gaps() {
        let (q, r) = aligner().align_global("AAGCCCTGG", "AAACCCGGG");
        assert!(!q.contains('-'));
        assert!(!r.contains('-'));
        assert_eq!(q.len(), 9);
        let mismatches = q.bytes().zip(r.bytes()).filter(|(a, b)| a != b).count();
        assert!(mismatches > 0);
    }

    #[test]
    fn empty_query_pairs_with_all_gaps() {
        let (q, r) = aligner().align_global("", "AAACCC");
        assert_eq!(q, "------");
        assert_eq!(r, "AAACCC");
    }

    #[test]
    fn empty_reference_pairs_with_all_gaps() {
        let (q, r) = aligner().align_global("AAACCC", "");
        assert_eq!(q, "AAACCC");
        assert_eq!(r, "------");
    }

    #[test]
    fn both_empty_stay_empty() {
        let (q, r) = aligner().align_global("", "");
        assert_eq!(q, "");
        assert_eq!(r, "");
    }

    #[test]
    fn bad_scoring_is_rejected() {
        for params in [
            ScoringParams {
                match_score: 0,
                ..ScoringParams::default()
            },
            ScoringParams {
                mismatch_score: 5,
                ..ScoringParams::default()
            },
            ScoringParams {
                gap_open: -3,
                ..ScoringParams::default()
            },
        ] {
            assert!(GlobalAligner::new(params).is_err());
        }
    }
}
