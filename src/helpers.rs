// src/helpers.rs

//! Sequence utilities shared by demultiplexing and indel analysis:
//! reverse complement, sequence cleaning, Hamming distance and the
//! mismatch-tolerant sliding-window substring search.

/// Returns the reverse complement of a DNA sequence.
///
/// Input is upper-cased first; characters outside `ACGT` complement to `N`.
pub fn reverse_complement(seq: &str) -> String {
    seq.bytes()
        .rev()
        .map(|b| match b.to_ascii_uppercase() {
            b'A' => 'T',
            b'C' => 'G',
            b'G' => 'C',
            b'T' => 'A',
            _ => 'N',
        })
        .collect()
}

/// Cleans a DNA sequence down to upper-case `ATCG` characters.
///
/// Spreadsheet placeholders (`nan`, `none`, `null`) and blank cells clean to
/// the empty string, which downstream code treats as "absent".
pub fn clean_sequence(seq: &str) -> String {
    let trimmed = seq.trim();
    if trimmed.is_empty()
        || matches!(
            trimmed.to_ascii_lowercase().as_str(),
            "nan" | "none" | "null"
        )
    {
        return String::new();
    }
    trimmed
        .bytes()
        .filter_map(|b| {
            let up = b.to_ascii_uppercase();
            matches!(up, b'A' | b'T' | b'C' | b'G').then(|| up as char)
        })
        .collect()
}

/// Hamming distance between two equal-length strings.
///
/// Returns `None` when the lengths differ (incomparable). Case-sensitive on
/// already-uppercased input.
pub fn hamming_distance(s1: &str, s2: &str) -> Option<usize> {
    if s1.len() != s2.len() {
        return None;
    }
    Some(
        s1.bytes()
            .zip(s2.bytes())
            .filter(|(a, b)| a != b)
            .count(),
    )
}

/// Finds all start positions where `pattern` occurs in `seq` with at most
/// `max_mismatch` substitutions (no indels tolerated).
///
/// Scans every valid window in increasing order, so callers relying on
/// "first match wins" get the leftmost occurrence. Returns an empty vector
/// when `pattern` is empty or longer than `seq`.
pub fn find_subseq_with_mismatch(seq: &str, pattern: &str, max_mismatch: usize) -> Vec<usize> {
    let m = seq.len();
    let n = pattern.len();
    if n == 0 || m < n {
        return Vec::new();
    }

    let seq_bytes = seq.as_bytes();
    let pat_bytes = pattern.as_bytes();
    let mut positions = Vec::new();

    for i in 0..=m - n {
        let mut mismatches = 0;
        let mut ok = true;
        for (a, b) in seq_bytes[i..i + n].iter().zip(pat_bytes) {
            if a != b {
                mismatches += 1;
                if mismatches > max_mismatch {
                    ok = false;
                    break;
                }
            }
        }
        if ok {
            positions.push(i);
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_complement_basic() {
        assert_eq!(reverse_complement("AGGTCA"), "TGACCT");
        assert_eq!(reverse_complement("CTAGCT"), "AGCTAG");
    }

    #[test]
    fn reverse_complement_is_involutive() {
        for s in ["", "A", "ACGT", "AAACCCGGG", "TGCAGCTA"] {
            assert_eq!(reverse_complement(&reverse_complement(s)), s);
        }
    }

    #[test]
    fn reverse_complement_handles_case_and_ambiguity() {
        assert_eq!(reverse_complement("acgt"), "ACGT");
        assert_eq!(reverse_complement("ANT"), "ANT");
    }

    #[test]
    fn clean_sequence_strips_invalid_characters() {
        assert_eq!(clean_sequence("a-c g\tt!x"), "ACGT");
        assert_eq!(clean_sequence("AAACCCGGG"), "AAACCCGGG");
    }

    #[test]
    fn clean_sequence_placeholders_are_empty() {
        assert_eq!(clean_sequence(""), "");
        assert_eq!(clean_sequence("   "), "");
        assert_eq!(clean_sequence("nan"), "");
        assert_eq!(clean_sequence("None"), "");
        assert_eq!(clean_sequence("NULL"), "");
    }

    #[test]
    fn hamming_counts_differing_positions() {
        assert_eq!(hamming_distance("ACGT", "ACGT"), Some(0));
        assert_eq!(hamming_distance("ACGT", "ACGA"), Some(1));
        assert_eq!(hamming_distance("AAAA", "TTTT"), Some(4));
    }

    #[test]
    fn hamming_is_symmetric() {
        assert_eq!(
            hamming_distance("AGGTCA", "AGCTCA"),
            hamming_distance("AGCTCA", "AGGTCA"),
        );
    }

    #[test]
    fn hamming_unequal_lengths_is_incomparable() {
        assert_eq!(hamming_distance("ACGT", "ACG"), None);
        assert_eq!(hamming_distance("", "A"), None);
    }

    #[test]
    fn find_subseq_exact() {
        assert_eq!(find_subseq_with_mismatch("NNNAGGTCANNN", "AGGTCA", 0), vec![3]);
        assert_eq!(find_subseq_with_mismatch("AAAA", "AA", 0), vec![0, 1, 2]);
    }

    #[test]
    fn find_subseq_with_budget() {
        // one substitution tolerated at every window
        assert_eq!(find_subseq_with_mismatch("AGGTCA", "AGCTCA", 0), Vec::<usize>::new());
        assert_eq!(find_subseq_with_mismatch("AGGTCA", "AGCTCA", 1), vec![0]);
    }

    #[test]
    fn find_subseq_degenerate_inputs() {
        assert!(find_subseq_with_mismatch("ACGT", "", 0).is_empty());
        assert!(find_subseq_with_mismatch("AC", "ACGT", 0).is_empty());
    }

    #[test]
    fn find_subseq_positions_increase() {
        let positions = find_subseq_with_mismatch("ATATATAT", "ATAT", 0);
        assert_eq!(positions, vec![0, 2, 4]);
    }
}
