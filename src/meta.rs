// src/meta.rs

//! Sample sheet loading.
//!
//! The metadata CSV has one record per sample with columns
//! `sample,target,up,down,fp,rp`. Every sequence field is cleaned to `ATCG`
//! and paired with its reverse complement. Loading accepts any
//! [`std::io::Read`], so callers can hand in an open file, a decompressor or
//! an in-memory buffer; [`load_sample_sheet_file`] is the path-based adapter.

use std::fs::File;
use std::io;
use std::path::Path;

use ahash::AHashMap;
use serde::Deserialize;

use crate::error::PipelineError;
use crate::helpers::{clean_sequence, reverse_complement};
use crate::types::SampleSpec;

const REQUIRED_COLUMNS: [&str; 6] = ["sample", "target", "up", "down", "fp", "rp"];

#[derive(Debug, Deserialize)]
struct MetaRow {
    sample: String,
    target: String,
    up: String,
    down: String,
    fp: String,
    rp: String,
}

/// Sample specs keyed by sample id, preserving declaration order.
///
/// Declaration order matters: the read classifier tries samples in the order
/// they appear in the sheet, and reports keep the same order.
#[derive(Debug, Clone, Default)]
pub struct SampleSheet {
    specs: AHashMap<String, SampleSpec>,
    order: Vec<String>,
}

impl SampleSheet {
    pub fn get(&self, sample_id: &str) -> Option<&SampleSpec> {
        self.specs.get(sample_id)
    }

    pub fn contains(&self, sample_id: &str) -> bool {
        self.specs.contains_key(sample_id)
    }

    /// Sample ids in declaration order.
    pub fn sample_ids(&self) -> &[String] {
        &self.order
    }

    /// Iterates `(sample_id, spec)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SampleSpec)> {
        self.order
            .iter()
            .filter_map(|id| self.specs.get(id).map(|spec| (id.as_str(), spec)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn insert(&mut self, sample_id: String, spec: SampleSpec) {
        if self.specs.insert(sample_id.clone(), spec).is_none() {
            self.order.push(sample_id);
        }
    }
}

/// Loads and processes a sample sheet from any readable tabular source.
///
/// Fails with [`PipelineError::Meta`] when required columns are missing;
/// this is fatal at startup, no partial run is attempted.
pub fn load_sample_sheet<R: io::Read>(reader: R) -> Result<SampleSheet, PipelineError> {
    let mut csv_reader = csv::Reader::from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h.trim() == **col))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::Meta(format!(
            "sample sheet must have columns {:?}; missing: {}",
            REQUIRED_COLUMNS,
            missing.join(", ")
        )));
    }

    let mut sheet = SampleSheet::default();
    for row in csv_reader.deserialize::<MetaRow>() {
        let row = row?;
        let sample_id = row.sample.trim().to_string();
        if sample_id.is_empty() {
            continue;
        }

        let target = clean_sequence(&row.target);
        let up = clean_sequence(&row.up);
        let down = clean_sequence(&row.down);
        let fp = clean_sequence(&row.fp);
        let rp = clean_sequence(&row.rp);

        let spec = SampleSpec {
            target_rc: reverse_complement(&target),
            up_rc: reverse_complement(&up),
            down_rc: reverse_complement(&down),
            fp_rc: reverse_complement(&fp),
            rp_rc: reverse_complement(&rp),
            target,
            up,
            down,
            fp,
            rp,
        };
        sheet.insert(sample_id, spec);
    }

    log::debug!("loaded sample sheet with {} sample(s)", sheet.len());
    Ok(sheet)
}

/// File-backed adapter over [`load_sample_sheet`].
pub fn load_sample_sheet_file<P: AsRef<Path>>(path: P) -> Result<SampleSheet, PipelineError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        PipelineError::Meta(format!("cannot open sample sheet {}: {e}", path.display()))
    })?;
    load_sample_sheet(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "sample,target,up,down,fp,rp\n\
                         sample1,AAACCCGGG,TT,AA,AGGTCA,CTAGCT\n\
                         sample2,TGCAGCTA,CA,TG,GATCCA,CGAAGT\n";

    #[test]
    fn loads_and_reverse_complements_fields() {
        let sheet = load_sample_sheet(SHEET.as_bytes()).unwrap();
        assert_eq!(sheet.len(), 2);

        let s1 = sheet.get("sample1").unwrap();
        assert_eq!(s1.target, "AAACCCGGG");
        assert_eq!(s1.target_rc, "CCCGGGTTT");
        assert_eq!(s1.up, "TT");
        assert_eq!(s1.up_rc, "AA");
        assert_eq!(s1.fp, "AGGTCA");
        assert_eq!(s1.fp_rc, "TGACCT");
        assert_eq!(s1.rp, "CTAGCT");
        assert_eq!(s1.rp_rc, "AGCTAG");

        let s2 = sheet.get("sample2").unwrap();
        assert_eq!(s2.target_rc, "TAGCTGCA");
        assert_eq!(s2.down, "TG");
        assert_eq!(s2.down_rc, "CA");
    }

    #[test]
    fn declaration_order_is_preserved() {
        let sheet = load_sample_sheet(SHEET.as_bytes()).unwrap();
        assert_eq!(sheet.sample_ids(), ["sample1", "sample2"]);
        let ids: Vec<&str> = sheet.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["sample1", "sample2"]);
    }

    #[test]
    fn sequences_are_cleaned() {
        let csv = "sample,target,up,down,fp,rp\n\
                   s1,aaa-ccc x,nan,TT,ag gt,NULL\n";
        let sheet = load_sample_sheet(csv.as_bytes()).unwrap();
        let spec = sheet.get("s1").unwrap();
        assert_eq!(spec.target, "AAACCC");
        assert_eq!(spec.up, "");
        assert_eq!(spec.fp, "AGGT");
        assert_eq!(spec.rp, "");
    }

    #[test]
    fn missing_columns_are_fatal() {
        let csv = "sample,target,up\ns1,ACGT,TT\n";
        let err = load_sample_sheet(csv.as_bytes()).unwrap_err();
        match err {
            PipelineError::Meta(msg) => {
                assert!(msg.contains("down"));
                assert!(msg.contains("fp"));
                assert!(msg.contains("rp"));
            }
            other => panic!("expected Meta error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_sample_sheet_file("/nonexistent/meta.csv").unwrap_err();
        assert!(matches!(err, PipelineError::Meta(_)));
    }
}
