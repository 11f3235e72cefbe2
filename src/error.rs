// src/error.rs

use thiserror::Error;

/// Errors that abort the pipeline at startup or during a stage that cannot
/// continue. Per-sample conditions (unknown sample id, missing demuxed FASTQ)
/// are not errors; they are logged and yield an absent result instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid sample metadata: {0}")]
    Meta(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
