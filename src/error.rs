//! Error taxonomy for ingestion runs.
//!
//! Two layers: [`IngestError`] classifies failures by how the run must react
//! (abort, skip, retry, record), and [`FailureKind`] is the compact label
//! attached to per-record failures in the final result.

use thiserror::Error;

/// Errors produced while reading, normalizing, or sending records.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Missing required file, directory, or argument. Fatal when the source
    /// is mandatory; aborts before any batch is attempted.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed input. Fatal for a broken header row; otherwise the record
    /// is skipped and the run continues.
    #[error("format error: {0}")]
    Format(String),

    /// Connection failure or 5xx response. Retried with backoff.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// 4xx response. Recorded per id, never retried.
    #[error("API rejected request ({status}): {body}")]
    PermanentApi { status: u16, body: String },
}

/// Category of a per-record failure, used for the summary breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    /// Record could not be normalized (binary content, malformed row, duplicate id).
    Format,
    /// All retries exhausted on a transient failure.
    TransientNetwork,
    /// The remote API rejected the record or its batch permanently.
    PermanentApi,
    /// The run was cancelled before this record's batch was dispatched.
    Aborted,
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Format => "format",
            FailureKind::TransientNetwork => "network",
            FailureKind::PermanentApi => "api",
            FailureKind::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
