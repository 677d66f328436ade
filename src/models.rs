//! Core data types that flow through the ingestion pipeline.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::error::FailureKind;

/// The three supported input corpora. Determines reader and normalizer behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Documents,
    Practitioners,
    Products,
}

impl SourceKind {
    /// Stable lowercase identifier, used for id prefixes, default collection
    /// names, and progress labels.
    pub fn slug(&self) -> &'static str {
        match self {
            SourceKind::Documents => "documents",
            SourceKind::Practitioners => "practitioners",
            SourceKind::Products => "products",
        }
    }

    /// All kinds in the order `ingest all` processes them.
    pub fn all() -> [SourceKind; 3] {
        [
            SourceKind::Documents,
            SourceKind::Practitioners,
            SourceKind::Products,
        ]
    }

    /// Whether a missing location aborts the run unless the configuration
    /// says otherwise. Tabular corpora are optional extras.
    pub fn required_by_default(&self) -> bool {
        matches!(self, SourceKind::Documents)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// A fully resolved input source. Built once from config and CLI flags,
/// immutable afterwards.
#[derive(Debug, Clone)]
pub struct IngestionSource {
    pub kind: SourceKind,
    /// Directory for documents, file path for tabular sources. May not exist;
    /// the driver decides whether that is fatal based on `required`.
    pub location: PathBuf,
    /// Target collection on the remote API.
    pub collection: String,
    /// Whether a missing location aborts the run (true) or is a no-op (false).
    pub required: bool,
    /// Tabular: column whose value becomes the payload id.
    pub key_column: Option<String>,
    /// Tabular: columns concatenated into the searchable text. Empty means
    /// every column.
    pub text_columns: Vec<String>,
    /// Documents: include/exclude glob patterns for the directory walk.
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
}

/// One record as produced by a source reader, before normalization.
#[derive(Debug, Clone)]
pub enum RawRecord {
    /// A file found under the documents directory. Content is read during
    /// normalization so the walk itself stays lazy.
    Document {
        relative_path: String,
        absolute_path: PathBuf,
    },
    /// One data row of a tabular file, with the header it was read under.
    Row {
        index: usize,
        headers: Arc<[String]>,
        fields: Vec<String>,
    },
}

/// A scalar metadata value, typed by best-effort inference.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Normalized record ready to be sent to the remote API.
///
/// The `id` is deterministic for identical input, so re-running ingestion
/// upserts instead of duplicating.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestPayload {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, MetaValue>,
}

/// A per-record failure, kept in the order it occurred.
#[derive(Debug, Clone)]
pub struct RecordFailure {
    pub id: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// Aggregate outcome of one ingestion run. Never mutated after the run
/// completes.
#[derive(Debug, Default)]
pub struct IngestResult {
    pub accepted: u64,
    /// Payloads skipped because the remote collection already held their id.
    pub skipped: u64,
    pub failures: Vec<RecordFailure>,
    /// Number of retried batch attempts, for observability.
    pub retries: u64,
}

impl IngestResult {
    pub fn failed(&self) -> u64 {
        self.failures.len() as u64
    }

    pub fn record_failure(
        &mut self,
        id: impl Into<String>,
        kind: FailureKind,
        reason: impl Into<String>,
    ) {
        self.failures.push(RecordFailure {
            id: id.into(),
            kind,
            reason: reason.into(),
        });
    }

    pub fn merge(&mut self, other: IngestResult) {
        self.accepted += other.accepted;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
        self.retries += other.retries;
    }

    /// Failure counts grouped by kind, for the summary breakdown.
    pub fn counts_by_kind(&self) -> BTreeMap<FailureKind, u64> {
        let mut counts = BTreeMap::new();
        for failure in &self.failures {
            *counts.entry(failure.kind).or_insert(0) += 1;
        }
        counts
    }
}
