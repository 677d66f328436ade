//! # vector-ingest
//!
//! A batch-ingestion coordinator that reads local corpora and forwards them
//! to an external vector-database API.
//!
//! Three source kinds are supported: a directory of text documents, a
//! practitioners table, and a products table. Each record is normalized into
//! a payload with a deterministic id, so re-running ingestion upserts instead
//! of duplicating, and payloads are sent in bounded batches with retry and
//! per-id failure reporting.
//!
//! ```text
//! ┌───────────────┐   ┌────────────┐   ┌───────────────┐
//! │ Source Reader │──▶│ Normalizer │──▶│ Ingest Client │──▶ vector DB API
//! │ fs walk / csv │   │ id + text  │   │ batch + retry │
//! └───────────────┘   └────────────┘   └───────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and source resolution |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`reader_fs`] | Documents directory reader |
//! | [`reader_csv`] | Tabular file reader |
//! | [`normalize`] | Record normalization |
//! | [`client`] | HTTP client with retry and partial-failure handling |
//! | [`driver`] | Per-source run orchestration |
//! | [`progress`] | Stderr progress reporting |

pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod reader_csv;
pub mod reader_fs;
