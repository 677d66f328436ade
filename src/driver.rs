//! Ingestion run orchestration.
//!
//! Coordinates the full flow for each source: read records, normalize them
//! (collecting failures without aborting), batch the payloads, and send the
//! batches with bounded concurrency. Each source is committed independently;
//! there is no cross-source transaction or rollback.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::client::{BatchReport, IngestClient};
use crate::config::Config;
use crate::error::{FailureKind, IngestError};
use crate::models::{
    IngestPayload, IngestResult, IngestionSource, RawRecord, RecordFailure, SourceKind,
};
use crate::normalize;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::reader_csv;
use crate::reader_fs::DocumentWalker;

/// Per-invocation options resolved from CLI flags.
#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    /// Read and normalize only; report counts without any network call.
    pub dry_run: bool,
    /// Ask the API which ids it already holds and skip those payloads.
    pub skip_existing: bool,
    /// Maximum number of records to process.
    pub limit: Option<usize>,
    /// Overrides the configured batch size.
    pub batch_size: Option<usize>,
}

/// Run the given sources sequentially and return the merged result.
///
/// A configuration error on a required source aborts immediately; everything
/// else is recorded per record and the run continues.
pub async fn run(
    config: &Config,
    sources: &[IngestionSource],
    opts: &RunOptions,
    progress: &dyn ProgressReporter,
) -> Result<IngestResult, IngestError> {
    let client = IngestClient::new(&config.api)?;

    // On SIGINT, stop dispatching new batches; in-flight requests are left
    // to complete or fail naturally.
    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = Arc::clone(&cancelled);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing in-flight batches");
                cancelled.store(true, Ordering::SeqCst);
            }
        });
    }

    let mut total = IngestResult::default();
    for source in sources {
        let result = run_source(config, &client, source, opts, progress, &cancelled).await?;
        total.merge(result);
        if cancelled.load(Ordering::SeqCst) {
            break;
        }
    }

    if sources.len() > 1 {
        println!(
            "total  accepted: {}  failed: {}",
            total.accepted,
            total.failed()
        );
    }

    Ok(total)
}

async fn run_source(
    config: &Config,
    client: &IngestClient,
    source: &IngestionSource,
    opts: &RunOptions,
    progress: &dyn ProgressReporter,
    cancelled: &Arc<AtomicBool>,
) -> Result<IngestResult, IngestError> {
    let label = source.kind.slug();
    progress.report(ProgressEvent::Reading {
        source: label.to_string(),
    });

    let mut result = IngestResult::default();

    // Enumerate the source. A missing location is fatal only when the source
    // is required; otherwise there is simply nothing to ingest.
    let records: Box<dyn Iterator<Item = RawRecord>> = match source.kind {
        SourceKind::Documents => match DocumentWalker::new(source) {
            Ok(walker) => Box::new(walker),
            Err(IngestError::Configuration(msg)) if !source.required => {
                warn!("{}: {}, nothing to ingest", label, msg);
                print_summary(label, 0, 0, 0, &result, opts.dry_run);
                return Ok(result);
            }
            Err(e) => return Err(e),
        },
        SourceKind::Practitioners | SourceKind::Products => {
            match reader_csv::read_table(source) {
                Ok(table) => {
                    result.failures.extend(table.failures);
                    Box::new(table.records.into_iter())
                }
                Err(IngestError::Configuration(msg)) if !source.required => {
                    warn!("{}: {}, nothing to ingest", label, msg);
                    print_summary(label, 0, 0, 0, &result, opts.dry_run);
                    return Ok(result);
                }
                Err(e) => return Err(e),
            }
        }
    };

    // Normalize, collecting failures without aborting. Ids must be unique
    // within a run; duplicates are rejected here.
    let mut payloads: Vec<IngestPayload> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut processed: u64 = 0;

    for record in records {
        if let Some(limit) = opts.limit {
            if processed as usize >= limit {
                break;
            }
        }
        processed += 1;

        match normalize::normalize(source, &record) {
            Ok(payload) => {
                if seen.insert(payload.id.clone()) {
                    payloads.push(payload);
                } else {
                    result.record_failure(
                        payload.id,
                        FailureKind::Format,
                        "duplicate id within this run",
                    );
                }
            }
            Err(failure) => {
                debug!(id = %failure.id, "normalization failed: {}", failure.reason);
                result.failures.push(failure);
            }
        }

        if processed % 50 == 0 {
            progress.report(ProgressEvent::Normalizing {
                source: label.to_string(),
                records: processed,
            });
        }
    }

    let normalized = payloads.len() as u64;

    if opts.skip_existing && !opts.dry_run && !payloads.is_empty() {
        match client.existing_ids(&source.collection).await {
            Ok(existing) => {
                let before = payloads.len();
                payloads.retain(|p| !existing.contains(&p.id));
                result.skipped = (before - payloads.len()) as u64;
            }
            Err(e) => {
                warn!(
                    "{}: could not list existing documents ({}), proceeding with upload",
                    label, e
                );
            }
        }
    }

    let batch_size = opts.batch_size.unwrap_or(config.api.batch_size).max(1);
    let batches: Vec<Vec<IngestPayload>> = payloads
        .chunks(batch_size)
        .map(|chunk| chunk.to_vec())
        .collect();
    let total_batches = batches.len() as u64;

    if opts.dry_run {
        print_summary(label, processed, normalized, total_batches, &result, true);
        return Ok(result);
    }

    let mut reports = stream::iter(batches)
        .map(|batch| {
            let collection = source.collection.clone();
            let cancelled = Arc::clone(cancelled);
            async move {
                if cancelled.load(Ordering::SeqCst) {
                    abort_report(&batch)
                } else {
                    client.send_batch(&collection, &batch).await
                }
            }
        })
        .buffer_unordered(config.api.max_in_flight.max(1));

    // The result accumulator is only touched here, one report at a time.
    let mut done: u64 = 0;
    while let Some(report) = reports.next().await {
        done += 1;
        result.accepted += report.accepted;
        result.retries += report.retries;
        for failure in &report.failures {
            debug!(id = %failure.id, kind = %failure.kind, "record failed: {}", failure.reason);
        }
        result.failures.extend(report.failures);
        progress.report(ProgressEvent::Sending {
            source: label.to_string(),
            done,
            total: total_batches,
        });
    }

    print_summary(label, processed, normalized, total_batches, &result, false);
    Ok(result)
}

fn abort_report(batch: &[IngestPayload]) -> BatchReport {
    let mut report = BatchReport::default();
    for payload in batch {
        report.failures.push(RecordFailure {
            id: payload.id.clone(),
            kind: FailureKind::Aborted,
            reason: "run interrupted before batch was sent".to_string(),
        });
    }
    report
}

fn print_summary(
    label: &str,
    processed: u64,
    normalized: u64,
    batches: u64,
    result: &IngestResult,
    dry_run: bool,
) {
    if dry_run {
        println!("ingest {} (dry-run)", label);
        println!("  records read: {}", processed);
        println!("  normalized: {}", normalized);
        println!("  batches to send: {}", batches);
    } else {
        println!("ingest {}", label);
        println!("  records read: {}", processed);
        println!("  normalized: {}", normalized);
        if result.skipped > 0 {
            println!("  skipped (already present): {}", result.skipped);
        }
        println!("  batches sent: {}", batches);
        println!("  accepted: {}", result.accepted);
    }
    println!("  failed: {}", result.failed());
    for (kind, count) in result.counts_by_kind() {
        println!("    {}: {}", kind, count);
    }
    if result.retries > 0 {
        println!("  retries: {}", result.retries);
    }
    println!("ok");
}
