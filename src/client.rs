//! HTTP client for the remote vector-database API.
//!
//! One [`IngestClient`] is constructed per run and passed by reference; it
//! owns a single `reqwest::Client` with a bounded connection pool and the
//! per-request timeout.
//!
//! # Retry strategy
//!
//! - Connection errors and HTTP 429/5xx are transient: retried with
//!   exponential backoff (1s, 2s, 4s, ... capped at 2^5).
//! - Other 4xx responses are permanent: every id in the batch is recorded as
//!   failed, no retry.
//! - A 2xx response may carry per-item verdicts or one verdict for the whole
//!   batch; both shapes are handled, and partial rejections surface as per-id
//!   failures rather than failing the batch.

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::{FailureKind, IngestError};
use crate::models::{IngestPayload, RecordFailure};

/// Outcome of sending one batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub accepted: u64,
    pub failures: Vec<RecordFailure>,
    /// Retried attempts for this batch, surfaced for observability.
    pub retries: u64,
}

pub struct IngestClient {
    http: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl IngestClient {
    pub fn new(api: &ApiConfig) -> Result<Self, IngestError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .pool_max_idle_per_host(api.max_in_flight)
            .build()
            .map_err(|e| {
                IngestError::Configuration(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            max_retries: api.max_retries,
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/collections/{}/documents", self.base_url, collection)
    }

    /// Send one batch as a JSON array. Every outcome is expressible in the
    /// report, so this never fails the run as a whole.
    pub async fn send_batch(&self, collection: &str, batch: &[IngestPayload]) -> BatchReport {
        let url = self.collection_url(collection);
        let mut report = BatchReport::default();
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                report.retries += 1;
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(
                    "retrying batch of {} after {:?} (attempt {})",
                    batch.len(),
                    delay,
                    attempt + 1
                );
                tokio::time::sleep(delay).await;
            }

            let resp = self.http.post(&url).json(&batch).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        match response.json::<BatchResponse>().await {
                            Ok(parsed) => apply_response(batch, parsed, &mut report),
                            Err(e) => fail_all(
                                batch,
                                &mut report,
                                FailureKind::PermanentApi,
                                format!("unrecognized response: {}", e),
                            ),
                        }
                        return report;
                    }

                    // Rate limited or server error: retry.
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body = response.text().await.unwrap_or_default();
                        last_err = Some(format!("API error {}: {}", status, body));
                        continue;
                    }

                    // Client error (not 429): permanent, recorded per id.
                    let body = response.text().await.unwrap_or_default();
                    let reason = IngestError::PermanentApi {
                        status: status.as_u16(),
                        body,
                    }
                    .to_string();
                    fail_all(batch, &mut report, FailureKind::PermanentApi, reason);
                    return report;
                }
                Err(e) => {
                    last_err = Some(e.to_string());
                    continue;
                }
            }
        }

        let reason = last_err.unwrap_or_else(|| "batch send failed".to_string());
        fail_all(
            batch,
            &mut report,
            FailureKind::TransientNetwork,
            format!("exhausted retries: {}", reason),
        );
        report
    }

    /// Ids already present in the collection, for the duplicate pre-check.
    pub async fn existing_ids(&self, collection: &str) -> Result<HashSet<String>, IngestError> {
        let url = self.collection_url(collection);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| IngestError::TransientNetwork(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::PermanentApi {
                status: status.as_u16(),
                body,
            });
        }

        let listing: CollectionListing = response
            .json()
            .await
            .map_err(|e| IngestError::Format(format!("unrecognized listing response: {}", e)))?;
        Ok(listing.documents.into_iter().map(|d| d.id).collect())
    }
}

/// The two response shapes a batch POST may be answered with.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BatchResponse {
    PerItem {
        results: Vec<ItemStatus>,
    },
    Whole {
        status: String,
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct ItemStatus {
    id: String,
    status: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CollectionListing {
    #[serde(default)]
    documents: Vec<ListedDocument>,
}

#[derive(Debug, Deserialize)]
struct ListedDocument {
    id: String,
}

fn apply_response(batch: &[IngestPayload], response: BatchResponse, report: &mut BatchReport) {
    match response {
        BatchResponse::PerItem { results } => {
            for item in results {
                if item.status != "accepted" {
                    report.failures.push(RecordFailure {
                        id: item.id,
                        kind: FailureKind::PermanentApi,
                        reason: item
                            .error
                            .unwrap_or_else(|| format!("rejected with status '{}'", item.status)),
                    });
                }
            }
            report.accepted += (batch.len() as u64).saturating_sub(report.failures.len() as u64);
        }
        BatchResponse::Whole { status, message } => {
            if status == "success" {
                report.accepted += batch.len() as u64;
            } else {
                let reason = format!(
                    "batch rejected ({}): {}",
                    status,
                    message.unwrap_or_default()
                );
                fail_all(batch, report, FailureKind::PermanentApi, reason);
            }
        }
    }
}

fn fail_all(batch: &[IngestPayload], report: &mut BatchReport, kind: FailureKind, reason: String) {
    for payload in batch {
        report.failures.push(RecordFailure {
            id: payload.id.clone(),
            kind,
            reason: reason.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn payloads(ids: &[&str]) -> Vec<IngestPayload> {
        ids.iter()
            .map(|id| IngestPayload {
                id: id.to_string(),
                text: "text".to_string(),
                metadata: BTreeMap::new(),
            })
            .collect()
    }

    #[test]
    fn per_item_shape_parses() {
        let body = r#"{"results": [
            {"id": "a", "status": "accepted"},
            {"id": "b", "status": "rejected", "error": "too large"}
        ]}"#;
        let parsed: BatchResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(parsed, BatchResponse::PerItem { .. }));
    }

    #[test]
    fn whole_batch_shape_parses() {
        let body = r#"{"status": "success", "chunks_added": 12}"#;
        let parsed: BatchResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(parsed, BatchResponse::Whole { .. }));
    }

    #[test]
    fn partial_rejection_surfaces_per_id() {
        let batch = payloads(&["a", "b", "c"]);
        let response: BatchResponse = serde_json::from_str(
            r#"{"results": [
                {"id": "a", "status": "accepted"},
                {"id": "b", "status": "rejected", "error": "too large"},
                {"id": "c", "status": "accepted"}
            ]}"#,
        )
        .unwrap();

        let mut report = BatchReport::default();
        apply_response(&batch, response, &mut report);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, "b");
        assert_eq!(report.failures[0].kind, FailureKind::PermanentApi);
        assert_eq!(report.failures[0].reason, "too large");
    }

    #[test]
    fn whole_batch_success_accepts_everything() {
        let batch = payloads(&["a", "b"]);
        let response: BatchResponse =
            serde_json::from_str(r#"{"status": "success"}"#).unwrap();
        let mut report = BatchReport::default();
        apply_response(&batch, response, &mut report);
        assert_eq!(report.accepted, 2);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn whole_batch_error_fails_every_id() {
        let batch = payloads(&["a", "b"]);
        let response: BatchResponse =
            serde_json::from_str(r#"{"status": "error", "message": "index locked"}"#).unwrap();
        let mut report = BatchReport::default();
        apply_response(&batch, response, &mut report);
        assert_eq!(report.accepted, 0);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures[0].reason.contains("index locked"));
    }

    #[test]
    fn listing_parses_ids() {
        let listing: CollectionListing = serde_json::from_str(
            r#"{"documents": [{"id": "x"}, {"id": "y"}], "total_documents": 2}"#,
        )
        .unwrap();
        let ids: Vec<String> = listing.documents.into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["x", "y"]);
    }
}
