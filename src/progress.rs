//! Run progress reporting.
//!
//! Emits observable progress while a source is read, normalized, and sent, so
//! operators see what is happening during long document ingestions. Progress
//! goes to **stderr**, keeping stdout parseable for automation.

use std::io::Write;

/// A progress event, following the run through its phases.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// The source is being enumerated. Totals are not known yet.
    Reading { source: String },
    /// Records normalized so far.
    Normalizing { source: String, records: u64 },
    /// Batches completed out of the total for this source.
    Sending {
        source: String,
        done: u64,
        total: u64,
    },
}

/// Reports run progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly lines: "ingest documents  sending  3 / 12 batches".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Reading { source } => {
                format!("ingest {}  reading...\n", source)
            }
            ProgressEvent::Normalizing { source, records } => {
                format!(
                    "ingest {}  normalizing  {} records\n",
                    source,
                    format_number(*records)
                )
            }
            ProgressEvent::Sending {
                source,
                done,
                total,
            } => {
                format!(
                    "ingest {}  sending  {} / {} batches\n",
                    source,
                    format_number(*done),
                    format_number(*total)
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Reading { source } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": "reading"
            }),
            ProgressEvent::Normalizing { source, records } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": "normalizing",
                "records": records
            }),
            ProgressEvent::Sending {
                source,
                done,
                total,
            } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": "sending",
                "done": done,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
