//! Record normalization.
//!
//! Maps a [`RawRecord`] into the canonical [`IngestPayload`]. Normalization is
//! deterministic: the same raw record always yields the same id, which is what
//! lets the remote store upsert on re-ingestion instead of duplicating.
//!
//! Document ids are the sha256 of the source kind and the file's relative
//! path. Row ids come from the configured key column, or fall back to the row
//! index with a warning.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::FailureKind;
use crate::models::{IngestPayload, IngestionSource, MetaValue, RawRecord, RecordFailure};

pub fn normalize(
    source: &IngestionSource,
    record: &RawRecord,
) -> Result<IngestPayload, RecordFailure> {
    match record {
        RawRecord::Document {
            relative_path,
            absolute_path,
        } => normalize_document(source, relative_path, absolute_path),
        RawRecord::Row {
            index,
            headers,
            fields,
        } => Ok(normalize_row(source, *index, headers, fields)),
    }
}

fn normalize_document(
    source: &IngestionSource,
    relative_path: &str,
    absolute_path: &std::path::Path,
) -> Result<IngestPayload, RecordFailure> {
    let mut hasher = Sha256::new();
    hasher.update(source.kind.slug().as_bytes());
    hasher.update(relative_path.as_bytes());
    let id = format!("{:x}", hasher.finalize());

    let bytes = std::fs::read(absolute_path).map_err(|e| RecordFailure {
        id: id.clone(),
        kind: FailureKind::Format,
        reason: format!("unreadable file {}: {}", relative_path, e),
    })?;
    let size_bytes = bytes.len() as i64;

    let text = match String::from_utf8(bytes) {
        Ok(text) if !text.contains('\0') => text,
        _ => {
            return Err(RecordFailure {
                id,
                kind: FailureKind::Format,
                reason: format!("{}: binary or undecodable content", relative_path),
            })
        }
    };

    let mut metadata = BTreeMap::new();
    metadata.insert(
        "source".to_string(),
        MetaValue::Str(source.kind.slug().to_string()),
    );
    metadata.insert(
        "path".to_string(),
        MetaValue::Str(relative_path.to_string()),
    );
    if let Some(name) = absolute_path.file_name() {
        metadata.insert(
            "filename".to_string(),
            MetaValue::Str(name.to_string_lossy().to_string()),
        );
    }
    if let Some(ext) = absolute_path.extension() {
        metadata.insert(
            "file_type".to_string(),
            MetaValue::Str(ext.to_string_lossy().to_lowercase()),
        );
    }
    metadata.insert("size_bytes".to_string(), MetaValue::Int(size_bytes));
    if let Ok(modified) = std::fs::metadata(absolute_path).and_then(|m| m.modified()) {
        let ts = DateTime::<Utc>::from(modified).to_rfc3339_opts(SecondsFormat::Secs, true);
        metadata.insert("modified".to_string(), MetaValue::Str(ts));
    }

    Ok(IngestPayload { id, text, metadata })
}

fn normalize_row(
    source: &IngestionSource,
    index: usize,
    headers: &[String],
    fields: &[String],
) -> IngestPayload {
    let slug = source.kind.slug();

    let field = |column: &str| -> &str {
        headers
            .iter()
            .position(|h| h == column)
            .and_then(|i| fields.get(i))
            .map(String::as_str)
            .unwrap_or("")
            .trim()
    };

    let id = match source.key_column.as_deref().map(|col| (col, field(col))) {
        Some((_, key)) if !key.is_empty() => format!("{}:{}", slug, key),
        Some((col, _)) => {
            warn!("{} row {}: empty key column '{}', using row index", slug, index, col);
            format!("{}:row-{}", slug, index)
        }
        None => {
            warn!("{} row {}: no key column configured, using row index", slug, index);
            format!("{}:row-{}", slug, index)
        }
    };

    // Searchable text is the configured columns, or every column when none
    // are configured, formatted one "column: value" line per column.
    let text_columns: Vec<&str> = if source.text_columns.is_empty() {
        headers.iter().map(String::as_str).collect()
    } else {
        source.text_columns.iter().map(String::as_str).collect()
    };
    let text = text_columns
        .iter()
        .map(|col| format!("{}: {}", col, field(col)))
        .collect::<Vec<_>>()
        .join("\n");

    let mut metadata = BTreeMap::new();
    metadata.insert("source".to_string(), MetaValue::Str(slug.to_string()));
    for header in headers {
        if text_columns.contains(&header.as_str()) {
            continue;
        }
        metadata.insert(header.clone(), infer_meta(field(header)));
    }

    IngestPayload { id, text, metadata }
}

/// Best-effort scalar typing: boolean, integer, float, else string.
fn infer_meta(raw: &str) -> MetaValue {
    if raw.eq_ignore_ascii_case("true") {
        return MetaValue::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return MetaValue::Bool(false);
    }
    if let Ok(int) = raw.parse::<i64>() {
        return MetaValue::Int(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        if float.is_finite() {
            return MetaValue::Float(float);
        }
    }
    MetaValue::Str(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;
    use std::fs;
    use std::sync::Arc;

    fn doc_source(root: &std::path::Path) -> IngestionSource {
        IngestionSource {
            kind: SourceKind::Documents,
            location: root.to_path_buf(),
            collection: "documents".to_string(),
            required: true,
            key_column: None,
            text_columns: Vec::new(),
            include_globs: vec!["**/*".to_string()],
            exclude_globs: Vec::new(),
        }
    }

    fn row_source(key: Option<&str>, text_columns: &[&str]) -> IngestionSource {
        IngestionSource {
            kind: SourceKind::Products,
            location: "products.csv".into(),
            collection: "products".to_string(),
            required: false,
            key_column: key.map(str::to_string),
            text_columns: text_columns.iter().map(|s| s.to_string()).collect(),
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
        }
    }

    fn row(index: usize, headers: &[&str], fields: &[&str]) -> RawRecord {
        RawRecord::Row {
            index,
            headers: Arc::from(
                headers
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<String>>(),
            ),
            fields: fields.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn document_id_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tea.md"), "# Tea\n\nSteeping notes.").unwrap();
        let source = doc_source(dir.path());
        let record = RawRecord::Document {
            relative_path: "tea.md".to_string(),
            absolute_path: dir.path().join("tea.md"),
        };

        let first = normalize(&source, &record).unwrap();
        let second = normalize(&source, &record).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.text, "# Tea\n\nSteeping notes.");
        assert_eq!(
            first.metadata.get("filename"),
            Some(&MetaValue::Str("tea.md".to_string()))
        );
        assert_eq!(
            first.metadata.get("file_type"),
            Some(&MetaValue::Str("md".to_string()))
        );
    }

    #[test]
    fn different_paths_get_different_ids() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "same").unwrap();
        fs::write(dir.path().join("b.md"), "same").unwrap();
        let source = doc_source(dir.path());

        let a = normalize(
            &source,
            &RawRecord::Document {
                relative_path: "a.md".to_string(),
                absolute_path: dir.path().join("a.md"),
            },
        )
        .unwrap();
        let b = normalize(
            &source,
            &RawRecord::Document {
                relative_path: "b.md".to_string(),
                absolute_path: dir.path().join("b.md"),
            },
        )
        .unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn binary_content_is_a_format_failure() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("blob.md"), [0xFFu8, 0x00, 0x1B, 0x99]).unwrap();
        let source = doc_source(dir.path());
        let record = RawRecord::Document {
            relative_path: "blob.md".to_string(),
            absolute_path: dir.path().join("blob.md"),
        };

        let failure = normalize(&source, &record).unwrap_err();
        assert_eq!(failure.kind, FailureKind::Format);
        assert!(!failure.id.is_empty());
    }

    #[test]
    fn row_id_comes_from_key_column() {
        let source = row_source(Some("sku"), &["name", "description"]);
        let record = row(
            0,
            &["sku", "name", "description", "price", "organic"],
            &["A1", "Green tea", "Loose leaf", "4.50", "true"],
        );

        let payload = normalize(&source, &record).unwrap();
        assert_eq!(payload.id, "products:A1");
        assert_eq!(payload.text, "name: Green tea\ndescription: Loose leaf");
        assert_eq!(payload.metadata.get("price"), Some(&MetaValue::Float(4.5)));
        assert_eq!(
            payload.metadata.get("organic"),
            Some(&MetaValue::Bool(true))
        );
        assert_eq!(
            payload.metadata.get("sku"),
            Some(&MetaValue::Str("A1".to_string()))
        );
        // Searchable columns stay out of metadata.
        assert!(payload.metadata.get("name").is_none());
    }

    #[test]
    fn empty_key_falls_back_to_row_index() {
        let source = row_source(Some("sku"), &["name"]);
        let record = row(7, &["sku", "name"], &["", "Verbena"]);
        let payload = normalize(&source, &record).unwrap();
        assert_eq!(payload.id, "products:row-7");
    }

    #[test]
    fn no_key_column_uses_row_index_and_all_columns_as_text() {
        let source = row_source(None, &[]);
        let record = row(2, &["name", "region"], &["Sencha", "Shizuoka"]);
        let payload = normalize(&source, &record).unwrap();
        assert_eq!(payload.id, "products:row-2");
        assert_eq!(payload.text, "name: Sencha\nregion: Shizuoka");
        // All columns are searchable, so only the source marker remains.
        assert_eq!(payload.metadata.len(), 1);
    }

    #[test]
    fn metadata_type_inference() {
        assert_eq!(infer_meta("true"), MetaValue::Bool(true));
        assert_eq!(infer_meta("FALSE"), MetaValue::Bool(false));
        assert_eq!(infer_meta("42"), MetaValue::Int(42));
        assert_eq!(infer_meta("-3"), MetaValue::Int(-3));
        assert_eq!(infer_meta("4.50"), MetaValue::Float(4.5));
        assert_eq!(infer_meta("kg"), MetaValue::Str("kg".to_string()));
        assert_eq!(infer_meta(""), MetaValue::Str(String::new()));
    }

    #[test]
    fn normalization_is_idempotent_for_rows() {
        let source = row_source(Some("id"), &["bio"]);
        let record = row(0, &["id", "bio", "city"], &["p-9", "Herbalist", "Lyon"]);
        assert_eq!(
            normalize(&source, &record).unwrap(),
            normalize(&source, &record).unwrap()
        );
    }
}
