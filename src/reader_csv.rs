//! Tabular source reader for practitioner and product files.
//!
//! Reads one delimited file in full (the target corpora are small), validating
//! the header before any row is processed. A missing file is a configuration
//! problem; a header missing required columns is a format problem. Both are
//! detected before any network call is made. Individual malformed rows are
//! recorded and skipped, never fatal.

use std::sync::Arc;

use tracing::warn;

use crate::error::{FailureKind, IngestError};
use crate::models::{IngestionSource, RawRecord, RecordFailure};

/// The parsed content of one tabular file.
#[derive(Debug)]
pub struct Table {
    pub headers: Arc<[String]>,
    pub records: Vec<RawRecord>,
    /// Rows the csv parser could not decode, recorded as format failures.
    pub failures: Vec<RecordFailure>,
}

pub fn read_table(source: &IngestionSource) -> Result<Table, IngestError> {
    let path = &source.location;
    if !path.is_file() {
        return Err(IngestError::Configuration(format!(
            "{} file not found: {}",
            source.kind,
            path.display()
        )));
    }

    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        IngestError::Format(format!("cannot open {}: {}", path.display(), e))
    })?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| IngestError::Format(format!("unreadable header row: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(IngestError::Format(format!(
            "{} has no header row",
            path.display()
        )));
    }

    let mut required: Vec<&String> = source.text_columns.iter().collect();
    if let Some(key) = &source.key_column {
        required.push(key);
    }
    let missing: Vec<&str> = required
        .into_iter()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(IngestError::Format(format!(
            "{} header is missing required column(s): {}",
            path.display(),
            missing.join(", ")
        )));
    }

    let headers: Arc<[String]> = headers.into();
    let mut records = Vec::new();
    let mut failures = Vec::new();

    for (index, row) in reader.records().enumerate() {
        match row {
            Ok(fields) => records.push(RawRecord::Row {
                index,
                headers: Arc::clone(&headers),
                fields: fields.iter().map(str::to_string).collect(),
            }),
            Err(e) => {
                let id = format!("{}:row-{}", source.kind.slug(), index);
                warn!(%id, "skipping malformed row: {}", e);
                failures.push(RecordFailure {
                    id,
                    kind: FailureKind::Format,
                    reason: format!("malformed row: {}", e),
                });
            }
        }
    }

    Ok(Table {
        headers,
        records,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;
    use std::fs;
    use std::path::Path;

    fn table_source(path: &Path) -> IngestionSource {
        IngestionSource {
            kind: SourceKind::Products,
            location: path.to_path_buf(),
            collection: "products".to_string(),
            required: false,
            key_column: Some("sku".to_string()),
            text_columns: vec!["name".to_string(), "description".to_string()],
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
        }
    }

    #[test]
    fn reads_rows_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.csv");
        fs::write(
            &path,
            "sku,name,description,price\nA1,Green tea,Loose leaf,4.50\nB2,Chamomile,Herbal infusion,3.20\n",
        )
        .unwrap();

        let table = read_table(&table_source(&path)).unwrap();
        assert_eq!(&*table.headers, &["sku", "name", "description", "price"]);
        assert_eq!(table.records.len(), 2);
        assert!(table.failures.is_empty());

        match &table.records[0] {
            RawRecord::Row { index, fields, .. } => {
                assert_eq!(*index, 0);
                assert_eq!(fields[0], "A1");
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = table_source(&dir.path().join("absent.csv"));
        assert!(matches!(
            read_table(&source),
            Err(IngestError::Configuration(_))
        ));
    }

    #[test]
    fn missing_required_column_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.csv");
        fs::write(&path, "sku,name,price\nA1,Green tea,4.50\n").unwrap();

        let err = read_table(&table_source(&path)).unwrap_err();
        match err {
            IngestError::Format(msg) => assert!(msg.contains("description")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn malformed_row_is_recorded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.csv");
        // Second row has too few fields.
        fs::write(
            &path,
            "sku,name,description\nA1,Tea,Fine\nB2,Mint\nC3,Verbena,Lemony\n",
        )
        .unwrap();

        let table = read_table(&table_source(&path)).unwrap();
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.failures.len(), 1);
        assert_eq!(table.failures[0].kind, FailureKind::Format);
        assert_eq!(table.failures[0].id, "products:row-1");
    }

    #[test]
    fn empty_file_has_no_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "").unwrap();

        assert!(matches!(
            read_table(&table_source(&path)),
            Err(IngestError::Format(_))
        ));
    }
}
