//! Documents source reader.
//!
//! Walks a directory lazily and yields one [`RawRecord::Document`] per file
//! matching the include/exclude globs. File content is not read here, so a
//! large corpus is never buffered; unreadable entries are skipped with a
//! warning. Creating a new walker over the same directory re-enumerates it,
//! which makes the sequence restartable.

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;
use walkdir::WalkDir;

use crate::error::IngestError;
use crate::models::{IngestionSource, RawRecord};

pub struct DocumentWalker {
    root: std::path::PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    inner: walkdir::IntoIter,
}

impl DocumentWalker {
    pub fn new(source: &IngestionSource) -> Result<Self, IngestError> {
        let root = &source.location;
        if !root.is_dir() {
            return Err(IngestError::Configuration(format!(
                "documents directory not found: {}",
                root.display()
            )));
        }

        let include = build_globset(&source.include_globs)?;

        let mut excludes = vec![
            "**/.git/**".to_string(),
            "**/target/**".to_string(),
            "**/node_modules/**".to_string(),
        ];
        excludes.extend(source.exclude_globs.iter().cloned());
        let exclude = build_globset(&excludes)?;

        // Sorted traversal keeps record order deterministic across runs.
        let inner = WalkDir::new(root).sort_by_file_name().into_iter();

        Ok(Self {
            root: root.clone(),
            include,
            exclude,
            inner,
        })
    }
}

impl Iterator for DocumentWalker {
    type Item = RawRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if self.exclude.is_match(&rel_str) || !self.include.is_match(&rel_str) {
                continue;
            }

            return Some(RawRecord::Document {
                relative_path: rel_str,
                absolute_path: path.to_path_buf(),
            });
        }
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, IngestError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            IngestError::Configuration(format!("invalid glob pattern '{}': {}", pattern, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| IngestError::Configuration(format!("invalid glob set: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;
    use std::fs;

    fn doc_source(root: &std::path::Path) -> IngestionSource {
        IngestionSource {
            kind: SourceKind::Documents,
            location: root.to_path_buf(),
            collection: "documents".to_string(),
            required: true,
            key_column: None,
            text_columns: Vec::new(),
            include_globs: vec!["**/*.md".to_string(), "**/*.txt".to_string()],
            exclude_globs: vec!["**/drafts/**".to_string()],
        }
    }

    fn relative_paths(source: &IngestionSource) -> Vec<String> {
        DocumentWalker::new(source)
            .unwrap()
            .map(|record| match record {
                RawRecord::Document { relative_path, .. } => relative_path,
                other => panic!("unexpected record: {:?}", other),
            })
            .collect()
    }

    #[test]
    fn walks_matching_files_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("beta.md"), "b").unwrap();
        fs::write(dir.path().join("alpha.txt"), "a").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/gamma.md"), "g").unwrap();
        fs::write(dir.path().join("ignored.pdf"), "binary").unwrap();

        let paths = relative_paths(&doc_source(dir.path()));
        assert_eq!(paths, vec!["alpha.txt", "beta.md", "nested/gamma.md"]);
    }

    #[test]
    fn exclude_globs_are_honored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.md"), "k").unwrap();
        fs::create_dir(dir.path().join("drafts")).unwrap();
        fs::write(dir.path().join("drafts/skip.md"), "s").unwrap();

        let paths = relative_paths(&doc_source(dir.path()));
        assert_eq!(paths, vec!["keep.md"]);
    }

    #[test]
    fn missing_directory_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = doc_source(dir.path());
        source.location = dir.path().join("no-such-dir");
        assert!(matches!(
            DocumentWalker::new(&source),
            Err(IngestError::Configuration(_))
        ));
    }

    #[test]
    fn walk_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one.md"), "1").unwrap();
        fs::write(dir.path().join("two.md"), "2").unwrap();

        let source = doc_source(dir.path());
        assert_eq!(relative_paths(&source), relative_paths(&source));
    }
}
