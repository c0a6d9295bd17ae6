// src/source/documents.rs
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

use crate::{
    error::{ReportError, Result},
    table::{CellValue, RawRecord},
};

/// A store of named collections of heterogeneous documents.
pub trait DocumentStore: Send + Sync {
    /// Every document in `collection`, in store order. An unknown or
    /// unreachable collection is `SourceUnavailable`.
    fn documents(&self, collection: &str) -> Result<Vec<RawRecord>>;
}

/// Collections kept as files in one directory: `<name>.json` holding an array
/// of objects, or `<name>.jsonl` holding one object per line.
pub struct JsonDocumentStore {
    dir: PathBuf,
}

impl JsonDocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read(&self, collection: &str) -> Result<Vec<Map<String, Value>>> {
        let array_path = self.dir.join(format!("{}.json", collection));
        let lines_path = self.dir.join(format!("{}.jsonl", collection));

        if array_path.is_file() {
            let text = fs::read_to_string(&array_path)
                .map_err(|e| ReportError::unavailable(array_path.display(), e))?;
            let docs: Vec<Value> = serde_json::from_str(&text)
                .map_err(|e| ReportError::unavailable(array_path.display(), e))?;
            return Ok(objects(docs, collection));
        }

        if lines_path.is_file() {
            let text = fs::read_to_string(&lines_path)
                .map_err(|e| ReportError::unavailable(lines_path.display(), e))?;
            let mut docs = Vec::new();
            for (idx, line) in text.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let doc: Value = serde_json::from_str(line).map_err(|e| {
                    ReportError::unavailable(lines_path.display(), format!("line {}: {}", idx + 1, e))
                })?;
                docs.push(doc);
            }
            return Ok(objects(docs, collection));
        }

        Err(ReportError::unavailable(
            collection,
            format!("no collection file in {}", self.dir.display()),
        ))
    }
}

impl DocumentStore for JsonDocumentStore {
    #[tracing::instrument(level = "info", skip(self), fields(dir = %self.dir.display()))]
    fn documents(&self, collection: &str) -> Result<Vec<RawRecord>> {
        let docs = self.read(collection)?;
        debug!(count = docs.len(), "read documents");
        Ok(docs.into_iter().map(to_record).collect())
    }
}

fn objects(docs: Vec<Value>, collection: &str) -> Vec<Map<String, Value>> {
    let mut skipped = 0usize;
    let out = docs
        .into_iter()
        .filter_map(|d| match d {
            Value::Object(map) => Some(map),
            _ => {
                skipped += 1;
                None
            }
        })
        .collect();
    if skipped > 0 {
        warn!(collection, skipped, "non-object documents ignored");
    }
    out
}

fn to_record(doc: Map<String, Value>) -> RawRecord {
    doc.into_iter()
        .map(|(field, value)| {
            let cell = match value {
                Value::Null => CellValue::Null,
                Value::String(s) => CellValue::Text(s),
                Value::Number(n) => match n.as_f64() {
                    Some(f) => CellValue::Number(f),
                    None => CellValue::Text(n.to_string()),
                },
                Value::Bool(b) => CellValue::Text(b.to_string()),
                other => CellValue::Text(other.to_string()),
            };
            (field, cell)
        })
        .collect()
}
