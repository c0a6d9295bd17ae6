// src/config.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::{
    artifact::{ArtifactIndex, FsArtifactWriter},
    source::{JsonDocumentStore, RowSourceAdapter, SourceLocation},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// `page`/`posts` are paths to delimited export files.
    #[default]
    Csv,
    /// `page`/`posts` are collection names in `documents_dir`.
    Documents,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub page: Option<String>,
    pub posts: Option<String>,
    pub documents_dir: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Csv,
            page: None,
            posts: None,
            documents_dir: PathBuf::from("data"),
        }
    }
}

/// Runtime settings, from an optional YAML file plus environment overrides.
///
/// ```yaml
/// page_id: "1234"
/// source:
///   kind: documents
///   documents_dir: ./data
/// output_dir: ./graphs
/// refresh_interval_secs: 3600
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub page_id: String,
    pub source: SourceConfig,
    pub output_dir: PathBuf,
    pub wrap_raw: bool,
    /// No background refresh when unset.
    pub refresh_interval_secs: Option<u64>,
    pub port: u16,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_id: "page".to_string(),
            source: SourceConfig::default(),
            output_dir: PathBuf::from("graphs"),
            wrap_raw: true,
            refresh_interval_secs: None,
            port: 8080,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Override fields from `PORT`, `LOG_LEVEL`, `PAGEREPORT_PAGE_ID`,
    /// `PAGEREPORT_OUTPUT_DIR` and `PAGEREPORT_DOCUMENTS_DIR`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a port number: {:?}", port))?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(page_id) = lookup("PAGEREPORT_PAGE_ID") {
            self.page_id = page_id;
        }
        if let Some(dir) = lookup("PAGEREPORT_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("PAGEREPORT_DOCUMENTS_DIR") {
            self.source.documents_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn page_location(&self) -> SourceLocation {
        self.location(self.source.page.as_deref(), "data/page.csv", "fbpages")
    }

    pub fn posts_location(&self) -> SourceLocation {
        self.location(self.source.posts.as_deref(), "data/posts.csv", "fbposts")
    }

    fn location(&self, given: Option<&str>, file: &str, collection: &str) -> SourceLocation {
        match self.source.kind {
            SourceKind::Csv => SourceLocation::File(PathBuf::from(given.unwrap_or(file))),
            SourceKind::Documents => SourceLocation::Collection(given.unwrap_or(collection).to_string()),
        }
    }

    pub fn adapter(&self) -> RowSourceAdapter {
        match self.source.kind {
            SourceKind::Csv => RowSourceAdapter::files(),
            SourceKind::Documents => RowSourceAdapter::with_documents(Arc::new(
                JsonDocumentStore::new(&self.source.documents_dir),
            )),
        }
    }

    pub fn writer(&self) -> FsArtifactWriter {
        FsArtifactWriter::new(&self.output_dir).wrap_raw(self.wrap_raw)
    }

    pub fn index(&self) -> ArtifactIndex {
        ArtifactIndex::new(&self.output_dir)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
