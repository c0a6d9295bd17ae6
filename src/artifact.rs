// src/artifact.rs
use chrono::{DateTime, Utc};
use glob::{glob, Pattern};
use serde::Serialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{ReportError, Result};

const RAW_OPEN: &str = "{% raw %}";
const RAW_CLOSE: &str = "{% endraw %}";

/// Artifact file name for one (page, report) pair.
pub fn artifact_name(page_id: &str, report: &str) -> String {
    format!("{}_{}_analytics.html", page_id, report)
}

/// Persists a rendered artifact under a name.
pub trait ArtifactWriter: Send + Sync {
    fn write(&self, name: &str, html: &str) -> Result<PathBuf>;
}

/// Writes artifacts into a directory, atomically.
#[derive(Debug, Clone)]
pub struct FsArtifactWriter {
    dir: PathBuf,
    wrap_raw: bool,
}

impl FsArtifactWriter {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            wrap_raw: false,
        }
    }

    /// Wrap output in `{% raw %}`/`{% endraw %}` so a template layer passes
    /// it through untouched.
    pub fn wrap_raw(mut self, wrap: bool) -> Self {
        self.wrap_raw = wrap;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactWriter for FsArtifactWriter {
    #[tracing::instrument(level = "debug", skip(self, html), fields(bytes = html.len()))]
    fn write(&self, name: &str, html: &str) -> Result<PathBuf> {
        let path = self.dir.join(name);
        let fail = |reason: String| ReportError::ArtifactWriteFailure {
            path: path.display().to_string(),
            reason,
        };

        fs::create_dir_all(&self.dir)
            .map_err(|e| fail(format!("creating {}: {}", self.dir.display(), e)))?;

        // write to a temp file in the same directory, then rename over the target
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| fail(e.to_string()))?;
        if self.wrap_raw {
            writeln!(tmp, "{}", RAW_OPEN).map_err(|e| fail(e.to_string()))?;
        }
        tmp.write_all(html.as_bytes())
            .map_err(|e| fail(e.to_string()))?;
        if self.wrap_raw {
            write!(tmp, "\n{}\n", RAW_CLOSE).map_err(|e| fail(e.to_string()))?;
        }
        tmp.flush().map_err(|e| fail(e.to_string()))?;
        tmp.persist(&path).map_err(|e| fail(e.error.to_string()))?;

        info!(path = %path.display(), "wrote artifact");
        Ok(path)
    }
}

/// One artifact on disk, as listed by the index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactEntry {
    /// File stem, used in `/graphs/<id>`.
    pub id: String,
    pub file_name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub created: DateTime<Utc>,
}

/// Read side of the artifact directory.
#[derive(Debug, Clone)]
pub struct ArtifactIndex {
    dir: PathBuf,
}

impl ArtifactIndex {
    pub const CURRENT: &'static str = "current";

    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// All `.html` artifacts, newest first. Creation time is used where the
    /// filesystem records it, modification time otherwise.
    pub fn list(&self) -> Result<Vec<ArtifactEntry>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let pattern = format!(
            "{}/*.html",
            Pattern::escape(&self.dir.to_string_lossy())
        );
        let paths = glob(&pattern).map_err(|e| ReportError::unavailable(&pattern, e))?;

        let mut entries = Vec::new();
        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable artifact");
                    continue;
                }
            };
            let Some(meta) = fs::metadata(&path).ok().filter(|m| m.is_file()) else {
                continue;
            };
            let created = meta
                .created()
                .or_else(|_| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            let (Some(id), Some(file_name)) = (
                path.file_stem().and_then(|s| s.to_str()).map(str::to_string),
                path.file_name().and_then(|s| s.to_str()).map(str::to_string),
            ) else {
                continue;
            };
            entries.push(ArtifactEntry {
                id,
                file_name,
                path,
                created: DateTime::<Utc>::from(created),
            });
        }

        entries.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.id.cmp(&b.id)));
        debug!(dir = %self.dir.display(), count = entries.len(), "listed artifacts");
        Ok(entries)
    }

    /// Look an artifact up by id (file stem or file name). `current` is the
    /// newest one. Unknown ids give `None`.
    pub fn resolve(&self, id: &str) -> Result<Option<ArtifactEntry>> {
        let entries = self.list()?;
        if id == Self::CURRENT {
            return Ok(entries.into_iter().next());
        }
        Ok(entries
            .into_iter()
            .find(|e| e.id == id || e.file_name == id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{thread, time::Duration};
    use tempfile::tempdir;

    #[test]
    fn writer_creates_directories_and_wraps() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let dir = tmp.path().join("static").join("graphs");

        let plain = FsArtifactWriter::new(&dir).write("a.html", "<p>a</p>")?;
        assert_eq!(fs::read_to_string(&plain)?, "<p>a</p>");

        let wrapped = FsArtifactWriter::new(&dir)
            .wrap_raw(true)
            .write("b.html", "<p>{{ b }}</p>")?;
        let text = fs::read_to_string(&wrapped)?;
        assert!(text.starts_with("{% raw %}\n<p>{{ b }}</p>"));
        assert!(text.trim_end().ends_with("{% endraw %}"));
        Ok(())
    }

    #[test]
    fn writer_replaces_existing_artifact() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let writer = FsArtifactWriter::new(tmp.path());
        writer.write("p.html", "old")?;
        let path = writer.write("p.html", "new")?;
        assert_eq!(fs::read_to_string(path)?, "new");
        // no temp files left behind
        assert_eq!(fs::read_dir(tmp.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn writer_reports_unwritable_target() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let blocker = tmp.path().join("file");
        fs::write(&blocker, "x")?;
        let err = FsArtifactWriter::new(blocker.join("sub"))
            .write("a.html", "x")
            .unwrap_err();
        assert!(matches!(err, ReportError::ArtifactWriteFailure { .. }));
        Ok(())
    }

    #[test]
    fn index_lists_newest_first_and_resolves_current() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let writer = FsArtifactWriter::new(tmp.path());
        writer.write(&artifact_name("42", "page"), "page")?;
        thread::sleep(Duration::from_millis(50));
        writer.write(&artifact_name("42", "post"), "posts")?;
        fs::write(tmp.path().join("notes.txt"), "ignored")?;

        let index = ArtifactIndex::new(tmp.path());
        let ids: Vec<String> = index.list()?.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["42_post_analytics", "42_page_analytics"]);

        let current = index.resolve(ArtifactIndex::CURRENT)?.map(|e| e.id);
        assert_eq!(current.as_deref(), Some("42_post_analytics"));
        assert!(index.resolve("42_page_analytics.html")?.is_some());
        assert!(index.resolve("nope")?.is_none());
        Ok(())
    }

    #[test]
    fn missing_directory_lists_nothing() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let index = ArtifactIndex::new(tmp.path().join("absent"));
        assert!(index.list()?.is_empty());
        assert!(index.resolve(ArtifactIndex::CURRENT)?.is_none());
        Ok(())
    }
}
