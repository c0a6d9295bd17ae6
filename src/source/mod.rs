// src/source/mod.rs
pub mod csv_file;
pub mod documents;

use std::{fmt, path::PathBuf, sync::Arc};
use tracing::{info, warn};

use crate::{
    error::{ReportError, Result},
    select::{self, AnalyticsColumnSpec},
    table::Table,
};

pub use documents::{DocumentStore, JsonDocumentStore};

/// Where one logical source lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceLocation {
    /// A delimited export file.
    File(PathBuf),
    /// A collection in the configured document store.
    Collection(String),
}

impl SourceLocation {
    /// Stable cache key for this source.
    pub fn key(&self) -> String {
        match self {
            SourceLocation::File(path) => format!("file:{}", path.display()),
            SourceLocation::Collection(name) => name.clone(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::File(path) => write!(f, "{}", path.display()),
            SourceLocation::Collection(name) => write!(f, "collection {}", name),
        }
    }
}

/// Turns a [`SourceLocation`] into a normalized [`Table`].
#[derive(Clone, Default)]
pub struct RowSourceAdapter {
    documents: Option<Arc<dyn DocumentStore>>,
}

impl RowSourceAdapter {
    /// An adapter that only reads files.
    pub fn files() -> Self {
        Self { documents: None }
    }

    pub fn with_documents(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            documents: Some(store),
        }
    }

    /// Raw table for `location`, every column kept.
    pub fn load(&self, location: &SourceLocation) -> Result<Table> {
        match location {
            SourceLocation::File(path) => csv_file::load_csv_table(path),
            SourceLocation::Collection(name) => {
                let store = self.documents.as_ref().ok_or_else(|| {
                    ReportError::unavailable(location, "no document store configured")
                })?;
                Table::from_records(store.documents(name)?)
            }
        }
    }

    /// Page-level table: selected columns, `Date` parsed and rows sorted
    /// ascending by it.
    #[tracing::instrument(level = "info", skip(self, spec), fields(source = %location))]
    pub fn load_page_table(
        &self,
        location: &SourceLocation,
        spec: &AnalyticsColumnSpec,
    ) -> Result<Table> {
        let table = select::select_columns(&self.load(location)?, spec)?;
        let table = prepare_page_table(table)?;
        info!(rows = table.num_rows(), columns = table.num_columns(), "page table loaded");
        Ok(table)
    }

    /// Post-level table: selected columns in source order.
    #[tracing::instrument(level = "info", skip(self, spec), fields(source = %location))]
    pub fn load_posts_table(
        &self,
        location: &SourceLocation,
        spec: &AnalyticsColumnSpec,
    ) -> Result<Table> {
        let table = select::select_columns(&self.load(location)?, spec)?;
        info!(rows = table.num_rows(), columns = table.num_columns(), "posts table loaded");
        Ok(table)
    }
}

/// Parse the page table's `Date` column and sort by it. An empty table passes
/// through untouched; rows without a `Date` column cannot be placed in time.
pub fn prepare_page_table(table: Table) -> Result<Table> {
    if table.num_rows() == 0 {
        return Ok(table);
    }
    if !table.has_column(select::DATE) {
        return Err(ReportError::missing_column("page", select::DATE));
    }
    let (parsed, malformed) = table.with_parsed_dates(select::DATE)?;
    if malformed > 0 {
        warn!(malformed, column = select::DATE, "unparseable dates left empty");
    }
    parsed.sort_by_date(select::DATE)
}
