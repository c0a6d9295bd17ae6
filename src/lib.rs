pub mod artifact;
pub mod cache;
pub mod config;
pub mod derive;
pub mod error;
pub mod refresh;
pub mod render;
pub mod report;
pub mod select;
pub mod source;
pub mod table;
pub mod telemetry;
pub mod web;

pub use cache::TableCache;
pub use error::{ReportError, Result};
pub use report::ReportAssembler;
pub use table::Table;
