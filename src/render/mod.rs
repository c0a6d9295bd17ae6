// src/render/mod.rs
pub mod html;

use arrow::record_batch::RecordBatch;
use serde::Serialize;

use crate::error::Result;

pub use html::HtmlChartRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum XAxis {
    /// `Date32` values placed proportionally in time.
    Date,
    /// Text values, one evenly spaced band each.
    Category,
}

/// How a value is printed in tooltips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueFormat {
    Date,
    DateTime,
    Integer,
    Text,
}

/// One y field drawn on a chart.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesStyle {
    pub field: String,
    pub legend: String,
    pub color: String,
    /// Stroke width for lines, band fraction for bars.
    pub width: f64,
}

impl SeriesStyle {
    pub fn new(field: &str, legend: &str, color: &str, width: f64) -> Self {
        Self {
            field: field.to_string(),
            legend: legend.to_string(),
            color: color.to_string(),
            width,
        }
    }
}

/// One tooltip line. `field: None` shows the hovered y value.
#[derive(Debug, Clone, Serialize)]
pub struct HoverField {
    pub label: String,
    pub field: Option<String>,
    pub format: ValueFormat,
}

impl HoverField {
    pub fn field(label: &str, field: &str, format: ValueFormat) -> Self {
        Self {
            label: label.to_string(),
            field: Some(field.to_string()),
            format,
        }
    }

    pub fn y(label: &str, format: ValueFormat) -> Self {
        Self {
            label: label.to_string(),
            field: None,
            format,
        }
    }
}

/// Chart metadata handed to a renderer next to its dataset.
#[derive(Debug, Clone, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub kind: ChartKind,
    pub x_field: String,
    pub x_axis: XAxis,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<SeriesStyle>,
    pub hover: Vec<HoverField>,
    /// Cut category labels to their first few words.
    pub shorten_labels: bool,
}

/// A dataset (named columns) and how to draw it.
#[derive(Debug, Clone)]
pub struct Chart {
    pub spec: ChartSpec,
    pub data: RecordBatch,
}

/// Turns charts into one visual artifact.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, title: &str, charts: &[Chart]) -> Result<String>;
}
