// src/render/html.rs
use arrow::{
    array::{Array, ArrayRef, Date32Array, Float64Array, StringArray, TimestampMillisecondArray},
    json::ArrayWriter,
    record_batch::RecordBatch,
    util::display::array_value_to_string,
};
use std::fmt::Write as _;
use tracing::debug;

use super::{Chart, ChartKind, ChartRenderer, ChartSpec, HoverField, SeriesStyle, ValueFormat, XAxis};
use crate::{
    error::{ReportError, Result},
    table::parse,
};

/// Category labels keep this many words before being cut.
const LABEL_WORDS: usize = 7;
const Y_TICKS: usize = 5;
const X_TICKS: usize = 6;

const STYLE: &str = "body{font-family:sans-serif;margin:24px;color:#222}\
figure{margin:0 0 40px 0}\
figcaption{font-size:18px;font-weight:bold;margin-bottom:8px}\
.legend{list-style:none;padding:0;margin:8px 0;display:flex;gap:16px}\
.legend li{cursor:pointer;user-select:none}\
.swatch{display:inline-block;width:12px;height:12px;margin-right:6px;vertical-align:middle}\
.axis{stroke:#444;stroke-width:1}\
.grid{stroke:#e5e5e5;stroke-width:1}\
text{font-size:12px;fill:#333}";

/// Standalone HTML page with one inline SVG per chart.
///
/// Points and bars carry native tooltips, legend entries toggle their series,
/// and each chart's dataset is embedded as JSON next to its figure.
#[derive(Debug, Clone)]
pub struct HtmlChartRenderer {
    pub width: f64,
    pub height: f64,
}

impl Default for HtmlChartRenderer {
    fn default() -> Self {
        Self {
            width: 1300.0,
            height: 600.0,
        }
    }
}

impl ChartRenderer for HtmlChartRenderer {
    fn render(&self, title: &str, charts: &[Chart]) -> Result<String> {
        let mut html = String::with_capacity(16 * 1024);
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        let _ = writeln!(html, "<title>{}</title>", escape(title));
        let _ = writeln!(html, "<style>{}</style>", STYLE);
        html.push_str("</head>\n<body>\n");
        let _ = writeln!(html, "<h1>{}</h1>", escape(title));
        for (idx, chart) in charts.iter().enumerate() {
            html.push_str(&self.figure(&format!("chart-{}", idx), chart)?);
        }
        html.push_str("</body>\n</html>\n");
        debug!(charts = charts.len(), bytes = html.len(), "rendered html");
        Ok(html)
    }
}

impl HtmlChartRenderer {
    fn frame(&self) -> Frame {
        Frame {
            width: self.width,
            height: self.height,
            left: 80.0,
            right: 30.0,
            top: 20.0,
            bottom: 120.0,
        }
    }

    fn figure(&self, id: &str, chart: &Chart) -> Result<String> {
        let spec = &chart.spec;
        let svg = match spec.kind {
            ChartKind::Line => self.line_svg(id, chart)?,
            ChartKind::Bar => self.bar_svg(id, chart)?,
        };
        let spec_json =
            serde_json::to_string(spec).map_err(|e| ReportError::Render(e.to_string()))?;

        let mut out = String::new();
        let _ = writeln!(out, "<figure class=\"chart\" id=\"{}\">", id);
        let _ = writeln!(out, "<figcaption>{}</figcaption>", escape(&spec.title));
        out.push_str(&svg);
        out.push_str(&legend(id, &spec.series));
        let _ = writeln!(
            out,
            "<script type=\"application/json\" class=\"chart-spec\">{}</script>",
            script_safe(&spec_json)
        );
        let _ = writeln!(
            out,
            "<script type=\"application/json\" class=\"chart-data\">{}</script>",
            script_safe(&batch_json(&chart.data)?)
        );
        out.push_str("</figure>\n");
        Ok(out)
    }

    fn line_svg(&self, id: &str, chart: &Chart) -> Result<String> {
        let spec = &chart.spec;
        let frame = self.frame();
        if spec.x_axis != XAxis::Date {
            return Err(ReportError::Render(format!(
                "line chart `{}` needs a date axis",
                spec.title
            )));
        }
        let days = date_column(&chart.data, &spec.x_field)?;
        let series = series_values(&chart.data, &spec.series);
        let y_max = nice_max(max_value(&series));

        let known: Vec<i32> = days.iter().flatten().copied().collect();
        let (lo, hi) = match (known.iter().min(), known.iter().max()) {
            (Some(lo), Some(hi)) => (*lo, *hi),
            _ => (0, 0),
        };
        let x_px = |d: i32| -> f64 {
            if hi == lo {
                frame.left + frame.plot_w() / 2.0
            } else {
                frame.left + frame.plot_w() * f64::from(d - lo) / f64::from(hi - lo)
            }
        };

        let mut svg = frame.open(spec);
        frame.y_axis(&mut svg, y_max);
        if !known.is_empty() {
            let steps = if hi == lo { 0 } else { X_TICKS - 1 };
            for t in 0..=steps {
                let day = if steps == 0 {
                    lo
                } else {
                    lo + ((f64::from(hi - lo) * t as f64 / steps as f64).round() as i32)
                };
                let label = parse::days_to_date(day)
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                frame.x_tick(&mut svg, x_px(day), &label, false);
            }
        }

        for (j, (style, values)) in series.iter().enumerate() {
            let _ = writeln!(
                svg,
                "<g id=\"{}-s{}\" stroke=\"{}\" fill=\"{}\">",
                id,
                j,
                escape(&style.color),
                escape(&style.color)
            );
            let mut segment: Vec<(f64, f64)> = Vec::new();
            let mut points = String::new();
            for (row, (day, value)) in days.iter().zip(values.iter()).enumerate() {
                match (day, value) {
                    (Some(day), Some(v)) => {
                        let (x, y) = (x_px(*day), frame.y_px(*v, y_max));
                        segment.push((x, y));
                        let tip = tooltip(&chart.data, &spec.hover, row, *v);
                        let _ = writeln!(
                            points,
                            "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"3\" stroke=\"none\"><title>{}</title></circle>",
                            x,
                            y,
                            escape(&tip)
                        );
                    }
                    _ => flush_segment(&mut svg, &mut segment, style.width),
                }
            }
            flush_segment(&mut svg, &mut segment, style.width);
            svg.push_str(&points);
            svg.push_str("</g>\n");
        }

        svg.push_str("</svg>\n");
        Ok(svg)
    }

    fn bar_svg(&self, id: &str, chart: &Chart) -> Result<String> {
        let spec = &chart.spec;
        let frame = self.frame();
        let categories = category_column(&chart.data, &spec.x_field)?;
        let series = series_values(&chart.data, &spec.series);
        let y_max = nice_max(max_value(&series));

        let band = frame.plot_w() / categories.len().max(1) as f64;
        let mut svg = frame.open(spec);
        frame.y_axis(&mut svg, y_max);
        for (i, label) in categories.iter().enumerate() {
            let label = if spec.shorten_labels {
                shorten(label)
            } else {
                label.clone()
            };
            frame.x_tick(&mut svg, frame.left + band * (i as f64 + 0.5), &label, true);
        }

        // grouped bars sit side by side, centred on their category
        let spacing = 0.8 / series.len().max(1) as f64;
        let centre = (series.len() as f64 - 1.0) / 2.0;
        for (j, (style, values)) in series.iter().enumerate() {
            let offset = (j as f64 - centre) * spacing;
            let bar_w = (style.width * band).max(1.0);
            let _ = writeln!(svg, "<g id=\"{}-s{}\" fill=\"{}\">", id, j, escape(&style.color));
            for (row, value) in values.iter().enumerate() {
                let Some(v) = value else { continue };
                let x = frame.left + band * (row as f64 + 0.5 + offset) - bar_w / 2.0;
                let y = frame.y_px(v.max(0.0), y_max);
                let tip = tooltip(&chart.data, &spec.hover, row, *v);
                let _ = writeln!(
                    svg,
                    "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\"><title>{}</title></rect>",
                    x,
                    y,
                    bar_w,
                    frame.base_y() - y,
                    escape(&tip)
                );
            }
            svg.push_str("</g>\n");
        }

        svg.push_str("</svg>\n");
        Ok(svg)
    }
}

struct Frame {
    width: f64,
    height: f64,
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
}

impl Frame {
    fn plot_w(&self) -> f64 {
        self.width - self.left - self.right
    }

    fn plot_h(&self) -> f64 {
        self.height - self.top - self.bottom
    }

    fn base_y(&self) -> f64 {
        self.top + self.plot_h()
    }

    fn y_px(&self, v: f64, max: f64) -> f64 {
        self.top + self.plot_h() * (1.0 - v / max)
    }

    fn open(&self, spec: &ChartSpec) -> String {
        let mut svg = String::new();
        let _ = writeln!(
            svg,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
            w = self.width,
            h = self.height
        );
        let _ = writeln!(
            svg,
            "<line class=\"axis\" x1=\"{l}\" y1=\"{b}\" x2=\"{r}\" y2=\"{b}\"/>\
             <line class=\"axis\" x1=\"{l}\" y1=\"{t}\" x2=\"{l}\" y2=\"{b}\"/>",
            l = self.left,
            r = self.width - self.right,
            t = self.top,
            b = self.base_y()
        );
        let _ = writeln!(
            svg,
            "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\">{}</text>",
            self.left + self.plot_w() / 2.0,
            self.height - 8.0,
            escape(&spec.x_label)
        );
        let _ = writeln!(
            svg,
            "<text transform=\"translate(18 {:.1}) rotate(-90)\" text-anchor=\"middle\">{}</text>",
            self.top + self.plot_h() / 2.0,
            escape(&spec.y_label)
        );
        svg
    }

    fn y_axis(&self, svg: &mut String, max: f64) {
        for t in 0..=Y_TICKS {
            let v = max * t as f64 / Y_TICKS as f64;
            let y = self.y_px(v, max);
            let _ = writeln!(
                svg,
                "<line class=\"grid\" x1=\"{:.1}\" y1=\"{y:.1}\" x2=\"{:.1}\" y2=\"{y:.1}\"/>\
                 <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\">{}</text>",
                self.left,
                self.width - self.right,
                self.left - 6.0,
                y + 4.0,
                format_value(v, ValueFormat::Text),
                y = y
            );
        }
    }

    fn x_tick(&self, svg: &mut String, x: f64, label: &str, slanted: bool) {
        let y = self.base_y() + 16.0;
        if slanted {
            let _ = writeln!(
                svg,
                "<text x=\"{x:.1}\" y=\"{y:.1}\" text-anchor=\"end\" transform=\"rotate(-20 {x:.1} {y:.1})\">{}</text>",
                escape(label),
                x = x,
                y = y
            );
        } else {
            let _ = writeln!(
                svg,
                "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\">{}</text>",
                x,
                y,
                escape(label)
            );
        }
    }
}

fn flush_segment(svg: &mut String, segment: &mut Vec<(f64, f64)>, width: f64) {
    if segment.len() >= 2 {
        let points: Vec<String> = segment
            .iter()
            .map(|(x, y)| format!("{:.1},{:.1}", x, y))
            .collect();
        let _ = writeln!(
            svg,
            "<polyline fill=\"none\" stroke-width=\"{}\" points=\"{}\"/>",
            width,
            points.join(" ")
        );
    }
    segment.clear();
}

fn legend(id: &str, series: &[SeriesStyle]) -> String {
    let mut out = String::from("<ul class=\"legend\">\n");
    for (j, style) in series.iter().enumerate() {
        let _ = writeln!(
            out,
            "<li onclick=\"var g=document.getElementById('{id}-s{j}');if(g){{g.style.display=g.style.display==='none'?'':'none';}}\">\
             <span class=\"swatch\" style=\"background:{}\"></span>{}</li>",
            escape(&style.color),
            escape(&style.legend),
            id = id,
            j = j
        );
    }
    out.push_str("</ul>\n");
    out
}

fn tooltip(data: &RecordBatch, hover: &[HoverField], row: usize, y: f64) -> String {
    hover
        .iter()
        .map(|h| {
            let value = match &h.field {
                None => format_value(y, h.format),
                Some(field) => data
                    .column_by_name(field)
                    .map(|c| cell_text(c, row, h.format))
                    .unwrap_or_default(),
            };
            format!("{}: {}", h.label, value)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn cell_text(column: &ArrayRef, row: usize, format: ValueFormat) -> String {
    if column.is_null(row) {
        return String::new();
    }
    let any = column.as_any();
    let formatted = match format {
        ValueFormat::Date => any
            .downcast_ref::<Date32Array>()
            .and_then(|a| parse::days_to_date(a.value(row)))
            .map(|d| d.format("%Y-%m-%d").to_string()),
        ValueFormat::DateTime => any
            .downcast_ref::<TimestampMillisecondArray>()
            .and_then(|a| a.value_as_datetime(row))
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string()),
        ValueFormat::Integer => any
            .downcast_ref::<Float64Array>()
            .map(|a| format_value(a.value(row), ValueFormat::Integer)),
        ValueFormat::Text => any
            .downcast_ref::<StringArray>()
            .map(|a| a.value(row).to_string()),
    };
    formatted.unwrap_or_else(|| array_value_to_string(column.as_ref(), row).unwrap_or_default())
}

fn format_value(v: f64, format: ValueFormat) -> String {
    match format {
        ValueFormat::Integer => format!("{:.0}", v),
        _ if v.fract() == 0.0 && v.abs() < 1e15 => format!("{:.0}", v),
        _ => format!("{:.2}", v),
    }
}

fn date_column(data: &RecordBatch, field: &str) -> Result<Vec<Option<i32>>> {
    let column = data
        .column_by_name(field)
        .ok_or_else(|| ReportError::Render(format!("dataset has no x field `{}`", field)))?;
    let dates = column
        .as_any()
        .downcast_ref::<Date32Array>()
        .ok_or_else(|| ReportError::Render(format!("x field `{}` is not a date", field)))?;
    Ok(dates.iter().collect())
}

fn category_column(data: &RecordBatch, field: &str) -> Result<Vec<String>> {
    let column = data
        .column_by_name(field)
        .ok_or_else(|| ReportError::Render(format!("dataset has no x field `{}`", field)))?;
    Ok((0..column.len())
        .map(|row| cell_text(column, row, ValueFormat::Text))
        .collect())
}

/// Float columns for each styled series; styles whose field is absent are
/// not drawn.
fn series_values<'a>(
    data: &RecordBatch,
    styles: &'a [SeriesStyle],
) -> Vec<(&'a SeriesStyle, Vec<Option<f64>>)> {
    styles
        .iter()
        .filter_map(|style| {
            let values = data
                .column_by_name(&style.field)?
                .as_any()
                .downcast_ref::<Float64Array>()?
                .iter()
                .collect();
            Some((style, values))
        })
        .collect()
}

fn max_value(series: &[(&SeriesStyle, Vec<Option<f64>>)]) -> f64 {
    series
        .iter()
        .flat_map(|(_, values)| values.iter().flatten())
        .fold(0.0, |acc: f64, v| acc.max(*v))
}

/// Round an axis maximum up to 1, 2 or 5 times a power of ten.
fn nice_max(v: f64) -> f64 {
    if !(v > 0.0) || !v.is_finite() {
        return 1.0;
    }
    let magnitude = 10f64.powf(v.log10().floor());
    [1.0, 2.0, 5.0, 10.0]
        .into_iter()
        .map(|m| m * magnitude)
        .find(|candidate| *candidate >= v)
        .unwrap_or(10.0 * magnitude)
}

fn shorten(label: &str) -> String {
    let words: Vec<&str> = label.split_whitespace().collect();
    if words.len() > LABEL_WORDS {
        format!("{}...", words[..LABEL_WORDS].join(" "))
    } else {
        label.to_string()
    }
}

fn batch_json(batch: &RecordBatch) -> Result<String> {
    let mut writer = ArrayWriter::new(Vec::new());
    writer.write(batch)?;
    writer.finish()?;
    let json = String::from_utf8(writer.into_inner())
        .map_err(|e| ReportError::Render(e.to_string()))?;
    Ok(if json.trim().is_empty() {
        "[]".to_string()
    } else {
        json
    })
}

/// Keep embedded JSON from closing its `<script>` element.
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
