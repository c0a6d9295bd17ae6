// src/derive/series.rs
use arrow::{
    array::{Array, ArrayRef, Date32Array, Float64Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::warn;

use crate::{
    error::{ReportError, Result},
    select,
    table::{parse, Table},
};

/// Engagement metrics drawn on the page engagement chart, in drawing order.
pub const ENGAGEMENT_METRICS: [&str; 5] = [
    select::DAILY_PAGE_ENGAGED_USERS,
    select::DAILY_TOTAL_IMPRESSIONS,
    select::DAILY_ORGANIC_REACH,
    select::DAILY_VIRAL_REACH,
    select::DAILY_TOTAL_REACH,
];

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Numeric series keyed by date, ascending.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    pub dates: Vec<NaiveDate>,
    pub metrics: Vec<MetricSeries>,
}

impl TimeSeries {
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn metric(&self, name: &str) -> Option<&MetricSeries> {
        self.metrics.iter().find(|m| m.name == name)
    }

    /// `Date` as `Date32` plus one `Float64` column per metric.
    pub fn to_batch(&self) -> Result<RecordBatch> {
        let mut fields = vec![Field::new(select::DATE, DataType::Date32, false)];
        let days: Vec<i32> = self.dates.iter().map(|d| parse::date_to_days(*d)).collect();
        let dates = Date32Array::from(days);
        let mut columns: Vec<ArrayRef> = vec![Arc::new(dates)];
        for metric in &self.metrics {
            fields.push(Field::new(&metric.name, DataType::Float64, true));
            columns.push(Arc::new(Float64Array::from(metric.values.clone())));
        }
        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
    }
}

/// Daily engagement metrics over time. Metrics the page table lacks are left
/// out; non-numeric cells stay missing.
pub fn engagement_series(page: &Table) -> Result<TimeSeries> {
    time_series(page, &ENGAGEMENT_METRICS)
}

/// Cumulative page likes over time.
pub fn likes_series(page: &Table) -> Result<TimeSeries> {
    time_series(page, &[select::LIFETIME_TOTAL_LIKES])
}

fn time_series(page: &Table, metrics: &[&str]) -> Result<TimeSeries> {
    if page.num_rows() == 0 {
        return Ok(TimeSeries::default());
    }
    let dates = page
        .date_column(select::DATE)
        .ok_or_else(|| ReportError::missing_column("page", select::DATE))?;

    // rows without a date cannot sit on the time axis
    let keyed: Vec<(usize, NaiveDate)> = (0..dates.len())
        .filter(|&i| dates.is_valid(i))
        .filter_map(|i| parse::days_to_date(dates.value(i)).map(|d| (i, d)))
        .collect();
    if keyed.len() < dates.len() {
        warn!(dropped = dates.len() - keyed.len(), "rows without a date left out of series");
    }
    let rows: Vec<usize> = keyed.iter().map(|(i, _)| *i).collect();

    let mut series = TimeSeries {
        dates: keyed.into_iter().map(|(_, d)| d).collect(),
        metrics: Vec::with_capacity(metrics.len()),
    };

    for &name in metrics {
        let Some(column) = page.text_column(name) else {
            continue;
        };
        let mut malformed = 0usize;
        let values = rows
            .iter()
            .map(|&i| {
                if column.is_null(i) {
                    return None;
                }
                let parsed = parse::parse_number(column.value(i));
                if parsed.is_none() {
                    malformed += 1;
                }
                parsed
            })
            .collect();
        if malformed > 0 {
            warn!(metric = name, malformed, "non-numeric cells left missing");
        }
        series.metrics.push(MetricSeries {
            name: name.to_string(),
            values,
        });
    }

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::prepare_page_table;

    fn page(rows: &[(&str, &str, &str)]) -> Table {
        let table = Table::from_rows(
            vec![
                select::DATE.into(),
                select::DAILY_TOTAL_REACH.into(),
                select::LIFETIME_TOTAL_LIKES.into(),
            ],
            rows.iter()
                .map(|(d, r, l)| vec![Some(d.to_string()), Some(r.to_string()), Some(l.to_string())])
                .collect(),
        )
        .unwrap();
        prepare_page_table(table).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, d).unwrap()
    }

    #[test]
    fn series_follow_sorted_dates() -> Result<()> {
        let t = page(&[
            ("2020-03-02", "20", "2"),
            ("2020-03-01", "10", "1"),
            ("2020-03-03", "30", "3"),
        ]);
        let engagement = engagement_series(&t)?;
        assert_eq!(engagement.dates, vec![day(1), day(2), day(3)]);

        // only the one engagement metric present in the table
        assert_eq!(engagement.metrics.len(), 1);
        assert_eq!(
            engagement.metric(select::DAILY_TOTAL_REACH).unwrap().values,
            vec![Some(10.0), Some(20.0), Some(30.0)]
        );

        let likes = likes_series(&t)?;
        assert_eq!(
            likes.metric(select::LIFETIME_TOTAL_LIKES).unwrap().values,
            vec![Some(1.0), Some(2.0), Some(3.0)]
        );
        Ok(())
    }

    #[test]
    fn gaps_and_dirt_are_not_filled() -> Result<()> {
        let t = page(&[("2020-03-01", "5", "1"), ("2020-03-05", "oops", "2")]);
        let s = engagement_series(&t)?;
        assert_eq!(s.dates, vec![day(1), day(5)]);
        assert_eq!(s.metrics[0].values, vec![Some(5.0), None]);
        Ok(())
    }

    #[test]
    fn empty_page_gives_empty_series() -> Result<()> {
        assert!(engagement_series(&Table::empty())?.is_empty());
        Ok(())
    }

    #[test]
    fn batch_shape_for_renderer() -> Result<()> {
        let t = page(&[("2020-03-01", "5", "1")]);
        let batch = likes_series(&t)?.to_batch()?;
        assert_eq!(batch.num_columns(), 2);
        assert_eq!(batch.schema().field(0).name(), select::DATE);
        assert_eq!(batch.column(1).len(), 1);
        Ok(())
    }
}
