// src/table/mod.rs
pub mod parse;

use arrow::{
    array::{Array, ArrayRef, Date32Array, Date32Builder, StringArray, UInt32Array},
    compute::take,
    datatypes::{DataType, Field, Schema, SchemaRef},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, warn};

use crate::error::{ReportError, Result};

/// One scalar as read from a source.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Number(f64),
}

impl CellValue {
    /// The text form stored in a table cell; `None` for null.
    pub fn into_text(self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Text(s) => Some(s),
            CellValue::Number(n) => Some(n.to_string()),
        }
    }
}

/// One source-native unit: a CSV row or a database document, with its fields
/// in the order they were read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub fields: Vec<(String, CellValue)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: CellValue) {
        self.fields.push((name.into(), value));
    }
}

impl<K: Into<String>> FromIterator<(K, CellValue)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, CellValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Ordered rows over a named column set, backed by an arrow `RecordBatch`.
///
/// Cells are `Utf8` as read from the source; the page table's date column is
/// replaced by a `Date32` column once parsed. Tables are never mutated after
/// construction, every reshaping returns a new table.
#[derive(Debug, Clone)]
pub struct Table {
    batch: RecordBatch,
}

impl Table {
    pub fn empty() -> Self {
        Self {
            batch: RecordBatch::new_empty(Arc::new(Schema::empty())),
        }
    }

    pub fn from_batch(batch: RecordBatch) -> Self {
        Self { batch }
    }

    fn with_columns(schema: SchemaRef, columns: Vec<ArrayRef>, rows: usize) -> Result<Self> {
        let options = RecordBatchOptions::new().with_row_count(Some(rows));
        let batch = RecordBatch::try_new_with_options(schema, columns, &options)?;
        Ok(Self { batch })
    }

    /// Build a table from a header and text rows. Short rows are padded with
    /// nulls; cells beyond the header are dropped.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<Self> {
        let width = headers.len();
        let mut columns: Vec<Vec<Option<String>>> =
            (0..width).map(|_| Vec::with_capacity(rows.len())).collect();
        let row_count = rows.len();

        let mut overlong = 0usize;
        for row in rows {
            if row.len() > width {
                overlong += 1;
            }
            let mut cells = row.into_iter();
            for col in columns.iter_mut() {
                col.push(cells.next().flatten());
            }
        }
        if overlong > 0 {
            warn!(overlong, width, "rows with more cells than headers; extra cells dropped");
        }

        let fields: Vec<Field> = headers
            .iter()
            .map(|n| Field::new(n, DataType::Utf8, true))
            .collect();
        let arrays: Vec<ArrayRef> = columns
            .into_iter()
            .map(|c| Arc::new(StringArray::from(c)) as ArrayRef)
            .collect();
        Self::with_columns(Arc::new(Schema::new(fields)), arrays, row_count)
    }

    /// Build a table from heterogeneous records. The column set is the union
    /// of all field names in first-seen order; fields a record lacks are null.
    pub fn from_records(records: Vec<RawRecord>) -> Result<Self> {
        let mut headers: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for record in &records {
            for (name, _) in &record.fields {
                if !positions.contains_key(name) {
                    positions.insert(name.clone(), headers.len());
                    headers.push(name.clone());
                }
            }
        }

        let rows: Vec<Vec<Option<String>>> = records
            .into_iter()
            .map(|record| {
                let mut row = vec![None; headers.len()];
                for (name, value) in record.fields {
                    row[positions[&name]] = value.into_text();
                }
                row
            })
            .collect();

        debug!(columns = headers.len(), rows = rows.len(), "built table from records");
        Self::from_rows(headers, rows)
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema_ref().index_of(name).is_ok()
    }

    /// A text column by name, `None` if absent or not text.
    pub fn text_column(&self, name: &str) -> Option<&StringArray> {
        self.batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
    }

    /// A parsed date column by name, `None` if absent or not yet parsed.
    pub fn date_column(&self, name: &str) -> Option<&Date32Array> {
        self.batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<Date32Array>())
    }

    /// Keep only the columns whose name satisfies `keep`, in their original
    /// order. The row count survives even when no column does.
    pub fn retain_columns<F: Fn(&str) -> bool>(&self, keep: F) -> Result<Self> {
        let indices: Vec<usize> = self
            .batch
            .schema_ref()
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, f)| keep(f.name()))
            .map(|(i, _)| i)
            .collect();
        let schema = Arc::new(self.batch.schema_ref().project(&indices)?);
        let columns = indices
            .iter()
            .map(|&i| Arc::clone(self.batch.column(i)))
            .collect();
        Self::with_columns(schema, columns, self.num_rows())
    }

    /// Replace the text column `name` with a `Date32` column. Cells that do
    /// not parse become null. Returns the new table and the number of
    /// non-empty cells that failed to parse.
    pub fn with_parsed_dates(&self, name: &str) -> Result<(Self, usize)> {
        let idx = self
            .batch
            .schema_ref()
            .index_of(name)
            .map_err(|_| ReportError::missing_column("page", name))?;
        if self.date_column(name).is_some() {
            return Ok((self.clone(), 0));
        }
        let text = self
            .text_column(name)
            .ok_or_else(|| ReportError::missing_column("page", name))?;

        let mut malformed = 0usize;
        let mut builder = Date32Builder::with_capacity(text.len());
        for cell in text.iter() {
            match cell.map(|s| (s, parse::parse_date(s))) {
                Some((_, Some(date))) => builder.append_value(parse::date_to_days(date)),
                Some((s, None)) => {
                    if !parse::clean_str(s).is_empty() {
                        malformed += 1;
                    }
                    builder.append_null();
                }
                None => builder.append_null(),
            }
        }

        let mut fields: Vec<Field> = self
            .batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.as_ref().clone())
            .collect();
        fields[idx] = Field::new(name, DataType::Date32, true);
        let mut columns: Vec<ArrayRef> = self.batch.columns().to_vec();
        columns[idx] = Arc::new(builder.finish());

        let table = Self::with_columns(Arc::new(Schema::new(fields)), columns, self.num_rows())?;
        Ok((table, malformed))
    }

    /// Stable sort ascending by a parsed date column; rows without a date go
    /// last in their original order.
    pub fn sort_by_date(&self, name: &str) -> Result<Self> {
        let dates = self
            .date_column(name)
            .ok_or_else(|| ReportError::missing_column("page", name))?;

        let mut order: Vec<u32> = (0..self.num_rows() as u32).collect();
        order.sort_by_key(|&i| {
            let i = i as usize;
            if dates.is_null(i) {
                (1u8, 0i32)
            } else {
                (0u8, dates.value(i))
            }
        });
        self.take_rows(&order)
    }

    /// A new table holding the rows at `order`, in that order.
    pub fn take_rows(&self, order: &[u32]) -> Result<Self> {
        let indices = UInt32Array::from(order.to_vec());
        let columns = self
            .batch
            .columns()
            .iter()
            .map(|c| take(c.as_ref(), &indices, None))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::with_columns(self.batch.schema(), columns, order.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn union_of_fields_with_nulls() -> Result<()> {
        let records = vec![
            RawRecord::from_iter([("Date", text("2020-03-01")), ("Likes", CellValue::Number(3.0))]),
            RawRecord::from_iter([("Date", text("2020-03-02")), ("Reach", CellValue::Number(2.5))]),
        ];
        let table = Table::from_records(records)?;

        assert_eq!(table.column_names(), vec!["Date", "Likes", "Reach"]);
        assert_eq!(table.num_rows(), 2);
        let likes = table.text_column("Likes").unwrap();
        assert_eq!(likes.value(0), "3");
        assert!(likes.is_null(1));
        let reach = table.text_column("Reach").unwrap();
        assert!(reach.is_null(0));
        assert_eq!(reach.value(1), "2.5");
        Ok(())
    }

    #[test]
    fn ragged_rows_are_padded_and_truncated() -> Result<()> {
        let table = Table::from_rows(
            vec!["a".into(), "b".into()],
            vec![
                vec![Some("1".into())],
                vec![Some("1".into()), Some("2".into()), Some("3".into())],
            ],
        )?;
        let b = table.text_column("b").unwrap();
        assert!(b.is_null(0));
        assert_eq!(b.value(1), "2");
        assert_eq!(table.num_columns(), 2);
        Ok(())
    }

    #[test]
    fn retain_keeps_order_and_row_count() -> Result<()> {
        let table = Table::from_rows(
            vec!["x".into(), "keep1".into(), "y".into(), "keep2".into()],
            vec![vec![None; 4]; 3],
        )?;
        let kept = table.retain_columns(|n| n.starts_with("keep"))?;
        assert_eq!(kept.column_names(), vec!["keep1", "keep2"]);

        let none = table.retain_columns(|_| false)?;
        assert_eq!(none.num_columns(), 0);
        assert_eq!(none.num_rows(), 3);
        Ok(())
    }

    #[test]
    fn date_sort_is_stable_with_nulls_last() -> Result<()> {
        let table = Table::from_rows(
            vec!["Date".into(), "id".into()],
            vec![
                vec![Some("2020-03-02".into()), Some("a".into())],
                vec![Some("garbage".into()), Some("b".into())],
                vec![Some("2020-03-01".into()), Some("c".into())],
                vec![Some("2020-03-02".into()), Some("d".into())],
                vec![None, Some("e".into())],
            ],
        )?;
        let (parsed, malformed) = table.with_parsed_dates("Date")?;
        assert_eq!(malformed, 1);

        let sorted = parsed.sort_by_date("Date")?;
        let ids: Vec<&str> = sorted.text_column("id").unwrap().iter().flatten().collect();
        assert_eq!(ids, vec!["c", "a", "d", "b", "e"]);

        let dates = sorted.date_column("Date").unwrap();
        assert_eq!(
            parse::days_to_date(dates.value(0)),
            NaiveDate::from_ymd_opt(2020, 3, 1)
        );
        Ok(())
    }

    #[test]
    fn parsing_a_missing_column_is_structural() {
        let table = Table::from_rows(vec!["x".into()], vec![vec![None]]).unwrap();
        let err = table.with_parsed_dates("Date").unwrap_err();
        assert!(matches!(err, ReportError::InsufficientColumns { .. }));
    }
}
