// src/source/csv_file.rs
use csv::ReaderBuilder;
use std::{fs::File, io::Read, path::Path};
use tracing::{debug, warn};

use crate::{
    error::{ReportError, Result},
    table::Table,
};

/// Load an analytics export. The header row names the columns; the first
/// record after it is the export's description row and never becomes data.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_csv_table<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| ReportError::unavailable(path.display(), e))?;
    read_csv_table(file, &path.display().to_string())
}

/// Same as [`load_csv_table`] over any reader; `location` names the source in
/// errors.
pub fn read_csv_table<R: Read>(reader: R, location: &str) -> Result<Table> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // exports are ragged
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .byte_headers()
        .map_err(|e| ReportError::unavailable(location, e))?
        .iter()
        .map(|h| String::from_utf8_lossy(h).trim().to_string())
        .collect();

    let mut rows = Vec::new();
    let mut records = rdr.byte_records();

    match records.next() {
        Some(Ok(description)) => debug!(
            cells = description.len(),
            "skipping export description row"
        ),
        Some(Err(e)) => warn!(error = %e, "unreadable description row skipped"),
        None => return Table::from_rows(headers, rows),
    }

    // cells that are not valid UTF-8 keep their text with replacement characters
    let mut malformed = 0usize;
    for (idx, result) in records.enumerate() {
        let record = result.map_err(|e| {
            ReportError::unavailable(location, format!("record {}: {}", idx + 1, e))
        })?;
        let row: Vec<Option<String>> = record
            .iter()
            .map(|bytes| {
                let cell = match std::str::from_utf8(bytes) {
                    Ok(cell) => cell.to_string(),
                    Err(_) => {
                        malformed += 1;
                        String::from_utf8_lossy(bytes).into_owned()
                    }
                };
                if cell.trim().is_empty() {
                    None
                } else {
                    Some(cell)
                }
            })
            .collect();
        rows.push(row);
    }

    if malformed > 0 {
        warn!(malformed, "cells with invalid UTF-8 decoded lossily");
    }
    debug!(columns = headers.len(), rows = rows.len(), "read csv export");
    Table::from_rows(headers, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    const EXPORT: &str = "\
Date,Lifetime Total Likes,Daily City: People Talking About This - Oslo
,Lifetime: The total number of people who have liked your Page.,Daily: city breakdown
2017-11-02,120,4
2017-11-01,118,
";

    #[test]
    fn description_row_never_becomes_data() -> Result<()> {
        let table = read_csv_table(Cursor::new(EXPORT), "inline")?;
        assert_eq!(table.num_rows(), 2);
        let likes = table.text_column("Lifetime Total Likes").unwrap();
        assert_eq!(likes.value(0), "120");
        let oslo = table
            .text_column("Daily City: People Talking About This - Oslo")
            .unwrap();
        assert!(oslo.is_null(1));
        Ok(())
    }

    #[test]
    fn invalid_utf8_cell_is_kept_lossily() -> Result<()> {
        let mut export = b"Post Message,Lifetime Post Total Reach\nMessage,Lifetime\n".to_vec();
        export.extend_from_slice(b"caf\xE9 open,12\nplain,3\n");

        let table = read_csv_table(Cursor::new(export), "inline")?;
        assert_eq!(table.num_rows(), 2);
        let messages = table.text_column("Post Message").unwrap();
        assert_eq!(messages.value(0), "caf\u{FFFD} open");
        assert_eq!(messages.value(1), "plain");
        let reach = table.text_column("Lifetime Post Total Reach").unwrap();
        assert_eq!(reach.value(0), "12");
        Ok(())
    }

    #[test]
    fn header_only_and_description_only_are_empty() -> Result<()> {
        let t = read_csv_table(Cursor::new("Date,Likes\n"), "inline")?;
        assert_eq!(t.num_rows(), 0);
        assert_eq!(t.num_columns(), 2);

        let t = read_csv_table(Cursor::new("Date,Likes\nunits,count\n"), "inline")?;
        assert_eq!(t.num_rows(), 0);
        Ok(())
    }

    #[test]
    fn file_round_trip_and_missing_file() -> Result<()> {
        let mut tmp = NamedTempFile::new().expect("temp file");
        tmp.write_all(EXPORT.as_bytes()).expect("write export");
        assert_eq!(load_csv_table(tmp.path())?.num_rows(), 2);

        let err = load_csv_table("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, ReportError::SourceUnavailable { .. }));
        Ok(())
    }
}
