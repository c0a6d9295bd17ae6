// src/select.rs
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::{error::Result, table::Table};

pub const DATE: &str = "Date";
pub const DAILY_PAGE_ENGAGED_USERS: &str = "Daily Page Engaged Users";
pub const DAILY_TOTAL_IMPRESSIONS: &str = "Daily Total Impressions";
pub const DAILY_ORGANIC_REACH: &str = "Daily Organic Reach";
pub const DAILY_VIRAL_REACH: &str = "Daily Viral Reach";
pub const DAILY_TOTAL_REACH: &str = "Daily Total Reach";
pub const LIFETIME_TOTAL_LIKES: &str = "Lifetime Total Likes";
pub const POSTED: &str = "Posted";
pub const POST_MESSAGE: &str = "Post Message";
pub const LIFETIME_POST_TOTAL_REACH: &str = "Lifetime Post Total Reach";
pub const LIFETIME_ENGAGED_USERS: &str = "Lifetime Engaged Users";
pub const LIFETIME_POST_CONSUMERS: &str = "Lifetime Post Consumers";
pub const LIFETIME_POST_CONSUMPTIONS: &str = "Lifetime Post Consumptions";

/// Per-city geography columns; the city name follows the marker.
pub const CITY_PREFIX: &str = "Daily City: People Talking About This - ";

/// Allow-list of analytics columns: exact names plus name prefixes whose
/// concrete suffixes are only known once a source is read.
#[derive(Debug)]
pub struct AnalyticsColumnSpec {
    pub exact: &'static [&'static str],
    pub prefixes: &'static [&'static str],
    pattern: Option<Regex>,
}

impl AnalyticsColumnSpec {
    fn new(exact: &'static [&'static str], prefixes: &'static [&'static str]) -> Self {
        let exact_alt = exact
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");
        let prefix_alt = prefixes
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");
        let source = match (exact.is_empty(), prefixes.is_empty()) {
            (false, false) => Some(format!("^(?:{exact_alt})$|^(?:{prefix_alt})")),
            (false, true) => Some(format!("^(?:{exact_alt})$")),
            (true, false) => Some(format!("^(?:{prefix_alt})")),
            (true, true) => None,
        };
        // escaped literals joined by alternation always compile
        let pattern = source.map(|s| Regex::new(&s).expect("column allow-list pattern"));
        Self {
            exact,
            prefixes,
            pattern,
        }
    }

    pub fn matches(&self, column: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(column))
    }
}

pub static ANALYTICS_COLUMNS: Lazy<AnalyticsColumnSpec> = Lazy::new(|| {
    AnalyticsColumnSpec::new(
        &[
            DATE,
            DAILY_PAGE_ENGAGED_USERS,
            DAILY_TOTAL_IMPRESSIONS,
            DAILY_ORGANIC_REACH,
            DAILY_VIRAL_REACH,
            DAILY_TOTAL_REACH,
            LIFETIME_TOTAL_LIKES,
            POSTED,
            POST_MESSAGE,
            LIFETIME_POST_TOTAL_REACH,
            LIFETIME_ENGAGED_USERS,
            LIFETIME_POST_CONSUMERS,
            LIFETIME_POST_CONSUMPTIONS,
        ],
        &[CITY_PREFIX],
    )
});

/// Restrict `table` to the allow-listed columns, keeping their order.
/// A table with no matching column comes back with zero columns.
pub fn select_columns(table: &Table, spec: &AnalyticsColumnSpec) -> Result<Table> {
    let selected = table.retain_columns(|name| spec.matches(name))?;
    debug!(
        before = table.num_columns(),
        after = selected.num_columns(),
        "selected analytics columns"
    );
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str]) -> Table {
        Table::from_rows(
            headers.iter().map(|h| h.to_string()).collect(),
            vec![vec![Some("1".to_string()); headers.len()]],
        )
        .unwrap()
    }

    #[test]
    fn exact_and_prefix_matches_survive_in_order() -> Result<()> {
        let t = table(&[
            "_id",
            "Daily City: People Talking About This - Paris, France",
            "Date",
            "Date (UTC)",
            "Lifetime Total Likes",
            "Weekly Total Reach",
        ]);
        let selected = select_columns(&t, &ANALYTICS_COLUMNS)?;
        assert_eq!(
            selected.column_names(),
            vec![
                "Daily City: People Talking About This - Paris, France",
                "Date",
                "Lifetime Total Likes",
            ]
        );
        Ok(())
    }

    #[test]
    fn consumptions_and_city_prefix_are_separate_entries() {
        assert!(ANALYTICS_COLUMNS.matches(LIFETIME_POST_CONSUMPTIONS));
        assert!(ANALYTICS_COLUMNS.matches("Daily City: People Talking About This - Oslo"));
        assert!(!ANALYTICS_COLUMNS.matches("Prefix Daily City: People Talking About This - Oslo"));
    }

    #[test]
    fn no_overlap_gives_zero_columns() -> Result<()> {
        let t = table(&["foo", "bar"]);
        let selected = select_columns(&t, &ANALYTICS_COLUMNS)?;
        assert_eq!(selected.num_columns(), 0);
        assert_eq!(selected.num_rows(), 1);
        Ok(())
    }
}
