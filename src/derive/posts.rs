// src/derive/posts.rs
use arrow::{
    array::{Array, ArrayRef, Float64Array, StringArray, TimestampMillisecondArray},
    datatypes::{DataType, Field, Schema, TimeUnit},
    record_batch::RecordBatch,
};
use chrono::NaiveDateTime;
use std::{cmp::Ordering, sync::Arc};
use tracing::warn;

use crate::{
    error::{ReportError, Result},
    select,
    table::{parse, Table},
};

/// Number of posts on the favourite-posts chart.
pub const TOP_POSTS: usize = 5;

/// Post metric drawn on the chart, in drawing order. The first one ranks.
pub const POST_METRICS: [&str; 4] = [
    select::LIFETIME_POST_TOTAL_REACH,
    select::LIFETIME_ENGAGED_USERS,
    select::LIFETIME_POST_CONSUMERS,
    select::LIFETIME_POST_CONSUMPTIONS,
];

#[derive(Debug, Clone, PartialEq)]
pub struct PostRow {
    pub message: Option<String>,
    pub posted: Option<NaiveDateTime>,
    /// Values for [`POST_METRICS`], same order.
    pub metrics: [Option<f64>; 4],
    /// The same cells as the source wrote them.
    pub raw_metrics: [Option<String>; 4],
}

impl PostRow {
    pub fn reach(&self) -> Option<f64> {
        self.metrics[0]
    }
}

/// Best posts by total reach, largest first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopPosts {
    pub posts: Vec<PostRow>,
}

impl TopPosts {
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn to_batch(&self) -> Result<RecordBatch> {
        let mut fields = vec![
            Field::new(select::POST_MESSAGE, DataType::Utf8, true),
            Field::new(
                select::POSTED,
                DataType::Timestamp(TimeUnit::Millisecond, None),
                true,
            ),
        ];
        let messages: StringArray = self.posts.iter().map(|p| p.message.as_deref()).collect();
        let posted: TimestampMillisecondArray = self
            .posts
            .iter()
            .map(|p| p.posted.map(|ts| ts.and_utc().timestamp_millis()))
            .collect();
        let mut columns: Vec<ArrayRef> = vec![Arc::new(messages), Arc::new(posted)];

        for (idx, name) in POST_METRICS.iter().enumerate() {
            fields.push(Field::new(*name, DataType::Float64, true));
            let values: Float64Array = self.posts.iter().map(|p| p.metrics[idx]).collect();
            columns.push(Arc::new(values));
        }
        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
    }
}

/// The `limit` posts with the largest total reach. Equal reach keeps table
/// order; posts whose reach is missing or not a number rank after all others.
pub fn top_posts(posts: &Table, limit: usize) -> Result<TopPosts> {
    if posts.num_rows() == 0 {
        return Ok(TopPosts::default());
    }
    if !posts.has_column(select::LIFETIME_POST_TOTAL_REACH) {
        return Err(ReportError::missing_column(
            "posts",
            select::LIFETIME_POST_TOTAL_REACH,
        ));
    }

    let messages = posts.text_column(select::POST_MESSAGE);
    let posted = posts.text_column(select::POSTED);
    let metric_columns: Vec<Option<&StringArray>> =
        POST_METRICS.iter().map(|m| posts.text_column(m)).collect();

    let mut malformed = 0usize;
    let mut rows: Vec<PostRow> = (0..posts.num_rows())
        .map(|i| {
            let mut metrics = [None; 4];
            let mut raw_metrics: [Option<String>; 4] = Default::default();
            for ((slot, raw), column) in metrics
                .iter_mut()
                .zip(raw_metrics.iter_mut())
                .zip(&metric_columns)
            {
                let Some(text) = column.and_then(|c| cell(c, i)) else {
                    continue;
                };
                *slot = parse::parse_number(text);
                if slot.is_none() {
                    malformed += 1;
                }
                *raw = Some(text.to_string());
            }
            PostRow {
                message: messages.and_then(|c| cell(c, i)).map(str::to_string),
                posted: posted.and_then(|c| cell(c, i)).and_then(parse::parse_timestamp),
                metrics,
                raw_metrics,
            }
        })
        .collect();

    if malformed > 0 {
        warn!(malformed, "non-numeric post metrics left missing");
    }

    // stable: equal reach keeps table order
    rows.sort_by(|a, b| match (a.reach(), b.reach()) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    rows.truncate(limit);
    Ok(TopPosts { posts: rows })
}

fn cell(column: &StringArray, row: usize) -> Option<&str> {
    if column.is_null(row) {
        None
    } else {
        Some(column.value(row))
    }
}
