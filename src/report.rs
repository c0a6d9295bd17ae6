// src/report.rs
use std::{path::PathBuf, sync::Arc, time::Instant};
use tracing::info;

use crate::{
    artifact::{artifact_name, ArtifactWriter, FsArtifactWriter},
    cache::TableCache,
    derive::{
        self, geo, GeoDistribution, TimeSeries, TopPosts, TOP_CITIES, TOP_POSTS,
    },
    error::Result,
    render::{
        Chart, ChartKind, ChartRenderer, ChartSpec, HoverField, HtmlChartRenderer, SeriesStyle,
        ValueFormat, XAxis,
    },
    select::{self, AnalyticsColumnSpec, ANALYTICS_COLUMNS},
    source::{RowSourceAdapter, SourceLocation},
    table::Table,
};

pub const PAGE_REPORT: &str = "page";
pub const POSTS_REPORT: &str = "post";

/// Datasets behind the page analytics artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct PageReport {
    pub engagement: TimeSeries,
    pub likes: TimeSeries,
    pub geo: GeoDistribution,
}

/// Datasets behind the post analytics artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct PostsReport {
    pub top: TopPosts,
}

impl PageReport {
    /// Engagement and likes line charts, then the reader-locations bars.
    pub fn charts(&self) -> Result<Vec<Chart>> {
        let date_hover = || {
            vec![
                HoverField::field("Date", select::DATE, ValueFormat::Date),
                HoverField::y("Count", ValueFormat::Integer),
            ]
        };
        let engagement = Chart {
            spec: ChartSpec {
                title: "Page Engagement".into(),
                kind: ChartKind::Line,
                x_field: select::DATE.into(),
                x_axis: XAxis::Date,
                x_label: "Date".into(),
                y_label: "Count".into(),
                series: vec![
                    SeriesStyle::new(select::DAILY_PAGE_ENGAGED_USERS, "daily clicks", "#7fc97f", 3.0),
                    SeriesStyle::new(select::DAILY_TOTAL_IMPRESSIONS, "daily visits", "#fdc086", 3.0),
                    SeriesStyle::new(select::DAILY_ORGANIC_REACH, "daily organic visitors", "#e0ecf4", 1.0),
                    SeriesStyle::new(select::DAILY_VIRAL_REACH, "daily viral visitors", "#9ebcda", 1.0),
                    SeriesStyle::new(select::DAILY_TOTAL_REACH, "daily visitors", "#beaed4", 3.0),
                ],
                hover: date_hover(),
                shorten_labels: false,
            },
            data: self.engagement.to_batch()?,
        };
        let likes = Chart {
            spec: ChartSpec {
                title: "Total Likes".into(),
                kind: ChartKind::Line,
                x_field: select::DATE.into(),
                x_axis: XAxis::Date,
                x_label: "Date".into(),
                y_label: "Count".into(),
                series: vec![SeriesStyle::new(select::LIFETIME_TOTAL_LIKES, "likes", "black", 4.0)],
                hover: date_hover(),
                shorten_labels: false,
            },
            data: self.likes.to_batch()?,
        };
        let locations = Chart {
            spec: ChartSpec {
                title: "Reader Locations".into(),
                kind: ChartKind::Bar,
                x_field: geo::CITY_FIELD.into(),
                x_axis: XAxis::Category,
                x_label: "Cities".into(),
                y_label: "Count".into(),
                series: vec![SeriesStyle::new(geo::READERS_FIELD, "readers", "#1f77b4", 0.8)],
                hover: vec![
                    HoverField::field("City", geo::CITY_FIELD, ValueFormat::Text),
                    HoverField::field("Readers", geo::READERS_FIELD, ValueFormat::Integer),
                ],
                shorten_labels: false,
            },
            data: self.geo.to_batch()?,
        };
        Ok(vec![engagement, likes, locations])
    }
}

impl PostsReport {
    /// One grouped bar chart, four bars per post.
    pub fn charts(&self) -> Result<Vec<Chart>> {
        let favourites = Chart {
            spec: ChartSpec {
                title: "Favorite Posts".into(),
                kind: ChartKind::Bar,
                x_field: select::POST_MESSAGE.into(),
                x_axis: XAxis::Category,
                x_label: String::new(),
                y_label: String::new(),
                series: vec![
                    SeriesStyle::new(select::LIFETIME_POST_TOTAL_REACH, "unique visitors", "#1b9e77", 0.1),
                    SeriesStyle::new(select::LIFETIME_ENGAGED_USERS, "likes/comments/shares", "#99d8c9", 0.1),
                    SeriesStyle::new(select::LIFETIME_POST_CONSUMERS, "unique clicks", "#d95f02", 0.1),
                    SeriesStyle::new(select::LIFETIME_POST_CONSUMPTIONS, "total clicks", "#fdbb84", 0.1),
                ],
                hover: vec![
                    HoverField::field("Title", select::POST_MESSAGE, ValueFormat::Text),
                    HoverField::field("Date", select::POSTED, ValueFormat::DateTime),
                ],
                shorten_labels: true,
            },
            data: self.top.to_batch()?,
        };
        Ok(vec![favourites])
    }
}

/// Builds and publishes the reports of one page.
///
/// Tables come through the shared [`TableCache`]; a cached table is reused
/// until [`ReportAssembler::refresh`] (or the background task) reloads it.
pub struct ReportAssembler {
    cache: Arc<TableCache>,
    adapter: RowSourceAdapter,
    columns: &'static AnalyticsColumnSpec,
    page: SourceLocation,
    posts: SourceLocation,
    renderer: Arc<dyn ChartRenderer>,
    writer: Arc<dyn ArtifactWriter>,
}

impl ReportAssembler {
    /// Assembler writing HTML into `graphs/`; see [`Self::with_renderer`]
    /// and [`Self::with_writer`].
    pub fn new(
        cache: Arc<TableCache>,
        adapter: RowSourceAdapter,
        page: SourceLocation,
        posts: SourceLocation,
    ) -> Self {
        Self {
            cache,
            adapter,
            columns: &ANALYTICS_COLUMNS,
            page,
            posts,
            renderer: Arc::new(HtmlChartRenderer::default()),
            writer: Arc::new(FsArtifactWriter::new("graphs")),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn ChartRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_writer(mut self, writer: Arc<dyn ArtifactWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn cache(&self) -> &Arc<TableCache> {
        &self.cache
    }

    pub fn page_source(&self) -> &SourceLocation {
        &self.page
    }

    pub fn posts_source(&self) -> &SourceLocation {
        &self.posts
    }

    // page and posts tables of one location are shaped differently, so the
    // table kind is part of the key
    fn page_table(&self, source: &SourceLocation, force_refresh: bool) -> Result<Arc<Table>> {
        self.cache.get(
            &format!("{}:{}", PAGE_REPORT, source.key()),
            || self.adapter.load_page_table(source, self.columns),
            force_refresh,
        )
    }

    fn posts_table(&self, source: &SourceLocation, force_refresh: bool) -> Result<Arc<Table>> {
        self.cache.get(
            &format!("{}:{}", POSTS_REPORT, source.key()),
            || self.adapter.load_posts_table(source, self.columns),
            force_refresh,
        )
    }

    /// Engagement, likes and geography datasets for a page source.
    #[tracing::instrument(level = "info", skip(self), fields(source = %source))]
    pub fn build_page_report(&self, source: &SourceLocation) -> Result<PageReport> {
        let page = self.page_table(source, false)?;
        let report = PageReport {
            engagement: derive::engagement_series(&page)?,
            likes: derive::likes_series(&page)?,
            geo: derive::geo_distribution(&page, TOP_CITIES),
        };
        info!(
            days = report.engagement.dates.len(),
            cities = report.geo.len(),
            "page report built"
        );
        Ok(report)
    }

    /// Top posts dataset for a posts source.
    #[tracing::instrument(level = "info", skip(self), fields(source = %source))]
    pub fn build_posts_report(&self, source: &SourceLocation) -> Result<PostsReport> {
        let posts = self.posts_table(source, false)?;
        let report = PostsReport {
            top: derive::top_posts(&posts, TOP_POSTS)?,
        };
        info!(posts = report.top.len(), "posts report built");
        Ok(report)
    }

    /// Render and write `<page_id>_page_analytics.html`.
    pub fn publish_page_report(&self, page_id: &str) -> Result<PathBuf> {
        let start = Instant::now();
        let report = self.build_page_report(&self.page)?;
        let html = self.renderer.render("Page Analytics", &report.charts()?)?;
        let path = self.writer.write(&artifact_name(page_id, PAGE_REPORT), &html)?;
        info!(
            page_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "page analytics published"
        );
        Ok(path)
    }

    /// Render and write `<page_id>_post_analytics.html`.
    pub fn publish_posts_report(&self, page_id: &str) -> Result<PathBuf> {
        let start = Instant::now();
        let report = self.build_posts_report(&self.posts)?;
        let html = self.renderer.render("Post Analytics", &report.charts()?)?;
        let path = self.writer.write(&artifact_name(page_id, POSTS_REPORT), &html)?;
        info!(
            page_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "post analytics published"
        );
        Ok(path)
    }

    pub fn publish_all(&self, page_id: &str) -> Result<Vec<PathBuf>> {
        Ok(vec![
            self.publish_page_report(page_id)?,
            self.publish_posts_report(page_id)?,
        ])
    }

    /// Reload both tables, replacing whatever the cache holds.
    pub fn refresh(&self) -> Result<()> {
        let start = Instant::now();
        let page = self.page_table(&self.page, true)?;
        let posts = self.posts_table(&self.posts, true)?;
        info!(
            page_rows = page.num_rows(),
            posts_rows = posts.num_rows(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "tables refreshed"
        );
        Ok(())
    }
}
