// src/derive/mod.rs
//! Chart datasets derived from the cached tables. Every deriver is a pure
//! function of its input table.
pub mod geo;
pub mod posts;
pub mod series;

pub use geo::{geo_distribution, CityReaders, GeoDistribution, TOP_CITIES};
pub use posts::{top_posts, PostRow, TopPosts, POST_METRICS, TOP_POSTS};
pub use series::{engagement_series, likes_series, MetricSeries, TimeSeries, ENGAGEMENT_METRICS};
