//! Output module for crawl reporting
//!
//! Aggregates frontier statistics (status totals, ignored reasons, depth
//! breakdown, edge count, top-rated nodes) and prints them.

pub mod stats;

pub use stats::{load_statistics, print_statistics, render_statistics, CrawlStatistics, RatedNode};
