//! Crawler module for graph expansion and scoring
//!
//! This module contains the core crawling logic, including:
//! - The priority model for discovered nodes
//! - Lazy paging over a node's connections
//! - Per-node processing (enrich, gate, rate, expand)
//! - Overall crawl coordination

mod coordinator;
mod pager;
mod priority;
mod worker;

pub use coordinator::{run_crawl, Coordinator, CrawlDeps, CrawlReport};
pub use pager::ConnectionPager;
pub use priority::{compute_priority, direction_multiplier};
pub use worker::{NodeDisposition, NodeSummary, NodeWorker};
