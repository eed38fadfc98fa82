//! Statistics generation from the frontier database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::state::{IgnoreReason, NodeStatus};
use crate::storage::{RunRecord, Storage};
use crate::RippleError;
use std::collections::HashMap;
use std::fmt::Write;

/// Number of top-rated nodes included in the statistics
const TOP_RATED_LIMIT: u32 = 10;

/// A rated node as shown in the statistics
#[derive(Debug, Clone, PartialEq)]
pub struct RatedNode {
    pub username: String,
    pub depth: u32,
    pub rating: f64,
    pub archetypes: Vec<String>,
}

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Most recent crawl run, if any
    pub latest_run: Option<RunRecord>,

    /// Total number of nodes discovered
    pub total_nodes: u64,

    /// Count of nodes by status
    pub nodes_by_status: HashMap<NodeStatus, u64>,

    /// Ignored nodes per reason code
    pub ignored_reasons: HashMap<IgnoreReason, u64>,

    /// Node count per depth
    pub depth_breakdown: HashMap<u32, usize>,

    /// Total number of recorded edges
    pub total_edges: u64,

    /// Highest rated processed nodes
    pub top_rated: Vec<RatedNode>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(RippleError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics, RippleError> {
    let mut nodes_by_status = HashMap::new();
    for status in NodeStatus::all_statuses() {
        let count = storage.count_nodes_by_status(status)?;
        if count > 0 {
            nodes_by_status.insert(status, count);
        }
    }

    let top_rated = storage
        .top_rated(TOP_RATED_LIMIT)?
        .into_iter()
        .filter_map(|node| {
            node.rating.map(|rating| RatedNode {
                username: node.username,
                depth: node.depth,
                rating,
                archetypes: node.archetypes,
            })
        })
        .collect();

    Ok(CrawlStatistics {
        latest_run: storage.get_latest_run()?,
        total_nodes: storage.count_total_nodes()?,
        nodes_by_status,
        ignored_reasons: storage.ignored_reason_summary()?,
        depth_breakdown: storage.depth_breakdown()?,
        total_edges: storage.count_edges()?,
        top_rated,
    })
}

/// Renders statistics as a plain-text report
pub fn render_statistics(stats: &CrawlStatistics) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "=== Crawl Statistics ===\n");

    if let Some(run) = &stats.latest_run {
        let _ = writeln!(
            out,
            "Latest run: #{} ({}), started {}",
            run.id,
            run.status.to_db_string(),
            run.started_at
        );
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "Overview:");
    let _ = writeln!(out, "  Total nodes discovered: {}", stats.total_nodes);
    let _ = writeln!(out, "  Total edges recorded: {}", stats.total_edges);
    let _ = writeln!(out);

    let _ = writeln!(out, "Nodes by Status:");
    for status in NodeStatus::all_statuses() {
        let count = stats.nodes_by_status.get(&status).copied().unwrap_or(0);
        let percentage = if stats.total_nodes > 0 {
            (count as f64 / stats.total_nodes as f64) * 100.0
        } else {
            0.0
        };
        let _ = writeln!(out, "  {}: {} ({:.1}%)", status, count, percentage);
    }
    let _ = writeln!(out);

    if !stats.ignored_reasons.is_empty() {
        let _ = writeln!(out, "Ignored Reasons:");
        let mut reasons: Vec<_> = stats.ignored_reasons.iter().collect();
        reasons.sort_by(|a, b| {
            b.1.cmp(a.1)
                .then_with(|| a.0.to_db_string().cmp(b.0.to_db_string()))
        });

        for (reason, count) in reasons {
            let kind = if reason.is_quality_rejection() {
                ""
            } else {
                " (failure)"
            };
            let _ = writeln!(out, "  {}: {}{}", reason, count, kind);
        }
        let _ = writeln!(out);
    }

    if !stats.depth_breakdown.is_empty() {
        let _ = writeln!(out, "Depth Breakdown:");
        let mut depths: Vec<_> = stats.depth_breakdown.iter().collect();
        depths.sort_by_key(|(depth, _)| **depth);

        for (depth, count) in depths {
            let _ = writeln!(out, "  depth {}: {}", depth, count);
        }
        let _ = writeln!(out);
    }

    if !stats.top_rated.is_empty() {
        let _ = writeln!(out, "Top Rated:");
        for (rank, node) in stats.top_rated.iter().enumerate() {
            let archetypes = if node.archetypes.is_empty() {
                String::new()
            } else {
                format!(" [{}]", node.archetypes.join(", "))
            };
            let _ = writeln!(
                out,
                "  {:>2}. {} ({:.1}, depth {}){}",
                rank + 1,
                node.username,
                node.rating,
                node.depth,
                archetypes
            );
        }
    }

    out
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    print!("{}", render_statistics(stats));
}
