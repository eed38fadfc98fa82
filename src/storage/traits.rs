//! Storage traits and error types
//!
//! This module defines the trait interface for the frontier store and
//! associated error types.

use crate::state::{DiscoveredVia, Direction, IgnoreReason, NodeStatus};
use crate::storage::{
    DiscoveryStats, EdgeRecord, LineageEntry, NodeOutcome, NodeRecord, RunRecord, RunStatus,
};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: NodeStatus, to: NodeStatus },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for frontier store implementations
///
/// Every state transition is a conditional update keyed by the node and its
/// expected current status, so several workers (or processes) may share a
/// store without a global lock. Discovery merges are commutative: priority
/// is max-merged and lineage is append-unique.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// Subsequent discoveries and edges are attributed to this run.
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()>;

    // ===== Node Lifecycle =====

    /// Inserts a depth-0 pending seed
    ///
    /// An existing node with the same handle is left untouched.
    ///
    /// # Returns
    ///
    /// True if the seed was newly created
    fn seed(&mut self, username: &str, rating: Option<f64>) -> StorageResult<bool>;

    /// Atomically claims up to `limit` pending nodes with `depth <= max_depth`
    ///
    /// Claimed nodes move to `processing`. Selection order is ascending
    /// depth, then descending priority. Concurrent callers never receive
    /// the same node.
    fn claim_batch(&mut self, limit: u32, max_depth: u32) -> StorageResult<Vec<NodeRecord>>;

    /// Moves a `processing` node to its terminal state
    ///
    /// # Returns
    ///
    /// False if the node was not `processing` (already finalized, or never
    /// claimed); nothing is written in that case.
    fn finalize(&mut self, username: &str, outcome: &NodeOutcome) -> StorageResult<bool>;

    /// Records children found while expanding `parent`
    ///
    /// Each child is created as pending at `parent depth + 1` if absent,
    /// gets its priority max-merged with the computed priority, and gets
    /// `(parent, parent_rating)` appended to its lineage if not yet there.
    fn discover(
        &mut self,
        parent: &str,
        parent_rating: f64,
        direction: Direction,
        children: &[String],
        grandparent_rating: Option<f64>,
    ) -> StorageResult<DiscoveryStats>;

    /// Inserts a pending node unless one already exists
    fn create_if_absent(
        &mut self,
        username: &str,
        depth: u32,
        via: DiscoveredVia,
        priority: f64,
    ) -> StorageResult<bool>;

    /// Raises a node's priority to `priority` if that is higher
    fn raise_priority(&mut self, username: &str, priority: f64) -> StorageResult<bool>;

    /// Adds a lineage entry unless the parent is already recorded
    fn append_lineage_unique(
        &mut self,
        username: &str,
        parent: &str,
        rating: f64,
    ) -> StorageResult<bool>;

    /// Appends edges, swallowing individual insert failures
    ///
    /// # Returns
    ///
    /// The number of edges written
    fn insert_edges_ignoring_conflicts(&mut self, edges: &[EdgeRecord]) -> StorageResult<usize>;

    /// Sets a direction's scraped flag on a `processing` node
    fn mark_connections_scraped(
        &mut self,
        username: &str,
        direction: Direction,
    ) -> StorageResult<bool>;

    // ===== Operational =====

    /// Returns `processing` nodes claimed longer than `stale_after` ago to `pending`
    fn reset_stale_processing(&mut self, stale_after: Duration) -> StorageResult<usize>;

    /// Moves a terminal node back to `pending`, clearing its verdict
    ///
    /// Connection flags are kept so already expanded directions are not
    /// expanded again.
    fn force_rescrape(&mut self, username: &str) -> StorageResult<bool>;

    /// Deletes every node, lineage entry and edge
    fn reset_graph(&mut self) -> StorageResult<()>;

    // ===== Queries =====

    fn get_node(&self, username: &str) -> StorageResult<Option<NodeRecord>>;

    /// Gets a node's lineage ordered by parent
    fn get_lineage(&self, username: &str) -> StorageResult<Vec<LineageEntry>>;

    /// Highest rating among a node's discoverers
    fn best_lineage_rating(&self, username: &str) -> StorageResult<Option<f64>>;

    fn count_nodes_by_status(&self, status: NodeStatus) -> StorageResult<u64>;

    fn count_total_nodes(&self) -> StorageResult<u64>;

    fn count_edges(&self) -> StorageResult<u64>;

    fn edge_exists(&self, from_user: &str, to_user: &str) -> StorageResult<bool>;

    /// Gets ignored node counts per reason
    fn ignored_reason_summary(&self) -> StorageResult<HashMap<IgnoreReason, u64>>;

    /// Gets node count breakdown by depth
    fn depth_breakdown(&self) -> StorageResult<HashMap<u32, usize>>;

    /// Gets the highest rated processed nodes
    fn top_rated(&self, limit: u32) -> StorageResult<Vec<NodeRecord>>;
}
