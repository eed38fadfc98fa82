//! Storage module for the crawl frontier
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - The per-node state machine and its conditional transitions
//! - Idempotent discovery (create-if-absent, priority max-merge, lineage)
//! - Append-only edge bookkeeping
//! - Run tracking and crash recovery (stale claim sweep)

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::remote::{Enrichment, Profile, Rating};
use crate::state::{Direction, DiscoveredVia, IgnoreReason, NodeStatus};
use crate::RippleError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(RippleError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, RippleError> {
    SqliteStorage::new(path)
}

/// Lowercases a handle so the same profile always maps to one node
pub fn normalize_username(username: &str) -> String {
    username.trim().to_ascii_lowercase()
}

/// Which relationship directions have been expanded for a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapedConnections {
    pub followers: bool,
    pub following: bool,
}

impl ScrapedConnections {
    pub fn is_scraped(&self, direction: Direction) -> bool {
        match direction {
            Direction::Followers => self.followers,
            Direction::Following => self.following,
        }
    }
}

/// Represents a node in the database
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub username: String,
    pub status: NodeStatus,
    pub depth: u32,
    pub priority: f64,
    pub discovered_via: DiscoveredVia,
    pub scraped: ScrapedConnections,

    /// Trusted rating supplied with a seed entry
    pub seed_rating: Option<f64>,

    pub rating: Option<f64>,
    pub reasoning: Option<String>,
    pub archetypes: Vec<String>,
    pub ignored_reason: Option<IgnoreReason>,
    pub error_message: Option<String>,
    pub profile: Option<Profile>,
    pub enrichment: Option<Enrichment>,
    pub claimed_at: Option<String>,
    pub discovered_at: String,
    pub finalized_at: Option<String>,
}

/// One discoverer of a node and its rating at discovery time
#[derive(Debug, Clone, PartialEq)]
pub struct LineageEntry {
    pub parent: String,
    pub rating: f64,
}

/// A follow edge: `from_user` follows `to_user`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRecord {
    pub from_user: String,
    pub to_user: String,
    pub via: Direction,
}

impl EdgeRecord {
    /// Orients the edge between an expanded node and one of its connections
    pub fn between(node: &str, connection: &str, via: Direction) -> Self {
        let (from, to) = via.edge(node, connection);
        Self {
            from_user: from.to_string(),
            to_user: to.to_string(),
            via,
        }
    }
}

/// Terminal outcome written by `finalize`
#[derive(Debug, Clone)]
pub enum NodeOutcome {
    /// Node passed the gate (or was a trusted seed) and was rated
    Processed {
        rating: Rating,
        profile: Profile,
        enrichment: Enrichment,
    },

    /// Node was rejected or failed
    ///
    /// Profile and enrichment are kept when they were fetched so rejected
    /// nodes can still be analysed.
    Ignored {
        reason: IgnoreReason,
        message: Option<String>,
        profile: Option<Profile>,
        enrichment: Option<Enrichment>,
    },
}

impl NodeOutcome {
    /// Ignored outcome for a node whose processing failed
    pub fn scraping_error(message: impl Into<String>) -> Self {
        Self::Ignored {
            reason: IgnoreReason::ErrorScraping,
            message: Some(message.into()),
            profile: None,
            enrichment: None,
        }
    }

    /// The terminal status this outcome moves a node to
    pub fn status(&self) -> NodeStatus {
        match self {
            Self::Processed { .. } => NodeStatus::Processed,
            Self::Ignored { .. } => NodeStatus::Ignored,
        }
    }
}

/// Counters returned by a `discover` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    /// Children inserted as new pending nodes
    pub created: usize,

    /// Existing children whose priority was raised
    pub raised: usize,

    /// New lineage entries
    pub lineage_added: usize,

    /// Children skipped because they are the parent itself
    pub skipped: usize,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
