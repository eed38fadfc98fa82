//! Social-Ripple: an incremental social graph crawler
//!
//! This crate discovers and scores profiles in a follower/following graph,
//! expanding outward from a seed set to a bounded depth. Discovered nodes are
//! persisted in a frontier store so a crawl can be stopped and resumed without
//! losing work or processing any profile twice.

pub mod config;
pub mod crawler;
pub mod filter;
pub mod output;
pub mod remote;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Social-Ripple operations
#[derive(Debug, Error)]
pub enum RippleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors surfaced by a single remote read
///
/// Rate-limit responses never appear here: the fetcher waits them out and
/// retries. Everything else is a permanent failure for that attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Not found: {url}")]
    NotFound { url: String },

    #[error("HTTP {status} from {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Malformed payload from {url}: {message}")]
    Malformed { url: String, message: String },
}

impl FetchError {
    /// Returns true if the remote reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for Social-Ripple operations
pub type Result<T> = std::result::Result<T, RippleError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for remote reads
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{compute_priority, Coordinator, CrawlReport};
pub use filter::{evaluate_profile, FilterVerdict};
pub use state::{DiscoveredVia, Direction, IgnoreReason, NodeStatus};
