/// Node state definitions for tracking crawl progress
///
/// This module defines the states a node moves through during a crawl, and
/// the relationship direction a node was discovered through.
use std::fmt;

/// Represents the current state of a node in the crawl process
///
/// Nodes move `Pending -> Processing -> {Processed | Ignored}`. Terminal
/// states are only left through an explicit forced re-scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeStatus {
    /// Node has been discovered and is waiting to be claimed
    Pending,

    /// Node has been claimed by a worker
    Processing,

    /// Node passed the filter gate and was rated
    Processed,

    /// Node was rejected by the gate or failed while scraping
    Ignored,
}

impl NodeStatus {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Processed | Self::Ignored)
    }

    /// Returns true if the crawl loop may still act on this node
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Returns true if the state machine allows moving from `self` to `next`
    ///
    /// Only covers the transitions the crawl loop performs. A forced
    /// re-scrape is a separate store operation and bypasses this check.
    pub fn can_transition_to(&self, next: NodeStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Processed)
                | (Self::Processing, Self::Ignored)
                | (Self::Processing, Self::Pending)
        )
    }

    /// Converts the node status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Ignored => "ignored",
        }
    }

    /// Parses a node status from a database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "processed" => Some(Self::Processed),
            "ignored" => Some(Self::Ignored),
            _ => None,
        }
    }

    /// Returns all possible node statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Processing,
            Self::Processed,
            Self::Ignored,
        ]
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Relationship direction expanded from a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Accounts that follow the node
    Followers,

    /// Accounts the node follows
    Following,
}

impl Direction {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Followers => "followers",
            Self::Following => "following",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "followers" => Some(Self::Followers),
            "following" => Some(Self::Following),
            _ => None,
        }
    }

    /// Path segment used by the relationship API
    pub fn api_segment(&self) -> &'static str {
        self.to_db_string()
    }

    /// Orients an edge between an expanded node and one of its connections
    ///
    /// Edges are stored as "from follows to".
    pub fn edge<'a>(&self, node: &'a str, connection: &'a str) -> (&'a str, &'a str) {
        match self {
            Self::Following => (node, connection),
            Self::Followers => (connection, node),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// How a node first entered the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveredVia {
    Seed,
    Followers,
    Following,
}

impl DiscoveredVia {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::Followers => "followers",
            Self::Following => "following",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "seed" => Some(Self::Seed),
            "followers" => Some(Self::Followers),
            "following" => Some(Self::Following),
            _ => None,
        }
    }
}

impl From<Direction> for DiscoveredVia {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Followers => Self::Followers,
            Direction::Following => Self::Following,
        }
    }
}

impl fmt::Display for DiscoveredVia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
