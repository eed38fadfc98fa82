//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `NodeStatus`: the per-node state machine (pending, processing, processed, ignored)
//! - `Direction` / `DiscoveredVia`: relationship direction a node was expanded or found through
//! - `IgnoreReason`: reason codes for nodes that end in the ignored state

mod ignore_reason;
mod node_state;

// Re-export main types
pub use ignore_reason::IgnoreReason;
pub use node_state::{DiscoveredVia, Direction, NodeStatus};
