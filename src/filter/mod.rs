//! Profile filter gate
//!
//! A pure accept/reject predicate applied to every enriched node before it
//! is rated. Rejections carry a reason code and are a normal terminal
//! outcome, not an error.

mod contributions;
mod gate;

pub use contributions::{active_months, weekday_ratio};
pub use gate::evaluate_profile;

use crate::state::IgnoreReason;

/// Outcome of the filter gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    Accept,
    Reject(IgnoreReason),
}
