//! Crawl priority model
//!
//! A discovered node's priority is derived from the rating of the node that
//! found it, how it was found, and how far it is from the seeds.

use crate::state::Direction;

/// Weight of the parent's rating when a grandparent rating is blended in
const PARENT_WEIGHT: f64 = 0.7;

/// Weight of the grandparent's rating when blended in
const GRANDPARENT_WEIGHT: f64 = 0.3;

/// Multiplier applied to the effective rating for a relationship direction
///
/// A parent following the child is an endorsement; a child following the
/// parent is a weak signal.
pub fn direction_multiplier(direction: Direction) -> f64 {
    match direction {
        Direction::Following => 1.5,
        Direction::Followers => 0.7,
    }
}

/// Computes the crawl priority of a discovered child
///
/// `effective = 0.7 * parent + 0.3 * grandparent` when a grandparent rating
/// is known, otherwise the parent rating alone. The effective rating is
/// scaled by the direction multiplier, divided by `sqrt(child_depth)` and
/// rounded to two decimals. Zero or negative ratings yield zero or
/// negative priorities.
///
/// Seeds never go through this function; a `child_depth` of 0 is treated
/// as 1.
pub fn compute_priority(
    parent_rating: f64,
    direction: Direction,
    child_depth: u32,
    grandparent_rating: Option<f64>,
) -> f64 {
    let effective = match grandparent_rating {
        Some(grandparent) => PARENT_WEIGHT * parent_rating + GRANDPARENT_WEIGHT * grandparent,
        None => parent_rating,
    };

    let decay = f64::from(child_depth.max(1)).sqrt();
    round2(effective * direction_multiplier(direction) / decay)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
