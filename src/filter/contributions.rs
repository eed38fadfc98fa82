//! Contribution calendar analysis

use crate::remote::ContributionDay;
use chrono::{Datelike, Weekday};
use std::collections::HashSet;

/// Number of distinct calendar months with at least one contribution
pub fn active_months(days: &[ContributionDay]) -> u32 {
    days.iter()
        .filter(|day| day.count > 0)
        .map(|day| (day.date.year(), day.date.month()))
        .collect::<HashSet<_>>()
        .len() as u32
}

/// Share of contributions made Monday to Friday
///
/// Returns None when there are no contributions at all.
pub fn weekday_ratio(days: &[ContributionDay]) -> Option<f64> {
    let mut weekday = 0u64;
    let mut total = 0u64;

    for day in days {
        let count = u64::from(day.count);
        total += count;
        if !matches!(day.date.weekday(), Weekday::Sat | Weekday::Sun) {
            weekday += count;
        }
    }

    (total > 0).then(|| weekday as f64 / total as f64)
}
