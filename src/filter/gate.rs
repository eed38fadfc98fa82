use crate::config::FilterConfig;
use crate::filter::contributions::{active_months, weekday_ratio};
use crate::filter::FilterVerdict;
use crate::remote::{Enrichment, Profile};
use crate::state::IgnoreReason;

/// Evaluates an enriched profile against the quality thresholds
///
/// Checks run in a fixed order and the first failure wins:
/// 1. Location mentions a banned country
/// 2. Too few populated optional fields (bio, external handle, blog, location)
/// 3. No contribution calendar
/// 4. Total contributions below the minimum
/// 5. Too few active months
/// 6. Weekday share above the maximum
pub fn evaluate_profile(
    profile: &Profile,
    enrichment: &Enrichment,
    config: &FilterConfig,
) -> FilterVerdict {
    if in_banned_country(profile.location.as_deref(), &config.banned_countries) {
        return FilterVerdict::Reject(IgnoreReason::BannedCountry);
    }

    if populated_fields(profile) < config.min_profile_fields {
        return FilterVerdict::Reject(IgnoreReason::SparseProfile);
    }

    let contributions = match &enrichment.contributions {
        Some(contributions) => contributions,
        None => return FilterVerdict::Reject(IgnoreReason::NoContributionData),
    };

    if contributions.total < config.min_contributions {
        return FilterVerdict::Reject(IgnoreReason::LowContributions);
    }

    if active_months(&contributions.days) < config.min_active_months {
        return FilterVerdict::Reject(IgnoreReason::FewActiveMonths);
    }

    if let Some(ratio) = weekday_ratio(&contributions.days) {
        if ratio > config.max_weekday_ratio {
            return FilterVerdict::Reject(IgnoreReason::WeekdayHeavy);
        }
    }

    FilterVerdict::Accept
}

/// True when a banned country appears in the location as whole words
///
/// "Lagos, Nigeria" matches "Nigeria" but not "Niger".
fn in_banned_country(location: Option<&str>, banned: &[String]) -> bool {
    let location = match location {
        Some(location) => words(location),
        None => return false,
    };
    if location.is_empty() {
        return false;
    }

    banned.iter().any(|country| {
        let country = words(country);
        !country.is_empty()
            && location
                .windows(country.len())
                .any(|window| window == country.as_slice())
    })
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Counts populated optional fields among bio, external handle, blog and location
fn populated_fields(profile: &Profile) -> u32 {
    [
        &profile.bio,
        &profile.twitter_username,
        &profile.blog,
        &profile.location,
    ]
    .iter()
    .filter(|field| field.as_deref().map_or(false, |v| !v.trim().is_empty()))
    .count() as u32
}
