use crate::config::types::{
    ApiConfig, Config, CrawlerConfig, FilterConfig, OutputConfig, RaterConfig, SeedEntry,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Longest handle the profile network accepts
const MAX_USERNAME_LEN: usize = 39;

/// Longest staleness window accepted for `processing` claims (one week)
const MAX_STALE_AFTER_SECS: u64 = 7 * 24 * 60 * 60;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_api_config(&config.api)?;
    validate_filter_config(&config.filter)?;
    validate_rater_config(&config.rater)?;
    validate_output_config(&config.output)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 || config.batch_size > 1000 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be between 1 and 1000, got {}",
            config.batch_size
        )));
    }

    if config.concurrency < 1 || config.concurrency > 32 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 32, got {}",
            config.concurrency
        )));
    }

    if config.stale_after_secs < 60 || config.stale_after_secs > MAX_STALE_AFTER_SECS {
        return Err(ConfigError::Validation(format!(
            "stale_after_secs must be between 60 and {}, got {}",
            MAX_STALE_AFTER_SECS, config.stale_after_secs
        )));
    }

    if config.max_batches == Some(0) {
        return Err(ConfigError::Validation(
            "max_batches must be >= 1 when set".to_string(),
        ));
    }

    if config.max_connection_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_connection_pages must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates remote API configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    validate_http_url("base_url", &config.base_url)?;
    validate_http_url("graphql_url", &config.graphql_url)?;

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.page_size < 1 || config.page_size > 100 {
        return Err(ConfigError::Validation(format!(
            "page_size must be between 1 and 100, got {}",
            config.page_size
        )));
    }

    if config.max_rate_limit_wait_secs < config.rate_limit_fallback_secs {
        return Err(ConfigError::Validation(format!(
            "max_rate_limit_wait_secs ({}) must be >= rate_limit_fallback_secs ({})",
            config.max_rate_limit_wait_secs, config.rate_limit_fallback_secs
        )));
    }

    Ok(())
}

/// Validates filter gate thresholds
fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    if config.min_profile_fields > 4 {
        return Err(ConfigError::Validation(format!(
            "min_profile_fields must be <= 4, got {}",
            config.min_profile_fields
        )));
    }

    if !(config.max_weekday_ratio > 0.0 && config.max_weekday_ratio <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "max_weekday_ratio must be in (0, 1], got {}",
            config.max_weekday_ratio
        )));
    }

    if config
        .banned_countries
        .iter()
        .any(|country| country.trim().is_empty())
    {
        return Err(ConfigError::Validation(
            "banned_countries cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

/// Validates the scoring oracle configuration
fn validate_rater_config(config: &RaterConfig) -> Result<(), ConfigError> {
    validate_http_url("rater endpoint", &config.endpoint)?;

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "rater timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates seed entries
fn validate_seeds(seeds: &[SeedEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for seed in seeds {
        if !is_valid_username(&seed.username) {
            return Err(ConfigError::Validation(format!(
                "Invalid seed username '{}'",
                seed.username
            )));
        }

        if !seen.insert(seed.username.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate seed username '{}'",
                seed.username
            )));
        }

        if let Some(rating) = seed.rating {
            if !rating.is_finite() {
                return Err(ConfigError::Validation(format!(
                    "Seed '{}' has a non-finite rating",
                    seed.username
                )));
            }
        }
    }

    Ok(())
}

/// Checks a profile handle: alphanumerics and single inner hyphens
pub fn is_valid_username(username: &str) -> bool {
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return false;
    }

    if username.starts_with('-') || username.ends_with('-') || username.contains("--") {
        return false;
    }

    username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", field, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    Ok(())
}
