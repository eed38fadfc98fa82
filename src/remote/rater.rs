//! HTTP client for the scoring oracle

use crate::config::{ApiConfig, RaterConfig};
use crate::remote::fetcher::{build_http_client, RateLimitedFetcher};
use crate::remote::types::{NodeSnapshot, Rating};
use crate::remote::Rater;
use crate::{FetchError, FetchResult};
use async_trait::async_trait;
use std::time::Duration;

/// Posts node snapshots to a scoring endpoint and reads back a rating
#[derive(Debug, Clone)]
pub struct HttpRater {
    fetcher: RateLimitedFetcher,
    endpoint: String,
}

impl HttpRater {
    pub fn from_config(rater: &RaterConfig, api: &ApiConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(
            &api.user_agent,
            Duration::from_secs(rater.timeout_secs),
            None,
            Some("application/json"),
        )?;

        Ok(Self {
            fetcher: RateLimitedFetcher::new(
                client,
                Duration::from_secs(api.rate_limit_fallback_secs),
                Duration::from_secs(api.max_rate_limit_wait_secs),
            ),
            endpoint: rater.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Rater for HttpRater {
    async fn rate(&self, snapshot: &NodeSnapshot) -> FetchResult<Rating> {
        let rating: Rating = self.fetcher.post_json(&self.endpoint, snapshot).await?;

        if !rating.score.is_finite() {
            return Err(FetchError::Malformed {
                url: self.endpoint.clone(),
                message: format!("non-finite score for {}", snapshot.username),
            });
        }

        tracing::debug!(
            username = %snapshot.username,
            score = rating.score,
            "Rated node"
        );

        Ok(rating)
    }
}
