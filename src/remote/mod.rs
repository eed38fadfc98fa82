//! Remote collaborators of the crawl loop
//!
//! This module contains:
//! - The traits the crawler talks to (`ProfileSource`, `Enricher`, `Rater`)
//! - Wire and snapshot types
//! - A rate-limited fetcher wrapping every outbound read
//! - GitHub-backed implementations of the profile source and enricher
//! - An HTTP scoring oracle client

mod fetcher;
mod github;
mod rater;
mod site;
mod types;

pub use fetcher::{build_http_client, rate_limit_wait, RateLimitedFetcher};
pub use github::GithubClient;
pub use rater::HttpRater;
pub use site::{extract_site_text, normalize_site_url};
pub use types::{
    ConnectionItem, ContributionDay, ContributionSummary, Enrichment, NodeSnapshot, Profile,
    Rating, RepoSummary,
};

use crate::state::Direction;
use crate::FetchResult;
use async_trait::async_trait;

/// Source of core profiles and relationship pages
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Checks that the remote service is reachable
    ///
    /// Called once before a crawl starts; a failure aborts the run.
    async fn ping(&self) -> FetchResult<()> {
        Ok(())
    }

    /// Fetches the core profile for a node
    async fn fetch_profile(&self, username: &str) -> FetchResult<Profile>;

    /// Fetches one page of a node's followers or following
    ///
    /// Pages are numbered from 1.
    async fn fetch_connections_page(
        &self,
        username: &str,
        direction: Direction,
        page: u32,
        per_page: u32,
    ) -> FetchResult<Vec<ConnectionItem>>;
}

/// Gathers enrichment data for a fetched profile
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, profile: &Profile) -> FetchResult<Enrichment>;
}

/// Scoring oracle
#[async_trait]
pub trait Rater: Send + Sync {
    async fn rate(&self, snapshot: &NodeSnapshot) -> FetchResult<Rating>;
}
