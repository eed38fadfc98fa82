//! GitHub-backed profile source and enricher
//!
//! Core profiles and relationship pages come from the REST API. Enrichment
//! pulls the profile README, recently pushed repositories, the contribution
//! calendar (GraphQL) and the text of the user's personal site, all in
//! parallel.

use crate::config::{ApiConfig, EnrichmentConfig};
use crate::remote::fetcher::{build_http_client, RateLimitedFetcher};
use crate::remote::site::{extract_site_text, normalize_site_url};
use crate::remote::types::{
    ConnectionItem, ContributionDay, ContributionSummary, Enrichment, Profile, RepoSummary,
};
use crate::remote::{Enricher, ProfileSource};
use crate::state::Direction;
use crate::FetchResult;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_ACCEPT: &str = "application/vnd.github+json";
const RAW_ACCEPT: &str = "application/vnd.github.raw";
const HTML_ACCEPT: &str = "text/html,application/xhtml+xml";

const CONTRIBUTIONS_QUERY: &str = "query($login: String!) { user(login: $login) { \
contributionsCollection { contributionCalendar { totalContributions \
weeks { contributionDays { date contributionCount } } } } } }";

/// Client for the GitHub REST and GraphQL APIs
#[derive(Debug, Clone)]
pub struct GithubClient {
    api: RateLimitedFetcher,
    site: RateLimitedFetcher,
    base_url: String,
    graphql_url: String,
    has_token: bool,
    enrichment: EnrichmentConfig,
}

impl GithubClient {
    /// Builds the client from configuration
    ///
    /// The API token (if any) is attached only to API requests; personal
    /// sites are fetched with a separate, unauthenticated client.
    pub fn from_config(
        api: &ApiConfig,
        enrichment: &EnrichmentConfig,
    ) -> Result<Self, reqwest::Error> {
        let token = api.resolve_token();
        let timeout = Duration::from_secs(api.request_timeout_secs);
        let fallback = Duration::from_secs(api.rate_limit_fallback_secs);
        let max_wait = Duration::from_secs(api.max_rate_limit_wait_secs);

        if token.is_none() {
            tracing::warn!("No API token configured; contribution data will be unavailable");
        }

        let api_client =
            build_http_client(&api.user_agent, timeout, token.as_deref(), Some(API_ACCEPT))?;
        let site_client = build_http_client(&api.user_agent, timeout, None, None)?;

        Ok(Self {
            api: RateLimitedFetcher::new(api_client, fallback, max_wait),
            site: RateLimitedFetcher::new(site_client, fallback, max_wait),
            base_url: api.base_url.trim_end_matches('/').to_string(),
            graphql_url: api.graphql_url.clone(),
            has_token: token.is_some(),
            enrichment: enrichment.clone(),
        })
    }

    async fn fetch_readme(&self, username: &str) -> Option<String> {
        let url = format!("{}/repos/{}/{}/readme", self.base_url, username, username);
        match self.api.get_text(&url, RAW_ACCEPT).await {
            Ok(readme) => Some(readme),
            Err(e) if e.is_not_found() => {
                tracing::debug!(username, "No profile README");
                None
            }
            Err(e) => {
                tracing::warn!(username, error = %e, "Failed to fetch README");
                None
            }
        }
    }

    async fn fetch_recent_repos(&self, username: &str) -> Option<Vec<RepoSummary>> {
        let url = format!(
            "{}/users/{}/repos?sort=pushed&per_page={}",
            self.base_url, username, self.enrichment.recent_repos
        );
        match self.api.get_json::<Vec<RepoSummary>>(&url).await {
            Ok(repos) => Some(repos),
            Err(e) => {
                tracing::warn!(username, error = %e, "Failed to fetch repositories");
                None
            }
        }
    }

    async fn fetch_site(&self, username: &str, blog: Option<&str>) -> Option<String> {
        let url = normalize_site_url(blog?)?;
        match self.site.get_text(url.as_str(), HTML_ACCEPT).await {
            Ok(html) => {
                let text = extract_site_text(&html, self.enrichment.site_max_chars);
                (!text.is_empty()).then_some(text)
            }
            Err(e) => {
                tracing::warn!(username, url = %url, error = %e, "Failed to fetch personal site");
                None
            }
        }
    }

    /// Fetches the trailing-year contribution calendar
    ///
    /// Returns `Ok(None)` without a token or when the user is unknown to
    /// the GraphQL API. Transport and status failures propagate.
    async fn fetch_contributions(&self, username: &str) -> FetchResult<Option<ContributionSummary>> {
        if !self.has_token {
            return Ok(None);
        }

        let request = GraphqlRequest {
            query: CONTRIBUTIONS_QUERY,
            variables: GraphqlVariables { login: username },
        };
        let response: GraphqlResponse = self.api.post_json(&self.graphql_url, &request).await?;

        if let Some(errors) = response.errors.as_ref().filter(|e| !e.is_empty()) {
            tracing::debug!(username, errors = errors.len(), "GraphQL reported errors");
        }

        let calendar = match response.data.and_then(|data| data.user) {
            Some(user) => user.contributions_collection.contribution_calendar,
            None => return Ok(None),
        };

        let days = calendar
            .weeks
            .into_iter()
            .flat_map(|week| week.contribution_days)
            .map(|day| ContributionDay {
                date: day.date,
                count: day.contribution_count,
            })
            .collect();

        Ok(Some(ContributionSummary {
            total: calendar.total_contributions,
            days,
        }))
    }
}

#[async_trait]
impl ProfileSource for GithubClient {
    async fn ping(&self) -> FetchResult<()> {
        let url = format!("{}/rate_limit", self.base_url);
        self.api.get_json::<serde_json::Value>(&url).await?;
        Ok(())
    }

    async fn fetch_profile(&self, username: &str) -> FetchResult<Profile> {
        let url = format!("{}/users/{}", self.base_url, username);
        self.api.get_json(&url).await
    }

    async fn fetch_connections_page(
        &self,
        username: &str,
        direction: Direction,
        page: u32,
        per_page: u32,
    ) -> FetchResult<Vec<ConnectionItem>> {
        let url = format!(
            "{}/users/{}/{}?per_page={}&page={}",
            self.base_url,
            username,
            direction.api_segment(),
            per_page,
            page
        );
        self.api.get_json(&url).await
    }
}

#[async_trait]
impl Enricher for GithubClient {
    async fn enrich(&self, profile: &Profile) -> FetchResult<Enrichment> {
        let username = profile.login.as_str();
        let config = &self.enrichment;

        let readme = async {
            if config.fetch_readme {
                self.fetch_readme(username).await
            } else {
                None
            }
        };
        let repos = async {
            if config.fetch_repos {
                self.fetch_recent_repos(username).await
            } else {
                None
            }
        };
        let site = async {
            if config.fetch_site {
                self.fetch_site(username, profile.blog.as_deref()).await
            } else {
                None
            }
        };
        let contributions = self.fetch_contributions(username);

        let (readme, recent_repos, site_content, contributions) =
            tokio::join!(readme, repos, site, contributions);

        Ok(Enrichment {
            readme,
            site_content,
            recent_repos,
            contributions: contributions?,
        })
    }
}

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: GraphqlVariables<'a>,
}

#[derive(Serialize)]
struct GraphqlVariables<'a> {
    login: &'a str,
}

#[derive(Deserialize)]
struct GraphqlResponse {
    data: Option<GraphqlData>,
    #[serde(default)]
    errors: Option<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct GraphqlData {
    user: Option<GraphqlUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlUser {
    contributions_collection: GraphqlContributions,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlContributions {
    contribution_calendar: GraphqlCalendar,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlCalendar {
    total_contributions: u64,
    weeks: Vec<GraphqlWeek>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlWeek {
    contribution_days: Vec<GraphqlDay>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlDay {
    date: NaiveDate,
    contribution_count: u32,
}
