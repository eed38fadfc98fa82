use serde::Deserialize;

/// Main configuration structure for Social-Ripple
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    pub filter: FilterConfig,
    pub rater: RaterConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "seed")]
    pub seeds: Vec<SeedEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum discovery depth from the seeds
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Number of pending nodes claimed per batch
    #[serde(rename = "batch-size")]
    pub batch_size: u32,

    /// Number of nodes processed in parallel
    #[serde(rename = "concurrency")]
    pub concurrency: u32,

    /// Seconds after which a `processing` claim is considered abandoned
    #[serde(rename = "stale-after-secs", default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Optional cap on the number of batches claimed in one run
    #[serde(rename = "max-batches", default)]
    pub max_batches: Option<u32>,

    /// Whether to expand the accounts following each node
    #[serde(rename = "expand-followers", default = "default_true")]
    pub expand_followers: bool,

    /// Whether to expand the accounts each node follows
    #[serde(rename = "expand-following", default = "default_true")]
    pub expand_following: bool,

    /// Optional cap on pages read per node and direction
    #[serde(rename = "max-connection-pages", default)]
    pub max_connection_pages: Option<u32>,
}

/// Remote profile/relationship API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    #[serde(rename = "graphql-url", default = "default_graphql_url")]
    pub graphql_url: String,

    /// Literal API token (takes precedence over `token-env`)
    #[serde(default)]
    pub token: Option<String>,

    /// Name of the environment variable holding the API token
    #[serde(rename = "token-env", default)]
    pub token_env: Option<String>,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for a single request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Connection page size (the API caps this at 100)
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Wait used when a rate-limit response carries no reset hint (seconds)
    #[serde(
        rename = "rate-limit-fallback-secs",
        default = "default_rate_limit_fallback_secs"
    )]
    pub rate_limit_fallback_secs: u64,

    /// Upper bound on a single rate-limit wait (seconds)
    #[serde(
        rename = "max-rate-limit-wait-secs",
        default = "default_max_rate_limit_wait_secs"
    )]
    pub max_rate_limit_wait_secs: u64,
}

impl ApiConfig {
    /// Resolves the API token from the literal value or the named env variable
    pub fn resolve_token(&self) -> Option<String> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Some(token.clone());
        }

        self.token_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|t| !t.is_empty())
    }
}

/// Which enrichment sources are fetched for each node
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(rename = "fetch-readme", default = "default_true")]
    pub fetch_readme: bool,

    #[serde(rename = "fetch-site", default = "default_true")]
    pub fetch_site: bool,

    #[serde(rename = "fetch-repos", default = "default_true")]
    pub fetch_repos: bool,

    /// Number of recently pushed repositories to keep
    #[serde(rename = "recent-repos", default = "default_recent_repos")]
    pub recent_repos: u32,

    /// Maximum characters of personal-site text to keep
    #[serde(rename = "site-max-chars", default = "default_site_max_chars")]
    pub site_max_chars: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            fetch_readme: true,
            fetch_site: true,
            fetch_repos: true,
            recent_repos: default_recent_repos(),
            site_max_chars: default_site_max_chars(),
        }
    }
}

/// Profile filter gate thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// Country names matched case-insensitively against the profile location
    #[serde(rename = "banned-countries", default)]
    pub banned_countries: Vec<String>,

    /// Minimum number of populated fields among bio, external handle, blog, location
    #[serde(rename = "min-profile-fields")]
    pub min_profile_fields: u32,

    /// Minimum contributions in the calendar window
    #[serde(rename = "min-contributions")]
    pub min_contributions: u64,

    /// Minimum number of distinct months with any contribution
    #[serde(rename = "min-active-months")]
    pub min_active_months: u32,

    /// Maximum share of contributions made Monday to Friday
    #[serde(rename = "max-weekday-ratio")]
    pub max_weekday_ratio: f64,
}

/// Scoring oracle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RaterConfig {
    pub endpoint: String,

    /// Free-text research context sent along with every snapshot
    #[serde(rename = "research-context", default)]
    pub research_context: Option<String>,

    #[serde(rename = "timeout-secs", default = "default_rater_timeout_secs")]
    pub timeout_secs: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// A depth-0 node supplied at crawl initialization
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    pub username: String,

    /// Trusted rating; seeds with a rating skip the filter gate and oracle
    #[serde(default)]
    pub rating: Option<f64>,
}

fn default_true() -> bool {
    true
}

fn default_stale_after_secs() -> u64 {
    1800
}

fn default_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_graphql_url() -> String {
    "https://api.github.com/graphql".to_string()
}

fn default_user_agent() -> String {
    format!("social-ripple/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    100
}

fn default_rate_limit_fallback_secs() -> u64 {
    60
}

fn default_max_rate_limit_wait_secs() -> u64 {
    3600
}

fn default_recent_repos() -> u32 {
    10
}

fn default_site_max_chars() -> usize {
    4000
}

fn default_rater_timeout_secs() -> u64 {
    120
}
