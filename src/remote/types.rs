//! Wire and snapshot types exchanged with the remote collaborators

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Core profile attributes returned by the profile API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub login: String,

    /// Account kind: `User`, `Organization` or `Bot`
    #[serde(rename = "type", default = "default_account_kind")]
    pub kind: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub followers: u64,

    #[serde(default)]
    pub following: u64,

    #[serde(default)]
    pub bio: Option<String>,

    #[serde(default)]
    pub company: Option<String>,

    #[serde(default)]
    pub blog: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub twitter_username: Option<String>,

    #[serde(default)]
    pub public_repos: u64,
}

impl Profile {
    pub fn is_human(&self) -> bool {
        self.kind == "User"
    }
}

fn default_account_kind() -> String {
    "User".to_string()
}

/// One entry of a followers/following page
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConnectionItem {
    pub login: String,

    #[serde(rename = "type", default = "default_account_kind")]
    pub kind: String,
}

impl ConnectionItem {
    pub fn is_human(&self) -> bool {
        self.kind == "User"
    }
}

/// Summary of a recently pushed repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoSummary {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub language: Option<String>,

    #[serde(default)]
    pub stargazers_count: u64,

    #[serde(default)]
    pub fork: bool,

    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
}

/// A single day of the contribution calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionDay {
    pub date: NaiveDate,
    pub count: u32,
}

/// Contribution calendar for the trailing year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionSummary {
    pub total: u64,
    pub days: Vec<ContributionDay>,
}

/// Everything gathered about a node beyond its core profile
///
/// Each source is optional; `None` means the source was disabled, absent,
/// or failed in a way that does not invalidate the node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    #[serde(default)]
    pub readme: Option<String>,

    #[serde(default)]
    pub site_content: Option<String>,

    #[serde(default)]
    pub recent_repos: Option<Vec<RepoSummary>>,

    #[serde(default)]
    pub contributions: Option<ContributionSummary>,
}

/// Input handed to the scoring oracle
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub username: String,
    pub depth: u32,
    pub profile: Profile,
    pub enrichment: Enrichment,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub research_context: Option<String>,
}

/// Output of the scoring oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub score: f64,

    #[serde(default)]
    pub reasoning: String,

    #[serde(default)]
    pub archetypes: Vec<String>,
}

impl Rating {
    /// Rating carried over from a trusted seed entry
    pub fn from_seed(score: f64) -> Self {
        Self {
            score,
            reasoning: "trusted seed".to_string(),
            archetypes: Vec::new(),
        }
    }
}
