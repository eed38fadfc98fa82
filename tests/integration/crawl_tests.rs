//! Integration tests for the crawl loop
//!
//! The first group drives the coordinator with in-process fakes for the
//! profile source, enricher and rater. The last test runs the real GitHub
//! client and HTTP rater against a wiremock server.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use serde_json::json;
use social_ripple::config::{parse_config, Config};
use social_ripple::crawler::{Coordinator, CrawlDeps};
use social_ripple::remote::{
    ConnectionItem, ContributionDay, ContributionSummary, Enricher, Enrichment, NodeSnapshot,
    Profile, ProfileSource, Rater, Rating,
};
use social_ripple::state::{Direction, IgnoreReason, NodeStatus};
use social_ripple::storage::{RunStatus, SqliteStorage, Storage};
use social_ripple::{FetchError, FetchResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a test configuration
fn create_test_config(db_path: &str, api_url: &str, max_depth: u32, seeds: &str) -> Config {
    let toml = format!(
        r#"
[crawler]
max-depth = {max_depth}
batch-size = 10
concurrency = 2

[api]
base-url = "{api_url}"
graphql-url = "{api_url}/graphql"
token = "test-token"
request-timeout-secs = 5
page-size = 2
rate-limit-fallback-secs = 1
max-rate-limit-wait-secs = 1

[enrichment]
fetch-readme = false
fetch-site = false
fetch-repos = false

[filter]
min-profile-fields = 0
min-contributions = 1
min-active-months = 1
max-weekday-ratio = 1.0

[rater]
endpoint = "{api_url}/rate"

[output]
database-path = "{db_path}"

{seeds}
"#
    );

    parse_config(&toml).unwrap()
}

fn profile(login: &str) -> Profile {
    serde_json::from_value(json!({"login": login, "type": "User"})).unwrap()
}

fn year_of_contributions() -> ContributionSummary {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let days: Vec<ContributionDay> = (0..366)
        .map(|offset| ContributionDay {
            date: start + ChronoDuration::days(offset),
            count: 1,
        })
        .collect();
    ContributionSummary {
        total: days.len() as u64,
        days,
    }
}

/// In-memory social graph: `following[a]` lists the accounts `a` follows
#[derive(Default)]
struct FakeGraph {
    following: HashMap<String, Vec<String>>,
    missing: Vec<String>,
    without_contributions: Vec<String>,
    failing_pages: Vec<(String, Direction, u32)>,
    failing_enrichment: Vec<String>,
    scores: HashMap<String, f64>,
    rated: Mutex<Vec<String>>,
}

impl FakeGraph {
    fn follows(mut self, from: &str, to: &[&str]) -> Self {
        self.following.insert(
            from.to_string(),
            to.iter().map(|name| name.to_string()).collect(),
        );
        self
    }

    fn missing(mut self, username: &str) -> Self {
        self.missing.push(username.to_string());
        self
    }

    fn without_contributions(mut self, username: &str) -> Self {
        self.without_contributions.push(username.to_string());
        self
    }

    /// Makes one page of `username`'s connections time out
    fn failing_page(mut self, username: &str, direction: Direction, page: u32) -> Self {
        self.failing_pages.push((username.to_string(), direction, page));
        self
    }

    fn failing_enrichment(mut self, username: &str) -> Self {
        self.failing_enrichment.push(username.to_string());
        self
    }

    fn score(mut self, username: &str, score: f64) -> Self {
        self.scores.insert(username.to_string(), score);
        self
    }

    fn rated(&self) -> Vec<String> {
        let mut rated = self.rated.lock().unwrap().clone();
        rated.sort();
        rated
    }

    fn connections(&self, username: &str, direction: Direction) -> Vec<String> {
        match direction {
            Direction::Following => self.following.get(username).cloned().unwrap_or_default(),
            Direction::Followers => self
                .following
                .iter()
                .filter(|(_, follows)| follows.iter().any(|name| name == username))
                .map(|(follower, _)| follower.clone())
                .collect(),
        }
    }

    fn into_deps(self) -> (Arc<FakeGraph>, CrawlDeps) {
        let graph = Arc::new(self);
        let deps = CrawlDeps {
            source: graph.clone(),
            enricher: graph.clone(),
            rater: graph.clone(),
        };
        (graph, deps)
    }
}

#[async_trait]
impl ProfileSource for FakeGraph {
    async fn fetch_profile(&self, username: &str) -> FetchResult<Profile> {
        if self.missing.iter().any(|name| name == username) {
            return Err(FetchError::NotFound {
                url: format!("fake://users/{}", username),
            });
        }
        Ok(profile(username))
    }

    async fn fetch_connections_page(
        &self,
        username: &str,
        direction: Direction,
        page: u32,
        per_page: u32,
    ) -> FetchResult<Vec<ConnectionItem>> {
        let fails = self
            .failing_pages
            .iter()
            .any(|(name, dir, p)| name == username && *dir == direction && *p == page);
        if fails {
            return Err(FetchError::Timeout {
                url: format!("fake://users/{}/{}?page={}", username, direction, page),
            });
        }

        let mut all = self.connections(username, direction);
        all.sort();
        let start = ((page - 1) * per_page) as usize;
        Ok(all
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .map(|login| ConnectionItem {
                login,
                kind: "User".to_string(),
            })
            .collect())
    }
}

#[async_trait]
impl Enricher for FakeGraph {
    async fn enrich(&self, profile: &Profile) -> FetchResult<Enrichment> {
        if self.failing_enrichment.contains(&profile.login) {
            return Err(FetchError::Network {
                url: format!("fake://graphql/{}", profile.login),
                message: "connection reset".to_string(),
            });
        }
        let contributions = if self.without_contributions.contains(&profile.login) {
            None
        } else {
            Some(year_of_contributions())
        };
        Ok(Enrichment {
            contributions,
            ..Enrichment::default()
        })
    }
}

#[async_trait]
impl Rater for FakeGraph {
    async fn rate(&self, snapshot: &NodeSnapshot) -> FetchResult<Rating> {
        self.rated.lock().unwrap().push(snapshot.username.clone());
        Ok(Rating {
            score: self.scores.get(&snapshot.username).copied().unwrap_or(50.0),
            reasoning: "fake".to_string(),
            archetypes: vec!["builder".to_string()],
        })
    }
}

fn open(db_path: &str) -> SqliteStorage {
    SqliteStorage::new(std::path::Path::new(db_path)).unwrap()
}

#[tokio::test]
async fn test_seed_expansion_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");
    let db_path = db_path.to_str().unwrap();

    let config = create_test_config(
        db_path,
        "http://127.0.0.1:9",
        1,
        "[[seed]]\nusername = \"Alice\"\nrating = 90.0",
    );
    let (graph, deps) = FakeGraph::default()
        .follows("alice", &["bob"])
        .score("bob", 70.0)
        .into_deps();

    let coordinator = Coordinator::new(config, deps, false).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.ignored, 0);
    assert_eq!(report.errored, 0);
    assert_eq!(report.discovered, 1);

    // The trusted seed is never sent to the rater
    assert_eq!(graph.rated(), vec!["bob".to_string()]);

    let storage = open(db_path);
    let alice = storage.get_node("alice").unwrap().unwrap();
    assert_eq!(alice.status, NodeStatus::Processed);
    assert_eq!(alice.rating, Some(90.0));
    assert!(alice.scraped.following);
    assert!(alice.scraped.followers);

    let bob = storage.get_node("bob").unwrap().unwrap();
    assert_eq!(bob.status, NodeStatus::Processed);
    assert_eq!(bob.depth, 1);
    assert_eq!(bob.priority, 135.0);
    assert_eq!(bob.rating, Some(70.0));
    assert_eq!(bob.archetypes, vec!["builder".to_string()]);

    // Bob sits at the depth bound and is not expanded
    assert!(!bob.scraped.following);

    let lineage = storage.get_lineage("bob").unwrap();
    assert_eq!(lineage.len(), 1);
    assert_eq!(lineage[0].parent, "alice");
    assert_eq!(lineage[0].rating, 90.0);

    assert!(storage.edge_exists("alice", "bob").unwrap());
    assert_eq!(storage.count_edges().unwrap(), 1);

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.id, report.run_id);
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_failed_profile_does_not_stop_crawl() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");
    let db_path = db_path.to_str().unwrap();

    let config = create_test_config(
        db_path,
        "http://127.0.0.1:9",
        1,
        "[[seed]]\nusername = \"alice\"\nrating = 90.0\n\n[[seed]]\nusername = \"ghost\"",
    );
    let (_graph, deps) = FakeGraph::default()
        .follows("alice", &["bob"])
        .missing("ghost")
        .into_deps();

    let report = Coordinator::new(config, deps, false)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.errored, 1);
    assert_eq!(report.processed, 2);

    let storage = open(db_path);
    let ghost = storage.get_node("ghost").unwrap().unwrap();
    assert_eq!(ghost.status, NodeStatus::Ignored);
    assert_eq!(ghost.ignored_reason, Some(IgnoreReason::ErrorScraping));
    assert!(ghost.error_message.unwrap().contains("ghost"));
    assert_eq!(storage.count_nodes_by_status(NodeStatus::Pending).unwrap(), 0);
    assert_eq!(storage.count_nodes_by_status(NodeStatus::Processing).unwrap(), 0);
}

#[tokio::test]
async fn test_failed_connection_page_keeps_earlier_discoveries() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");
    let db_path = db_path.to_str().unwrap();

    let config = create_test_config(
        db_path,
        "http://127.0.0.1:9",
        1,
        "[[seed]]\nusername = \"alice\"\nrating = 90.0",
    );
    // Page size is 2: bob and carol arrive on page 1, dave on page 2
    let (graph, deps) = FakeGraph::default()
        .follows("alice", &["bob", "carol", "dave"])
        .failing_page("alice", Direction::Following, 2)
        .into_deps();

    let report = Coordinator::new(config, deps, false)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.errored, 1);
    assert_eq!(report.processed, 2);
    assert_eq!(graph.rated(), vec!["bob".to_string(), "carol".to_string()]);

    let storage = open(db_path);
    let alice = storage.get_node("alice").unwrap().unwrap();
    assert_eq!(alice.status, NodeStatus::Ignored);
    assert_eq!(alice.ignored_reason, Some(IgnoreReason::ErrorScraping));
    assert!(alice.error_message.is_some());
    assert!(!alice.scraped.following);
    assert!(!alice.scraped.followers);

    for name in ["bob", "carol"] {
        let node = storage.get_node(name).unwrap().unwrap();
        assert_eq!(node.status, NodeStatus::Processed);
        assert_eq!(node.priority, 135.0);

        let lineage = storage.get_lineage(name).unwrap();
        assert_eq!(lineage.len(), 1);
        assert_eq!(lineage[0].parent, "alice");
        assert_eq!(lineage[0].rating, 90.0);
        assert!(storage.edge_exists("alice", name).unwrap());
    }

    assert!(storage.get_node("dave").unwrap().is_none());
    assert_eq!(storage.count_edges().unwrap(), 2);
}

#[tokio::test]
async fn test_failed_second_direction_keeps_first_scraped_flag() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");
    let db_path = db_path.to_str().unwrap();

    let config = create_test_config(
        db_path,
        "http://127.0.0.1:9",
        1,
        "[[seed]]\nusername = \"alice\"\nrating = 90.0",
    );
    let (_graph, deps) = FakeGraph::default()
        .follows("alice", &["bob"])
        .failing_page("alice", Direction::Followers, 1)
        .into_deps();

    let report = Coordinator::new(config, deps, false)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.errored, 1);
    assert_eq!(report.processed, 1);

    let storage = open(db_path);
    let alice = storage.get_node("alice").unwrap().unwrap();
    assert_eq!(alice.ignored_reason, Some(IgnoreReason::ErrorScraping));
    assert!(alice.scraped.following);
    assert!(!alice.scraped.followers);

    let bob = storage.get_node("bob").unwrap().unwrap();
    assert_eq!(bob.status, NodeStatus::Processed);
    assert_eq!(storage.get_lineage("bob").unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_enrichment_skips_rater() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");
    let db_path = db_path.to_str().unwrap();

    let config = create_test_config(
        db_path,
        "http://127.0.0.1:9",
        2,
        "[[seed]]\nusername = \"alice\"\nrating = 90.0",
    );
    let (graph, deps) = FakeGraph::default()
        .follows("alice", &["bob", "carol"])
        .follows("bob", &["dave"])
        .failing_enrichment("bob")
        .into_deps();

    let report = Coordinator::new(config, deps, false)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.errored, 1);
    assert_eq!(report.processed, 2);
    assert_eq!(graph.rated(), vec!["carol".to_string()]);

    let storage = open(db_path);
    let bob = storage.get_node("bob").unwrap().unwrap();
    assert_eq!(bob.status, NodeStatus::Ignored);
    assert_eq!(bob.ignored_reason, Some(IgnoreReason::ErrorScraping));
    assert!(bob.error_message.unwrap().contains("connection reset"));
    assert!(bob.rating.is_none());
    assert!(storage.get_node("dave").unwrap().is_none());
}

#[tokio::test]
async fn test_gate_rejection_skips_rater_and_expansion() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");
    let db_path = db_path.to_str().unwrap();

    let config = create_test_config(
        db_path,
        "http://127.0.0.1:9",
        2,
        "[[seed]]\nusername = \"alice\"\nrating = 90.0",
    );
    let (graph, deps) = FakeGraph::default()
        .follows("alice", &["bob", "carol"])
        .follows("bob", &["dave"])
        .without_contributions("bob")
        .into_deps();

    let report = Coordinator::new(config, deps, false)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.ignored, 1);
    assert_eq!(graph.rated(), vec!["carol".to_string()]);

    let storage = open(db_path);
    let bob = storage.get_node("bob").unwrap().unwrap();
    assert_eq!(bob.status, NodeStatus::Ignored);
    assert_eq!(bob.ignored_reason, Some(IgnoreReason::NoContributionData));
    assert!(bob.profile.is_some());
    assert!(bob.rating.is_none());

    // A rejected node's connections are never discovered
    assert!(storage.get_node("dave").unwrap().is_none());
}

#[tokio::test]
async fn test_resumed_crawl_reprocesses_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");
    let db_path = db_path.to_str().unwrap();
    let seeds = "[[seed]]\nusername = \"alice\"\nrating = 90.0";

    let (first_graph, deps) = FakeGraph::default()
        .follows("alice", &["bob", "carol", "dave"])
        .into_deps();
    let first = Coordinator::new(
        create_test_config(db_path, "http://127.0.0.1:9", 1, seeds),
        deps,
        false,
    )
    .unwrap()
    .run()
    .await
    .unwrap();

    assert_eq!(first.processed, 4);
    assert_eq!(first_graph.rated().len(), 3);

    let (second_graph, deps) = FakeGraph::default()
        .follows("alice", &["bob", "carol", "dave"])
        .into_deps();
    let second = Coordinator::new(
        create_test_config(db_path, "http://127.0.0.1:9", 1, seeds),
        deps,
        false,
    )
    .unwrap()
    .run()
    .await
    .unwrap();

    assert_eq!(second.claimed, 0);
    assert_eq!(second.batches, 0);
    assert!(second_graph.rated().is_empty());
    assert_ne!(first.run_id, second.run_id);

    let storage = open(db_path);
    assert_eq!(storage.count_total_nodes().unwrap(), 4);
    assert_eq!(storage.count_edges().unwrap(), 3);
}

#[tokio::test]
async fn test_crashed_run_is_recovered() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");
    let db_path = db_path.to_str().unwrap();

    // A previous process claimed alice and died mid-run
    let crashed_run = {
        let mut storage = open(db_path);
        let run_id = storage.create_run("crashed").unwrap();
        storage.seed("alice", Some(90.0)).unwrap();
        assert_eq!(storage.claim_batch(10, 1).unwrap().len(), 1);
        run_id
    };

    let mut config = create_test_config(
        db_path,
        "http://127.0.0.1:9",
        1,
        "[[seed]]\nusername = \"alice\"\nrating = 90.0",
    );
    config.crawler.stale_after_secs = 0;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (_graph, deps) = FakeGraph::default()
        .follows("alice", &["bob"])
        .into_deps();
    let report = Coordinator::new(config, deps, false)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.processed, 2);

    let storage = open(db_path);
    assert_eq!(
        storage.get_run(crashed_run).unwrap().status,
        RunStatus::Interrupted
    );
    assert_eq!(
        storage.get_run(report.run_id).unwrap().status,
        RunStatus::Completed
    );
    assert_eq!(
        storage.get_node("alice").unwrap().unwrap().status,
        NodeStatus::Processed
    );
}

#[tokio::test]
async fn test_fresh_crawl_clears_graph() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");
    let db_path = db_path.to_str().unwrap();
    let seeds = "[[seed]]\nusername = \"alice\"\nrating = 90.0";

    let (_graph, deps) = FakeGraph::default()
        .follows("alice", &["bob"])
        .into_deps();
    Coordinator::new(
        create_test_config(db_path, "http://127.0.0.1:9", 1, seeds),
        deps,
        false,
    )
    .unwrap()
    .run()
    .await
    .unwrap();

    let (graph, deps) = FakeGraph::default()
        .follows("alice", &["carol"])
        .into_deps();
    let report = Coordinator::new(
        create_test_config(db_path, "http://127.0.0.1:9", 1, seeds),
        deps,
        true,
    )
    .unwrap()
    .run()
    .await
    .unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(graph.rated(), vec!["carol".to_string()]);

    let storage = open(db_path);
    assert!(storage.get_node("bob").unwrap().is_none());
    assert!(storage.edge_exists("alice", "carol").unwrap());
}

#[tokio::test]
async fn test_crawl_against_github_api() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");
    let db_path = db_path.to_str().unwrap();

    let calendar_days: Vec<_> = (0..366)
        .map(|offset| {
            let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + ChronoDuration::days(offset);
            json!({"date": date.to_string(), "contributionCount": 1})
        })
        .collect();

    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resources": {}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/alice"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"login": "alice", "type": "User"})),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/bob"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "login": "bob",
            "type": "User",
            "bio": "compilers",
            "location": "Lisbon"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/alice/following"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"login": "Bob", "type": "User"},
            {"login": "acme", "type": "Organization"}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/alice/following"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/alice/followers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "user": {
                    "contributionsCollection": {
                        "contributionCalendar": {
                            "totalContributions": 366,
                            "weeks": [{"contributionDays": calendar_days}]
                        }
                    }
                }
            }
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "score": 70.0,
            "reasoning": "steady contributor",
            "archetypes": ["compiler-hacker"]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(
        db_path,
        &mock_server.uri(),
        1,
        "[[seed]]\nusername = \"alice\"\nrating = 90.0",
    );
    let deps = CrawlDeps::from_config(&config).unwrap();
    let report = Coordinator::new(config, deps, false)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.errored, 0);

    let storage = open(db_path);
    assert_eq!(storage.count_total_nodes().unwrap(), 2);
    assert!(storage.get_node("acme").unwrap().is_none());

    let bob = storage.get_node("bob").unwrap().unwrap();
    assert_eq!(bob.priority, 135.0);
    assert_eq!(bob.rating, Some(70.0));
    assert_eq!(bob.reasoning.as_deref(), Some("steady contributor"));
    assert_eq!(
        bob.enrichment
            .and_then(|enrichment| enrichment.contributions)
            .map(|contributions| contributions.total),
        Some(366)
    );

    assert_eq!(storage.count_edges().unwrap(), 1);
    assert!(storage.edge_exists("alice", "bob").unwrap());
}
