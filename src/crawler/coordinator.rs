//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Initializing storage and seeding the frontier
//! - Recovering claims abandoned by a crashed run
//! - Claiming batches of pending nodes in priority order
//! - Processing each batch with bounded concurrency
//! - Recording the run outcome

use crate::config::Config;
use crate::crawler::worker::{NodeDisposition, NodeSummary, NodeWorker};
use crate::remote::{Enricher, GithubClient, HttpRater, ProfileSource, Rater};
use crate::storage::{normalize_username, RunStatus, SqliteStorage, Storage, StorageResult};
use crate::{Result, RippleError};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Remote collaborators used by the crawl loop
#[derive(Clone)]
pub struct CrawlDeps {
    pub source: Arc<dyn ProfileSource>,
    pub enricher: Arc<dyn Enricher>,
    pub rater: Arc<dyn Rater>,
}

impl CrawlDeps {
    /// Builds the GitHub profile source/enricher and the HTTP rater
    pub fn from_config(config: &Config) -> Result<Self> {
        let github = Arc::new(GithubClient::from_config(&config.api, &config.enrichment)?);
        let rater = Arc::new(HttpRater::from_config(&config.rater, &config.api)?);

        Ok(Self {
            source: github.clone(),
            enricher: github,
            rater,
        })
    }
}

/// Summary of one `run`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub run_id: i64,
    pub batches: u32,
    pub claimed: usize,
    pub processed: usize,
    pub ignored: usize,
    pub errored: usize,
    pub discovered: usize,
}

impl CrawlReport {
    fn record(&mut self, summary: NodeSummary) {
        self.discovered += summary.discovered;
        match summary.disposition {
            NodeDisposition::Processed => self.processed += 1,
            NodeDisposition::Rejected(_) => self.ignored += 1,
            NodeDisposition::Failed => self.errored += 1,
            NodeDisposition::Lost => {}
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    worker: NodeWorker,
    source: Arc<dyn ProfileSource>,
    config_hash: String,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Opens the database, clears the graph when `fresh` is set, and seeds
    /// the frontier. Seeding is idempotent: existing nodes are untouched.
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `deps` - Profile source, enricher and rater
    /// * `fresh` - Whether to start a fresh crawl (clears existing graph)
    pub fn new(config: Config, deps: CrawlDeps, fresh: bool) -> Result<Self> {
        let storage_path = Path::new(&config.output.database_path);
        let mut storage = SqliteStorage::new(storage_path)?;

        if fresh {
            tracing::info!("Fresh crawl requested, clearing existing graph");
            storage.reset_graph()?;
        }

        let mut seeded = 0;
        for seed in &config.seeds {
            if storage.seed(&normalize_username(&seed.username), seed.rating)? {
                seeded += 1;
            }
        }
        tracing::info!(
            seeded,
            configured = config.seeds.len(),
            "Seeded frontier"
        );

        let config = Arc::new(config);
        let storage = Arc::new(Mutex::new(storage));
        let worker = NodeWorker::new(
            config.clone(),
            storage.clone(),
            deps.source.clone(),
            deps.enricher,
            deps.rater,
        );

        Ok(Self {
            config,
            storage,
            worker,
            source: deps.source,
            config_hash: String::from("unhashed"),
        })
    }

    /// Sets the configuration hash recorded on each run
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    /// Shared handle to the frontier store
    pub fn storage(&self) -> Arc<Mutex<SqliteStorage>> {
        self.storage.clone()
    }

    /// Runs the crawl until no pending node within the depth bound remains
    ///
    /// Individual node failures never abort the run. The run fails only if
    /// the remote service is unreachable at startup or the store cannot be
    /// written.
    pub async fn run(&self) -> Result<CrawlReport> {
        self.source.ping().await?;

        let run_id = self.with_store(|store| {
            if let Some(previous) = store.get_latest_run()? {
                if previous.status == RunStatus::Running {
                    tracing::warn!(
                        run_id = previous.id,
                        "Previous run never finished, marking interrupted"
                    );
                    store.update_run_status(previous.id, RunStatus::Interrupted)?;
                }
            }
            store.create_run(&self.config_hash)
        })?;
        tracing::info!(run_id, "Starting crawl run");
        let start_time = Instant::now();

        let result = self.crawl_loop(run_id).await;

        match &result {
            Ok(report) => {
                self.with_store(|store| store.complete_run(run_id))?;
                tracing::info!(
                    run_id,
                    batches = report.batches,
                    processed = report.processed,
                    ignored = report.ignored,
                    errored = report.errored,
                    discovered = report.discovered,
                    elapsed_secs = start_time.elapsed().as_secs(),
                    "Crawl completed"
                );
            }
            Err(e) => {
                tracing::error!(run_id, error = %e, "Crawl aborted");
                if let Err(mark_err) =
                    self.with_store(|store| store.update_run_status(run_id, RunStatus::Failed))
                {
                    tracing::error!(run_id, error = %mark_err, "Failed to record run failure");
                }
            }
        }

        result
    }

    async fn crawl_loop(&self, run_id: i64) -> Result<CrawlReport> {
        let crawler = &self.config.crawler;
        let mut report = CrawlReport {
            run_id,
            ..CrawlReport::default()
        };

        let stale_after = Duration::from_secs(crawler.stale_after_secs);
        let recovered = self.with_store(|store| store.reset_stale_processing(stale_after))?;
        if recovered > 0 {
            tracing::info!(recovered, "Returned stale claims to pending");
        }

        let semaphore = Arc::new(Semaphore::new(crawler.concurrency as usize));

        loop {
            if let Some(max) = crawler.max_batches {
                if report.batches >= max {
                    tracing::info!(max, "Batch limit reached, stopping");
                    break;
                }
            }

            let batch =
                self.with_store(|store| store.claim_batch(crawler.batch_size, crawler.max_depth))?;
            if batch.is_empty() {
                tracing::info!("No pending nodes within the depth bound, crawl complete");
                break;
            }

            report.batches += 1;
            report.claimed += batch.len();
            tracing::info!(
                batch = report.batches,
                size = batch.len(),
                "Claimed batch"
            );

            let mut tasks = JoinSet::new();
            for node in batch {
                let worker = self.worker.clone();
                let semaphore = semaphore.clone();
                tasks.spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    worker.process(node).await
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(Ok(summary)) => report.record(summary),
                    Ok(Err(e)) => {
                        // Store writes are failing; stop and leave claims to the sweep
                        tasks.abort_all();
                        return Err(e);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Worker task panicked");
                        report.errored += 1;
                    }
                }
            }

            tracing::info!(
                batch = report.batches,
                processed = report.processed,
                ignored = report.ignored,
                errored = report.errored,
                "Batch finished"
            );
        }

        Ok(report)
    }

    fn with_store<T>(
        &self,
        f: impl FnOnce(&mut SqliteStorage) -> StorageResult<T>,
    ) -> Result<T> {
        let mut guard = self
            .storage
            .lock()
            .map_err(|_| RippleError::Storage("storage mutex poisoned".to_string()))?;
        Ok(f(&mut guard)?)
    }
}

/// Runs a complete crawl with the default remote collaborators
///
/// # Example
///
/// ```no_run
/// use social_ripple::config::load_config;
/// use social_ripple::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// run_crawl(config, false).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, fresh: bool) -> Result<CrawlReport> {
    let deps = CrawlDeps::from_config(&config)?;
    let coordinator = Coordinator::new(config, deps, fresh)?;
    coordinator.run().await
}
