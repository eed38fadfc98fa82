//! Per-node processing
//!
//! A worker drives one claimed node through its state machine:
//! profile fetch, enrichment, filter gate, rating, connection expansion and
//! finally the terminal transition. Any failure along the way ends the node
//! as `ignored` with `ERROR_SCRAPING`; only a failure to record that outcome
//! is returned to the caller.

use crate::config::Config;
use crate::crawler::pager::ConnectionPager;
use crate::filter::{evaluate_profile, FilterVerdict};
use crate::remote::{Enricher, NodeSnapshot, ProfileSource, Rater, Rating};
use crate::state::{Direction, IgnoreReason};
use crate::storage::{
    EdgeRecord, NodeOutcome, NodeRecord, SqliteStorage, Storage, StorageResult,
};
use crate::{Result, RippleError};
use std::sync::{Arc, Mutex};

/// Directions in expansion order
const EXPANSION_ORDER: [Direction; 2] = [Direction::Following, Direction::Followers];

/// How a node's processing ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeDisposition {
    /// Rated and finalized as processed
    Processed,

    /// Rejected by the filter gate
    Rejected(IgnoreReason),

    /// Failed and finalized as ignored with `ERROR_SCRAPING`
    Failed,

    /// Another caller finalized the node first; nothing was written
    Lost,
}

/// Result of processing one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSummary {
    pub disposition: NodeDisposition,

    /// New nodes created by this node's expansion
    pub discovered: usize,
}

/// Processes claimed nodes; cheap to clone into spawned tasks
#[derive(Clone)]
pub struct NodeWorker {
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    source: Arc<dyn ProfileSource>,
    enricher: Arc<dyn Enricher>,
    rater: Arc<dyn Rater>,
}

impl NodeWorker {
    pub fn new(
        config: Arc<Config>,
        storage: Arc<Mutex<SqliteStorage>>,
        source: Arc<dyn ProfileSource>,
        enricher: Arc<dyn Enricher>,
        rater: Arc<dyn Rater>,
    ) -> Self {
        Self {
            config,
            storage,
            source,
            enricher,
            rater,
        }
    }

    /// Processes one claimed node to a terminal state
    ///
    /// # Returns
    ///
    /// * `Ok(NodeSummary)` - The node reached a terminal state (or was
    ///   finalized by someone else)
    /// * `Err(RippleError)` - The terminal state could not be written
    pub async fn process(&self, node: NodeRecord) -> Result<NodeSummary> {
        let username = node.username.clone();
        tracing::debug!(username = %username, depth = node.depth, "Processing node");

        let (outcome, discovered, disposition) = match self.run_pipeline(&node).await {
            Ok((outcome, discovered)) => {
                let disposition = match &outcome {
                    NodeOutcome::Processed { .. } => NodeDisposition::Processed,
                    NodeOutcome::Ignored { reason, .. } => NodeDisposition::Rejected(*reason),
                };
                (outcome, discovered, disposition)
            }
            Err(e) => {
                tracing::warn!(username = %username, error = %e, "Node failed, ignoring it");
                (
                    NodeOutcome::scraping_error(e.to_string()),
                    0,
                    NodeDisposition::Failed,
                )
            }
        };

        let written = self.with_store(|store| store.finalize(&username, &outcome))?;
        if !written {
            tracing::warn!(username = %username, "Node was already finalized elsewhere");
            return Ok(NodeSummary {
                disposition: NodeDisposition::Lost,
                discovered,
            });
        }

        tracing::info!(
            username = %username,
            status = %outcome.status(),
            discovered,
            "Node finalized"
        );

        Ok(NodeSummary {
            disposition,
            discovered,
        })
    }

    async fn run_pipeline(&self, node: &NodeRecord) -> Result<(NodeOutcome, usize)> {
        let username = node.username.as_str();

        let profile = self.source.fetch_profile(username).await?;
        let enrichment = self.enricher.enrich(&profile).await?;

        let rating = match node.seed_rating {
            Some(score) => {
                tracing::debug!(username, score, "Trusted seed, skipping gate and rater");
                Rating::from_seed(score)
            }
            None => {
                let verdict = evaluate_profile(&profile, &enrichment, &self.config.filter);
                if let FilterVerdict::Reject(reason) = verdict {
                    tracing::debug!(username, reason = %reason, "Rejected by filter gate");
                    return Ok((
                        NodeOutcome::Ignored {
                            reason,
                            message: None,
                            profile: Some(profile),
                            enrichment: Some(enrichment),
                        },
                        0,
                    ));
                }

                let snapshot = NodeSnapshot {
                    username: username.to_string(),
                    depth: node.depth,
                    profile: profile.clone(),
                    enrichment: enrichment.clone(),
                    research_context: self.config.rater.research_context.clone(),
                };
                self.rater.rate(&snapshot).await?
            }
        };

        let mut discovered = 0;
        if node.depth < self.config.crawler.max_depth {
            let grandparent = self.with_store(|store| store.best_lineage_rating(username))?;

            for direction in EXPANSION_ORDER {
                if !self.expansion_enabled(direction) || node.scraped.is_scraped(direction) {
                    continue;
                }
                discovered += self
                    .expand(username, rating.score, direction, grandparent)
                    .await?;
            }
        }

        Ok((
            NodeOutcome::Processed {
                rating,
                profile,
                enrichment,
            },
            discovered,
        ))
    }

    fn expansion_enabled(&self, direction: Direction) -> bool {
        match direction {
            Direction::Following => self.config.crawler.expand_following,
            Direction::Followers => self.config.crawler.expand_followers,
        }
    }

    /// Reads every page of one direction, recording each page as it arrives
    async fn expand(
        &self,
        username: &str,
        rating: f64,
        direction: Direction,
        grandparent: Option<f64>,
    ) -> Result<usize> {
        let mut pager = ConnectionPager::new(
            self.source.as_ref(),
            username,
            direction,
            self.config.api.page_size,
            self.config.crawler.max_connection_pages,
        );
        let mut created = 0;

        while let Some(page) = pager.next_page().await {
            let handles = page?;
            if handles.is_empty() {
                continue;
            }

            let edges: Vec<EdgeRecord> = handles
                .iter()
                .filter(|handle| handle.as_str() != username)
                .map(|handle| EdgeRecord::between(username, handle, direction))
                .collect();

            let stats = self.with_store(|store| {
                let stats = store.discover(username, rating, direction, &handles, grandparent)?;
                store.insert_edges_ignoring_conflicts(&edges)?;
                Ok(stats)
            })?;

            tracing::debug!(
                username,
                direction = %direction,
                page = pager.pages_read(),
                handles = handles.len(),
                created = stats.created,
                raised = stats.raised,
                "Recorded connection page"
            );
            created += stats.created;
        }

        self.with_store(|store| store.mark_connections_scraped(username, direction))?;
        Ok(created)
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
