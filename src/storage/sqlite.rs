//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! Multi-statement operations (claiming, discovery) run inside IMMEDIATE
//! transactions so they serialize against other writers sharing the file.

use crate::crawler::compute_priority;
use crate::state::{DiscoveredVia, Direction, IgnoreReason, NodeStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    DiscoveryStats, EdgeRecord, LineageEntry, NodeOutcome, NodeRecord, RunRecord, RunStatus,
    ScrapedConnections,
};
use crate::RippleError;
use chrono::{SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// How long a connection waits for a competing writer before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const NODE_COLUMNS: &str = "username, status, depth, priority, discovered_via, \
     scraped_followers, scraped_following, seed_rating, rating, reasoning, archetypes, \
     ignored_reason, error_message, profile, enrichment, claimed_at, discovered_at, finalized_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
    current_run: Option<i64>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(RippleError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, RippleError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        // Several processes may share one database file
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            current_run: None,
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, RippleError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            current_run: None,
        })
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|text| {
        serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Decodes a text column through `parse`, rejecting unknown values
fn enum_column<T>(
    row: &Row<'_>,
    idx: usize,
    parse: impl FnOnce(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown value '{}'", raw).into(),
        )
    })
}

fn row_to_node(row: &Row<'_>) -> rusqlite::Result<NodeRecord> {
    Ok(NodeRecord {
        username: row.get(0)?,
        status: enum_column(row, 1, NodeStatus::from_db_string)?,
        depth: row.get(2)?,
        priority: row.get(3)?,
        discovered_via: enum_column(row, 4, DiscoveredVia::from_db_string)?,
        scraped: ScrapedConnections {
            followers: row.get(5)?,
            following: row.get(6)?,
        },
        seed_rating: row.get(7)?,
        rating: row.get(8)?,
        reasoning: row.get(9)?,
        archetypes: json_column(row, 10)?.unwrap_or_default(),
        ignored_reason: row
            .get::<_, Option<String>>(11)?
            .and_then(|code| IgnoreReason::from_db_string(&code)),
        error_message: row.get(12)?,
        profile: json_column(row, 13)?,
        enrichment: json_column(row, 14)?,
        claimed_at: row.get(15)?,
        discovered_at: row.get(16)?,
        finalized_at: row.get(17)?,
    })
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: enum_column(row, 4, RunStatus::from_db_string)?,
    })
}

fn insert_node_if_absent(
    conn: &Connection,
    username: &str,
    depth: u32,
    via: DiscoveredVia,
    priority: f64,
    run_id: Option<i64>,
) -> StorageResult<bool> {
    let inserted = conn.execute(
        "INSERT INTO nodes (username, status, depth, priority, discovered_via, discovered_at, discovered_run)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(username) DO NOTHING",
        params![
            username,
            NodeStatus::Pending.to_db_string(),
            depth,
            priority,
            via.to_db_string(),
            now_timestamp(),
            run_id
        ],
    )?;
    Ok(inserted > 0)
}

fn raise_node_priority(conn: &Connection, username: &str, priority: f64) -> StorageResult<bool> {
    let updated = conn.execute(
        "UPDATE nodes SET priority = MAX(priority, ?2) WHERE username = ?1 AND priority < ?2",
        params![username, priority],
    )?;
    Ok(updated > 0)
}

fn insert_lineage_if_absent(
    conn: &Connection,
    username: &str,
    parent: &str,
    rating: f64,
) -> StorageResult<bool> {
    let inserted = conn.execute(
        "INSERT INTO lineage (username, parent, rating) VALUES (?1, ?2, ?3)
         ON CONFLICT(username, parent) DO NOTHING",
        params![username, parent, rating],
    )?;
    Ok(inserted > 0)
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now_timestamp(), config_hash, RunStatus::Running.to_db_string()],
        )?;
        let run_id = self.conn.last_insert_rowid();
        self.current_run = Some(run_id);
        Ok(run_id)
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                row_to_run,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                row_to_run,
            )
            .optional()?;
        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let finished_at = (status != RunStatus::Running).then(now_timestamp);
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = COALESCE(?2, finished_at) WHERE id = ?3",
            params![status.to_db_string(), finished_at, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        self.update_run_status(run_id, RunStatus::Completed)
    }

    // ===== Node Lifecycle =====

    fn seed(&mut self, username: &str, rating: Option<f64>) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO nodes (username, status, depth, priority, discovered_via, seed_rating, discovered_at, discovered_run)
             VALUES (?1, ?2, 0, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(username) DO NOTHING",
            params![
                username,
                NodeStatus::Pending.to_db_string(),
                rating.unwrap_or(0.0),
                DiscoveredVia::Seed.to_db_string(),
                rating,
                now_timestamp(),
                self.current_run
            ],
        )?;
        Ok(inserted > 0)
    }

    fn claim_batch(&mut self, limit: u32, max_depth: u32) -> StorageResult<Vec<NodeRecord>> {
        let token = uuid::Uuid::new_v4().to_string();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "UPDATE nodes SET status = ?1, claim_token = ?2, claimed_at = ?3
             WHERE status = ?4 AND username IN (
                 SELECT username FROM nodes
                 WHERE status = ?4 AND depth <= ?5
                 ORDER BY depth ASC, priority DESC, username ASC
                 LIMIT ?6
             )",
            params![
                NodeStatus::Processing.to_db_string(),
                token,
                now_timestamp(),
                NodeStatus::Pending.to_db_string(),
                max_depth,
                limit
            ],
        )?;

        let nodes = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM nodes WHERE claim_token = ?1
                 ORDER BY depth ASC, priority DESC, username ASC",
                NODE_COLUMNS
            ))?;
            let rows = stmt.query_map(params![token], row_to_node)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        tx.commit()?;
        Ok(nodes)
    }

    fn finalize(&mut self, username: &str, outcome: &NodeOutcome) -> StorageResult<bool> {
        let now = now_timestamp();

        let updated = match outcome {
            NodeOutcome::Processed {
                rating,
                profile,
                enrichment,
            } => self.conn.execute(
                "UPDATE nodes SET status = ?1, rating = ?2, reasoning = ?3, archetypes = ?4,
                     ignored_reason = NULL, error_message = NULL, profile = ?5, enrichment = ?6,
                     claim_token = NULL, finalized_at = ?7
                 WHERE username = ?8 AND status = ?9",
                params![
                    NodeStatus::Processed.to_db_string(),
                    rating.score,
                    rating.reasoning,
                    to_json(&rating.archetypes)?,
                    to_json(profile)?,
                    to_json(enrichment)?,
                    now,
                    username,
                    NodeStatus::Processing.to_db_string()
                ],
            )?,
            NodeOutcome::Ignored {
                reason,
                message,
                profile,
                enrichment,
            } => {
                let profile = profile.as_ref().map(to_json).transpose()?;
                let enrichment = enrichment.as_ref().map(to_json).transpose()?;
                self.conn.execute(
                    "UPDATE nodes SET status = ?1, ignored_reason = ?2, error_message = ?3,
                         profile = COALESCE(?4, profile), enrichment = COALESCE(?5, enrichment),
                         claim_token = NULL, finalized_at = ?6
                     WHERE username = ?7 AND status = ?8",
                    params![
                        NodeStatus::Ignored.to_db_string(),
                        reason.to_db_string(),
                        message,
                        profile,
                        enrichment,
                        now,
                        username,
                        NodeStatus::Processing.to_db_string()
                    ],
                )?
            }
        };

        Ok(updated > 0)
    }

    fn discover(
        &mut self,
        parent: &str,
        parent_rating: f64,
        direction: Direction,
        children: &[String],
        grandparent_rating: Option<f64>,
    ) -> StorageResult<DiscoveryStats> {
        let run_id = self.current_run;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let parent_depth: u32 = tx
            .query_row(
                "SELECT depth FROM nodes WHERE username = ?1",
                params![parent],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StorageError::NodeNotFound(parent.to_string()))?;

        let child_depth = parent_depth + 1;
        let priority = compute_priority(parent_rating, direction, child_depth, grandparent_rating);
        let via = DiscoveredVia::from(direction);
        let mut stats = DiscoveryStats::default();

        for child in children {
            if child == parent {
                stats.skipped += 1;
                continue;
            }

            if insert_node_if_absent(&tx, child, child_depth, via, priority, run_id)? {
                stats.created += 1;
            } else if raise_node_priority(&tx, child, priority)? {
                stats.raised += 1;
            }

            if insert_lineage_if_absent(&tx, child, parent, parent_rating)? {
                stats.lineage_added += 1;
            }
        }

        tx.commit()?;
        Ok(stats)
    }

    fn create_if_absent(
        &mut self,
        username: &str,
        depth: u32,
        via: DiscoveredVia,
        priority: f64,
    ) -> StorageResult<bool> {
        insert_node_if_absent(&self.conn, username, depth, via, priority, self.current_run)
    }

    fn raise_priority(&mut self, username: &str, priority: f64) -> StorageResult<bool> {
        raise_node_priority(&self.conn, username, priority)
    }

    fn append_lineage_unique(
        &mut self,
        username: &str,
        parent: &str,
        rating: f64,
    ) -> StorageResult<bool> {
        insert_lineage_if_absent(&self.conn, username, parent, rating)
    }

    fn insert_edges_ignoring_conflicts(&mut self, edges: &[EdgeRecord]) -> StorageResult<usize> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO edges (from_user, to_user, via, discovered_run)
             VALUES (?1, ?2, ?3, ?4)",
        )?;

        let mut written = 0;
        for edge in edges {
            match stmt.execute(params![
                edge.from_user,
                edge.to_user,
                edge.via.to_db_string(),
                self.current_run
            ]) {
                Ok(n) => written += n,
                Err(e) => {
                    tracing::debug!(
                        from = %edge.from_user,
                        to = %edge.to_user,
                        error = %e,
                        "Edge insert skipped"
                    );
                }
            }
        }

        Ok(written)
    }

    fn mark_connections_scraped(
        &mut self,
        username: &str,
        direction: Direction,
    ) -> StorageResult<bool> {
        let column = match direction {
            Direction::Followers => "scraped_followers",
            Direction::Following => "scraped_following",
        };

        let updated = self.conn.execute(
            &format!(
                "UPDATE nodes SET {col} = 1 WHERE username = ?1 AND status = ?2 AND {col} = 0",
                col = column
            ),
            params![username, NodeStatus::Processing.to_db_string()],
        )?;
        Ok(updated > 0)
    }

    // ===== Operational =====

    fn reset_stale_processing(&mut self, stale_after: Duration) -> StorageResult<usize> {
        let window = chrono::Duration::from_std(stale_after)
            .map_err(|e| StorageError::Database(format!("Invalid staleness window: {}", e)))?;
        let cutoff = Utc::now()
            .checked_sub_signed(window)
            .ok_or_else(|| {
                StorageError::Database(format!(
                    "Staleness window of {}s reaches before the earliest timestamp",
                    stale_after.as_secs()
                ))
            })?
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        let reset = self.conn.execute(
            "UPDATE nodes SET status = ?1, claim_token = NULL, claimed_at = NULL
             WHERE status = ?2 AND (claimed_at IS NULL OR claimed_at < ?3)",
            params![
                NodeStatus::Pending.to_db_string(),
                NodeStatus::Processing.to_db_string(),
                cutoff
            ],
        )?;
        Ok(reset)
    }

    fn force_rescrape(&mut self, username: &str) -> StorageResult<bool> {
        let updated = self.conn.execute(
            "UPDATE nodes SET status = ?1, rating = NULL, reasoning = NULL, archetypes = NULL,
                 ignored_reason = NULL, error_message = NULL, claim_token = NULL,
                 claimed_at = NULL, finalized_at = NULL
             WHERE username = ?2 AND status IN (?3, ?4)",
            params![
                NodeStatus::Pending.to_db_string(),
                username,
                NodeStatus::Processed.to_db_string(),
                NodeStatus::Ignored.to_db_string()
            ],
        )?;
        Ok(updated > 0)
    }

    fn reset_graph(&mut self) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "
            DELETE FROM lineage;
            DELETE FROM edges;
            DELETE FROM nodes;
        ",
        )?;
        tx.commit()?;
        Ok(())
    }

    // ===== Queries =====

    fn get_node(&self, username: &str) -> StorageResult<Option<NodeRecord>> {
        let node = self
            .conn
            .query_row(
                &format!("SELECT {} FROM nodes WHERE username = ?1", NODE_COLUMNS),
                params![username],
                row_to_node,
            )
            .optional()?;
        Ok(node)
    }

    fn get_lineage(&self, username: &str) -> StorageResult<Vec<LineageEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT parent, rating FROM lineage WHERE username = ?1 ORDER BY parent")?;

        let entries = stmt
            .query_map(params![username], |row| {
                Ok(LineageEntry {
                    parent: row.get(0)?,
                    rating: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn best_lineage_rating(&self, username: &str) -> StorageResult<Option<f64>> {
        let best: Option<f64> = self.conn.query_row(
            "SELECT MAX(rating) FROM lineage WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )?;
        Ok(best)
    }

    fn count_nodes_by_status(&self, status: NodeStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_total_nodes(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_edges(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn edge_exists(&self, from_user: &str, to_user: &str) -> StorageResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM edges WHERE from_user = ?1 AND to_user = ?2)",
            params![from_user, to_user],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn ignored_reason_summary(&self) -> StorageResult<HashMap<IgnoreReason, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT ignored_reason, COUNT(*) FROM nodes
             WHERE status = ?1 AND ignored_reason IS NOT NULL
             GROUP BY ignored_reason",
        )?;

        let rows = stmt.query_map(params![NodeStatus::Ignored.to_db_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut summary = HashMap::new();
        for row in rows {
            let (code, count) = row?;
            if let Some(reason) = IgnoreReason::from_db_string(&code) {
                summary.insert(reason, count as u64);
            }
        }

        Ok(summary)
    }

    fn depth_breakdown(&self) -> StorageResult<HashMap<u32, usize>> {
        let mut stmt = self
            .conn
            .prepare("SELECT depth, COUNT(*) FROM nodes GROUP BY depth ORDER BY depth")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, usize>(1)?))
        })?;

        let mut breakdown = HashMap::new();
        for row in rows {
            let (depth, count) = row?;
            breakdown.insert(depth, count);
        }

        Ok(breakdown)
    }

    fn top_rated(&self, limit: u32) -> StorageResult<Vec<NodeRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM nodes WHERE status = ?1 AND rating IS NOT NULL
             ORDER BY rating DESC, username ASC LIMIT ?2",
            NODE_COLUMNS
        ))?;

        let nodes = stmt
            .query_map(
                params![NodeStatus::Processed.to_db_string(), limit],
                row_to_node,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(nodes)
    }
}
