//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the Social-Ripple database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Frontier: every discovered profile, keyed by lowercase handle
CREATE TABLE IF NOT EXISTS nodes (
    username TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    depth INTEGER NOT NULL,
    priority REAL NOT NULL DEFAULT 0,
    discovered_via TEXT NOT NULL,
    scraped_followers INTEGER NOT NULL DEFAULT 0,
    scraped_following INTEGER NOT NULL DEFAULT 0,
    seed_rating REAL,
    rating REAL,
    reasoning TEXT,
    archetypes TEXT,
    ignored_reason TEXT,
    error_message TEXT,
    profile TEXT,
    enrichment TEXT,
    claim_token TEXT,
    claimed_at TEXT,
    discovered_at TEXT NOT NULL,
    discovered_run INTEGER,
    finalized_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_nodes_claim ON nodes(status, depth, priority DESC);
CREATE INDEX IF NOT EXISTS idx_nodes_claim_token ON nodes(claim_token);

-- Discoverers of each node and their rating at discovery time
CREATE TABLE IF NOT EXISTS lineage (
    username TEXT NOT NULL REFERENCES nodes(username) ON DELETE CASCADE,
    parent TEXT NOT NULL,
    rating REAL NOT NULL,
    PRIMARY KEY (username, parent)
);

-- Append-only follow edges ("from follows to"); duplicates are allowed
CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_user TEXT NOT NULL,
    to_user TEXT NOT NULL,
    via TEXT NOT NULL,
    discovered_run INTEGER
);

CREATE INDEX IF NOT EXISTS idx_edges_from ON edges(from_user);
CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_user);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
