//! Social-Ripple main entry point
//!
//! This is the command-line interface for the Social-Ripple graph crawler.

use anyhow::{bail, Context};
use clap::Parser;
use social_ripple::config::{load_config_with_hash, Config};
use social_ripple::crawler::{Coordinator, CrawlDeps};
use social_ripple::output::{load_statistics, print_statistics};
use social_ripple::state::NodeStatus;
use social_ripple::storage::{self, normalize_username, SqliteStorage, Storage, StorageError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Social-Ripple: an incremental social graph crawler
///
/// Social-Ripple expands outward from a set of seed profiles, scoring each
/// profile it reaches and queueing its connections by priority. Progress is
/// kept in a SQLite frontier so a crawl can be stopped and resumed.
#[derive(Parser, Debug)]
#[command(name = "social-ripple")]
#[command(version)]
#[command(about = "An incremental social graph crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start a fresh crawl, clearing the existing graph
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "sweep_stale", "rescrape", "reset", "fresh"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["sweep_stale", "rescrape", "reset", "fresh"])]
    stats: bool,

    /// Return stale `processing` nodes to `pending` and exit
    #[arg(long, conflicts_with_all = ["rescrape", "reset", "fresh"])]
    sweep_stale: bool,

    /// Queue a processed or ignored node for processing again and exit
    #[arg(long, value_name = "USERNAME", conflicts_with_all = ["reset", "fresh"])]
    rescrape: Option<String>,

    /// Clear all nodes, lineage and edges and exit
    #[arg(long, conflicts_with = "fresh")]
    reset: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.sweep_stale {
        handle_sweep_stale(&config)?;
    } else if let Some(username) = cli.rescrape.as_deref() {
        handle_rescrape(&config, username)?;
    } else if cli.reset {
        handle_reset(&config)?;
    } else {
        handle_crawl(config, config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("social_ripple=info,warn"),
            1 => EnvFilter::new("social_ripple=debug,info"),
            2 => EnvFilter::new("social_ripple=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_storage(config: &Config) -> anyhow::Result<SqliteStorage> {
    storage::open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open database {}", config.output.database_path))
}

/// Handles the --dry-run mode: shows the effective configuration and seeds
fn handle_dry_run(config: &Config) {
    println!("=== Social-Ripple Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Batch size: {}", config.crawler.batch_size);
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Stale after: {}s", config.crawler.stale_after_secs);
    if let Some(max) = config.crawler.max_batches {
        println!("  Max batches: {}", max);
    }
    println!(
        "  Expand following: {}, followers: {}",
        config.crawler.expand_following, config.crawler.expand_followers
    );

    println!("\nRemote API:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  Page size: {}", config.api.page_size);
    println!(
        "  Token: {}",
        if config.api.resolve_token().is_some() {
            "configured"
        } else {
            "missing (contribution data unavailable)"
        }
    );

    println!("\nFilter Gate:");
    println!("  Banned countries: {}", config.filter.banned_countries.len());
    println!("  Min profile fields: {}", config.filter.min_profile_fields);
    println!("  Min contributions: {}", config.filter.min_contributions);
    println!("  Min active months: {}", config.filter.min_active_months);
    println!("  Max weekday ratio: {}", config.filter.max_weekday_ratio);

    println!("\nRater: {}", config.rater.endpoint);
    println!("Database: {}", config.output.database_path);

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        match seed.rating {
            Some(rating) => println!("  - {} (trusted rating {})", seed.username, rating),
            None => println!("  - {}", seed.username),
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(config)?;
    let stats = load_statistics(&storage).context("Failed to load statistics")?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --sweep-stale mode
fn handle_sweep_stale(config: &Config) -> anyhow::Result<()> {
    let mut storage = open_storage(config)?;
    let stale_after = Duration::from_secs(config.crawler.stale_after_secs);
    let reset = storage.reset_stale_processing(stale_after)?;

    println!(
        "✓ Returned {} stale node(s) to pending (claimed more than {}s ago)",
        reset, config.crawler.stale_after_secs
    );
    Ok(())
}

/// Handles the --rescrape mode
fn handle_rescrape(config: &Config, username: &str) -> anyhow::Result<()> {
    let mut storage = open_storage(config)?;
    let username = normalize_username(username);

    let node = match storage.get_node(&username)? {
        Some(node) => node,
        None => bail!("No node named '{}' in the database", username),
    };

    if !node.status.is_terminal() {
        return Err(StorageError::InvalidTransition {
            from: node.status,
            to: NodeStatus::Pending,
        })
        .with_context(|| format!("Cannot re-scrape '{}'", username));
    }

    if !storage.force_rescrape(&username)? {
        bail!("Node '{}' changed state while queueing the re-scrape", username);
    }

    println!("✓ '{}' queued for re-scrape", username);
    Ok(())
}

/// Handles the --reset mode
fn handle_reset(config: &Config) -> anyhow::Result<()> {
    let mut storage = open_storage(config)?;
    storage.reset_graph()?;

    println!("✓ Cleared graph in {}", config.output.database_path);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (clearing previous graph)");
    } else {
        tracing::info!("Starting crawl (resuming existing frontier)");
    }
    tracing::info!(
        "Seeds: {}, max depth: {}",
        config.seeds.len(),
        config.crawler.max_depth
    );

    let deps = CrawlDeps::from_config(&config).context("Failed to build remote clients")?;
    let coordinator = Coordinator::new(config, deps, fresh)?.with_config_hash(config_hash);

    let report = coordinator.run().await.context("Crawl failed")?;

    println!(
        "✓ Run {} finished: {} batch(es), {} processed, {} ignored, {} failed, {} new nodes",
        report.run_id,
        report.batches,
        report.processed,
        report.ignored,
        report.errored,
        report.discovered
    );
    Ok(())
}
