//! Well Registry ETL main entry point
//!
//! This is the command-line interface for the well registry ETL.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use well_registry_etl::config::{load_config_with_hash, Config};
use well_registry_etl::extract::normalize_page_url;
use well_registry_etl::output::{load_statistics, print_statistics};
use well_registry_etl::pipeline::run_pipeline;
use well_registry_etl::storage::SqliteStorage;

/// Well Registry ETL: loads monitoring locations into the staging database
///
/// Pages through the well registry API, transforms every monitoring
/// location and upserts it into the staging table, then rebuilds the
/// display view.
#[derive(Parser, Debug)]
#[command(name = "well-registry-etl")]
#[command(version)]
#[command(about = "Loads well registry monitoring locations", long_about = None)]
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

    /// Validate config and show what would be fetched without fetching
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_run(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("well_registry_etl=info,warn"),
            1 => EnvFilter::new("well_registry_etl=debug,info"),
            2 => EnvFilter::new("well_registry_etl=trace,debug"),
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

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config) {
    println!("=== Well Registry ETL Dry Run ===\n");

    println!("Registry:");
    println!("  Endpoint: {}", config.registry.endpoint);
    println!("  User agent: {}", config.registry.user_agent);
    println!(
        "  First page: {}",
        normalize_page_url(&config.registry.endpoint, config.fetch.page_size)
    );

    println!("\nFetch Policy:");
    println!("  Page size: {}", config.fetch.page_size);
    println!("  Network retries: {}", config.fetch.network_retries);
    println!("  Status retries: {}", config.fetch.status_retries);
    println!("  Parse retries: {}", config.fetch.parse_retries);
    println!("  Parse tolerance: {} pages", config.fetch.parse_tolerance);
    println!("  Backoff: {}ms", config.fetch.backoff_ms);
    println!("  Request timeout: {}ms", config.fetch.request_timeout_ms);

    println!("\nDatabase:");
    println!("  Path: {}", config.database.path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.database.path);

    let storage = SqliteStorage::new(Path::new(&config.database.path))
        .with_context(|| format!("Failed to open database {}", config.database.path))?;

    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main ETL run; an aborted extraction is an error exit
async fn handle_run(config: Config, config_hash: String) -> anyhow::Result<()> {
    tracing::info!(
        "Fetching {} locations per page from {}",
        config.fetch.page_size,
        config.registry.endpoint
    );

    let report = run_pipeline(config, config_hash)
        .await
        .context("ETL run failed")?;

    if report.is_aborted() {
        anyhow::bail!(
            "Run {} aborted: {}",
            report.run_id,
            report.abort_reason.as_deref().unwrap_or("unknown reason")
        );
    }

    tracing::info!(
        "Run {} finished as {}: {} of {} locations loaded",
        report.run_id,
        report.status.to_db_string(),
        report.records_loaded,
        report.records_fetched
    );

    Ok(())
}
