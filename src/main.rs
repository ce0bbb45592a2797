//! LATAM Leads main entry point
//!
//! This is the command-line interface for the lead crawler.

use anyhow::Context;
use clap::Parser;
use latam_leads::config::{load_run_config, CrawlSettings, Paths, RunConfig};
use latam_leads::crawler::{
    query_permutations, run_crawl, select_queries, Query, SearchClient, SerpApiClient, Shutdown,
    API_KEY_ENV,
};
use latam_leads::output::{load_statistics, print_statistics};
use latam_leads::LeadError;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// LATAM Leads: search-driven contact crawler
///
/// Runs country- and category-scoped web searches, visits the result pages,
/// extracts contact emails and phone numbers and appends one lead row per
/// new domain to a CSV master file.
#[derive(Parser, Debug)]
#[command(name = "latam-leads")]
#[command(version = "1.0.0")]
#[command(about = "Search-driven contact crawler for LATAM organizations", long_about = None)]
struct Cli {
    /// Directory holding the config files, the CSV and the audit log
    #[arg(long, value_name = "DIR", default_value = ".")]
    base_dir: PathBuf,

    /// Dashboard override file (defaults to <base-dir>/crawler_config.json)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resolve the configuration and list the queries without searching
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Summarize the existing CSV and audit log and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut paths = Paths::new(&cli.base_dir);
    if let Some(config) = &cli.config {
        paths = paths.with_config_path(config);
    }

    let result = if cli.stats {
        handle_stats(&paths)
    } else if cli.dry_run {
        handle_dry_run(&paths)
    } else {
        handle_crawl(&paths).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("[ERROR] {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("latam_leads=info,warn"),
            1 => EnvFilter::new("latam_leads=debug,info"),
            2 => EnvFilter::new("latam_leads=trace,debug"),
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

/// Handles the --dry-run mode: shows the resolved configuration and queries
fn handle_dry_run(paths: &Paths) -> anyhow::Result<()> {
    let config = load_run_config(paths);
    let queries = planned_queries(&config);

    println!("=== LATAM Leads Dry Run ===\n");
    println!("Base directory: {}", paths.base_dir.display());
    println!("Overrides:      {}", paths.config_path.display());
    println!("Output CSV:     {}", config.output_path.display());
    println!("Audit log:      {}", paths.audit_path.display());

    println!("\nCountries ({}): {}", config.countries.len(), config.countries.join(", "));
    println!("Categories ({}): {}", config.categories.len(), config.categories.join(", "));
    println!("Results per query: {}", config.results_per_query);
    println!(
        "Re-query TTL: {}",
        match config.requery_ttl_days {
            0 => "never".to_string(),
            days => format!("{} days", days),
        }
    );

    println!(
        "\nQueries ({} of {} combinations):",
        queries.len(),
        config.countries.len() * config.categories.len()
    );
    for (i, query) in queries.iter().enumerate() {
        println!("  {:>3}. {}", i + 1, query);
    }

    Ok(())
}

/// Handles the --stats mode: summarizes the files left by previous runs
fn handle_stats(paths: &Paths) -> anyhow::Result<()> {
    let config = load_run_config(paths);

    println!("CSV:       {}", config.output_path.display());
    println!("Audit log: {}\n", paths.audit_path.display());

    let stats = load_statistics(&config.output_path, &paths.audit_path)
        .context("failed to read existing output")?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(paths: &Paths) -> anyhow::Result<()> {
    let api_key = match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => return Err(LeadError::MissingApiKey(API_KEY_ENV).into()),
    };

    let search: Arc<dyn SearchClient> =
        Arc::new(SerpApiClient::new(api_key).context("failed to build search client")?);

    let shutdown = Shutdown::new();
    shutdown
        .listen_for_signals()
        .context("failed to install signal handlers")?;

    let stats = run_crawl(paths, search, CrawlSettings::default(), shutdown)
        .await
        .context("crawl failed")?;

    tracing::info!(
        "[INFO] Crawl finished: {} leads from {} queries",
        stats.leads_written,
        stats.queries_dispatched
    );

    Ok(())
}

fn planned_queries(config: &RunConfig) -> Vec<Query> {
    select_queries(
        query_permutations(&config.countries, &config.categories),
        config.max_queries,
    )
}
