//! Riftwatch Drill - exercise the configured rate limiter
//!
//! Spawns a burst of concurrent callers against a limiter built from the
//! configuration, prints every grant as a JSON line on stdout and fails if the
//! resulting grant log breaks any quota. Useful for checking a quota change
//! before rolling it out to the ingestion workers.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::info;

use riftwatch_core::infrastructure::rate_limiter::find_violation;
use riftwatch_core::{Config, RateLimiter, init_tracing};

/// Drill CLI arguments
#[derive(Parser, Debug)]
#[command(name = "riftwatch-drill")]
#[command(about = "Run a burst of concurrent permit requests against the configured quotas")]
struct Args {
    /// Configuration file (TOML, YAML or JSON); layered config/ files are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of concurrent callers
    #[arg(short = 'n', long, default_value_t = 15)]
    callers: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// One line of drill output
#[derive(Debug, Serialize)]
struct GrantRecord {
    caller: usize,
    granted_at_ms: u64,
    waited_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load().context("Failed to load configuration")?,
    };
    if args.verbose {
        config.logging.level = "debug".to_string();
    }
    init_tracing(&config.logging).context("Failed to initialize logging")?;

    let limiter =
        RateLimiter::from_config(&config.rate_limit).context("Invalid rate limit quotas")?;

    info!(callers = args.callers, "Starting rate limit drill");
    let started = Instant::now();

    let mut callers = JoinSet::new();
    for caller in 0..args.callers {
        let limiter = limiter.clone();
        callers.spawn(async move { (caller, limiter.acquire().await) });
    }

    let mut grants = Vec::with_capacity(args.callers);
    while let Some(joined) = callers.join_next().await {
        grants.push(joined.context("Drill caller panicked")?);
    }
    grants.sort_by_key(|(_, permit)| permit.granted_at());

    for (caller, permit) in &grants {
        let record = GrantRecord {
            caller: *caller,
            granted_at_ms: permit.granted_at().duration_since(started).as_millis() as u64,
            waited_ms: permit.waited().as_millis() as u64,
        };
        println!("{}", serde_json::to_string(&record)?);
    }

    let timestamps: Vec<Instant> = grants.iter().map(|(_, permit)| permit.granted_at()).collect();
    if let Some(violation) = find_violation(limiter.quotas(), &timestamps) {
        bail!("Grant log violates the configured quotas: {}", violation);
    }

    info!(
        callers = args.callers,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Drill completed within quota"
    );

    Ok(())
}
