use anyhow::Context;
use clap::Parser;
use collector::{CollectorJob, Scheduler};
use database::PostRepository;
use reddit_client::{ClientConfig, RedditJsonClient};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use trendradar_core::AppConfig;

const DEFAULT_LOG_FILTER: &str = "trendradar=info,collector=info,reddit_client=info,database=info";

/// Collect recent subreddit posts into a local store.
#[derive(Debug, Parser)]
#[command(name = "trendradar", version, about)]
struct Cli {
    /// Run a single collection and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Before the subscriber, so RUST_LOG from .env applies.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Ignoring unreadable .env file: {e}");
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    tracing::info!("Starting TrendRadar collector");

    let config = AppConfig::load().context("failed to load configuration")?;
    let client = RedditJsonClient::new(ClientConfig::from(&config))
        .context("failed to build the listing client")?;
    let repository = PostRepository::connect(&config.database_url).await;

    let job = CollectorJob::from_config(&config, Arc::new(client), repository.clone());
    let scheduler = Scheduler::from_config(&config);

    if cli.once {
        let summary = scheduler.run_once(&job).await;
        println!("{summary}");
    } else {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown requested");
                    trigger.cancel();
                }
                Err(e) => tracing::error!("Unable to listen for Ctrl-C: {}", e),
            }
        });

        let ticks = scheduler.run_recurring(&job, cancel).await;
        tracing::info!("Collector stopped after {} runs", ticks);
    }

    repository.close().await;
    Ok(())
}
