//! # Daily News Pipeline
//!
//! A once-a-day job that collects news articles per section, cleans them
//! through a text-processing service, renders each one to Markdown, stages
//! the files in an object store, and publishes the day's files to a GitHub
//! repository as one commit.
//!
//! ## Usage
//!
//! ```sh
//! daily_news_pipeline --extract-url https://crawl.example/extract \
//!     --clean-url https://clean.example/clean \
//!     --store-url https://store.example/objects \
//!     --github-owner me --github-repo daily-news
//! ```
//!
//! ## Architecture
//!
//! 1. **Fan-out**: every category is extracted concurrently, and every
//!    article of a category is cleaned, rendered and stored concurrently
//! 2. **Barrier**: the run waits for all of that work to finish
//! 3. **Publish**: the day's objects are listed, downloaded and committed
//!    in a single tree, then the branch is moved with one non-forced update
//!
//! Failures are logged and reported, never returned: once the configuration
//! is valid the process exits successfully.

use clap::Parser;
use std::error::Error;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod coordinator;
mod error;
mod github;
mod models;
mod orchestrator;
mod outputs;
mod pipeline;
mod publisher;
mod retry;
mod scrapers;
mod store;
#[cfg(test)]
mod testing;
mod transform;
mod utils;

use api::HttpCleaner;
use cli::Cli;
use config::Config;
use github::GitHubClient;
use orchestrator::Services;
use scrapers::remote::HttpExtractor;
use store::HttpObjectStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(
        event_kind = "application.started",
        version = env!("CARGO_PKG_VERSION"),
        "daily_news_pipeline starting up"
    );

    let config = Config::from_cli(Cli::parse())?;
    debug!(?config, "Loaded configuration");

    // One connection pool for every service; deadlines are set per request.
    let client = reqwest::Client::builder()
        .user_agent(concat!("daily_news_pipeline/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let services = Services {
        extractor: HttpExtractor::new(client.clone(), config.extract.clone(), config.retry),
        cleaner: HttpCleaner::new(client.clone(), config.clean.clone(), config.retry),
        store: HttpObjectStore::new(client.clone(), config.store.clone(), config.retry),
        repo: GitHubClient::new(client, config.github.clone(), config.retry),
    };

    let summary = orchestrator::run(&config, &services).await;
    info!(
        date = %summary.date,
        published = summary.publish.is_ok(),
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Done"
    );
    Ok(())
}
