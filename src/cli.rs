//! Command-line interface definitions for the daily news pipeline.
//!
//! Every option can also be supplied through the environment, which is how the
//! scheduled deployment configures the binary. The parsed [`Cli`] is turned
//! into an immutable [`crate::config::Config`] once at startup.

use crate::config::{CleaningChain, DayClock};
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the daily news pipeline.
///
/// # Examples
///
/// ```sh
/// # Full daily run
/// daily_news_pipeline --extract-url https://crawl.example/extract \
///     --clean-url https://clean.example/clean \
///     --store-url https://store.example/objects \
///     --github-owner me --github-repo daily-news
///
/// # Re-publish a day that already sits in the object store
/// daily_news_pipeline --publish-only --date 2025-01-04 ...
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Extraction service endpoint (`GET ?url=<section page>`)
    #[arg(long, env = "EXTRACT_URL")]
    pub extract_url: String,

    /// Cleaning service endpoint (`POST {content, prompt}`)
    #[arg(long, env = "CLEAN_URL")]
    pub clean_url: String,

    /// Object store base URL
    #[arg(long, env = "STORE_URL")]
    pub store_url: String,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub github_api_url: String,

    /// Owner of the destination repository
    #[arg(long, env = "OWNER_GITHUB")]
    pub github_owner: String,

    /// Name of the destination repository
    #[arg(long, env = "REPO_GITHUB")]
    pub github_repo: String,

    /// Branch the daily commit is published to
    #[arg(long, env = "BRANCH_GITHUB", default_value = "main")]
    pub github_branch: String,

    /// Token used for the GitHub API
    #[arg(long, env = "TOKEN_GITHUB", hide_env_values = true)]
    pub github_token: Option<String>,

    /// YAML file mapping category labels to section URLs
    #[arg(short, long, env = "CATEGORIES_FILE")]
    pub categories: Option<PathBuf>,

    /// Instruction for the first content cleaning stage
    #[arg(long, env = "PROMPT_CONTENT_1", default_value = "")]
    pub content_prompt_1: String,

    /// Instruction for the second content cleaning stage
    #[arg(long, env = "PROMPT_CONTENT_2", default_value = "")]
    pub content_prompt_2: String,

    /// Instruction for the third content cleaning stage
    #[arg(long, env = "PROMPT_CONTENT_3", default_value = "")]
    pub content_prompt_3: String,

    /// What each content cleaning stage receives as input
    #[arg(long, env = "CLEANING_CHAIN", value_enum, default_value_t = CleaningChain::Reference)]
    pub cleaning_chain: CleaningChain,

    /// Clock used to decide which day a run belongs to
    #[arg(long, env = "DAY_CLOCK", value_enum, default_value_t = DayClock::Utc)]
    pub clock: DayClock,

    /// Deadline for extraction calls, in seconds
    #[arg(long, env = "EXTRACT_TIMEOUT_SECS", default_value_t = 120)]
    pub extract_timeout_secs: u64,

    /// Deadline for cleaning calls, in seconds
    #[arg(long, env = "CLEAN_TIMEOUT_SECS", default_value_t = 10)]
    pub clean_timeout_secs: u64,

    /// Deadline for object store calls, in seconds
    #[arg(long, env = "STORE_TIMEOUT_SECS", default_value_t = 30)]
    pub store_timeout_secs: u64,

    /// Deadline for GitHub API calls, in seconds
    #[arg(long, env = "GITHUB_TIMEOUT_SECS", default_value_t = 30)]
    pub github_timeout_secs: u64,

    /// Retries for transient failures of any remote call
    #[arg(long, env = "RETRIES", default_value_t = 0)]
    pub retries: usize,

    /// Times to rebuild the commit on a fresh head after a ref conflict
    #[arg(long, env = "CONFLICT_RETRIES", default_value_t = 0)]
    pub conflict_retries: usize,

    /// Skip crawling and only publish what is already stored
    #[arg(long)]
    pub publish_only: bool,

    /// Day to publish (YYYY-MM-DD); defaults to today on the configured clock
    #[arg(long)]
    pub date: Option<String>,
}
