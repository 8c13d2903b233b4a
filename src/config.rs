//! Runtime configuration, built once from the [`Cli`] and passed by reference.
//!
//! Nothing below `main` reads the environment: the category map, prompts,
//! endpoints and credentials all travel inside [`Config`].

use crate::cli::Cli;
use crate::models::Category;
use crate::retry::RetryPolicy;
use chrono::{Local, NaiveDate, Utc};
use clap::ValueEnum;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Sections crawled when no categories file is given.
const DEFAULT_CATEGORIES: [(&str, &str); 5] = [
    ("politics", "https://news.naver.com/section/100"),
    ("economy", "https://news.naver.com/section/101"),
    ("society", "https://news.naver.com/section/102"),
    ("it", "https://news.naver.com/section/105"),
    ("world", "https://news.naver.com/section/104"),
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL for {field}: {source}")]
    Url {
        field: &'static str,
        source: url::ParseError,
    },

    #[error("cannot read categories file {path}: {source}")]
    CategoriesIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse categories file {path}: {source}")]
    CategoriesYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("category {label} has an invalid source URL: {source}")]
    CategoryUrl {
        label: String,
        source: url::ParseError,
    },

    #[error("no categories configured")]
    NoCategories,

    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    Date(String),
}

/// What each of the three content cleaning stages receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CleaningChain {
    /// Every stage receives the original content; the last stage's answer wins.
    Reference,
    /// Each stage receives the previous stage's answer.
    Chained,
}

/// Which calendar decides the day a run belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DayClock {
    Utc,
    Local,
}

impl DayClock {
    pub fn today(self) -> NaiveDate {
        match self {
            DayClock::Utc => Utc::now().date_naive(),
            DayClock::Local => Local::now().date_naive(),
        }
    }
}

/// A remote endpoint and the deadline applied to every call made to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: Url,
    pub timeout: Duration,
}

/// Destination repository on the GitHub API.
#[derive(Clone)]
pub struct GitHubTarget {
    pub api: Endpoint,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub token: Option<String>,
}

impl fmt::Debug for GitHubTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubTarget")
            .field("api", &self.api)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub categories: Vec<Category>,
    pub extract: Endpoint,
    pub clean: Endpoint,
    pub store: Endpoint,
    pub github: GitHubTarget,
    pub content_prompts: [String; 3],
    pub cleaning_chain: CleaningChain,
    pub clock: DayClock,
    pub retry: RetryPolicy,
    pub conflict_retries: usize,
    pub publish_only: bool,
    pub date: Option<NaiveDate>,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let categories = match &cli.categories {
            Some(path) => load_categories(path)?,
            None => default_categories(),
        };
        if categories.is_empty() {
            return Err(ConfigError::NoCategories);
        }

        let date = cli.date.as_deref().map(parse_date).transpose()?;

        Ok(Self {
            categories,
            extract: endpoint("extract_url", &cli.extract_url, cli.extract_timeout_secs)?,
            clean: endpoint("clean_url", &cli.clean_url, cli.clean_timeout_secs)?,
            store: endpoint("store_url", &cli.store_url, cli.store_timeout_secs)?,
            github: GitHubTarget {
                api: endpoint("github_api_url", &cli.github_api_url, cli.github_timeout_secs)?,
                owner: cli.github_owner,
                repo: cli.github_repo,
                branch: cli.github_branch,
                token: cli.github_token.filter(|t| !t.is_empty()),
            },
            content_prompts: [cli.content_prompt_1, cli.content_prompt_2, cli.content_prompt_3],
            cleaning_chain: cli.cleaning_chain,
            clock: cli.clock,
            retry: RetryPolicy::with_retries(cli.retries),
            conflict_retries: cli.conflict_retries,
            publish_only: cli.publish_only,
            date,
        })
    }

    /// The day this run stores and publishes under.
    pub fn run_date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| self.clock.today())
    }
}

fn endpoint(field: &'static str, raw: &str, timeout_secs: u64) -> Result<Endpoint, ConfigError> {
    let url = Url::parse(raw).map_err(|source| ConfigError::Url { field, source })?;
    Ok(Endpoint {
        url,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn parse_date(raw: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| ConfigError::Date(raw.to_string()))
}

pub fn default_categories() -> Vec<Category> {
    DEFAULT_CATEGORIES
        .iter()
        .map(|(label, url)| Category::new(*label, *url))
        .collect()
}

/// Read a `label: url` YAML map. Labels come back sorted.
pub fn load_categories(path: &Path) -> Result<Vec<Category>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::CategoriesIo {
        path: path.to_path_buf(),
        source,
    })?;
    let map: BTreeMap<String, String> =
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::CategoriesYaml {
            path: path.to_path_buf(),
            source,
        })?;

    map.into_iter()
        .map(|(label, url)| {
            Url::parse(&url).map_err(|source| ConfigError::CategoryUrl {
                label: label.clone(),
                source,
            })?;
            Ok(Category::new(label, url))
        })
        .collect()
}
