//! HTTP client for the extraction service.
//!
//! # Wire format
//!
//! ```text
//! GET {extract_url}?url=https://news.naver.com/section/100
//! ```
//!
//! A `200` answer carries a JSON array of `{title, content, date}` objects.
//! Extraction fetches the section page plus every headline article, which is
//! why its deadline is much longer than the cleaning service's.

use super::Extract;
use crate::config::Endpoint;
use crate::error::ServiceError;
use crate::models::Article;
use crate::retry::RetryPolicy;
use crate::utils::truncate_for_log;
use reqwest::StatusCode;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

const SERVICE: &str = "extract";

#[derive(Debug, Clone)]
pub struct HttpExtractor {
    client: reqwest::Client,
    endpoint: Endpoint,
    retry: RetryPolicy,
}

impl HttpExtractor {
    pub fn new(client: reqwest::Client, endpoint: Endpoint, retry: RetryPolicy) -> Self {
        Self {
            client,
            endpoint,
            retry,
        }
    }

    async fn extract_once(&self, source_url: &str) -> Result<Vec<Article>, ServiceError> {
        let res = self
            .client
            .get(self.endpoint.url.clone())
            .query(&[("url", source_url)])
            .timeout(self.endpoint.timeout)
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;

        if res.status() != StatusCode::OK {
            return Err(ServiceError::Status {
                service: SERVICE,
                status: res.status().as_u16(),
            });
        }

        let body = res
            .bytes()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;

        // `null` is how an empty list is sometimes serialised upstream.
        let parsed: Option<Vec<Article>> =
            serde_json::from_slice(&body).map_err(|e| ServiceError::Decode {
                service: SERVICE,
                message: format!(
                    "{e}; body: {}",
                    truncate_for_log(&String::from_utf8_lossy(&body), 200)
                ),
            })?;
        Ok(parsed.unwrap_or_default())
    }
}

impl Extract for HttpExtractor {
    #[instrument(level = "info", skip_all, fields(%source_url))]
    async fn extract(&self, source_url: &str) -> Result<Vec<Article>, ServiceError> {
        let t0 = Instant::now();
        let res = self
            .retry
            .run("extract", move || self.extract_once(source_url))
            .await;
        let elapsed_ms = t0.elapsed().as_millis();

        match &res {
            Ok(articles) => {
                info!(elapsed_ms, count = articles.len(), "Extracted section articles");
                debug!(titles = ?articles.iter().map(|a| a.title.as_str()).collect::<Vec<_>>(), "Extracted titles");
            }
            Err(e) => warn!(elapsed_ms, error = %e, "Extraction failed"),
        }
        res
    }
}
