//! Client for the text-cleaning service.
//!
//! The cleaning service takes a piece of text and an instruction and answers
//! with the transformed text as a raw body. It is reached through the
//! [`Clean`] trait so the transformer can be driven by an in-memory fake in
//! tests.
//!
//! # Wire format
//!
//! ```text
//! POST {clean_url}
//! Content-Type: application/json
//!
//! {"content": "...", "prompt": "..."}
//! ```
//!
//! A `200` answer carries the cleaned text. Any other status, or an empty
//! body, fails the call.

use crate::config::Endpoint;
use crate::error::ServiceError;
use crate::retry::RetryPolicy;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, instrument, warn};

const SERVICE: &str = "clean";

/// Async access to a text-cleaning backend.
pub trait Clean {
    /// Apply `prompt` to `content` and return the transformed text.
    async fn clean(&self, content: &str, prompt: &str) -> Result<String, ServiceError>;
}

#[derive(Debug, Serialize)]
struct CleanRequest<'a> {
    content: &'a str,
    prompt: &'a str,
}

/// [`Clean`] over HTTP, sharing one `reqwest::Client` with the other stages.
#[derive(Debug, Clone)]
pub struct HttpCleaner {
    client: reqwest::Client,
    endpoint: Endpoint,
    retry: RetryPolicy,
}

impl HttpCleaner {
    pub fn new(client: reqwest::Client, endpoint: Endpoint, retry: RetryPolicy) -> Self {
        Self {
            client,
            endpoint,
            retry,
        }
    }

    async fn clean_once(&self, content: &str, prompt: &str) -> Result<String, ServiceError> {
        let res = self
            .client
            .post(self.endpoint.url.clone())
            .timeout(self.endpoint.timeout)
            .json(&CleanRequest { content, prompt })
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
            .text()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;
        if body.trim().is_empty() {
            return Err(ServiceError::Decode {
                service: SERVICE,
                message: "empty body".to_string(),
            });
        }
        Ok(body)
    }
}

impl Clean for HttpCleaner {
    #[instrument(level = "debug", skip_all, fields(content_len = content.len()))]
    async fn clean(&self, content: &str, prompt: &str) -> Result<String, ServiceError> {
        let t0 = Instant::now();
        let res = self
            .retry
            .run("clean", move || self.clean_once(content, prompt))
            .await;
        let elapsed_ms = t0.elapsed().as_millis();

        match &res {
            Ok(body) => debug!(elapsed_ms, bytes = body.len(), "cleaning call succeeded"),
            Err(e) => warn!(elapsed_ms, error = %e, "cleaning call failed"),
        }
        res
    }
}
