//! Object store access: put rendered articles, list and fetch a day's files.
//!
//! # Wire format
//!
//! | Operation | Request | Answer |
//! |-----------|---------|--------|
//! | put  | `PUT {store}/{key}` + `x-category-sniij: {category}_{index}` | 2xx |
//! | list | `GET {store}?prefix=..&continuation-token=..` | `{"keys": [..], "next_continuation_token": ..}` |
//! | get  | `GET {store}/{key}` | object bytes |
//!
//! Listing is paginated. [`list_all`] follows continuation tokens until the
//! store reports no further page.

use crate::config::Endpoint;
use crate::error::ServiceError;
use crate::models::StoreKey;
use crate::retry::RetryPolicy;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

const SERVICE: &str = "store";

/// Header the upload stage reads the `{category}_{index}` tag from.
pub const CATEGORY_HEADER: &str = "x-category-sniij";

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListPage {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub next_continuation_token: Option<String>,
}

/// Async access to a key/value object store.
pub trait ObjectStore {
    /// Write `bytes` at `key`, replacing any previous object.
    async fn put(&self, key: &StoreKey, bytes: Vec<u8>) -> Result<(), ServiceError>;

    /// List one page of keys under `prefix`.
    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage, ServiceError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, ServiceError>;
}

/// List every key under `prefix`, following pagination to the end.
///
/// # Arguments
///
/// * `store` - The object store to list
/// * `prefix` - Key prefix, e.g. `news/2025-01-04/`
///
/// # Returns
///
/// All matching keys in listing order, or the first page error. A
/// continuation token that repeats is reported as a decode error rather
/// than looping forever.
#[instrument(level = "debug", skip(store))]
pub async fn list_all<S: ObjectStore>(store: &S, prefix: &str) -> Result<Vec<String>, ServiceError> {
    let mut keys = Vec::new();
    let mut continuation: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = store.list_page(prefix, continuation.as_deref()).await?;
        pages += 1;
        keys.extend(page.keys);

        match page.next_continuation_token {
            Some(next) if continuation.as_deref() == Some(next.as_str()) => {
                return Err(ServiceError::Decode {
                    service: SERVICE,
                    message: format!("continuation token {next} repeated"),
                });
            }
            Some(next) => continuation = Some(next),
            None => break,
        }
    }

    debug!(pages, count = keys.len(), "Listed objects");
    Ok(keys)
}

/// [`ObjectStore`] over a plain HTTP object API.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: Endpoint,
    retry: RetryPolicy,
}

impl HttpObjectStore {
    pub fn new(client: reqwest::Client, endpoint: Endpoint, retry: RetryPolicy) -> Self {
        Self {
            client,
            endpoint,
            retry,
        }
    }

    fn object_url(&self, key: &str) -> Result<Url, ServiceError> {
        let encoded = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let base = self.endpoint.url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{encoded}"))?)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ServiceError> {
        let res = request
            .timeout(self.endpoint.timeout)
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;
        if !res.status().is_success() {
            return Err(ServiceError::Status {
                service: SERVICE,
                status: res.status().as_u16(),
            });
        }
        Ok(res)
    }

    async fn put_once(&self, url: &Url, tag: &str, bytes: &[u8]) -> Result<(), ServiceError> {
        let request = self
            .client
            .put(url.clone())
            .header(CATEGORY_HEADER, tag)
            .header(CONTENT_TYPE, "text/markdown; charset=utf-8")
            .body(bytes.to_vec());
        self.send(request).await.map(|_| ())
    }

    async fn list_once(
        &self,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage, ServiceError> {
        let mut query = vec![("prefix", prefix)];
        if let Some(token) = continuation {
            query.push(("continuation-token", token));
        }
        let request = self.client.get(self.endpoint.url.clone()).query(&query);
        self.send(request)
            .await?
            .json::<ListPage>()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))
    }

    async fn get_once(&self, url: &Url) -> Result<Vec<u8>, ServiceError> {
        let bytes = self
            .send(self.client.get(url.clone()))
            .await?
            .bytes()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;
        Ok(bytes.to_vec())
    }
}

impl ObjectStore for HttpObjectStore {
    #[instrument(level = "debug", skip(self, key, bytes), fields(key = %key, bytes = bytes.len()))]
    async fn put(&self, key: &StoreKey, bytes: Vec<u8>) -> Result<(), ServiceError> {
        let url = self.object_url(&key.to_string())?;
        let tag = key.category_tag();
        self.retry
            .run("store.put", || self.put_once(&url, &tag, &bytes))
            .await
    }

    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage, ServiceError> {
        self.retry
            .run("store.list", move || self.list_once(prefix, continuation))
            .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn get(&self, key: &str) -> Result<Vec<u8>, ServiceError> {
        let url = self.object_url(key)?;
        self.retry.run("store.get", || self.get_once(&url)).await
    }
}
