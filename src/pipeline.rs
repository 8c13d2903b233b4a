//! Per-article unit of work: clean, render, store.
//!
//! The pipeline is best-effort. Cleaning failures are absorbed by the
//! transformer and the original text is rendered instead; a failed store
//! write is logged and returned in the [`ArticleOutcome`]. Either way the
//! caller keeps going.

use crate::api::Clean;
use crate::error::ServiceError;
use crate::models::{Article, StoreKey};
use crate::outputs::markdown::article_to_markdown;
use crate::store::ObjectStore;
use crate::transform::{TransformReport, Transformer};
use crate::utils::sanitize_markdown;
use tracing::{error, info, instrument};

/// What happened to one article.
#[derive(Debug)]
pub struct ArticleOutcome {
    pub key: StoreKey,
    pub transform: TransformReport,
    pub stored: Result<(), ServiceError>,
}

pub struct ArticlePipeline<'a, C, S> {
    transformer: Transformer<'a, C>,
    store: &'a S,
}

impl<'a, C: Clean, S: ObjectStore> ArticlePipeline<'a, C, S> {
    pub fn new(transformer: Transformer<'a, C>, store: &'a S) -> Self {
        Self { transformer, store }
    }

    #[instrument(level = "info", skip_all, fields(key = %key))]
    pub async fn process(&self, mut article: Article, key: StoreKey) -> ArticleOutcome {
        let transform = self.transformer.transform(&mut article).await;

        let markdown = sanitize_markdown(&article_to_markdown(&article));
        let bytes = markdown.len();

        let stored = self.store.put(&key, markdown).await;
        match &stored {
            Ok(()) => info!(
                bytes,
                uncleaned_fields = transform.uncleaned_fields(),
                "Stored article"
            ),
            Err(e) => error!(error = %e, "Store write failed; article dropped"),
        }

        ArticleOutcome {
            key,
            transform,
            stored,
        }
    }
}
