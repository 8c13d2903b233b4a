//! Fan-out over categories and their articles.
//!
//! Every category is extracted concurrently, and every article of a category
//! is processed concurrently. [`Coordinator::run_all`] returns only once all of
//! that work has finished, successfully or not, so the publisher never sees a
//! half-written day.
//!
//! Failures stay local: a failed extraction skips its category, a failed
//! article is counted and skipped. Each task hands back a value, and the
//! values are folded into a [`RunReport`].

use crate::api::Clean;
use crate::models::{Category, CategoryReport, ExtractionStatus, RunReport, StoreKey};
use crate::pipeline::ArticlePipeline;
use crate::scrapers::Extract;
use crate::store::ObjectStore;
use chrono::NaiveDate;
use futures::future::join_all;
use tracing::{error, info, instrument, warn};

pub struct Coordinator<'a, E, C, S> {
    extractor: &'a E,
    pipeline: ArticlePipeline<'a, C, S>,
}

impl<'a, E: Extract, C: Clean, S: ObjectStore> Coordinator<'a, E, C, S> {
    pub fn new(extractor: &'a E, pipeline: ArticlePipeline<'a, C, S>) -> Self {
        Self {
            extractor,
            pipeline,
        }
    }

    /// Process every category for `date` concurrently.
    ///
    /// # Arguments
    ///
    /// * `categories` - Sections to extract, one task each
    /// * `date` - The day the stored keys are written under
    ///
    /// # Returns
    ///
    /// One [`CategoryReport`] per category, in input order. The call only
    /// returns after every category and article task has finished.
    #[instrument(level = "info", skip_all, fields(%date, categories = categories.len()))]
    pub async fn run_all(&self, categories: &[Category], date: NaiveDate) -> RunReport {
        let reports = join_all(
            categories
                .iter()
                .map(|category| self.run_category(category, date)),
        )
        .await;

        RunReport {
            categories: reports,
        }
    }

    #[instrument(level = "info", skip_all, fields(category = %category.label))]
    async fn run_category(&self, category: &Category, date: NaiveDate) -> CategoryReport {
        info!(source = %category.source_url, "Processing category");

        let articles = match self.extractor.extract(&category.source_url).await {
            Ok(articles) => articles,
            Err(e) => {
                error!(error = %e, "Extraction failed; skipping category");
                return CategoryReport::skipped(&category.label, e.to_string());
            }
        };

        let extraction = if articles.is_empty() {
            ExtractionStatus::Empty
        } else {
            ExtractionStatus::Extracted(articles.len())
        };

        let outcomes = join_all(articles.into_iter().enumerate().map(|(index, article)| {
            let key = StoreKey::new(date, category.label.as_str(), index);
            self.pipeline.process(article, key)
        }))
        .await;

        let failed_keys: Vec<String> = outcomes
            .iter()
            .filter(|o| o.stored.is_err())
            .map(|o| o.key.to_string())
            .collect();
        if !failed_keys.is_empty() {
            warn!(failed = ?failed_keys, "Some articles were not stored");
        }
        let stored = outcomes.len() - failed_keys.len();
        let report = CategoryReport {
            label: category.label.clone(),
            extraction,
            stored,
            failed: failed_keys.len(),
            uncleaned_fields: outcomes
                .iter()
                .map(|o| o.transform.uncleaned_fields())
                .sum(),
        };
        info!(
            stored = report.stored,
            failed = report.failed,
            uncleaned_fields = report.uncleaned_fields,
            "Category complete"
        );
        report
    }
}
