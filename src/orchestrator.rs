//! One daily run: fan out over categories, wait, then publish the day.
//!
//! [`run`] never fails. Everything that went wrong is in the returned
//! [`RunSummary`] and in the structured log events emitted along the way.

use crate::api::Clean;
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::error::PublishError;
use crate::github::VersionControl;
use crate::models::RunReport;
use crate::pipeline::ArticlePipeline;
use crate::publisher::{PublishOutcome, Publisher};
use crate::scrapers::Extract;
use crate::store::ObjectStore;
use crate::transform::Transformer;
use chrono::NaiveDate;
use tracing::{error, info, instrument, warn};

/// The four remote collaborators of a run.
pub struct Services<E, C, S, V> {
    pub extractor: E,
    pub cleaner: C,
    pub store: S,
    pub repo: V,
}

#[derive(Debug)]
pub struct RunSummary {
    pub date: NaiveDate,
    /// `None` for publish-only runs.
    pub report: Option<RunReport>,
    pub publish: Result<PublishOutcome, PublishError>,
}

#[instrument(level = "info", skip_all, fields(date = %config.run_date()))]
pub async fn run<E, C, S, V>(config: &Config, services: &Services<E, C, S, V>) -> RunSummary
where
    E: Extract,
    C: Clean,
    S: ObjectStore,
    V: VersionControl,
{
    let date = config.run_date();

    let report = if config.publish_only {
        info!(event_kind = "fanout.skipped", "Publish-only run; skipping fan-out");
        None
    } else {
        info!(
            event_kind = "fanout.started",
            categories = config.categories.len(),
            chain = ?config.cleaning_chain,
            "Starting category fan-out"
        );
        let transformer = Transformer::new(
            &services.cleaner,
            &config.content_prompts,
            config.cleaning_chain,
        );
        let coordinator = Coordinator::new(
            &services.extractor,
            ArticlePipeline::new(transformer, &services.store),
        );
        let report = coordinator.run_all(&config.categories, date).await;
        info!(
            event_kind = "fanout.completed",
            stored = report.stored(),
            failed_articles = report.failed_articles(),
            failed_categories = report.failed_categories(),
            uncleaned_fields = report.uncleaned_fields(),
            "Fan-out complete"
        );
        Some(report)
    };

    info!(event_kind = "publish.started", branch = %services.repo.branch(), "Publishing day");
    let publisher = Publisher::new(&services.store, &services.repo, config.conflict_retries);
    let publish = publisher.publish_day(date).await;
    match &publish {
        Ok(PublishOutcome::Committed { commit, files }) => info!(
            event_kind = "publish.completed",
            %commit,
            files = files.len(),
            "Published day"
        ),
        Ok(PublishOutcome::NoChanges) => {
            info!(event_kind = "publish.completed", files = 0, "Nothing to publish")
        }
        Err(PublishError::RefConflict { branch, commit }) => warn!(
            event_kind = "publish.failed",
            %branch,
            %commit,
            "Branch moved during publish; rerun with --publish-only to retry"
        ),
        Err(PublishError::RefUpdate {
            branch,
            commit,
            source,
        }) => error!(
            event_kind = "publish.failed",
            %branch,
            %commit,
            error = %source,
            "Branch update failed after commit was created; check the branch before rerunning"
        ),
        Err(e) => error!(event_kind = "publish.failed", error = %e, "Publish failed"),
    }

    info!(event_kind = "application.completed", "Run finished");
    RunSummary {
        date,
        report,
        publish,
    }
}
