//! Atomic publish of one day's objects as a single commit.
//!
//! The day's batch is everything under `news/{date}/` in the object store.
//! All of it is downloaded before the repository is touched, layered onto the
//! head tree in one new tree, and made visible by one non-forced ref update.
//! Any failure before that update leaves the branch where it was.

use crate::error::{PublishError, ServiceError};
use crate::github::{RefUpdate, VersionControl};
use crate::models::{CommitTreeEntry, StoreKey, StoredObject};
use crate::store::{ObjectStore, list_all};
use chrono::NaiveDate;
use futures::{StreamExt, TryStreamExt, stream};
use itertools::Itertools;
use tracing::{debug, info, instrument, warn};

/// Concurrent downloads while assembling the batch.
const DOWNLOAD_CONCURRENCY: usize = 8;

/// Commit message for the day's publish commit.
pub fn commit_message(date: NaiveDate) -> String {
    format!("Add: 오늘의 기사 추가({})", date.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Nothing was stored for the day; the branch was not touched.
    NoChanges,
    /// The branch now points at `commit`, which adds `files`.
    Committed { commit: String, files: Vec<String> },
}

pub struct Publisher<'a, S, V> {
    store: &'a S,
    repo: &'a V,
    conflict_retries: usize,
}

impl<'a, S: ObjectStore, V: VersionControl> Publisher<'a, S, V> {
    pub fn new(store: &'a S, repo: &'a V, conflict_retries: usize) -> Self {
        Self {
            store,
            repo,
            conflict_retries,
        }
    }

    /// Publish every object stored for `date` in one commit.
    ///
    /// # Arguments
    ///
    /// * `date` - The day whose `news/{date}/` objects are published.
    ///
    /// # Returns
    ///
    /// [`PublishOutcome::Committed`] once the branch points at the new
    /// commit, or [`PublishOutcome::NoChanges`] when the day has no objects.
    ///
    /// # Errors
    ///
    /// Listing, download and git-data failures abort before the ref update.
    /// [`PublishError::RefConflict`] means the branch moved under us, on every
    /// attempt allowed by `conflict_retries`. [`PublishError::RefUpdate`]
    /// means the update call failed after the commit was created.
    #[instrument(level = "info", skip(self), fields(branch = %self.repo.branch()))]
    pub async fn publish_day(&self, date: NaiveDate) -> Result<PublishOutcome, PublishError> {
        let entries = self.collect_batch(date).await?;
        if entries.is_empty() {
            info!("No objects stored for the day; nothing to publish");
            return Ok(PublishOutcome::NoChanges);
        }

        let message = commit_message(date);
        let mut attempt = 0usize;
        loop {
            let commit = self.commit_batch(&entries, &message).await?;
            match self.repo.update_ref(&commit).await {
                Ok(RefUpdate::Updated) => {
                    let files: Vec<String> = entries.iter().map(|e| e.path.clone()).collect();
                    info!(%commit, files = files.len(), "Branch updated");
                    return Ok(PublishOutcome::Committed { commit, files });
                }
                Ok(RefUpdate::NotFastForward) if attempt < self.conflict_retries => {
                    attempt += 1;
                    warn!(
                        %commit,
                        attempt,
                        max = self.conflict_retries,
                        "Branch moved during publish; rebuilding on the new head"
                    );
                }
                Ok(RefUpdate::NotFastForward) => {
                    return Err(PublishError::RefConflict {
                        branch: self.repo.branch().to_string(),
                        commit,
                    });
                }
                Err(source) => {
                    return Err(PublishError::RefUpdate {
                        branch: self.repo.branch().to_string(),
                        commit,
                        source,
                    });
                }
            }
        }
    }

    /// List, download and map the day's objects to sorted tree entries.
    async fn collect_batch(&self, date: NaiveDate) -> Result<Vec<CommitTreeEntry>, PublishError> {
        let prefix = StoreKey::day_prefix(date);
        let listed = list_all(self.store, &prefix)
            .await
            .map_err(|source| PublishError::List {
                prefix: prefix.clone(),
                source,
            })?;
        let keys: Vec<String> = listed.into_iter().unique().collect();
        debug!(count = keys.len(), %prefix, "Listed day batch");

        let objects: Vec<StoredObject> = stream::iter(keys)
            .map(|key| async move {
                match self.store.get(&key).await {
                    Ok(bytes) => Ok(StoredObject { key, bytes }),
                    Err(source) => Err(PublishError::Download { key, source }),
                }
            })
            .buffered(DOWNLOAD_CONCURRENCY)
            .try_collect()
            .await?;

        let mut entries = objects
            .into_iter()
            .map(|object| {
                let key = object.key.clone();
                CommitTreeEntry::from_stored(object, date).ok_or(PublishError::ForeignKey(key))
            })
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Build a tree and commit on the current head; returns the commit SHA.
    async fn commit_batch(
        &self,
        entries: &[CommitTreeEntry],
        message: &str,
    ) -> Result<String, PublishError> {
        let head = self.repo.head().await.map_err(vcs("head"))?;
        let base = self.repo.tree(&head).await.map_err(vcs("tree"))?;
        if base.truncated {
            warn!(tree = %base.sha, "Recursive tree listing was truncated");
        }
        let replaced = entries
            .iter()
            .filter(|entry| base.contains_path(&entry.path))
            .count();
        debug!(%head, base_tree = %base.sha, replaced, "Fetched head tree");

        let tree = self
            .repo
            .create_tree(&base.sha, entries)
            .await
            .map_err(vcs("create_tree"))?;
        let commit = self
            .repo
            .create_commit(message, &tree, &head)
            .await
            .map_err(vcs("create_commit"))?;
        debug!(%tree, %commit, parent = %head, "Created commit");
        Ok(commit)
    }
}

fn vcs(step: &'static str) -> impl FnOnce(ServiceError) -> PublishError {
    move |source| PublishError::VersionControl { step, source }
}
