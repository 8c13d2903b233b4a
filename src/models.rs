//! Data models for articles, stored objects and per-run reporting.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Article`]: an article as returned by the extraction service
//! - [`Category`]: a section label and the page it is crawled from
//! - [`StoreKey`] / [`StoredObject`]: the object-store layout for rendered Markdown
//! - [`CommitTreeEntry`]: one file of the day's publish commit
//! - [`RunReport`]: the aggregate outcome of a fan-out run
//!
//! Key layout in the object store is `news/{date}/{date}_{category}_{index}.md`,
//! and the same file lands at `{date}/{date}_{category}_{index}.md` in the
//! destination repository.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Root prefix of every object written by the pipeline.
pub const STORE_ROOT: &str = "news";

/// A news article as returned by the extraction service.
///
/// `content` and `date` are replaced in place by the transformer once the
/// cleaning service has normalised them. `title` is never rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Article {
    /// The article headline.
    pub title: String,
    /// The article body text.
    pub content: String,
    /// The publication date/time text as scraped from the page.
    pub date: String,
}

/// A news section: an opaque label plus the page it is crawled from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub label: String,
    pub source_url: String,
}

impl Category {
    pub fn new(label: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            source_url: source_url.into(),
        }
    }
}

/// Deterministic object-store key for one rendered article.
///
/// Re-running the pipeline for the same day, category and index produces the
/// same key, so a retry overwrites rather than duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub date: NaiveDate,
    pub category: String,
    pub index: usize,
}

impl StoreKey {
    pub fn new(date: NaiveDate, category: impl Into<String>, index: usize) -> Self {
        Self {
            date,
            category: category.into(),
            index,
        }
    }

    /// The `news/{date}/` prefix under which every object of `date` lives.
    pub fn day_prefix(date: NaiveDate) -> String {
        format!("{STORE_ROOT}/{}/", date.format("%Y-%m-%d"))
    }

    /// `{category}_{index}`, the value the upload stage receives as a header.
    pub fn category_tag(&self) -> String {
        format!("{}_{}", self.category, self.index)
    }

    /// File name of the object, shared by the store key and the repository path.
    pub fn file_name(&self) -> String {
        format!("{}_{}.md", self.date.format("%Y-%m-%d"), self.category_tag())
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::day_prefix(self.date), self.file_name())
    }
}

/// One object as listed and downloaded from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
}

/// Git file mode for a regular, non-executable blob.
pub const BLOB_MODE: &str = "100644";

/// A file to be layered onto the base tree of the publish commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitTreeEntry {
    /// Path inside the repository, e.g. `2025-01-04/2025-01-04_it_0.md`.
    pub path: String,
    pub content: Vec<u8>,
}

impl CommitTreeEntry {
    /// Re-root a stored object under `{date}/` in the repository.
    ///
    /// Nested keys keep their sub-path, so `news/{date}/sub/file.md` lands at
    /// `{date}/sub/file.md`. Returns `None` when the key is outside the
    /// `news/{date}/` prefix, or when the remainder has an empty, `.` or `..`
    /// segment and so cannot be a repository path.
    pub fn from_stored(object: StoredObject, date: NaiveDate) -> Option<Self> {
        let prefix = StoreKey::day_prefix(date);
        let rest = object.key.strip_prefix(&prefix)?;
        if rest
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return None;
        }
        Some(Self {
            path: format!("{}/{}", date.format("%Y-%m-%d"), rest),
            content: object.bytes,
        })
    }
}

/// How a category's extraction call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStatus {
    /// The service returned at least one article.
    Extracted(usize),
    /// The service answered successfully with an empty list.
    Empty,
    /// The call failed; the category was skipped.
    Failed(String),
}

/// Outcome of one category's fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryReport {
    pub label: String,
    pub extraction: ExtractionStatus,
    /// Articles rendered and written to the store.
    pub stored: usize,
    /// Articles whose store write failed.
    pub failed: usize,
    /// Fields left uncleaned because a cleaning sub-pipeline failed.
    pub uncleaned_fields: usize,
}

impl CategoryReport {
    pub fn skipped(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            extraction: ExtractionStatus::Failed(reason.into()),
            stored: 0,
            failed: 0,
            uncleaned_fields: 0,
        }
    }
}

/// Aggregate outcome of a fan-out run, one entry per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub categories: Vec<CategoryReport>,
}

impl RunReport {
    pub fn stored(&self) -> usize {
        self.categories.iter().map(|c| c.stored).sum()
    }

    pub fn failed_articles(&self) -> usize {
        self.categories.iter().map(|c| c.failed).sum()
    }

    pub fn failed_categories(&self) -> usize {
        self.categories
            .iter()
            .filter(|c| matches!(c.extraction, ExtractionStatus::Failed(_)))
            .count()
    }

    pub fn uncleaned_fields(&self) -> usize {
        self.categories.iter().map(|c| c.uncleaned_fields).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 4).unwrap()
    }

    #[test]
    fn test_store_key_layout() {
        let key = StoreKey::new(day(), "politics", 3);
        assert_eq!(key.to_string(), "news/2025-01-04/2025-01-04_politics_3.md");
        assert_eq!(key.category_tag(), "politics_3");
        assert_eq!(StoreKey::day_prefix(day()), "news/2025-01-04/");
    }

    #[test]
    fn test_article_deserialization() {
        let json = r#"[{"title": "t", "content": "c", "date": "d"}]"#;
        let articles: Vec<Article> = serde_json::from_str(json).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "t");
        assert_eq!(articles[0].date, "d");
    }

    #[test]
    fn test_commit_entry_rerooted_under_date() {
        let object = StoredObject {
            key: "news/2025-01-04/2025-01-04_it_0.md".to_string(),
            bytes: b"# hi".to_vec(),
        };
        let entry = CommitTreeEntry::from_stored(object, day()).unwrap();
        assert_eq!(entry.path, "2025-01-04/2025-01-04_it_0.md");
        assert_eq!(entry.content, b"# hi");
    }

    #[test]
    fn test_commit_entry_keeps_nested_paths() {
        let nested = StoredObject {
            key: "news/2025-01-04/sub/file.md".to_string(),
            bytes: b"nested".to_vec(),
        };
        let entry = CommitTreeEntry::from_stored(nested, day()).unwrap();
        assert_eq!(entry.path, "2025-01-04/sub/file.md");
        assert_eq!(entry.content, b"nested");
    }

    #[test]
    fn test_commit_entry_rejects_foreign_keys() {
        let other_day = StoredObject {
            key: "news/2025-01-05/2025-01-05_it_0.md".to_string(),
            bytes: vec![],
        };
        assert!(CommitTreeEntry::from_stored(other_day, day()).is_none());

        for key in [
            "news/2025-01-04/",
            "news/2025-01-04/../escape.md",
            "news/2025-01-04/sub//file.md",
            "news/2025-01-04/./file.md",
        ] {
            let object = StoredObject {
                key: key.to_string(),
                bytes: vec![],
            };
            assert!(CommitTreeEntry::from_stored(object, day()).is_none(), "{key}");
        }
    }

    #[test]
    fn test_run_report_totals() {
        let report = RunReport {
            categories: vec![
                CategoryReport {
                    label: "a".into(),
                    extraction: ExtractionStatus::Extracted(3),
                    stored: 2,
                    failed: 1,
                    uncleaned_fields: 1,
                },
                CategoryReport::skipped("b", "status 500"),
            ],
        };
        assert_eq!(report.stored(), 2);
        assert_eq!(report.failed_articles(), 1);
        assert_eq!(report.failed_categories(), 1);
        assert_eq!(report.uncleaned_fields(), 1);
    }
}
