//! Article discovery for news sections.
//!
//! Scraping itself happens in a separate extraction service: given a section
//! page URL it returns the section's headline articles, already parsed into
//! [`Article`]s. This module defines the [`Extract`] seam the coordinator
//! drives, and [`remote`] implements it over HTTP.
//!
//! An empty article list is a valid answer and means the section had nothing
//! to publish. Any failure makes the whole category fail.

pub mod remote;

use crate::error::ServiceError;
use crate::models::Article;

/// Async access to a section extraction backend.
pub trait Extract {
    /// Fetch every article currently headlined on `source_url`.
    async fn extract(&self, source_url: &str) -> Result<Vec<Article>, ServiceError>;
}
