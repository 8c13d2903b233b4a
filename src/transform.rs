//! Article cleaning through the text-cleaning service.
//!
//! Two sub-pipelines run concurrently and are joined before returning:
//!
//! - **content**: three cleaning calls, one per configured prompt. What each
//!   call receives is decided by [`CleaningChain`].
//! - **date**: one call with [`DATE_PROMPT`], collapsing repeated date stamps
//!   into a single `yyyy년 mm월 dd일 hh시 mm분` value.
//!
//! A field is only replaced once its whole sub-pipeline has succeeded, and it
//! takes the service's answer verbatim. A failed call leaves the field exactly
//! as extracted; the transformer itself never fails.

use crate::api::Clean;
use crate::config::CleaningChain;
use crate::error::ServiceError;
use crate::models::Article;
use tracing::{debug, instrument, warn};

/// Instruction for the date sub-pipeline.
pub const DATE_PROMPT: &str = "다음 텍스트에서 날짜가 여러개 있으면 앞에 것만 선택해서 한 날짜만 남게 해주고, 'yyyy년 mm월 dd일 hh시 mm분' 포맷으로 수정해주세요. 예를 들어 '2025년 01월 04일 오후 3시 25분2025년 01월 04일 오후 4시 08분' 이런식으로 있다면 '2025년 01월 04일 오후 3시 25분'만 남게 해주세요.";

/// Which fields made it through cleaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub content_cleaned: bool,
    pub date_cleaned: bool,
}

impl TransformReport {
    pub fn uncleaned_fields(&self) -> usize {
        usize::from(!self.content_cleaned) + usize::from(!self.date_cleaned)
    }
}

#[derive(Debug)]
pub struct Transformer<'a, C> {
    cleaner: &'a C,
    prompts: &'a [String; 3],
    chain: CleaningChain,
}

impl<'a, C: Clean> Transformer<'a, C> {
    pub fn new(cleaner: &'a C, prompts: &'a [String; 3], chain: CleaningChain) -> Self {
        Self {
            cleaner,
            prompts,
            chain,
        }
    }

    /// Clean `article` in place and report which fields were replaced.
    #[instrument(level = "debug", skip_all, fields(title = %article.title))]
    pub async fn transform(&self, article: &mut Article) -> TransformReport {
        let (content, date) = futures::join!(
            self.clean_content(&article.content),
            self.cleaner.clean(&article.date, DATE_PROMPT),
        );

        let mut report = TransformReport::default();
        match content {
            Ok(cleaned) => {
                article.content = cleaned;
                report.content_cleaned = true;
            }
            Err(e) => warn!(error = %e, "Content cleaning failed; keeping extracted content"),
        }
        match date {
            Ok(cleaned) => {
                article.date = cleaned;
                report.date_cleaned = true;
            }
            Err(e) => warn!(error = %e, "Date cleaning failed; keeping extracted date"),
        }
        debug!(?report, "Transformed article");
        report
    }

    async fn clean_content(&self, original: &str) -> Result<String, ServiceError> {
        let mut current: Option<String> = None;
        for (stage, prompt) in self.prompts.iter().enumerate() {
            let input = match (self.chain, current.as_deref()) {
                (CleaningChain::Chained, Some(previous)) => previous,
                _ => original,
            };
            let cleaned = self
                .cleaner
                .clean(input, prompt)
                .await
                .inspect_err(|_| debug!(stage = stage + 1, "Content stage failed"))?;
            current = Some(cleaned);
        }
        Ok(current.unwrap_or_else(|| original.to_string()))
    }
}
