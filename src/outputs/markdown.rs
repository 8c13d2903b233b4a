//! Markdown rendering for a single article.
//!
//! The layout is fixed: a title heading, the content block and the date
//! block, separated by blank lines.
//!
//! ```text
//! # **제목: {title}**
//!
//!   내용: {content}
//!
//!   **날짜: {date}**
//! ```
//!
//! Rendering never fails. Empty fields still produce a document, visibly
//! incomplete, and the caller decides whether to store it.

use crate::models::Article;

/// Render `article` to its canonical Markdown bytes.
pub fn article_to_markdown(article: &Article) -> Vec<u8> {
    let title = format!("# **제목: {}**", article.title);
    let content = format!("내용: {}", article.content);
    let date = format!("**날짜: {}**", article.date);

    format!("{title}\n\n  {content}\n\n  {date}").into_bytes()
}
