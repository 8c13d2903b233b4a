//! Output generation for processed articles.
//!
//! # Submodules
//!
//! - [`markdown`]: renders one [`crate::models::Article`] into the canonical
//!   Markdown document that is stored and later published
//!
//! # Output Structure
//!
//! ```text
//! news/
//! └── 2025-01-04/
//!     ├── 2025-01-04_economy_0.md
//!     ├── 2025-01-04_economy_1.md
//!     └── 2025-01-04_politics_0.md
//! ```

pub mod markdown;
