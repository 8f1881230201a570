//! The Markdown pipeline: DOM→Markdown conversion, cleanup, citation
//! transform, prune-to-fit, token counting, and quality scoring.
//!
//! Everything here is pure string/DOM work; no I/O. The orchestrator feeds
//! extracted HTML through [`convert::html_to_markdown`], then applies the
//! post-processing passes in a fixed order.

pub mod citations;
pub mod cleanup;
pub mod convert;
pub mod llm_clean;
pub mod patterns;
pub mod prune;
pub mod quality;
pub mod tokens;

pub use citations::to_citations;
pub use cleanup::{clean_markdown, resolve_urls};
pub use convert::html_to_markdown;
pub use llm_clean::clean_llm_output;
pub use prune::prune_markdown;
pub use quality::score;
pub use tokens::count_tokens;
