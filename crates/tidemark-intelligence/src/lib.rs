//! LLM and BaaS escalation providers.
//!
//! The LLM side covers hardened content extraction and schema-driven
//! structured extraction over an OpenAI-compatible wire. The BaaS side is an
//! ordered chain of browser-as-a-service providers used against anti-bot
//! walls; quota errors fall through to the next provider.

pub mod baas;
pub mod extraction;
pub mod provider;
pub mod schema;

pub use baas::{BaasChain, BaasConfig, BaasResult};
pub use extraction::extract_content;
pub use provider::{LlmClient, LlmConfig};
pub use schema::{extract_with_schema, is_empty_extraction, validate_schema, SchemaExtraction};
