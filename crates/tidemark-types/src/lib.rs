//! Shared types for the Tidemark conversion gateway.
//!
//! Everything that crosses a crate boundary lives here: request options,
//! fetched payload variants, the extracted view, the conversion result with
//! its quality score, the async job model, and the error taxonomy.

pub mod error;
pub mod extracted;
pub mod job;
pub mod options;
pub mod payload;
pub mod result;

pub use error::{ConvertError, Result};
pub use extracted::ExtractedView;
pub use job::{Job, JobStatus};
pub use options::{ConvertOptions, Links, Mode};
pub use payload::{DocumentFormat, FetchedPayload};
pub use result::{ConversionResult, Grade, Quality};
