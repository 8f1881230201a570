//! Async jobs, webhook delivery, and the batch executor.

pub mod batch;
pub mod jobs;
pub mod webhook;

pub use batch::{run_batch, BatchOutcome};
pub use jobs::JobStore;
pub use webhook::{WebhookConfig, WebhookDeliverer};
