//! # Client Module
//!
//! Talking to the hosted model: the provider trait, the xAI implementation,
//! SSE framing and the model directory.

pub mod models;
pub mod provider;
pub mod sse;
pub mod xai;

pub use models::{ModelDirectory, ModelEntry, ModelLister};
pub use provider::{
    DEFAULT_BASE_URL, JudgeRequest, PartialStream, ProviderConfig, VerdictProvider,
    check_preconditions,
};
pub use xai::XaiClient;
