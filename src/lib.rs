//! # Smash or Pass
//!
//! Upload an image, have a hosted multimodal model judge it, and stream back a
//! structured verdict: `smash` or `pass`, a 1-10 rating, and an explanation.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `storage`: File-per-key local record store
//! - `config`: Persisted user settings and generation configuration
//! - `personas`: Judge personas (system prompts)
//! - `processing`: Image preprocessing (decode, downscale, JPEG encode)
//! - `verdict`: Result types, response schema, incremental decoding
//! - `client`: Inference client and model directory
//! - `presenter`: Result panel state machine with last-request-wins
//! - `session`: End-to-end generation orchestration
//! - `onboarding`: First-run flags
//!
//! ## Features
//!
//! - **Never upscales**: uploads fit a 1500x1500 box by default
//! - **Streaming**: partial verdicts render field by field as tokens arrive
//! - **Supersession**: a newer request always wins the display
//! - **Async/await**: built on Tokio, CPU work runs on the blocking pool
//!
//! ## Example
//!
//! ```rust,no_run
//! use smash_or_pass::config::{JudgeConfig, Settings};
//! use smash_or_pass::judge_image;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings {
//!     api_key: "xai-...".to_string(),
//!     model: "grok-4".to_string(),
//!     judge: "default".to_string(),
//! };
//!
//! let verdict = judge_image("photo.jpg", &settings, JudgeConfig::default()).await?;
//! println!("{}", verdict.headline());
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

pub mod client;
pub mod config;
pub mod error;
pub mod onboarding;
pub mod personas;
pub mod presenter;
pub mod processing;
pub mod session;
pub mod storage;
pub mod verdict;

/// Re-export error types for convenience
pub use error::{HasRecoverySuggestion, VerdictError, VerdictResult};

pub use client::{ModelDirectory, ModelEntry, XaiClient};
pub use config::{JudgeConfig, Settings, SettingsStore};
pub use presenter::{ResultPresenter, View};
pub use session::{GenerationMode, JudgeSession};
pub use verdict::{PartialVerdict, Rating, Verdict, VerdictKind};

/// Judge one image with the xAI provider and return the final verdict.
///
/// Builds an [`XaiClient`] from `config.provider` and runs a single
/// [`JudgeSession`] generation, so preconditions, preprocessing and the
/// selected [`GenerationMode`] all apply.
///
/// # Errors
///
/// Returns an error if:
/// - `settings` has no API key or model (nothing is sent)
/// - the file cannot be read or decoded
/// - the provider rejects the request or returns no complete verdict
pub async fn judge_image(
    path: impl AsRef<Path>,
    settings: &Settings,
    config: JudgeConfig,
) -> VerdictResult<Verdict> {
    let client = XaiClient::new(config.provider.clone())?;
    let session = JudgeSession::builder()
        .with_provider(Arc::new(client))
        .with_settings(settings.clone())
        .with_config(config)
        .build()?;
    session
        .generate(Some(path.as_ref().to_path_buf()))
        .await
        .result
}
