//! Provider-facing types shared by every inference backend.

use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::{VerdictError, VerdictResult};
use crate::processing::PreparedImage;
use crate::verdict::{PartialVerdict, Verdict};

pub const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";

/// Where requests go and how long the transport may take.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Whole-request timeout. `None` leaves it to the transport.
    pub request_timeout: Option<Duration>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: None,
        }
    }
}

impl ProviderConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// `{base}/{path}` without doubling the slash.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

/// Everything one inference call needs.
#[derive(Debug, Clone)]
pub struct JudgeRequest {
    pub api_key: String,
    pub model: String,
    pub persona_prompt: String,
    pub image: PreparedImage,
}

/// Snapshots of the result as it streams in. Ends when the transport closes.
pub type PartialStream = Pin<Box<dyn Stream<Item = VerdictResult<PartialVerdict>> + Send>>;

/// Checks that must pass before any file is read or request is sent.
///
/// Reported in a fixed order: file, then key, then model.
pub fn check_preconditions<'a>(
    file: Option<&'a Path>,
    api_key: &str,
    model: &str,
) -> VerdictResult<&'a Path> {
    let Some(file) = file else {
        return Err(VerdictError::precondition("No file selected"));
    };
    if api_key.trim().is_empty() {
        return Err(VerdictError::precondition("API key is missing")
            .with_recovery_suggestion("Set one with `sop settings set --api-key <KEY>`"));
    }
    if model.trim().is_empty() {
        return Err(VerdictError::precondition("Model is missing")
            .with_recovery_suggestion("Pick one from `sop models` and save it with `sop settings set --model <ID>`"));
    }
    Ok(file)
}

/// A multimodal model that can judge an image against the verdict schema.
#[async_trait]
pub trait VerdictProvider: Send + Sync {
    /// One request, one fully parsed result.
    async fn judge(&self, request: &JudgeRequest) -> VerdictResult<Verdict>;

    /// One request, streamed as partial snapshots.
    async fn judge_stream(&self, request: &JudgeRequest) -> VerdictResult<PartialStream>;

    fn name(&self) -> &str {
        "provider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_precondition_order() {
        let file = PathBuf::from("cat.jpg");
        let err = check_preconditions(None, "", "").unwrap_err();
        assert_eq!(err.to_string(), "No file selected");

        let err = check_preconditions(Some(&file), "", "").unwrap_err();
        assert_eq!(err.to_string(), "API key is missing");

        let err = check_preconditions(Some(&file), "xai-test", " ").unwrap_err();
        assert_eq!(err.to_string(), "Model is missing");
        assert!(err.is_precondition());

        assert_eq!(check_preconditions(Some(&file), "xai-test", "grok-4").unwrap(), file.as_path());
    }

    #[test]
    fn test_endpoint_join() {
        assert_eq!(
            ProviderConfig::default().endpoint("chat/completions"),
            "https://api.x.ai/v1/chat/completions"
        );
        assert_eq!(
            ProviderConfig::with_base_url("http://127.0.0.1:9/v1/").endpoint("/models"),
            "http://127.0.0.1:9/v1/models"
        );
    }
}
