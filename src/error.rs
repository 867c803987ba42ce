//! # Error Handling
//!
//! Every failure in the generation pipeline is a [`VerdictError`]. Errors fall into
//! three groups that the presenter treats differently:
//!
//! - **Precondition**: missing file, API key, or model. Raised before any I/O or
//!   network call and shown verbatim.
//! - **Decode**: the selected file could not be read as an image. Shown as a
//!   generic failure message.
//! - **Transport / provider**: network failures, non-success HTTP statuses and
//!   malformed model output. Shown with the provider's own message when one exists,
//!   otherwise with [`GENERIC_FAILURE`].
//!
//! No error is fatal: every variant leaves the presenter re-triggerable, and the
//! only recovery path is an explicit regenerate.
//!
//! ## Usage
//!
//! ```rust
//! use smash_or_pass::error::{VerdictError, HasRecoverySuggestion};
//!
//! let error = VerdictError::precondition("API key is missing")
//!     .with_recovery_suggestion("Run `sop settings set --api-key <KEY>`");
//!
//! assert!(error.is_precondition());
//! assert_eq!(error.user_message(), "API key is missing");
//! assert!(error.recovery_suggestion().is_some());
//! ```

use std::{error::Error as StdError, time::SystemTime};

use thiserror::Error;

/// Fallback text when neither the provider nor the error itself has anything useful to say.
pub const GENERIC_FAILURE: &str = "Unknown error occurred while processing the image.";

/// Shown for images that cannot be decoded.
pub const DECODE_FAILURE: &str = "The selected file could not be read as an image.";

/// Metadata about when and where an error occurred.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Suggested recovery action
    pub recovery_suggestion: Option<String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            recovery_suggestion: None,
        }
    }
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Base error type for the library.
#[derive(Debug, Error)]
pub enum VerdictError {
    /// A required input is missing; raised before any side effect
    #[error("{reason}")]
    Precondition {
        reason: String,
        context: ErrorContext,
    },
    /// An input value is out of range or malformed
    #[error("Validation failed for '{field}': {constraint} (value: {value})")]
    Validation {
        field: String,
        constraint: String,
        value: String,
        context: ErrorContext,
    },
    /// The image bytes could not be decoded
    #[error("Image decode failed: {reason}")]
    Decode {
        reason: String,
        context: ErrorContext,
    },
    /// Resize or re-encode failed after a successful decode
    #[error("Processing failed during {operation}: {reason}")]
    Processing {
        operation: String,
        reason: String,
        context: ErrorContext,
    },
    /// The request never produced an HTTP response, or the body stream broke
    #[error("Network error during {operation}: {source}")]
    Network {
        operation: String,
        source: Box<dyn StdError + Send + Sync>,
        context: ErrorContext,
    },
    /// The provider answered with a non-success status
    #[error("Provider returned {status}: {}", .message.as_deref().unwrap_or("no details"))]
    Provider {
        status: u16,
        message: Option<String>,
        context: ErrorContext,
    },
    /// The provider answered, but not with an object matching the schema
    #[error("Malformed model response: {reason}")]
    MalformedResponse {
        reason: String,
        context: ErrorContext,
    },
    /// Reading or writing a local record failed
    #[error("Storage error during {operation}{}: {source}", .path.as_deref().map(|p| format!(" on '{p}'")).unwrap_or_default())]
    Storage {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// JSON (de)serialization failed
    #[error("Serialization error: {source}")]
    Serde {
        source: serde_json::Error,
        context: ErrorContext,
    },
    /// An operation was attempted from a state that does not allow it
    #[error("Cannot {attempted_operation} while {current_state}: {reason}")]
    State {
        current_state: String,
        attempted_operation: String,
        reason: String,
        context: ErrorContext,
    },
}

impl VerdictError {
    /// Create a precondition error; its reason is shown to the user verbatim.
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::Precondition {
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a validation error
    pub fn validation(
        field: impl Into<String>,
        constraint: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            constraint: constraint.into(),
            value: value.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a decode error
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a processing error
    pub fn processing(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Processing {
            operation: operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a network error
    pub fn network(
        operation: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            operation: operation.into(),
            source: Box::new(source),
            context: ErrorContext::new(),
        }
    }

    /// Create a provider error
    pub fn provider(status: u16, message: Option<String>) -> Self {
        Self::Provider {
            status,
            message,
            context: ErrorContext::new(),
        }
    }

    /// Create a malformed-response error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a storage error
    pub fn storage(
        operation: impl Into<String>,
        path: Option<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Storage {
            operation: operation.into(),
            path,
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create a state error
    pub fn state(
        current_state: impl Into<String>,
        attempted_operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::State {
            current_state: current_state.into(),
            attempted_operation: attempted_operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Add operation context
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Add recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Precondition { context, .. } => context,
            Self::Validation { context, .. } => context,
            Self::Decode { context, .. } => context,
            Self::Processing { context, .. } => context,
            Self::Network { context, .. } => context,
            Self::Provider { context, .. } => context,
            Self::MalformedResponse { context, .. } => context,
            Self::Storage { context, .. } => context,
            Self::Serde { context, .. } => context,
            Self::State { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Precondition { context, .. } => context,
            Self::Validation { context, .. } => context,
            Self::Decode { context, .. } => context,
            Self::Processing { context, .. } => context,
            Self::Network { context, .. } => context,
            Self::Provider { context, .. } => context,
            Self::MalformedResponse { context, .. } => context,
            Self::Storage { context, .. } => context,
            Self::Serde { context, .. } => context,
            Self::State { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Precondition { .. } => "precondition",
            Self::Validation { .. } => "validation",
            Self::Decode { .. } => "decode",
            Self::Processing { .. } => "processing",
            Self::Network { .. } => "network",
            Self::Provider { .. } => "provider",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::Storage { .. } => "storage",
            Self::Serde { .. } => "serde",
            Self::State { .. } => "state",
        }
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition { .. })
    }

    /// The text the presenter shows for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Precondition { reason, .. } => reason.clone(),
            Self::Decode { .. } => DECODE_FAILURE.to_string(),
            Self::Provider {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            Self::Provider { .. }
            | Self::Network { .. }
            | Self::MalformedResponse { .. }
            | Self::Processing { .. }
            | Self::Serde { .. } => GENERIC_FAILURE.to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type alias using our custom error type
pub type VerdictResult<T> = Result<T, VerdictError>;

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    /// Get recovery suggestion for this error
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for VerdictError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// 401/403 from the provider, usually a bad key.
    pub fn is_auth_failure(error: &VerdictError) -> bool {
        matches!(error, VerdictError::Provider { status: 401 | 403, .. })
    }
}

impl From<serde_json::Error> for VerdictError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serde {
            source: error,
            context: ErrorContext::new(),
        }
    }
}

impl From<image::ImageError> for VerdictError {
    fn from(error: image::ImageError) -> Self {
        match error {
            image::ImageError::Decoding(_) | image::ImageError::Unsupported(_) => {
                Self::decode(error.to_string())
            }
            other => Self::processing("image codec", other.to_string()),
        }
    }
}

impl From<sop_scale::cpu::ScaleError> for VerdictError {
    fn from(error: sop_scale::cpu::ScaleError) -> Self {
        Self::processing("resize", error.to_string())
    }
}
