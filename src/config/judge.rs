//! # Generation Configuration
//!
//! Everything about a generation that is not a user setting: how the upload is
//! preprocessed, which provider endpoint is called, and whether the result is
//! streamed.
//!
//! | Parameter | Default | Range |
//! |-----------|---------|-------|
//! | `preprocess.max_width` | 1500 | > 0 |
//! | `preprocess.max_height` | 1500 | > 0 |
//! | `preprocess.quality` | 0.8 | (0, 1] |
//! | `mode` | streaming | streaming / one-shot |
//! | `provider.base_url` | `https://api.x.ai/v1` | http(s) URL |
//!
//! ```rust
//! use smash_or_pass::config::JudgeConfig;
//!
//! let mut config = JudgeConfig::default();
//! assert!(config.validate().is_ok());
//!
//! config.preprocess.quality = 0.0;
//! assert!(config.validate().is_err());
//! ```

use crate::client::ProviderConfig;
use crate::processing::PreprocessOptions;
use crate::session::GenerationMode;

#[derive(Debug, Clone, Default)]
pub struct JudgeConfig {
    pub preprocess: PreprocessOptions,
    pub mode: GenerationMode,
    pub provider: ProviderConfig,
}

impl JudgeConfig {
    pub fn new(
        preprocess: PreprocessOptions,
        mode: GenerationMode,
        provider: ProviderConfig,
    ) -> Self {
        Self {
            preprocess,
            mode,
            provider,
        }
    }

    /// Validates every section, reporting the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.preprocess.validate()?;
        let url = self.provider.base_url.as_str();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(format!("API base must be an http(s) URL, got '{url}'"));
        }
        Ok(())
    }
}
