//! # Configuration Module
//!
//! User settings (persisted) and generation configuration (per invocation).

pub mod judge;
pub mod settings;

pub use judge::JudgeConfig;
pub use settings::{Settings, SettingsForm, SettingsPatch, SettingsStore};
