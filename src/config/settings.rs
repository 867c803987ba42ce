//! # Settings Store
//!
//! Holds the API key, selected model and selected judge persona, persisted as a
//! single JSON record in the [`LocalStore`].
//!
//! ## Lifecycle
//!
//! 1. [`SettingsStore::load_or_default`] reads the record once at startup, falling
//!    back to defaults when it is missing or unreadable.
//! 2. [`SettingsStore::get`] is synchronous and always reflects the last successful
//!    [`SettingsStore::set`] or the record from a previous session.
//! 3. [`SettingsStore::set`] replaces all three values at once and persists them.
//!
//! The store performs no validation; [`SettingsForm`] does that before calling `set`.
//!
//! ## Record format
//!
//! ```json
//! { "apiKey": "xai-...", "model": "grok-4", "judge": "default" }
//! ```

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{VerdictError, VerdictResult};
use crate::personas;
use crate::storage::{LocalStore, SETTINGS_KEY};

/// Persisted user settings. Empty `api_key` / `model` mean "not configured yet".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub api_key: String,
    pub model: String,
    pub judge: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: String::new(),
            judge: personas::default_persona().to_string(),
        }
    }
}

impl Settings {
    /// Both the key and the model are set.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.model.is_empty()
    }

    /// API key with everything but a short prefix hidden. Keys too short to
    /// keep most of their characters hidden are masked entirely.
    pub fn masked_api_key(&self) -> String {
        const PREFIX: usize = 4;
        if self.api_key.is_empty() {
            return "(not set)".to_string();
        }
        let len = self.api_key.chars().count();
        if len < PREFIX * 2 {
            return "*".repeat(len);
        }
        let prefix: String = self.api_key.chars().take(PREFIX).collect();
        format!("{prefix}{}", "*".repeat((len - PREFIX).min(24)))
    }

    /// Replace an unknown judge with the default so the persona lookup always succeeds.
    pub fn normalized(mut self) -> Self {
        if !personas::is_known(&self.judge) {
            warn!(judge = %self.judge, "unknown judge in settings record, using default");
            self.judge = personas::default_persona().to_string();
        }
        self
    }
}

/// Process-wide settings with load-or-default init and explicit save.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    store: LocalStore,
    current: Settings,
}

impl SettingsStore {
    /// Load the persisted record, or defaults if there is none.
    ///
    /// A corrupt record is logged and replaced by defaults in memory; it is only
    /// overwritten on disk by the next explicit `set`.
    pub fn load_or_default(store: LocalStore) -> VerdictResult<Self> {
        let current = read_record(&store)?.unwrap_or_default();
        Ok(Self { store, current })
    }

    pub fn get(&self) -> &Settings {
        &self.current
    }

    /// Replace all settings and persist them.
    pub fn set(&mut self, settings: Settings) -> VerdictResult<()> {
        let json = serde_json::to_string(&settings)?;
        self.store.set_item(SETTINGS_KEY, &json)?;
        info!(model = %settings.model, judge = %settings.judge, "settings saved");
        self.current = settings;
        Ok(())
    }

    /// Re-read the persisted record, replacing the in-memory copy.
    pub fn reload(&mut self) -> VerdictResult<&Settings> {
        self.current = read_record(&self.store)?.unwrap_or_default();
        Ok(&self.current)
    }

    /// Whether a settings record has ever been saved.
    pub fn has_saved_settings(&self) -> VerdictResult<bool> {
        self.store.contains(SETTINGS_KEY)
    }

    pub fn local_store(&self) -> &LocalStore {
        &self.store
    }
}

fn read_record(store: &LocalStore) -> VerdictResult<Option<Settings>> {
    let Some(raw) = store.get_item(SETTINGS_KEY)? else {
        return Ok(None);
    };
    match serde_json::from_str::<Settings>(&raw) {
        Ok(settings) => Ok(Some(settings.normalized())),
        Err(e) => {
            warn!(error = %e, "settings record is unreadable, using defaults");
            Ok(None)
        }
    }
}

/// Field overrides supplied by the user; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub judge: Option<String>,
}

/// The settings dialog: pre-populated from the store, validated, then saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsForm {
    pub api_key: String,
    pub model: String,
    pub judge: String,
}

impl SettingsForm {
    /// Pre-populate from the store's current values.
    pub fn from_store(store: &SettingsStore) -> Self {
        let Settings {
            api_key,
            model,
            judge,
        } = store.get().clone();
        Self {
            api_key,
            model,
            judge,
        }
    }

    pub fn apply(mut self, patch: SettingsPatch) -> Self {
        if let Some(api_key) = patch.api_key {
            self.api_key = api_key.trim().to_string();
        }
        if let Some(model) = patch.model {
            self.model = model.trim().to_string();
        }
        if let Some(judge) = patch.judge {
            self.judge = judge.trim().to_string();
        }
        self
    }

    pub fn validate(&self) -> VerdictResult<()> {
        if !personas::is_known(&self.judge) {
            let known: Vec<_> = personas::persona_names().collect();
            return Err(VerdictError::validation(
                "judge",
                format!("must be one of: {}", known.join(", ")),
                &self.judge,
            ));
        }
        if self.api_key.chars().any(char::is_whitespace) {
            return Err(VerdictError::validation(
                "apiKey",
                "must not contain whitespace",
                "(hidden)",
            ));
        }
        if self.model.chars().any(char::is_whitespace) {
            return Err(VerdictError::validation(
                "model",
                "must not contain whitespace",
                &self.model,
            ));
        }
        Ok(())
    }

    /// Validate, then save through the store.
    pub fn submit(self, store: &mut SettingsStore) -> VerdictResult<()> {
        self.validate()?;
        store.set(Settings {
            api_key: self.api_key,
            model: self.model,
            judge: self.judge,
        })
    }
}
