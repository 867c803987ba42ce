//! First-run flags: the terms gate and the one-time settings tip.
//!
//! Each flag is the presence of a millisecond timestamp in the [`LocalStore`].
//! The application sets them once and never clears them.

use chrono::Utc;
use tracing::info;

use crate::error::VerdictResult;
use crate::storage::{LocalStore, SETTINGS_KEY, TEACHING_KEY, TERMS_KEY};

pub const TERMS_TITLE: &str = "Terms and Service";

pub const TERMS_TEXT: &str = "By using this software, you agree that you are 18 years or older \
and that you will not use this software for any illegal activities. This software is provided \
\"as is\" without any warranties or guarantees. The developers are not responsible for any \
misuse or harm caused by the use of this software.";

pub const SETTINGS_TIP_TITLE: &str = "API key is required";

pub const SETTINGS_TIP: &str =
    "You need to set an API key, and select the model for the AI to work.";

#[derive(Debug, Clone)]
pub struct FirstRun {
    store: LocalStore,
}

impl FirstRun {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn terms_accepted(&self) -> VerdictResult<bool> {
        self.store.contains(TERMS_KEY)
    }

    /// Record acceptance. Keeps the first timestamp if already accepted.
    pub fn accept_terms(&self) -> VerdictResult<()> {
        if self.terms_accepted()? {
            return Ok(());
        }
        info!("terms accepted");
        self.store.set_item(TERMS_KEY, &now_millis())
    }

    /// When the terms were accepted, if ever.
    pub fn terms_accepted_at(&self) -> VerdictResult<Option<i64>> {
        Ok(self
            .store
            .get_item(TERMS_KEY)?
            .and_then(|raw| raw.trim().parse().ok()))
    }

    /// The tip shows until acknowledged or until settings were saved once.
    pub fn settings_tip_pending(&self) -> VerdictResult<bool> {
        Ok(!self.store.contains(TEACHING_KEY)? && !self.store.contains(SETTINGS_KEY)?)
    }

    pub fn acknowledge_settings_tip(&self) -> VerdictResult<()> {
        if self.store.contains(TEACHING_KEY)? {
            return Ok(());
        }
        self.store.set_item(TEACHING_KEY, &now_millis())
    }
}

fn now_millis() -> String {
    Utc::now().timestamp_millis().to_string()
}
