//! # Model Directory
//!
//! Lists the models an API key can use, cached per key.
//!
//! Every lookup takes a sequence number, and each key remembers the latest one
//! issued for it. Only that lookup may write the key's cache entry, so a manual
//! refresh supersedes anything still in flight for the same key. Lookups for
//! other keys never interfere. A superseded lookup still returns its own result
//! to whoever awaited it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{VerdictError, VerdictResult};

/// One model descriptor from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    #[serde(rename = "created", with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "owned_by", default)]
    pub owner: String,
}

/// Anything that can list models for an API key.
#[async_trait]
pub trait ModelLister: Send + Sync {
    async fn list_models(&self, api_key: &str) -> VerdictResult<Vec<ModelEntry>>;
}

#[derive(Debug, Default)]
struct KeySlot {
    /// Latest lookup issued for this key
    latest: u64,
    models: Option<Vec<ModelEntry>>,
}

/// Per-key cache in front of a [`ModelLister`].
pub struct ModelDirectory<L> {
    lister: L,
    slots: Mutex<HashMap<String, KeySlot>>,
    issued: AtomicU64,
}

impl<L: ModelLister> ModelDirectory<L> {
    pub fn new(lister: L) -> Self {
        Self {
            lister,
            slots: Mutex::new(HashMap::new()),
            issued: AtomicU64::new(0),
        }
    }

    /// Cached listing for `api_key`, fetching on a miss.
    pub async fn models(&self, api_key: &str) -> VerdictResult<Vec<ModelEntry>> {
        require_key(api_key)?;
        if let Some(hit) = self.cached(api_key) {
            debug!(count = hit.len(), "model list cache hit");
            return Ok(hit);
        }
        self.fetch(api_key).await
    }

    /// Re-fetch regardless of the cache.
    pub async fn refresh(&self, api_key: &str) -> VerdictResult<Vec<ModelEntry>> {
        require_key(api_key)?;
        self.fetch(api_key).await
    }

    pub fn cached(&self, api_key: &str) -> Option<Vec<ModelEntry>> {
        self.lock_slots().get(api_key)?.models.clone()
    }

    async fn fetch(&self, api_key: &str) -> VerdictResult<Vec<ModelEntry>> {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.lock_slots().entry(api_key.to_string()).or_default().latest = seq;

        let result = self.lister.list_models(api_key).await;
        if let Ok(models) = &result {
            let mut slots = self.lock_slots();
            let slot = slots.entry(api_key.to_string()).or_default();
            if slot.latest == seq {
                slot.models = Some(models.clone());
            } else {
                debug!(seq, latest = slot.latest, "superseded model lookup not cached");
            }
        }
        result
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, KeySlot>> {
        // A poisoned cache is still a valid map.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn require_key(api_key: &str) -> VerdictResult<()> {
    if api_key.trim().is_empty() {
        return Err(VerdictError::precondition("API key is missing"));
    }
    Ok(())
}
