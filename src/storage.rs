//! # Local Record Store
//!
//! A tiny named-record store: one file per key under a per-user data directory.
//! Settings and the first-run flags live here.
//!
//! Writes go to a temporary file in the same directory and are then renamed over
//! the target, so a record is either fully old or fully new.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::debug;

use crate::error::{VerdictError, VerdictResult};

/// Key of the persisted settings record.
pub const SETTINGS_KEY: &str = "settings";
/// Key of the terms acceptance timestamp.
pub const TERMS_KEY: &str = "term";
/// Key of the settings tip acknowledgment timestamp.
pub const TEACHING_KEY: &str = "teaching";

/// File-backed key/value store for small text records.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open a store rooted at `root`. The directory is created lazily on first write.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open the store in the platform data directory for this application.
    pub fn open_default() -> VerdictResult<Self> {
        let dirs = ProjectDirs::from("", "", "sop").ok_or_else(|| {
            VerdictError::storage(
                "resolve data directory",
                None,
                io::Error::new(io::ErrorKind::NotFound, "no home directory"),
            )
        })?;
        Ok(Self::open(dirs.data_local_dir()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read a record. Missing records are `Ok(None)`.
    pub fn get_item(&self, key: &str) -> VerdictResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VerdictError::storage("read record", Some(display(&path)), e)),
        }
    }

    /// Write a record atomically.
    pub fn set_item(&self, key: &str, value: &str) -> VerdictResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root).map_err(|e| {
            VerdictError::storage("create data directory", Some(display(&self.root)), e)
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|e| VerdictError::storage("create temp record", Some(display(&self.root)), e))?;
        tmp.write_all(value.as_bytes())
            .and_then(|_| tmp.flush())
            .map_err(|e| VerdictError::storage("write record", Some(display(&path)), e))?;
        tmp.persist(&path)
            .map_err(|e| VerdictError::storage("persist record", Some(display(&path)), e.error))?;

        debug!(key, path = %path.display(), "record written");
        Ok(())
    }

    /// Delete a record. Deleting a missing record is not an error.
    pub fn remove_item(&self, key: &str) -> VerdictResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VerdictError::storage("remove record", Some(display(&path)), e)),
        }
    }

    pub fn contains(&self, key: &str) -> VerdictResult<bool> {
        Ok(self.path_for(key)?.is_file())
    }

    fn path_for(&self, key: &str) -> VerdictResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(VerdictError::validation(
                "key",
                "must match [A-Za-z0-9_-]+",
                key,
            ));
        }
        Ok(self.root.join(key))
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
