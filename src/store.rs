//! JSON file store for trade history, settings and the last-trade snapshot.
//!
//! Everything the session needs to survive a restart lives in one
//! human-readable file: the unbounded newest-first trade history, the
//! operator's trading settings, and the snapshot of the most recently
//! settled trade. Loading a missing file yields empty defaults so a fresh
//! install starts clean.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::TradeSettings;
use crate::history::{LastTradeSnapshot, TradeRecord};

/// Everything persisted between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub history: Vec<TradeRecord>,
    #[serde(default)]
    pub last_trade: Option<LastTradeSnapshot>,
    #[serde(default)]
    pub settings: TradeSettings,
}

/// File-backed store.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the store, returning defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`KestrelError::Store`](crate::KestrelError::Store) when the
    /// file exists but cannot be read, or
    /// [`KestrelError::Json`](crate::KestrelError::Json) when it cannot be
    /// parsed.
    pub fn load(&self) -> crate::Result<StoreData> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No store file yet - starting clean");
            return Ok(StoreData::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        let data: StoreData = serde_json::from_str(&raw)?;
        info!(
            path = %self.path.display(),
            trades = data.history.len(),
            "Loaded store"
        );
        Ok(data)
    }

    /// Writes the store atomically (write to a sibling temp file, then
    /// rename over the target).
    ///
    /// # Errors
    ///
    /// Returns [`KestrelError::Store`](crate::KestrelError::Store) when the
    /// file cannot be written.
    pub fn save(&self, data: &StoreData) -> crate::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
