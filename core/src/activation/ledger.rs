//! Override ledger
//!
//! Every temporary override this crate applies to the host is recorded here
//! before the call returns to the caller, and only forgotten once the host
//! has confirmed its removal. The file survives crashes, so startup recovery
//! can undo whatever a previous run left behind.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::durable::{self, SavePolicy};

pub const LEDGER_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("failed to serialize override ledger: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write override ledger {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why an override exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverrideRole {
    /// The active preset's package, enabled with boosted priority
    Target,
    /// A conflicting package, disabled
    Suppressed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Preset that currently needs this override
    pub preset_id: String,
    pub role: OverrideRole,
    /// Priority the override was applied with
    pub priority: i32,
}

/// Which preset is (or was) active, and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveMarker {
    pub preset_id: String,
    pub collection: String,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub version: u32,
    /// collection -> package -> entry
    #[serde(default)]
    pub entries: BTreeMap<String, BTreeMap<String, LedgerEntry>>,
    #[serde(default)]
    pub active: Option<ActiveMarker>,
    #[serde(default)]
    pub previous: Option<ActiveMarker>,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            version: LEDGER_VERSION,
            entries: BTreeMap::new(),
            active: None,
            previous: None,
        }
    }
}

impl LedgerState {
    pub fn entry_count(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }
}

/// Durable `collection -> package -> entry` map plus preset markers.
///
/// Every mutation is written through before returning.
pub struct OverrideLedger {
    path: PathBuf,
    state: Mutex<LedgerState>,
    save_policy: SavePolicy,
}

impl OverrideLedger {
    /// Open the ledger at `path`, starting empty if the file is missing.
    ///
    /// An unreadable file is logged and replaced; its overrides can no longer
    /// be tracked, which the warning says.
    pub fn open(path: impl Into<PathBuf>, save_policy: SavePolicy) -> Self {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<LedgerState>(&content) {
                Ok(state) if state.version == LEDGER_VERSION => state,
                Ok(state) => {
                    tracing::warn!(
                        found = state.version,
                        expected = LEDGER_VERSION,
                        "Override ledger version mismatch, starting empty"
                    );
                    LedgerState::default()
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to parse override ledger, starting empty");
                    LedgerState::default()
                }
            },
            Err(_) => LedgerState::default(),
        };
        Self {
            path,
            state: Mutex::new(state),
            save_policy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the whole ledger
    pub fn state(&self) -> LedgerState {
        self.state.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entry_count() == 0
    }

    pub fn entry(&self, collection: &str, id: &str) -> Option<LedgerEntry> {
        self.state
            .lock()
            .entries
            .get(collection)
            .and_then(|packages| packages.get(id))
            .cloned()
    }

    /// Every entry as `(collection, package, entry)`, sorted
    pub fn entries(&self) -> Vec<(String, String, LedgerEntry)> {
        self.state
            .lock()
            .entries
            .iter()
            .flat_map(|(collection, packages)| {
                packages
                    .iter()
                    .map(move |(id, entry)| (collection.clone(), id.clone(), entry.clone()))
            })
            .collect()
    }

    pub fn active(&self) -> Option<ActiveMarker> {
        self.state.lock().active.clone()
    }

    pub fn previous(&self) -> Option<ActiveMarker> {
        self.state.lock().previous.clone()
    }

    pub fn record(&self, collection: &str, id: &str, entry: LedgerEntry) -> Result<(), LedgerError> {
        self.mutate(|state| {
            state
                .entries
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), entry);
        })
    }

    /// Forget an entry; only call once the host confirmed the removal
    pub fn remove(&self, collection: &str, id: &str) -> Result<(), LedgerError> {
        self.mutate(|state| {
            if let Some(packages) = state.entries.get_mut(collection) {
                packages.remove(id);
                if packages.is_empty() {
                    state.entries.remove(collection);
                }
            }
        })
    }

    /// Make `marker` active, moving the old marker to `previous`
    pub fn set_active(&self, marker: ActiveMarker) -> Result<(), LedgerError> {
        self.mutate(|state| {
            state.previous = state.active.replace(marker);
        })
    }

    pub fn clear_previous(&self) -> Result<(), LedgerError> {
        self.mutate(|state| state.previous = None)
    }

    pub fn clear_markers(&self) -> Result<(), LedgerError> {
        self.mutate(|state| {
            state.active = None;
            state.previous = None;
        })
    }

    fn mutate(&self, f: impl FnOnce(&mut LedgerState)) -> Result<(), LedgerError> {
        // Held across the write so the file always matches memory order
        let mut state = self.state.lock();
        f(&mut state);
        let json = serde_json::to_string_pretty(&*state)?;
        durable::write_with_retries(&self.path, json.as_bytes(), self.save_policy).map_err(|source| {
            tracing::error!(path = %self.path.display(), error = %source, "Giving up on ledger write");
            LedgerError::Write {
                path: self.path.clone(),
                source,
            }
        })
    }
}
