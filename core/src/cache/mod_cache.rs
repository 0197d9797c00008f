use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::classify::ClassificationRecord;
use crate::durable::{self, SavePolicy};

/// Bump when the record layout or any classification rule changes; stale
/// files are discarded and rebuilt rather than migrated.
pub const CACHE_VERSION: u32 = 1;

pub type CacheRecords = BTreeMap<String, ClassificationRecord>;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to serialize mod cache: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write mod cache {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// On-disk layout of `mod_cache.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheDocument {
    pub version: u32,
    pub last_updated: DateTime<Utc>,
    pub mods: CacheRecords,
}

impl CacheDocument {
    pub fn new(mods: CacheRecords, last_updated: DateTime<Utc>) -> Self {
        Self {
            version: CACHE_VERSION,
            last_updated,
            mods,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a cache file; `None` when corrupt or written by another version
    pub fn from_json(content: &str) -> Option<Self> {
        match serde_json::from_str::<CacheDocument>(content) {
            Ok(doc) if doc.version == CACHE_VERSION => Some(doc),
            Ok(doc) => {
                tracing::info!(
                    found = doc.version,
                    expected = CACHE_VERSION,
                    "Mod cache version mismatch, rebuilding"
                );
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse mod cache, rebuilding");
                None
            }
        }
    }
}

/// Records plus the scan generation allowed to change them
struct CacheState {
    records: Arc<CacheRecords>,
    generation: u64,
}

/// Package id -> classification, shared between scans and activations.
///
/// Writers clone-on-write the map behind the lock, so a [`snapshot`] is an
/// `Arc` clone that never blocks on, or observes, later mutations.
///
/// The `*_if` methods take a scan generation and only apply while it is
/// still the current one. The check and the write happen under the same
/// lock that [`begin_generation`] takes, so a superseded scan cannot slip
/// a write in after a newer scan started.
///
/// [`snapshot`]: ModCache::snapshot
/// [`begin_generation`]: ModCache::begin_generation
pub struct ModCache {
    path: PathBuf,
    state: RwLock<CacheState>,
    /// Only stored while holding the `state` write lock
    ready: AtomicBool,
    /// Serializes durable writes
    write_guard: Mutex<()>,
    save_policy: SavePolicy,
}

impl ModCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: RwLock::new(CacheState {
                records: Arc::new(CacheRecords::new()),
                generation: 0,
            }),
            ready: AtomicBool::new(false),
            write_guard: Mutex::new(()),
            save_policy: SavePolicy::default(),
        }
    }

    pub fn with_save_policy(mut self, policy: SavePolicy) -> Self {
        self.save_policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ─── Reads ──────────────────────────────────────────────────────────────

    pub fn get(&self, id: &str) -> Option<ClassificationRecord> {
        self.state.read().records.get(id).cloned()
    }

    pub fn has(&self, id: &str) -> bool {
        self.state.read().records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    /// Everything committed so far
    pub fn snapshot(&self) -> Arc<CacheRecords> {
        Arc::clone(&self.state.read().records)
    }

    /// True once a full scan has completed against the current library
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    // ─── Mutations ──────────────────────────────────────────────────────────

    pub fn upsert(&self, id: impl Into<String>, record: ClassificationRecord) {
        let mut state = self.state.write();
        Arc::make_mut(&mut state.records).insert(id.into(), record);
    }

    pub fn remove(&self, id: &str) -> Option<ClassificationRecord> {
        let mut state = self.state.write();
        if !state.records.contains_key(id) {
            return None;
        }
        Arc::make_mut(&mut state.records).remove(id)
    }

    /// Move a record to a new id, keeping its classification
    pub fn rename(&self, old: &str, new: &str) -> bool {
        let mut state = self.state.write();
        if !state.records.contains_key(old) {
            return false;
        }
        let map = Arc::make_mut(&mut state.records);
        match map.remove(old) {
            Some(record) => {
                map.insert(new.to_string(), record);
                true
            }
            None => false,
        }
    }

    // ─── Generation-checked mutations ───────────────────────────────────────

    /// Start a new scan generation, superseding every older one
    pub(crate) fn begin_generation(&self) -> u64 {
        let mut state = self.state.write();
        state.generation += 1;
        state.generation
    }

    fn write_if(&self, generation: u64, apply: impl FnOnce(&mut CacheState)) -> bool {
        let mut state = self.state.write();
        if state.generation != generation {
            return false;
        }
        apply(&mut *state);
        true
    }

    pub(crate) fn upsert_if(&self, generation: u64, id: &str, record: ClassificationRecord) -> bool {
        self.write_if(generation, |state| {
            Arc::make_mut(&mut state.records).insert(id.to_string(), record);
        })
    }

    /// `Some(removed)` while `generation` is current
    pub(crate) fn remove_if(&self, generation: u64, id: &str) -> Option<bool> {
        let mut removed = false;
        let current = self.write_if(generation, |state| {
            if state.records.contains_key(id) {
                removed = Arc::make_mut(&mut state.records).remove(id).is_some();
            }
        });
        current.then_some(removed)
    }

    /// Drop every record and readiness
    pub(crate) fn clear_if(&self, generation: u64) -> bool {
        self.write_if(generation, |state| {
            state.records = Arc::new(CacheRecords::new());
            self.ready.store(false, Ordering::SeqCst);
        })
    }

    /// Replace memory with previously persisted records, without marking ready
    pub(crate) fn seed_if(&self, generation: u64, records: CacheRecords) -> bool {
        self.write_if(generation, |state| state.records = Arc::new(records))
    }

    pub(crate) fn mark_ready_if(&self, generation: u64) -> bool {
        self.write_if(generation, |_| self.ready.store(true, Ordering::SeqCst))
    }

    #[cfg(test)]
    fn set_ready(&self, ready: bool) {
        let _state = self.state.write();
        self.ready.store(ready, Ordering::SeqCst);
    }

    // ─── Durable storage ────────────────────────────────────────────────────

    /// Records from the cache file; `None` when missing, corrupt or stale
    pub fn load_from_durable(&self) -> Option<CacheRecords> {
        let content = fs::read_to_string(&self.path).ok()?;
        let doc = CacheDocument::from_json(&content)?;
        tracing::debug!(path = %self.path.display(), records = doc.mods.len(), "Loaded mod cache");
        Some(doc.mods)
    }

    /// Persist the current records.
    ///
    /// The snapshot is taken after acquiring the write guard, so concurrent
    /// saves land in the order their snapshots were taken. Failures are
    /// retried per the save policy, then returned.
    pub fn save_to_durable(&self) -> Result<(), CacheError> {
        let _guard = self.write_guard.lock();
        let records = self.snapshot();
        self.write_document(&records)
    }

    /// Persist only while `generation` is current; `None` when superseded
    pub(crate) fn save_if(&self, generation: u64) -> Option<Result<(), CacheError>> {
        let _guard = self.write_guard.lock();
        let records = {
            let state = self.state.read();
            if state.generation != generation {
                return None;
            }
            Arc::clone(&state.records)
        };
        Some(self.write_document(&records))
    }

    fn write_document(&self, records: &CacheRecords) -> Result<(), CacheError> {
        let doc = CacheDocument {
            version: CACHE_VERSION,
            last_updated: Utc::now(),
            mods: records.clone(),
        };
        let json = doc.to_json()?;
        durable::write_with_retries(&self.path, json.as_bytes(), self.save_policy).map_err(
            |source| CacheError::Write {
                path: self.path.clone(),
                source,
            },
        )?;
        tracing::debug!(records = records.len(), "Saved mod cache");
        Ok(())
    }
}
