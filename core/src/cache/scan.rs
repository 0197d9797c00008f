//! Library scans
//!
//! A scan walks the whole host library, classifies every package the cache
//! has not seen, and drops records for packages that are gone. Scans run on
//! the blocking pool; classification fans out over rayon.
//!
//! Every scan takes a new generation from the cache when it starts. Each
//! write a scan makes goes through a generation-checked cache method, so once
//! a forced scan bumps the generation, an older scan's next write is refused
//! and it stops without touching anything.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use rayon::prelude::*;
use tokio::task::JoinHandle;

use crate::classify::{ClassificationRecord, PathClassifier, classify_package};
use crate::host::{HostError, ModHost};

use super::ModCache;

/// How a scan ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed {
        classified: usize,
        removed: usize,
        persisted: bool,
    },
    /// A newer scan started; nothing was written after that point
    Superseded,
    Failed(HostError),
}

/// Marker for "the generation moved on"
struct Stale;

fn current(applied: bool) -> Result<(), Stale> {
    if applied { Ok(()) } else { Err(Stale) }
}

pub struct ScanCoordinator {
    host: Arc<dyn ModHost>,
    cache: Arc<ModCache>,
    classifier: PathClassifier,
    /// Generation of the scan that is running, if any
    running: Mutex<Option<u64>>,
}

impl ScanCoordinator {
    pub fn new(host: Arc<dyn ModHost>, cache: Arc<ModCache>, classifier: PathClassifier) -> Self {
        Self {
            host,
            cache,
            classifier,
            running: Mutex::new(None),
        }
    }

    pub fn cache(&self) -> &Arc<ModCache> {
        &self.cache
    }

    pub fn generation(&self) -> u64 {
        self.cache.generation()
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Start a background scan.
    ///
    /// Returns `None` when a scan is already running and `force` is false.
    /// A forced scan discards the in-memory cache and supersedes any running
    /// scan.
    pub fn start_scan(self: &Arc<Self>, force: bool) -> Option<JoinHandle<ScanOutcome>> {
        let generation = {
            let mut running = self.running.lock();
            if running.is_some() && !force {
                tracing::debug!("Scan already running, ignoring request");
                return None;
            }
            let generation = self.cache.begin_generation();
            *running = Some(generation);
            generation
        };
        tracing::info!(generation, force, "Starting library scan");

        let this = Arc::clone(self);
        Some(tokio::task::spawn_blocking(move || {
            let outcome = this.run(generation, force).unwrap_or_else(|Stale| {
                tracing::debug!(generation, "Scan superseded");
                ScanOutcome::Superseded
            });
            let mut running = this.running.lock();
            if *running == Some(generation) {
                *running = None;
            }
            outcome
        }))
    }

    fn check(&self, generation: u64) -> Result<(), Stale> {
        current(self.cache.generation() == generation)
    }

    fn run(&self, generation: u64, force: bool) -> Result<ScanOutcome, Stale> {
        if force {
            current(self.cache.clear_if(generation))?;
        } else if !self.cache.is_ready() {
            if let Some(records) = self.cache.load_from_durable() {
                let count = records.len();
                current(self.cache.seed_if(generation, records))?;
                tracing::debug!(records = count, "Seeded cache from disk");
            }
        }

        self.check(generation)?;
        let packages = match self.host.list_packages() {
            Ok(packages) => packages,
            Err(e) => {
                tracing::warn!(error = %e, "Scan could not list packages");
                return Ok(ScanOutcome::Failed(e));
            }
        };

        let mut removed = 0;
        let snapshot = self.cache.snapshot();
        for id in snapshot.keys().filter(|id| !packages.contains_key(*id)) {
            match self.cache.remove_if(generation, id) {
                Some(true) => removed += 1,
                Some(false) => {}
                None => return Err(Stale),
            }
        }

        let unseen: Vec<(&String, &String)> = packages
            .iter()
            .filter(|(id, _)| !self.cache.has(id))
            .collect();
        let classified = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);
        unseen.par_iter().try_for_each(|(id, name)| {
            self.check(generation)?;
            match self.classify_with_host(id, name) {
                Ok(record) => {
                    current(self.cache.upsert_if(generation, id, record))?;
                    classified.fetch_add(1, Ordering::Relaxed);
                }
                // Left out of the cache so the next scan retries it
                Err(e) => {
                    tracing::warn!(package = %id, error = %e, "Could not read package from host");
                    skipped.fetch_add(1, Ordering::Relaxed);
                }
            }
            Ok::<(), Stale>(())
        })?;
        let classified = classified.into_inner();

        let persisted = if classified > 0 || removed > 0 {
            match self.cache.save_if(generation) {
                Some(Ok(())) => true,
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Giving up on mod cache write");
                    false
                }
                None => return Err(Stale),
            }
        } else {
            false
        };

        current(self.cache.mark_ready_if(generation))?;
        tracing::info!(
            generation,
            classified,
            removed,
            skipped = skipped.into_inner(),
            total = packages.len(),
            "Library scan complete"
        );
        Ok(ScanOutcome::Completed {
            classified,
            removed,
            persisted,
        })
    }

    /// Classify one package from what the host reports for it
    fn classify_with_host(&self, id: &str, name: &str) -> Result<ClassificationRecord, HostError> {
        let paths = self.host.asset_paths(id)?;
        let items = self.host.changed_items(id)?;
        let classification = classify_package(&self.classifier, &paths, &items);
        Ok(ClassificationRecord::new(name, classification, Utc::now()))
    }

    fn display_name(&self, id: &str) -> Result<String, HostError> {
        self.host
            .list_packages()?
            .remove(id)
            .ok_or_else(|| HostError::UnknownPackage(id.to_string()))
    }

    /// Classify a package now, outside of any scan, and cache the result
    pub fn classify_one(&self, id: &str) -> Result<ClassificationRecord, HostError> {
        let name = self.display_name(id)?;
        let record = self.classify_with_host(id, &name)?;
        self.cache.upsert(id, record.clone());
        Ok(record)
    }

    // ─── Host notifications ─────────────────────────────────────────────────

    pub fn on_package_added(&self, id: &str) -> Result<(), HostError> {
        let record = self.classify_one(id)?;
        tracing::info!(package = id, category = %record.category, "Classified new package");
        self.persist();
        Ok(())
    }

    pub fn on_package_deleted(&self, id: &str) {
        if self.cache.remove(id).is_some() {
            tracing::info!(package = id, "Dropped deleted package");
            self.persist();
        }
    }

    pub fn on_package_moved(&self, old: &str, new: &str) {
        if self.cache.rename(old, new) {
            tracing::info!(from = old, to = new, "Renamed cached package");
            self.persist();
        }
    }

    fn persist(&self) {
        if let Err(e) = self.cache.save_to_durable() {
            tracing::error!(error = %e, "Failed to save mod cache");
        }
    }
}
