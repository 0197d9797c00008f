use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use stagehand_types::{OptionSelection, Preset, StagehandConfig};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::cache::ScanCoordinator;
use crate::classify::ClassificationRecord;
use crate::conflict::{ConflictResolver, Footprint};
use crate::host::{HostError, ModHost, TemporaryOverride};
use crate::main_thread::MainThread;

use super::ledger::{ActiveMarker, LedgerEntry, OverrideLedger, OverrideRole};
use super::plan::SurfacePlan;

#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error("another activation is still in progress")]
    InFlight,

    #[error("failed to override target package {package}: {source}")]
    TargetOverride {
        package: String,
        #[source]
        source: HostError,
    },

    #[error("stagehand is disabled: {0}")]
    Unavailable(String),

    #[error("preset has no variant named {0}")]
    UnknownVariant(String),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("activation task failed: {0}")]
    Interrupted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationPhase {
    Idle,
    /// Overrides are being applied
    Applying,
    /// Overrides applied; rolling back what the previous preset left behind
    Settling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub preset_id: String,
    pub collection: String,
    pub target: Option<String>,
    /// False when the target override was already in place
    pub target_applied: bool,
    /// Packages disabled for this preset, sorted
    pub suppressed: Vec<String>,
    pub plan: SurfacePlan,
    pub dispatched: bool,
}

/// Result of removing ledger entries through the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackSummary {
    pub removed: usize,
    pub failed: usize,
}

/// (collection, package)
type OverrideKey = (String, String);

struct Applied {
    report: ActivationReport,
    needed: BTreeSet<OverrideKey>,
}

/// State shared with the blocking tasks an activation spawns
struct Shared {
    host: Arc<dyn ModHost>,
    scanner: Arc<ScanCoordinator>,
    ledger: Arc<OverrideLedger>,
    main_thread: MainThread,
    config: StagehandConfig,
    in_flight: AtomicBool,
    phase: Mutex<ActivationPhase>,
}

/// Runs activations one at a time.
///
/// The in-flight guard is taken when an activation starts and released only
/// after its rollback finishes, so a second request during either phase is
/// rejected rather than queued.
pub struct ActivationEngine {
    shared: Arc<Shared>,
    rollback: Mutex<Option<JoinHandle<()>>>,
}

/// Permanent options, then preset options, then variant options; later
/// layers replace whole option groups
fn combine_options(layers: &[&OptionSelection]) -> OptionSelection {
    let mut combined = OptionSelection::new();
    for layer in layers {
        for (group, selected) in layer.iter() {
            combined.insert(group.clone(), selected.clone());
        }
    }
    combined
}

impl ActivationEngine {
    pub fn new(
        host: Arc<dyn ModHost>,
        scanner: Arc<ScanCoordinator>,
        ledger: Arc<OverrideLedger>,
        main_thread: MainThread,
        config: &StagehandConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                host,
                scanner,
                ledger,
                main_thread,
                config: config.clone(),
                in_flight: AtomicBool::new(false),
                phase: Mutex::new(ActivationPhase::Idle),
            }),
            rollback: Mutex::new(None),
        }
    }

    pub fn phase(&self) -> ActivationPhase {
        *self.shared.phase.lock()
    }

    pub fn ledger(&self) -> &Arc<OverrideLedger> {
        &self.shared.ledger
    }

    /// Make `preset` the winning one.
    ///
    /// Returns once overrides are applied and the surface job is queued; the
    /// rollback of the previous preset continues in the background (see
    /// [`wait_idle`](Self::wait_idle)). Apply and rollback run as one task
    /// that releases the in-flight guard itself, so dropping the returned
    /// future does not cancel the activation or leave the guard held.
    pub async fn activate(
        &self,
        preset: &Preset,
        variant: Option<&str>,
    ) -> Result<ActivationReport, ActivationError> {
        self.shared.begin()?;

        let flight = InFlight(Arc::clone(&self.shared));
        let owned_preset = preset.clone();
        let owned_variant = variant.map(str::to_string);
        let (report_tx, report_rx) = oneshot::channel();
        let handle = tokio::task::spawn_blocking(move || {
            let shared = &flight.0;
            let Applied { report, needed } =
                match shared.apply(&owned_preset, owned_variant.as_deref()) {
                    Ok(applied) => applied,
                    Err(e) => {
                        tracing::warn!(preset = %owned_preset.id, error = %e, "Activation aborted");
                        if report_tx.send(Err(e)).is_err() {
                            tracing::debug!(preset = %owned_preset.id, "Activation caller went away");
                        }
                        return;
                    }
                };

            *shared.phase.lock() = ActivationPhase::Settling;
            tracing::info!(
                preset = %report.preset_id,
                suppressed = report.suppressed.len(),
                "Preset activated"
            );
            if report_tx.send(Ok(report)).is_err() {
                tracing::debug!(preset = %owned_preset.id, "Activation caller went away");
            }

            let summary = shared.rollback(|key| needed.contains(key));
            if summary.removed > 0 || summary.failed > 0 {
                tracing::info!(
                    removed = summary.removed,
                    failed = summary.failed,
                    "Rolled back stale overrides"
                );
            }
            if let Err(e) = shared.ledger.clear_previous() {
                tracing::warn!(error = %e, "Failed to clear previous preset marker");
            }
        });
        *self.rollback.lock() = Some(handle);

        match report_rx.await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(preset = %preset.id, "Activation task failed");
                Err(ActivationError::Interrupted(
                    "activation task ended without a result".to_string(),
                ))
            }
        }
    }

    /// Packages activating `preset` would suppress, without applying anything
    pub fn conflicts_for(&self, preset: &Preset) -> Result<Vec<String>, ActivationError> {
        let collection = self.shared.host.current_collection()?;
        let target = preset
            .package
            .as_deref()
            .and_then(|id| self.shared.target_record(id));
        Ok(self.shared.conflicts(preset, target.as_ref(), &collection.id))
    }

    /// Remove every override this crate owns and clear the preset markers
    pub async fn reset(&self) -> Result<RollbackSummary, ActivationError> {
        self.shared.begin()?;
        let flight = InFlight(Arc::clone(&self.shared));
        tokio::task::spawn_blocking(move || flight.0.clear_all())
            .await
            .map_err(|e| ActivationError::Interrupted(e.to_string()))
    }

    /// Startup recovery: undo whatever a previous run left in the ledger.
    /// Call before anything else touches the host.
    pub fn recover(&self) -> RollbackSummary {
        let summary = self.shared.clear_all();
        if summary.removed > 0 || summary.failed > 0 {
            tracing::info!(
                removed = summary.removed,
                failed = summary.failed,
                "Recovered overrides from previous run"
            );
        }
        summary
    }

    /// Wait for the background rollback of the last activation, if any
    pub async fn wait_idle(&self) {
        let handle = self.rollback.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Activation task failed");
            }
        }
    }
}

/// Releases the in-flight guard when dropped, including on panic
struct InFlight(Arc<Shared>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.finish();
    }
}

impl Shared {
    fn begin(&self) -> Result<(), ActivationError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ActivationError::InFlight)?;
        *self.phase.lock() = ActivationPhase::Applying;
        Ok(())
    }

    fn finish(&self) {
        *self.phase.lock() = ActivationPhase::Idle;
        self.in_flight.store(false, Ordering::SeqCst);
    }

    fn target_record(&self, id: &str) -> Option<ClassificationRecord> {
        if let Some(record) = self.scanner.cache().get(id) {
            return Some(record);
        }
        match self.scanner.classify_one(id) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(package = id, error = %e, "Could not classify target package");
                None
            }
        }
    }

    fn is_disabled(&self, collection: &str, id: &str) -> bool {
        self.host
            .permanent_settings(collection, id)
            .map(|s| !s.enabled)
            .unwrap_or(false)
    }

    fn conflicts(
        &self,
        preset: &Preset,
        target: Option<&ClassificationRecord>,
        collection: &str,
    ) -> Vec<String> {
        let footprint = Footprint::for_preset(preset, target);
        let records = self.scanner.cache().snapshot();
        ConflictResolver::new(&self.config).conflicts(
            &footprint,
            preset.package.as_deref(),
            &records,
            |id| self.is_disabled(collection, id),
        )
    }

    fn record(&self, collection: &str, id: &str, entry: LedgerEntry) {
        if let Err(e) = self.ledger.record(collection, id, entry) {
            tracing::error!(package = id, error = %e, "Failed to record override");
        }
    }

    fn apply(&self, preset: &Preset, variant: Option<&str>) -> Result<Applied, ActivationError> {
        let collection = self.host.current_collection()?;
        let variant = match variant {
            Some(name) => Some(
                preset
                    .variant(name)
                    .ok_or_else(|| ActivationError::UnknownVariant(name.to_string()))?,
            ),
            None => None,
        };
        let variant_name = variant.map(|v| v.name.clone());
        let variant_options = variant.map(|v| v.options.clone());

        let target_record = preset.package.as_deref().and_then(|id| self.target_record(id));
        let active = self
            .ledger
            .active()
            .filter(|m| m.preset_id == preset.id && m.collection == collection.id);
        let already_active = active.is_some();
        let same_variant = active.is_some_and(|m| m.variant == variant_name);

        // ─── Target override ────────────────────────────────────────────────
        let mut target_applied = false;
        if let Some(id) = preset.package.as_deref() {
            let has_variant_options = variant_options.as_ref().is_some_and(|o| !o.is_empty());
            if already_active && same_variant && !has_variant_options {
                tracing::debug!(preset = %preset.id, "Target override already in place");
            } else {
                let target_error = |source| ActivationError::TargetOverride {
                    package: id.to_string(),
                    source,
                };
                let settings = self
                    .host
                    .permanent_settings(&collection.id, id)
                    .map_err(target_error)?;
                let boosted = settings.priority + self.config.priority_boost;
                let priority = if already_active {
                    self.ledger
                        .entry(&collection.id, id)
                        .filter(|e| e.role == OverrideRole::Target)
                        .map(|e| e.priority)
                        .unwrap_or(boosted)
                } else {
                    boosted
                };
                let empty = OptionSelection::new();
                let options = combine_options(&[
                    &settings.options,
                    &preset.options,
                    variant_options.as_ref().unwrap_or(&empty),
                ]);
                self.host
                    .set_temporary_override(
                        &collection.id,
                        id,
                        TemporaryOverride {
                            enabled: true,
                            priority,
                            options,
                        },
                    )
                    .map_err(target_error)?;
                self.record(
                    &collection.id,
                    id,
                    LedgerEntry {
                        preset_id: preset.id.clone(),
                        role: OverrideRole::Target,
                        priority,
                    },
                );
                target_applied = true;
            }
        }

        // ─── Suppressions ───────────────────────────────────────────────────
        let conflicts = self.conflicts(preset, target_record.as_ref(), &collection.id);

        let mut suppressed = Vec::new();
        for id in conflicts {
            if let Some(entry) = self
                .ledger
                .entry(&collection.id, &id)
                .filter(|e| e.role == OverrideRole::Suppressed)
            {
                self.record(
                    &collection.id,
                    &id,
                    LedgerEntry {
                        preset_id: preset.id.clone(),
                        ..entry
                    },
                );
                suppressed.push(id);
                continue;
            }

            let settings = match self.host.permanent_settings(&collection.id, &id) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!(package = %id, error = %e, "Skipping suppression");
                    continue;
                }
            };
            match self.host.set_temporary_override(
                &collection.id,
                &id,
                TemporaryOverride::disabled(&settings),
            ) {
                Ok(()) => {
                    self.record(
                        &collection.id,
                        &id,
                        LedgerEntry {
                            preset_id: preset.id.clone(),
                            role: OverrideRole::Suppressed,
                            priority: settings.priority,
                        },
                    );
                    suppressed.push(id);
                }
                Err(e) => tracing::warn!(package = %id, error = %e, "Failed to suppress package"),
            }
        }

        // ─── Surface ────────────────────────────────────────────────────────
        let plan = SurfacePlan::for_activation(preset, target_record.as_ref());
        let dispatched = match &plan {
            SurfacePlan::Nothing => false,
            _ => {
                let job = plan.clone();
                match self.main_thread.post(move |surface| job.run(surface)) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(error = %e, "Could not dispatch surface job");
                        false
                    }
                }
            }
        };

        if let Err(e) = self.ledger.set_active(ActiveMarker {
            preset_id: preset.id.clone(),
            collection: collection.id.clone(),
            package: preset.package.clone(),
            variant: variant_name,
        }) {
            tracing::error!(error = %e, "Failed to record active preset");
        }

        let mut needed: BTreeSet<OverrideKey> = suppressed
            .iter()
            .map(|id| (collection.id.clone(), id.clone()))
            .collect();
        if let Some(id) = &preset.package {
            needed.insert((collection.id.clone(), id.clone()));
        }

        Ok(Applied {
            report: ActivationReport {
                preset_id: preset.id.clone(),
                collection: collection.id,
                target: preset.package.clone(),
                target_applied,
                suppressed,
                plan,
                dispatched,
            },
            needed,
        })
    }

    /// Remove every ledger entry `keep` rejects. Entries whose removal fails
    /// stay in the ledger for the next attempt.
    fn rollback(&self, keep: impl Fn(&OverrideKey) -> bool) -> RollbackSummary {
        let mut summary = RollbackSummary::default();
        for (collection, id, _) in self.ledger.entries() {
            let key = (collection, id);
            if keep(&key) {
                continue;
            }
            let (collection, id) = key;
            match self.host.remove_temporary_override(&collection, &id) {
                Ok(()) => {
                    if let Err(e) = self.ledger.remove(&collection, &id) {
                        tracing::error!(package = %id, error = %e, "Failed to forget override");
                    }
                    summary.removed += 1;
                }
                Err(e) => {
                    tracing::warn!(package = %id, error = %e, "Failed to remove override");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    fn clear_all(&self) -> RollbackSummary {
        let summary = self.rollback(|_| false);
        if let Err(e) = self.ledger.clear_markers() {
            tracing::error!(error = %e, "Failed to clear preset markers");
        }
        summary
    }
}
