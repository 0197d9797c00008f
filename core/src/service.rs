//! The [`Stagehand`] facade
//!
//! Wires config, the host, the cache, scans and activation together. When the
//! host cannot be reached or is too old, the facade starts disabled: every
//! operation becomes a no-op or returns [`ActivationError::Unavailable`].

use std::path::PathBuf;
use std::sync::Arc;

use stagehand_types::{Preset, StagehandConfig};
use tokio::task::JoinHandle;

use crate::activation::{
    ActivationEngine, ActivationError, ActivationReport, ActiveMarker, OverrideLedger,
    RollbackSummary,
};
use crate::cache::{ModCache, ScanCoordinator, ScanOutcome};
use crate::classify::PathClassifier;
use crate::durable::SavePolicy;
use crate::host::{HostError, MIN_HOST_API, ModHost, is_supported_api};
use crate::main_thread::MainThread;

struct Services {
    scanner: Arc<ScanCoordinator>,
    engine: ActivationEngine,
}

enum State {
    Enabled(Box<Services>),
    Disabled(String),
}

pub struct Stagehand {
    state: State,
}

fn check_host(host: &dyn ModHost) -> Result<(), String> {
    match host.api_version() {
        Ok(version) if is_supported_api(version) => Ok(()),
        Ok((major, minor)) => Err(format!(
            "mod host API {major}.{minor} is older than the required {}.{}",
            MIN_HOST_API.0, MIN_HOST_API.1
        )),
        Err(e) => Err(e.to_string()),
    }
}

impl Stagehand {
    /// Check the host, run startup recovery against the override ledger, and
    /// build the services. Must be called inside a tokio runtime.
    pub fn start(config: StagehandConfig, host: Arc<dyn ModHost>, main_thread: MainThread) -> Self {
        if let Err(reason) = check_host(host.as_ref()) {
            tracing::warn!(reason = %reason, "Mod host unavailable, starting disabled");
            return Self {
                state: State::Disabled(reason),
            };
        }

        let policy = SavePolicy::from_config(&config);
        let cache_path = config
            .resolved_cache_path()
            .unwrap_or_else(|| PathBuf::from("mod_cache.json"));
        let ledger_path = config
            .resolved_ledger_path()
            .unwrap_or_else(|| PathBuf::from("override_ledger.json"));

        let cache = Arc::new(ModCache::new(cache_path).with_save_policy(policy));
        let scanner = Arc::new(ScanCoordinator::new(
            Arc::clone(&host),
            cache,
            PathClassifier::new(config.noise_ratio),
        ));
        let ledger = Arc::new(OverrideLedger::open(ledger_path, policy));
        let engine = ActivationEngine::new(host, Arc::clone(&scanner), ledger, main_thread, &config);
        engine.recover();

        tracing::info!("Stagehand started");
        Self {
            state: State::Enabled(Box::new(Services { scanner, engine })),
        }
    }

    fn services(&self) -> Result<&Services, ActivationError> {
        match &self.state {
            State::Enabled(services) => Ok(services),
            State::Disabled(reason) => Err(ActivationError::Unavailable(reason.clone())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.state, State::Enabled(_))
    }

    /// Why the facade is disabled, if it is
    pub fn disabled_reason(&self) -> Option<&str> {
        match &self.state {
            State::Disabled(reason) => Some(reason),
            State::Enabled(_) => None,
        }
    }

    pub fn cache(&self) -> Option<&Arc<ModCache>> {
        self.services().ok().map(|s| s.scanner.cache())
    }

    pub fn active_preset(&self) -> Option<ActiveMarker> {
        self.services().ok().and_then(|s| s.engine.ledger().active())
    }

    // ─── Scans ──────────────────────────────────────────────────────────────

    pub fn start_scan(&self, force: bool) -> Option<JoinHandle<ScanOutcome>> {
        self.services().ok()?.scanner.start_scan(force)
    }

    pub fn on_package_added(&self, id: &str) -> Result<(), HostError> {
        match self.services() {
            Ok(s) => s.scanner.on_package_added(id),
            Err(_) => Ok(()),
        }
    }

    pub fn on_package_deleted(&self, id: &str) {
        if let Ok(s) = self.services() {
            s.scanner.on_package_deleted(id);
        }
    }

    pub fn on_package_moved(&self, old: &str, new: &str) {
        if let Ok(s) = self.services() {
            s.scanner.on_package_moved(old, new);
        }
    }

    // ─── Activation ─────────────────────────────────────────────────────────

    pub async fn activate(
        &self,
        preset: &Preset,
        variant: Option<&str>,
    ) -> Result<ActivationReport, ActivationError> {
        self.services()?.engine.activate(preset, variant).await
    }

    pub async fn reset(&self) -> Result<RollbackSummary, ActivationError> {
        self.services()?.engine.reset().await
    }

    /// Conflicts `preset` would suppress, without applying anything.
    /// Blocks on host calls.
    pub fn conflicts_for(&self, preset: &Preset) -> Result<Vec<String>, ActivationError> {
        self.services()?.engine.conflicts_for(preset)
    }

    pub async fn wait_idle(&self) {
        if let Ok(s) = self.services() {
            s.engine.wait_idle().await;
        }
    }
}
