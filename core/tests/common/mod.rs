//! Shared fixtures for the scenario tests
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};

use stagehand_core::classify::AnimationCategory;
use stagehand_core::host::{
    AnimationSurface, ChangedItemMeta, Collection, HostError, LibrarySnapshot, ModHost,
    PackageSettings, SnapshotHost, SnapshotPackage, TemporaryOverride,
};
use stagehand_core::{MainThreadPump, Preset, Stagehand, StagehandConfig};
use tokio::sync::oneshot;

// ─── Gates ──────────────────────────────────────────────────────────────────

/// Blocks the first call that passes through it until the test releases it
pub struct Gate {
    armed: AtomicBool,
    entered: Mutex<Option<oneshot::Sender<()>>>,
    release: Mutex<mpsc::Receiver<()>>,
}

pub struct GateControl {
    pub entered: oneshot::Receiver<()>,
    pub release: mpsc::Sender<()>,
}

impl Gate {
    pub fn new() -> (Arc<Gate>, GateControl) {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let gate = Gate {
            armed: AtomicBool::new(true),
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(release_rx),
        };
        (
            Arc::new(gate),
            GateControl {
                entered: entered_rx,
                release: release_tx,
            },
        )
    }

    fn pass(&self) {
        if !self.armed.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(tx) = self.entered.lock().unwrap().take() {
            let _ = tx.send(());
        }
        let _ = self.release.lock().unwrap().recv();
    }
}

// ─── Host ───────────────────────────────────────────────────────────────────

/// Snapshot host with injectable delays and failures
pub struct TestHost {
    pub inner: SnapshotHost,
    list_gate: Option<Arc<Gate>>,
    collection_gate: Option<Arc<Gate>>,
    failing_overrides: Mutex<BTreeSet<String>>,
    flaky_paths: Mutex<BTreeSet<String>>,
}

impl TestHost {
    pub fn new(library: LibrarySnapshot) -> Self {
        Self {
            inner: SnapshotHost::new(library),
            list_gate: None,
            collection_gate: None,
            failing_overrides: Mutex::new(BTreeSet::new()),
            flaky_paths: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn with_list_gate(mut self, gate: Arc<Gate>) -> Self {
        self.list_gate = Some(gate);
        self
    }

    pub fn with_collection_gate(mut self, gate: Arc<Gate>) -> Self {
        self.collection_gate = Some(gate);
        self
    }

    /// Make every `set_temporary_override` for `id` fail
    pub fn fail_overrides_for(&self, id: &str) {
        self.failing_overrides.lock().unwrap().insert(id.to_string());
    }

    /// Make the next `asset_paths` call for `id` fail
    pub fn fail_asset_paths_once(&self, id: &str) {
        self.flaky_paths.lock().unwrap().insert(id.to_string());
    }

    pub fn overrides(&self) -> BTreeMap<(String, String), TemporaryOverride> {
        self.inner.overrides()
    }
}

impl ModHost for TestHost {
    fn api_version(&self) -> Result<(u32, u32), HostError> {
        self.inner.api_version()
    }

    fn list_packages(&self) -> Result<BTreeMap<String, String>, HostError> {
        if let Some(gate) = &self.list_gate {
            gate.pass();
        }
        self.inner.list_packages()
    }

    fn asset_paths(&self, id: &str) -> Result<Vec<String>, HostError> {
        if self.flaky_paths.lock().unwrap().remove(id) {
            return Err(HostError::Unavailable("injected failure".to_string()));
        }
        self.inner.asset_paths(id)
    }

    fn changed_items(&self, id: &str) -> Result<BTreeMap<String, ChangedItemMeta>, HostError> {
        self.inner.changed_items(id)
    }

    fn permanent_settings(&self, collection: &str, id: &str) -> Result<PackageSettings, HostError> {
        self.inner.permanent_settings(collection, id)
    }

    fn set_temporary_override(
        &self,
        collection: &str,
        id: &str,
        settings: TemporaryOverride,
    ) -> Result<(), HostError> {
        if self.failing_overrides.lock().unwrap().contains(id) {
            return Err(HostError::Rejected {
                package: id.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.inner.set_temporary_override(collection, id, settings)
    }

    fn remove_temporary_override(&self, collection: &str, id: &str) -> Result<(), HostError> {
        self.inner.remove_temporary_override(collection, id)
    }

    fn current_collection(&self) -> Result<Collection, HostError> {
        if let Some(gate) = &self.collection_gate {
            gate.pass();
        }
        self.inner.current_collection()
    }
}

// ─── Surface ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSurface {
    pub posture: Option<AnimationCategory>,
    pub calls: Vec<String>,
}

impl AnimationSurface for RecordingSurface {
    fn play_effect(&mut self, command: &str) {
        self.calls.push(format!("play {command}"));
    }

    fn set_pose_slot(&mut self, category: AnimationCategory, slot: u8) {
        self.calls.push(format!("slot {category} {slot}"));
    }

    fn request_redraw(&mut self) {
        self.calls.push("redraw".to_string());
    }

    fn cycle_pose_to_slot(&mut self, slot: u8) {
        self.calls.push(format!("cycle {slot}"));
    }

    fn current_posture(&self) -> Option<AnimationCategory> {
        self.posture
    }
}

// ─── Library ────────────────────────────────────────────────────────────────

pub const COLLECTION: &str = "default";

/// A small library with two golden-dance packages, three seated packages,
/// a clap package and a protected golden dance
pub fn library() -> LibrarySnapshot {
    LibrarySnapshot::default()
        .with_package(
            "gold-a",
            SnapshotPackage::new("Gold Dance A")
                .with_paths(&["chara/human/c0101/animation/a0001/bt_common/emote/dance04_loop.pap"])
                .with_priority(5),
        )
        .with_package(
            "gold-b",
            SnapshotPackage::new("Gold Dance B")
                .with_item("Emote: Golden Dance", ChangedItemMeta::emote())
                .with_priority(2),
        )
        .with_package(
            "keep-gold",
            SnapshotPackage::new("Keep Gold").with_paths(&["bt_common/emote/golddance.pap"]),
        )
        .with_package(
            "clap",
            SnapshotPackage::new("Loud Clap").with_paths(&["bt_common/emote/clap_loop.pap"]),
        )
        .with_package(
            "seat-1",
            SnapshotPackage::new("Seat One").with_paths(&["bt_common/emote/s_pose01_loop.pap"]),
        )
        .with_package(
            "sit-text",
            SnapshotPackage::new("Sitting Fix").with_item("Sit", ChangedItemMeta::emote()),
        )
        .with_package(
            "seat-3",
            SnapshotPackage::new("Seat Three").with_paths(&["bt_common/emote/s_pose03_loop.pap"]),
        )
        .with_package(
            "old-gold",
            SnapshotPackage::new("Old Gold")
                .with_paths(&["bt_common/emote/dance04.pap"])
                .disabled(),
        )
}

pub fn config(dir: &Path) -> StagehandConfig {
    StagehandConfig {
        protected_packages: BTreeSet::from(["keep-gold".to_string()]),
        cache_path: Some(dir.join("mod_cache.json")),
        ledger_path: Some(dir.join("override_ledger.json")),
        save_backoff_ms: 1,
        ..Default::default()
    }
}

pub fn gold_a() -> Preset {
    Preset::new("x", "Gold A").with_package("gold-a")
}

pub fn gold_b() -> Preset {
    Preset::new("y", "Gold B").with_package("gold-b")
}

pub fn clap() -> Preset {
    Preset::new("z", "Clap").with_package("clap")
}

/// Start a facade over `host` and wait for the first scan
pub async fn start_scanned(host: Arc<TestHost>, dir: &Path) -> (Stagehand, MainThreadPump) {
    let (main_thread, pump) = stagehand_core::main_thread::channel();
    let stagehand = Stagehand::start(config(dir), host, main_thread);
    let scan = stagehand.start_scan(false).expect("scan starts");
    scan.await.expect("scan task");
    (stagehand, pump)
}

pub fn key(id: &str) -> (String, String) {
    (COLLECTION.to_string(), id.to_string())
}
