use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use stagehand_core::cache::ScanOutcome;
use stagehand_core::catalog::EffectCatalog;
use stagehand_core::classify::{
    AnimationCategory, ChangedItemClassifier, Classification, PathClassifier, merge,
};
use stagehand_core::config;
use stagehand_core::host::{AnimationSurface, ChangedItemMeta, SnapshotHost};
use stagehand_core::main_thread::{self, MainThreadPump};
use stagehand_core::Stagehand;
use stagehand_types::{Preset, PresetBook, StagehandConfig};

pub fn load_config(path: Option<&Path>, data_dir: Option<&Path>) -> StagehandConfig {
    let mut config = match path {
        Some(path) => config::load_config_from(path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Using default config");
            StagehandConfig::default()
        }),
        None => config::load_config_or_default(),
    };
    if let Some(dir) = data_dir {
        config.cache_path = Some(dir.join("mod_cache.json"));
        config.ledger_path = Some(dir.join("override_ledger.json"));
    }
    config
}

// ─── Classify ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ClassifyOutput {
    classification: Classification,
    matched_paths: Vec<String>,
    excluded_paths: usize,
    noise_paths: usize,
    matched_items: Vec<String>,
}

pub fn classify(config: &StagehandConfig, paths: &[String], items: &[String]) -> Result<(), String> {
    let path_report = PathClassifier::new(config.noise_ratio).classify(paths);
    let items: BTreeMap<String, ChangedItemMeta> = items
        .iter()
        .map(|item| (item.clone(), ChangedItemMeta::default()))
        .collect();
    let item_report = ChangedItemClassifier::classify(&items);

    let output = ClassifyOutput {
        classification: merge(&path_report.classification, &item_report.classification),
        matched_paths: path_report.matched_paths,
        excluded_paths: path_report.excluded_paths,
        noise_paths: path_report.noise_paths,
        matched_items: item_report.matched_items,
    };
    let json = serde_json::to_string_pretty(&output).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

// ─── Library commands ───────────────────────────────────────────────────────

/// Prints surface calls instead of animating anything
struct PrintSurface;

impl AnimationSurface for PrintSurface {
    fn play_effect(&mut self, command: &str) {
        println!("  surface: play {command}");
    }

    fn set_pose_slot(&mut self, category: AnimationCategory, slot: u8) {
        println!("  surface: set {category} slot {slot}");
    }

    fn request_redraw(&mut self) {
        println!("  surface: redraw");
    }

    fn cycle_pose_to_slot(&mut self, slot: u8) {
        println!("  surface: cycle to slot {slot}");
    }

    fn current_posture(&self) -> Option<AnimationCategory> {
        None
    }
}

fn open(
    config: StagehandConfig,
    library: &Path,
) -> Result<(Stagehand, MainThreadPump, Arc<SnapshotHost>), String> {
    let host = Arc::new(SnapshotHost::load(library).map_err(|e| e.to_string())?);
    let (main_thread, pump) = main_thread::channel();
    let stagehand = Stagehand::start(config, host.clone(), main_thread);
    if let Some(reason) = stagehand.disabled_reason() {
        return Err(reason.to_string());
    }
    Ok((stagehand, pump, host))
}

async fn run_scan(stagehand: &Stagehand, force: bool) -> Result<ScanOutcome, String> {
    let handle = stagehand
        .start_scan(force)
        .ok_or_else(|| "a scan is already running".to_string())?;
    match handle.await.map_err(|e| e.to_string())? {
        ScanOutcome::Failed(e) => Err(e.to_string()),
        outcome => Ok(outcome),
    }
}

fn load_preset(presets: &Path, key: &str) -> Result<Preset, String> {
    let content = fs::read_to_string(presets).map_err(|e| format!("{}: {e}", presets.display()))?;
    let book: PresetBook = toml::from_str(&content).map_err(|e| e.to_string())?;
    book.find(key)
        .cloned()
        .ok_or_else(|| format!("no preset named {key}"))
}

fn display_name(stagehand: &Stagehand, id: &str) -> String {
    stagehand
        .cache()
        .and_then(|cache| cache.get(id))
        .map(|record| record.display_name)
        .unwrap_or_else(|| id.to_string())
}

pub async fn scan(config: StagehandConfig, library: &Path, force: bool) -> Result<(), String> {
    let (stagehand, _pump, _host) = open(config, library)?;
    let outcome = run_scan(&stagehand, force).await?;
    if let ScanOutcome::Completed {
        classified,
        removed,
        persisted,
    } = outcome
    {
        println!("classified {classified}, removed {removed}, saved: {persisted}");
    }

    let Some(cache) = stagehand.cache() else {
        return Ok(());
    };
    let mut by_category: BTreeMap<AnimationCategory, usize> = BTreeMap::new();
    for record in cache.snapshot().values() {
        *by_category.entry(record.category).or_default() += 1;
    }
    for (category, count) in by_category {
        println!("  {category:<20} {count}");
    }
    Ok(())
}

pub async fn conflicts(
    config: StagehandConfig,
    library: &Path,
    presets: &Path,
    key: &str,
) -> Result<(), String> {
    let preset = load_preset(presets, key)?;
    let (stagehand, _pump, _host) = open(config, library)?;
    run_scan(&stagehand, false).await?;

    let found = stagehand
        .conflicts_for(&preset)
        .map_err(|e| e.to_string())?;
    if found.is_empty() {
        println!("{}: no conflicts", preset.name);
    }
    for id in found {
        println!("{id}\t{}", display_name(&stagehand, &id));
    }
    Ok(())
}

pub async fn activate(
    config: StagehandConfig,
    library: &Path,
    presets: &Path,
    key: &str,
    variant: Option<&str>,
) -> Result<(), String> {
    let preset = load_preset(presets, key)?;
    let (stagehand, mut pump, host) = open(config, library)?;
    run_scan(&stagehand, false).await?;

    let report = stagehand
        .activate(&preset, variant)
        .await
        .map_err(|e| e.to_string())?;
    stagehand.wait_idle().await;

    println!("activated {} in collection {}", preset.name, report.collection);
    pump.pump(&mut PrintSurface);
    for ((_, id), applied) in host.overrides() {
        let state = if applied.enabled { "enabled" } else { "disabled" };
        println!(
            "  {state:<8} priority {:<5} {}",
            applied.priority,
            display_name(&stagehand, &id)
        );
    }
    Ok(())
}

pub fn list_commands() -> Result<(), String> {
    for command in EffectCatalog::assignable_commands() {
        println!("{command}");
    }
    Ok(())
}
