//! Library scan scenarios: supersession, persistence, notifications

mod common;

use std::fs;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use stagehand_core::cache::{CacheDocument, ModCache, ScanCoordinator, ScanOutcome};
use stagehand_core::classify::{AnimationCategory, PathClassifier};
use stagehand_core::host::SnapshotPackage;

use common::{Gate, TestHost, library};

fn coordinator(host: Arc<TestHost>, path: &std::path::Path) -> Arc<ScanCoordinator> {
    let cache = Arc::new(ModCache::new(path));
    Arc::new(ScanCoordinator::new(host, cache, PathClassifier::default()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_forced_rescan_supersedes_running_scan() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mod_cache.json");
    let (gate, control) = Gate::new();
    let host = Arc::new(TestHost::new(library()).with_list_gate(gate));
    let scanner = coordinator(host, &path);

    let slow = scanner.start_scan(false).expect("first scan starts");
    control.entered.await.unwrap();
    let slow_generation = scanner.generation();

    // An unforced request while running is ignored
    assert!(scanner.start_scan(false).is_none());
    assert_eq!(scanner.generation(), slow_generation);

    let fast = scanner.start_scan(true).expect("forced scan starts");
    assert_eq!(scanner.generation(), slow_generation + 1);
    let outcome = fast.await.unwrap();
    assert_eq!(
        outcome,
        ScanOutcome::Completed {
            classified: 8,
            removed: 0,
            persisted: true,
        }
    );

    let cache = Arc::clone(scanner.cache());
    let records_after_fast = cache.snapshot();
    let file_after_fast = fs::read(&path).unwrap();

    control.release.send(()).unwrap();
    assert_eq!(slow.await.unwrap(), ScanOutcome::Superseded);

    // The stale scan wrote nothing
    assert_eq!(*cache.snapshot(), *records_after_fast);
    assert_eq!(fs::read(&path).unwrap(), file_after_fast);
    assert!(cache.is_ready());
    assert!(!scanner.is_running());
}

#[tokio::test]
async fn test_cache_file_round_trip_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mod_cache.json");
    let scanner = coordinator(Arc::new(TestHost::new(library())), &path);
    scanner.start_scan(false).unwrap().await.unwrap();

    let written = fs::read_to_string(&path).unwrap();
    let doc = CacheDocument::from_json(&written).expect("current version");
    let reserialized = doc.to_json().unwrap();
    assert_eq!(written, reserialized);

    let again = CacheDocument::from_json(&reserialized).unwrap().to_json().unwrap();
    assert_eq!(reserialized, again);
}

#[tokio::test]
async fn test_second_run_reuses_durable_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mod_cache.json");

    let first = coordinator(Arc::new(TestHost::new(library())), &path);
    first.start_scan(false).unwrap().await.unwrap();
    let first_records = first.cache().snapshot();

    let host = Arc::new(TestHost::new(library()));
    host.inner.remove_package("clap");
    let second = coordinator(host, &path);
    let outcome = second.start_scan(false).unwrap().await.unwrap();
    assert_eq!(
        outcome,
        ScanOutcome::Completed {
            classified: 0,
            removed: 1,
            persisted: true,
        }
    );
    assert_eq!(second.cache().len(), first_records.len() - 1);
    assert_eq!(second.cache().get("gold-a"), first_records.get("gold-a").cloned());
}

#[tokio::test]
async fn test_unchanged_library_does_not_rewrite_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mod_cache.json");
    let scanner = coordinator(Arc::new(TestHost::new(library())), &path);
    scanner.start_scan(false).unwrap().await.unwrap();

    let outcome = scanner.start_scan(false).unwrap().await.unwrap();
    assert_eq!(
        outcome,
        ScanOutcome::Completed {
            classified: 0,
            removed: 0,
            persisted: false,
        }
    );
}

#[tokio::test]
async fn test_scan_classifies_library() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = coordinator(
        Arc::new(TestHost::new(library())),
        &dir.path().join("mod_cache.json"),
    );
    scanner.start_scan(false).unwrap().await.unwrap();
    let cache = scanner.cache();

    let gold = cache.get("gold-a").unwrap();
    assert_eq!(gold.category, AnimationCategory::Effect);
    assert_eq!(gold.affected_commands, vec!["/golddance".to_string()]);
    assert_eq!(gold.display_name, "Gold Dance A");

    let text_gold = cache.get("gold-b").unwrap();
    assert_eq!(text_gold.affected_commands, vec!["/golddance".to_string()]);

    let sit = cache.get("sit-text").unwrap();
    assert_eq!(sit.category, AnimationCategory::SeatedPose);
    assert!(sit.pose_slots.is_empty());
}

#[tokio::test]
async fn test_host_notifications_update_cache_incrementally() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mod_cache.json");
    let host = Arc::new(TestHost::new(library()));
    let scanner = coordinator(Arc::clone(&host), &path);
    scanner.start_scan(false).unwrap().await.unwrap();
    let generation = scanner.generation();

    host.inner.insert_package(
        "wave",
        SnapshotPackage::new("Big Wave").with_paths(&["bt_common/emote/wave.pap"]),
    );
    scanner.on_package_added("wave").unwrap();
    assert_eq!(
        scanner.cache().get("wave").unwrap().affected_commands,
        vec!["/wave".to_string()]
    );

    host.inner.rename_package("wave", "wave-renamed");
    scanner.on_package_moved("wave", "wave-renamed");
    assert!(!scanner.cache().has("wave"));
    assert_eq!(scanner.cache().get("wave-renamed").unwrap().display_name, "Big Wave");

    scanner.on_package_deleted("wave-renamed");
    assert!(!scanner.cache().has("wave-renamed"));

    // None of this started a scan
    assert_eq!(scanner.generation(), generation);
    let persisted = ModCache::new(&path).load_from_durable().unwrap();
    assert!(!persisted.contains_key("wave-renamed"));
    assert!(persisted.contains_key("gold-a"));
}

#[tokio::test]
async fn test_host_failure_is_retried_by_next_scan() {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(TestHost::new(library()));
    host.fail_asset_paths_once("gold-a");
    let scanner = coordinator(Arc::clone(&host), &dir.path().join("mod_cache.json"));

    let first = scanner.start_scan(false).unwrap().await.unwrap();
    assert_eq!(
        first,
        ScanOutcome::Completed {
            classified: 7,
            removed: 0,
            persisted: true,
        }
    );
    assert!(!scanner.cache().has("gold-a"));

    let second = scanner.start_scan(false).unwrap().await.unwrap();
    assert_eq!(
        second,
        ScanOutcome::Completed {
            classified: 1,
            removed: 0,
            persisted: true,
        }
    );
    let gold = scanner.cache().get("gold-a").unwrap();
    assert!(gold.is_recognized);
    assert_eq!(gold.affected_commands, vec!["/golddance".to_string()]);
}
