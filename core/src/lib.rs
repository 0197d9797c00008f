pub mod activation;
pub mod cache;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod conflict;
pub mod durable;
pub mod host;
pub mod main_thread;
pub mod service;

// Re-exports for convenience
pub use activation::{ActivationEngine, ActivationError, ActivationReport, OverrideLedger};
pub use cache::{ModCache, ScanCoordinator, ScanOutcome};
pub use catalog::EffectCatalog;
pub use classify::{AnimationCategory, Classification, ClassificationRecord};
pub use host::{AnimationSurface, ModHost, SnapshotHost};
pub use main_thread::{MainThread, MainThreadPump};
pub use service::Stagehand;
pub use stagehand_types::{Preset, PresetBook, StagehandConfig};
