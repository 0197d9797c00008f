//! Shared configuration and preset records for Stagehand.
//!
//! These types are plain serde records so the CLI, the core engine and any
//! frontend agree on one on-disk shape.

pub mod config;
pub mod preset;

pub use config::{StagehandConfig, DEFAULT_PRIORITY_BOOST, DEFAULT_NOISE_RATIO};
pub use preset::{Preset, PresetBook, PresetVariant, OptionSelection};
