//! Contracts with the outside world
//!
//! [`ModHost`] is the mod-management host that owns the package library and
//! its settings; [`AnimationSurface`] is the in-game surface that plays
//! effects and switches poses. Neither is implemented here beyond the
//! in-memory [`SnapshotHost`].

mod snapshot;

pub use snapshot::{LibrarySnapshot, SnapshotHost, SnapshotPackage};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stagehand_types::OptionSelection;

use crate::classify::AnimationCategory;

/// Oldest host API this crate knows how to talk to
pub const MIN_HOST_API: (u32, u32) = (5, 0);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("mod host unavailable: {0}")]
    Unavailable(String),

    #[error("unknown package {0}")]
    UnknownPackage(String),

    #[error("unknown collection {0}")]
    UnknownCollection(String),

    #[error("host rejected call for {package}: {reason}")]
    Rejected { package: String, reason: String },
}

/// What kind of game object a changed item refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChangedItemKind {
    Emote,
    Action,
    Equipment,
    Customization,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangedItemMeta {
    #[serde(default)]
    pub kind: ChangedItemKind,
}

impl ChangedItemMeta {
    pub fn new(kind: ChangedItemKind) -> Self {
        Self { kind }
    }

    pub fn emote() -> Self {
        Self::new(ChangedItemKind::Emote)
    }
}

/// A package's user-configured state in one collection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageSettings {
    pub enabled: bool,
    pub priority: i32,
    pub options: OptionSelection,
}

/// Non-persistent settings layered over the permanent ones until removed
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemporaryOverride {
    pub enabled: bool,
    pub priority: i32,
    pub options: OptionSelection,
}

impl TemporaryOverride {
    /// Disable a package, keeping its permanent priority and options
    pub fn disabled(settings: &PackageSettings) -> Self {
        Self {
            enabled: false,
            priority: settings.priority,
            options: settings.options.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
}

/// The mod-management host.
///
/// Calls are synchronous and may block on IPC; callers keep them off async
/// worker threads.
pub trait ModHost: Send + Sync {
    fn api_version(&self) -> Result<(u32, u32), HostError>;

    /// Package id -> display name
    fn list_packages(&self) -> Result<BTreeMap<String, String>, HostError>;

    /// Internal game paths the package replaces
    fn asset_paths(&self, id: &str) -> Result<Vec<String>, HostError>;

    /// Host-provided description of what the package changes
    fn changed_items(&self, id: &str) -> Result<BTreeMap<String, ChangedItemMeta>, HostError>;

    fn permanent_settings(&self, collection: &str, id: &str) -> Result<PackageSettings, HostError>;

    fn set_temporary_override(
        &self,
        collection: &str,
        id: &str,
        settings: TemporaryOverride,
    ) -> Result<(), HostError>;

    fn remove_temporary_override(&self, collection: &str, id: &str) -> Result<(), HostError>;

    fn current_collection(&self) -> Result<Collection, HostError>;
}

/// The in-game animation surface. Only touched from the main thread.
pub trait AnimationSurface {
    fn play_effect(&mut self, command: &str);
    fn set_pose_slot(&mut self, category: AnimationCategory, slot: u8);
    fn request_redraw(&mut self);
    fn cycle_pose_to_slot(&mut self, slot: u8);
    fn current_posture(&self) -> Option<AnimationCategory>;
}

/// True when a host reporting `version` is new enough
pub fn is_supported_api(version: (u32, u32)) -> bool {
    version >= MIN_HOST_API
}
