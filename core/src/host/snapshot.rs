//! In-memory host backed by a library snapshot
//!
//! Used for offline runs from the command line and as the host in tests.
//! Temporary overrides are tracked so callers can inspect what would have
//! been applied to a live host.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::{
    ChangedItemMeta, Collection, HostError, ModHost, PackageSettings, TemporaryOverride,
    MIN_HOST_API,
};

fn default_api_version() -> (u32, u32) {
    MIN_HOST_API
}

/// One package as exported from a host
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnapshotPackage {
    pub name: String,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub changed_items: BTreeMap<String, ChangedItemMeta>,
    /// Permanent settings, shared by every collection
    #[serde(default)]
    pub settings: PackageSettings,
}

impl SnapshotPackage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: PackageSettings {
                enabled: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_paths(mut self, paths: &[&str]) -> Self {
        self.paths = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_item(mut self, text: &str, meta: ChangedItemMeta) -> Self {
        self.changed_items.insert(text.to_string(), meta);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.settings.priority = priority;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.settings.enabled = false;
        self
    }
}

/// Serialized form of a host library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    #[serde(default = "default_api_version")]
    pub api_version: (u32, u32),
    #[serde(default)]
    pub collection: Collection,
    /// Package id -> package
    #[serde(default)]
    pub packages: BTreeMap<String, SnapshotPackage>,
}

impl Default for LibrarySnapshot {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            collection: Collection {
                id: "default".to_string(),
                name: "Default".to_string(),
            },
            packages: BTreeMap::new(),
        }
    }
}

impl LibrarySnapshot {
    pub fn with_package(mut self, id: impl Into<String>, package: SnapshotPackage) -> Self {
        self.packages.insert(id.into(), package);
        self
    }
}

/// A [`ModHost`] that answers from a [`LibrarySnapshot`].
pub struct SnapshotHost {
    library: RwLock<LibrarySnapshot>,
    /// (collection, package) -> override
    overrides: Mutex<BTreeMap<(String, String), TemporaryOverride>>,
}

impl SnapshotHost {
    pub fn new(library: LibrarySnapshot) -> Self {
        Self {
            library: RwLock::new(library),
            overrides: Mutex::new(BTreeMap::new()),
        }
    }

    /// Load a snapshot exported as JSON
    pub fn load(path: &Path) -> Result<Self, HostError> {
        let content = fs::read_to_string(path)
            .map_err(|e| HostError::Unavailable(format!("{}: {e}", path.display())))?;
        let library: LibrarySnapshot = serde_json::from_str(&content)
            .map_err(|e| HostError::Unavailable(format!("{}: {e}", path.display())))?;
        tracing::info!(
            path = %path.display(),
            packages = library.packages.len(),
            "Loaded library snapshot"
        );
        Ok(Self::new(library))
    }

    pub fn insert_package(&self, id: impl Into<String>, package: SnapshotPackage) {
        self.library.write().packages.insert(id.into(), package);
    }

    pub fn remove_package(&self, id: &str) -> Option<SnapshotPackage> {
        self.library.write().packages.remove(id)
    }

    pub fn rename_package(&self, old: &str, new: impl Into<String>) -> bool {
        let mut library = self.library.write();
        match library.packages.remove(old) {
            Some(package) => {
                library.packages.insert(new.into(), package);
                true
            }
            None => false,
        }
    }

    pub fn set_collection(&self, collection: Collection) {
        self.library.write().collection = collection;
    }

    pub fn set_api_version(&self, version: (u32, u32)) {
        self.library.write().api_version = version;
    }

    /// Overrides currently applied, keyed by (collection, package)
    pub fn overrides(&self) -> BTreeMap<(String, String), TemporaryOverride> {
        self.overrides.lock().clone()
    }

    pub fn override_for(&self, collection: &str, id: &str) -> Option<TemporaryOverride> {
        self.overrides
            .lock()
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    fn with_package<T>(
        &self,
        id: &str,
        f: impl FnOnce(&SnapshotPackage) -> T,
    ) -> Result<T, HostError> {
        self.library
            .read()
            .packages
            .get(id)
            .map(f)
            .ok_or_else(|| HostError::UnknownPackage(id.to_string()))
    }
}

impl ModHost for SnapshotHost {
    fn api_version(&self) -> Result<(u32, u32), HostError> {
        Ok(self.library.read().api_version)
    }

    fn list_packages(&self) -> Result<BTreeMap<String, String>, HostError> {
        Ok(self
            .library
            .read()
            .packages
            .iter()
            .map(|(id, p)| (id.clone(), p.name.clone()))
            .collect())
    }

    fn asset_paths(&self, id: &str) -> Result<Vec<String>, HostError> {
        self.with_package(id, |p| p.paths.clone())
    }

    fn changed_items(&self, id: &str) -> Result<BTreeMap<String, ChangedItemMeta>, HostError> {
        self.with_package(id, |p| p.changed_items.clone())
    }

    fn permanent_settings(&self, _collection: &str, id: &str) -> Result<PackageSettings, HostError> {
        self.with_package(id, |p| p.settings.clone())
    }

    fn set_temporary_override(
        &self,
        collection: &str,
        id: &str,
        settings: TemporaryOverride,
    ) -> Result<(), HostError> {
        self.with_package(id, |_| ())?;
        self.overrides
            .lock()
            .insert((collection.to_string(), id.to_string()), settings);
        Ok(())
    }

    fn remove_temporary_override(&self, collection: &str, id: &str) -> Result<(), HostError> {
        // Removing an override that is not there is not an error for the host
        self.overrides
            .lock()
            .remove(&(collection.to_string(), id.to_string()));
        Ok(())
    }

    fn current_collection(&self) -> Result<Collection, HostError> {
        Ok(self.library.read().collection.clone())
    }
}
