//! User-facing settings for classification, caching and activation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Priority added on top of a package's permanent priority while its preset is active.
pub const DEFAULT_PRIORITY_BOOST: i32 = 100;

/// Noise paths may outnumber evidence paths by at most this factor.
pub const DEFAULT_NOISE_RATIO: u32 = 2;

const APP_DIR: &str = "stagehand";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagehandConfig {
    /// Added to the target package's permanent priority during activation
    pub priority_boost: i32,

    /// Packages that are never suppressed, whatever they conflict with
    pub protected_packages: BTreeSet<String>,

    /// A package whose unrelated paths exceed `noise_ratio` x its evidence
    /// paths is treated as noise rather than an effect package
    pub noise_ratio: u32,

    /// Attempts made when a durable write fails
    pub save_retries: u32,

    /// Base delay between durable write attempts (grows linearly per attempt)
    pub save_backoff_ms: u64,

    /// Classification cache location (defaults to the config dir)
    pub cache_path: Option<PathBuf>,

    /// Override ledger location (defaults to the config dir)
    pub ledger_path: Option<PathBuf>,
}

impl Default for StagehandConfig {
    fn default() -> Self {
        Self {
            priority_boost: DEFAULT_PRIORITY_BOOST,
            protected_packages: BTreeSet::new(),
            noise_ratio: DEFAULT_NOISE_RATIO,
            save_retries: 3,
            save_backoff_ms: 50,
            cache_path: None,
            ledger_path: None,
        }
    }
}

impl StagehandConfig {
    /// Resolved classification cache path, if a location is available
    pub fn resolved_cache_path(&self) -> Option<PathBuf> {
        self.cache_path
            .clone()
            .or_else(|| default_data_dir().map(|dir| dir.join("mod_cache.json")))
    }

    /// Resolved override ledger path, if a location is available
    pub fn resolved_ledger_path(&self) -> Option<PathBuf> {
        self.ledger_path
            .clone()
            .or_else(|| default_data_dir().map(|dir| dir.join("override_ledger.json")))
    }

    pub fn is_protected(&self, package_id: &str) -> bool {
        self.protected_packages.contains(package_id)
    }
}

/// Default directory for Stagehand's durable files
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}
