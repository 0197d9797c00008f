//! Loading and storing [`StagehandConfig`] through confy

use std::path::Path;

use stagehand_types::StagehandConfig;

const APP_NAME: &str = "stagehand";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(#[source] confy::ConfyError),

    #[error("failed to store config: {0}")]
    Store(#[source] confy::ConfyError),
}

/// Load the user's config, creating a default file on first run
pub fn load_config() -> Result<StagehandConfig, ConfigError> {
    confy::load(APP_NAME, None).map_err(ConfigError::Load)
}

/// Like [`load_config`], falling back to defaults when the file is unusable
pub fn load_config_or_default() -> StagehandConfig {
    load_config().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Using default config");
        StagehandConfig::default()
    })
}

pub fn store_config(config: &StagehandConfig) -> Result<(), ConfigError> {
    confy::store(APP_NAME, None, config).map_err(ConfigError::Store)
}

pub fn load_config_from(path: &Path) -> Result<StagehandConfig, ConfigError> {
    confy::load_path(path).map_err(ConfigError::Load)
}

pub fn store_config_to(path: &Path, config: &StagehandConfig) -> Result<(), ConfigError> {
    confy::store_path(path, config).map_err(ConfigError::Store)
}
