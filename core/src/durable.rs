//! Crash-safe file writes shared by the cache and the ledger

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use stagehand_types::StagehandConfig;

/// How hard to try before giving up on a durable write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavePolicy {
    pub retries: u32,
    /// Delay before retry `n` is `backoff * n`
    pub backoff: Duration,
}

impl Default for SavePolicy {
    fn default() -> Self {
        Self::from_config(&StagehandConfig::default())
    }
}

impl SavePolicy {
    pub fn from_config(config: &StagehandConfig) -> Self {
        Self {
            retries: config.save_retries,
            backoff: Duration::from_millis(config.save_backoff_ms),
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write through a sibling temp file and rename over the target, so readers
/// never see a half-written file
fn write_once(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

/// Blocking write with bounded retries. Must not be called from an async
/// worker thread.
pub fn write_with_retries(path: &Path, contents: &[u8], policy: SavePolicy) -> io::Result<()> {
    let attempts = policy.retries.max(1);
    let mut attempt = 1;
    loop {
        match write_once(path, contents) {
            Ok(()) => return Ok(()),
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    path = %path.display(),
                    attempt,
                    error = %e,
                    "Durable write failed, retrying"
                );
                std::thread::sleep(policy.backoff * attempt);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_creates_parent_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("file.json");
        write_with_retries(&path, b"{}", SavePolicy::default()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_write_gives_up_after_retries() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes every rename fail
        let path = dir.path().join("blocked");
        fs::create_dir_all(path.join("inner")).unwrap();
        let policy = SavePolicy {
            retries: 2,
            backoff: Duration::from_millis(1),
        };
        assert!(write_with_retries(&path, b"{}", policy).is_err());
    }
}
