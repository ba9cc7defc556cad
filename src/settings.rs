//! Per-repository settings — small JSON files under the user data dir.
//!
//! File names are derived from a stable hash of the canonical repository
//! path, so settings survive across sessions without touching the
//! repository itself.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GroveError;
use crate::{canonical_repo_path, data_dir, stable_hash};

/// A manual ordering decision: `left` sorts before `right` when the
/// branch order is otherwise undetermined.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchOrderPair {
    pub left: String,
    pub right: String,
}

/// Settings persisted per repository.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoSettings {
    /// Manual tie-breaks for the display order of branches.
    #[serde(default)]
    pub branch_order: Vec<BranchOrderPair>,
}

impl RepoSettings {
    /// True when the pair (left, right) was manually ordered this way.
    #[must_use]
    pub fn orders_before(&self, left: &str, right: &str) -> bool {
        self.branch_order.iter().any(|p| p.left == left && p.right == right)
    }

    /// Record that `left` sorts before `right`, replacing any opposite
    /// decision for the same pair.
    pub fn set_order(&mut self, left: &str, right: &str) {
        self.branch_order.retain(|p| !(p.left == right && p.right == left));
        if !self.orders_before(left, right) {
            self.branch_order.push(BranchOrderPair {
                left: left.to_string(),
                right: right.to_string(),
            });
        }
    }
}

/// Settings file path for a repository.
#[must_use]
pub fn settings_path_for(repo_path: &Path) -> PathBuf {
    let canonical = canonical_repo_path(repo_path);
    let hash = stable_hash(&[canonical.to_string_lossy().as_bytes()]);
    data_dir().join(format!("settings-{:016x}.json", hash))
}

/// Load settings for a repository; a missing file yields defaults.
pub fn load_settings(repo_path: &Path) -> Result<RepoSettings, GroveError> {
    load_settings_from(&settings_path_for(repo_path))
}

pub fn load_settings_from(path: &Path) -> Result<RepoSettings, GroveError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(serde_json::from_str(&text)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
            Ok(RepoSettings::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Save settings for a repository, creating the data directory as needed.
pub fn save_settings(repo_path: &Path, settings: &RepoSettings) -> Result<(), GroveError> {
    save_settings_to(&settings_path_for(repo_path), settings)
}

pub fn save_settings_to(path: &Path, settings: &RepoSettings) -> Result<(), GroveError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, serde_json::to_string_pretty(settings)?)?;
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────
