//! Branch-name override store, round-tripped through git's object store.
//!
//! A small JSON document mapping 6-character short commit ids to an
//! override branch name. Stored as a blob under a reserved ref so it can
//! be fetched and pushed like any other ref, which makes the overrides
//! follow the repository between machines without a separate backend.
//!
//! Names set explicitly by a person carry a `+` marker prefix and take
//! precedence over inferred entries when two stores are merged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::error::GroveError;
use crate::git::{run_git, run_git_with_input};

/// Reserved ref the override blob lives under.
pub const METADATA_REF: &str = "refs/grove/metadata";

/// Marker prefixed to names a person chose explicitly.
pub const USER_MARK: char = '+';

/// An override looked up for one commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchOverride {
    pub name: String,
    /// True when a person chose this name, false when it was inferred
    /// and cached.
    pub set_by_user: bool,
}

/// Map from short commit id to (possibly marked) override name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetadataMap {
    entries: HashMap<String, String>,
}

impl MetadataMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Look up the override for a short commit id, decoding the user mark.
    #[must_use]
    pub fn get(&self, sid: &str) -> Option<BranchOverride> {
        self.entries.get(sid).map(|raw| match raw.strip_prefix(USER_MARK) {
            Some(name) => BranchOverride { name: name.to_string(), set_by_user: true },
            None => BranchOverride { name: raw.clone(), set_by_user: false },
        })
    }

    /// Record an override for a short commit id.
    pub fn set(&mut self, sid: &str, name: &str, set_by_user: bool) {
        let value = if set_by_user { format!("{}{}", USER_MARK, name) } else { name.to_string() };
        self.entries.insert(sid.to_string(), value);
    }

    pub fn remove(&mut self, sid: &str) {
        self.entries.remove(sid);
    }

    /// Key-wise union with another store. User-marked entries win over
    /// inferred entries for the same key; otherwise `self` wins.
    pub fn merge(&mut self, other: &MetadataMap) {
        for (sid, value) in &other.entries {
            match self.entries.get(sid) {
                None => {
                    self.entries.insert(sid.clone(), value.clone());
                }
                Some(existing) => {
                    let ours_user = existing.starts_with(USER_MARK);
                    let theirs_user = value.starts_with(USER_MARK);
                    if theirs_user && !ours_user {
                        self.entries.insert(sid.clone(), value.clone());
                    }
                }
            }
        }
    }

    pub fn to_json(&self) -> Result<String, GroveError> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    pub fn from_json(text: &str) -> Result<Self, GroveError> {
        let entries: HashMap<String, String> = serde_json::from_str(text)?;
        Ok(Self { entries })
    }
}

// ─── Error classification ───────────────────────────────────────────

/// Whether a git error means "the ref/object simply does not exist yet".
///
/// Matching on git's human-readable error text is a fragile contract
/// inherited from treating that text as a de facto error code; the exact
/// patterns are part of the external behavior and kept as-is.
#[must_use]
pub fn is_missing_ref_error(message: &str) -> bool {
    const PATTERNS: &[&str] = &[
        "Not a valid object name",
        "unknown revision",
        "bad revision",
        "couldn't find remote ref",
        "does not exist",
    ];
    PATTERNS.iter().any(|p| message.contains(p))
}

// ─── Store ──────────────────────────────────────────────────────────

/// Per-repository override store with a non-reentrant sync guard.
///
/// Only one writer (the user's own actions) is expected; a second
/// concurrent push/pull is skipped rather than queued. Concurrent
/// external modification during a merge is a known, accepted race.
pub struct MetadataStore {
    repo_path: PathBuf,
    syncing: AtomicBool,
}

impl MetadataStore {
    #[must_use]
    pub fn new(repo_path: &Path) -> Self {
        Self { repo_path: repo_path.to_path_buf(), syncing: AtomicBool::new(false) }
    }

    /// Read the local override blob. A missing ref is an empty store,
    /// not an error.
    pub fn read(&self) -> Result<MetadataMap, GroveError> {
        match run_git(&self.repo_path, &["cat-file", "blob", METADATA_REF]) {
            Ok(text) => MetadataMap::from_json(&text),
            Err(GroveError::GitCommand { message, .. }) if is_missing_ref_error(&message) => {
                debug!("no metadata ref yet, starting empty");
                Ok(MetadataMap::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Write the override blob and point the reserved ref at it.
    pub fn write(&self, map: &MetadataMap) -> Result<(), GroveError> {
        let json = map.to_json()?;
        let oid = run_git_with_input(&self.repo_path, &["hash-object", "-w", "--stdin"], &json)?;
        run_git(&self.repo_path, &["update-ref", METADATA_REF, oid.trim()])?;
        Ok(())
    }

    /// Push the reserved ref to origin. Skipped when a sync is already
    /// in flight.
    pub fn push(&self) -> Result<(), GroveError> {
        if self.syncing.swap(true, Ordering::AcqRel) {
            warn!("metadata sync already in flight, skipping push");
            return Ok(());
        }
        let spec = format!("{}:{}", METADATA_REF, METADATA_REF);
        let result = run_git(&self.repo_path, &["push", "origin", &spec]);
        self.syncing.store(false, Ordering::Release);
        result.map(|_| ())
    }

    /// Fetch the reserved ref from origin and merge it into the local
    /// store. A missing remote ref is an empty remote store.
    pub fn pull(&self) -> Result<MetadataMap, GroveError> {
        if self.syncing.swap(true, Ordering::AcqRel) {
            warn!("metadata sync already in flight, skipping pull");
            return self.read();
        }
        let result = self.pull_inner();
        self.syncing.store(false, Ordering::Release);
        result
    }

    fn pull_inner(&self) -> Result<MetadataMap, GroveError> {
        let spec = format!("+{}:refs/grove/metadata-remote", METADATA_REF);
        match run_git(&self.repo_path, &["fetch", "origin", &spec]) {
            Ok(_) => {}
            Err(GroveError::GitCommand { message, .. }) if is_missing_ref_error(&message) => {
                debug!("no remote metadata ref yet");
                return self.read();
            }
            Err(e) => return Err(e),
        }
        let remote = match run_git(&self.repo_path, &["cat-file", "blob", "refs/grove/metadata-remote"]) {
            Ok(text) => MetadataMap::from_json(&text)?,
            Err(GroveError::GitCommand { message, .. }) if is_missing_ref_error(&message) => {
                MetadataMap::new()
            }
            Err(e) => return Err(e),
        };
        let mut local = self.read()?;
        local.merge(&remote);
        self.write(&local)?;
        Ok(local)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_mark_round_trip() {
        let mut map = MetadataMap::new();
        map.set("abc123", "feature/login", true);
        let entry = map.get("abc123").unwrap();
        assert_eq!(entry.name, "feature/login");
        assert!(entry.set_by_user);
    }

    #[test]
    fn test_inferred_entry_has_no_mark() {
        let mut map = MetadataMap::new();
        map.set("abc123", "main", false);
        let entry = map.get("abc123").unwrap();
        assert_eq!(entry.name, "main");
        assert!(!entry.set_by_user);
    }

    #[test]
    fn test_json_round_trip_preserves_marks() {
        let mut map = MetadataMap::new();
        map.set("aaaaaa", "dev", true);
        map.set("bbbbbb", "main", false);
        let json = map.to_json().unwrap();
        let back = MetadataMap::from_json(&json).unwrap();
        assert_eq!(back, map);
        assert!(back.get("aaaaaa").unwrap().set_by_user);
        assert!(!back.get("bbbbbb").unwrap().set_by_user);
    }

    #[test]
    fn test_merge_user_entry_wins_over_inferred() {
        let mut local = MetadataMap::new();
        local.set("aaaaaa", "guessed", false);
        let mut remote = MetadataMap::new();
        remote.set("aaaaaa", "chosen", true);
        local.merge(&remote);
        let entry = local.get("aaaaaa").unwrap();
        assert_eq!(entry.name, "chosen");
        assert!(entry.set_by_user);
    }

    #[test]
    fn test_merge_local_wins_between_equals() {
        let mut local = MetadataMap::new();
        local.set("aaaaaa", "ours", false);
        let mut remote = MetadataMap::new();
        remote.set("aaaaaa", "theirs", false);
        local.merge(&remote);
        assert_eq!(local.get("aaaaaa").unwrap().name, "ours");
    }

    #[test]
    fn test_merge_adds_missing_keys() {
        let mut local = MetadataMap::new();
        local.set("aaaaaa", "main", false);
        let mut remote = MetadataMap::new();
        remote.set("bbbbbb", "dev", true);
        local.merge(&remote);
        assert_eq!(local.len(), 2);
        assert_eq!(local.get("bbbbbb").unwrap().name, "dev");
    }

    #[test]
    fn test_missing_ref_error_patterns() {
        assert!(is_missing_ref_error(
            "fatal: Not a valid object name refs/grove/metadata"
        ));
        assert!(is_missing_ref_error(
            "fatal: couldn't find remote ref refs/grove/metadata"
        ));
        assert!(!is_missing_ref_error("fatal: unable to access remote"));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(MetadataMap::from_json("not json").is_err());
    }
}
