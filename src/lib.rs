//! # grove — terminal git repository viewer core
//!
//! Reconstructs a stable, human-meaningful branch topology from the raw
//! facts git reports (commits, refs, tags, stashes, working-tree status).
//! Git does not record which branch a commit belonged to once a branch
//! pointer moves or is deleted; the `graph` module infers that ownership,
//! keeps track of where the inference is genuinely ambiguous, and produces
//! ordered display subsets on request.
//!
//! ## Library usage
//!
//! This crate is primarily a CLI tool, but the engine is exposed as a
//! library for benchmarking and integration testing.

use std::path::{Path, PathBuf};

pub mod error;
pub mod git;
pub mod graph;
pub mod service;
pub mod settings;

pub use error::GroveError;

/// Length of the short commit id used for display and metadata keys.
pub const SHORT_ID_LEN: usize = 6;

/// Reserved id of the virtual commit standing in for uncommitted changes.
pub const UNCOMMITTED_ID: &str = "0000000000000000000000000000000000000000";

/// Reserved id of the synthetic commit standing in for history cut off by
/// the log size cap.
pub const TRUNCATED_ID: &str = "ffffffffffffffffffffffffffffffffffffffff";

/// Shorten a full commit id to its display form.
#[must_use]
pub fn short_id(id: &str) -> &str {
    if id.len() > SHORT_ID_LEN { &id[..SHORT_ID_LEN] } else { id }
}

// ─── Stable hashing ─────────────────────────────────────────────────

/// Stable FNV-1a hash (deterministic across Rust versions, unlike `DefaultHasher`).
///
/// Accepts multiple byte slices that are fed into the hash sequentially,
/// allowing callers to combine repository path + a qualifier, etc.
#[must_use]
pub fn stable_hash(parts: &[&[u8]]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;
    let mut hash = FNV_OFFSET;
    for part in parts {
        for &byte in *part {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

/// Base directory for grove's per-repository files (settings).
#[must_use]
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("grove")
}

/// Canonicalize a repository path for hashing, falling back to the raw
/// path when the repository no longer exists on disk.
#[must_use]
pub fn canonical_repo_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}


// ─── Property-based tests (proptest) ─────────────────────────────────
