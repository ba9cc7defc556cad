//! Commit/branch graph with inferred branch ownership.
//!
//! Commits and branches live in flat, owned vectors addressed by index;
//! every cross-reference (parent, child, owning branch) is an index
//! lookup. That keeps the resolver's retroactive ownership rewrites a
//! localized field update instead of a structural rebuild.
//!
//! Pipeline: [`build`] turns raw git records into the arena, [`resolve`]
//! assigns exactly one owning branch to every commit, [`hierarchy`]
//! computes parent branches and the main branch, [`view`] projects the
//! requested display subset.

use std::collections::HashMap;

use crate::git::WorkStatus;
use crate::git::metadata::MetadataMap;

pub mod build;
pub mod hierarchy;
pub mod resolve;
pub mod subject;
pub mod view;

#[cfg(test)]
pub mod testkit;

/// Index into [`RepoGraph::commits`].
pub type CommitIdx = usize;
/// Index into [`RepoGraph::branches`].
pub type BranchIdx = usize;

/// Branch names treated as the repository's main line. Their candidacy
/// is kept alive arbitrarily far back so trunk history stays assignable.
pub const MAIN_LINE_NAMES: &[&str] = &["main", "master", "trunk"];

/// Priority order for electing the single main branch among roots.
pub const MAIN_BRANCH_PRIORITY: &[&str] =
    &["origin/main", "main", "origin/master", "master", "origin/trunk", "trunk"];

/// Conventional remote alias stripped when comparing local and remote
/// spellings of the same branch.
pub const REMOTE_PREFIX: &str = "origin/";

/// Strip the remote alias so `origin/main` and `main` compare equal.
#[must_use]
pub fn primary_name(name: &str) -> &str {
    name.strip_prefix(REMOTE_PREFIX).unwrap_or(name)
}

/// True for names on the reserved main line (local or remote spelling).
#[must_use]
pub fn is_main_line_name(name: &str) -> bool {
    MAIN_LINE_NAMES.contains(&primary_name(name))
}

// ─── Commit ─────────────────────────────────────────────────────────

/// A graph node: immutable identity from git plus the mutable
/// augmentation fields filled in during resolution.
#[derive(Clone, Debug)]
pub struct Commit {
    pub id: String,
    /// Short display id (also the metadata override key).
    pub sid: String,
    pub parent_ids: Vec<String>,
    pub author: String,
    pub author_time: i64,
    pub commit_time: i64,
    pub subject: String,
    pub message: String,

    /// Owning branch. `None` only before resolution completes.
    pub branch: Option<BranchIdx>,
    /// Branches this commit could belong to, accumulated from live tips
    /// and children during resolution.
    pub candidates: Vec<BranchIdx>,
    pub first_parent: Option<CommitIdx>,
    pub merge_parent: Option<CommitIdx>,
    /// Children reaching this commit through their first parent.
    pub children: Vec<CommitIdx>,
    /// Children reaching this commit through their merge parent.
    pub merge_children: Vec<CommitIdx>,
    /// Live branches whose tip is this commit.
    pub branch_tips: Vec<BranchIdx>,
    pub tags: Vec<String>,

    /// The cascade could not pick a single owner.
    pub is_ambiguous: bool,
    /// The owning branch matches a name independently parsed from a
    /// merge subject.
    pub is_likely: bool,
    /// The owning branch came from a user metadata override.
    pub is_set_by_user: bool,
    /// Synthetic sentinel standing in for history cut off by the cap.
    pub is_truncated: bool,
}

impl Commit {
    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.parent_ids.len() > 1
    }
}

// ─── Branch ─────────────────────────────────────────────────────────

/// A branch: either a live git pointer or a synthetic branch invented
/// because commits had no live owner.
#[derive(Clone, Debug)]
pub struct Branch {
    pub name: String,
    /// Name without remote decoration, used for local/remote pairing.
    pub display_name: String,
    /// True when backed by a live ref in the repository.
    pub is_git_branch: bool,
    pub is_remote: bool,
    pub is_current: bool,
    pub is_detached: bool,
    pub is_main: bool,

    pub tip_id: String,
    /// Oldest commit that is uniquely this branch's own.
    pub bottom_id: String,
    /// Name of the configured or name-paired remote counterpart.
    pub remote_name: Option<String>,
    pub parent: Option<BranchIdx>,
    pub ahead_count: u32,
    pub behind_count: u32,

    pub is_ambiguous: bool,
    /// Tip of the currently unresolved ambiguous stretch.
    pub ambiguous_tip_id: Option<String>,
    /// Branches the ambiguous stretch could belong to.
    pub ambiguous_branches: Vec<BranchIdx>,
    /// For the synthetic other side of a pull merge: the branch the
    /// pull merge landed on.
    pub pull_merge_parent: Option<BranchIdx>,
    /// Tombstone; the arena never shrinks mid-resolution.
    pub is_deleted: bool,
}

impl Branch {
    /// A synthetic branch with the given name and tip.
    #[must_use]
    pub fn synthetic(name: &str, tip_id: &str) -> Self {
        Branch {
            name: name.to_string(),
            display_name: primary_name(name).to_string(),
            is_git_branch: false,
            is_remote: false,
            is_current: false,
            is_detached: false,
            is_main: false,
            tip_id: tip_id.to_string(),
            bottom_id: tip_id.to_string(),
            remote_name: None,
            parent: None,
            ahead_count: 0,
            behind_count: 0,
            is_ambiguous: false,
            ambiguous_tip_id: None,
            ambiguous_branches: Vec::new(),
            pull_merge_parent: None,
            is_deleted: false,
        }
    }
}

// ─── Graph ──────────────────────────────────────────────────────────

/// The full augmented graph for one repository snapshot.
#[derive(Clone, Debug, Default)]
pub struct RepoGraph {
    pub commits: Vec<Commit>,
    /// Commit id → arena index. A missing lookup during resolution is a
    /// corrupted graph and fails fast.
    pub commit_index: HashMap<String, CommitIdx>,
    pub branches: Vec<Branch>,
    pub status: WorkStatus,
    pub metadata: MetadataMap,
    /// The log hit the size cap; a sentinel commit closes the graph.
    pub truncated: bool,
}

impl RepoGraph {
    /// Arena index for a commit id. Panics on an unknown id: ids inside
    /// the graph are a structural invariant, not user input.
    #[must_use]
    pub fn commit_idx(&self, id: &str) -> CommitIdx {
        self.commit_index[id]
    }

    #[must_use]
    pub fn find_commit(&self, id: &str) -> Option<&Commit> {
        self.commit_index.get(id).map(|&i| &self.commits[i])
    }

    /// Find a commit by its short id prefix.
    #[must_use]
    pub fn find_commit_by_sid(&self, sid: &str) -> Option<&Commit> {
        self.commits.iter().find(|c| c.sid == sid || c.id.starts_with(sid))
    }

    /// First live (non-deleted) branch with the exact name.
    #[must_use]
    pub fn find_branch(&self, name: &str) -> Option<BranchIdx> {
        self.branches
            .iter()
            .position(|b| !b.is_deleted && b.name == name)
    }

    /// First live branch whose primary name matches, preferring exact
    /// name matches over primary-name matches.
    #[must_use]
    pub fn find_branch_by_primary(&self, name: &str) -> Option<BranchIdx> {
        self.find_branch(name).or_else(|| {
            self.branches
                .iter()
                .position(|b| !b.is_deleted && b.display_name == primary_name(name))
        })
    }

    /// The checked-out branch, when one is selected.
    #[must_use]
    pub fn current_branch(&self) -> Option<BranchIdx> {
        self.branches
            .iter()
            .position(|b| !b.is_deleted && b.is_current)
    }

    /// The elected main branch.
    #[must_use]
    pub fn main_branch(&self) -> Option<BranchIdx> {
        self.branches.iter().position(|b| !b.is_deleted && b.is_main)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_name_strips_remote() {
        assert_eq!(primary_name("origin/main"), "main");
        assert_eq!(primary_name("main"), "main");
        assert_eq!(primary_name("feature/x"), "feature/x");
    }

    #[test]
    fn test_main_line_names() {
        assert!(is_main_line_name("main"));
        assert!(is_main_line_name("origin/master"));
        assert!(is_main_line_name("trunk"));
        assert!(!is_main_line_name("develop/main-x"));
        assert!(!is_main_line_name("feature"));
    }

    #[test]
    fn test_synthetic_branch_defaults() {
        let b = Branch::synthetic("dev", "abc");
        assert!(!b.is_git_branch);
        assert_eq!(b.tip_id, "abc");
        assert_eq!(b.bottom_id, "abc");
        assert_eq!(b.display_name, "dev");
    }
}
