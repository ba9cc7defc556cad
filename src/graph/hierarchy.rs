//! Branch hierarchy — parent branches, local/remote pairing and the
//! main branch election.

use tracing::debug;

use crate::TRUNCATED_ID;
use crate::graph::resolve::TRUNCATED_BRANCH;
use crate::graph::{BranchIdx, MAIN_BRANCH_PRIORITY, RepoGraph};

/// Compute parent branches, elect the main branch and fold the
/// truncation sentinel branch into it. Runs after resolution.
pub fn set_hierarchy(graph: &mut RepoGraph) {
    pair_remotes(graph);
    set_parents(graph);
    elect_main(graph);
    collapse_truncated(graph);
}

/// Fill in the remote counterpart for local branches without a
/// configured upstream by pairing on the primary name.
fn pair_remotes(graph: &mut RepoGraph) {
    for i in 0..graph.branches.len() {
        let b = &graph.branches[i];
        if b.is_deleted || b.is_remote || !b.is_git_branch || b.remote_name.is_some() {
            continue;
        }
        let display = b.display_name.clone();
        let paired = graph
            .branches
            .iter()
            .find(|r| !r.is_deleted && r.is_remote && r.display_name == display)
            .map(|r| r.name.clone());
        graph.branches[i].remote_name = paired;
    }
}

/// A branch's parent is its remote counterpart when it has one.
/// Otherwise it is the branch owning its bottom commit (for branches
/// that are pure pointers into someone else's history), or the branch
/// owning the commit just below its bottom.
fn set_parents(graph: &mut RepoGraph) {
    for i in 0..graph.branches.len() {
        if graph.branches[i].is_deleted {
            continue;
        }
        if let Some(rn) = graph.branches[i].remote_name.clone() {
            if let Some(ri) = graph.find_branch(&rn) {
                if ri != i {
                    graph.branches[i].parent = Some(ri);
                    continue;
                }
            }
        }
        let bottom = graph.commit_idx(&graph.branches[i].bottom_id);
        let owner = graph.commits[bottom].branch;
        let parent = if owner != Some(i) {
            owner
        } else {
            graph.commits[bottom]
                .first_parent
                .and_then(|fp| graph.commits[fp].branch)
        };
        graph.branches[i].parent = parent.filter(|&p| p != i);
    }
}

/// Among root branches (no parent), the first name in the reserved
/// priority list wins. Repositories without any reserved name fall back
/// to the first root so a main branch always exists.
fn elect_main(graph: &mut RepoGraph) {
    let roots: Vec<BranchIdx> = (0..graph.branches.len())
        .filter(|&i| !graph.branches[i].is_deleted && graph.branches[i].parent.is_none())
        .collect();

    let elected = MAIN_BRANCH_PRIORITY
        .iter()
        .find_map(|name| roots.iter().copied().find(|&i| graph.branches[i].name == *name))
        .or_else(|| {
            MAIN_BRANCH_PRIORITY
                .iter()
                .find_map(|name| graph.find_branch(name))
        })
        .or_else(|| roots.first().copied());

    if let Some(mi) = elected {
        graph.branches[mi].is_main = true;
        debug!(main = %graph.branches[mi].name, "main branch elected");
    }
}

/// The truncation sentinel branch is the universal ancestor: fold it
/// into main so every branch ultimately roots there.
fn collapse_truncated(graph: &mut RepoGraph) {
    let Some(ti) = graph
        .branches
        .iter()
        .position(|b| !b.is_deleted && !b.is_git_branch && b.name == TRUNCATED_BRANCH)
    else {
        return;
    };
    let Some(mi) = graph.main_branch() else { return };
    if mi == ti {
        return;
    }
    graph.branches[mi].bottom_id = TRUNCATED_ID.to_string();
    if let Some(&si) = graph.commit_index.get(TRUNCATED_ID) {
        graph.commits[si].branch = Some(mi);
    }
    graph.branches[ti].is_deleted = true;
    for i in 0..graph.branches.len() {
        if graph.branches[i].parent == Some(ti) {
            graph.branches[i].parent = if i == mi { None } else { Some(mi) };
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::graph::testkit::RepoBuilder;

    #[test]
    fn test_local_parents_to_remote_counterpart() {
        let graph = RepoBuilder::new()
            .commit("c2", &["c1"], "work")
            .commit("c1", &[], "init")
            .branch_current("main", "c2")
            .remote_branch("origin/main", "c2")
            .build();
        let local = graph.find_branch("main").unwrap();
        let remote = graph.find_branch("origin/main").unwrap();
        assert_eq!(graph.branches[local].parent, Some(remote));
        assert_eq!(graph.branches[local].remote_name.as_deref(), Some("origin/main"));
    }

    #[test]
    fn test_feature_parents_to_main() {
        let graph = RepoBuilder::new()
            .commit("f1", &["c1"], "feature work")
            .commit("c2", &["c1"], "main work")
            .commit("c1", &[], "init")
            .branch_current("main", "c2")
            .branch("feature", "f1")
            .build();
        let feature = graph.find_branch("feature").unwrap();
        let main = graph.find_branch("main").unwrap();
        assert_eq!(graph.branches[feature].parent, Some(main));
    }

    #[test]
    fn test_pointer_branch_parents_to_owner() {
        // A branch pointing into main's history owns no commit of its own.
        let graph = RepoBuilder::new()
            .commit("c3", &["c2"], "top")
            .commit("c2", &["c1"], "mid")
            .commit("c1", &[], "init")
            .branch_current("main", "c3")
            .branch("marker", "c2")
            .build();
        let marker = graph.find_branch("marker").unwrap();
        let main = graph.find_branch("main").unwrap();
        assert_eq!(graph.branches[marker].parent, Some(main));
    }

    #[test]
    fn test_main_elected_by_priority() {
        let graph = RepoBuilder::new()
            .commit("c1", &[], "init")
            .branch("master", "c1")
            .branch_current("main", "c1")
            .build();
        let main = graph.main_branch().unwrap();
        assert_eq!(graph.branches[main].name, "main");
    }

    #[test]
    fn test_main_falls_back_to_first_root() {
        let graph = RepoBuilder::new()
            .commit("c1", &[], "init")
            .branch_current("work", "c1")
            .build();
        let main = graph.main_branch().unwrap();
        assert_eq!(graph.branches[main].name, "work");
    }

    #[test]
    fn test_truncated_branch_folds_into_main() {
        let graph = RepoBuilder::new()
            .commit("c3", &["c2"], "top")
            .commit("c2", &["c1"], "kept, parent cut off")
            .branch_current("main", "c3")
            .truncated()
            .build();
        let main = graph.main_branch().unwrap();
        assert_eq!(graph.branches[main].bottom_id, crate::TRUNCATED_ID);
        // Sentinel branch is gone, sentinel commit owned by main.
        assert!(graph.find_branch("truncated").is_none());
        let sentinel = graph.find_commit(crate::TRUNCATED_ID).unwrap();
        assert_eq!(sentinel.branch, Some(main));
    }

    #[test]
    fn test_branches_reparented_from_truncated_to_main() {
        // Feature bottoms out at a commit whose parent got cut off, so
        // its history runs into the sentinel as well.
        let graph = RepoBuilder::new()
            .commit("f1", &["x1"], "feature work")
            .commit("c2", &["x2"], "main work")
            .branch_current("main", "c2")
            .branch("feature", "f1")
            .truncated()
            .build();
        let feature = graph.find_branch("feature").unwrap();
        let main = graph.main_branch().unwrap();
        assert_eq!(graph.branches[feature].parent, Some(main));
    }
}
