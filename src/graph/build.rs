//! Graph construction — turns raw git records into the commit/branch arena.
//!
//! Builds the id index, links parent/child edges (first-parent and merge
//! edges kept apart), swaps parent order for pull merges, drops stash
//! plumbing commits and stale refs, and closes a size-capped log with a
//! single synthetic sentinel commit so traversal never dangles.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::git::metadata::MetadataMap;
use crate::git::{BranchRecord, LogCommit, Stash, Tag, WorkStatus};
use crate::graph::subject::SubjectCache;
use crate::graph::{Branch, Commit, RepoGraph, primary_name};
use crate::{TRUNCATED_ID, short_id};

/// Build the full graph for one repository snapshot. The commit list is
/// expected most-recent first, as `git log` reports it.
#[allow(clippy::too_many_arguments)]
pub fn build_graph(
    log: Vec<LogCommit>,
    branch_records: Vec<BranchRecord>,
    tags: Vec<Tag>,
    stashes: Vec<Stash>,
    status: WorkStatus,
    metadata: MetadataMap,
    truncated: bool,
    cache: &mut SubjectCache,
) -> RepoGraph {
    let skip = stash_internal_ids(&stashes);

    let mut commits: Vec<Commit> = Vec::with_capacity(log.len());
    for lc in log {
        if skip.contains(lc.id.as_str()) {
            continue;
        }
        commits.push(new_commit(lc));
    }

    let mut commit_index: HashMap<String, usize> = HashMap::with_capacity(commits.len());
    for (i, c) in commits.iter().enumerate() {
        commit_index.insert(c.id.clone(), i);
    }

    let mut graph = RepoGraph {
        commits,
        commit_index,
        branches: Vec::new(),
        status,
        metadata,
        truncated,
    };

    swap_pull_merge_parents(&mut graph, cache);
    substitute_missing_parents(&mut graph);
    link_parents(&mut graph);
    attach_branches(&mut graph, branch_records);
    attach_tags(&mut graph, tags);
    graph
}

fn new_commit(lc: LogCommit) -> Commit {
    Commit {
        sid: short_id(&lc.id).to_string(),
        id: lc.id,
        parent_ids: lc.parent_ids,
        author: lc.author,
        author_time: lc.author_time,
        commit_time: lc.commit_time,
        subject: lc.subject,
        message: lc.message,
        branch: None,
        candidates: Vec::new(),
        first_parent: None,
        merge_parent: None,
        children: Vec::new(),
        merge_children: Vec::new(),
        branch_tips: Vec::new(),
        tags: Vec::new(),
        is_ambiguous: false,
        is_likely: false,
        is_set_by_user: false,
        is_truncated: false,
    }
}

/// Stash entries are backed by plumbing commits (the stash itself plus
/// its index/untracked state parents) that must never show in the log.
/// The first parent is the real base commit and stays.
fn stash_internal_ids(stashes: &[Stash]) -> HashSet<&str> {
    let mut skip: HashSet<&str> = HashSet::new();
    for s in stashes {
        skip.insert(s.id.as_str());
        for p in s.parent_ids.iter().skip(1) {
            skip.insert(p.as_str());
        }
    }
    skip
}

/// A pull merge records the remote side as its second parent, but every
/// downstream heuristic assumes parent[0] is the mainline continuation.
/// Swap the two so the remote side leads.
fn swap_pull_merge_parents(graph: &mut RepoGraph, cache: &mut SubjectCache) {
    for c in &mut graph.commits {
        if c.parent_ids.len() < 2 {
            continue;
        }
        if let Some(parsed) = cache.parse(&c.id, &c.subject) {
            if parsed.is_pull_merge {
                c.parent_ids.swap(0, 1);
            }
        }
    }
}

/// When the log hit the size cap, parents referencing commits beyond the
/// cap are rewritten to a reserved sentinel id, and one synthetic
/// sentinel commit is appended so the graph stays fully connected.
fn substitute_missing_parents(graph: &mut RepoGraph) {
    if !graph.truncated {
        return;
    }
    let mut substituted = false;
    for i in 0..graph.commits.len() {
        for k in 0..graph.commits[i].parent_ids.len() {
            let pid = graph.commits[i].parent_ids[k].clone();
            if !graph.commit_index.contains_key(&pid) {
                graph.commits[i].parent_ids[k] = TRUNCATED_ID.to_string();
                substituted = true;
            }
        }
    }
    if !substituted {
        return;
    }
    let mut sentinel = new_commit(LogCommit {
        id: TRUNCATED_ID.to_string(),
        parent_ids: Vec::new(),
        author: String::new(),
        author_time: 0,
        commit_time: 0,
        subject: "... (history truncated)".to_string(),
        message: "... (history truncated)".to_string(),
    });
    sentinel.is_truncated = true;
    graph.commits.push(sentinel);
    graph.commit_index.insert(TRUNCATED_ID.to_string(), graph.commits.len() - 1);
    debug!("log truncated, sentinel commit appended");
}

fn link_parents(graph: &mut RepoGraph) {
    for i in 0..graph.commits.len() {
        let parent_ids = graph.commits[i].parent_ids.clone();
        for (k, pid) in parent_ids.iter().enumerate() {
            let Some(&pi) = graph.commit_index.get(pid) else {
                // Shallow history without the truncation cap: tolerated,
                // the edge just ends here.
                continue;
            };
            if k == 0 {
                graph.commits[i].first_parent = Some(pi);
                graph.commits[pi].children.push(i);
            } else {
                graph.commits[i].merge_parent = Some(pi);
                graph.commits[pi].merge_children.push(i);
            }
        }
    }
}

/// Attach live branch pointers to their tip commits. A branch whose tip
/// has no commit in the graph is a stale ref and is dropped entirely.
fn attach_branches(graph: &mut RepoGraph, records: Vec<BranchRecord>) {
    for r in records {
        let Some(&tip) = graph.commit_index.get(&r.tip_id) else {
            debug!(branch = %r.name, tip = %r.tip_id, "dropping branch with unknown tip");
            continue;
        };
        let branch = Branch {
            display_name: primary_name(&r.name).to_string(),
            name: r.name,
            is_git_branch: true,
            is_remote: r.is_remote,
            is_current: r.is_current,
            is_detached: r.is_detached,
            is_main: false,
            tip_id: r.tip_id.clone(),
            bottom_id: r.tip_id,
            remote_name: r.upstream,
            parent: None,
            ahead_count: r.ahead_count,
            behind_count: r.behind_count,
            is_ambiguous: false,
            ambiguous_tip_id: None,
            ambiguous_branches: Vec::new(),
            pull_merge_parent: None,
            is_deleted: false,
        };
        graph.branches.push(branch);
        let bi = graph.branches.len() - 1;
        graph.commits[tip].branch_tips.push(bi);
    }
}

fn attach_tags(graph: &mut RepoGraph, tags: Vec<Tag>) {
    for t in tags {
        if let Some(&ci) = graph.commit_index.get(&t.commit_id) {
            graph.commits[ci].tags.push(t.name);
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
