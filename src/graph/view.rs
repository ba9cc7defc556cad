//! View filtering — projects the full graph onto the subset a caller
//! asked to see.
//!
//! The projection is read-only and recomputed per request: requested
//! branches are expanded to a minimal consistent set (main, tip owners,
//! local/remote pairs, ancestors), branches are put in a total order
//! consistent with the ancestor partial order, commits of surviving
//! branches are emitted newest-first, pending working-tree changes show
//! up as a virtual commit, and diverged local/remote pairs get their
//! commits marked ahead/behind.

use std::collections::HashMap;

use crate::graph::{BranchIdx, CommitIdx, RepoGraph};
use crate::settings::RepoSettings;
use crate::{UNCOMMITTED_ID, short_id};

/// Hard cap on the ahead/behind walks, bounding cost on pathological
/// histories.
pub const AHEAD_BEHIND_CAP: usize = 50;

// ─── Projection types ───────────────────────────────────────────────

/// A branch as displayed.
#[derive(Clone, Debug)]
pub struct ViewBranch {
    pub name: String,
    pub display_name: String,
    pub tip_id: String,
    pub bottom_id: String,
    pub parent_name: Option<String>,
    pub is_main: bool,
    pub is_remote: bool,
    pub is_current: bool,
    pub is_detached: bool,
    pub is_git_branch: bool,
    pub is_ambiguous: bool,
    pub ahead_count: u32,
    pub behind_count: u32,
    pub has_ahead: bool,
    pub has_behind: bool,
}

/// A commit as displayed.
#[derive(Clone, Debug)]
pub struct ViewCommit {
    pub id: String,
    pub sid: String,
    pub subject: String,
    pub author: String,
    pub author_time: i64,
    pub parent_ids: Vec<String>,
    pub branch_name: String,
    /// Live branch tips on this commit, restricted to shown branches.
    pub branch_tips: Vec<String>,
    pub tags: Vec<String>,
    pub is_merge: bool,
    pub is_ambiguous: bool,
    pub is_set_by_user: bool,
    pub is_ahead: bool,
    pub is_behind: bool,
    pub is_uncommitted: bool,
    pub is_truncated: bool,
}

/// The display subset: ordered commits and branches.
#[derive(Clone, Debug, Default)]
pub struct RepoView {
    pub commits: Vec<ViewCommit>,
    pub branches: Vec<ViewBranch>,
    /// Commit count of the underlying graph, before filtering.
    pub total_commits: usize,
    pub truncated: bool,
}

// ─── Entry point ────────────────────────────────────────────────────

/// Project the graph onto the requested branch names. An empty request
/// means "the current branch", and the main branch is always included.
pub fn filter_view(graph: &RepoGraph, settings: &RepoSettings, requested: &[String]) -> RepoView {
    let selected = select_branches(graph, requested);
    let ordered = order_branches(graph, settings, selected);

    let mut branches: Vec<ViewBranch> = ordered.iter().map(|&b| view_branch(graph, b)).collect();
    let mut commits = collect_commits(graph, &ordered);

    add_uncommitted(graph, &ordered, &mut branches, &mut commits);
    mark_ahead_behind(graph, &ordered, &mut branches, &mut commits);

    RepoView {
        commits,
        branches,
        total_commits: graph.commits.len(),
        truncated: graph.truncated,
    }
}

// ─── Branch selection ───────────────────────────────────────────────

fn select_branches(graph: &RepoGraph, requested: &[String]) -> Vec<BranchIdx> {
    let mut selected: Vec<BranchIdx> = Vec::new();
    let mut add = |sel: &mut Vec<BranchIdx>, bi: BranchIdx| {
        if !graph.branches[bi].is_deleted && !sel.contains(&bi) {
            sel.push(bi);
        }
    };

    if requested.is_empty() {
        if let Some(cur) = graph.current_branch() {
            add(&mut selected, cur);
        }
    } else {
        for name in requested {
            if let Some(bi) = graph.find_branch_by_primary(name) {
                add(&mut selected, bi);
            }
        }
    }

    if let Some(mi) = graph.main_branch() {
        add(&mut selected, mi);
    }
    if let Some(di) = graph.branches.iter().position(|b| !b.is_deleted && b.is_detached) {
        add(&mut selected, di);
    }

    // Closure: tip owners, local/remote pairs and ancestors, repeated
    // for every branch the closure itself adds.
    let mut i = 0;
    while i < selected.len() {
        let bi = selected[i];
        i += 1;
        if let Some(&t) = graph.commit_index.get(&graph.branches[bi].tip_id) {
            if let Some(owner) = graph.commits[t].branch {
                add(&mut selected, owner);
            }
        }
        let display = graph.branches[bi].display_name.clone();
        for (j, other) in graph.branches.iter().enumerate() {
            if !other.is_deleted && other.display_name == display {
                add(&mut selected, j);
            }
        }
        if let Some(p) = graph.branches[bi].parent {
            add(&mut selected, p);
        }
        if let Some(pp) = graph.branches[bi].pull_merge_parent {
            add(&mut selected, pp);
        }
    }
    selected
}

// ─── Branch ordering ────────────────────────────────────────────────

/// Chain length to a root along parent links. Bounded by the branch
/// count so a malformed parent cycle cannot hang the sort.
fn branch_depth(graph: &RepoGraph, mut b: BranchIdx) -> usize {
    let mut depth = 0;
    while let Some(p) = graph.branches[b].parent {
        depth += 1;
        if depth > graph.branches.len() {
            break;
        }
        b = p;
    }
    depth
}

fn is_ancestor_branch(graph: &RepoGraph, ancestor: BranchIdx, mut b: BranchIdx) -> bool {
    let mut steps = 0;
    while let Some(p) = graph.branches[b].parent {
        if p == ancestor {
            return true;
        }
        steps += 1;
        if steps > graph.branches.len() {
            return false;
        }
        b = p;
    }
    false
}

/// Total order consistent with the ancestor partial order: a branch
/// always precedes its descendants. Otherwise-unordered pairs follow
/// the persisted manual tie-break table; pull-merge branches slot in
/// right after their pull-merge parent and locals right after their
/// paired remote.
fn order_branches(graph: &RepoGraph, settings: &RepoSettings, selected: Vec<BranchIdx>) -> Vec<BranchIdx> {
    let mut ordered = selected;
    // Depth is monotone along parent chains, so a stable depth sort is
    // consistent with the ancestor partial order.
    ordered.sort_by_key(|&b| branch_depth(graph, b));

    // Manual tie-breaks between branches no ancestor relation orders.
    let mut changed = true;
    let mut passes = 0;
    while changed && passes <= ordered.len() {
        changed = false;
        passes += 1;
        for i in 0..ordered.len() {
            for j in (i + 1)..ordered.len() {
                let (a, b) = (ordered[i], ordered[j]);
                let manual = settings.orders_before(&graph.branches[b].name, &graph.branches[a].name);
                if manual && !is_ancestor_branch(graph, a, b) {
                    let moved = ordered.remove(j);
                    ordered.insert(i, moved);
                    changed = true;
                }
            }
        }
    }

    // Pull-merge branches directly after the branch they were pulled
    // into.
    reinsert_after(graph, &mut ordered, |g, b| g.branches[b].pull_merge_parent);
    // Local branches directly after their paired remote.
    reinsert_after(graph, &mut ordered, |g, b| {
        let br = &g.branches[b];
        if br.is_remote || !br.is_git_branch {
            return None;
        }
        br.remote_name.as_deref().and_then(|rn| g.find_branch(rn))
    });
    ordered
}

fn reinsert_after(
    graph: &RepoGraph,
    ordered: &mut Vec<BranchIdx>,
    anchor_of: impl Fn(&RepoGraph, BranchIdx) -> Option<BranchIdx>,
) {
    let movable: Vec<BranchIdx> = ordered
        .iter()
        .copied()
        .filter(|&b| anchor_of(graph, b).is_some_and(|a| ordered.contains(&a)))
        .collect();
    for b in movable {
        let anchor = anchor_of(graph, b).expect("anchor checked above");
        let from = ordered.iter().position(|&x| x == b).expect("branch in order");
        ordered.remove(from);
        let at = ordered.iter().position(|&x| x == anchor).expect("anchor in order");
        ordered.insert(at + 1, b);
    }
}

// ─── Commit projection ──────────────────────────────────────────────

fn view_branch(graph: &RepoGraph, b: BranchIdx) -> ViewBranch {
    let br = &graph.branches[b];
    ViewBranch {
        name: br.name.clone(),
        display_name: br.display_name.clone(),
        tip_id: br.tip_id.clone(),
        bottom_id: br.bottom_id.clone(),
        parent_name: br.parent.map(|p| graph.branches[p].name.clone()),
        is_main: br.is_main,
        is_remote: br.is_remote,
        is_current: br.is_current,
        is_detached: br.is_detached,
        is_git_branch: br.is_git_branch,
        is_ambiguous: br.is_ambiguous,
        ahead_count: br.ahead_count,
        behind_count: br.behind_count,
        has_ahead: false,
        has_behind: false,
    }
}

fn collect_commits(graph: &RepoGraph, selected: &[BranchIdx]) -> Vec<ViewCommit> {
    let mut commits = Vec::new();
    for c in &graph.commits {
        let Some(b) = c.branch else { continue };
        if !selected.contains(&b) {
            continue;
        }
        let tips: Vec<String> = c
            .branch_tips
            .iter()
            .copied()
            .filter(|t| selected.contains(t))
            .map(|t| graph.branches[t].name.clone())
            .collect();
        commits.push(ViewCommit {
            id: c.id.clone(),
            sid: c.sid.clone(),
            subject: c.subject.clone(),
            author: c.author.clone(),
            author_time: c.author_time,
            parent_ids: c.parent_ids.clone(),
            branch_name: graph.branches[b].name.clone(),
            branch_tips: tips,
            tags: c.tags.clone(),
            is_merge: c.is_merge(),
            is_ambiguous: c.is_ambiguous,
            is_set_by_user: c.is_set_by_user,
            is_ahead: false,
            is_behind: false,
            is_uncommitted: false,
            is_truncated: c.is_truncated,
        });
    }
    commits
}

// ─── Virtual uncommitted commit ─────────────────────────────────────

/// A dirty working tree shows as a pseudo-commit on top of the current
/// branch's tip, with a second parent at the merge head mid-merge.
fn add_uncommitted(
    graph: &RepoGraph,
    selected: &[BranchIdx],
    branches: &mut [ViewBranch],
    commits: &mut Vec<ViewCommit>,
) {
    if !graph.status.is_dirty() {
        return;
    }
    let Some(cur) = graph.current_branch() else { return };
    if !selected.contains(&cur) {
        return;
    }
    let cur_branch = &graph.branches[cur];
    let real_tip = cur_branch.tip_id.clone();
    let mut parent_ids = vec![real_tip.clone()];
    if graph.status.is_merging {
        if let Some(mh) = &graph.status.merge_head_id {
            if graph.commit_index.contains_key(mh) {
                parent_ids.push(mh.clone());
            }
        }
    }
    let subject = format!("{} uncommitted changes", graph.status.change_count());
    commits.insert(0, ViewCommit {
        id: UNCOMMITTED_ID.to_string(),
        sid: short_id(UNCOMMITTED_ID).to_string(),
        subject,
        author: String::new(),
        author_time: i64::MAX,
        is_merge: parent_ids.len() > 1,
        parent_ids,
        branch_name: cur_branch.name.clone(),
        branch_tips: Vec::new(),
        tags: Vec::new(),
        is_ambiguous: false,
        is_set_by_user: false,
        is_ahead: false,
        is_behind: false,
        is_uncommitted: true,
        is_truncated: false,
    });
    if let Some(vb) = branches.iter_mut().find(|vb| vb.name == cur_branch.name) {
        vb.tip_id = UNCOMMITTED_ID.to_string();
        // A pure pointer branch owns nothing of its own; the virtual
        // commit becomes its only own commit.
        let tip_owner = graph
            .commit_index
            .get(&real_tip)
            .and_then(|&t| graph.commits[t].branch);
        if vb.bottom_id == real_tip && tip_owner != Some(cur) {
            vb.bottom_id = UNCOMMITTED_ID.to_string();
        }
    }
}

// ─── Ahead/behind marking ───────────────────────────────────────────

/// For each diverged local/remote pair in the view, mark remote-only
/// commits behind and local-only commits ahead, each walk capped and
/// stopped at the counterpart's base or a merge from the counterpart.
fn mark_ahead_behind(
    graph: &RepoGraph,
    selected: &[BranchIdx],
    branches: &mut [ViewBranch],
    commits: &mut [ViewCommit],
) {
    let by_id: HashMap<String, usize> = commits
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.clone(), i))
        .collect();

    for &ri in selected {
        let remote = &graph.branches[ri];
        if !remote.is_remote {
            continue;
        }
        let Some(li) = selected.iter().copied().find(|&l| {
            let b = &graph.branches[l];
            !b.is_remote && b.is_git_branch && b.remote_name.as_deref() == Some(remote.name.as_str())
        }) else {
            continue;
        };
        let local = &graph.branches[li];
        if local.tip_id == remote.tip_id {
            continue;
        }

        let behind = mark_walk(graph, ri, li, commits, &by_id, false);
        let ahead = mark_walk(graph, li, ri, commits, &by_id, true);
        if behind > 0 {
            set_flag(branches, &graph.branches[ri].name, false);
        }
        if ahead > 0 {
            set_flag(branches, &graph.branches[li].name, true);
        }
    }
}

fn set_flag(branches: &mut [ViewBranch], name: &str, ahead: bool) {
    if let Some(vb) = branches.iter_mut().find(|vb| vb.name == name) {
        if ahead {
            vb.has_ahead = true;
        } else {
            vb.has_behind = true;
        }
    }
}

/// Walk first-parent from `branch`'s tip while commits stay owned by it,
/// marking each one. Stops at the counterpart's base, at a merge whose
/// merged side belongs to the counterpart, or at the cap.
fn mark_walk(
    graph: &RepoGraph,
    branch: BranchIdx,
    counterpart: BranchIdx,
    commits: &mut [ViewCommit],
    by_id: &HashMap<String, usize>,
    ahead: bool,
) -> usize {
    let mut marked = 0;
    let mut cur: Option<CommitIdx> = graph
        .commit_index
        .get(&graph.branches[branch].tip_id)
        .copied();
    while let Some(ci) = cur {
        if marked >= AHEAD_BEHIND_CAP {
            break;
        }
        let c = &graph.commits[ci];
        if c.branch != Some(branch) {
            break;
        }
        if c.id == graph.branches[counterpart].bottom_id {
            break;
        }
        // The counterpart's base: the first commit that could equally
        // belong to it.
        if c.candidates.contains(&counterpart) {
            break;
        }
        if c.merge_parent.is_some_and(|mp| graph.commits[mp].branch == Some(counterpart)) {
            break;
        }
        if let Some(&vi) = by_id.get(c.id.as_str()) {
            if ahead {
                commits[vi].is_ahead = true;
            } else {
                commits[vi].is_behind = true;
            }
            marked += 1;
        }
        cur = c.first_parent;
    }
    marked
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "view_tests.rs"]
mod tests;
