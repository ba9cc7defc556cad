//! Branch resolution — assigns exactly one owning branch to every commit.
//!
//! Git forgets which branch a commit was made on as soon as the branch
//! pointer moves or is deleted, so ownership has to be inferred. The
//! inference is a prioritized cascade of heuristics evaluated per commit,
//! walking the log tip-to-root so that every commit sees its already
//! processed children. Where the cascade cannot decide, the commit is
//! marked ambiguous with a candidate set; later, stronger evidence (a
//! branch name parsed from a merge subject) retroactively repairs the
//! ambiguous stretch.
//!
//! The whole pass runs on a freshly built graph every time; it is not
//! incremental and mutates nothing outside the graph it was handed.

use tracing::debug;

use crate::graph::subject::SubjectCache;
use crate::graph::{Branch, BranchIdx, CommitIdx, RepoGraph, is_main_line_name, primary_name};

/// Display name of the synthetic branch owning the truncation sentinel.
pub const TRUNCATED_BRANCH: &str = "truncated";

/// Run one full resolution pass. Every commit ends with exactly one
/// owning branch; ambiguity is recorded as data, never as an error.
pub fn resolve(graph: &mut RepoGraph, cache: &mut SubjectCache) {
    let metadata = graph.metadata.clone();
    for i in 0..graph.commits.len() {
        seed_candidates(graph, i);
        record_subject_names(graph, i, cache);
        let branch = determine_branch(graph, i, &metadata, cache);
        finish_assignment(graph, i, branch, cache);
    }
    debug!(
        commits = graph.commits.len(),
        branches = graph.branches.len(),
        ambiguous = graph.commits.iter().filter(|c| c.is_ambiguous).count(),
        "resolution pass complete"
    );
}

// ─── Candidate seeding ──────────────────────────────────────────────

/// Candidate branches for a commit: live tips on the commit itself,
/// anything propagated down from the main line, and the candidate sets
/// of its first-parent children (all processed before this commit).
fn seed_candidates(graph: &mut RepoGraph, i: CommitIdx) {
    let mut cands: Vec<BranchIdx> = Vec::new();
    for &b in &graph.commits[i].branch_tips {
        if !cands.contains(&b) {
            cands.push(b);
        }
    }
    for &b in &graph.commits[i].candidates {
        if !cands.contains(&b) && !graph.branches[b].is_deleted {
            cands.push(b);
        }
    }
    let children = graph.commits[i].children.clone();
    for ch in children {
        for k in 0..graph.commits[ch].candidates.len() {
            let b = graph.commits[ch].candidates[k];
            if !cands.contains(&b) && !graph.branches[b].is_deleted {
                cands.push(b);
            }
        }
    }
    graph.commits[i].candidates = cands;
}

/// A merge commit's subject names branches its parents often cannot name
/// themselves; record those names for the parents before they are
/// visited.
fn record_subject_names(graph: &mut RepoGraph, i: CommitIdx, cache: &mut SubjectCache) {
    if !graph.commits[i].is_merge() {
        return;
    }
    let (id, subject) = (graph.commits[i].id.clone(), graph.commits[i].subject.clone());
    let Some(parsed) = cache.parse(&id, &subject) else { return };
    if let Some(mp) = graph.commits[i].merge_parent {
        let mp_id = graph.commits[mp].id.clone();
        cache.record_inherited(&mp_id, &parsed.from);
    }
    if let Some(fp) = graph.commits[i].first_parent {
        let fp_id = graph.commits[fp].id.clone();
        let name = if parsed.is_pull_merge { &parsed.from } else { &parsed.into };
        cache.record_inherited(&fp_id, name);
    }
}

// ─── The cascade ────────────────────────────────────────────────────

/// Pick the owning branch for one commit. First match wins; the
/// fallback always succeeds, so no commit is ever left unowned.
fn determine_branch(
    graph: &mut RepoGraph,
    i: CommitIdx,
    metadata: &crate::git::metadata::MetadataMap,
    cache: &mut SubjectCache,
) -> BranchIdx {
    if let Some(b) = try_truncated(graph, i) {
        return b;
    }
    if let Some(b) = try_override(graph, i, metadata) {
        return b;
    }
    if let Some(b) = try_single_candidate(graph, i) {
        return b;
    }
    if let Some(b) = try_parsed_name(graph, i, cache) {
        return b;
    }
    if let Some(b) = try_merged_side(graph, i, cache) {
        return b;
    }
    if let Some(b) = try_ambiguous_child(graph, i) {
        return b;
    }
    if let Some(b) = try_main_line(graph, i) {
        return b;
    }
    fallback_ambiguous(graph, i)
}

/// The truncation sentinel belongs to its own synthetic branch; the
/// hierarchy step later folds that branch into main.
fn try_truncated(graph: &mut RepoGraph, i: CommitIdx) -> Option<BranchIdx> {
    if !graph.commits[i].is_truncated {
        return None;
    }
    let existing = graph
        .branches
        .iter()
        .position(|b| !b.is_deleted && !b.is_git_branch && b.name == TRUNCATED_BRANCH);
    Some(existing.unwrap_or_else(|| {
        let tip = graph.commits[i].id.clone();
        graph.branches.push(Branch::synthetic(TRUNCATED_BRANCH, &tip));
        graph.branches.len() - 1
    }))
}

/// A user or synced metadata override, honored when it still names one
/// of the commit's candidates.
fn try_override(
    graph: &mut RepoGraph,
    i: CommitIdx,
    metadata: &crate::git::metadata::MetadataMap,
) -> Option<BranchIdx> {
    let entry = metadata.get(&graph.commits[i].sid)?;
    let found = graph.commits[i].candidates.iter().copied().find(|&b| {
        graph.branches[b].name == entry.name
            || graph.branches[b].display_name == primary_name(&entry.name)
    })?;
    graph.commits[i].is_set_by_user = entry.set_by_user;
    Some(found)
}

fn try_single_candidate(graph: &RepoGraph, i: CommitIdx) -> Option<BranchIdx> {
    match graph.commits[i].candidates.as_slice() {
        &[only] => Some(only),
        _ => None,
    }
}

/// A name parsed from a child's merge subject that matches one of the
/// candidates is direct evidence and beats the tie-break heuristics.
fn try_parsed_name(graph: &RepoGraph, i: CommitIdx, cache: &SubjectCache) -> Option<BranchIdx> {
    let name = cache.inherited(&graph.commits[i].id)?;
    let primary = primary_name(name);
    graph.commits[i]
        .candidates
        .iter()
        .copied()
        .find(|&b| graph.branches[b].display_name == primary)
}

/// The commit is the merged-away side of a child merge commit whose
/// subject names the branch it came from. When no live branch carries
/// that name any more, the deleted branch is resurrected synthetically.
fn try_merged_side(graph: &mut RepoGraph, i: CommitIdx, cache: &mut SubjectCache) -> Option<BranchIdx> {
    let merge_children = graph.commits[i].merge_children.clone();
    for mc in merge_children {
        let (mc_id, mc_subject) = (graph.commits[mc].id.clone(), graph.commits[mc].subject.clone());
        let Some(parsed) = cache.parse(&mc_id, &mc_subject) else { continue };
        if parsed.from.is_empty() {
            continue;
        }
        let tip = graph.commits[i].id.clone();
        if parsed.is_pull_merge {
            // The other side of a pull: same logical branch, kept as a
            // synthetic branch displayed next to the branch pulled into.
            let name = unique_branch_name(graph, &parsed.from);
            let mut branch = Branch::synthetic(&name, &tip);
            branch.display_name = primary_name(&parsed.from).to_string();
            branch.pull_merge_parent = graph.commits[mc].branch;
            graph.branches.push(branch);
            return Some(graph.branches.len() - 1);
        }
        if parsed.is_pull_request {
            let name = unique_branch_name(graph, &parsed.from);
            let mut branch = Branch::synthetic(&name, &tip);
            branch.display_name = parsed.from.clone();
            graph.branches.push(branch);
            return Some(graph.branches.len() - 1);
        }
        // Plain merge: only resurrect when the name is actually gone.
        // A live branch with that name points somewhere else entirely.
        let live = graph
            .branches
            .iter()
            .any(|b| !b.is_deleted && b.is_git_branch && b.display_name == primary_name(&parsed.from));
        if !live {
            let name = unique_branch_name(graph, &parsed.from);
            let mut branch = Branch::synthetic(&name, &tip);
            branch.display_name = primary_name(&parsed.from).to_string();
            graph.branches.push(branch);
            return Some(graph.branches.len() - 1);
        }
    }
    None
}

/// Exactly one child is ambiguous: the ambiguity continues through this
/// commit, inheriting the child's nominal branch.
fn try_ambiguous_child(graph: &mut RepoGraph, i: CommitIdx) -> Option<BranchIdx> {
    let ambiguous: Vec<CommitIdx> = graph.commits[i]
        .children
        .iter()
        .copied()
        .filter(|&ch| graph.commits[ch].is_ambiguous)
        .collect();
    let [only] = ambiguous.as_slice() else { return None };
    let b = graph.commits[*only].branch?;
    graph.commits[i].is_ambiguous = true;
    let unused: Vec<BranchIdx> = graph.commits[i]
        .candidates
        .iter()
        .copied()
        .filter(|&x| x != b)
        .collect();
    for u in unused {
        if !graph.branches[b].ambiguous_branches.contains(&u) {
            graph.branches[b].ambiguous_branches.push(u);
        }
    }
    Some(b)
}

/// A main-line candidate wins over everything the fallback could guess;
/// this is what keeps trunk history on trunk at every fork, and the
/// reason main-line candidacy is propagated down in the first place.
/// The remote spelling is preferred as the shared source of truth.
fn try_main_line(graph: &RepoGraph, i: CommitIdx) -> Option<BranchIdx> {
    let main_line: Vec<BranchIdx> = graph.commits[i]
        .candidates
        .iter()
        .copied()
        .filter(|&b| is_main_line_name(&graph.branches[b].name))
        .collect();
    main_line
        .iter()
        .copied()
        .find(|&b| graph.branches[b].is_remote)
        .or_else(|| main_line.first().copied())
}

/// Nothing decided: either fabricate a brand-new ambiguous branch (no
/// candidates at all) or pick the most likely candidate and remember the
/// rest so the choice can be repaired later.
fn fallback_ambiguous(graph: &mut RepoGraph, i: CommitIdx) -> BranchIdx {
    let cands = graph.commits[i].candidates.clone();
    if cands.is_empty() {
        let name = format!("ambiguous@{}", graph.commits[i].sid);
        let tip = graph.commits[i].id.clone();
        let mut branch = Branch::synthetic(&name, &tip);
        branch.is_ambiguous = true;
        branch.ambiguous_tip_id = Some(tip);
        graph.branches.push(branch);
        graph.commits[i].is_ambiguous = true;
        return graph.branches.len() - 1;
    }

    // Likely child first: its branch name matched an independently
    // parsed name, the strongest signal available here.
    let mut chosen = graph.commits[i]
        .children
        .iter()
        .copied()
        .filter(|&ch| graph.commits[ch].is_likely)
        .find_map(|ch| graph.commits[ch].branch.filter(|b| cands.contains(b)));
    if chosen.is_none() {
        chosen = cands.iter().copied().find(|&b| graph.branches[b].is_remote);
    }
    if chosen.is_none() {
        // Oldest-author-time child wins. A heuristic with no stated
        // correctness proof, preserved exactly for compatibility.
        let mut best: Option<(i64, BranchIdx)> = None;
        for &ch in &graph.commits[i].children {
            if let Some(b) = graph.commits[ch].branch {
                if cands.contains(&b) {
                    let t = graph.commits[ch].author_time;
                    if best.is_none_or(|(bt, _)| t < bt) {
                        best = Some((t, b));
                    }
                }
            }
        }
        chosen = best.map(|(_, b)| b);
    }
    let b = chosen.unwrap_or(cands[0]);

    graph.commits[i].is_ambiguous = true;
    graph.branches[b].is_ambiguous = true;
    for u in cands.into_iter().filter(|&x| x != b) {
        if !graph.branches[b].ambiguous_branches.contains(&u) {
            graph.branches[b].ambiguous_branches.push(u);
        }
    }
    if graph.branches[b].ambiguous_tip_id.is_none() {
        graph.branches[b].ambiguous_tip_id = Some(graph.commits[i].id.clone());
    }
    b
}

// ─── Post-assignment bookkeeping ────────────────────────────────────

fn finish_assignment(graph: &mut RepoGraph, i: CommitIdx, b: BranchIdx, cache: &mut SubjectCache) {
    graph.commits[i].branch = Some(b);
    if !graph.commits[i].candidates.contains(&b) {
        graph.commits[i].candidates.push(b);
    }
    // The pass walks tip-to-root, so the last write is the oldest commit
    // and ends up as the true bottom.
    graph.branches[b].bottom_id = graph.commits[i].id.clone();

    // Likely only on a canonical-name match: a suffixed synthetic like
    // `main(1)` displays as `main` but is not the branch the subject
    // named.
    let id = graph.commits[i].id.clone();
    if let Some(name) = cache.inherited(&id) {
        if primary_name(name) == primary_name(&graph.branches[b].name) {
            graph.commits[i].is_likely = true;
            repair_ambiguity(graph, b, i);
        }
    }

    // Main-line candidacy survives arbitrarily far back, so trunk
    // history stays assignable even across long side stretches.
    if is_main_line_name(&graph.branches[b].name) {
        if let Some(fp) = graph.commits[i].first_parent {
            if !graph.commits[fp].candidates.contains(&b) {
                graph.commits[fp].candidates.push(b);
            }
        }
    }
}

// ─── Retroactive repair ─────────────────────────────────────────────

/// A commit just resolved to `b` on strong evidence. Walk the ambiguous
/// stretch above it (newer commits, already processed) and re-assign the
/// whole stretch to `b`, provided the chain is unbroken: every commit on
/// the way must be ambiguous with `b` among its candidates. Otherwise
/// nothing is mutated.
fn repair_ambiguity(graph: &mut RepoGraph, b: BranchIdx, trigger: CommitIdx) {
    let Some(tip_id) = graph.branches[b].ambiguous_tip_id.clone() else { return };
    let Some(&tip_idx) = graph.commit_index.get(&tip_id) else { return };

    let mut path: Vec<CommitIdx> = Vec::new();
    let mut cur = tip_idx;
    while cur != trigger {
        let c = &graph.commits[cur];
        if !c.is_ambiguous || !c.candidates.contains(&b) {
            return;
        }
        path.push(cur);
        match c.first_parent {
            Some(p) => cur = p,
            None => return,
        }
    }
    if path.is_empty() {
        return;
    }
    debug!(branch = %graph.branches[b].name, commits = path.len(), "repairing ambiguous stretch");

    let mut displaced: Vec<BranchIdx> = Vec::new();
    for &ci in &path {
        if let Some(old) = graph.commits[ci].branch {
            if old != b && !displaced.contains(&old) {
                displaced.push(old);
            }
        }
        graph.commits[ci].branch = Some(b);
        graph.commits[ci].is_ambiguous = false;
    }

    // A synthetic branch confirmed by name now also owns the repaired
    // newer commits; pull its tip up to the newest of them.
    if !graph.branches[b].is_git_branch {
        let newest = path[0];
        let tip_pos = graph.commit_index.get(&graph.branches[b].tip_id).copied();
        if tip_pos.is_none_or(|t| newest < t) {
            graph.branches[b].tip_id = graph.commits[newest].id.clone();
        }
    }
    graph.branches[b].is_ambiguous = false;
    graph.branches[b].ambiguous_branches.clear();
    graph.branches[b].ambiguous_tip_id = None;

    for d in displaced {
        adjust_displaced(graph, d);
    }
}

/// Fix up a branch whose commits were taken over by a repair: shrink its
/// tip/bottom to what it still owns, or delete it outright when nothing
/// is left.
fn adjust_displaced(graph: &mut RepoGraph, d: BranchIdx) {
    let owned: Vec<CommitIdx> = graph
        .commits
        .iter()
        .enumerate()
        .filter(|(_, c)| c.branch == Some(d))
        .map(|(i, _)| i)
        .collect();
    if owned.is_empty() {
        graph.branches[d].is_deleted = true;
        return;
    }
    let newest = owned[0];
    let oldest = owned[owned.len() - 1];
    graph.branches[d].bottom_id = graph.commits[oldest].id.clone();
    if !graph.branches[d].is_git_branch {
        graph.branches[d].tip_id = graph.commits[newest].id.clone();
    }
    if let Some(tid) = graph.branches[d].ambiguous_tip_id.clone() {
        let still_owned = graph.commit_index.get(&tid).is_some_and(|&t| graph.commits[t].branch == Some(d));
        if !still_owned {
            let next_tip = owned.iter().copied().find(|&c| graph.commits[c].is_ambiguous);
            graph.branches[d].ambiguous_tip_id = next_tip.map(|c| graph.commits[c].id.clone());
            if graph.branches[d].ambiguous_tip_id.is_none() {
                graph.branches[d].is_ambiguous = false;
                graph.branches[d].ambiguous_branches.clear();
            }
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

/// A name for a new synthetic branch that does not collide with any
/// branch already in the arena.
fn unique_branch_name(graph: &RepoGraph, base: &str) -> String {
    if graph.find_branch(base).is_none() {
        return base.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}({})", base, n);
        if graph.find_branch(&candidate).is_none() {
            return candidate;
        }
        n += 1;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
