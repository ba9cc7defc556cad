//! Test helpers — build synthetic repository snapshots without git.
//!
//! Commits are added newest-first, exactly as `git log` reports them.
//! Author times default to a strictly decreasing sequence so ordering
//! heuristics see realistic data; override with [`RepoBuilder::commit_at`]
//! when a test needs control over them.

use crate::git::metadata::MetadataMap;
use crate::git::{BranchRecord, LogCommit, Stash, Tag, WorkStatus};
use crate::graph::subject::SubjectCache;
use crate::graph::{RepoGraph, build::build_graph, hierarchy::set_hierarchy, resolve::resolve};

const TIME_BASE: i64 = 1_000_000;

pub struct RepoBuilder {
    log: Vec<LogCommit>,
    branches: Vec<BranchRecord>,
    tags: Vec<Tag>,
    stashes: Vec<Stash>,
    status: WorkStatus,
    metadata: MetadataMap,
    truncated: bool,
}

impl RepoBuilder {
    pub fn new() -> Self {
        Self {
            log: Vec::new(),
            branches: Vec::new(),
            tags: Vec::new(),
            stashes: Vec::new(),
            status: WorkStatus::default(),
            metadata: MetadataMap::new(),
            truncated: false,
        }
    }

    pub fn commit(self, id: &str, parents: &[&str], subject: &str) -> Self {
        let t = TIME_BASE - 10 * self.log.len() as i64;
        self.commit_at(id, parents, subject, t)
    }

    pub fn commit_at(mut self, id: &str, parents: &[&str], subject: &str, author_time: i64) -> Self {
        self.log.push(LogCommit {
            id: id.to_string(),
            parent_ids: parents.iter().map(|p| p.to_string()).collect(),
            author: "tester".to_string(),
            author_time,
            commit_time: author_time,
            subject: subject.to_string(),
            message: subject.to_string(),
        });
        self
    }

    pub fn branch(mut self, name: &str, tip: &str) -> Self {
        self.branches.push(BranchRecord {
            name: name.to_string(),
            tip_id: tip.to_string(),
            ..BranchRecord::default()
        });
        self
    }

    pub fn branch_current(mut self, name: &str, tip: &str) -> Self {
        self.branches.push(BranchRecord {
            name: name.to_string(),
            tip_id: tip.to_string(),
            is_current: true,
            ..BranchRecord::default()
        });
        self
    }

    pub fn remote_branch(mut self, name: &str, tip: &str) -> Self {
        self.branches.push(BranchRecord {
            name: name.to_string(),
            tip_id: tip.to_string(),
            is_remote: true,
            ..BranchRecord::default()
        });
        self
    }

    pub fn branch_with_upstream(mut self, name: &str, tip: &str, upstream: &str) -> Self {
        self.branches.push(BranchRecord {
            name: name.to_string(),
            tip_id: tip.to_string(),
            upstream: Some(upstream.to_string()),
            ..BranchRecord::default()
        });
        self
    }

    pub fn detached(mut self, tip: &str) -> Self {
        self.branches.push(BranchRecord {
            name: "detached".to_string(),
            tip_id: tip.to_string(),
            is_current: true,
            is_detached: true,
            ..BranchRecord::default()
        });
        self
    }

    pub fn tag(mut self, name: &str, commit_id: &str) -> Self {
        self.tags.push(Tag { name: name.to_string(), commit_id: commit_id.to_string() });
        self
    }

    pub fn stash(mut self, id: &str, parents: &[&str], name: &str, subject: &str) -> Self {
        self.stashes.push(Stash {
            id: id.to_string(),
            parent_ids: parents.iter().map(|p| p.to_string()).collect(),
            name: name.to_string(),
            branch: String::new(),
            subject: subject.to_string(),
        });
        self
    }

    pub fn modified_files(mut self, files: &[&str]) -> Self {
        self.status.modified = files.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn merging(mut self, head_id: &str, message: &str) -> Self {
        self.status.is_merging = true;
        self.status.merge_head_id = Some(head_id.to_string());
        self.status.merge_message = message.to_string();
        self
    }

    pub fn override_branch(mut self, sid: &str, name: &str, set_by_user: bool) -> Self {
        self.metadata.set(sid, name, set_by_user);
        self
    }

    pub fn truncated(mut self) -> Self {
        self.truncated = true;
        self
    }

    /// Build the graph only; no resolution.
    pub fn build_raw(self) -> RepoGraph {
        let mut cache = SubjectCache::new();
        build_graph(
            self.log,
            self.branches,
            self.tags,
            self.stashes,
            self.status,
            self.metadata,
            self.truncated,
            &mut cache,
        )
    }

    /// Run the full pipeline: build, resolve, hierarchy.
    pub fn build(self) -> RepoGraph {
        let mut cache = SubjectCache::new();
        let mut graph = build_graph(
            self.log,
            self.branches,
            self.tags,
            self.stashes,
            self.status,
            self.metadata,
            self.truncated,
            &mut cache,
        );
        resolve(&mut graph, &mut cache);
        set_hierarchy(&mut graph);
        graph
    }
}

/// Name of the branch owning a commit, for terse assertions.
pub fn owner_name(graph: &RepoGraph, commit_id: &str) -> String {
    let c = graph.find_commit(commit_id).expect("commit in graph");
    let b = c.branch.expect("commit resolved");
    graph.branches[b].name.clone()
}
