//! Refresh orchestration — concurrent fact fetching, single-flight
//! coalescing and the debounced file watcher.
//!
//! One refresh fetches the six kinds of raw facts concurrently, joins
//! them, and runs graph building plus resolution as a single
//! non-interruptible unit on a private graph; the finished snapshot is
//! handed over atomically. At most one refresh runs per repository at a
//! time; requests arriving meanwhile are merged into one follow-up, not
//! queued individually.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TrySendError, sync_channel};
use std::time::{Duration, Instant};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::error::GroveError;
use crate::git::metadata::{MetadataMap, MetadataStore};
use crate::git::{self, BranchRecord, LogCommit, Stash, Tag, WorkStatus};
use crate::graph::subject::SubjectCache;
use crate::graph::{RepoGraph, build::build_graph, hierarchy::set_hierarchy, resolve::resolve};

/// Default cap on the number of commits fetched per refresh.
pub const DEFAULT_MAX_COMMITS: usize = 30_000;

/// Debounce window for working-tree edits.
pub const WORKTREE_DEBOUNCE_MS: u64 = 1_000;
/// Debounce window for ref/commit changes, slightly shorter so branch
/// switches feel immediate.
pub const REFS_DEBOUNCE_MS: u64 = 500;

// ─── Raw facts ──────────────────────────────────────────────────────

/// Everything one refresh reads from the repository.
pub struct RepoFacts {
    pub log: Vec<LogCommit>,
    pub truncated: bool,
    pub branches: Vec<BranchRecord>,
    pub tags: Vec<Tag>,
    pub stashes: Vec<Stash>,
    pub status: WorkStatus,
    pub metadata: MetadataMap,
}

/// Fetch all raw facts as independent concurrent operations and join
/// them. The first failure aborts the whole refresh with that error.
pub fn fetch_facts(repo_path: &Path, max_commits: usize) -> Result<RepoFacts, GroveError> {
    let store = MetadataStore::new(repo_path);
    let (log, branches, tags, stashes, status, metadata) = std::thread::scope(|s| {
        let log = s.spawn(|| git::fetch_log(repo_path, max_commits));
        let branches = s.spawn(|| git::fetch_branches(repo_path));
        let tags = s.spawn(|| git::fetch_tags(repo_path));
        let stashes = s.spawn(|| git::fetch_stashes(repo_path));
        let status = s.spawn(|| git::fetch_status(repo_path));
        let metadata = s.spawn(|| store.read());
        (
            log.join().expect("log fetch thread panicked"),
            branches.join().expect("branch fetch thread panicked"),
            tags.join().expect("tag fetch thread panicked"),
            stashes.join().expect("stash fetch thread panicked"),
            status.join().expect("status fetch thread panicked"),
            metadata.join().expect("metadata fetch thread panicked"),
        )
    });
    let (log, truncated) = log?;
    Ok(RepoFacts {
        log,
        truncated,
        branches: branches?,
        tags: tags?,
        stashes: stashes?,
        status: status?,
        metadata: metadata?,
    })
}

/// Build and resolve a graph from fetched facts. Runs as one unit; the
/// parse caches live exactly as long as this pass.
#[must_use]
pub fn build_snapshot(facts: RepoFacts) -> RepoGraph {
    let mut cache = SubjectCache::new();
    let mut graph = build_graph(
        facts.log,
        facts.branches,
        facts.tags,
        facts.stashes,
        facts.status,
        facts.metadata,
        facts.truncated,
        &mut cache,
    );
    resolve(&mut graph, &mut cache);
    set_hierarchy(&mut graph);
    graph
}

// ─── Service ────────────────────────────────────────────────────────

/// Per-repository refresh service with single-flight coalescing.
pub struct RepoService {
    repo_path: PathBuf,
    max_commits: usize,
    in_flight: AtomicBool,
    pending: AtomicBool,
}

impl RepoService {
    #[must_use]
    pub fn new(repo_path: &Path, max_commits: usize) -> Self {
        Self {
            repo_path: repo_path.to_path_buf(),
            max_commits,
            in_flight: AtomicBool::new(false),
            pending: AtomicBool::new(false),
        }
    }

    /// Run one refresh. Returns `None` when another refresh is already
    /// in flight; the request is remembered and served by one follow-up
    /// (check [`Self::take_pending`] after the in-flight one finishes).
    pub fn refresh(&self) -> Result<Option<RepoGraph>, GroveError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            self.pending.store(true, Ordering::Release);
            debug!("refresh already in flight, coalescing");
            return Ok(None);
        }
        let started = Instant::now();
        let result = fetch_facts(&self.repo_path, self.max_commits).map(build_snapshot);
        self.in_flight.store(false, Ordering::Release);
        match result {
            Ok(graph) => {
                info!(
                    elapsed_ms = format_args!("{:.1}", started.elapsed().as_secs_f64() * 1000.0),
                    commits = graph.commits.len(),
                    branches = graph.branches.len(),
                    "refresh complete"
                );
                Ok(Some(graph))
            }
            Err(e) => Err(e),
        }
    }

    /// Whether a coalesced request is waiting, clearing the flag.
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }
}

// ─── Change classification and debouncing ───────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeClass {
    WorkTree,
    Refs,
}

/// Classify a changed path, or ignore it (lock-file churn).
#[must_use]
pub fn classify_path(path: &Path, git_dir: &Path) -> Option<ChangeClass> {
    if path.extension().is_some_and(|e| e == "lock") {
        return None;
    }
    if path.starts_with(git_dir) {
        Some(ChangeClass::Refs)
    } else {
        Some(ChangeClass::WorkTree)
    }
}

/// Deadline bookkeeping for the two debounce windows. A class's first
/// event arms its deadline; further events within the window merge into
/// the same batch.
#[derive(Debug, Default)]
pub struct DebounceState {
    worktree_due: Option<Instant>,
    refs_due: Option<Instant>,
}

impl DebounceState {
    pub fn note(&mut self, class: ChangeClass, now: Instant) {
        match class {
            ChangeClass::WorkTree => {
                self.worktree_due
                    .get_or_insert(now + Duration::from_millis(WORKTREE_DEBOUNCE_MS));
            }
            ChangeClass::Refs => {
                self.refs_due
                    .get_or_insert(now + Duration::from_millis(REFS_DEBOUNCE_MS));
            }
        }
    }

    /// True when any armed window has expired; expired windows reset.
    pub fn fire(&mut self, now: Instant) -> bool {
        let mut fired = false;
        if self.worktree_due.is_some_and(|d| d <= now) {
            self.worktree_due = None;
            fired = true;
        }
        if self.refs_due.is_some_and(|d| d <= now) {
            self.refs_due = None;
            fired = true;
        }
        fired
    }

    /// The earliest armed deadline, for the wait timeout.
    #[must_use]
    pub fn next_due(&self) -> Option<Instant> {
        match (self.worktree_due, self.refs_due) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

// ─── Watcher ────────────────────────────────────────────────────────

/// A running file watcher. Receiving on `triggers` yields at most one
/// unit per debounced batch of filesystem changes.
pub struct WatchHandle {
    pub triggers: Receiver<()>,
}

/// Watch a repository and emit debounced refresh triggers.
///
/// The trigger channel is a single slot: a batch firing while the
/// consumer has not drained the previous trigger is merged into it,
/// guaranteeing at most one pending refresh regardless of burst size.
pub fn start_watcher(repo_path: &Path) -> Result<WatchHandle, GroveError> {
    let git_dir = git::git_dir(repo_path)?;
    let (event_tx, event_rx) = std::sync::mpsc::channel::<notify::Result<Event>>();
    let (trigger_tx, trigger_rx) = sync_channel::<()>(1);

    let mut watcher = RecommendedWatcher::new(event_tx, Config::default())?;
    watcher.watch(repo_path, RecursiveMode::Recursive)?;
    info!(dir = %repo_path.display(), "file watcher started");

    let repo_display = repo_path.display().to_string();
    std::thread::spawn(move || {
        let _watcher = watcher; // keep the watcher alive with the thread
        let mut state = DebounceState::default();
        loop {
            let timeout = state
                .next_due()
                .map(|d| d.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_millis(250));
            match event_rx.recv_timeout(timeout) {
                Ok(Ok(event)) => {
                    // Access notifications would re-trigger on our own
                    // reads; only real mutations count.
                    let mutates = matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    );
                    if mutates {
                        let now = Instant::now();
                        for path in &event.paths {
                            if let Some(class) = classify_path(path, &git_dir) {
                                state.note(class, now);
                            }
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "file watcher error");
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    info!(dir = %repo_display, "watcher channel disconnected, stopping");
                    break;
                }
            }
            if state.fire(Instant::now()) {
                match trigger_tx.try_send(()) {
                    Ok(()) | Err(TrySendError::Full(())) => {} // full = merged
                    Err(TrySendError::Disconnected(())) => break,
                }
            }
        }
    });

    Ok(WatchHandle { triggers: trigger_rx })
}

// ─── Tests ──────────────────────────────────────────────────────────
