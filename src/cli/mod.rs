//! CLI layer: argument parsing, command dispatch, and subcommand
//! implementations.

pub mod args;

pub use args::*;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand};

use grove::error::GroveError;
use grove::git;
use grove::git::metadata::MetadataStore;
use grove::graph::RepoGraph;
use grove::graph::view::{RepoView, ViewCommit, filter_view};
use grove::service::{DEFAULT_MAX_COMMITS, RepoService, start_watcher};
use grove::settings::load_settings;

// ─── CLI ─────────────────────────────────────────────────────────────

/// Terminal git repository viewer with stable branch topology
/// reconstruction
#[derive(Parser, Debug)]
#[command(name = "grove", version, about, after_help = "\
Run 'grove <COMMAND> --help' for detailed options.\n\
Common options: -d <DIR> (repository), -b <BRANCHES> (branch filter)")]
struct Cli {
    /// Log level for stderr output (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the commit log of the selected branches
    Show(ShowArgs),

    /// Keep the log on screen, refreshing on repository changes
    Watch(WatchArgs),

    /// Print the branch hierarchy
    Branches(BranchesArgs),

    /// Record a branch-name override for one commit
    SetBranch(SetBranchArgs),

    /// Push or pull the branch-name overrides
    Metadata(MetadataArgs),
}

// ─── Main entry point ───────────────────────────────────────────────

pub fn run() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let result = match cli.command {
        Commands::Show(args) => cmd_show(args),
        Commands::Watch(args) => cmd_watch(args),
        Commands::Branches(args) => cmd_branches(args),
        Commands::SetBranch(args) => cmd_set_branch(args),
        Commands::Metadata(args) => cmd_metadata(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(level: &str) {
    let level = match level {
        "error" => tracing::Level::ERROR,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::WARN,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

// ─── Shared helpers ─────────────────────────────────────────────────

fn repo_root(dir: &str) -> Result<PathBuf, GroveError> {
    git::discover(Path::new(dir))
}

fn max_commits(flag: usize) -> usize {
    if flag == 0 { DEFAULT_MAX_COMMITS } else { flag }
}

fn requested_branches(branches: &Option<String>, all: bool, graph: &RepoGraph) -> Vec<String> {
    if all {
        return graph
            .branches
            .iter()
            .filter(|b| !b.is_deleted && b.is_git_branch)
            .map(|b| b.name.clone())
            .collect();
    }
    branches
        .as_deref()
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn load_view(repo: &Path, requested_flag: &Option<String>, all: bool, cap: usize) -> Result<RepoView, GroveError> {
    let service = RepoService::new(repo, cap);
    let graph = service
        .refresh()?
        .expect("fresh service has no refresh in flight");
    let settings = load_settings(repo)?;
    let requested = requested_branches(requested_flag, all, &graph);
    Ok(filter_view(&graph, &settings, &requested))
}

// ─── cmd_show ───────────────────────────────────────────────────────

fn cmd_show(args: ShowArgs) -> Result<(), GroveError> {
    let repo = repo_root(&args.dir)?;
    let view = load_view(&repo, &args.branches, args.all, max_commits(args.max_commits))?;
    print_view(&view, args.limit);
    Ok(())
}

fn print_view(view: &RepoView, limit: usize) {
    for (i, c) in view.commits.iter().enumerate() {
        if limit > 0 && i >= limit {
            println!("  ... {} more commits", view.commits.len() - i);
            break;
        }
        println!("{}", format_commit(c));
    }
    if view.truncated {
        println!("  (history truncated at {} commits)", view.total_commits);
    }
}

fn format_commit(c: &ViewCommit) -> String {
    let symbol = if c.is_uncommitted {
        "◌"
    } else if c.is_merge {
        "○"
    } else {
        "●"
    };
    let mut decorations = String::new();
    if !c.branch_tips.is_empty() {
        decorations.push_str(&format!(" ({})", c.branch_tips.join(", ")));
    }
    for tag in &c.tags {
        decorations.push_str(&format!(" <{}>", tag));
    }
    let mut marks = String::new();
    if c.is_ahead {
        marks.push('↑');
    }
    if c.is_behind {
        marks.push('↓');
    }
    if c.is_ambiguous {
        marks.push('~');
    }
    if !marks.is_empty() {
        marks.insert(0, ' ');
    }
    format!(
        "{} {} [{}]{}{} {}",
        symbol, c.sid, c.branch_name, decorations, marks, c.subject
    )
}

// ─── cmd_watch ──────────────────────────────────────────────────────

fn cmd_watch(args: WatchArgs) -> Result<(), GroveError> {
    let repo = repo_root(&args.dir)?;
    let cap = max_commits(args.max_commits);
    let service = RepoService::new(&repo, cap);
    let settings = load_settings(&repo)?;
    let watcher = start_watcher(&repo)?;

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_handler.store(false, Ordering::Release);
    })
    .map_err(|e| GroveError::InvalidArgs(format!("failed to install interrupt handler: {}", e)))?;

    let mut redraw = true;
    while running.load(Ordering::Acquire) {
        if redraw {
            redraw = false;
            match service.refresh() {
                Ok(Some(graph)) => {
                    let requested = requested_branches(&args.branches, false, &graph);
                    let view = filter_view(&graph, &settings, &requested);
                    print!("\x1B[2J\x1B[H"); // clear screen, home cursor
                    print_view(&view, args.limit);
                }
                Ok(None) => {}
                // A failed refresh keeps the previous output in place.
                Err(e) => eprintln!("refresh failed: {}", e),
            }
            if service.take_pending() {
                redraw = true;
                continue;
            }
        }
        match watcher.triggers.recv_timeout(Duration::from_millis(250)) {
            Ok(()) => redraw = true,
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}

// ─── cmd_branches ───────────────────────────────────────────────────

fn cmd_branches(args: BranchesArgs) -> Result<(), GroveError> {
    let repo = repo_root(&args.dir)?;
    let view = load_view(&repo, &None, true, DEFAULT_MAX_COMMITS)?;
    for b in &view.branches {
        let mut flags = Vec::new();
        if b.is_main {
            flags.push("main");
        }
        if b.is_current {
            flags.push("current");
        }
        if b.is_remote {
            flags.push("remote");
        }
        if !b.is_git_branch {
            flags.push("inferred");
        }
        if b.is_ambiguous {
            flags.push("ambiguous");
        }
        let flags = if flags.is_empty() { String::new() } else { format!(" [{}]", flags.join(", ")) };
        let track = match (b.ahead_count, b.behind_count) {
            (0, 0) => String::new(),
            (a, 0) => format!(" ↑{}", a),
            (0, d) => format!(" ↓{}", d),
            (a, d) => format!(" ↑{} ↓{}", a, d),
        };
        let parent = b
            .parent_name
            .as_deref()
            .map(|p| format!(" <- {}", p))
            .unwrap_or_default();
        println!("{}{}{}{}", b.name, flags, track, parent);
    }
    Ok(())
}

// ─── cmd_set_branch ─────────────────────────────────────────────────

fn cmd_set_branch(args: SetBranchArgs) -> Result<(), GroveError> {
    let repo = repo_root(&args.dir)?;
    let service = RepoService::new(&repo, DEFAULT_MAX_COMMITS);
    let graph = service
        .refresh()?
        .expect("fresh service has no refresh in flight");
    let Some(commit) = graph.find_commit_by_sid(&args.commit) else {
        return Err(GroveError::UnknownCommit(args.commit));
    };
    let sid = commit.sid.clone();
    let store = MetadataStore::new(&repo);
    let mut map = store.read()?;
    map.set(&sid, &args.name, true);
    store.write(&map)?;
    eprintln!("recorded {} -> {}", sid, args.name);
    Ok(())
}

// ─── cmd_metadata ───────────────────────────────────────────────────

fn cmd_metadata(args: MetadataArgs) -> Result<(), GroveError> {
    let repo = repo_root(&args.dir)?;
    let store = MetadataStore::new(&repo);
    match args.action {
        MetadataAction::Push => {
            store.push()?;
            eprintln!("overrides pushed to origin");
        }
        MetadataAction::Pull => {
            let map = store.pull()?;
            eprintln!("overrides merged, {} entries", map.len());
        }
    }
    Ok(())
}
