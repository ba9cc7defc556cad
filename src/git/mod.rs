//! Git adapter — calls the `git` CLI and parses its output into typed records.
//!
//! Everything the engine knows about a repository comes through here:
//! commits, branches, tags, stashes and working-tree status. The adapter
//! never interprets history; it only turns git's loosely structured text
//! into records the `graph` module can reason about.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::GroveError;

pub mod metadata;

// ─── Output format constants ────────────────────────────────────────

/// Separator used in git log/for-each-ref formats to split fields.
/// Using a rare Unicode character to avoid collision with commit data.
pub const FIELD_SEP: &str = "␞";
/// Separator between records in git log output.
pub const RECORD_SEP: &str = "␟";

// ─── Types ──────────────────────────────────────────────────────────

/// A raw commit as reported by `git log`.
#[derive(Clone, Debug)]
pub struct LogCommit {
    pub id: String,
    pub parent_ids: Vec<String>,
    pub author: String,
    /// Author time, seconds since epoch.
    pub author_time: i64,
    /// Commit time, seconds since epoch.
    pub commit_time: i64,
    /// First line of the message.
    pub subject: String,
    pub message: String,
}

/// A live branch pointer as reported by `git for-each-ref`.
#[derive(Clone, Debug, Default)]
pub struct BranchRecord {
    pub name: String,
    pub tip_id: String,
    pub is_current: bool,
    pub is_remote: bool,
    pub is_detached: bool,
    /// Configured upstream, e.g. `origin/main`.
    pub upstream: Option<String>,
    pub ahead_count: u32,
    pub behind_count: u32,
}

/// A tag and the commit it points to (peeled for annotated tags).
#[derive(Clone, Debug)]
pub struct Tag {
    pub name: String,
    pub commit_id: String,
}

/// A stash entry. The stash commit id and its non-base parents are
/// internal plumbing commits that must not appear in the visible log.
#[derive(Clone, Debug)]
pub struct Stash {
    pub id: String,
    pub parent_ids: Vec<String>,
    pub name: String,
    /// Branch the stash was taken on, parsed from the default subject.
    pub branch: String,
    pub subject: String,
}

/// Working-tree status.
#[derive(Clone, Debug, Default)]
pub struct WorkStatus {
    pub modified: Vec<String>,
    pub added: Vec<String>,
    pub deleted: Vec<String>,
    pub conflicted: Vec<String>,
    pub renamed: Vec<String>,
    pub is_merging: bool,
    pub merge_message: String,
    pub merge_head_id: Option<String>,
}

impl WorkStatus {
    /// Total number of pending working-tree changes.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.modified.len()
            + self.added.len()
            + self.deleted.len()
            + self.conflicted.len()
            + self.renamed.len()
    }

    /// True when anything at all is pending.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.change_count() > 0 || self.is_merging
    }
}

// ─── Command plumbing ───────────────────────────────────────────────

/// Run a git command in `repo_path` and return stdout as a String.
pub fn run_git(repo_path: &Path, args: &[&str]) -> Result<String, GroveError> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo_path)
        .args(args)
        .output()
        .map_err(|e| GroveError::GitCommand {
            command: args.first().unwrap_or(&"").to_string(),
            message: format!("Failed to execute git: {}. Is git installed and in PATH?", e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GroveError::GitCommand {
            command: args.join(" "),
            message: stderr.trim().to_string(),
        });
    }

    String::from_utf8(output.stdout)
        .map_err(|e| GroveError::Parse(format!("git output is not valid UTF-8: {}", e)))
}

/// Run a git command with bytes piped to stdin, returning stdout.
pub fn run_git_with_input(repo_path: &Path, args: &[&str], input: &str) -> Result<String, GroveError> {
    use std::io::Write;
    use std::process::Stdio;

    let mut child = Command::new("git")
        .arg("-C")
        .arg(repo_path)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| GroveError::GitCommand {
            command: args.first().unwrap_or(&"").to_string(),
            message: format!("Failed to execute git: {}. Is git installed and in PATH?", e),
        })?;
    if let Some(stdin) = child.stdin.as_mut() {
        stdin.write_all(input.as_bytes())?;
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GroveError::GitCommand {
            command: args.join(" "),
            message: stderr.trim().to_string(),
        });
    }
    String::from_utf8(output.stdout)
        .map_err(|e| GroveError::Parse(format!("git output is not valid UTF-8: {}", e)))
}

/// Resolve the repository work-tree root for a path, or report that the
/// path is not inside a repository.
pub fn discover(path: &Path) -> Result<PathBuf, GroveError> {
    let out = run_git(path, &["rev-parse", "--show-toplevel"])
        .map_err(|_| GroveError::NoRepository(path.display().to_string()))?;
    Ok(PathBuf::from(out.trim()))
}

/// Resolve the repository's git directory (absolute).
pub fn git_dir(repo_path: &Path) -> Result<PathBuf, GroveError> {
    let out = run_git(repo_path, &["rev-parse", "--git-dir"])?;
    let dir = PathBuf::from(out.trim());
    if dir.is_absolute() {
        Ok(dir)
    } else {
        Ok(repo_path.join(dir))
    }
}

// ─── Commit log ─────────────────────────────────────────────────────

/// Fetch the commit log across branches, remotes, tags and stashes,
/// most-recent first. The metadata ref points at a blob and must stay
/// out of the rev walk.
///
/// Returns the commits and whether the configured cap was reached, which
/// downstream treats as "the log was truncated for size".
pub fn fetch_log(repo_path: &Path, max_count: usize) -> Result<(Vec<LogCommit>, bool), GroveError> {
    let format = format!(
        "--format={}%H{}%P{}%an{}%at{}%ct{}%s{}%B",
        RECORD_SEP, FIELD_SEP, FIELD_SEP, FIELD_SEP, FIELD_SEP, FIELD_SEP, FIELD_SEP
    );
    let max = format!("--max-count={}", max_count);
    let out = run_git(
        repo_path,
        &[
            "log",
            "--branches",
            "--remotes",
            "--tags",
            "--glob=refs/stash",
            &max,
            &format,
        ],
    )?;
    let commits = parse_log_output(&out)?;
    let truncated = commits.len() >= max_count;
    Ok((commits, truncated))
}

/// Parse separator-formatted `git log` output into commits.
pub fn parse_log_output(out: &str) -> Result<Vec<LogCommit>, GroveError> {
    let mut commits = Vec::new();
    for record in out.split(RECORD_SEP) {
        let record = record.trim_matches(['\r', '\n', ' ']);
        if record.is_empty() {
            continue;
        }
        let fields: Vec<&str> = record.splitn(7, FIELD_SEP).collect();
        if fields.len() != 7 {
            return Err(GroveError::Parse(format!(
                "expected 7 log fields, got {} in {:?}",
                fields.len(),
                record
            )));
        }
        let author_time: i64 = fields[3]
            .trim()
            .parse()
            .map_err(|e| GroveError::Parse(format!("bad author time {:?}: {}", fields[3], e)))?;
        let commit_time: i64 = fields[4]
            .trim()
            .parse()
            .map_err(|e| GroveError::Parse(format!("bad commit time {:?}: {}", fields[4], e)))?;
        let parent_ids = if fields[1].trim().is_empty() {
            Vec::new()
        } else {
            fields[1].split_whitespace().map(str::to_string).collect()
        };
        commits.push(LogCommit {
            id: fields[0].trim().to_string(),
            parent_ids,
            author: fields[2].trim().to_string(),
            author_time,
            commit_time,
            subject: fields[5].trim().to_string(),
            message: fields[6].trim_end().to_string(),
        });
    }
    Ok(commits)
}

// ─── Branches ───────────────────────────────────────────────────────

/// Fetch all local and remote branches, including a synthesized record
/// for a detached HEAD.
pub fn fetch_branches(repo_path: &Path) -> Result<Vec<BranchRecord>, GroveError> {
    let format = format!(
        "--format=%(HEAD){}%(refname){}%(refname:short){}%(objectname){}%(upstream:short){}%(upstream:track)",
        FIELD_SEP, FIELD_SEP, FIELD_SEP, FIELD_SEP, FIELD_SEP
    );
    let out = run_git(repo_path, &["for-each-ref", &format, "refs/heads", "refs/remotes"])?;
    let mut branches = parse_branch_output(&out)?;

    // A detached HEAD has no ref of its own; synthesize a branch record
    // so the working position is still representable.
    if run_git(repo_path, &["symbolic-ref", "-q", "HEAD"]).is_err() {
        if let Ok(head) = run_git(repo_path, &["rev-parse", "HEAD"]) {
            branches.push(BranchRecord {
                name: "detached".to_string(),
                tip_id: head.trim().to_string(),
                is_current: true,
                is_detached: true,
                ..BranchRecord::default()
            });
        }
    }
    Ok(branches)
}

/// Parse separator-formatted `git for-each-ref` output into branch records.
pub fn parse_branch_output(out: &str) -> Result<Vec<BranchRecord>, GroveError> {
    let mut branches = Vec::new();
    for line in out.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.splitn(6, FIELD_SEP).collect();
        if fields.len() != 6 {
            return Err(GroveError::Parse(format!(
                "expected 6 ref fields, got {} in {:?}",
                fields.len(),
                line
            )));
        }
        let refname = fields[1];
        let short = fields[2];
        // origin/HEAD is a symbolic alias, not a branch.
        if short.ends_with("/HEAD") {
            continue;
        }
        let is_remote = refname.starts_with("refs/remotes/");
        let (ahead, behind) = parse_track(fields[5]);
        branches.push(BranchRecord {
            name: short.to_string(),
            tip_id: fields[3].to_string(),
            is_current: fields[0] == "*",
            is_remote,
            is_detached: false,
            upstream: if fields[4].is_empty() { None } else { Some(fields[4].to_string()) },
            ahead_count: ahead,
            behind_count: behind,
        });
    }
    Ok(branches)
}

/// Parse an `%(upstream:track)` value like `[ahead 3, behind 2]`.
/// Returns (0, 0) for empty or `[gone]` values.
#[must_use]
pub fn parse_track(track: &str) -> (u32, u32) {
    let inner = track.trim().trim_start_matches('[').trim_end_matches(']');
    let mut ahead = 0;
    let mut behind = 0;
    for part in inner.split(',') {
        let part = part.trim();
        if let Some(n) = part.strip_prefix("ahead ") {
            ahead = n.trim().parse().unwrap_or(0);
        } else if let Some(n) = part.strip_prefix("behind ") {
            behind = n.trim().parse().unwrap_or(0);
        }
    }
    (ahead, behind)
}

// ─── Tags ───────────────────────────────────────────────────────────

/// Fetch all tags with their peeled commit ids.
pub fn fetch_tags(repo_path: &Path) -> Result<Vec<Tag>, GroveError> {
    let format = format!(
        "--format=%(objectname){}%(*objectname){}%(refname:short)",
        FIELD_SEP, FIELD_SEP
    );
    let out = run_git(repo_path, &["for-each-ref", &format, "refs/tags"])?;
    parse_tag_output(&out)
}

/// Parse separator-formatted tag refs. Annotated tags use the peeled id.
pub fn parse_tag_output(out: &str) -> Result<Vec<Tag>, GroveError> {
    let mut tags = Vec::new();
    for line in out.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.splitn(3, FIELD_SEP).collect();
        if fields.len() != 3 {
            return Err(GroveError::Parse(format!("bad tag record {:?}", line)));
        }
        let commit_id = if fields[1].is_empty() { fields[0] } else { fields[1] };
        tags.push(Tag {
            name: fields[2].to_string(),
            commit_id: commit_id.to_string(),
        });
    }
    Ok(tags)
}

// ─── Stashes ────────────────────────────────────────────────────────

/// Fetch the stash list.
pub fn fetch_stashes(repo_path: &Path) -> Result<Vec<Stash>, GroveError> {
    let format = format!("--format=%H{}%P{}%gd{}%gs", FIELD_SEP, FIELD_SEP, FIELD_SEP);
    let out = run_git(repo_path, &["stash", "list", &format])?;
    parse_stash_output(&out)
}

/// Parse `git stash list` output. The originating branch comes from the
/// default `WIP on <branch>: ...` / `On <branch>: ...` subject shape.
pub fn parse_stash_output(out: &str) -> Result<Vec<Stash>, GroveError> {
    let mut stashes = Vec::new();
    for line in out.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.splitn(4, FIELD_SEP).collect();
        if fields.len() != 4 {
            return Err(GroveError::Parse(format!("bad stash record {:?}", line)));
        }
        let subject = fields[3].to_string();
        stashes.push(Stash {
            id: fields[0].to_string(),
            parent_ids: fields[1].split_whitespace().map(str::to_string).collect(),
            name: fields[2].to_string(),
            branch: parse_stash_branch(&subject),
            subject,
        });
    }
    Ok(stashes)
}

fn parse_stash_branch(subject: &str) -> String {
    let rest = subject
        .strip_prefix("WIP on ")
        .or_else(|| subject.strip_prefix("On "))
        .unwrap_or("");
    rest.split(':').next().unwrap_or("").trim().to_string()
}

// ─── Working-tree status ────────────────────────────────────────────

/// Fetch working-tree status plus merge-in-progress state.
pub fn fetch_status(repo_path: &Path) -> Result<WorkStatus, GroveError> {
    let out = run_git(repo_path, &["status", "--porcelain"])?;
    let mut status = parse_status_output(&out);

    let gd = git_dir(repo_path)?;
    let merge_head = gd.join("MERGE_HEAD");
    if merge_head.exists() {
        status.is_merging = true;
        let head = std::fs::read_to_string(&merge_head)?;
        status.merge_head_id = Some(head.trim().to_string());
        if let Ok(msg) = std::fs::read_to_string(gd.join("MERGE_MSG")) {
            status.merge_message = msg.lines().next().unwrap_or("").to_string();
        }
    }
    Ok(status)
}

/// Classify `git status --porcelain` lines into change categories.
#[must_use]
pub fn parse_status_output(out: &str) -> WorkStatus {
    let mut status = WorkStatus::default();
    for line in out.lines() {
        if line.len() < 4 {
            continue;
        }
        let code = &line[..2];
        let path = line[3..].to_string();
        if code.contains('U') || code == "AA" || code == "DD" {
            status.conflicted.push(path);
        } else if code == "??" {
            status.added.push(path);
        } else if code.starts_with('R') {
            status.renamed.push(path);
        } else if code.contains('D') {
            status.deleted.push(path);
        } else if code.contains('A') {
            status.added.push(path);
        } else {
            status.modified.push(path);
        }
    }
    status
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
