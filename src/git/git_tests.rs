//! Unit tests for the git adapter parsers, plus integration tests that
//! run against throwaway repositories built with the real `git` binary.
//! Requires `git` in PATH.

use super::*;

// ─── Log parsing ────────────────────────────────────────────────────

fn log_record(id: &str, parents: &str, subject: &str, body: &str) -> String {
    format!(
        "{}{}{}{}{}Alice{}1700000000{}1700000100{}{}{}{}",
        RECORD_SEP, id, FIELD_SEP, parents, FIELD_SEP, FIELD_SEP, FIELD_SEP, FIELD_SEP, subject,
        FIELD_SEP, body
    )
}

#[test]
fn test_parse_log_single_commit() {
    let out = log_record("aaa111", "", "init", "init\n");
    let commits = parse_log_output(&out).unwrap();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].id, "aaa111");
    assert!(commits[0].parent_ids.is_empty());
    assert_eq!(commits[0].author, "Alice");
    assert_eq!(commits[0].author_time, 1_700_000_000);
    assert_eq!(commits[0].commit_time, 1_700_000_100);
    assert_eq!(commits[0].subject, "init");
    assert_eq!(commits[0].message, "init");
}

#[test]
fn test_parse_log_merge_parents() {
    let out = log_record("ccc333", "aaa111 bbb222", "Merge branch 'dev'", "Merge branch 'dev'\n");
    let commits = parse_log_output(&out).unwrap();
    assert_eq!(commits[0].parent_ids, vec!["aaa111".to_string(), "bbb222".to_string()]);
}

#[test]
fn test_parse_log_multiline_message() {
    let out = log_record("ddd444", "aaa111", "subject line", "subject line\n\nbody text\nmore body\n");
    let commits = parse_log_output(&out).unwrap();
    assert_eq!(commits[0].subject, "subject line");
    assert!(commits[0].message.contains("more body"));
}

#[test]
fn test_parse_log_multiple_records() {
    let out = format!(
        "{}{}",
        log_record("bbb222", "aaa111", "two", "two\n"),
        log_record("aaa111", "", "one", "one\n")
    );
    let commits = parse_log_output(&out).unwrap();
    assert_eq!(commits.len(), 2);
    assert_eq!(commits[0].id, "bbb222");
    assert_eq!(commits[1].id, "aaa111");
}

#[test]
fn test_parse_log_rejects_short_record() {
    let out = format!("{}aaa{}only-two-fields", RECORD_SEP, FIELD_SEP);
    assert!(parse_log_output(&out).is_err());
}

// ─── Branch parsing ─────────────────────────────────────────────────

fn ref_line(head: &str, refname: &str, short: &str, oid: &str, upstream: &str, track: &str) -> String {
    format!(
        "{}{}{}{}{}{}{}{}{}{}{}",
        head, FIELD_SEP, refname, FIELD_SEP, short, FIELD_SEP, oid, FIELD_SEP, upstream, FIELD_SEP,
        track
    )
}

#[test]
fn test_parse_branches_local_and_remote() {
    let out = format!(
        "{}\n{}\n",
        ref_line("*", "refs/heads/main", "main", "aaa111", "origin/main", "[ahead 2, behind 1]"),
        ref_line("", "refs/remotes/origin/main", "origin/main", "bbb222", "", "")
    );
    let branches = parse_branch_output(&out).unwrap();
    assert_eq!(branches.len(), 2);
    let local = &branches[0];
    assert_eq!(local.name, "main");
    assert!(local.is_current);
    assert!(!local.is_remote);
    assert_eq!(local.upstream.as_deref(), Some("origin/main"));
    assert_eq!(local.ahead_count, 2);
    assert_eq!(local.behind_count, 1);
    let remote = &branches[1];
    assert!(remote.is_remote);
    assert!(!remote.is_current);
    assert!(remote.upstream.is_none());
}

#[test]
fn test_parse_branches_skips_origin_head() {
    let out = format!(
        "{}\n",
        ref_line("", "refs/remotes/origin/HEAD", "origin/HEAD", "aaa111", "", "")
    );
    let branches = parse_branch_output(&out).unwrap();
    assert!(branches.is_empty());
}

#[test]
fn test_parse_track_values() {
    assert_eq!(parse_track(""), (0, 0));
    assert_eq!(parse_track("[gone]"), (0, 0));
    assert_eq!(parse_track("[ahead 3]"), (3, 0));
    assert_eq!(parse_track("[behind 7]"), (0, 7));
    assert_eq!(parse_track("[ahead 3, behind 7]"), (3, 7));
}

// ─── Tag parsing ────────────────────────────────────────────────────

#[test]
fn test_parse_tags_lightweight_and_annotated() {
    let out = format!(
        "aaa111{}{}v1.0\nbbb222{}ccc333{}v2.0\n",
        FIELD_SEP, FIELD_SEP, FIELD_SEP, FIELD_SEP
    );
    let tags = parse_tag_output(&out).unwrap();
    assert_eq!(tags.len(), 2);
    // Lightweight tag: the object itself is the commit.
    assert_eq!(tags[0].name, "v1.0");
    assert_eq!(tags[0].commit_id, "aaa111");
    // Annotated tag: the peeled id wins.
    assert_eq!(tags[1].name, "v2.0");
    assert_eq!(tags[1].commit_id, "ccc333");
}

// ─── Stash parsing ──────────────────────────────────────────────────

#[test]
fn test_parse_stashes() {
    let out = format!(
        "aaa111{}base1 idx1{}stash@{{0}}{}WIP on feature/x: 1234abc fix the thing\n",
        FIELD_SEP, FIELD_SEP, FIELD_SEP
    );
    let stashes = parse_stash_output(&out).unwrap();
    assert_eq!(stashes.len(), 1);
    assert_eq!(stashes[0].id, "aaa111");
    assert_eq!(stashes[0].parent_ids, vec!["base1".to_string(), "idx1".to_string()]);
    assert_eq!(stashes[0].name, "stash@{0}");
    assert_eq!(stashes[0].branch, "feature/x");
}

#[test]
fn test_parse_stash_branch_on_form() {
    let out = format!(
        "aaa111{}base1 idx1{}stash@{{1}}{}On main: named stash\n",
        FIELD_SEP, FIELD_SEP, FIELD_SEP
    );
    let stashes = parse_stash_output(&out).unwrap();
    assert_eq!(stashes[0].branch, "main");
}

// ─── Status parsing ─────────────────────────────────────────────────

#[test]
fn test_parse_status_categories() {
    let out = " M modified.rs\nA  added.rs\n?? untracked.rs\n D deleted.rs\nUU conflicted.rs\nR  old.rs -> new.rs\n";
    let status = parse_status_output(out);
    assert_eq!(status.modified, vec!["modified.rs"]);
    assert_eq!(status.added, vec!["added.rs", "untracked.rs"]);
    assert_eq!(status.deleted, vec!["deleted.rs"]);
    assert_eq!(status.conflicted, vec!["conflicted.rs"]);
    assert_eq!(status.renamed, vec!["old.rs -> new.rs"]);
    assert_eq!(status.change_count(), 6);
    assert!(status.is_dirty());
}

#[test]
fn test_parse_status_clean() {
    let status = parse_status_output("");
    assert_eq!(status.change_count(), 0);
    assert!(!status.is_dirty());
}

// ─── Integration: throwaway repositories ────────────────────────────

mod integration {
    use super::super::*;
    use crate::git::metadata::MetadataStore;
    use std::path::Path;
    use std::process::Command;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .env("GIT_AUTHOR_NAME", "Test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "Test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .status()
            .expect("git runs");
        assert!(status.success(), "git {:?} failed", args);
    }

    fn init_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init", "-q", "-b", "main"]);
        git(dir.path(), &["commit", "-q", "--allow-empty", "-m", "init"]);
        dir
    }

    #[test]
    fn test_discover_finds_repo_root() {
        let dir = init_repo();
        let sub = dir.path().join("src");
        std::fs::create_dir(&sub).unwrap();
        let root = discover(&sub).unwrap();
        assert_eq!(
            root.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_discover_rejects_non_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover(dir.path()),
            Err(crate::error::GroveError::NoRepository(_))
        ));
    }

    #[test]
    fn test_fetch_log_and_branches() {
        let dir = init_repo();
        git(dir.path(), &["commit", "-q", "--allow-empty", "-m", "second"]);
        let (log, truncated) = fetch_log(dir.path(), 100).unwrap();
        assert_eq!(log.len(), 2);
        assert!(!truncated);
        assert_eq!(log[0].subject, "second");
        assert_eq!(log[1].subject, "init");
        assert_eq!(log[0].parent_ids, vec![log[1].id.clone()]);

        let branches = fetch_branches(dir.path()).unwrap();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].name, "main");
        assert!(branches[0].is_current);
        assert_eq!(branches[0].tip_id, log[0].id);
    }

    #[test]
    fn test_fetch_log_reports_cap() {
        let dir = init_repo();
        git(dir.path(), &["commit", "-q", "--allow-empty", "-m", "second"]);
        git(dir.path(), &["commit", "-q", "--allow-empty", "-m", "third"]);
        let (log, truncated) = fetch_log(dir.path(), 2).unwrap();
        assert_eq!(log.len(), 2);
        assert!(truncated);
    }

    #[test]
    fn test_fetch_status_dirty_file() {
        let dir = init_repo();
        std::fs::write(dir.path().join("new.txt"), "hello").unwrap();
        let status = fetch_status(dir.path()).unwrap();
        assert_eq!(status.added, vec!["new.txt"]);
        assert!(status.is_dirty());
        assert!(!status.is_merging);
    }

    #[test]
    fn test_fetch_tags_on_commit() {
        let dir = init_repo();
        git(dir.path(), &["tag", "v1.0"]);
        let tags = fetch_tags(dir.path()).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "v1.0");
        let (log, _) = fetch_log(dir.path(), 10).unwrap();
        assert_eq!(tags[0].commit_id, log[0].id);
    }

    #[test]
    fn test_metadata_store_round_trip() {
        let dir = init_repo();
        let store = MetadataStore::new(dir.path());
        // No ref yet: absence is an empty store, not an error.
        let empty = store.read().unwrap();
        assert!(empty.is_empty());

        let mut map = empty;
        map.set("abc123", "feature/x", true);
        store.write(&map).unwrap();
        let back = store.read().unwrap();
        assert_eq!(back, map);
        let entry = back.get("abc123").unwrap();
        assert_eq!(entry.name, "feature/x");
        assert!(entry.set_by_user);
    }

    #[test]
    fn test_detached_head_synthesized() {
        let dir = init_repo();
        git(dir.path(), &["commit", "-q", "--allow-empty", "-m", "second"]);
        let (log, _) = fetch_log(dir.path(), 10).unwrap();
        git(dir.path(), &["checkout", "-q", "--detach", &log[1].id]);
        let branches = fetch_branches(dir.path()).unwrap();
        let detached = branches.iter().find(|b| b.is_detached).expect("detached record");
        assert!(detached.is_current);
        assert_eq!(detached.tip_id, log[1].id);
        // The ref-backed branch is no longer current.
        assert!(branches.iter().filter(|b| !b.is_detached).all(|b| !b.is_current));
    }
}
