//! Merge-subject parsing — extracts candidate branch names from commit
//! subject lines.
//!
//! A merge commit's subject is often the only surviving record of a
//! deleted branch's name. Subjects of the shape
//! `Merge «name» [of <url>] [into «name»]` are recognized, classified as
//! plain merge, pull merge (the remote copy of the same logical branch)
//! or pull-request merge, and cached per commit id for the duration of
//! one resolution pass.

use std::collections::HashMap;

use regex::Regex;

use crate::graph::{REMOTE_PREFIX, primary_name};

/// Names extracted from one merge subject.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedSubject {
    /// Branch merged from. May be empty for degenerate subjects.
    pub from: String,
    /// Branch merged into. Empty when the subject does not say.
    pub into: String,
    /// Both sides are the same logical branch (a pull).
    pub is_pull_merge: bool,
    /// A pull-request merge; `from` doubles as the synthetic branch name.
    pub is_pull_request: bool,
}

/// Per-pass parse cache. Owned by one resolution pass so concurrent
/// resolutions of different repositories cannot interfere.
pub struct SubjectCache {
    merge_re: Regex,
    pr_re: Regex,
    pr_short_re: Regex,
    parsed: HashMap<String, Option<ParsedSubject>>,
    /// Branch name a child's subject determined for this commit id.
    inherited: HashMap<String, String>,
}

impl SubjectCache {
    #[must_use]
    pub fn new() -> Self {
        // "Merge" or "Merged", optional remote-tracking/branch/commit/from
        // qualifiers, optionally quoted name, optional "of <url>" source
        // clause, optional "into <name>". Anchored to the whole subject to
        // keep free-form subjects starting with "Merge" from matching.
        let merge_re = Regex::new(
            r#"(?i)^merged?\s+(?:remote-tracking\s+)?(?:branch\s+|commit\s+|from\s+)?['"]?([^'"\s]+)['"]?(?:\s+of\s+(\S+))?(?:\s+into\s+['"]?([^'"\s]+)['"]?)?\s*$"#,
        )
        .expect("merge subject pattern is valid");
        let pr_re = Regex::new(r"(?i)^merge\s+pull\s+request\s+#?(\S+)\s+(?:from|of)\s+(\S+)")
            .expect("pull request pattern is valid");
        let pr_short_re =
            Regex::new(r"(?i)^merged?\s+pr\s+#?(\d+)").expect("short pull request pattern is valid");
        Self {
            merge_re,
            pr_re,
            pr_short_re,
            parsed: HashMap::new(),
            inherited: HashMap::new(),
        }
    }

    /// Parse a subject, memoized by commit id. The same commit is queried
    /// by several resolver heuristics; parsing happens once.
    pub fn parse(&mut self, commit_id: &str, subject: &str) -> Option<ParsedSubject> {
        if let Some(cached) = self.parsed.get(commit_id) {
            return cached.clone();
        }
        let result = self.parse_subject(subject);
        self.parsed.insert(commit_id.to_string(), result.clone());
        result
    }

    /// Parse a subject without touching the cache.
    #[must_use]
    pub fn parse_subject(&self, subject: &str) -> Option<ParsedSubject> {
        if let Some(caps) = self.pr_re.captures(subject) {
            return Some(ParsedSubject {
                from: caps[2].to_string(),
                into: String::new(),
                is_pull_merge: false,
                is_pull_request: true,
            });
        }
        if let Some(caps) = self.pr_short_re.captures(subject) {
            return Some(ParsedSubject {
                from: format!("PR {}", &caps[1]),
                into: String::new(),
                is_pull_merge: false,
                is_pull_request: true,
            });
        }
        let caps = self.merge_re.captures(subject)?;
        let from_raw = caps.get(1).map_or("", |m| m.as_str());
        let has_source = caps.get(2).is_some();
        let into_raw = caps.get(3).map_or("", |m| m.as_str());

        // Strip remote decoration so local and remote spellings of the
        // same branch compare equal.
        let from = primary_name(from_raw).to_string();
        let into = primary_name(into_raw).to_string();
        let from_was_remote = from_raw.starts_with(REMOTE_PREFIX);

        let same_name = !from.is_empty() && !into.is_empty() && from == into;
        let no_differing_into = into.is_empty() || into == from;
        let is_pull_merge =
            same_name || (from_was_remote && no_differing_into) || (has_source && no_differing_into);

        Some(ParsedSubject { from, into, is_pull_merge, is_pull_request: false })
    }

    /// Record the branch name a child's subject supplies for a parent.
    /// The first (newest) child to name a commit wins.
    pub fn record_inherited(&mut self, commit_id: &str, name: &str) {
        if name.is_empty() {
            return;
        }
        self.inherited
            .entry(commit_id.to_string())
            .or_insert_with(|| name.to_string());
    }

    /// Name previously recorded for this commit id, if any.
    #[must_use]
    pub fn inherited(&self, commit_id: &str) -> Option<&str> {
        self.inherited.get(commit_id).map(String::as_str)
    }
}

impl Default for SubjectCache {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(subject: &str) -> Option<ParsedSubject> {
        SubjectCache::new().parse_subject(subject)
    }

    #[test]
    fn test_plain_merge_into() {
        let p = parse("Merge branch 'dev' into main").unwrap();
        assert_eq!(p.from, "dev");
        assert_eq!(p.into, "main");
        assert!(!p.is_pull_merge);
        assert!(!p.is_pull_request);
    }

    #[test]
    fn test_merge_without_into() {
        let p = parse("Merge branch 'feature/login'").unwrap();
        assert_eq!(p.from, "feature/login");
        assert_eq!(p.into, "");
        assert!(!p.is_pull_merge);
    }

    #[test]
    fn test_merge_unquoted_names() {
        let p = parse("Merge dev into main").unwrap();
        assert_eq!(p.from, "dev");
        assert_eq!(p.into, "main");
    }

    #[test]
    fn test_merged_past_tense() {
        let p = parse("Merged branch 'dev' into main").unwrap();
        assert_eq!(p.from, "dev");
    }

    #[test]
    fn test_case_insensitive() {
        let p = parse("merge branch 'dev' INTO main").unwrap();
        assert_eq!(p.from, "dev");
        assert_eq!(p.into, "main");
    }

    #[test]
    fn test_pull_merge_same_name() {
        let p = parse("Merge branch 'main' into main").unwrap();
        assert!(p.is_pull_merge);
    }

    #[test]
    fn test_pull_merge_of_source() {
        let p = parse("Merge branch 'main' of https://example.com/repo.git").unwrap();
        assert_eq!(p.from, "main");
        assert!(p.is_pull_merge);
    }

    #[test]
    fn test_pull_merge_remote_tracking() {
        let p = parse("Merge remote-tracking branch 'origin/main'").unwrap();
        assert_eq!(p.from, "main");
        assert!(p.is_pull_merge);
    }

    #[test]
    fn test_of_source_with_differing_into_is_not_pull_merge() {
        let p = parse("Merge branch 'dev' of https://example.com/repo into main").unwrap();
        assert_eq!(p.from, "dev");
        assert_eq!(p.into, "main");
        assert!(!p.is_pull_merge);
    }

    #[test]
    fn test_remote_prefix_stripped_from_both_sides() {
        let p = parse("Merge branch 'origin/dev' into origin/main").unwrap();
        assert_eq!(p.from, "dev");
        assert_eq!(p.into, "main");
    }

    #[test]
    fn test_pull_request_long_form() {
        let p = parse("Merge pull request #42 from user/feature-x").unwrap();
        assert!(p.is_pull_request);
        assert_eq!(p.from, "user/feature-x");
        assert_eq!(p.into, "");
    }

    #[test]
    fn test_pull_request_short_form_gets_marker() {
        let p = parse("Merged PR 123: add login flow").unwrap();
        assert!(p.is_pull_request);
        assert_eq!(p.from, "PR 123");
    }

    #[test]
    fn test_non_merge_subject() {
        assert!(parse("Fix login bug").is_none());
        assert!(parse("Update README").is_none());
    }

    #[test]
    fn test_free_form_merge_sentence_rejected() {
        assert!(parse("Merge the new parser with the old one").is_none());
    }

    #[test]
    fn test_merge_commit_qualifier() {
        let p = parse("Merge commit 'abc1234'").unwrap();
        assert_eq!(p.from, "abc1234");
    }

    #[test]
    fn test_cache_memoizes_by_commit_id() {
        let mut cache = SubjectCache::new();
        let a = cache.parse("c1", "Merge branch 'dev' into main");
        let b = cache.parse("c1", "completely different subject");
        // Second call hits the cache keyed by commit id.
        assert_eq!(a, b);
    }

    #[test]
    fn test_inherited_first_writer_wins() {
        let mut cache = SubjectCache::new();
        cache.record_inherited("c1", "dev");
        cache.record_inherited("c1", "other");
        assert_eq!(cache.inherited("c1"), Some("dev"));
    }

    #[test]
    fn test_inherited_ignores_empty_names() {
        let mut cache = SubjectCache::new();
        cache.record_inherited("c1", "");
        assert_eq!(cache.inherited("c1"), None);
    }
}
