//! Unified error type for the viewer engine.

use thiserror::Error;

/// All errors that can occur while refreshing or querying a repository.
///
/// Resolution-time ambiguity is never an error: it is representable as
/// data (an ambiguous branch or commit) and flows through the normal
/// result types.
#[derive(Error, Debug)]
pub enum GroveError {
    /// I/O error (reading git-dir files, settings files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The git executable reported failure. The stderr text is carried
    /// unchanged so callers see what git said.
    #[error("git {command} failed: {message}")]
    GitCommand { command: String, message: String },

    /// git produced output the adapter could not parse
    #[error("Failed to parse git output: {0}")]
    Parse(String),

    /// Serialization/deserialization error (settings, metadata JSON)
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The given path is not inside a git repository
    #[error("Not a git repository: {0}")]
    NoRepository(String),

    /// File watcher failure
    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// A commit id given by the user does not exist in the current graph
    #[error("Unknown commit id: {0}")]
    UnknownCommit(String),

    /// Mutually exclusive flags or other argument validation error
    #[error("{0}")]
    InvalidArgs(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_command_display() {
        let err = GroveError::GitCommand {
            command: "log".to_string(),
            message: "fatal: bad revision".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("git log failed"));
        assert!(msg.contains("bad revision"));
    }

    #[test]
    fn test_io_error_from_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: GroveError = io_err.into();
        assert!(matches!(err, GroveError::Io(_)));
    }

    #[test]
    fn test_no_repository_display() {
        let err = GroveError::NoRepository("/tmp/nowhere".to_string());
        assert!(err.to_string().contains("/tmp/nowhere"));
    }

    #[test]
    fn test_unknown_commit_display() {
        let err = GroveError::UnknownCommit("abc123".to_string());
        assert!(err.to_string().contains("abc123"));
    }
}
