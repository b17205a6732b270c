use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the synchronization core.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Failures surfaced by the git synchronization engine and the operation tracker.
///
/// Every variant except [`SyncError::Io`] and [`SyncError::Git`] maps to a specific
/// outcome a caller may want to react to (for instance, retrying a request that
/// failed with [`SyncError::PushConflict`]).
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network, authentication or timeout failure while cloning.
    #[error("failed to clone repository from '{url}': {detail}")]
    Clone { url: String, detail: String },

    /// The requested remote branch does not exist.
    #[error("remote branch '{branch}' not found in repository '{url}'")]
    BranchNotFound { url: String, branch: String },

    /// A remote branch exists although the call asked for it not to.
    #[error("remote branch '{branch}' already exists in repository '{url}'")]
    BranchAlreadyExists { url: String, branch: String },

    /// Non-fast-forward push that survived the rebase-and-retry cycle, or a failed rebase.
    #[error("failed to push to {remote} on branch {branch}: remote conflict. {detail}")]
    PushConflict {
        remote: String,
        branch: String,
        detail: String,
    },

    /// The remote refused a ref update for a reason other than a non-fast-forward.
    #[error("push to {remote} on branch {branch} was rejected: {reason}")]
    PushRejected {
        remote: String,
        branch: String,
        reason: String,
    },

    /// Unmerged paths were found in the index before committing.
    #[error("unexpected conflicting files, skipping commit and push: {}", paths.join(", "))]
    UnexpectedConflict { paths: Vec<String> },

    /// The token names a request kind that cannot be decoded or evaluated.
    #[error("unsupported operation kind '{kind}'")]
    UnsupportedOperationKind { kind: String },

    /// The token is not a well-formed operation token.
    #[error("invalid operation token: {0}")]
    InvalidToken(String),

    /// The session has no workspace (never opened, or already closed).
    #[error("no workspace available: session is closed")]
    WorkspaceClosed,

    /// A git invocation exited with a failure status.
    #[error("`git {command}` failed in {}: {stderr}", workdir.display())]
    Git {
        command: String,
        workdir: PathBuf,
        stderr: String,
    },

    /// A git invocation did not complete within its ceiling and was killed.
    #[error("`git {command}` timed out after {}s", timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Whether this failure stems from concurrent writers racing on the same branch.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            SyncError::PushConflict { .. } | SyncError::UnexpectedConflict { .. }
        )
    }
}
