//! Git-backed synchronization of a provisioning call's workspace.
//!
//! Drives the git CLI to clone a remote into a disposable workspace, pick the
//! branches and submodules a call needs, and push the call's changes back with
//! optimistic concurrency: one rebase-and-retry cycle on a non-fast-forward
//! rejection, then failure.

mod branches;
mod command;
mod engine;
mod operations;
mod push;
mod session;
mod status;
mod submodules;

pub use branches::{BranchIntent, BranchResolver};
pub use command::{git_available, Credentials};
pub use engine::{GitSyncEngine, SyncRequest, DEFAULT_COMMIT_MESSAGE};
pub use operations::CommitOutcome;
pub use push::{PushReport, RefUpdate, RefUpdateOutcome};
pub use session::{
    CommitterIdentity, RepositoryHandle, RepositorySession, Workspace, DEFAULT_COMMITTER_EMAIL,
    DEFAULT_COMMITTER_NAME, DEFAULT_GIT_TIMEOUT, DEFAULT_PRIMARY_BRANCH, REMOTE_NAME,
};
pub use status::StagedChanges;
pub use submodules::{SubmoduleDecision, SubmoduleFetchMode, SubmoduleSelector, SubmoduleSet};
