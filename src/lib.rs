//! # broker-git-sync
//!
//! Repository synchronization and asynchronous operation tracking for an
//! on-demand service broker that keeps its deployments in a shared git
//! repository.
//!
//! ## Overview
//!
//! Every provisioning call gets a disposable clone of the remote repository.
//! Generators write deployment files into it, then the changes are committed and
//! pushed back. Several broker instances may push to the same branch at once:
//! contention is detected only at push time and handled by a single
//! rebase-and-retry cycle.
//!
//! Long-running creations hand the platform an opaque operation token. Polling
//! that token later, from any broker instance, recomputes the status from the
//! token and the repository content alone.
//!
//! ## Architecture
//!
//! - Repository sessions, branches, submodules and push protocol ([`git`])
//! - Call-scoped data shared with generators ([`context`])
//! - Operation tokens and completion tracking ([`operation`])
//! - Error taxonomy ([`error`])
//! - Configuration and logging ([`config`], [`settings`], [`logger`])
//! - Command handlers for the operator CLI ([`handlers`])

/// Platform-agnostic configuration directory management.
pub mod config;

/// Call-scoped key/value data keyed by repository alias.
///
/// Carries the per-call requests (branches, submodules, commit message) to the
/// sync engine and publishes the prepared workspace back to generators.
pub mod context;

/// Typed failures of the sync engine and the tracker.
pub mod error;

/// Git-backed workspace synchronization.
///
/// Clones a remote into a disposable workspace, resolves branches, selects
/// submodules, and commits and pushes changes with one rebase-and-retry cycle on
/// a non-fast-forward rejection.
pub mod git;

/// Operator CLI command handlers.
pub mod handlers;

/// Logging configuration and audit log.
///
/// Console logging through `env_logger` (configurable via `RUST_LOG`) plus a
/// rotated audit file in the config directory.
pub mod logger;

/// Operation tokens and completion resolution for asynchronous provisioning.
pub mod operation;

/// Broker configuration file (`config.toml`).
pub mod settings;

pub use error::{SyncError, SyncResult};
