use std::path::PathBuf;
use std::sync::Arc;

use super::branches::BranchResolver;
use super::command::GitRunner;
use super::operations::CommitOutcome;
use super::session::{RepositoryHandle, RepositorySession};
use super::submodules::{SubmoduleFetchMode, SubmoduleSelector};
use crate::context::{CallContext, ContextKey, ContextValue};
use crate::error::{SyncError, SyncResult};

pub const DEFAULT_COMMIT_MESSAGE: &str = "commit by ondemand broker";

/// Per-call choices for one synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncRequest {
    pub checkout_remote_branch: Option<String>,
    pub create_branch_if_missing: Option<String>,
    pub fail_if_remote_branch_exists: Option<String>,
    pub submodules: SubmoduleFetchMode,
    pub commit_message: Option<String>,
    pub delete_remote_branch: Option<String>,
}

impl SyncRequest {
    /// Read the request keys stored under `alias`.
    pub fn from_context(ctx: &CallContext, alias: &str) -> Self {
        let text = |key| ctx.text(alias, key).map(str::to_string);

        let submodules = if ctx.flag(alias, ContextKey::FetchAllSubmodules) {
            SubmoduleFetchMode::All
        } else if let Some(list) = ctx.list(alias, ContextKey::SubmoduleListToFetch) {
            SubmoduleFetchMode::Only(list.to_vec())
        } else {
            SubmoduleFetchMode::None
        };

        SyncRequest {
            checkout_remote_branch: text(ContextKey::CheckoutRemoteBranch),
            create_branch_if_missing: text(ContextKey::CreateBranchIfMissing),
            fail_if_remote_branch_exists: text(ContextKey::FailIfRemoteBranchExists),
            submodules,
            commit_message: text(ContextKey::CommitMessage),
            delete_remote_branch: text(ContextKey::DeleteRemoteBranch),
        }
    }

    pub fn commit_message(&self) -> &str {
        self.commit_message
            .as_deref()
            .unwrap_or(DEFAULT_COMMIT_MESSAGE)
    }

    fn branch_resolver(&self) -> BranchResolver {
        BranchResolver {
            checkout_remote_branch: self.checkout_remote_branch.clone(),
            create_branch_if_missing: self.create_branch_if_missing.clone(),
            fail_if_remote_branch_exists: self.fail_if_remote_branch_exists.clone(),
        }
    }
}

/// Entry point used once per provisioning call for one repository alias.
///
/// Holds the immutable repository handle and credentials; every session it opens
/// gets its own workspace.
#[derive(Debug, Clone)]
pub struct GitSyncEngine {
    handle: Arc<RepositoryHandle>,
    runner: GitRunner,
}

impl GitSyncEngine {
    pub fn new(handle: RepositoryHandle) -> Self {
        let runner = GitRunner::new(handle.credentials.clone(), handle.timeout);
        Self {
            handle: Arc::new(handle),
            runner,
        }
    }

    pub fn handle(&self) -> &RepositoryHandle {
        &self.handle
    }

    pub fn alias(&self) -> &str {
        &self.handle.alias
    }

    /// Clone, resolve branches and select submodules.
    ///
    /// The workspace is deleted if any step after the clone fails.
    pub fn open_session(&self, request: &SyncRequest) -> SyncResult<RepositorySession> {
        let mut session = RepositorySession::open(Arc::clone(&self.handle), self.runner.clone())?;

        if let Err(e) = prepare(&mut session, request) {
            log::warn!("{}caught {} while preparing workspace", self.handle.log_prefix(), e);
            session.close(true);
            return Err(e);
        }
        Ok(session)
    }

    /// Produce a ready workspace for this call and publish it in the context.
    ///
    /// A session already held by the context is reused after being reset to the
    /// remote tip of its target branch.
    pub fn begin(&self, ctx: &mut CallContext) -> SyncResult<PathBuf> {
        let alias = self.alias().to_string();

        let root = if let Some(session) = ctx.session_mut(&alias) {
            let branch = session.target_branch();
            session.reset_to_remote(&branch)?;
            session.workdir()?.to_path_buf()
        } else {
            let request = SyncRequest::from_context(ctx, &alias);
            let session = self.open_session(&request)?;
            let root = session.workdir()?.to_path_buf();
            ctx.store_session(&alias, session);
            root
        };

        ctx.set(&alias, ContextKey::WorkDir, ContextValue::Path(root.clone()));
        Ok(root)
    }

    /// Commit and push everything written to the workspace.
    ///
    /// With `delete_workspace` the session is closed and its workspace removed
    /// whatever the outcome; otherwise it stays in the context for reuse.
    pub fn end(&self, ctx: &mut CallContext, delete_workspace: bool) -> SyncResult<CommitOutcome> {
        let alias = self.alias().to_string();
        let request = SyncRequest::from_context(ctx, &alias);
        let mut session = ctx.take_session(&alias).ok_or(SyncError::WorkspaceClosed)?;

        let result = persist(&mut session, &request);

        if delete_workspace {
            session.close(true);
            ctx.remove(&ContextKey::WorkDir.for_alias(&alias));
        } else {
            ctx.store_session(&alias, session);
        }
        result
    }
}

fn prepare(session: &mut RepositorySession, request: &SyncRequest) -> SyncResult<()> {
    let intent = request.branch_resolver().resolve(session)?;
    session.branch = Some(intent);
    session.submodules = SubmoduleSelector::new(request.submodules.clone()).select(session)?;
    Ok(())
}

fn persist(session: &mut RepositorySession, request: &SyncRequest) -> SyncResult<CommitOutcome> {
    let outcome = session.commit_and_push(request.commit_message())?;
    if let Some(branch) = &request.delete_remote_branch {
        session.delete_remote_branch(branch)?;
    }
    Ok(outcome)
}
