use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use walkdir::WalkDir;

use super::branches::BranchIntent;
use super::command::{Credentials, GitRunner};
use super::submodules::SubmoduleSet;
use crate::error::{SyncError, SyncResult};

/// Remote name used for every clone.
pub const REMOTE_NAME: &str = "origin";

/// Network ceiling applied to clone, fetch, pull and push.
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_PRIMARY_BRANCH: &str = "master";
pub const DEFAULT_COMMITTER_NAME: &str = "broker-git-sync";
pub const DEFAULT_COMMITTER_EMAIL: &str = "broker-git-sync@localhost";

/// Name and email recorded on commits.
///
/// Unset fields fall back to [`DEFAULT_COMMITTER_NAME`] and [`DEFAULT_COMMITTER_EMAIL`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitterIdentity {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl CommitterIdentity {
    pub fn new(name: Option<String>, email: Option<String>) -> Self {
        Self { name, email }
    }

    pub fn effective_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_COMMITTER_NAME)
    }

    pub fn effective_email(&self) -> &str {
        self.email.as_deref().unwrap_or(DEFAULT_COMMITTER_EMAIL)
    }
}

/// Identifies one remote repository and how to talk to it.
#[derive(Debug, Clone)]
pub struct RepositoryHandle {
    pub url: String,
    pub credentials: Option<Credentials>,
    pub committer: CommitterIdentity,
    /// Distinguishes several repositories used by the same call. May be empty.
    pub alias: String,
    /// Branch checked out when nothing else is requested, and given to empty clones.
    pub primary_branch: String,
    pub timeout: Duration,
    /// Parent directory for workspaces. Defaults to the system temp directory.
    pub workspace_root: Option<PathBuf>,
}

impl RepositoryHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials: None,
            committer: CommitterIdentity::default(),
            alias: String::new(),
            primary_branch: DEFAULT_PRIMARY_BRANCH.to_string(),
            timeout: DEFAULT_GIT_TIMEOUT,
            workspace_root: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_committer(mut self, committer: CommitterIdentity) -> Self {
        self.committer = committer;
        self
    }

    pub fn with_primary_branch(mut self, branch: impl Into<String>) -> Self {
        self.primary_branch = branch.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// Prefix for log lines, `[alias] ` or nothing.
    pub fn log_prefix(&self) -> String {
        if self.alias.is_empty() {
            String::new()
        } else {
            format!("[{}] ", self.alias)
        }
    }

    /// Workspace directory name prefix derived from the alias.
    pub fn workspace_prefix(&self) -> String {
        let sanitized: String = self
            .alias
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        format!("{sanitized}clone-")
    }
}

/// A local checkout owned by exactly one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// One ephemeral clone of one remote repository.
///
/// Dropping a session that still owns its workspace deletes the workspace unless it
/// was explicitly retained through [`RepositorySession::close`] with `false`.
#[derive(Debug)]
pub struct RepositorySession {
    pub(super) handle: Arc<RepositoryHandle>,
    pub(super) runner: GitRunner,
    workspace: Option<Workspace>,
    pub(super) submodules: SubmoduleSet,
    pub(super) branch: Option<BranchIntent>,
    retained: bool,
}

impl RepositorySession {
    /// Clone the remote into a fresh workspace and prepare the local config.
    ///
    /// On failure the partially created workspace is removed before returning.
    pub(crate) fn open(handle: Arc<RepositoryHandle>, runner: GitRunner) -> SyncResult<Self> {
        let prefix = handle.log_prefix();
        log::info!("{}cloning repo from {}", prefix, handle.url);

        let parent = handle
            .workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        fs::create_dir_all(&parent)?;
        let root = parent.join(format!(
            "{}{}",
            handle.workspace_prefix(),
            uuid::Uuid::new_v4().simple()
        ));
        fs::create_dir(&root)?;

        if let Err(e) = clone_into(&runner, &handle, &root) {
            log::warn!(
                "{}caught {} while cloning into dir: {}",
                prefix,
                e,
                root.display()
            );
            delete_workspace(&root, &prefix);
            return Err(e);
        }

        let mut session = RepositorySession {
            handle,
            runner,
            workspace: Some(Workspace { root }),
            submodules: SubmoduleSet::default(),
            branch: None,
            retained: false,
        };

        if let Err(e) = session.configure() {
            session.close(true);
            return Err(e);
        }

        log::info!("{}git repo is ready at {}", prefix, session.workdir()?.display());
        Ok(session)
    }

    fn configure(&self) -> SyncResult<()> {
        let workdir = self.workdir()?;
        let committer = &self.handle.committer;

        self.runner
            .run_ok(workdir, &["config", "user.name", committer.effective_name()])?;
        self.runner
            .run_ok(workdir, &["config", "user.email", committer.effective_email()])?;
        self.runner
            .run_ok(workdir, &["config", "core.autocrlf", "false"])?;
        self.runner
            .run_ok(workdir, &["config", "commit.gpgsign", "false"])?;

        if self.head_is_unborn() {
            let head = format!("refs/heads/{}", self.handle.primary_branch);
            log::info!(
                "{}cloned an empty repository, starting branch {}",
                self.log_prefix(),
                self.handle.primary_branch
            );
            self.runner.run_ok(workdir, &["symbolic-ref", "HEAD", &head])?;
        }

        Ok(())
    }

    /// Force-fetch `branch` and hard-reset the checkout to the fetched tip.
    ///
    /// Local commits that were not pushed are discarded.
    pub fn reset_to_remote(&self, branch: &str) -> SyncResult<()> {
        let workdir = self.workdir()?;
        let fetch_ref = format!("+refs/heads/{branch}:refs/remotes/{REMOTE_NAME}/{branch}");
        let reset_ref = format!("{REMOTE_NAME}/{branch}");

        log::info!("{}fetching from {}", self.log_prefix(), fetch_ref);
        self.runner
            .run_ok(workdir, &["fetch", "--quiet", REMOTE_NAME, &fetch_ref])?;
        log::info!("{}resetting from {}", self.log_prefix(), reset_ref);
        self.runner
            .run_ok(workdir, &["reset", "--quiet", "--hard", &reset_ref])?;

        Ok(())
    }

    /// Release the workspace. Safe to call any number of times.
    ///
    /// With `delete_workspace` the directory is removed bottom-up, tolerating
    /// individual failures. Without it the workspace is kept on disk for inspection.
    pub fn close(&mut self, delete_workspace: bool) {
        if delete_workspace {
            if let Some(workspace) = self.workspace.take() {
                let prefix = self.log_prefix();
                self::delete_workspace(workspace.root(), &prefix);
            }
        } else if let Some(workspace) = &self.workspace {
            if !self.retained {
                log::info!(
                    "{}retaining work directory {}",
                    self.log_prefix(),
                    workspace.root().display()
                );
            }
            self.retained = true;
        }
    }

    pub fn handle(&self) -> &RepositoryHandle {
        &self.handle
    }

    pub fn workspace(&self) -> SyncResult<&Workspace> {
        self.workspace.as_ref().ok_or(SyncError::WorkspaceClosed)
    }

    pub fn workdir(&self) -> SyncResult<&Path> {
        Ok(self.workspace()?.root())
    }

    pub fn submodules(&self) -> &SubmoduleSet {
        &self.submodules
    }

    pub fn branch_intent(&self) -> Option<&BranchIntent> {
        self.branch.as_ref()
    }

    /// Branch commits are pushed to: the resolved target, else the primary branch.
    pub fn target_branch(&self) -> String {
        self.branch
            .as_ref()
            .map(|b| b.target.clone())
            .unwrap_or_else(|| self.handle.primary_branch.clone())
    }

    pub(super) fn log_prefix(&self) -> String {
        self.handle.log_prefix()
    }

    pub(super) fn head_is_unborn(&self) -> bool {
        match self.workdir() {
            Ok(workdir) => !self
                .runner
                .succeeds(workdir, &["rev-parse", "--verify", "--quiet", "HEAD"]),
            Err(_) => false,
        }
    }
}

impl Drop for RepositorySession {
    fn drop(&mut self) {
        if self.workspace.is_some() && !self.retained {
            log::warn!("{}session dropped without close", self.log_prefix());
            self.close(true);
        }
    }
}

fn clone_into(runner: &GitRunner, handle: &RepositoryHandle, root: &Path) -> SyncResult<()> {
    runner
        .run_ok(
            root,
            &["clone", "--quiet", "--origin", REMOTE_NAME, &handle.url, "."],
        )
        .map_err(|e| {
            let detail = match e {
                SyncError::Git { stderr, .. } => stderr,
                SyncError::Timeout { timeout, .. } => {
                    format!("timed out after {}s", timeout.as_secs())
                }
                other => other.to_string(),
            };
            SyncError::Clone {
                url: handle.url.clone(),
                detail,
            }
        })
}

/// Remove `root` recursively, directories after their contents.
///
/// Per-entry failures are logged and skipped.
pub(crate) fn delete_workspace(root: &Path, prefix: &str) {
    log::info!("{}cleaning-up {} work directory", prefix, root.display());

    let mut failures = 0usize;
    for entry in WalkDir::new(root).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("{}Unable to walk {}: {}", prefix, root.display(), e);
                failures += 1;
                continue;
            }
        };

        let path = entry.path();
        let result = if entry.file_type().is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        };
        if let Err(e) = result {
            log::warn!("{}Unable to delete file {} details:{}", prefix, path.display(), e);
            failures += 1;
        }
    }

    if failures > 0 {
        log::error!(
            "{}unable to fully clean up {} ({} entries left)",
            prefix,
            root.display(),
            failures
        );
    }
}
