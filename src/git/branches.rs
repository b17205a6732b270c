use super::session::{RepositorySession, REMOTE_NAME};
use crate::error::{SyncError, SyncResult};

/// Branches chosen for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchIntent {
    /// Branch checked out right after clone (explicit request or remote default).
    pub checkout_source: String,
    /// Branch commits are pushed to.
    pub target: String,
}

/// Decides which branch to check out and whether a new branch must be created.
#[derive(Debug, Clone, Default)]
pub struct BranchResolver {
    pub checkout_remote_branch: Option<String>,
    pub create_branch_if_missing: Option<String>,
    pub fail_if_remote_branch_exists: Option<String>,
}

impl BranchResolver {
    /// Check out the requested remote branch, then create or reuse the target branch.
    ///
    /// The checkout happens first so a created branch starts from the right base.
    pub fn resolve(&self, session: &RepositorySession) -> SyncResult<BranchIntent> {
        let prefix = session.log_prefix();
        let remote_branches = session.remote_branches()?;
        let url = || session.handle().url.clone();

        if let Some(branch) = &self.fail_if_remote_branch_exists {
            if remote_branches.contains(branch) {
                return Err(SyncError::BranchAlreadyExists {
                    url: url(),
                    branch: branch.clone(),
                });
            }
        }

        if let Some(branch) = &self.checkout_remote_branch {
            if !remote_branches.contains(branch) {
                return Err(SyncError::BranchNotFound {
                    url: url(),
                    branch: branch.clone(),
                });
            }
            // The default branch already exists locally after clone.
            if session.local_branch_exists(branch)? {
                session.git(&["checkout", "--quiet", branch])?;
            } else {
                let start = format!("{REMOTE_NAME}/{branch}");
                session.git(&["checkout", "--quiet", "--track", "-b", branch, &start])?;
            }
            log::info!("{}checked out remote branch {}", prefix, branch);
        }

        let checkout_source = session.current_branch()?;

        if let Some(branch) = &self.create_branch_if_missing {
            if remote_branches.contains(branch) {
                log::debug!("{}existing remote branch {}", prefix, branch);
                if !session.local_branch_exists(branch)? {
                    let start = format!("{REMOTE_NAME}/{branch}");
                    session.git(&["branch", "--quiet", "--track", branch, &start])?;
                    log::info!("{}created local branch from remote branch {}", prefix, branch);
                }
            } else if !session.local_branch_exists(branch)? {
                if session.head_is_unborn() {
                    session.git(&["symbolic-ref", "HEAD", &format!("refs/heads/{branch}")])?;
                } else {
                    session.git(&["branch", "--quiet", branch])?;
                }
                session.git(&["config", &format!("branch.{branch}.remote"), REMOTE_NAME])?;
                session.git(&[
                    "config",
                    &format!("branch.{branch}.merge"),
                    &format!("refs/heads/{branch}"),
                ])?;
                session.git(&["config", "push.default", "upstream"])?;
                log::info!("{}created branch {} from current HEAD", prefix, branch);
            }

            if session.current_branch()? != *branch {
                session.git(&["checkout", "--quiet", branch])?;
            }
            log::info!("{}checked out local branch {}", prefix, branch);
        }

        Ok(BranchIntent {
            checkout_source,
            target: session.current_branch()?,
        })
    }
}

impl RepositorySession {
    /// Names of the branches known under `refs/remotes/origin/`.
    pub fn remote_branches(&self) -> SyncResult<Vec<String>> {
        let out = self.git(&[
            "for-each-ref",
            "--format=%(refname:strip=3)",
            &format!("refs/remotes/{REMOTE_NAME}/"),
        ])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|b| !b.is_empty() && *b != "HEAD")
            .map(str::to_string)
            .collect())
    }

    pub fn local_branch_exists(&self, branch: &str) -> SyncResult<bool> {
        let workdir = self.workdir()?;
        Ok(self.runner.succeeds(
            workdir,
            &["show-ref", "--verify", "--quiet", &format!("refs/heads/{branch}")],
        ))
    }

    /// Name of the checked out branch, also when it has no commit yet.
    pub fn current_branch(&self) -> SyncResult<String> {
        self.git(&["symbolic-ref", "--short", "HEAD"])
    }

    pub(super) fn git(&self, args: &[&str]) -> SyncResult<String> {
        let workdir = self.workdir()?;
        self.runner.run(workdir, args)
    }
}
