use std::collections::BTreeSet;

use super::push::PushReport;
use super::session::RepositorySession;
use super::status::{self, StagedChanges};
use crate::error::{SyncError, SyncResult};

/// What `commit_and_push` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing was staged: no commit, no push.
    NoChanges,
    Pushed {
        commit: String,
        report: PushReport,
        /// The first push was rejected and succeeded after one rebase.
        rebased: bool,
    },
}

impl RepositorySession {
    /// Stage every workspace change, commit it and push it to the target branch.
    ///
    /// Deleted paths lying under a known submodule are not staged.
    pub fn commit_and_push(&mut self, message: &str) -> SyncResult<CommitOutcome> {
        let prefix = self.log_prefix();
        log::info!("{}commit push", prefix);

        let unmerged = self.unmerged_paths()?;
        if !unmerged.is_empty() {
            log::error!("{}Unexpected conflicting files: {:?}", prefix, unmerged);
            return Err(SyncError::UnexpectedConflict { paths: unmerged });
        }

        self.stage_all()?;
        let staged = self.staged_changes()?;

        if !staged.conflicting.is_empty() {
            log::error!("{}Unexpected conflicting files: {:?}", prefix, staged.conflicting);
            return Err(SyncError::UnexpectedConflict {
                paths: staged.conflicting,
            });
        }

        if !staged.has_staged() {
            log::info!("{}No changes to commit, skipping push", prefix);
            return Ok(CommitOutcome::NoChanges);
        }

        log::info!(
            "{}staged commit: added:{:?} changed:{:?} deleted:{:?}",
            prefix,
            staged.added,
            staged.changed,
            staged.removed
        );

        let workdir = self.workdir()?;
        self.runner.run_ok(
            workdir,
            &[
                "commit",
                "--quiet",
                "--no-verify",
                "--allow-empty-message",
                "-m",
                message,
            ],
        )?;
        let commit = self.runner.run(workdir, &["rev-parse", "HEAD"])?;
        log::info!("{}committed files in {}", prefix, commit);

        let (report, rebased) = self.push_commits()?;
        let commit = if rebased {
            self.runner.run(self.workdir()?, &["rev-parse", "HEAD"])?
        } else {
            commit
        };
        Ok(CommitOutcome::Pushed {
            commit,
            report,
            rebased,
        })
    }

    /// Stage additions and modifications, then deletions outside submodules.
    fn stage_all(&self) -> SyncResult<()> {
        let workdir = self.workdir()?;
        self.runner
            .run_ok(workdir, &["add", "--ignore-removal", "--", "."])?;

        let deleted = self.runner.output(workdir, &["ls-files", "--deleted", "-z"])?;
        let missing: BTreeSet<&str> = deleted
            .stdout
            .split('\0')
            .filter(|p| !p.is_empty())
            .collect();

        let mut to_remove = Vec::new();
        for path in missing {
            if self.submodules.covers(path) {
                log::debug!(
                    "{}skipping modified submodule from staging: {}",
                    self.log_prefix(),
                    path
                );
            } else {
                log::info!("{}staging as deleted: {}", self.log_prefix(), path);
                to_remove.push(path);
            }
        }

        if !to_remove.is_empty() {
            let mut args = vec![
                "--literal-pathspecs",
                "rm",
                "--quiet",
                "--cached",
                "--ignore-unmatch",
                "--",
            ];
            args.extend(to_remove);
            self.runner.run_ok(workdir, &args)?;
        }

        Ok(())
    }

    /// Paths the index still holds at a merge stage, before anything is staged over them.
    fn unmerged_paths(&self) -> SyncResult<Vec<String>> {
        let listing = self
            .runner
            .run(self.workdir()?, &["ls-files", "--unmerged", "-z"])?;
        Ok(status::parse_unmerged(&listing))
    }

    fn staged_changes(&self) -> SyncResult<StagedChanges> {
        let workdir = self.workdir()?;
        let status = self.runner.output(
            workdir,
            &["status", "--porcelain", "-z", "--untracked-files=no"],
        )?;
        if !status.success() {
            return Err(SyncError::Git {
                command: "status --porcelain -z --untracked-files=no".to_string(),
                workdir: workdir.to_path_buf(),
                stderr: status.stderr.trim().to_string(),
            });
        }
        Ok(StagedChanges::parse(&status.stdout))
    }
}
