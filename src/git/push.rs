use std::fmt;

use super::session::{RepositorySession, REMOTE_NAME};
use crate::error::{SyncError, SyncResult};

/// Result of updating one remote ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefUpdateOutcome {
    Ok,
    UpToDate,
    /// The remote has commits the local branch does not include.
    RejectedNonFastForward,
    /// Refused by the receiving side (hooks, protected branches...).
    RejectedRemote(String),
    Rejected(String),
}

impl RefUpdateOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, RefUpdateOutcome::Ok | RefUpdateOutcome::UpToDate)
    }
}

impl fmt::Display for RefUpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefUpdateOutcome::Ok => write!(f, "ok"),
            RefUpdateOutcome::UpToDate => write!(f, "up to date"),
            RefUpdateOutcome::RejectedNonFastForward => write!(f, "rejected (non-fast-forward)"),
            RefUpdateOutcome::RejectedRemote(reason) => write!(f, "remote rejected ({reason})"),
            RefUpdateOutcome::Rejected(reason) => write!(f, "rejected ({reason})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    pub ref_name: String,
    pub outcome: RefUpdateOutcome,
}

/// Per-ref outcome of one `git push`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub remote: String,
    pub updates: Vec<RefUpdate>,
}

impl PushReport {
    /// Parse the stdout of `git push --porcelain`.
    ///
    /// Status lines look like `<flag>\t<from>:<to>\t<summary>`; anything else
    /// (`To <url>`, `Done`) is ignored.
    pub fn parse(remote: &str, porcelain: &str) -> Self {
        let updates = porcelain
            .lines()
            .filter_map(|line| {
                let mut fields = line.splitn(3, '\t');
                let flag = fields.next()?.chars().next()?;
                let refs = fields.next()?;
                let summary = fields.next().unwrap_or("");
                let ref_name = refs.rsplit(':').next().unwrap_or(refs).to_string();

                Some(RefUpdate {
                    ref_name,
                    outcome: parse_outcome(flag, summary)?,
                })
            })
            .collect();

        PushReport {
            remote: remote.to_string(),
            updates,
        }
    }

    /// True when every ref was updated (or already current) and at least one was reported.
    pub fn is_ok(&self) -> bool {
        !self.updates.is_empty() && self.updates.iter().all(|u| u.outcome.is_ok())
    }

    /// True when every reported ref actually moved on the remote.
    pub fn all_updated(&self) -> bool {
        !self.updates.is_empty()
            && self
                .updates
                .iter()
                .all(|u| u.outcome == RefUpdateOutcome::Ok)
    }

    pub fn has_non_fast_forward(&self) -> bool {
        self.updates
            .iter()
            .any(|u| u.outcome == RefUpdateOutcome::RejectedNonFastForward)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RefUpdate> {
        self.updates.iter().filter(|u| !u.outcome.is_ok())
    }

    fn failure_summary(&self) -> String {
        let failures: Vec<String> = self
            .failures()
            .map(|u| format!("{} {}", u.ref_name, u.outcome))
            .collect();
        if failures.is_empty() {
            "no ref update reported".to_string()
        } else {
            failures.join(", ")
        }
    }
}

impl fmt::Display for PushReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "To {}:", self.remote)?;
        for update in &self.updates {
            write!(f, " {} {};", update.ref_name, update.outcome)?;
        }
        Ok(())
    }
}

fn parse_outcome(flag: char, summary: &str) -> Option<RefUpdateOutcome> {
    let reason = summary
        .rfind('(')
        .and_then(|start| {
            summary[start + 1..]
                .strip_suffix(')')
                .map(|r| r.to_string())
        })
        .unwrap_or_else(|| summary.trim().to_string());

    let outcome = match flag {
        ' ' | '+' | '-' | '*' => RefUpdateOutcome::Ok,
        '=' => RefUpdateOutcome::UpToDate,
        '!' if summary.starts_with("[remote rejected]") => RefUpdateOutcome::RejectedRemote(reason),
        '!' if reason == "non-fast-forward" || reason == "fetch first" => {
            RefUpdateOutcome::RejectedNonFastForward
        }
        '!' => RefUpdateOutcome::Rejected(reason),
        _ => return None,
    };
    Some(outcome)
}

impl RepositorySession {
    /// Push HEAD to the target branch, with at most one rebase-and-retry cycle.
    ///
    /// Returns the final report and whether a rebase was needed.
    pub(super) fn push_commits(&self) -> SyncResult<(PushReport, bool)> {
        let prefix = self.log_prefix();
        let branch = self.target_branch();

        log::info!("{}pushing to {} ...", prefix, branch);
        let report = self.push_refspec(&format!("HEAD:refs/heads/{branch}"))?;
        log::info!("{}pushed ...", prefix);

        if report.has_non_fast_forward() {
            log::info!("{}Failed to push with status {}", prefix, report.failure_summary());
            log::info!("{}pull and rebasing from {}/{} ...", prefix, REMOTE_NAME, branch);
            self.pull_rebase(&branch)?;
            log::info!("{}rebased from {}/{}", prefix, REMOTE_NAME, branch);

            log::info!("{}re-pushing ...", prefix);
            let second = self.push_refspec(&format!("HEAD:refs/heads/{branch}"))?;
            log::info!("{}re-pushed ...", prefix);
            // After a rebase only a real update counts: an up-to-date ref means the
            // rebase dropped the local commit.
            if !second.all_updated() {
                log::info!("{}Failed to re-push with status {}", prefix, second);
                return Err(self.conflict(
                    &branch,
                    format!("re-push after rebase failed: {second}"),
                ));
            }
            log::debug!("{}push details: {}", prefix, second);
            return Ok((second, true));
        }

        if !report.is_ok() {
            return Err(SyncError::PushRejected {
                remote: self.handle.url.clone(),
                branch,
                reason: report.failure_summary(),
            });
        }

        log::debug!("{}push details: {}", prefix, report);
        Ok((report, false))
    }

    /// Delete a branch on the remote.
    pub fn delete_remote_branch(&self, branch: &str) -> SyncResult<PushReport> {
        log::info!("{}deleting remote branch {}", self.log_prefix(), branch);
        let report = self.push_refspec(&format!(":refs/heads/{branch}"))?;
        if !report.is_ok() {
            return Err(SyncError::PushRejected {
                remote: self.handle.url.clone(),
                branch: branch.to_string(),
                reason: report.failure_summary(),
            });
        }
        Ok(report)
    }

    fn push_refspec(&self, refspec: &str) -> SyncResult<PushReport> {
        let workdir = self.workdir()?;
        let args = ["push", "--porcelain", REMOTE_NAME, refspec];
        let output = self.runner.output(workdir, &args)?;
        let report = PushReport::parse(&self.handle.url, &output.stdout);

        if !output.success() && report.updates.is_empty() {
            return Err(SyncError::Git {
                command: args.join(" "),
                workdir: workdir.to_path_buf(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(report)
    }

    fn pull_rebase(&self, branch: &str) -> SyncResult<()> {
        let workdir = self.workdir()?;
        let output = self
            .runner
            .output(workdir, &["pull", "--quiet", "--rebase", REMOTE_NAME, branch])?;

        if !output.success() {
            let detail = output.stderr.trim().to_string();
            log::info!("{}Failed to pull rebase: {}", self.log_prefix(), detail);
            // Leave the workspace on the pre-rebase commit rather than mid-rebase.
            match self.runner.output(workdir, &["rebase", "--abort"]) {
                Ok(abort) if abort.success() => {}
                Ok(abort) => log::warn!(
                    "{}Unable to abort rebase in {}: {}",
                    self.log_prefix(),
                    workdir.display(),
                    abort.stderr.trim()
                ),
                Err(e) => log::warn!(
                    "{}Unable to abort rebase in {}: {}",
                    self.log_prefix(),
                    workdir.display(),
                    e
                ),
            }
            return Err(self.conflict(branch, format!("pull rebase failed: {detail}")));
        }
        Ok(())
    }

    fn conflict(&self, branch: &str, detail: String) -> SyncError {
        SyncError::PushConflict {
            remote: self.handle.url.clone(),
            branch: branch.to_string(),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const REMOTE: &str = "/srv/git/paas-templates.git";

    #[test]
    fn test_parse_successful_push() {
        let out = "To /srv/git/paas-templates.git\n \tHEAD:refs/heads/master\t1a2b3c4..5d6e7f8\nDone\n";
        let report = PushReport::parse(REMOTE, out);

        assert_eq!(report.updates.len(), 1);
        assert_eq!(report.updates[0].ref_name, "refs/heads/master");
        assert_eq!(report.updates[0].outcome, RefUpdateOutcome::Ok);
        assert!(report.is_ok());
        assert!(!report.has_non_fast_forward());
    }

    #[rstest]
    #[case("!\tHEAD:refs/heads/master\t[rejected] (fetch first)")]
    #[case("!\tHEAD:refs/heads/master\t[rejected] (non-fast-forward)")]
    fn test_parse_non_fast_forward(#[case] line: &str) {
        let report = PushReport::parse(REMOTE, &format!("To {REMOTE}\n{line}\n"));
        assert!(report.has_non_fast_forward());
        assert!(!report.is_ok());
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn test_parse_remote_rejection() {
        let out = "To x\n!\tHEAD:refs/heads/master\t[remote rejected] (pre-receive hook declined)\n";
        let report = PushReport::parse(REMOTE, out);
        assert_eq!(
            report.updates[0].outcome,
            RefUpdateOutcome::RejectedRemote("pre-receive hook declined".to_string())
        );
        assert!(!report.has_non_fast_forward());
    }

    #[rstest]
    #[case('*', "[new branch]", RefUpdateOutcome::Ok)]
    #[case('-', "[deleted]", RefUpdateOutcome::Ok)]
    #[case('=', "[up to date]", RefUpdateOutcome::UpToDate)]
    #[case('!', "[rejected] (stale info)", RefUpdateOutcome::Rejected("stale info".to_string()))]
    fn test_parse_flags(#[case] flag: char, #[case] summary: &str, #[case] expected: RefUpdateOutcome) {
        let out = format!("{flag}\tHEAD:refs/heads/develop\t{summary}\n");
        let report = PushReport::parse(REMOTE, &out);
        assert_eq!(report.updates[0].outcome, expected);
        assert_eq!(report.updates[0].ref_name, "refs/heads/develop");
    }

    #[test]
    fn test_up_to_date_is_ok_but_not_updated() {
        let out = format!("To {REMOTE}\n=\tHEAD:refs/heads/master\t[up to date]\nDone\n");
        let report = PushReport::parse(REMOTE, &out);
        assert!(report.is_ok());
        assert!(!report.all_updated());

        let out = format!("To {REMOTE}\n \tHEAD:refs/heads/master\ta..b\nDone\n");
        assert!(PushReport::parse(REMOTE, &out).all_updated());
        assert!(!PushReport::parse(REMOTE, "").all_updated());
    }

    #[test]
    fn test_empty_report_is_not_ok() {
        let report = PushReport::parse(REMOTE, "fatal: could not read from remote\n");
        assert!(report.updates.is_empty());
        assert!(!report.is_ok());
    }

    #[test]
    fn test_display_lists_every_ref() {
        let report = PushReport {
            remote: REMOTE.to_string(),
            updates: vec![
                RefUpdate {
                    ref_name: "refs/heads/master".to_string(),
                    outcome: RefUpdateOutcome::Ok,
                },
                RefUpdate {
                    ref_name: "refs/heads/develop".to_string(),
                    outcome: RefUpdateOutcome::RejectedNonFastForward,
                },
            ],
        };
        assert_eq!(
            report.to_string(),
            "To /srv/git/paas-templates.git: refs/heads/master ok; refs/heads/develop rejected (non-fast-forward);"
        );
    }
}
