use std::collections::BTreeMap;

use super::session::RepositorySession;
use crate::error::{SyncError, SyncResult};

/// Which submodules a clone materializes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubmoduleFetchMode {
    All,
    /// Only the listed submodule paths. An empty list fetches nothing.
    Only(Vec<String>),
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmoduleDecision {
    Fetch,
    Skip,
}

/// Submodule paths of one clone and whether each was fetched.
///
/// Computed once after clone, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmoduleSet {
    entries: BTreeMap<String, SubmoduleDecision>,
}

impl SubmoduleSet {
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn decision(&self, path: &str) -> Option<SubmoduleDecision> {
        self.entries.get(path).copied()
    }

    pub fn fetched(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, d)| **d == SubmoduleDecision::Fetch)
            .map(|(p, _)| p.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether `path` is a submodule or lies inside one.
    pub fn covers(&self, path: &str) -> bool {
        self.entries.keys().any(|submodule| {
            path == submodule
                || path
                    .strip_prefix(submodule.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// A submodule as declared in `.gitmodules`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DeclaredSubmodule {
    name: String,
    path: String,
}

#[derive(Debug, Clone, Default)]
pub struct SubmoduleSelector {
    pub mode: SubmoduleFetchMode,
}

impl SubmoduleSelector {
    pub fn new(mode: SubmoduleFetchMode) -> Self {
        Self { mode }
    }

    /// Register submodules without content, then update the selected ones.
    ///
    /// Under an allow-list, every other submodule gets `update = none` and loses its
    /// url in the local config so no later command tries to fetch it.
    pub fn select(&self, session: &RepositorySession) -> SyncResult<SubmoduleSet> {
        let prefix = session.log_prefix();
        let declared = declared_submodules(session)?;
        if declared.is_empty() {
            return Ok(SubmoduleSet::default());
        }

        session.git(&["submodule", "--quiet", "init"])?;

        let mut entries = BTreeMap::new();
        for submodule in &declared {
            let decision = match &self.mode {
                SubmoduleFetchMode::All => SubmoduleDecision::Fetch,
                SubmoduleFetchMode::Only(list) if list.contains(&submodule.path) => {
                    SubmoduleDecision::Fetch
                }
                SubmoduleFetchMode::Only(_) => {
                    exclude_from_update(session, submodule)?;
                    SubmoduleDecision::Skip
                }
                SubmoduleFetchMode::None => SubmoduleDecision::Skip,
            };
            entries.insert(submodule.path.clone(), decision);
        }
        let set = SubmoduleSet { entries };

        let to_fetch: Vec<&str> = set.fetched().collect();
        if !to_fetch.is_empty() {
            log::info!("{}fetching submodules {:?}", prefix, to_fetch);
            let mut args = vec!["submodule", "--quiet", "update", "--"];
            args.extend(to_fetch);
            session.git(&args)?;
        } else {
            log::debug!("{}no submodule to fetch", prefix);
        }

        Ok(set)
    }
}

fn exclude_from_update(
    session: &RepositorySession,
    submodule: &DeclaredSubmodule,
) -> SyncResult<()> {
    log::debug!(
        "{}excluding submodule {} from update",
        session.log_prefix(),
        submodule.path
    );
    session.git(&["config", &format!("submodule.{}.update", submodule.name), "none"])?;

    // Exit code 5 means the key was not set, which is the desired state.
    let workdir = session.workdir()?;
    let key = format!("submodule.{}.url", submodule.name);
    let unset = session
        .runner
        .output(workdir, &["config", "--unset", &key])?;
    match unset.status.code() {
        Some(0) | Some(5) => Ok(()),
        _ => Err(SyncError::Git {
            command: format!("config --unset {key}"),
            workdir: workdir.to_path_buf(),
            stderr: unset.stderr.trim().to_string(),
        }),
    }
}

fn declared_submodules(session: &RepositorySession) -> SyncResult<Vec<DeclaredSubmodule>> {
    let workdir = session.workdir()?;
    if !workdir.join(".gitmodules").is_file() {
        return Ok(Vec::new());
    }

    let out = session.runner.output(
        workdir,
        &[
            "config",
            "--file",
            ".gitmodules",
            "--get-regexp",
            r"^submodule\..*\.path$",
        ],
    )?;
    // Exit code 1: no matching key.
    if !out.success() && out.status.code() != Some(1) {
        return Err(SyncError::Git {
            command: "config --file .gitmodules --get-regexp".to_string(),
            workdir: workdir.to_path_buf(),
            stderr: out.stderr.trim().to_string(),
        });
    }
    Ok(parse_gitmodules_paths(&out.stdout))
}

fn parse_gitmodules_paths(output: &str) -> Vec<DeclaredSubmodule> {
    output
        .lines()
        .filter_map(|line| {
            let (key, path) = line.split_once(' ')?;
            let name = key.strip_prefix("submodule.")?.strip_suffix(".path")?;
            Some(DeclaredSubmodule {
                name: name.to_string(),
                path: path.trim().to_string(),
            })
        })
        .collect()
}
