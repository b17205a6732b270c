//! Call-scoped data shared by the mediators around one provisioning call.
//!
//! Keys are strings prefixed with the repository alias, so several repositories
//! can be synchronized within the same call without clobbering each other.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::git::RepositorySession;

/// Well-known keys read or written by the synchronization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKey {
    /// In: list of submodule paths to fetch. Missing or empty fetches nothing.
    SubmoduleListToFetch,
    /// In: fetch every submodule, overriding the list.
    FetchAllSubmodules,
    /// In: fail if this remote branch already exists.
    FailIfRemoteBranchExists,
    /// In: remote branch to check out after clone. Fails if missing remotely.
    CheckoutRemoteBranch,
    /// In: branch to use, created from the checked out branch when missing.
    CreateBranchIfMissing,
    /// Out: workspace root of the live session.
    WorkDir,
    /// In: commit message.
    CommitMessage,
    /// In: remote branch to delete once changes are pushed.
    DeleteRemoteBranch,
}

impl ContextKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKey::SubmoduleListToFetch => "submodule_list_to_fetch",
            ContextKey::FetchAllSubmodules => "fetch_all_submodules",
            ContextKey::FailIfRemoteBranchExists => "fail_if_remote_branch_exists",
            ContextKey::CheckoutRemoteBranch => "checkout_remote_branch",
            ContextKey::CreateBranchIfMissing => "create_branch_if_missing",
            ContextKey::WorkDir => "work_dir",
            ContextKey::CommitMessage => "commit_message",
            ContextKey::DeleteRemoteBranch => "delete_remote_branch",
        }
    }

    /// Full key for `alias`.
    pub fn for_alias(&self, alias: &str) -> String {
        format!("{}{}", alias, self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextValue {
    Text(String),
    Flag(bool),
    List(Vec<String>),
    Path(PathBuf),
}

/// Mutable key/value bag owned by one call. Never shared between concurrent calls.
#[derive(Debug, Default)]
pub struct CallContext {
    values: HashMap<String, ContextValue>,
    sessions: HashMap<String, RepositorySession>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ContextValue) {
        self.values.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.values.remove(key)
    }

    pub fn set(&mut self, alias: &str, key: ContextKey, value: ContextValue) {
        self.insert(key.for_alias(alias), value);
    }

    pub fn text(&self, alias: &str, key: ContextKey) -> Option<&str> {
        match self.get(&key.for_alias(alias)) {
            Some(ContextValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn flag(&self, alias: &str, key: ContextKey) -> bool {
        matches!(self.get(&key.for_alias(alias)), Some(ContextValue::Flag(true)))
    }

    pub fn list(&self, alias: &str, key: ContextKey) -> Option<&[String]> {
        match self.get(&key.for_alias(alias)) {
            Some(ContextValue::List(items)) => Some(items),
            _ => None,
        }
    }

    pub fn path(&self, alias: &str, key: ContextKey) -> Option<&Path> {
        match self.get(&key.for_alias(alias)) {
            Some(ContextValue::Path(p)) => Some(p),
            _ => None,
        }
    }

    /// Workspace published by the engine for `alias`.
    pub fn work_dir(&self, alias: &str) -> Option<&Path> {
        self.path(alias, ContextKey::WorkDir)
    }

    pub fn session(&self, alias: &str) -> Option<&RepositorySession> {
        self.sessions.get(alias)
    }

    pub(crate) fn session_mut(&mut self, alias: &str) -> Option<&mut RepositorySession> {
        self.sessions.get_mut(alias)
    }

    pub(crate) fn store_session(&mut self, alias: &str, session: RepositorySession) {
        self.sessions.insert(alias.to_string(), session);
    }

    pub(crate) fn take_session(&mut self, alias: &str) -> Option<RepositorySession> {
        self.sessions.remove(alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced_by_alias() {
        let mut ctx = CallContext::new();
        ctx.set("secrets", ContextKey::CommitMessage, ContextValue::Text("a".to_string()));
        ctx.set("", ContextKey::CommitMessage, ContextValue::Text("b".to_string()));

        assert_eq!(ctx.text("secrets", ContextKey::CommitMessage), Some("a"));
        assert_eq!(ctx.text("", ContextKey::CommitMessage), Some("b"));
        assert!(ctx.get("secretscommit_message").is_some());
    }

    #[test]
    fn test_typed_accessors_ignore_other_variants() {
        let mut ctx = CallContext::new();
        ctx.set("", ContextKey::FetchAllSubmodules, ContextValue::Text("true".to_string()));
        ctx.set("", ContextKey::SubmoduleListToFetch, ContextValue::Flag(true));

        assert!(!ctx.flag("", ContextKey::FetchAllSubmodules));
        assert!(ctx.list("", ContextKey::SubmoduleListToFetch).is_none());
        assert!(ctx.work_dir("").is_none());
    }

    #[test]
    fn test_remove_value() {
        let mut ctx = CallContext::new();
        ctx.set("", ContextKey::WorkDir, ContextValue::Path(PathBuf::from("/tmp/ws")));
        assert_eq!(ctx.work_dir(""), Some(Path::new("/tmp/ws")));

        ctx.remove(&ContextKey::WorkDir.for_alias(""));
        assert!(ctx.work_dir("").is_none());
    }
}
