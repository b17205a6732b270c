use anyhow::{Context, Result};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::context::{CallContext, ContextKey, ContextValue};
use crate::git::{
    CommitterIdentity, Credentials, RepositoryHandle, DEFAULT_GIT_TIMEOUT, DEFAULT_PRIMARY_BRANCH,
};
use crate::operation::{
    CompletionResolver, DeploymentLayout, SystemClock, DEFAULT_MAX_EXECUTION_DURATION,
};

/// Broker configuration, stored as `config.toml` in the config directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub git: GitSettings,

    #[serde(default)]
    pub request: RequestDefaults,

    #[serde(default)]
    pub tracker: TrackerSettings,
}

/// Remote repository and how to reach it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitSettings {
    #[serde(default)]
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub committer_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub committer_email: Option<String>,

    #[serde(default)]
    pub alias: String,

    #[serde(default = "default_primary_branch")]
    pub primary_branch: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Parent directory of workspaces (default: system temp dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,
}

/// Values used to fill the call context of CLI-driven calls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_branch: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_branch_if_missing: Option<String>,

    #[serde(default)]
    pub fetch_all_submodules: bool,

    /// Submodule allow-list, used when `fetch_all_submodules` is off
    #[serde(default)]
    pub submodules: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_if_remote_branch_exists: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_remote_branch: Option<String>,
}

/// Completion tracking of asynchronous operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSettings {
    #[serde(default = "default_max_execution_duration_secs")]
    pub max_execution_duration_secs: u64,

    #[serde(flatten)]
    pub layout: DeploymentLayout,
}

fn default_primary_branch() -> String {
    DEFAULT_PRIMARY_BRANCH.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_GIT_TIMEOUT.as_secs()
}

fn default_max_execution_duration_secs() -> u64 {
    DEFAULT_MAX_EXECUTION_DURATION.as_secs()
}

impl Default for GitSettings {
    fn default() -> Self {
        GitSettings {
            url: String::new(),
            username: None,
            password: None,
            committer_name: None,
            committer_email: None,
            alias: String::new(),
            primary_branch: default_primary_branch(),
            timeout_secs: default_timeout_secs(),
            workspace_root: None,
        }
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        TrackerSettings {
            max_execution_duration_secs: default_max_execution_duration_secs(),
            layout: DeploymentLayout::default(),
        }
    }
}

impl BrokerConfig {
    /// Load configuration from the default location, or defaults when absent
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        crate::config::ConfigManager::config_file_path()
    }

    /// Build the repository handle described by `[git]`
    pub fn repository_handle(&self) -> Result<RepositoryHandle> {
        let git = &self.git;
        anyhow::ensure!(!git.url.is_empty(), "No repository url configured in [git]");

        let mut handle = RepositoryHandle::new(git.url.clone())
            .with_alias(git.alias.clone())
            .with_primary_branch(git.primary_branch.clone())
            .with_timeout(Duration::from_secs(git.timeout_secs))
            .with_committer(CommitterIdentity::new(
                git.committer_name.clone(),
                git.committer_email.clone(),
            ));

        if let Some(username) = &git.username {
            let password = git.password.clone().unwrap_or_default();
            handle = handle.with_credentials(Credentials::new(username.clone(), password));
        }
        if let Some(root) = &git.workspace_root {
            handle = handle.with_workspace_root(root.clone());
        }

        Ok(handle)
    }

    /// Store the `[request]` defaults in `ctx` under the configured alias
    pub fn fill_context(&self, ctx: &mut CallContext) {
        let alias = self.git.alias.as_str();
        let request = &self.request;
        let text_keys = [
            (ContextKey::CheckoutRemoteBranch, &request.checkout_branch),
            (ContextKey::CreateBranchIfMissing, &request.create_branch_if_missing),
            (ContextKey::CommitMessage, &request.commit_message),
            (
                ContextKey::FailIfRemoteBranchExists,
                &request.fail_if_remote_branch_exists,
            ),
            (ContextKey::DeleteRemoteBranch, &request.delete_remote_branch),
        ];
        for (key, value) in text_keys {
            if let Some(value) = value {
                ctx.set(alias, key, ContextValue::Text(value.clone()));
            }
        }

        if request.fetch_all_submodules {
            ctx.set(alias, ContextKey::FetchAllSubmodules, ContextValue::Flag(true));
        }
        if !request.submodules.is_empty() {
            ctx.set(
                alias,
                ContextKey::SubmoduleListToFetch,
                ContextValue::List(request.submodules.clone()),
            );
        }
    }

    /// Build the completion resolver described by `[tracker]`
    pub fn completion_resolver(&self) -> CompletionResolver {
        CompletionResolver::new(
            Arc::new(SystemClock),
            Duration::from_secs(self.tracker.max_execution_duration_secs),
            self.tracker.layout.clone(),
        )
    }
}

fn show_value(value: Option<&str>) -> colored::ColoredString {
    match value {
        Some(v) if !v.is_empty() => v.green(),
        _ => "Not set".dimmed(),
    }
}

/// Print the effective configuration, password redacted
pub fn show_config(config: &BrokerConfig) {
    let git = &config.git;
    println!("{}", "Repository:".bold());
    println!("  {}: {}", "Url".cyan(), show_value(Some(git.url.as_str())));
    println!("  {}: {}", "Alias".cyan(), show_value(Some(git.alias.as_str())));
    println!("  {}: {}", "Username".cyan(), show_value(git.username.as_deref()));
    println!(
        "  {}: {}",
        "Password".cyan(),
        show_value(git.password.as_ref().map(|_| "********"))
    );
    println!(
        "  {}: {}",
        "Committer".cyan(),
        show_value(Some(
            format!(
                "{} <{}>",
                git.committer_name.as_deref().unwrap_or(crate::git::DEFAULT_COMMITTER_NAME),
                git.committer_email.as_deref().unwrap_or(crate::git::DEFAULT_COMMITTER_EMAIL)
            )
            .as_str()
        ))
    );
    println!("  {}: {}", "Primary branch".cyan(), git.primary_branch);
    println!("  {}: {}s", "Git timeout".cyan(), git.timeout_secs);
    println!(
        "  {}: {}",
        "Workspace root".cyan(),
        match &git.workspace_root {
            Some(root) => root.display().to_string().green(),
            None => std::env::temp_dir().display().to_string().dimmed(),
        }
    );

    let request = &config.request;
    println!();
    println!("{}", "Request defaults:".bold());
    println!(
        "  {}: {}",
        "Checkout branch".cyan(),
        show_value(request.checkout_branch.as_deref())
    );
    println!(
        "  {}: {}",
        "Create branch if missing".cyan(),
        show_value(request.create_branch_if_missing.as_deref())
    );
    let submodules = if request.fetch_all_submodules {
        "all".to_string()
    } else if request.submodules.is_empty() {
        "none".to_string()
    } else {
        request.submodules.join(", ")
    };
    println!("  {}: {}", "Submodules".cyan(), submodules);
    println!(
        "  {}: {}",
        "Commit message".cyan(),
        request
            .commit_message
            .as_deref()
            .unwrap_or(crate::git::DEFAULT_COMMIT_MESSAGE)
    );

    let tracker = &config.tracker;
    println!();
    println!("{}", "Tracker:".bold());
    println!(
        "  {}: {}s",
        "Max execution duration".cyan(),
        tracker.max_execution_duration_secs
    );
    println!(
        "  {}: {}",
        "Manifest path".cyan(),
        tracker
            .layout
            .target_manifest_path(Path::new("."), "<instance id>")
            .display()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.git.primary_branch, "master");
        assert_eq!(config.git.timeout_secs, 60);
        assert_eq!(config.tracker.max_execution_duration_secs, 600);
        assert_eq!(config.tracker.layout.root_deployment, "coab-depls");
        assert!(config.repository_handle().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: BrokerConfig = toml::from_str(
            r#"
            [git]
            url = "https://git.example.com/paas-templates.git"
            alias = "paas-templates."

            [request]
            submodules = ["bosh-deployment"]

            [tracker]
            instance_prefix = "mongodb_"
            "#,
        )
        .unwrap();

        assert_eq!(config.git.primary_branch, "master");
        assert_eq!(config.git.alias, "paas-templates.");
        assert_eq!(config.request.submodules, vec!["bosh-deployment"]);
        assert!(!config.request.fetch_all_submodules);
        assert_eq!(config.tracker.layout.instance_prefix, "mongodb_");
        assert_eq!(config.tracker.layout.manifest_extension, ".yml");
        assert_eq!(config.tracker.max_execution_duration_secs, 600);
    }

    #[test]
    fn test_save_and_load_from() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = BrokerConfig::default();
        config.git.url = "/srv/git/secrets.git".to_string();
        config.git.username = Some("broker".to_string());
        config.git.password = Some("s3cret".to_string());
        config.request.fetch_all_submodules = true;
        config.tracker.max_execution_duration_secs = 1200;
        config.save_to(&path).unwrap();

        assert_eq!(BrokerConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(BrokerConfig::load_from(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_repository_handle() {
        let mut config = BrokerConfig::default();
        config.git.url = "/srv/git/secrets.git".to_string();
        config.git.alias = "secrets.".to_string();
        config.git.username = Some("broker".to_string());
        config.git.timeout_secs = 5;
        config.git.committer_name = Some("coab".to_string());

        let handle = config.repository_handle().unwrap();
        assert_eq!(handle.alias, "secrets.");
        assert_eq!(handle.timeout, Duration::from_secs(5));
        assert!(handle.credentials.is_some());
        assert_eq!(handle.committer.effective_name(), "coab");
        assert_eq!(
            handle.committer.effective_email(),
            crate::git::DEFAULT_COMMITTER_EMAIL
        );
    }

    #[test]
    fn test_fill_context() {
        let mut config = BrokerConfig::default();
        config.git.alias = "templates.".to_string();
        config.request.checkout_branch = Some("develop".to_string());
        config.request.submodules = vec!["a".to_string()];

        let mut ctx = CallContext::new();
        config.fill_context(&mut ctx);

        assert_eq!(
            ctx.text("templates.", ContextKey::CheckoutRemoteBranch),
            Some("develop")
        );
        assert_eq!(
            ctx.list("templates.", ContextKey::SubmoduleListToFetch),
            Some(&["a".to_string()][..])
        );
        assert!(!ctx.flag("templates.", ContextKey::FetchAllSubmodules));
        assert!(ctx.text("templates.", ContextKey::CommitMessage).is_none());
    }
}
