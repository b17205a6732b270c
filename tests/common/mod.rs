//! Helpers building local bare remotes for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use broker_git_sync::git::{self, RepositoryHandle};

/// Returns false (and says so) when git is not installed.
pub fn git_ready() -> bool {
    if git::git_available() {
        true
    } else {
        eprintln!("Skipping: git not installed");
        false
    }
}

/// Run git in `dir` with a fixed identity, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=seed", "-c", "user.email=seed@localhost"])
        .args(["-c", "protocol.file.allow=always", "-c", "commit.gpgsign=false"])
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("failed to spawn git");
    assert!(
        output.status.success(),
        "git {:?} failed in {}: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Create an empty bare repository whose HEAD points at master.
pub fn bare_remote(parent: &Path, name: &str) -> PathBuf {
    let remote = parent.join(format!("{name}.git"));
    fs::create_dir_all(&remote).unwrap();
    git(&remote, &["init", "--quiet", "--bare"]);
    git(&remote, &["symbolic-ref", "HEAD", "refs/heads/master"]);
    remote
}

/// Create a bare remote with one commit on master holding `files`.
pub fn seeded_remote(parent: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let remote = bare_remote(parent, name);
    let seed = parent.join(format!("{name}-seed"));
    fs::create_dir_all(&seed).unwrap();
    git(&seed, &["init", "--quiet"]);
    git(&seed, &["symbolic-ref", "HEAD", "refs/heads/master"]);

    for (path, content) in files {
        write_file(&seed, path, content);
    }
    git(&seed, &["add", "--all"]);
    git(&seed, &["commit", "--quiet", "-m", "initial commit"]);
    git(&seed, &["push", "--quiet", remote.to_str().unwrap(), "master"]);

    fs::remove_dir_all(&seed).unwrap();
    remote
}

/// Seeded remote with one submodule per entry of `submodules`, each backed by its
/// own seeded bare repository.
pub fn remote_with_submodules(parent: &Path, submodules: &[&str]) -> PathBuf {
    let remote = seeded_remote(parent, "main", &[("README.md", "main repo\n")]);
    let work = parent.join("main-work");
    git(parent, &["clone", "--quiet", remote.to_str().unwrap(), "main-work"]);

    for name in submodules {
        let sub_remote = seeded_remote(
            parent,
            &format!("sub-{name}"),
            &[("content.txt", &format!("content of {name}\n"))],
        );
        git(
            &work,
            &["submodule", "--quiet", "add", sub_remote.to_str().unwrap(), name],
        );
    }
    git(&work, &["commit", "--quiet", "-m", "add submodules"]);
    git(&work, &["push", "--quiet", "origin", "master"]);

    fs::remove_dir_all(&work).unwrap();
    remote
}

pub fn write_file(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(full, content).unwrap();
}

/// Files tracked on `branch` of a bare remote.
pub fn remote_files(remote: &Path, branch: &str) -> Vec<String> {
    git(remote, &["ls-tree", "-r", "--name-only", branch])
        .lines()
        .map(str::to_string)
        .collect()
}

pub fn remote_has_branch(remote: &Path, branch: &str) -> bool {
    Command::new("git")
        .args(["show-ref", "--verify", "--quiet", &format!("refs/heads/{branch}")])
        .current_dir(remote)
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// `%s`, `%an` and `%ae` of the tip of `branch`.
pub fn last_commit(remote: &Path, branch: &str) -> (String, String, String) {
    let out = git(remote, &["log", "-1", "--format=%s%n%an%n%ae", branch]);
    let mut lines = out.lines().map(str::to_string);
    (
        lines.next().unwrap_or_default(),
        lines.next().unwrap_or_default(),
        lines.next().unwrap_or_default(),
    )
}

/// Handle for `remote` whose workspaces land under `workspaces`.
pub fn handle(remote: &Path, workspaces: &Path) -> RepositoryHandle {
    RepositoryHandle::new(remote.to_str().unwrap()).with_workspace_root(workspaces)
}

pub fn dir_is_empty(dir: &Path) -> bool {
    match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}
