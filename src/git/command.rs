//! Git CLI invocation with a bounded run time and per-call credentials.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{SyncError, SyncResult};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Username/password pair for HTTP(S) remotes.
///
/// Held in memory only. It reaches git through environment-provided configuration
/// on each invocation and is never written to the workspace's `.git/config`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn authorization_header(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Authorization: Basic {token}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Captured result of one git process.
#[derive(Debug)]
pub(crate) struct GitOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Runs git subcommands for one engine, sharing its credentials and timeout.
#[derive(Debug, Clone)]
pub(crate) struct GitRunner {
    credentials: Option<Credentials>,
    timeout: Duration,
}

impl GitRunner {
    pub fn new(credentials: Option<Credentials>, timeout: Duration) -> Self {
        Self {
            credentials,
            timeout,
        }
    }

    fn command(&self, workdir: &Path, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(credentials) = &self.credentials {
            cmd.env("GIT_CONFIG_COUNT", "1")
                .env("GIT_CONFIG_KEY_0", "http.extraHeader")
                .env("GIT_CONFIG_VALUE_0", credentials.authorization_header());
        }

        cmd
    }

    /// Run a git command and capture its output whatever the exit status.
    ///
    /// The process is killed once the runner's timeout elapses.
    pub fn output(&self, workdir: &Path, args: &[&str]) -> SyncResult<GitOutput> {
        let command_line = args.join(" ");
        log::trace!("git {} (in {})", command_line, workdir.display());

        let mut child = self.command(workdir, args).spawn()?;
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                // Readers are left detached: helper processes may still hold the pipes.
                let _ = child.kill();
                let _ = child.wait();
                return Err(SyncError::Timeout {
                    command: command_line,
                    timeout: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(GitOutput {
            status,
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }

    /// Run a git command and return its trimmed stdout, failing on a non-zero exit.
    pub fn run(&self, workdir: &Path, args: &[&str]) -> SyncResult<String> {
        let output = self.output(workdir, args)?;

        if !output.success() {
            return Err(SyncError::Git {
                command: args.join(" "),
                workdir: workdir.to_path_buf(),
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(output.stdout.trim().to_string())
    }

    /// Run a git command, returning Ok if it succeeds (ignoring stdout).
    pub fn run_ok(&self, workdir: &Path, args: &[&str]) -> SyncResult<()> {
        self.run(workdir, args)?;
        Ok(())
    }

    /// Check if a git command succeeds (exit code 0).
    pub fn succeeds(&self, workdir: &Path, args: &[&str]) -> bool {
        self.output(workdir, args)
            .map(|o| o.success())
            .unwrap_or(false)
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Whether a git executable is reachable on `PATH`.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
