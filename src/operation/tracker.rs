//! Completion tracking for asynchronous provisioning.
//!
//! Nothing is persisted between polls: the status is recomputed every time from
//! the token and the current content of the repository workspace, so any broker
//! instance (or a restarted one) can answer a poll.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::layout::DeploymentLayout;
use super::request::OperationRequest;
use super::token::OperationToken;
use crate::error::{SyncError, SyncResult};

pub const DEFAULT_MAX_EXECUTION_DURATION: Duration = Duration::from_secs(600);

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant, movable by hand.
#[derive(Debug)]
pub struct FixedClock {
    instant: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Mutex::new(instant),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut guard) = self.instant.lock() {
            *guard = instant;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut guard) = self.instant.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.instant.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    InProgress,
    Succeeded,
    Failed,
}

impl OperationState {
    pub fn as_str(&self) -> &str {
        match self {
            OperationState::InProgress => "in progress",
            OperationState::Succeeded => "succeeded",
            OperationState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationState::InProgress)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionStatus {
    pub state: OperationState,
    pub description: String,
}

impl CompletionStatus {
    fn new(state: OperationState, description: impl Into<String>) -> Self {
        Self {
            state,
            description: description.into(),
        }
    }
}

/// Turns an operation token plus repository content into a [`CompletionStatus`].
#[derive(Clone)]
pub struct CompletionResolver {
    clock: Arc<dyn Clock>,
    max_execution_duration: Duration,
    layout: DeploymentLayout,
}

impl fmt::Debug for CompletionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionResolver")
            .field("max_execution_duration", &self.max_execution_duration)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl Default for CompletionResolver {
    fn default() -> Self {
        Self::new(
            Arc::new(SystemClock),
            DEFAULT_MAX_EXECUTION_DURATION,
            DeploymentLayout::default(),
        )
    }
}

impl CompletionResolver {
    pub fn new(
        clock: Arc<dyn Clock>,
        max_execution_duration: Duration,
        layout: DeploymentLayout,
    ) -> Self {
        Self {
            clock,
            max_execution_duration,
            layout,
        }
    }

    pub fn max_execution_duration(&self) -> Duration {
        self.max_execution_duration
    }

    pub fn layout(&self) -> &DeploymentLayout {
        &self.layout
    }

    /// Stamp `request` with the current instant and encode it.
    pub fn issue_token(&self, request: OperationRequest) -> SyncResult<String> {
        OperationToken::new(request, self.clock.now()).encode()
    }

    /// Compute the status of the operation described by `token`.
    ///
    /// A timed out operation is reported as [`OperationState::Failed`], not as an
    /// error, whatever the workspace holds.
    pub fn resolve(&self, token: &str, workspace: &Path) -> SyncResult<CompletionStatus> {
        let token = OperationToken::decode(token)?;
        let elapsed = self.elapsed_seconds(&token.started_at);

        let max = self.max_execution_duration.as_secs();
        if elapsed >= 0 && elapsed as u64 >= max {
            log::info!(
                "operation on instance {} timed out after {}s",
                token.request.service_instance_id(),
                elapsed
            );
            return Ok(CompletionStatus::new(
                OperationState::Failed,
                format!("execution timeout after {}s max is {}", elapsed, max),
            ));
        }

        match &token.request {
            OperationRequest::Create(request) => {
                let manifest = self
                    .layout
                    .target_manifest_path(workspace, &request.service_instance_id);
                if manifest.exists() {
                    log::debug!("found target manifest {}", manifest.display());
                    Ok(CompletionStatus::new(
                        OperationState::Succeeded,
                        "Creation is succeeded",
                    ))
                } else {
                    Ok(CompletionStatus::new(
                        OperationState::InProgress,
                        "Creation is in progress",
                    ))
                }
            }
            other => Err(SyncError::UnsupportedOperationKind {
                kind: other.kind().as_str().to_string(),
            }),
        }
    }

    /// Whole seconds between `started_at` and now; negative under clock skew.
    pub fn elapsed_seconds(&self, started_at: &DateTime<Utc>) -> i64 {
        let elapsed = (self.clock.now() - *started_at).num_seconds();
        if elapsed < 0 {
            log::error!(
                "request start date {} is {}s in the future, clocks are skewed",
                started_at.to_rfc3339(),
                -elapsed
            );
        }
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::request::{CreateServiceInstanceRequest, DeleteServiceInstanceRequest};
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 1, 22, 14, 0, 0).unwrap()
    }

    fn create_request(id: &str) -> OperationRequest {
        OperationRequest::Create(CreateServiceInstanceRequest {
            service_instance_id: id.to_string(),
            service_definition_id: "cassandra-ondemand-service".to_string(),
            plan_id: "cassandra-ondemand-plan".to_string(),
            organization_guid: "org_id".to_string(),
            space_guid: "space_id".to_string(),
            parameters: Default::default(),
        })
    }

    fn resolver(clock: Arc<FixedClock>) -> CompletionResolver {
        CompletionResolver::new(
            clock,
            DEFAULT_MAX_EXECUTION_DURATION,
            DeploymentLayout::default(),
        )
    }

    fn write_manifest(workspace: &Path, id: &str) {
        let path = DeploymentLayout::default().target_manifest_path(workspace, id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "---\nname: test\n").unwrap();
    }

    #[test]
    fn test_in_progress_without_manifest() {
        let clock = Arc::new(FixedClock::new(start()));
        let resolver = resolver(Arc::clone(&clock));
        let token = resolver.issue_token(create_request("777")).unwrap();
        let workspace = TempDir::new().unwrap();

        clock.advance(chrono::Duration::seconds(30));
        let status = resolver.resolve(&token, workspace.path()).unwrap();
        assert_eq!(status.state, OperationState::InProgress);
        assert_eq!(status.description, "Creation is in progress");
    }

    #[test]
    fn test_succeeded_with_manifest() {
        let clock = Arc::new(FixedClock::new(start()));
        let resolver = resolver(Arc::clone(&clock));
        let token = resolver.issue_token(create_request("777")).unwrap();
        let workspace = TempDir::new().unwrap();
        write_manifest(workspace.path(), "777");

        let status = resolver.resolve(&token, workspace.path()).unwrap();
        assert_eq!(status.state, OperationState::Succeeded);
        assert_eq!(status.description, "Creation is succeeded");
    }

    #[test]
    fn test_manifest_of_other_instance_does_not_count() {
        let clock = Arc::new(FixedClock::new(start()));
        let resolver = resolver(clock);
        let token = resolver.issue_token(create_request("777")).unwrap();
        let workspace = TempDir::new().unwrap();
        write_manifest(workspace.path(), "778");

        let status = resolver.resolve(&token, workspace.path()).unwrap();
        assert_eq!(status.state, OperationState::InProgress);
    }

    #[test]
    fn test_timeout_is_failed_even_with_manifest() {
        let clock = Arc::new(FixedClock::new(start()));
        let resolver = resolver(Arc::clone(&clock));
        let token = resolver.issue_token(create_request("777")).unwrap();
        let workspace = TempDir::new().unwrap();
        write_manifest(workspace.path(), "777");

        clock.advance(chrono::Duration::seconds(1200));
        let status = resolver.resolve(&token, workspace.path()).unwrap();
        assert_eq!(status.state, OperationState::Failed);
        assert_eq!(status.description, "execution timeout after 1200s max is 600");
        assert!(status.state.is_terminal());
    }

    #[test]
    fn test_timeout_boundary_is_inclusive() {
        let clock = Arc::new(FixedClock::new(start()));
        let resolver = resolver(Arc::clone(&clock));
        let token = resolver.issue_token(create_request("777")).unwrap();
        let workspace = TempDir::new().unwrap();

        clock.advance(chrono::Duration::seconds(599));
        assert_eq!(
            resolver.resolve(&token, workspace.path()).unwrap().state,
            OperationState::InProgress
        );

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(
            resolver.resolve(&token, workspace.path()).unwrap().state,
            OperationState::Failed
        );
    }

    #[test]
    fn test_clock_skew_is_not_a_failure() {
        let clock = Arc::new(FixedClock::new(start()));
        let resolver = resolver(Arc::clone(&clock));
        let token = resolver.issue_token(create_request("777")).unwrap();
        let workspace = TempDir::new().unwrap();

        clock.set(start() - chrono::Duration::hours(2));
        assert_eq!(resolver.elapsed_seconds(&start()), -7200);
        let status = resolver.resolve(&token, workspace.path()).unwrap();
        assert_eq!(status.state, OperationState::InProgress);
    }

    #[test]
    fn test_delete_requests_are_unsupported() {
        let resolver = CompletionResolver::default();
        let token = resolver
            .issue_token(OperationRequest::Delete(DeleteServiceInstanceRequest {
                service_instance_id: "777".to_string(),
                service_definition_id: "s".to_string(),
                plan_id: "p".to_string(),
            }))
            .unwrap();
        let workspace = TempDir::new().unwrap();

        match resolver.resolve(&token, workspace.path()) {
            Err(SyncError::UnsupportedOperationKind { kind }) => assert_eq!(kind, "delete"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_token_is_an_error() {
        let resolver = CompletionResolver::default();
        let workspace = TempDir::new().unwrap();
        assert!(matches!(
            resolver.resolve("garbage", workspace.path()),
            Err(SyncError::InvalidToken(_))
        ));
    }
}
