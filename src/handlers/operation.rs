//! Operation token handlers
//!
//! Issues tokens the way a provisioning call would and polls them against a
//! fresh clone of the repository.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::context::CallContext;
use crate::git::{GitSyncEngine, SyncRequest};
use crate::logger;
use crate::operation::{
    CreateServiceInstanceRequest, DeleteServiceInstanceRequest, OperationKind, OperationRequest,
    OperationState,
};
use crate::settings::BrokerConfig;

/// Fields a token request is built from
#[derive(Debug, Clone)]
pub struct TokenArgs {
    pub kind: OperationKind,
    pub instance_id: String,
    pub service_id: String,
    pub plan_id: String,
    pub organization_guid: String,
    pub space_guid: String,
}

impl TokenArgs {
    fn into_request(self) -> OperationRequest {
        match self.kind {
            OperationKind::Create => OperationRequest::Create(CreateServiceInstanceRequest {
                service_instance_id: self.instance_id,
                service_definition_id: self.service_id,
                plan_id: self.plan_id,
                organization_guid: self.organization_guid,
                space_guid: self.space_guid,
                parameters: Default::default(),
            }),
            OperationKind::Delete => OperationRequest::Delete(DeleteServiceInstanceRequest {
                service_instance_id: self.instance_id,
                service_definition_id: self.service_id,
                plan_id: self.plan_id,
            }),
        }
    }
}

/// Handle token command
pub fn handle_token(config: &BrokerConfig, args: TokenArgs) -> Result<()> {
    let resolver = config.completion_resolver();
    let request = args.into_request();
    let instance_id = request.service_instance_id().to_string();
    let kind = request.kind();

    let token = resolver
        .issue_token(request)
        .context("Failed to issue operation token")?;

    logger::log_to_file(&format!("token {} {}", kind.as_str(), instance_id))?;
    println!("{token}");
    Ok(())
}

/// Handle poll command
pub fn handle_poll(config: &BrokerConfig, token: &str) -> Result<()> {
    let resolver = config.completion_resolver();
    let engine = GitSyncEngine::new(config.repository_handle()?);
    let mut ctx = CallContext::new();
    config.fill_context(&mut ctx);
    let request = SyncRequest::from_context(&ctx, engine.alias());

    let mut session = engine
        .open_session(&request)
        .context("Failed to open repository for polling")?;
    let status = resolver.resolve(token, session.workdir()?);
    session.close(true);
    let status = status.context("Failed to resolve operation status")?;

    let state = match status.state {
        OperationState::InProgress => status.state.as_str().to_uppercase().yellow(),
        OperationState::Succeeded => status.state.as_str().to_uppercase().green(),
        OperationState::Failed => status.state.as_str().to_uppercase().red(),
    };
    println!("{} {}", state.bold(), status.description);

    logger::log_to_file(&format!("poll: {} ({})", status.state, status.description))?;
    Ok(())
}
