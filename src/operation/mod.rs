//! Asynchronous operation tracking: tokens handed back to the platform on a
//! long-running provisioning call, and the resolver that answers later polls.

mod layout;
mod request;
mod token;
mod tracker;

pub use layout::{
    DeploymentLayout, DEFAULT_INSTANCE_PREFIX, DEFAULT_MANIFEST_EXTENSION, DEFAULT_ROOT_DEPLOYMENT,
};
pub use request::{
    CreateServiceInstanceRequest, DeleteServiceInstanceRequest, OperationKind, OperationRequest,
};
pub use token::{OperationToken, TOKEN_VERSION};
pub use tracker::{
    Clock, CompletionResolver, CompletionStatus, FixedClock, OperationState, SystemClock,
    DEFAULT_MAX_EXECUTION_DURATION,
};
