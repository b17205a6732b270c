use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Kind of provisioning request an operation token refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Service instance creation
    Create,
    /// Service instance deletion
    Delete,
}

impl OperationKind {
    /// Returns the discriminator written in tokens
    pub fn as_str(&self) -> &str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Delete => "delete",
        }
    }

    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "create" => Some(OperationKind::Create),
            "delete" => Some(OperationKind::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateServiceInstanceRequest {
    pub service_instance_id: String,
    pub service_definition_id: String,
    pub plan_id: String,
    #[serde(default)]
    pub organization_guid: String,
    #[serde(default)]
    pub space_guid: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteServiceInstanceRequest {
    pub service_instance_id: String,
    pub service_definition_id: String,
    pub plan_id: String,
}

/// The request fields an operation token carries, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OperationRequest {
    Create(CreateServiceInstanceRequest),
    Delete(DeleteServiceInstanceRequest),
}

impl OperationRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationRequest::Create(_) => OperationKind::Create,
            OperationRequest::Delete(_) => OperationKind::Delete,
        }
    }

    pub fn service_instance_id(&self) -> &str {
        match self {
            OperationRequest::Create(r) => &r.service_instance_id,
            OperationRequest::Delete(r) => &r.service_instance_id,
        }
    }
}
