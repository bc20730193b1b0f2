//! Observed state of a Shoot.

use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShootStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<LastOperation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<ShootCredentials>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_identity: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advertised_addresses: Vec<ShootAdvertisedAddress>,

    #[serde(default)]
    pub hibernated: bool,

    #[serde(default)]
    pub observed_generation: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_name: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty", rename = "technicalID")]
    pub technical_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl ShootStatus {
    pub fn rotation(&self) -> Option<&ShootCredentialsRotation> {
        self.credentials.as_ref().and_then(|c| c.rotation.as_ref())
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LastOperation {
    pub r#type: LastOperationType,
    pub state: LastOperationState,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub progress: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<Time>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum LastOperationType {
    Create,
    Reconcile,
    Delete,
    Migrate,
    Restore,
}

impl fmt::Display for LastOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastOperationType::Create => write!(f, "Create"),
            LastOperationType::Reconcile => write!(f, "Reconcile"),
            LastOperationType::Delete => write!(f, "Delete"),
            LastOperationType::Migrate => write!(f, "Migrate"),
            LastOperationType::Restore => write!(f, "Restore"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum LastOperationState {
    Processing,
    Succeeded,
    Error,
    Failed,
    Pending,
    Aborted,
}

impl fmt::Display for LastOperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastOperationState::Processing => write!(f, "Processing"),
            LastOperationState::Succeeded => write!(f, "Succeeded"),
            LastOperationState::Error => write!(f, "Error"),
            LastOperationState::Failed => write!(f, "Failed"),
            LastOperationState::Pending => write!(f, "Pending"),
            LastOperationState::Aborted => write!(f, "Aborted"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShootCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<ShootCredentialsRotation>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShootCredentialsRotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authorities: Option<CredentialRotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_key: Option<CredentialRotation>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "etcdEncryptionKey")]
    pub etcd_encryption_key: Option<CredentialRotation>,
}

/// Progress of a two-phase credential rotation.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<CredentialsRotationPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_initiation_time: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completion_time: Option<Time>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum CredentialsRotationPhase {
    Preparing,
    Prepared,
    Completing,
    Completed,
}

impl fmt::Display for CredentialsRotationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialsRotationPhase::Preparing => write!(f, "Preparing"),
            CredentialsRotationPhase::Prepared => write!(f, "Prepared"),
            CredentialsRotationPhase::Completing => write!(f, "Completing"),
            CredentialsRotationPhase::Completed => write!(f, "Completed"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShootAdvertisedAddress {
    pub name: String,
    #[serde(rename = "url")]
    pub url: String,
}
