//! Wire types for the workflow and credentials API.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a workflow deployment.
///
/// Statuses the API adds later are kept verbatim in [`DeploymentStatus::Other`]
/// and treated as failures by callers that wait for a specific terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeploymentStatus {
    /// Deploy in flight.
    Deploying,
    /// Deploy finished successfully.
    Deployed,
    /// Undeploy in flight.
    Undeploying,
    /// Undeploy finished successfully.
    Undeployed,
    /// Any other status, preserved as received.
    Other(String),
}

impl DeploymentStatus {
    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Deploying => "DEPLOYING",
            Self::Deployed => "DEPLOYED",
            Self::Undeploying => "UNDEPLOYING",
            Self::Undeployed => "UNDEPLOYED",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for DeploymentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "DEPLOYING" => Self::Deploying,
            "DEPLOYED" => Self::Deployed,
            "UNDEPLOYING" => Self::Undeploying,
            "UNDEPLOYED" => Self::Undeployed,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for DeploymentStatus {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<DeploymentStatus> for String {
    fn from(status: DeploymentStatus) -> Self {
        match status {
            DeploymentStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A workflow deployment as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Deployment identifier, assigned on creation.
    pub id: String,
    /// Current status.
    pub status: DeploymentStatus,
    /// Whether the deployment is live. Authoritative for drift detection.
    #[serde(default)]
    pub is_active: bool,
}

/// Latest migration of a workflow, with its deployment snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMigration {
    /// Migration identifier.
    pub id: String,
    /// Owning workflow.
    pub workflow_id: String,
    /// Deployment snapshot.
    pub deployment: DeploymentRecord,
}

/// A workflow belonging to an integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Workflow identifier.
    pub id: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Owning project.
    #[serde(default)]
    pub project_id: String,
    /// Owning integration.
    #[serde(default)]
    pub integration_id: String,
    /// Version counter.
    #[serde(default)]
    pub workflow_version: i64,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation timestamp, as sent.
    #[serde(default)]
    pub date_created: String,
    /// Last update timestamp, as sent.
    #[serde(default)]
    pub date_updated: String,
}

/// One page of workflows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowsResponse {
    /// Workflows on this page.
    #[serde(default)]
    pub items: Vec<Workflow>,
    /// Cursor of the next page, if any.
    #[serde(default)]
    pub next_page_cursor: Option<String>,
}

/// Integration metadata needed to validate credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    /// Integration identifier.
    pub id: String,
    /// Integration type, e.g. `salesforce` or `custom`.
    #[serde(rename = "type")]
    pub integration_type: String,
    /// Present for custom integrations.
    #[serde(default)]
    pub custom_integration: Option<CustomIntegration>,
}

impl Integration {
    /// Type tag of user-defined integrations.
    pub const CUSTOM_TYPE: &'static str = "custom";

    /// Whether this is a user-defined integration.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        self.integration_type == Self::CUSTOM_TYPE
    }

    /// Authentication type of a custom integration, when known.
    #[must_use]
    pub fn authentication_type(&self) -> Option<&str> {
        self.custom_integration
            .as_ref()
            .and_then(|c| c.authentication_type.as_deref())
    }
}

/// Custom integration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomIntegration {
    /// e.g. `oauth`, `api_key`.
    #[serde(default)]
    pub authentication_type: Option<String>,
}

/// Credential scheme used for OAuth app credentials.
pub const OAUTH_APP_SCHEME: &str = "oauth_app";

/// Body of a credential write. The API upserts by integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCredentialRequest {
    /// Display name; the caller's email.
    pub name: String,
    /// Flat value map: OAuth fields plus extra configuration.
    pub values: serde_json::Map<String, serde_json::Value>,
    /// Integration type.
    pub provider: String,
    /// Always [`OAUTH_APP_SCHEME`].
    pub scheme: String,
    /// Target integration.
    pub integration_id: String,
}

/// Credential as returned by a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// Credential identifier.
    pub id: String,
    /// Credential scheme.
    #[serde(default)]
    pub scheme: String,
    /// Integration type.
    #[serde(default)]
    pub provider: String,
}

/// Credential with its decrypted values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptedCredential {
    /// Credential identifier.
    pub id: String,
    /// Owning integration.
    #[serde(default)]
    pub integration_id: String,
    /// Credential scheme.
    #[serde(default)]
    pub scheme: String,
    /// Integration type.
    #[serde(default)]
    pub provider: String,
    /// Untyped value map.
    #[serde(default)]
    pub values: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deployment_status_keeps_unknown_values() {
        let record: DeploymentRecord =
            serde_json::from_value(json!({"id": "d-1", "status": "FAILED", "isActive": false}))
                .unwrap();
        assert_eq!(record.status, DeploymentStatus::Other("FAILED".into()));
        assert_eq!(record.status.to_string(), "FAILED");

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["status"], "FAILED");
    }

    #[test]
    fn test_deployment_status_known_values() {
        assert_eq!(DeploymentStatus::from("DEPLOYING"), DeploymentStatus::Deploying);
        assert_eq!(DeploymentStatus::from("UNDEPLOYED"), DeploymentStatus::Undeployed);
        assert_eq!(String::from(DeploymentStatus::Deployed), "DEPLOYED");
    }

    #[test]
    fn test_create_deployment_response_without_is_active() {
        let record: DeploymentRecord =
            serde_json::from_value(json!({"id": "d-1", "status": "DEPLOYING"})).unwrap();
        assert!(!record.is_active);
    }

    #[test]
    fn test_integration_custom_detection() {
        let integration: Integration = serde_json::from_value(json!({
            "id": "i-1",
            "type": "custom",
            "customIntegration": {"authenticationType": "api_key"}
        }))
        .unwrap();
        assert!(integration.is_custom());
        assert_eq!(integration.authentication_type(), Some("api_key"));

        let integration: Integration =
            serde_json::from_value(json!({"id": "i-2", "type": "hubspot"})).unwrap();
        assert!(!integration.is_custom());
        assert_eq!(integration.authentication_type(), None);
    }

    #[test]
    fn test_credential_request_wire_names() {
        let request = CreateCredentialRequest {
            name: "dev@example.com".into(),
            values: serde_json::Map::new(),
            provider: "hubspot".into(),
            scheme: OAUTH_APP_SCHEME.into(),
            integration_id: "i-1".into(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["integrationId"], "i-1");
        assert_eq!(value["scheme"], "oauth_app");
    }
}
