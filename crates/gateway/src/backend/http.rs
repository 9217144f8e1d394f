//! HTTP backend.
//!
//! [`HttpGateway`] issues blocking requests with `ureq`. Every request carries
//! the bearer token; non-success statuses are turned into
//! [`Error::Status`] with a message shaped from the response body.

use crate::backend::Gateway;
use crate::error::{Error, Result};
use crate::message::shape_error;
use crate::token::email_from_token;
use crate::types::{
    CreateCredentialRequest, CredentialRecord, DecryptedCredential, DeploymentRecord,
    Integration, WorkflowMigration, WorkflowsResponse,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;
use ureq::Body;
use ureq::http::Response;

/// Gateway backed by the real API.
///
/// # Example
///
/// ```no_run
/// use gateway::backend::Gateway;
/// use gateway::backend::http::HttpGateway;
///
/// let gateway = HttpGateway::new("https://api.example.com", "eyJ...");
/// let workflows = gateway.list_workflows("project-id", "integration-id").unwrap();
/// println!("{} workflows", workflows.items.len());
/// ```
pub struct HttpGateway {
    agent: ureq::Agent,
    base_url: String,
    access_token: String,
}

impl fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url)
            .field("access_token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    /// Create a gateway without a request timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::with_timeout(base_url, access_token, None)
    }

    /// Create a gateway whose requests give up after `timeout`.
    #[must_use]
    pub fn with_timeout(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    /// Get the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    fn get(&self, operation: &'static str, path: &str) -> Result<Response<Body>> {
        log::debug!("{operation}: GET {path}");
        self.agent
            .get(&self.url(path))
            .header("Authorization", &self.authorization())
            .header("Accept", "application/json")
            .call()
            .map_err(|e| Error::transport(operation, e.to_string()))
    }

    fn delete(&self, operation: &'static str, path: &str) -> Result<Response<Body>> {
        log::debug!("{operation}: DELETE {path}");
        self.agent
            .delete(&self.url(path))
            .header("Authorization", &self.authorization())
            .call()
            .map_err(|e| Error::transport(operation, e.to_string()))
    }
}

/// Accept the response when `accept` approves its status.
fn check_status(
    operation: &'static str,
    mut response: Response<Body>,
    accept: impl Fn(u16) -> bool,
) -> Result<Response<Body>> {
    let status = response.status().as_u16();
    if accept(status) {
        return Ok(response);
    }
    let body = response.body_mut().read_to_string().unwrap_or_default();
    log::debug!("{operation}: status {status}: {body}");
    Err(Error::status(operation, status, shape_error(status, &body)))
}

fn read_json<T: DeserializeOwned>(operation: &'static str, mut response: Response<Body>) -> Result<T> {
    response
        .body_mut()
        .read_json()
        .map_err(|e| Error::invalid_response(operation, e.to_string()))
}

impl Gateway for HttpGateway {
    fn create_deployment(&self, project_id: &str, workflow_id: &str) -> Result<String> {
        const OP: &str = "create_deployment";
        let path = deployments_path(project_id, workflow_id);
        log::debug!("{OP}: POST {path}");
        let response = self
            .agent
            .post(&self.url(&path))
            .header("Authorization", &self.authorization())
            .send_empty()
            .map_err(|e| Error::transport(OP, e.to_string()))?;

        let created: CreatedDeployment = read_json(OP, check_status(OP, response, |s| s == 201)?)?;
        log::debug!("{OP}: {} is {}", created.id, created.status);
        Ok(created.id)
    }

    fn get_deployment(&self, project_id: &str, deployment_id: &str) -> Result<DeploymentRecord> {
        const OP: &str = "get_deployment";
        let response = self.get(OP, &deployment_path(project_id, deployment_id))?;
        read_json(OP, check_status(OP, response, |s| s == 200)?)
    }

    fn delete_deployment(&self, project_id: &str, workflow_id: &str) -> Result<()> {
        const OP: &str = "delete_deployment";
        let response = self.delete(OP, &deployments_path(project_id, workflow_id))?;
        check_status(OP, response, |s| matches!(s, 200 | 404)).map(drop)
    }

    fn latest_migrations(&self, project_id: &str) -> Result<Vec<WorkflowMigration>> {
        const OP: &str = "latest_migrations";
        let response = self.get(OP, &latest_migrations_path(project_id))?;
        read_json(OP, check_status(OP, response, |s| s == 200)?)
    }

    fn list_workflows(&self, project_id: &str, integration_id: &str) -> Result<WorkflowsResponse> {
        const OP: &str = "list_workflows";
        let response = self.get(OP, &workflows_path(project_id, integration_id))?;
        read_json(OP, check_status(OP, response, |s| s == 200)?)
    }

    fn get_integration(&self, project_id: &str, integration_id: &str) -> Result<Integration> {
        const OP: &str = "get_integration";
        let response = self.get(OP, &integration_path(project_id, integration_id))?;
        read_json(OP, check_status(OP, response, |s| s == 200)?)
    }

    fn create_credential(
        &self,
        project_id: &str,
        request: &CreateCredentialRequest,
    ) -> Result<CredentialRecord> {
        const OP: &str = "create_credential";
        let path = credentials_path(project_id);
        log::debug!("{OP}: POST {path} for integration {}", request.integration_id);
        let response = self
            .agent
            .post(&self.url(&path))
            .header("Authorization", &self.authorization())
            .send_json(request)
            .map_err(|e| Error::transport(OP, e.to_string()))?;

        read_json(OP, check_status(OP, response, |s| (200..300).contains(&s))?)
    }

    fn get_decrypted_credential(
        &self,
        project_id: &str,
        credential_id: &str,
    ) -> Result<DecryptedCredential> {
        const OP: &str = "get_decrypted_credential";
        let response = self.get(OP, &decrypted_credential_path(project_id, credential_id))?;
        read_json(OP, check_status(OP, response, |s| s == 200)?)
    }

    fn delete_credential(&self, project_id: &str, credential_id: &str) -> Result<()> {
        const OP: &str = "delete_credential";
        let response = self.delete(OP, &credential_path(project_id, credential_id))?;
        check_status(OP, response, |s| matches!(s, 200 | 404)).map(drop)
    }

    fn user_email(&self) -> Result<String> {
        email_from_token(&self.access_token)
    }
}

// =============================================================================
// Paths
// =============================================================================

/// One path segment or query value, percent-encoded
fn enc(s: &str) -> Cow<'_, str> {
    urlencoding::encode(s)
}

fn deployments_path(project_id: &str, workflow_id: &str) -> String {
    format!("/projects/{}/workflows/{}/deployments", enc(project_id), enc(workflow_id))
}

fn deployment_path(project_id: &str, deployment_id: &str) -> String {
    format!("/projects/{}/deployments/{}", enc(project_id), enc(deployment_id))
}

fn latest_migrations_path(project_id: &str) -> String {
    format!("/projects/{}/workflows/migrations/latest", enc(project_id))
}

fn workflows_path(project_id: &str, integration_id: &str) -> String {
    format!(
        "/projects/{}/workflows?includeDeleted=false&integrationId={}",
        enc(project_id),
        enc(integration_id)
    )
}

fn integration_path(project_id: &str, integration_id: &str) -> String {
    format!("/projects/{}/integrations/{}", enc(project_id), enc(integration_id))
}

fn credentials_path(project_id: &str) -> String {
    format!("/projects/{}/credentials", enc(project_id))
}

fn credential_path(project_id: &str, credential_id: &str) -> String {
    format!("/projects/{}/credentials/{}", enc(project_id), enc(credential_id))
}

fn decrypted_credential_path(project_id: &str, credential_id: &str) -> String {
    format!("/projects/{}/credentials/{}/decrypted", enc(project_id), enc(credential_id))
}

#[derive(Debug, Deserialize)]
struct CreatedDeployment {
    id: String,
    #[serde(default)]
    status: String,
}
