//! The [`Gateway`] trait and its implementations.
//!
//! [`http::HttpGateway`] talks to the real API. [`MockGateway`] keeps
//! everything in memory and lets tests script deployment status sequences:
//!
//! ```
//! use gateway::backend::{Gateway, MockGateway, ScriptedStatus};
//! use gateway::DeploymentStatus;
//!
//! let mock = MockGateway::new();
//! mock.queue_deploy([
//!     ScriptedStatus::Status(DeploymentStatus::Deploying),
//!     ScriptedStatus::Status(DeploymentStatus::Deployed),
//! ]);
//!
//! let id = mock.create_deployment("p-1", "w-1").unwrap();
//! assert_eq!(mock.get_deployment("p-1", &id).unwrap().status, DeploymentStatus::Deploying);
//! assert_eq!(mock.get_deployment("p-1", &id).unwrap().status, DeploymentStatus::Deployed);
//! ```

pub mod http;

use crate::error::{Error, Result};
use crate::types::{
    CreateCredentialRequest, CredentialRecord, DecryptedCredential, DeploymentRecord,
    DeploymentStatus, Integration, Workflow, WorkflowMigration, WorkflowsResponse,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Remote operations needed to reconcile deployments and credentials.
///
/// Every call blocks until the API answers.
pub trait Gateway: Send + Sync {
    /// Start deploying a workflow; returns the new deployment id.
    fn create_deployment(&self, project_id: &str, workflow_id: &str) -> Result<String>;

    /// Read a deployment by id. A missing deployment is a 404 status error.
    fn get_deployment(&self, project_id: &str, deployment_id: &str) -> Result<DeploymentRecord>;

    /// Start undeploying a workflow. Succeeds when nothing is deployed.
    fn delete_deployment(&self, project_id: &str, workflow_id: &str) -> Result<()>;

    /// Latest migration of every workflow in a project.
    fn latest_migrations(&self, project_id: &str) -> Result<Vec<WorkflowMigration>>;

    /// Latest migration of one workflow, if it has any.
    fn find_latest_migration(
        &self,
        project_id: &str,
        workflow_id: &str,
    ) -> Result<Option<WorkflowMigration>> {
        Ok(self
            .latest_migrations(project_id)?
            .into_iter()
            .find(|m| m.workflow_id == workflow_id))
    }

    /// Workflows of an integration, excluding deleted ones.
    fn list_workflows(&self, project_id: &str, integration_id: &str) -> Result<WorkflowsResponse>;

    /// Integration metadata.
    fn get_integration(&self, project_id: &str, integration_id: &str) -> Result<Integration>;

    /// Write credentials for an integration, replacing existing ones.
    fn create_credential(
        &self,
        project_id: &str,
        request: &CreateCredentialRequest,
    ) -> Result<CredentialRecord>;

    /// Read a credential with its decrypted values.
    fn get_decrypted_credential(
        &self,
        project_id: &str,
        credential_id: &str,
    ) -> Result<DecryptedCredential>;

    /// Delete a credential. Succeeds when it is already gone.
    fn delete_credential(&self, project_id: &str, credential_id: &str) -> Result<()>;

    /// Email of the caller, from the access token.
    fn user_email(&self) -> Result<String>;
}

/// One scripted answer to `get_deployment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedStatus {
    /// Answer with this status.
    Status(DeploymentStatus),
    /// Answer with a 404.
    NotFound,
    /// Fail with this HTTP status.
    Error(u16),
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u32,
    /// Scripts consumed by successive `create_deployment` calls
    deploy_scripts: VecDeque<Vec<ScriptedStatus>>,
    /// Scripts consumed by successive `delete_deployment` calls
    undeploy_scripts: VecDeque<Vec<ScriptedStatus>>,
    /// Remaining answers per deployment id; the last one repeats
    deployments: HashMap<String, VecDeque<ScriptedStatus>>,
    /// Latest migrations per project
    migrations: HashMap<String, Vec<WorkflowMigration>>,
    workflows: HashMap<(String, String), Vec<Workflow>>,
    integrations: HashMap<String, Integration>,
    credentials: HashMap<String, DecryptedCredential>,
    /// Operations that fail with the given status
    failures: HashMap<&'static str, u16>,
    email: Option<String>,
    calls: Vec<String>,
}

/// In-memory gateway for tests.
///
/// Clones share state, so a test can keep a handle for assertions while a
/// resource borrows another.
#[derive(Debug, Clone)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Create an empty mock whose caller is `dev@example.com`.
    #[must_use]
    pub fn new() -> Self {
        let state = MockState {
            email: Some("dev@example.com".to_string()),
            ..MockState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Script the status answers of the next created deployment.
    ///
    /// Without a script, a created deployment is immediately `DEPLOYED`.
    pub fn queue_deploy(&self, steps: impl IntoIterator<Item = ScriptedStatus>) {
        self.state().deploy_scripts.push_back(steps.into_iter().collect());
    }

    /// Script the status answers seen after the next undeploy.
    ///
    /// Without a script, an undeployed deployment is immediately `UNDEPLOYED`.
    pub fn queue_undeploy(&self, steps: impl IntoIterator<Item = ScriptedStatus>) {
        self.state()
            .undeploy_scripts
            .push_back(steps.into_iter().collect());
    }

    /// Flip `isActive` on a workflow's latest migration, as an out-of-band
    /// deploy or undeploy would.
    pub fn set_active(&self, project_id: &str, workflow_id: &str, active: bool) {
        let mut state = self.state();
        if let Some(migration) = state
            .migrations
            .get_mut(project_id)
            .and_then(|ms| ms.iter_mut().find(|m| m.workflow_id == workflow_id))
        {
            migration.deployment.is_active = active;
        }
    }

    /// Add workflows returned for an integration.
    pub fn add_workflows(&self, project_id: &str, integration_id: &str, workflows: Vec<Workflow>) {
        self.state()
            .workflows
            .entry((project_id.to_string(), integration_id.to_string()))
            .or_default()
            .extend(workflows);
    }

    /// Register integration metadata.
    pub fn add_integration(&self, integration: Integration) {
        self.state()
            .integrations
            .insert(integration.id.clone(), integration);
    }

    /// Store a credential as if it had been created earlier.
    pub fn add_credential(&self, credential: DecryptedCredential) {
        self.state()
            .credentials
            .insert(credential.id.clone(), credential);
    }

    /// Remove a credential behind the caller's back.
    pub fn remove_credential(&self, credential_id: &str) {
        self.state().credentials.remove(credential_id);
    }

    /// Current stored credential.
    #[must_use]
    pub fn credential(&self, credential_id: &str) -> Option<DecryptedCredential> {
        self.state().credentials.get(credential_id).cloned()
    }

    /// Make every call of `operation` fail with `status`.
    pub fn fail_operation(&self, operation: &'static str, status: u16) {
        self.state().failures.insert(operation, status);
    }

    /// Set the caller identity; `None` behaves like a token without email.
    pub fn set_email(&self, email: Option<&str>) {
        self.state().email = email.map(str::to_string);
    }

    /// Every call made so far, as `"<operation> <args>"`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Number of calls to one operation.
    #[must_use]
    pub fn call_count(&self, operation: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(operation))
            .count()
    }

    /// Record a call and apply any configured failure.
    fn enter(&self, state: &mut MockState, operation: &'static str, args: &str) -> Result<()> {
        state.calls.push(format!("{operation} {args}"));
        match state.failures.get(operation) {
            Some(&status) => Err(Error::status(operation, status, "Error occurred")),
            None => Ok(()),
        }
    }

    fn next_id(state: &mut MockState, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}-{}", state.next_id)
    }
}

impl Gateway for MockGateway {
    fn create_deployment(&self, project_id: &str, workflow_id: &str) -> Result<String> {
        let mut state = self.state();
        self.enter(&mut state, "create_deployment", &format!("{project_id}/{workflow_id}"))?;

        let id = Self::next_id(&mut state, "dep");
        let script = state
            .deploy_scripts
            .pop_front()
            .unwrap_or_else(|| vec![ScriptedStatus::Status(DeploymentStatus::Deployed)]);
        state.deployments.insert(id.clone(), script.into());

        let migration_id = Self::next_id(&mut state, "mig");
        let migrations = state.migrations.entry(project_id.to_string()).or_default();
        migrations.retain(|m| m.workflow_id != workflow_id);
        migrations.push(WorkflowMigration {
            id: migration_id,
            workflow_id: workflow_id.to_string(),
            deployment: DeploymentRecord {
                id: id.clone(),
                status: DeploymentStatus::Deployed,
                is_active: true,
            },
        });

        Ok(id)
    }

    fn get_deployment(&self, project_id: &str, deployment_id: &str) -> Result<DeploymentRecord> {
        let mut state = self.state();
        self.enter(&mut state, "get_deployment", &format!("{project_id}/{deployment_id}"))?;

        let Some(steps) = state.deployments.get_mut(deployment_id) else {
            return Err(Error::status("get_deployment", 404, "Not found"));
        };
        let step = if steps.len() > 1 {
            steps.pop_front()
        } else {
            steps.front().cloned()
        };

        match step {
            Some(ScriptedStatus::Status(status)) => Ok(DeploymentRecord {
                id: deployment_id.to_string(),
                is_active: status == DeploymentStatus::Deployed,
                status,
            }),
            Some(ScriptedStatus::Error(code)) => {
                Err(Error::status("get_deployment", code, "Error occurred"))
            }
            Some(ScriptedStatus::NotFound) | None => {
                Err(Error::status("get_deployment", 404, "Not found"))
            }
        }
    }

    fn delete_deployment(&self, project_id: &str, workflow_id: &str) -> Result<()> {
        let mut state = self.state();
        self.enter(&mut state, "delete_deployment", &format!("{project_id}/{workflow_id}"))?;

        let script = state
            .undeploy_scripts
            .pop_front()
            .unwrap_or_else(|| vec![ScriptedStatus::Status(DeploymentStatus::Undeployed)]);

        let undeployed = state
            .migrations
            .get_mut(project_id)
            .and_then(|ms| ms.iter_mut().find(|m| m.workflow_id == workflow_id))
            .map(|migration| {
                migration.deployment.is_active = false;
                migration.deployment.status = DeploymentStatus::Undeployed;
                migration.deployment.id.clone()
            });
        if let Some(id) = undeployed {
            state.deployments.insert(id, script.into());
        }
        Ok(())
    }

    fn latest_migrations(&self, project_id: &str) -> Result<Vec<WorkflowMigration>> {
        let mut state = self.state();
        self.enter(&mut state, "latest_migrations", project_id)?;
        Ok(state.migrations.get(project_id).cloned().unwrap_or_default())
    }

    fn list_workflows(&self, project_id: &str, integration_id: &str) -> Result<WorkflowsResponse> {
        let mut state = self.state();
        self.enter(&mut state, "list_workflows", &format!("{project_id}/{integration_id}"))?;
        let items = state
            .workflows
            .get(&(project_id.to_string(), integration_id.to_string()))
            .cloned()
            .unwrap_or_default();
        Ok(WorkflowsResponse {
            items,
            next_page_cursor: None,
        })
    }

    fn get_integration(&self, project_id: &str, integration_id: &str) -> Result<Integration> {
        let mut state = self.state();
        self.enter(&mut state, "get_integration", &format!("{project_id}/{integration_id}"))?;
        state
            .integrations
            .get(integration_id)
            .cloned()
            .ok_or_else(|| Error::status("get_integration", 404, "Integration not found"))
    }

    fn create_credential(
        &self,
        project_id: &str,
        request: &CreateCredentialRequest,
    ) -> Result<CredentialRecord> {
        let mut state = self.state();
        self.enter(
            &mut state,
            "create_credential",
            &format!("{project_id}/{}", request.integration_id),
        )?;

        let existing = state
            .credentials
            .values()
            .find(|c| c.integration_id == request.integration_id)
            .map(|c| c.id.clone());
        let id = match existing {
            Some(id) => id,
            None => Self::next_id(&mut state, "cred"),
        };

        let credential = DecryptedCredential {
            id: id.clone(),
            integration_id: request.integration_id.clone(),
            scheme: request.scheme.clone(),
            provider: request.provider.clone(),
            values: request.values.clone(),
        };
        state.credentials.insert(id.clone(), credential);

        Ok(CredentialRecord {
            id,
            scheme: request.scheme.clone(),
            provider: request.provider.clone(),
        })
    }

    fn get_decrypted_credential(
        &self,
        project_id: &str,
        credential_id: &str,
    ) -> Result<DecryptedCredential> {
        let mut state = self.state();
        self.enter(
            &mut state,
            "get_decrypted_credential",
            &format!("{project_id}/{credential_id}"),
        )?;
        state
            .credentials
            .get(credential_id)
            .cloned()
            .ok_or_else(|| Error::status("get_decrypted_credential", 404, "Not found"))
    }

    fn delete_credential(&self, project_id: &str, credential_id: &str) -> Result<()> {
        let mut state = self.state();
        self.enter(
            &mut state,
            "delete_credential",
            &format!("{project_id}/{credential_id}"),
        )?;
        state.credentials.remove(credential_id);
        Ok(())
    }

    fn user_email(&self) -> Result<String> {
        let mut state = self.state();
        self.enter(&mut state, "user_email", "")?;
        match &state.email {
            Some(email) => Ok(email.clone()),
            None => Err(Error::InvalidToken("no email claim".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_scripted_deploy_last_status_repeats() {
        let mock = MockGateway::new();
        mock.queue_deploy([
            ScriptedStatus::Status(DeploymentStatus::Deploying),
            ScriptedStatus::Status(DeploymentStatus::Deployed),
        ]);

        let id = mock.create_deployment("p", "w").unwrap();
        let statuses: Vec<_> = (0..3)
            .map(|_| mock.get_deployment("p", &id).unwrap().status)
            .collect();
        assert_eq!(
            statuses,
            vec![
                DeploymentStatus::Deploying,
                DeploymentStatus::Deployed,
                DeploymentStatus::Deployed
            ]
        );
    }

    #[test]
    fn test_mock_undeploy_rescripts_deployment() {
        let mock = MockGateway::new();
        let id = mock.create_deployment("p", "w").unwrap();
        mock.queue_undeploy([
            ScriptedStatus::Status(DeploymentStatus::Undeploying),
            ScriptedStatus::NotFound,
        ]);

        mock.delete_deployment("p", "w").unwrap();
        assert_eq!(
            mock.get_deployment("p", &id).unwrap().status,
            DeploymentStatus::Undeploying
        );
        assert!(mock.get_deployment("p", &id).unwrap_err().is_not_found());

        let migration = mock.find_latest_migration("p", "w").unwrap().unwrap();
        assert!(!migration.deployment.is_active);
    }

    #[test]
    fn test_mock_find_latest_migration() {
        let mock = MockGateway::new();
        let id = mock.create_deployment("p", "w-2").unwrap();

        let found = mock.find_latest_migration("p", "w-2").unwrap().unwrap();
        assert_eq!(found.deployment.id, id);
        assert!(found.deployment.is_active);
        assert!(mock.find_latest_migration("p", "w-9").unwrap().is_none());
    }

    #[test]
    fn test_mock_unknown_deployment_is_not_found() {
        let mock = MockGateway::new();
        let err = mock.get_deployment("p", "missing").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_mock_credential_upsert_by_integration() {
        let mock = MockGateway::new();
        let mut request = CreateCredentialRequest {
            name: "dev@example.com".into(),
            values: serde_json::Map::new(),
            provider: "hubspot".into(),
            scheme: "oauth_app".into(),
            integration_id: "i-1".into(),
        };

        let first = mock.create_credential("p", &request).unwrap();
        request
            .values
            .insert("clientId".into(), serde_json::Value::from("new"));
        let second = mock.create_credential("p", &request).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(mock.credential(&first.id).unwrap().values["clientId"], "new");
    }

    #[test]
    fn test_mock_failures_and_call_log() {
        let mock = MockGateway::new();
        mock.fail_operation("get_integration", 500);

        let err = mock.get_integration("p", "i").unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(mock.call_count("get_integration"), 1);
        assert_eq!(mock.calls(), vec!["get_integration p/i".to_string()]);
    }

    #[test]
    fn test_mock_email_missing() {
        let mock = MockGateway::new();
        assert_eq!(mock.user_email().unwrap(), "dev@example.com");
        mock.set_email(None);
        assert!(mock.user_email().is_err());
    }
}
