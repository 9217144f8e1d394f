//! Workflow deployment lifecycle
//!
//! Deploys and undeploys are asynchronous on the remote side. The
//! [`DeploymentDriver`] starts one and polls its status until it leaves the
//! in-flight state:
//!
//! - deploy: `DEPLOYING` until `DEPLOYED` (success) or anything else (failure)
//! - undeploy: `UNDEPLOYING` until `UNDEPLOYED` or a 404 (success), or
//!   anything else (failure)

use declarative::{Poll, PollConfig, PollError, PollObserver, ReadOutcome, Resource, poll_until};
use gateway::{DeploymentRecord, DeploymentStatus, Gateway};
use serde::{Deserialize, Serialize};

use crate::error::{Direction, ReconcileError, Result};
use crate::schema::DeploymentSpec;

/// Tracked state of a deployed workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentState {
    /// Deployment id, refreshed from the latest migration on read
    pub id: String,
    pub project_id: String,
    pub workflow_id: String,
    pub version: i64,
    /// Last known `isActive`
    pub deployed: bool,
}

/// Drives one deployment or undeployment to a terminal status
pub struct DeploymentDriver<'a> {
    gateway: &'a dyn Gateway,
    poll: PollConfig,
    observer: Option<&'a dyn PollObserver>,
}

impl<'a> DeploymentDriver<'a> {
    pub fn new(gateway: &'a dyn Gateway, poll: PollConfig) -> Self {
        Self {
            gateway,
            poll,
            observer: None,
        }
    }

    /// Report pending statuses to `observer` while polling
    pub fn with_observer(mut self, observer: &'a dyn PollObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn gateway(&self) -> &'a dyn Gateway {
        self.gateway
    }

    /// Start deploying a workflow, returning the new deployment id
    pub fn start_deploy(&self, project_id: &str, workflow_id: &str) -> Result<String> {
        let id = self.gateway.create_deployment(project_id, workflow_id)?;
        log::info!("Started deployment {id} of workflow {workflow_id}");
        Ok(id)
    }

    /// Poll until the deployment is `DEPLOYED`
    pub fn await_terminal(&self, project_id: &str, deployment_id: &str) -> Result<DeploymentRecord> {
        let outcome = poll_until(&self.poll, self.observer, |_| -> Result<Poll<DeploymentRecord>> {
            let record = self.gateway.get_deployment(project_id, deployment_id)?;
            match record.status {
                DeploymentStatus::Deploying => Ok(Poll::Pending(record.status.to_string())),
                DeploymentStatus::Deployed => Ok(Poll::Ready(record)),
                other => Err(ReconcileError::DeploymentFailed {
                    direction: Direction::Deploy,
                    status: other.to_string(),
                }),
            }
        });
        let record = finish(outcome)?;
        log::info!("Deployment {deployment_id} is {}", record.status);
        Ok(record)
    }

    /// Start undeploying a workflow. Nothing deployed is not an error.
    pub fn start_undeploy(&self, project_id: &str, workflow_id: &str) -> Result<()> {
        self.gateway.delete_deployment(project_id, workflow_id)?;
        log::info!("Started undeploy of workflow {workflow_id}");
        Ok(())
    }

    /// Poll until the deployment is `UNDEPLOYED` or no longer exists
    pub fn await_undeploy_terminal(&self, project_id: &str, deployment_id: &str) -> Result<()> {
        let outcome = poll_until(&self.poll, self.observer, |_| -> Result<Poll<()>> {
            let record = match self.gateway.get_deployment(project_id, deployment_id) {
                Ok(record) => record,
                Err(e) if e.is_not_found() => {
                    log::debug!("Deployment {deployment_id} is gone");
                    return Ok(Poll::Ready(()));
                }
                Err(e) => return Err(e.into()),
            };
            match record.status {
                DeploymentStatus::Undeploying => Ok(Poll::Pending(record.status.to_string())),
                DeploymentStatus::Undeployed => Ok(Poll::Ready(())),
                other => Err(ReconcileError::DeploymentFailed {
                    direction: Direction::Undeploy,
                    status: other.to_string(),
                }),
            }
        });
        finish(outcome)?;
        log::info!("Deployment {deployment_id} is undeployed");
        Ok(())
    }

    fn deploy(&self, spec: &DeploymentSpec) -> Result<DeploymentState> {
        let id = self.start_deploy(&spec.project_id, &spec.workflow_id)?;
        self.await_terminal(&spec.project_id, &id)?;
        Ok(DeploymentState {
            id,
            project_id: spec.project_id.clone(),
            workflow_id: spec.workflow_id.clone(),
            version: spec.version,
            deployed: true,
        })
    }
}

fn finish<T>(outcome: std::result::Result<T, PollError<ReconcileError>>) -> Result<T> {
    outcome.map_err(|e| match e {
        PollError::Probe(e) => e,
        PollError::DeadlineExceeded { attempts, elapsed } => {
            ReconcileError::PollTimeout { attempts, elapsed }
        }
    })
}

/// Whether the remote deployment changed state behind our back
pub fn detect_drift(current_is_active: bool, last_known_deployed: bool) -> bool {
    current_is_active != last_known_deployed
}

/// `workflow_deployments` resource
pub struct WorkflowDeployment<'a> {
    driver: DeploymentDriver<'a>,
}

impl<'a> WorkflowDeployment<'a> {
    pub fn new(driver: DeploymentDriver<'a>) -> Self {
        Self { driver }
    }
}

impl Resource for WorkflowDeployment<'_> {
    type Declared = DeploymentSpec;
    type State = DeploymentState;
    type Error = ReconcileError;

    fn resource_type(&self) -> &'static str {
        "workflow_deployment"
    }

    fn create(&self, declared: &DeploymentSpec) -> Result<DeploymentState> {
        self.driver.deploy(declared)
    }

    fn read(&self, state: &DeploymentState) -> Result<ReadOutcome<DeploymentState>> {
        let migration = self
            .driver
            .gateway()
            .find_latest_migration(&state.project_id, &state.workflow_id)?;

        let Some(migration) = migration else {
            return Ok(ReadOutcome::gone());
        };

        if detect_drift(migration.deployment.is_active, state.deployed) {
            return Ok(ReadOutcome::drifted(
                "Workflow was undeployed outside stateward, removing from state",
                "The workflow deployment state has changed outside of stateward.",
            ));
        }

        Ok(ReadOutcome::Present(DeploymentState {
            id: migration.deployment.id,
            ..state.clone()
        }))
    }

    /// Redeploys; the remote side has no in-place update
    fn update(&self, declared: &DeploymentSpec, _state: &DeploymentState) -> Result<DeploymentState> {
        self.driver.deploy(declared)
    }

    fn delete(&self, state: &DeploymentState) -> Result<()> {
        self.driver
            .start_undeploy(&state.project_id, &state.workflow_id)?;
        self.driver
            .await_undeploy_terminal(&state.project_id, &state.id)
    }

    fn needs_update(&self, declared: &DeploymentSpec, state: &DeploymentState) -> bool {
        needs_redeploy(declared, state)
    }

    fn requires_replace(&self, declared: &DeploymentSpec, state: &DeploymentState) -> bool {
        identity_changed(declared, state)
    }
}

/// A version bump redeploys in place
pub fn needs_redeploy(declared: &DeploymentSpec, state: &DeploymentState) -> bool {
    declared.version != state.version
}

/// Moving to another project or workflow undeploys the old one first
pub fn identity_changed(declared: &DeploymentSpec, state: &DeploymentState) -> bool {
    declared.project_id != state.project_id || declared.workflow_id != state.workflow_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{ApplyResult, ExecuteOptions, NoProgress, converge};
    use gateway::{MockGateway, ScriptedStatus};
    use std::time::Duration;

    fn status(s: &str) -> ScriptedStatus {
        ScriptedStatus::Status(DeploymentStatus::from(s))
    }

    fn spec(version: i64) -> DeploymentSpec {
        DeploymentSpec {
            project_id: "p-1".into(),
            workflow_id: "w-1".into(),
            version,
        }
    }

    #[test]
    fn test_await_terminal_polls_until_deployed() {
        let mock = MockGateway::new();
        mock.queue_deploy([status("DEPLOYING"), status("DEPLOYING"), status("DEPLOYED")]);
        let driver = DeploymentDriver::new(&mock, PollConfig::immediate());

        let id = driver.start_deploy("p-1", "w-1").unwrap();
        let record = driver.await_terminal("p-1", &id).unwrap();

        assert_eq!(record.status, DeploymentStatus::Deployed);
        assert_eq!(mock.call_count("get_deployment"), 3);
    }

    #[test]
    fn test_await_terminal_fails_on_other_status() {
        let mock = MockGateway::new();
        mock.queue_deploy([status("DEPLOYING"), status("FAILED")]);
        let driver = DeploymentDriver::new(&mock, PollConfig::immediate());

        let id = driver.start_deploy("p-1", "w-1").unwrap();
        let err = driver.await_terminal("p-1", &id).unwrap_err();

        match err {
            ReconcileError::DeploymentFailed { direction, status } => {
                assert_eq!(direction, Direction::Deploy);
                assert_eq!(status, "FAILED");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(mock.call_count("get_deployment"), 2);
    }

    #[test]
    fn test_await_terminal_surfaces_read_errors() {
        let mock = MockGateway::new();
        mock.queue_deploy([status("DEPLOYING"), ScriptedStatus::Error(502)]);
        let driver = DeploymentDriver::new(&mock, PollConfig::immediate());

        let id = driver.start_deploy("p-1", "w-1").unwrap();
        let err = driver.await_terminal("p-1", &id).unwrap_err();
        assert!(matches!(err, ReconcileError::Gateway(ref e) if e.status_code() == Some(502)));
    }

    #[test]
    fn test_await_terminal_deadline() {
        let mock = MockGateway::new();
        mock.queue_deploy([status("DEPLOYING")]);
        let poll = PollConfig {
            interval: Duration::from_millis(5),
            deadline: Some(Duration::from_millis(1)),
        };
        let driver = DeploymentDriver::new(&mock, poll);

        let id = driver.start_deploy("p-1", "w-1").unwrap();
        let err = driver.await_terminal("p-1", &id).unwrap_err();
        assert!(matches!(err, ReconcileError::PollTimeout { attempts: 1, .. }));
    }

    #[test]
    fn test_undeploy_not_found_is_immediate_success() {
        let mock = MockGateway::new();
        let driver = DeploymentDriver::new(&mock, PollConfig::immediate());
        let id = driver.start_deploy("p-1", "w-1").unwrap();
        mock.queue_undeploy([ScriptedStatus::NotFound]);

        driver.start_undeploy("p-1", "w-1").unwrap();
        driver.await_undeploy_terminal("p-1", &id).unwrap();
        assert_eq!(mock.call_count("get_deployment"), 1);
    }

    #[test]
    fn test_undeploy_polls_until_undeployed() {
        let mock = MockGateway::new();
        let driver = DeploymentDriver::new(&mock, PollConfig::immediate());
        let id = driver.start_deploy("p-1", "w-1").unwrap();
        mock.queue_undeploy([status("UNDEPLOYING"), status("UNDEPLOYED")]);

        driver.start_undeploy("p-1", "w-1").unwrap();
        driver.await_undeploy_terminal("p-1", &id).unwrap();
        assert_eq!(mock.call_count("get_deployment"), 2);
    }

    #[test]
    fn test_undeploy_fails_on_other_status() {
        let mock = MockGateway::new();
        let driver = DeploymentDriver::new(&mock, PollConfig::immediate());
        let id = driver.start_deploy("p-1", "w-1").unwrap();
        mock.queue_undeploy([status("UNDEPLOYING"), status("ERRORED")]);

        driver.start_undeploy("p-1", "w-1").unwrap();
        let err = driver.await_undeploy_terminal("p-1", &id).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Workflow deployment failed to undeploy with status: ERRORED"
        );
    }

    #[test]
    fn test_create_fails_when_deploy_request_fails() {
        let mock = MockGateway::new();
        mock.fail_operation("create_deployment", 500);
        let resource = WorkflowDeployment::new(DeploymentDriver::new(&mock, PollConfig::immediate()));

        let err = resource.create(&spec(1)).unwrap_err();
        assert!(matches!(err, ReconcileError::Gateway(ref e) if e.status_code() == Some(500)));
        assert_eq!(mock.call_count("get_deployment"), 0);
    }

    #[test]
    fn test_undeploy_surfaces_read_errors() {
        let mock = MockGateway::new();
        let resource = WorkflowDeployment::new(DeploymentDriver::new(&mock, PollConfig::immediate()));
        let state = resource.create(&spec(1)).unwrap();
        mock.queue_undeploy([status("UNDEPLOYING"), ScriptedStatus::Error(502)]);

        let err = resource.delete(&state).unwrap_err();
        assert!(matches!(err, ReconcileError::Gateway(ref e) if e.status_code() == Some(502)));
        assert_eq!(mock.call_count("delete_deployment"), 1);
    }

    #[test]
    fn test_delete_fails_before_polling() {
        let mock = MockGateway::new();
        let resource = WorkflowDeployment::new(DeploymentDriver::new(&mock, PollConfig::immediate()));
        let state = resource.create(&spec(1)).unwrap();
        let reads = mock.call_count("get_deployment");
        mock.fail_operation("delete_deployment", 500);

        let err = resource.delete(&state).unwrap_err();
        assert!(matches!(err, ReconcileError::Gateway(ref e) if e.status_code() == Some(500)));
        assert_eq!(mock.call_count("get_deployment"), reads);
    }

    #[test]
    fn test_detect_drift() {
        assert!(detect_drift(false, true));
        assert!(detect_drift(true, false));
        assert!(!detect_drift(true, true));
    }

    #[test]
    fn test_create_records_deployed_state() {
        let mock = MockGateway::new();
        let resource = WorkflowDeployment::new(DeploymentDriver::new(&mock, PollConfig::immediate()));

        let state = resource.create(&spec(1)).unwrap();
        assert!(state.deployed);
        assert_eq!(state.id, "dep-1");
        assert_eq!(state.version, 1);
    }

    #[test]
    fn test_read_missing_migration_is_gone() {
        let mock = MockGateway::new();
        let resource = WorkflowDeployment::new(DeploymentDriver::new(&mock, PollConfig::immediate()));
        let state = DeploymentState {
            id: "dep-9".into(),
            project_id: "p-1".into(),
            workflow_id: "w-1".into(),
            version: 1,
            deployed: true,
        };

        let outcome = resource.read(&state).unwrap();
        assert!(matches!(outcome, ReadOutcome::Gone { warning: None }));
    }

    #[test]
    fn test_read_drift_warns_without_mutation() {
        let mock = MockGateway::new();
        let resource = WorkflowDeployment::new(DeploymentDriver::new(&mock, PollConfig::immediate()));
        let state = resource.create(&spec(1)).unwrap();
        mock.set_active("p-1", "w-1", false);
        let before = mock.calls().len();

        let outcome = resource.read(&state).unwrap();
        match outcome {
            ReadOutcome::Gone { warning: Some(w) } => {
                assert!(w.summary.contains("undeployed outside stateward"));
                assert!(!w.is_error());
            }
            other => panic!("expected drift, got {other:?}"),
        }

        let after = mock.calls();
        assert_eq!(after.len(), before + 1);
        assert!(after[before].starts_with("latest_migrations"));
    }

    #[test]
    fn test_version_bump_redeploys() {
        let mock = MockGateway::new();
        let resource = WorkflowDeployment::new(DeploymentDriver::new(&mock, PollConfig::immediate()));
        let opts = ExecuteOptions::default();
        let tracked = resource.create(&spec(1)).unwrap();

        let converged = converge(
            &resource,
            "workflow_deployments.sync",
            Some(&spec(2)),
            Some(&tracked),
            &opts,
            &mut NoProgress,
        );

        assert_eq!(converged.result, ApplyResult::Modified);
        let state = converged.state.unwrap();
        assert_eq!(state.version, 2);
        assert_eq!(state.id, "dep-3");
        assert_eq!(mock.call_count("create_deployment"), 2);
    }

    #[test]
    fn test_unchanged_declaration_is_no_change() {
        let mock = MockGateway::new();
        let resource = WorkflowDeployment::new(DeploymentDriver::new(&mock, PollConfig::immediate()));
        let tracked = resource.create(&spec(1)).unwrap();

        let converged = converge(
            &resource,
            "workflow_deployments.sync",
            Some(&spec(1)),
            Some(&tracked),
            &ExecuteOptions::default(),
            &mut NoProgress,
        );
        assert_eq!(converged.result, ApplyResult::NoChange);
        assert_eq!(mock.call_count("create_deployment"), 1);
    }

    #[test]
    fn test_workflow_change_replaces() {
        let mock = MockGateway::new();
        let resource = WorkflowDeployment::new(DeploymentDriver::new(&mock, PollConfig::immediate()));
        let tracked = resource.create(&spec(1)).unwrap();
        let moved = DeploymentSpec {
            workflow_id: "w-2".into(),
            ..spec(1)
        };

        let converged = converge(
            &resource,
            "workflow_deployments.sync",
            Some(&moved),
            Some(&tracked),
            &ExecuteOptions::default(),
            &mut NoProgress,
        );

        assert_eq!(converged.result, ApplyResult::Replaced);
        assert_eq!(converged.state.unwrap().workflow_id, "w-2");
        assert_eq!(mock.call_count("delete_deployment"), 1);
    }
}
