//! Remote resources managed by stateward
//!
//! Each kind implements [`declarative::Resource`] on its own; they share the
//! gateway and nothing else.

pub mod credentials;
pub mod deployment;

pub use credentials::CredentialsState;
pub use deployment::DeploymentState;

/// Kind of a resource address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResourceKind {
    WorkflowDeployments,
    IntegrationCredentials,
}

impl ResourceKind {
    pub const ALL: [Self; 2] = [Self::WorkflowDeployments, Self::IntegrationCredentials];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WorkflowDeployments => "workflow_deployments",
            Self::IntegrationCredentials => "integration_credentials",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// `<kind>.<name>`
    pub fn address(self, name: &str) -> String {
        format!("{}.{name}", self.as_str())
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
