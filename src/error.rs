//! Errors raised while reconciling a resource

use declarative::{Diagnose, Diagnostic, Diagnostics};
use std::fmt;
use std::time::Duration;

/// Which way a deployment was heading when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Deploy,
    Undeploy,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deploy => write!(f, "failed"),
            Self::Undeploy => write!(f, "failed to undeploy"),
        }
    }
}

/// A declaration that cannot be written as-is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub summary: String,
    pub detail: String,
}

impl ValidationError {
    pub fn new(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.detail)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Gateway(#[from] gateway::Error),

    #[error("Workflow deployment {direction} with status: {status}")]
    DeploymentFailed { direction: Direction, status: String },

    #[error("{}", join_validation(.0))]
    Validation(Vec<ValidationError>),

    #[error("{summary}: {detail}")]
    MalformedResponse { summary: String, detail: String },

    #[error("Gave up waiting for the deployment after {attempts} status checks ({elapsed:?})")]
    PollTimeout { attempts: u32, elapsed: Duration },
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

fn join_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ReconcileError {
    pub fn malformed(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    pub fn validation(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Validation(vec![ValidationError::new(summary, detail)])
    }
}

/// Operator-facing summary for a failed gateway call
fn gateway_summary(err: &gateway::Error) -> &'static str {
    match err.operation() {
        Some("create_deployment") => "Error creating workflow deployment",
        Some("get_deployment") => "Error retrieving workflow deployment status",
        Some("delete_deployment") => "Error deleting workflow deployment",
        Some("latest_migrations") => "Error reading workflow deployment",
        Some("list_workflows") => "Error listing workflows",
        Some("get_integration") => "Error retrieving integration",
        Some("create_credential") => "Error writing integration credentials",
        Some("get_decrypted_credential") => "Error retrieving decrypted credential",
        Some("delete_credential") => "Error deleting credentials",
        _ => match err {
            gateway::Error::InvalidToken(_) => "Error extracting user email from access token",
            _ => "Unexpected error",
        },
    }
}

impl Diagnose for ReconcileError {
    fn diagnostics(&self) -> Diagnostics {
        match self {
            Self::Gateway(err) => Diagnostic::error(
                gateway_summary(err),
                format!("{err}. {}", err.category().advice()),
            )
            .into(),
            Self::DeploymentFailed { direction, .. } => {
                let summary = match direction {
                    Direction::Deploy => "Error deploying workflow",
                    Direction::Undeploy => "Error deleting workflow deployment",
                };
                Diagnostic::error(summary, self.to_string()).into()
            }
            Self::Validation(errors) => {
                let mut diags = Diagnostics::new();
                for e in errors {
                    diags.add_error(e.summary.clone(), e.detail.clone());
                }
                diags
            }
            Self::MalformedResponse { summary, detail } => {
                Diagnostic::error(summary.clone(), detail.clone()).into()
            }
            Self::PollTimeout { .. } => {
                Diagnostic::error("Timed out waiting for workflow deployment", self.to_string())
                    .into()
            }
        }
    }
}
