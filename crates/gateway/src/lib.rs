//! # gateway
//!
//! Blocking client for the workflow deployment and integration credentials
//! API.
//!
//! This crate provides:
//! - The [`Gateway`] trait, one method per remote operation
//! - [`HttpGateway`], backed by `ureq`
//! - [`MockGateway`], an in-memory stand-in with scripted deployment statuses
//! - Error envelope shaping, caller identity from the access token, and
//!   webhook body templating
//!
//! ## Example
//!
//! ```no_run
//! use gateway::{Gateway, HttpGateway};
//!
//! let gateway = HttpGateway::new("https://api.example.com", std::env::var("TOKEN").unwrap());
//! let id = gateway.create_deployment("project-id", "workflow-id").unwrap();
//! let record = gateway.get_deployment("project-id", &id).unwrap();
//! println!("{} is {}", record.id, record.status);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod message;
pub mod template;
pub mod token;
pub mod types;

pub use backend::http::HttpGateway;
pub use backend::{Gateway, MockGateway, ScriptedStatus};
pub use error::{Error, ErrorCategory, Result};
pub use template::{BodyPart, WebhookBody};
pub use types::{
    CreateCredentialRequest, CredentialRecord, CustomIntegration, DecryptedCredential,
    DeploymentRecord, DeploymentStatus, Integration, OAUTH_APP_SCHEME, Workflow,
    WorkflowMigration, WorkflowsResponse,
};
