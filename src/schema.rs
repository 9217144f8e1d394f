use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use crate::value::ConfigValue;

// ============================================================================
// Declarations
// ============================================================================

/// Desired state, as written in `stateward.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Declarations {
    /// Workflow deployments keyed by name
    #[serde(default)]
    pub workflow_deployments: BTreeMap<String, DeploymentSpec>,

    /// OAuth credentials keyed by name
    #[serde(default)]
    pub integration_credentials: BTreeMap<String, CredentialsSpec>,
}

impl Declarations {
    /// Load, expand `${VAR}` references, and validate
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read declarations: {}", path.display()))?;
        let mut declarations = Self::parse(&content)
            .with_context(|| format!("Failed to parse declarations: {}", path.display()))?;
        declarations.expand_env()?;
        declarations.validate()?;
        log::debug!(
            "Loaded {} deployment(s) and {} credential(s) from {}",
            declarations.workflow_deployments.len(),
            declarations.integration_credentials.len(),
            path.display()
        );
        Ok(declarations)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn expand_env(&mut self) -> Result<()> {
        for (name, spec) in &mut self.workflow_deployments {
            spec.expand_env()
                .with_context(|| format!("workflow_deployments.{name}"))?;
        }
        for (name, spec) in &mut self.integration_credentials {
            spec.expand_env()
                .with_context(|| format!("integration_credentials.{name}"))?;
        }
        Ok(())
    }

    /// Static checks that need no remote calls
    pub fn validate(&self) -> Result<()> {
        for (name, spec) in &self.workflow_deployments {
            spec.validate()
                .with_context(|| format!("Invalid workflow_deployments.{name}"))?;
        }
        for (name, spec) in &self.integration_credentials {
            spec.validate()
                .with_context(|| format!("Invalid integration_credentials.{name}"))?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.workflow_deployments.is_empty() && self.integration_credentials.is_empty()
    }
}

// ============================================================================
// Workflow Deployments
// ============================================================================

/// A workflow that should be deployed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub project_id: String,
    pub workflow_id: String,
    /// Bumping this redeploys the workflow
    pub version: i64,
}

impl DeploymentSpec {
    fn expand_env(&mut self) -> Result<()> {
        expand(&mut self.project_id)?;
        expand(&mut self.workflow_id)
    }

    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            anyhow::bail!("project_id cannot be empty");
        }
        if self.workflow_id.trim().is_empty() {
            anyhow::bail!("workflow_id cannot be empty");
        }
        Ok(())
    }
}

// ============================================================================
// Integration Credentials
// ============================================================================

/// OAuth app credentials for an integration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialsSpec {
    pub project_id: String,
    pub integration_id: String,
    pub oauth: OAuthSpec,

    /// Scalars sent alongside the OAuth fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_configuration: Option<BTreeMap<String, ConfigValue>>,
}

/// Typed OAuth fields, shared by declarations and tracked state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthSpec {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
}

impl OAuthSpec {
    /// Scopes as sent on the wire: space-joined, empty when absent
    pub fn joined_scopes(&self) -> String {
        self.scopes.as_deref().unwrap_or_default().join(" ")
    }
}

impl CredentialsSpec {
    fn expand_env(&mut self) -> Result<()> {
        expand(&mut self.project_id)?;
        expand(&mut self.integration_id)?;
        expand(&mut self.oauth.client_id)?;
        expand(&mut self.oauth.client_secret)?;
        for scope in self.oauth.scopes.iter_mut().flatten() {
            expand(scope)?;
        }
        for value in self.extra_configuration.iter_mut().flat_map(|m| m.values_mut()) {
            if let ConfigValue::String(s) = value {
                expand(s)?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            anyhow::bail!("project_id cannot be empty");
        }
        if self.integration_id.trim().is_empty() {
            anyhow::bail!("integration_id cannot be empty");
        }
        if self.oauth.client_id.is_empty() {
            anyhow::bail!("oauth.client_id cannot be empty");
        }
        if self.oauth.client_secret.is_empty() {
            anyhow::bail!("oauth.client_secret cannot be empty");
        }
        if let Some(scopes) = &self.oauth.scopes {
            if scopes.is_empty() {
                anyhow::bail!("oauth.scopes must list at least one scope when set");
            }
            if scopes.iter().any(|s| s.is_empty() || s.contains(' ')) {
                anyhow::bail!("oauth.scopes entries must be non-empty and contain no spaces");
            }
        }
        Ok(())
    }

    /// Declared extra configuration, `None` when absent or empty
    pub fn extra(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        self.extra_configuration.as_ref().filter(|m| !m.is_empty())
    }
}

/// `${NAME}` references; a bare `$` is literal text
static ENV_REF: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}"));

fn expand(value: &mut String) -> Result<()> {
    let pattern = ENV_REF
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Invalid variable pattern: {e}"))?;

    let mut out = String::with_capacity(value.len());
    let mut last = 0;
    for caps in pattern.captures_iter(value.as_str()) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let resolved = std::env::var(name.as_str())
            .with_context(|| format!("Environment variable {} is not set", name.as_str()))?;
        out.push_str(&value[last..whole.start()]);
        out.push_str(&resolved);
        last = whole.end();
    }
    out.push_str(&value[last..]);

    *value = out;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
