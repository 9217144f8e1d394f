use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::resource::{CredentialsState, DeploymentState};

// ============================================================================
// State Structures
// ============================================================================

/// Last observed state of every managed resource
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TrackedState {
    /// Deployed workflows keyed by declaration name
    #[serde(default)]
    pub workflow_deployments: BTreeMap<String, DeploymentState>,

    /// Credentials keyed by declaration name
    #[serde(default)]
    pub integration_credentials: BTreeMap<String, CredentialsState>,

    /// Last time the state was written
    pub last_updated: DateTime<Utc>,
}

impl Default for TrackedState {
    fn default() -> Self {
        Self {
            workflow_deployments: BTreeMap::new(),
            integration_credentials: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

/// A state file on disk
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load state from disk, or return default if the file doesn't exist
    pub fn load(&self) -> Result<TrackedState> {
        if !self.path.exists() {
            log::debug!("State file does not exist, using empty state");
            return Ok(TrackedState::default());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file: {}", self.path.display()))?;

        let state: TrackedState = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", self.path.display()))?;

        log::debug!("Loaded state from {}", self.path.display());
        Ok(state)
    }

    /// Stamp `last_updated` and write the state as pretty JSON
    pub fn save(&self, state: &mut TrackedState) -> Result<()> {
        state.last_updated = Utc::now();

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(state).context("Failed to serialize state to JSON")?;
        write_private(&self.path, content.as_bytes())
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))?;

        log::debug!("Saved state to {}", self.path.display());
        Ok(())
    }
}

/// Write `content` to `path`, readable only by the owner on Unix
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;

    // mode() only applies when the file is created
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file.metadata()?.permissions();
        perms.set_mode(0o600);
        file.set_permissions(perms)?;
    }

    file.write_all(content)
}

impl TrackedState {
    pub fn is_empty(&self) -> bool {
        self.workflow_deployments.is_empty() && self.integration_credentials.is_empty()
    }

    /// Record the outcome of one operation; `None` stops tracking `name`
    pub fn set_deployment(&mut self, name: &str, state: Option<DeploymentState>) {
        match state {
            Some(s) => {
                self.workflow_deployments.insert(name.to_string(), s);
            }
            None => {
                self.workflow_deployments.remove(name);
            }
        }
    }

    pub fn set_credentials(&mut self, name: &str, state: Option<CredentialsState>) {
        match state {
            Some(s) => {
                self.integration_credentials.insert(name.to_string(), s);
            }
            None => {
                self.integration_credentials.remove(name);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
