use anyhow::{Context, Result};
use declarative::PollConfig;
use gateway::HttpGateway;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path (~/.config/stateward)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("stateward"))
}

/// Default settings file path
pub fn default_config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Default state file path (~/.local/state/stateward/state.json)
pub fn default_state_file() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home
        .join(".local")
        .join("state")
        .join("stateward")
        .join("state.json"))
}

// ============================================================================
// Settings
// ============================================================================

/// Connection and polling settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// API base URL, e.g. `https://api.example.com/v1`
    pub base_url: Option<String>,

    /// Bearer token; the caller's email is read from it
    pub access_token: Option<String>,

    /// Delay between two deployment status checks
    pub poll_interval_secs: u64,

    /// Give up waiting for a deployment after this long; unset waits forever
    pub poll_timeout_secs: Option<u64>,

    /// Per-request timeout; 0 disables it
    pub request_timeout_secs: u64,

    /// Where tracked state is kept; `~` is expanded
    pub state_file: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: None,
            access_token: None,
            poll_interval_secs: 2,
            poll_timeout_secs: None,
            request_timeout_secs: 30,
            state_file: None,
        }
    }
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub access_token: Option<String>,
    pub poll_timeout_secs: Option<u64>,
}

impl Settings {
    /// Load settings from `path`, or from the default location
    ///
    /// A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_file()?,
        };

        if !path.exists() {
            log::debug!("Settings file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;

        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if overrides.base_url.is_some() {
            self.base_url = overrides.base_url;
        }
        if overrides.access_token.is_some() {
            self.access_token = overrides.access_token;
        }
        if overrides.poll_timeout_secs.is_some() {
            self.poll_timeout_secs = overrides.poll_timeout_secs;
        }
        self
    }

    /// Build the HTTP gateway; fails before any request when the base URL
    /// or token is missing
    pub fn gateway(&self) -> Result<HttpGateway> {
        let base_url = self
            .base_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .context("No API base URL configured (set base_url or STATEWARD_BASE_URL)")?;
        let access_token = self
            .access_token
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .context("No access token configured (set access_token or STATEWARD_ACCESS_TOKEN)")?;

        let timeout = (self.request_timeout_secs > 0)
            .then(|| Duration::from_secs(self.request_timeout_secs));
        Ok(HttpGateway::with_timeout(base_url, access_token, timeout))
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_secs(self.poll_interval_secs),
            deadline: self.poll_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Expanded state file path
    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.state_file {
            Some(path) => Ok(PathBuf::from(shellexpand::tilde(path).as_ref())),
            None => default_state_file(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(&dir.path().join("missing.toml"))).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.poll_config().interval, Duration::from_secs(2));
        assert_eq!(settings.poll_config().deadline, None);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
base_url = "https://api.example.com/v1"
poll_timeout_secs = 600
state_file = "/tmp/stateward-state.json"
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.base_url.as_deref(), Some("https://api.example.com/v1"));
        assert_eq!(settings.request_timeout_secs, 30);
        assert_eq!(
            settings.poll_config().deadline,
            Some(Duration::from_secs(600))
        );
        assert_eq!(
            settings.state_path().unwrap(),
            PathBuf::from("/tmp/stateward-state.json")
        );
    }

    #[test]
    fn test_overrides_win() {
        let settings = Settings {
            base_url: Some("https://file.example.com".into()),
            access_token: Some("file-token".into()),
            ..Settings::default()
        }
        .with_overrides(Overrides {
            base_url: Some("https://flag.example.com".into()),
            access_token: None,
            poll_timeout_secs: Some(5),
        });

        assert_eq!(settings.base_url.as_deref(), Some("https://flag.example.com"));
        assert_eq!(settings.access_token.as_deref(), Some("file-token"));
        assert_eq!(settings.poll_timeout_secs, Some(5));
    }

    #[test]
    fn test_gateway_requires_base_url_and_token() {
        let err = Settings::default().gateway().unwrap_err();
        assert!(err.to_string().contains("base URL"));

        let settings = Settings {
            base_url: Some("https://api.example.com/".into()),
            ..Settings::default()
        };
        let err = settings.gateway().unwrap_err();
        assert!(err.to_string().contains("access token"));

        let settings = Settings {
            access_token: Some("t".into()),
            ..settings
        };
        assert_eq!(settings.gateway().unwrap().base_url(), "https://api.example.com");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "poll_interval_secs = \"soon\"").unwrap();
        assert!(Settings::load(Some(&path)).is_err());
    }
}
