//! OAuth credentials with dynamic extra configuration
//!
//! A credential is stored remotely as one flat, untyped value map. The
//! reserved keys hold the typed OAuth fields; everything else is extra
//! configuration declared by the user. Writes merge both halves into the
//! map, reads split them apart again.

use declarative::{ReadOutcome, Resource};
use gateway::{
    CreateCredentialRequest, DecryptedCredential, Gateway, Integration, OAUTH_APP_SCHEME,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ReconcileError, Result, ValidationError};
use crate::schema::{CredentialsSpec, OAuthSpec};
use crate::value::ConfigValue;

pub const CLIENT_ID: &str = "clientId";
pub const CLIENT_SECRET: &str = "clientSecret";
pub const SCOPES: &str = "scopes";

/// Keys owned by the OAuth fields
pub const RESERVED_KEYS: [&str; 3] = [CLIENT_ID, CLIENT_SECRET, SCOPES];

pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Extra configuration together with the keys the user declared
///
/// The key set is state of its own: a read only brings back keys that were
/// declared, even when the remote map holds more.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraBlock {
    pub declared_keys: BTreeSet<String>,
    pub values: BTreeMap<String, ConfigValue>,
}

impl ExtraBlock {
    pub fn from_values(values: BTreeMap<String, ConfigValue>) -> Self {
        Self {
            declared_keys: values.keys().cloned().collect(),
            values,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.declared_keys.is_empty()
    }
}

/// Tracked state of a credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialsState {
    pub id: String,
    pub project_id: String,
    pub integration_id: String,
    pub scheme: String,
    /// Integration type at creation time
    pub provider: String,
    pub oauth: OAuthSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<ExtraBlock>,
}

// ============================================================================
// Value reconciliation
// ============================================================================

/// Check declared extra configuration against the integration
///
/// Returns every problem found; an empty list means the declaration is fine.
pub fn validate_extra_config(
    extra: Option<&BTreeMap<String, ConfigValue>>,
    integration: &Integration,
) -> Vec<ValidationError> {
    let Some(extra) = extra.filter(|m| !m.is_empty()) else {
        return Vec::new();
    };

    let mut errors: Vec<ValidationError> = extra
        .keys()
        .filter(|key| is_reserved(key))
        .map(|key| {
            ValidationError::new(
                "Invalid extra configuration key",
                format!(
                    "Extra configuration key '{key}' conflicts with OAuth field names. \
                     The following keys are reserved for OAuth configuration: {}",
                    RESERVED_KEYS.join(", ")
                ),
            )
        })
        .collect();

    if integration.is_custom() && integration.custom_integration.is_some() {
        let auth_type = integration.authentication_type().unwrap_or_default();
        if auth_type != "oauth" {
            errors.push(ValidationError::new(
                "Invalid extra configuration for custom integration",
                format!(
                    "Extra configuration is not supported for custom integrations with \
                     authentication type '{auth_type}'. Extra configuration is only supported \
                     for OAuth-based custom integrations."
                ),
            ));
        }
    }

    errors
}

/// Build the flat value map sent on a write
///
/// Declared strings go out as their natural JSON scalar; `Null` values are
/// left out.
pub fn merge(
    oauth: &OAuthSpec,
    extra: Option<&BTreeMap<String, ConfigValue>>,
    joined_scopes: &str,
) -> Map<String, Value> {
    let mut values = Map::new();
    values.insert(CLIENT_ID.into(), Value::from(oauth.client_id.as_str()));
    values.insert(CLIENT_SECRET.into(), Value::from(oauth.client_secret.as_str()));
    values.insert(SCOPES.into(), Value::from(joined_scopes));

    for (key, value) in extra.into_iter().flatten() {
        if let Some(wire) = value.to_wire() {
            values.insert(key.clone(), wire);
        }
    }
    values
}

/// Re-extract only the keys in `declared`
///
/// A key missing remotely keeps its previously declared value.
pub fn extract_declared_only(api: &Map<String, Value>, declared: &ExtraBlock) -> Option<ExtraBlock> {
    if declared.is_empty() {
        return None;
    }

    let values = declared
        .declared_keys
        .iter()
        .map(|key| {
            let prior = declared.values.get(key).cloned().unwrap_or(ConfigValue::Null);
            let value = match api.get(key) {
                Some(remote) => ConfigValue::from_json(remote).conform_to(&prior),
                None => prior,
            };
            (key.clone(), value)
        })
        .collect();

    Some(ExtraBlock {
        declared_keys: declared.declared_keys.clone(),
        values,
    })
}

/// Every non-reserved key, typed by its JSON value
pub fn extract_all_non_reserved(api: &Map<String, Value>) -> Option<ExtraBlock> {
    let values: BTreeMap<_, _> = api
        .iter()
        .filter(|(key, _)| !is_reserved(key))
        .map(|(key, value)| (key.clone(), ConfigValue::from_json(value)))
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(ExtraBlock::from_values(values))
    }
}

/// Split the wire form of scopes; an empty string means no scopes
pub fn split_scopes(joined: &str) -> Option<Vec<String>> {
    if joined.is_empty() {
        return None;
    }
    Some(joined.split(' ').map(str::to_string).collect())
}

/// Typed OAuth fields from a decrypted value map
fn decode_oauth(values: &Map<String, Value>) -> Result<OAuthSpec> {
    let client_id = values
        .get(CLIENT_ID)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ReconcileError::malformed(
                "Error extracting client ID",
                "Could not extract client ID from the decrypted credential values",
            )
        })?;
    let client_secret = values
        .get(CLIENT_SECRET)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ReconcileError::malformed(
                "Error extracting client secret",
                "Could not extract client secret from the decrypted credential values",
            )
        })?;
    let scopes = values
        .get(SCOPES)
        .and_then(Value::as_str)
        .and_then(split_scopes);

    Ok(OAuthSpec {
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
        scopes,
    })
}

fn check(errors: Vec<ValidationError>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ReconcileError::Validation(errors))
    }
}

// ============================================================================
// Resource
// ============================================================================

/// `integration_credentials` resource
pub struct IntegrationCredentials<'a> {
    gateway: &'a dyn Gateway,
}

impl<'a> IntegrationCredentials<'a> {
    pub fn new(gateway: &'a dyn Gateway) -> Self {
        Self { gateway }
    }

    /// Adopt an existing credential, keeping every non-reserved key
    pub fn import(&self, project_id: &str, credential_id: &str) -> Result<CredentialsState> {
        let credential = self
            .gateway
            .get_decrypted_credential(project_id, credential_id)?;
        let oauth = decode_oauth(&credential.values)?;
        let extra = extract_all_non_reserved(&credential.values);
        log::info!(
            "Imported credential {credential_id} with {} extra key(s)",
            extra.as_ref().map_or(0, |e| e.declared_keys.len())
        );

        Ok(CredentialsState {
            id: credential.id,
            project_id: project_id.to_string(),
            integration_id: credential.integration_id,
            scheme: credential.scheme,
            provider: credential.provider,
            oauth,
            extra,
        })
    }

    /// Scopes to send for a new credential on `integration`
    fn scopes_for_create(spec: &CredentialsSpec, integration: &Integration) -> Result<String> {
        if !integration.is_custom() {
            if spec.oauth.scopes.is_none() {
                return Err(ReconcileError::validation(
                    "Missing scopes",
                    "Scopes must be specified for this integration",
                ));
            }
            return Ok(spec.oauth.joined_scopes());
        }

        let Some(custom) = &integration.custom_integration else {
            return Err(ReconcileError::malformed(
                "Error retrieving integration",
                format!(
                    "Integration {} is custom but has no custom integration settings",
                    integration.id
                ),
            ));
        };
        if custom.authentication_type.as_deref() != Some("oauth") {
            return Err(ReconcileError::validation(
                "Invalid authentication type",
                "The 'oauth' block is specified, but the custom integration's authentication \
                 type is not 'oauth'",
            ));
        }
        if spec.oauth.scopes.is_some() {
            return Err(ReconcileError::validation(
                "Unexpected scopes section",
                "Scopes cannot be specified for custom integrations",
            ));
        }
        Ok(String::new())
    }

    fn write(
        &self,
        spec: &CredentialsSpec,
        provider: &str,
        joined_scopes: &str,
    ) -> Result<gateway::CredentialRecord> {
        let name = self.gateway.user_email()?;
        let request = CreateCredentialRequest {
            name,
            values: merge(&spec.oauth, spec.extra(), joined_scopes),
            provider: provider.to_string(),
            scheme: OAUTH_APP_SCHEME.to_string(),
            integration_id: spec.integration_id.clone(),
        };
        Ok(self.gateway.create_credential(&spec.project_id, &request)?)
    }

    /// Rebuild tracked state from a decrypted credential
    fn observe(
        base: &CredentialsState,
        credential: DecryptedCredential,
        declared: Option<&ExtraBlock>,
    ) -> Result<CredentialsState> {
        let oauth = decode_oauth(&credential.values)?;
        let extra = declared.and_then(|d| extract_declared_only(&credential.values, d));
        Ok(CredentialsState {
            id: credential.id,
            scheme: non_empty_or(credential.scheme, &base.scheme),
            provider: non_empty_or(credential.provider, &base.provider),
            oauth,
            extra,
            ..base.clone()
        })
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

impl Resource for IntegrationCredentials<'_> {
    type Declared = CredentialsSpec;
    type State = CredentialsState;
    type Error = ReconcileError;

    fn resource_type(&self) -> &'static str {
        "integration_credentials"
    }

    fn create(&self, declared: &CredentialsSpec) -> Result<CredentialsState> {
        let integration = self
            .gateway
            .get_integration(&declared.project_id, &declared.integration_id)?;
        check(validate_extra_config(declared.extra(), &integration))?;
        let joined_scopes = Self::scopes_for_create(declared, &integration)?;

        let record = self.write(declared, &integration.integration_type, &joined_scopes)?;
        log::info!(
            "Created credential {} for integration {}",
            record.id,
            declared.integration_id
        );

        Ok(CredentialsState {
            id: record.id,
            project_id: declared.project_id.clone(),
            integration_id: declared.integration_id.clone(),
            scheme: record.scheme,
            provider: non_empty_or(record.provider, &integration.integration_type),
            oauth: declared.oauth.clone(),
            extra: declared.extra().cloned().map(ExtraBlock::from_values),
        })
    }

    fn read(&self, state: &CredentialsState) -> Result<ReadOutcome<CredentialsState>> {
        let credential = match self
            .gateway
            .get_decrypted_credential(&state.project_id, &state.id)
        {
            Ok(credential) => credential,
            Err(e) if e.is_not_found() => return Ok(ReadOutcome::gone()),
            Err(e) => return Err(e.into()),
        };
        let observed = Self::observe(state, credential, state.extra.as_ref())?;
        Ok(ReadOutcome::Present(observed))
    }

    fn update(&self, declared: &CredentialsSpec, state: &CredentialsState) -> Result<CredentialsState> {
        if state.provider == Integration::CUSTOM_TYPE {
            if declared.oauth.scopes.is_some() {
                return Err(ReconcileError::validation(
                    "Invalid scopes",
                    "Scopes must not be specified for custom integrations",
                ));
            }
        } else if declared.oauth.scopes.is_none() {
            return Err(ReconcileError::validation(
                "Missing scopes",
                "Scopes must be specified for non-custom integrations",
            ));
        }

        let integration = self
            .gateway
            .get_integration(&declared.project_id, &declared.integration_id)?;
        check(validate_extra_config(declared.extra(), &integration))?;

        // Must still exist; the write below would otherwise recreate it
        self.gateway
            .get_decrypted_credential(&state.project_id, &state.id)?;

        let record = self.write(declared, &state.provider, &declared.oauth.joined_scopes())?;
        let credential = self
            .gateway
            .get_decrypted_credential(&declared.project_id, &record.id)?;
        log::info!("Updated credential {}", record.id);

        let declared_extra = declared.extra().cloned().map(ExtraBlock::from_values);
        Self::observe(state, credential, declared_extra.as_ref())
    }

    fn delete(&self, state: &CredentialsState) -> Result<()> {
        self.gateway.delete_credential(&state.project_id, &state.id)?;
        log::info!("Deleted credential {}", state.id);
        Ok(())
    }

    fn needs_update(&self, declared: &CredentialsSpec, state: &CredentialsState) -> bool {
        values_differ(declared, state)
    }

    fn requires_replace(&self, declared: &CredentialsSpec, state: &CredentialsState) -> bool {
        identity_changed(declared, state)
    }
}

/// OAuth fields or extra configuration differ from what is tracked
pub fn values_differ(declared: &CredentialsSpec, state: &CredentialsState) -> bool {
    let tracked_extra = state
        .extra
        .as_ref()
        .map(|e| &e.values)
        .filter(|v| !v.is_empty());
    declared.oauth != state.oauth || declared.extra() != tracked_extra
}

/// Credentials belong to one integration; moving them means a new credential
pub fn identity_changed(declared: &CredentialsSpec, state: &CredentialsState) -> bool {
    declared.project_id != state.project_id || declared.integration_id != state.integration_id
}
