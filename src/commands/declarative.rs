//! Declarative commands
//!
//! - `status` - Show declarations against tracked state
//! - `apply` - Make remote state match the declarations
//! - `refresh` - Re-read tracked resources
//! - `destroy` - Delete tracked resources
//! - `import-credentials` - Start tracking an existing credential
//!
//! Credentials are converged before deployments, and destroyed after them.

use anyhow::{Context as _, Result};
use colored::Colorize;
use declarative::{
    ApplyResult, AutoConfirm, ConfirmCallback, Converged, Diagnostics, DiffSummary,
    ExecuteOptions, ExecuteSummary, PlannedAction, PollConfig, ResourceDiff, converge,
    destroy as destroy_one, refresh as refresh_one,
};
use gateway::Gateway;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::Context;
use crate::progress::Spinner;
use crate::resource::credentials::{self, CredentialsState, IntegrationCredentials};
use crate::resource::deployment::{self, DeploymentDriver, DeploymentState, WorkflowDeployment};
use crate::resource::ResourceKind;
use crate::schema::{CredentialsSpec, Declarations, DeploymentSpec, OAuthSpec};
use crate::state::{StateStore, TrackedState};
use crate::ui;

// ============================================================================
// Target Parsing
// ============================================================================

/// Which resources a command applies to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    kind: Option<ResourceKind>,
    name: Option<String>,
}

impl Target {
    /// `<kind>` or `<kind>.<name>`
    pub fn parse(target: &str) -> Result<Self> {
        let (kind, name) = match target.split_once('.') {
            Some((kind, name)) => (kind, Some(name)),
            None => (target, None),
        };

        let Some(kind) = ResourceKind::parse(kind) else {
            anyhow::bail!(
                "Unknown resource kind '{kind}', expected one of: {}",
                ResourceKind::ALL.map(ResourceKind::as_str).join(", ")
            );
        };
        if name == Some("") {
            anyhow::bail!("Missing resource name after '{kind}.'");
        }

        Ok(Self {
            kind: Some(kind),
            name: name.map(str::to_string),
        })
    }

    fn from_arg(target: Option<&str>) -> Result<Self> {
        target.map_or_else(|| Ok(Self::default()), Self::parse)
    }

    pub fn includes(&self, kind: ResourceKind, name: &str) -> bool {
        self.kind.is_none_or(|k| k == kind) && self.name.as_deref().is_none_or(|n| n == name)
    }
}

// ============================================================================
// Engine
// ============================================================================

type Persist<'a> = &'a mut dyn FnMut(&mut TrackedState) -> Result<()>;

/// Runs commands against one gateway
pub struct Engine<'a> {
    gateway: &'a dyn Gateway,
    poll: PollConfig,
    spinner: Spinner,
}

struct Run<'t, 'p> {
    target: &'t Target,
    dry_run: bool,
    summary: ExecuteSummary,
    persist: Persist<'p>,
}

fn credentials_of(state: &mut TrackedState) -> &mut BTreeMap<String, CredentialsState> {
    &mut state.integration_credentials
}

fn deployments_of(state: &mut TrackedState) -> &mut BTreeMap<String, DeploymentState> {
    &mut state.workflow_deployments
}

impl<'a> Engine<'a> {
    pub fn new(gateway: &'a dyn Gateway, poll: PollConfig, spinner: Spinner) -> Self {
        Self {
            gateway,
            poll,
            spinner,
        }
    }

    fn deployments(&self) -> WorkflowDeployment<'_> {
        WorkflowDeployment::new(
            DeploymentDriver::new(self.gateway, self.poll.clone()).with_observer(&self.spinner),
        )
    }

    fn credentials(&self) -> IntegrationCredentials<'_> {
        IntegrationCredentials::new(self.gateway)
    }

    /// Converge every targeted resource, declared or tracked
    pub fn apply(
        &self,
        declarations: &Declarations,
        state: &mut TrackedState,
        target: &Target,
        dry_run: bool,
        persist: Persist<'_>,
    ) -> Result<ExecuteSummary> {
        let opts = ExecuteOptions { dry_run };
        let mut run = Run {
            target,
            dry_run,
            summary: ExecuteSummary::default(),
            persist,
        };

        let credentials = self.credentials();
        each_resource(
            ResourceKind::IntegrationCredentials,
            &declarations.integration_credentials,
            state,
            credentials_of,
            &mut run,
            |address, declared, tracked| {
                converge(&credentials, address, declared, tracked, &opts, &mut self.spinner.clone())
            },
        )?;

        let deployments = self.deployments();
        each_resource(
            ResourceKind::WorkflowDeployments,
            &declarations.workflow_deployments,
            state,
            deployments_of,
            &mut run,
            |address, declared, tracked| {
                converge(&deployments, address, declared, tracked, &opts, &mut self.spinner.clone())
            },
        )?;

        Ok(run.summary)
    }

    /// Re-read every targeted tracked resource
    pub fn refresh(
        &self,
        state: &mut TrackedState,
        target: &Target,
        persist: Persist<'_>,
    ) -> Result<ExecuteSummary> {
        let mut run = Run {
            target,
            dry_run: false,
            summary: ExecuteSummary::default(),
            persist,
        };

        let credentials = self.credentials();
        each_resource::<CredentialsSpec, _>(
            ResourceKind::IntegrationCredentials,
            &BTreeMap::new(),
            state,
            credentials_of,
            &mut run,
            |address, _, tracked| match tracked {
                Some(tracked) => refresh_one(&credentials, address, tracked),
                None => untracked(),
            },
        )?;

        let deployments = self.deployments();
        each_resource::<DeploymentSpec, _>(
            ResourceKind::WorkflowDeployments,
            &BTreeMap::new(),
            state,
            deployments_of,
            &mut run,
            |address, _, tracked| match tracked {
                Some(tracked) => refresh_one(&deployments, address, tracked),
                None => untracked(),
            },
        )?;

        Ok(run.summary)
    }

    /// Delete every targeted tracked resource, deployments first
    pub fn destroy(
        &self,
        state: &mut TrackedState,
        target: &Target,
        dry_run: bool,
        persist: Persist<'_>,
    ) -> Result<ExecuteSummary> {
        let opts = ExecuteOptions { dry_run };
        let mut run = Run {
            target,
            dry_run,
            summary: ExecuteSummary::default(),
            persist,
        };

        let deployments = self.deployments();
        each_resource::<DeploymentSpec, _>(
            ResourceKind::WorkflowDeployments,
            &BTreeMap::new(),
            state,
            deployments_of,
            &mut run,
            |address, _, tracked| match tracked {
                Some(tracked) => {
                    destroy_one(&deployments, address, tracked, &opts, &mut self.spinner.clone())
                }
                None => untracked(),
            },
        )?;

        let credentials = self.credentials();
        each_resource::<CredentialsSpec, _>(
            ResourceKind::IntegrationCredentials,
            &BTreeMap::new(),
            state,
            credentials_of,
            &mut run,
            |address, _, tracked| match tracked {
                Some(tracked) => {
                    destroy_one(&credentials, address, tracked, &opts, &mut self.spinner.clone())
                }
                None => untracked(),
            },
        )?;

        Ok(run.summary)
    }

    /// Adopt an existing credential under `name`
    pub fn import_credentials(
        &self,
        state: &mut TrackedState,
        name: &str,
        project_id: &str,
        credential_id: &str,
    ) -> Result<CredentialsState> {
        if state.integration_credentials.contains_key(name) {
            anyhow::bail!(
                "{} is already tracked",
                ResourceKind::IntegrationCredentials.address(name)
            );
        }

        let imported = self
            .credentials()
            .import(project_id, credential_id)
            .with_context(|| format!("Failed to import credential {credential_id}"))?;
        state.set_credentials(name, Some(imported.clone()));
        Ok(imported)
    }
}

fn untracked<S>() -> Converged<S> {
    Converged {
        result: ApplyResult::NoChange,
        state: None,
        diagnostics: Diagnostics::new(),
    }
}

/// Run `op` for every targeted name of one kind, in name order
///
/// Tracked state is updated and persisted after each resource whose state
/// changed, so an interrupted run keeps what it already did.
fn each_resource<D, S>(
    kind: ResourceKind,
    declared: &BTreeMap<String, D>,
    state: &mut TrackedState,
    field: fn(&mut TrackedState) -> &mut BTreeMap<String, S>,
    run: &mut Run<'_, '_>,
    mut op: impl FnMut(&str, Option<&D>, Option<&S>) -> Converged<S>,
) -> Result<()>
where
    S: Clone + PartialEq,
{
    let mut names: BTreeSet<String> = declared.keys().cloned().collect();
    names.extend(field(state).keys().cloned());

    for name in names.into_iter().filter(|n| run.target.includes(kind, n)) {
        let address = kind.address(&name);
        let tracked = field(state).get(&name).cloned();
        let converged = op(&address, declared.get(&name), tracked.as_ref());

        ui::result_line(&address, &converged.result);
        for diag in converged.diagnostics.iter() {
            ui::diagnostic(diag);
        }
        run.summary.add_result(&converged.result);

        if run.dry_run || converged.state == tracked {
            continue;
        }
        let tracked_map = field(state);
        match converged.state {
            Some(s) => {
                tracked_map.insert(name, s);
            }
            None => {
                tracked_map.remove(&name);
            }
        }
        (run.persist)(state)?;
    }
    Ok(())
}

// ============================================================================
// Status Command
// ============================================================================

/// One line of `status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub kind: ResourceKind,
    pub name: String,
    /// What `apply` would do, judged without remote calls
    pub action: PlannedAction,
    pub detail: String,
}

impl StatusRow {
    fn diff(&self) -> Option<ResourceDiff> {
        self.action.is_change().then(|| ResourceDiff {
            address: self.kind.address(&self.name),
            resource_type: self.kind.as_str().to_string(),
            action: self.action,
        })
    }
}

fn pending<D, S>(
    declared: Option<&D>,
    tracked: Option<&S>,
    identity_changed: fn(&D, &S) -> bool,
    differs: fn(&D, &S) -> bool,
) -> PlannedAction {
    match (declared, tracked) {
        (None, None) => PlannedAction::None,
        (None, Some(_)) => PlannedAction::Delete,
        (Some(_), None) => PlannedAction::Create,
        (Some(d), Some(s)) if identity_changed(d, s) => PlannedAction::Replace,
        (Some(d), Some(s)) if differs(d, s) => PlannedAction::Update,
        (Some(_), Some(_)) => PlannedAction::None,
    }
}

pub fn status_rows(
    declarations: &Declarations,
    state: &TrackedState,
    target: &Target,
) -> Vec<StatusRow> {
    let mut rows = Vec::new();

    let names: BTreeSet<&String> = declarations
        .integration_credentials
        .keys()
        .chain(state.integration_credentials.keys())
        .collect();
    for name in names {
        let kind = ResourceKind::IntegrationCredentials;
        if !target.includes(kind, name) {
            continue;
        }
        let declared = declarations.integration_credentials.get(name);
        let tracked = state.integration_credentials.get(name);
        let detail = match tracked {
            Some(t) => format!("{} ({})", t.id, t.provider),
            None => "not created".to_string(),
        };
        rows.push(StatusRow {
            kind,
            name: name.clone(),
            action: pending(
                declared,
                tracked,
                credentials::identity_changed,
                credentials::values_differ,
            ),
            detail,
        });
    }

    let names: BTreeSet<&String> = declarations
        .workflow_deployments
        .keys()
        .chain(state.workflow_deployments.keys())
        .collect();
    for name in names {
        let kind = ResourceKind::WorkflowDeployments;
        if !target.includes(kind, name) {
            continue;
        }
        let declared = declarations.workflow_deployments.get(name);
        let tracked = state.workflow_deployments.get(name);
        let detail = match (declared, tracked) {
            (Some(d), Some(t)) if d.version != t.version => {
                format!("{} v{} → v{}", t.id, t.version, d.version)
            }
            (_, Some(t)) => format!("{} v{}", t.id, t.version),
            (_, None) => "not deployed".to_string(),
        };
        rows.push(StatusRow {
            kind,
            name: name.clone(),
            action: pending(
                declared,
                tracked,
                deployment::identity_changed,
                deployment::needs_redeploy,
            ),
            detail,
        });
    }

    rows
}

fn load_declarations_or_empty(path: &Path) -> Result<Declarations> {
    if path.exists() {
        Declarations::load(path)
    } else {
        ui::warn(&format!("No declarations at {}", path.display()));
        Ok(Declarations::default())
    }
}

pub fn status(ctx: &Context, target: Option<&str>) -> Result<()> {
    let target = Target::from_arg(target)?;
    ui::header("Stateward Status");

    let declarations = load_declarations_or_empty(&ctx.file)?;
    let store = StateStore::new(ctx.settings.state_path()?);
    let state = store.load()?;

    let rows = status_rows(&declarations, &state, &target);
    if rows.is_empty() {
        ui::info("Nothing declared or tracked");
        return Ok(());
    }

    let mut current_kind = None;
    for row in &rows {
        if current_kind != Some(row.kind) {
            ui::section(row.kind.as_str());
            current_kind = Some(row.kind);
        }
        println!(
            "  {} {} {}",
            ui::action_symbol(row.action),
            row.name.bold(),
            row.detail.dimmed()
        );
    }

    if !ctx.quiet {
        let diffs: Vec<ResourceDiff> = rows.iter().filter_map(StatusRow::diff).collect();
        let pending = DiffSummary::from_diffs(&diffs);
        println!();
        if pending.has_changes() {
            ui::info(&format!(
                "Plan: {} to create, {} to change, {} to destroy",
                pending.additions, pending.modifications, pending.removals
            ));
        } else {
            ui::success("Tracked state matches the declarations");
        }
        ui::dim(&format!("State: {}", store.path().display()));
    }

    Ok(())
}

// ============================================================================
// Apply / Refresh / Destroy
// ============================================================================

fn finish(summary: &ExecuteSummary) -> Result<()> {
    ui::summary(summary);
    if summary.is_success() {
        Ok(())
    } else {
        anyhow::bail!("{} resource(s) failed", summary.failed)
    }
}

pub fn apply(ctx: &Context, target: Option<&str>, dry_run: bool) -> Result<()> {
    let target = Target::from_arg(target)?;
    ui::header("Applying Declarations");

    if dry_run {
        ui::warn("Dry run - no changes will be made");
    }

    let declarations = Declarations::load(&ctx.file)?;
    let gateway = ctx.settings.gateway()?;
    let store = StateStore::new(ctx.settings.state_path()?);
    let mut state = store.load()?;

    let engine = Engine::new(&gateway, ctx.settings.poll_config(), Spinner::new(ctx.quiet));
    let summary = engine.apply(&declarations, &mut state, &target, dry_run, &mut |s| {
        store.save(s)
    })?;

    finish(&summary)
}

pub fn refresh(ctx: &Context, target: Option<&str>) -> Result<()> {
    let target = Target::from_arg(target)?;
    ui::header("Refreshing State");

    let gateway = ctx.settings.gateway()?;
    let store = StateStore::new(ctx.settings.state_path()?);
    let mut state = store.load()?;
    if state.is_empty() {
        ui::info("Nothing tracked");
        return Ok(());
    }

    let engine = Engine::new(&gateway, ctx.settings.poll_config(), Spinner::new(ctx.quiet));
    let summary = engine.refresh(&mut state, &target, &mut |s| store.save(s))?;

    finish(&summary)
}

/// Confirmation through an interactive prompt
struct PromptConfirm;

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> std::io::Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(std::io::Error::other)
    }
}

pub fn destroy(ctx: &Context, target: Option<&str>, yes: bool) -> Result<()> {
    let target = Target::from_arg(target)?;
    ui::header("Destroying Resources");

    let store = StateStore::new(ctx.settings.state_path()?);
    let mut state = store.load()?;

    let rows = status_rows(&Declarations::default(), &state, &target);
    if rows.is_empty() {
        ui::info("Nothing to destroy");
        return Ok(());
    }
    for row in &rows {
        println!("  {} {}", "-".red(), row.kind.address(&row.name));
    }
    println!();

    let mut confirm: Box<dyn ConfirmCallback> = if yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(PromptConfirm)
    };
    if !confirm.confirm(&format!("Destroy {} resource(s)?", rows.len()))? {
        ui::info("Cancelled");
        return Ok(());
    }

    let gateway = ctx.settings.gateway()?;
    let engine = Engine::new(&gateway, ctx.settings.poll_config(), Spinner::new(ctx.quiet));
    let summary = engine.destroy(&mut state, &target, false, &mut |s| store.save(s))?;

    finish(&summary)
}

// ============================================================================
// Import
// ============================================================================

#[derive(Serialize)]
struct Snippet<'a> {
    integration_credentials: BTreeMap<&'a str, CredentialsSpec>,
}

/// Declaration matching an imported credential, secret left to the environment
pub fn declaration_snippet(name: &str, state: &CredentialsState) -> Result<String> {
    let secret_var: String = format!("{name}_client_secret")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();

    let extra_configuration = state.extra.as_ref().map(|e| {
        e.values
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<BTreeMap<_, _>>()
    });

    let spec = CredentialsSpec {
        project_id: state.project_id.clone(),
        integration_id: state.integration_id.clone(),
        oauth: OAuthSpec {
            client_secret: format!("${{{secret_var}}}"),
            ..state.oauth.clone()
        },
        extra_configuration: extra_configuration.filter(|m| !m.is_empty()),
    };

    let snippet = Snippet {
        integration_credentials: BTreeMap::from([(name, spec)]),
    };
    toml::to_string(&snippet).context("Failed to render declaration")
}

pub fn import_credentials(
    ctx: &Context,
    name: &str,
    project_id: &str,
    credential_id: &str,
) -> Result<()> {
    ui::header("Importing Credentials");

    let gateway = ctx.settings.gateway()?;
    let store = StateStore::new(ctx.settings.state_path()?);
    let mut state = store.load()?;

    let engine = Engine::new(&gateway, ctx.settings.poll_config(), Spinner::new(ctx.quiet));
    let imported = engine.import_credentials(&mut state, name, project_id, credential_id)?;
    store.save(&mut state)?;

    ui::success(&format!(
        "Tracking {}",
        ResourceKind::IntegrationCredentials.address(name)
    ));
    ui::kv("Credential", &imported.id);
    ui::kv("Integration", &imported.integration_id);
    ui::kv("Provider", &imported.provider);

    if !ctx.quiet {
        ui::section(&format!("Add to {}", ctx.file.display()));
        println!("{}", declaration_snippet(name, &imported)?);
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
