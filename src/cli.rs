use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stateward")]
#[command(version)]
#[command(about = "Reconcile workflow deployments and integration credentials", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Declarations file
    #[arg(short, long, global = true, default_value = "stateward.toml")]
    pub file: PathBuf,

    /// Settings file [default: ~/.config/stateward/config.toml]
    #[arg(long, global = true, env = "STATEWARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// API base URL
    #[arg(long, global = true, env = "STATEWARD_BASE_URL")]
    pub base_url: Option<String>,

    /// API access token
    #[arg(long, global = true, env = "STATEWARD_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Stop waiting for a deployment after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub poll_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show declared resources against tracked state (no remote calls)
    Status(TargetArgs),

    /// Make remote state match the declarations
    Apply(ApplyArgs),

    /// Re-read tracked resources and drop the ones that are gone
    Refresh(TargetArgs),

    /// Delete tracked resources
    Destroy(DestroyArgs),

    /// Start tracking an existing credential
    ImportCredentials(ImportArgs),

    /// List the workflows of an integration
    Workflows {
        #[arg(long)]
        project_id: String,

        #[arg(long)]
        integration_id: String,
    },

    /// Convert webhook body templates
    #[command(subcommand)]
    Webhook(WebhookCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct TargetArgs {
    /// Resource kind or address, e.g. `integration_credentials.hubspot`
    pub target: Option<String>,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Resource kind or address, e.g. `workflow_deployments.sync`
    pub target: Option<String>,

    /// Show what would change without changing it
    #[arg(short, long)]
    pub dry_run: bool,
}

#[derive(Parser)]
pub struct DestroyArgs {
    /// Resource kind or address
    pub target: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser)]
pub struct ImportArgs {
    /// Name to track the credential under
    pub name: String,

    #[arg(long)]
    pub project_id: String,

    #[arg(long)]
    pub credential_id: String,
}

#[derive(Subcommand)]
pub enum WebhookCommand {
    /// Turn a `{{$.path}}` template into a tokenized body (JSON)
    Tokenize {
        template: String,
    },

    /// Turn a tokenized body (JSON) back into its template
    Render {
        body: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply_with_globals() {
        let cli = Cli::try_parse_from([
            "stateward",
            "-vv",
            "apply",
            "workflow_deployments.sync",
            "--dry-run",
            "--poll-timeout",
            "60",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.poll_timeout, Some(60));
        match cli.command {
            Command::Apply(args) => {
                assert!(args.dry_run);
                assert_eq!(args.target.as_deref(), Some("workflow_deployments.sync"));
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_parse_import() {
        let cli = Cli::try_parse_from([
            "stateward",
            "import-credentials",
            "hubspot",
            "--project-id",
            "p-1",
            "--credential-id",
            "cred-9",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::ImportCredentials(ImportArgs { ref name, .. }) if name == "hubspot"
        ));
    }
}
