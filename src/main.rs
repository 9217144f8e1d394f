mod cli;
mod commands;
mod config;
mod error;
mod progress;
mod resource;
mod schema;
mod state;
mod ui;
mod value;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, WebhookCommand};
use config::{Overrides, Settings};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    /// Declarations file
    pub file: PathBuf,
    pub settings: Settings,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    // Completions and webhook conversions need no settings
    let command = match cli.command {
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "stateward", &mut io::stdout());
            return Ok(());
        }
        Command::Webhook(cmd) => {
            return match cmd {
                WebhookCommand::Tokenize { template } => commands::webhook::tokenize(&template),
                WebhookCommand::Render { body } => commands::webhook::render(&body),
            };
        }
        command => command,
    };

    let settings = Settings::load(cli.config.as_deref())?.with_overrides(Overrides {
        base_url: cli.base_url,
        access_token: cli.access_token,
        poll_timeout_secs: cli.poll_timeout,
    });

    let ctx = Context {
        quiet: cli.quiet,
        file: cli.file,
        settings,
    };

    match command {
        Command::Status(args) => commands::declarative::status(&ctx, args.target.as_deref()),
        Command::Apply(args) => {
            commands::declarative::apply(&ctx, args.target.as_deref(), args.dry_run)
        }
        Command::Refresh(args) => commands::declarative::refresh(&ctx, args.target.as_deref()),
        Command::Destroy(args) => {
            commands::declarative::destroy(&ctx, args.target.as_deref(), args.yes)
        }
        Command::ImportCredentials(args) => commands::declarative::import_credentials(
            &ctx,
            &args.name,
            &args.project_id,
            &args.credential_id,
        ),
        Command::Workflows {
            project_id,
            integration_id,
        } => commands::workflows::run(&ctx, &project_id, &integration_id),
        Command::Completions { .. } | Command::Webhook(_) => Ok(()),
    }
}
