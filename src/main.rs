// ABOUTME: Entry point for the stackyard CLI application.
// ABOUTME: Parses arguments, loads configuration and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, StackCommands, VersionCommands};
use commands::{App, Intent};
use stackyard::config::{self, Config};
use stackyard::error::Result;
use stackyard::output::{Output, OutputMode};
use stackyard::service::DeployRequest;
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // The worker is long-running, so its progress is worth seeing by default.
    let default_level = match (&cli.command, cli.verbose) {
        (_, true) => "debug",
        (Commands::Worker { .. }, false) => "info",
        _ => "warn",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(OutputMode::from_flags(cli.json, cli.quiet));

    if let Err(e) = run(cli, output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load(path),
        None => Config::discover(&env::current_dir()?),
    }
}

async fn run(cli: Cli, output: Output) -> Result<()> {
    if let Commands::Init { prefix, force } = &cli.command {
        let cwd = env::current_dir()?;
        config::init_config(&cwd, prefix.as_deref(), *force)?;
        output.progress(&format!("Wrote {}", config::CONFIG_FILENAME));
        return Ok(());
    }

    let app = App::new(load_config(&cli)?, output);

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Stack(StackCommands::Create { id, name }) => {
            commands::stack_create(&app, &id, name.as_deref()).await
        }
        Commands::Stack(StackCommands::List) => commands::stack_list(&app).await,
        Commands::Stack(StackCommands::Show { id }) => commands::stack_show(&app, &id).await,
        Commands::Version(VersionCommands::Create {
            stack,
            file,
            label,
            comment,
            created_by,
        }) => commands::version_create(&app, &stack, &file, label, comment, created_by).await,
        Commands::Version(VersionCommands::List { stack, limit }) => {
            commands::version_list(&app, &stack, limit).await
        }
        Commands::Version(VersionCommands::Show { stack, version }) => {
            commands::version_show(&app, &stack, &version).await
        }
        Commands::Apply { stack, version } => {
            commands::enqueue(&app, &stack, Intent::Apply { version }).await
        }
        Commands::Start { stack } => commands::enqueue(&app, &stack, Intent::Start).await,
        Commands::Stop { stack } => commands::enqueue(&app, &stack, Intent::Stop).await,
        Commands::Restart { stack } => commands::enqueue(&app, &stack, Intent::Restart).await,
        Commands::Delete { stack } => commands::enqueue(&app, &stack, Intent::Delete).await,
        Commands::Rollback { stack, version } => {
            commands::enqueue(&app, &stack, Intent::Rollback { version }).await
        }
        Commands::Deploy {
            stack,
            service,
            artifact,
            strategy,
            command,
        } => {
            let request = DeployRequest {
                target_service: service,
                command: (!command.is_empty()).then_some(command),
                artifact_path: artifact,
                strategy,
            };
            commands::enqueue(&app, &stack, Intent::Deploy(request)).await
        }
        Commands::Cancel { id } => commands::cancel(&app, id).await,
        Commands::Commands { stack, limit } => {
            commands::list_commands(&app, stack.as_deref(), limit).await
        }
        Commands::Command { id } => commands::show_command(&app, id).await,
        Commands::Logs { id, limit } => commands::show_logs(&app, id, limit).await,
        Commands::Plan { stack, version } => commands::plan(&app, &stack, version).await,
        Commands::Status { stack } => commands::status(&app, &stack).await,
        Commands::ContainerLogs {
            stack,
            service,
            tail,
            follow,
        } => commands::container_logs(&app, &stack, &service, tail, follow).await,
        Commands::Worker { once } => commands::worker(&app, once).await,
    }
}
