// ABOUTME: Queue commands: enqueue intents, cancel, and inspect commands and their logs.
// ABOUTME: Nothing here touches the container runtime.

use super::App;
use serde_json::json;
use stackyard::error::{Error, Result};
use stackyard::output::OutputMode;
use stackyard::service::DeployRequest;
use stackyard::store::{Command, CommandId, CommandStatus};

/// A stack operation to queue.
pub enum Intent {
    Apply { version: Option<String> },
    Start,
    Stop,
    Restart,
    Delete,
    Rollback { version: String },
    Deploy(DeployRequest),
}

pub async fn enqueue(app: &App, stack: &str, intent: Intent) -> Result<()> {
    let service = app.commands().await?;
    let id = match intent {
        Intent::Apply { version } => {
            let version = app.resolve_version(stack, version).await?;
            service.apply(stack, &version).await?
        }
        Intent::Start => service.start(stack).await?,
        Intent::Stop => service.stop(stack).await?,
        Intent::Restart => service.restart(stack).await?,
        Intent::Delete => service.delete(stack).await?,
        Intent::Rollback { version } => service.rollback(stack, &version).await?,
        Intent::Deploy(request) => service.deploy(stack, &request).await?,
    };

    let status = CommandStatus::Pending;
    app.output
        .record(&json!({ "id": id, "status": status }), |mode| match mode {
            OutputMode::Quiet => println!("{id}"),
            _ => println!("Queued command {id} ({status})"),
        });
    Ok(())
}

pub async fn cancel(app: &App, id: i64) -> Result<()> {
    let id = CommandId(id);
    let service = app.commands().await?;
    if service.get(id).await?.is_none() {
        return Err(Error::CommandNotFound(id));
    }
    if !service.cancel(id).await? {
        return Err(Error::NotCancellable(id));
    }
    app.output
        .record(&json!({ "id": id, "status": CommandStatus::Cancelled }), |mode| {
            match mode {
                OutputMode::Quiet => println!("{id}"),
                _ => println!("Cancelled command {id}"),
            }
        });
    Ok(())
}

fn print_row(command: &Command) {
    println!(
        "{:>6}  {:<9}  {:<19}  {:<20}  {}",
        command.id,
        command.status,
        command.command_type,
        command.stack_id,
        command.created_at.format("%Y-%m-%d %H:%M:%S")
    );
}

pub async fn list_commands(app: &App, stack: Option<&str>, limit: usize) -> Result<()> {
    let commands = app.commands().await?.list(stack, limit).await?;
    app.output.records(&commands, |mode| {
        for command in &commands {
            match mode {
                OutputMode::Quiet => println!("{} {}", command.id, command.status),
                _ => print_row(command),
            }
        }
    });
    Ok(())
}

pub async fn show_command(app: &App, id: i64) -> Result<()> {
    let id = CommandId(id);
    let command = app
        .commands()
        .await?
        .get(id)
        .await?
        .ok_or(Error::CommandNotFound(id))?;
    app.output.record(&command, |mode| match mode {
        OutputMode::Quiet => println!("{}", command.status),
        _ => {
            println!("Command:  {}", command.id);
            println!("Stack:    {}", command.stack_id);
            println!("Type:     {}", command.command_type);
            println!("Status:   {}", command.status);
            println!("Payload:  {}", command.payload);
            println!("Created:  {}", command.created_at.to_rfc3339());
            if let Some(started) = command.started_at {
                println!("Started:  {}", started.to_rfc3339());
            }
            if let Some(ended) = command.ended_at {
                println!("Ended:    {}", ended.to_rfc3339());
            }
            if let Some(error) = &command.error {
                println!("Error:    {error}");
            }
        }
    });
    Ok(())
}

pub async fn show_logs(app: &App, id: i64, limit: Option<usize>) -> Result<()> {
    let id = CommandId(id);
    let service = app.commands().await?;
    if service.get(id).await?.is_none() {
        return Err(Error::CommandNotFound(id));
    }
    let mut logs = service.logs(id, limit).await?;
    logs.reverse();
    app.output.records(&logs, |_| {
        for entry in &logs {
            println!(
                "{} {:<5} {}",
                entry.ts.format("%H:%M:%S%.3f"),
                entry.level,
                entry.message
            );
        }
    });
    Ok(())
}
