// ABOUTME: Commands that talk to the container runtime: plan, status, logs and the worker.
// ABOUTME: The worker wires the store, engine and dispatcher together and runs the queue.

use super::App;
use futures::StreamExt;
use serde::Serialize;
use stackyard::dispatch::Dispatcher;
use stackyard::engine::{Engine, EngineError, register_handlers};
use stackyard::error::{Error, Result};
use stackyard::output::OutputMode;
use stackyard::runtime::{ContainerOps, LogOps, LogOptions, LogStream};
use stackyard::types::{ServiceName, StackId};
use stackyard::worker::CommandWorker;
use std::sync::Arc;

fn stack_id(stack: &str) -> Result<StackId> {
    StackId::new(stack).map_err(|e| Error::InvalidInput(e.to_string()))
}

pub async fn plan(app: &App, stack: &str, version: Option<String>) -> Result<()> {
    let id = stack_id(stack)?;
    let version = app.resolve_version(stack, version).await?;
    let store = app.store().await?;
    let runtime = app.runtime().await?;
    let engine = Engine::new(runtime, store, app.config.naming(), app.config.timeouts);

    let plan = engine.plan(&id, &version).await?;
    app.output.record(&plan, |mode| {
        if mode == OutputMode::Normal {
            println!("Plan for {} at version {}:", plan.stack_id, plan.version);
        }
        if plan.is_noop() {
            if mode == OutputMode::Normal {
                println!("  nothing to change");
            }
            return;
        }
        for action in &plan.actions {
            println!("  {action}");
        }
    });
    Ok(())
}

#[derive(Serialize)]
struct ContainerRow {
    name: String,
    service: Option<String>,
    version: Option<String>,
    state: String,
    image: String,
    status: String,
}

pub async fn status(app: &App, stack: &str) -> Result<()> {
    let id = stack_id(stack)?;
    let naming = app.config.naming();
    let runtime = app.runtime().await?;
    let containers = runtime
        .list_containers(&naming.stack_filter(&id))
        .await
        .map_err(EngineError::from)?;

    let rows: Vec<ContainerRow> = containers
        .into_iter()
        .map(|c| ContainerRow {
            service: c.labels.get(&naming.key("service")).cloned(),
            version: c.labels.get(&naming.key("stack_version")).cloned(),
            name: c.name,
            state: c.state.to_string(),
            image: c.image,
            status: c.status,
        })
        .collect();

    app.output.records(&rows, |mode| {
        if rows.is_empty() && mode == OutputMode::Normal {
            println!("No containers for stack {stack}");
        }
        for row in &rows {
            match mode {
                OutputMode::Quiet => println!("{} {}", row.name, row.state),
                _ => println!(
                    "{:<32} {:<10} {:<14} {:<28} {}",
                    row.name,
                    row.state,
                    row.version.as_deref().unwrap_or("-"),
                    row.image,
                    row.status
                ),
            }
        }
    });
    Ok(())
}

pub async fn container_logs(
    app: &App,
    stack: &str,
    service: &str,
    tail: u64,
    follow: bool,
) -> Result<()> {
    let id = stack_id(stack)?;
    let service = ServiceName::new(service).map_err(|e| Error::InvalidInput(e.to_string()))?;
    let name = app.config.naming().container(&id, service.as_str());
    let runtime = app.runtime().await?;

    let container = runtime
        .find_container(&name)
        .await
        .map_err(EngineError::from)?
        .ok_or_else(|| EngineError::NotFound(format!("container {name} not found")))?;

    let mut opts = LogOptions::tail(tail);
    if follow {
        opts = opts.follow();
    }
    let mut lines = runtime
        .container_logs(&container.id, &opts)
        .await
        .map_err(EngineError::from)?;

    while let Some(line) = lines.next().await {
        let line = line.map_err(EngineError::from)?;
        match line.stream {
            LogStream::Stdout => println!("{}", line.content),
            LogStream::Stderr => eprintln!("{}", line.content),
        }
    }
    Ok(())
}

pub async fn worker(app: &App, once: bool) -> Result<()> {
    let store = app.store().await?;
    let runtime = app.runtime().await?;
    let engine = Arc::new(Engine::new(
        runtime,
        store.clone(),
        app.config.naming(),
        app.config.timeouts,
    ));

    let mut dispatcher = Dispatcher::new(store.clone());
    register_handlers(&mut dispatcher, engine);
    let worker = Arc::new(CommandWorker::new(
        store,
        Arc::new(dispatcher),
        app.config.worker,
    ));

    if once {
        let processed = worker.run_until_idle().await?;
        app.output
            .record(&serde_json::json!({ "processed": processed }), |mode| {
                match mode {
                    OutputMode::Quiet => println!("{processed}"),
                    _ => println!("Processed {processed} command(s)"),
                }
            });
        return Ok(());
    }

    app.output
        .progress("Worker running; press Ctrl-C to stop after the current command");
    let handle = worker.clone().spawn();
    tokio::signal::ctrl_c().await?;
    app.output.progress("Stopping...");
    worker.stop();
    if let Err(e) = handle.await {
        tracing::error!(error = %e, "Worker task ended abnormally");
    }
    Ok(())
}
