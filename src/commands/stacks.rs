// ABOUTME: Stack and version commands: create, list and show.
// ABOUTME: Version bodies are read from JSON or YAML files.

use super::App;
use serde_json::Value;
use stackyard::error::Result;
use stackyard::output::OutputMode;
use stackyard::service::NewVersion;
use std::path::Path;

pub async fn stack_create(app: &App, id: &str, name: Option<&str>) -> Result<()> {
    let stack = app.versions().await?.create_stack(id, name).await?;
    app.output.record(&stack, |mode| match mode {
        OutputMode::Quiet => println!("{}", stack.stack_id),
        _ => println!("Created stack {} ({})", stack.stack_id, stack.name),
    });
    Ok(())
}

pub async fn stack_list(app: &App) -> Result<()> {
    let stacks = app.versions().await?.list_stacks().await?;
    app.output.records(&stacks, |mode| {
        if stacks.is_empty() && mode == OutputMode::Normal {
            println!("No stacks");
        }
        for stack in &stacks {
            match mode {
                OutputMode::Quiet => println!("{}", stack.stack_id),
                _ => println!(
                    "{:<24} {:<24} {}",
                    stack.stack_id,
                    stack.name,
                    stack.current_version.as_deref().unwrap_or("-")
                ),
            }
        }
    });
    Ok(())
}

pub async fn stack_show(app: &App, id: &str) -> Result<()> {
    let versions = app.versions().await?;
    let stack = versions.get_stack(id).await?;
    let latest = versions.latest_version(id).await?;
    app.output.record(&stack, |mode| match mode {
        OutputMode::Quiet => println!("{}", stack.current_version.as_deref().unwrap_or("")),
        _ => {
            println!("Stack:    {} ({})", stack.stack_id, stack.name);
            println!(
                "Applied:  {}",
                stack.current_version.as_deref().unwrap_or("(none)")
            );
            println!(
                "Latest:   {}",
                latest.as_ref().map_or("(none)", |v| v.version.as_str())
            );
            println!("Created:  {}", stack.created_at.to_rfc3339());
        }
    });
    Ok(())
}

fn read_body(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)?;
    // YAML is a superset of JSON, so one parser covers both.
    let body: Value = serde_yaml::from_str(&text)?;
    Ok(body)
}

fn default_author() -> String {
    format!("cli@{}", gethostname::gethostname().to_string_lossy())
}

pub async fn version_create(
    app: &App,
    stack: &str,
    file: &Path,
    label: Option<String>,
    comment: Option<String>,
    created_by: Option<String>,
) -> Result<()> {
    let body = read_body(file)?;
    let new = NewVersion {
        body: Some(body),
        version: label,
        created_by: Some(created_by.unwrap_or_else(default_author)),
        comment,
    };
    let (version, created) = app.versions().await?.create_version(stack, new).await?;
    app.output.record(&version, |mode| match mode {
        OutputMode::Quiet => println!("{}", version.version),
        _ if created => println!(
            "Created version {} of {} (parent: {})",
            version.version,
            stack,
            version.parent_version.as_deref().unwrap_or("none")
        ),
        _ => println!(
            "Body unchanged; latest version {} of {} reused",
            version.version, stack
        ),
    });
    Ok(())
}

pub async fn version_list(app: &App, stack: &str, limit: usize) -> Result<()> {
    let versions = app.versions().await?.list_versions(stack, limit).await?;
    app.output.records(&versions, |mode| {
        for v in &versions {
            match mode {
                OutputMode::Quiet => println!("{}", v.version),
                _ => println!(
                    "{:<20} {:<12} {:<20} {}",
                    v.version,
                    &v.hash[..v.hash.len().min(12)],
                    v.created_by,
                    v.created_at.to_rfc3339()
                ),
            }
        }
    });
    Ok(())
}

pub async fn version_show(app: &App, stack: &str, version: &str) -> Result<()> {
    let version = app.versions().await?.get_version(stack, version).await?;
    let body: Value = serde_json::from_str(&version.body)?;
    app.output.record(&version, |_| {
        match serde_json::to_string_pretty(&body) {
            Ok(pretty) => println!("{pretty}"),
            Err(_) => println!("{}", version.body),
        }
    });
    Ok(())
}
