// ABOUTME: Deploy: ensure one service is running and optionally exec a command in it.
// ABOUTME: A non-zero exit code fails the command; output is copied into the command log.

use super::{CommandContext, Engine, EngineError};
use crate::runtime::{ExecConfig, ExecError, FullRuntime};
use crate::stack::split_command;
use crate::types::ServiceName;
use serde_json::Value;

impl<R: FullRuntime> Engine<R> {
    /// `DEPLOY_APP`: payload `{"targetService", "command"?, "artifactPath"?, "strategy"?}`.
    pub async fn deploy(&self, ctx: &CommandContext) -> Result<(), EngineError> {
        let stack = ctx.stack().await?;
        let target = ctx.required_str("targetService").await?;
        let service = match ServiceName::new(&target) {
            Ok(service) => service,
            Err(e) => {
                return Err(ctx
                    .fail(EngineError::Validation(format!(
                        "payload.targetService: {e}"
                    )))
                    .await);
            }
        };
        let command = self.deploy_command(ctx).await?;

        let name = self.naming.container(&stack, service.as_str());
        let Some(container) = self.runtime.find_container(&name).await? else {
            return Err(ctx
                .fail(EngineError::NotFound(format!(
                    "service {service} has no container in stack {stack}"
                )))
                .await);
        };
        self.ensure_started(ctx, &container).await?;

        let Some(command) = command else {
            ctx.info(format!(
                "Deploy recorded for {service}: artifactPath={} strategy={}",
                ctx.optional_str("artifactPath").as_deref().unwrap_or("-"),
                ctx.optional_str("strategy").as_deref().unwrap_or("-"),
            ))
            .await;
            return Ok(());
        };

        ctx.info(format!("Exec in {}: {}", container.name, command.join(" ")))
            .await;
        let timeout = self.timeouts.exec;
        let exec_config = ExecConfig::command(command);
        let exec = self.runtime.exec(&container.id, &exec_config);
        let result = match tokio::time::timeout(timeout, exec).await {
            Ok(result) => result?,
            Err(_) => return Err(ExecError::Timeout(timeout).into()),
        };

        for line in result.stdout_lossy().lines().filter(|l| !l.trim().is_empty()) {
            ctx.info(format!("stdout: {line}")).await;
        }
        for line in result.stderr_lossy().lines().filter(|l| !l.trim().is_empty()) {
            ctx.warn(format!("stderr: {line}")).await;
        }

        if !result.success() {
            return Err(EngineError::ExitCode {
                service: service.to_string(),
                exit_code: result.exit_code,
            });
        }
        ctx.info(format!("Deploy of {service} finished")).await;
        Ok(())
    }

    /// `payload.command` as an argument list, or `None` when absent or empty.
    async fn deploy_command(&self, ctx: &CommandContext) -> Result<Option<Vec<String>>, EngineError> {
        let args = match ctx.payload.get("command") {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(line)) => split_command(line),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>(),
            Some(_) => None,
        };
        match args {
            Some(args) if args.is_empty() => Ok(None),
            Some(args) => Ok(Some(args)),
            None => Err(ctx
                .fail(EngineError::Validation(
                    "payload.command must be a list of strings or a command line".to_string(),
                ))
                .await),
        }
    }
}
