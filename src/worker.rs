// ABOUTME: The single command worker: claim, dispatch, then record the outcome.
// ABOUTME: Polls while idle and stops between commands when asked.

use crate::config::WorkerConfig;
use crate::dispatch::Dispatcher;
use crate::store::{CommandId, CommandStore, LogLevel, StoreError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub struct CommandWorker {
    store: Arc<dyn CommandStore>,
    dispatcher: Arc<Dispatcher>,
    settings: WorkerConfig,
    shutdown: Arc<Notify>,
    stop_requested: AtomicBool,
    running: AtomicBool,
}

impl CommandWorker {
    pub fn new(
        store: Arc<dyn CommandStore>,
        dispatcher: Arc<Dispatcher>,
        settings: WorkerConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            settings,
            shutdown: Arc::new(Notify::new()),
            stop_requested: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }

    /// Claim and run at most one command. Returns whether one was processed.
    ///
    /// Handler failures are recorded on the command; only store errors
    /// outside a command's execution are returned.
    pub async fn process_one(&self) -> Result<bool, StoreError> {
        let Some(id) = self.store.claim_next_pending().await? else {
            return Ok(false);
        };
        self.log(id, LogLevel::Info, "Claimed command; entering execution")
            .await;

        match self.dispatcher.execute(id).await {
            Ok(()) => {
                self.finalize(id, None).await?;
                self.log(id, LogLevel::Info, "Command marked DONE").await;
                tracing::info!(command_id = id.0, "Command marked DONE");
            }
            Err(e) => {
                let mut message = e.to_string();
                if message.trim().is_empty() {
                    message = e.kind().as_str().to_string();
                }
                self.finalize(id, Some(&message)).await?;
                self.log(
                    id,
                    LogLevel::Error,
                    &format!("Command marked FAILED: {message}"),
                )
                .await;
                tracing::error!(command_id = id.0, error = %message, "Command marked FAILED");
            }
        }
        Ok(true)
    }

    /// Move a claimed command out of `RUNNING`, marking it failed when
    /// `failure` is given.
    ///
    /// Until the row leaves `RUNNING` no later command can be claimed, so
    /// store errors are retried every `error_backoff`. Gives up only once
    /// a stop has been requested.
    async fn finalize(&self, id: CommandId, failure: Option<&str>) -> Result<(), StoreError> {
        loop {
            let result = match failure {
                None => self.store.mark_done(id).await,
                Some(message) => self.store.mark_failed(id, message).await,
            };
            match result {
                Ok(_) => return Ok(()),
                Err(e) if self.stop_requested.load(Ordering::SeqCst) => return Err(e),
                Err(e) => {
                    tracing::error!(
                        command_id = id.0,
                        error = %e,
                        "Failed to record command outcome; retrying"
                    );
                    tokio::time::sleep(self.settings.error_backoff).await;
                }
            }
        }
    }

    /// Process commands until the queue has nothing claimable.
    pub async fn run_until_idle(&self) -> Result<usize, StoreError> {
        let mut processed = 0;
        while self.process_one().await? {
            processed += 1;
        }
        Ok(processed)
    }

    /// Poll the queue until [`stop`](Self::stop) is called. A command that is
    /// already executing always runs to completion.
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            "Command worker started"
        );

        while !self.stop_requested.load(Ordering::SeqCst) {
            let delay = match self.process_one().await {
                Ok(true) => continue,
                Ok(false) => self.settings.poll_interval,
                Err(e) => {
                    tracing::error!(error = %e, "Command worker store error");
                    self.settings.error_backoff
                }
            };

            tokio::select! {
                biased;
                _ = self.shutdown.notified() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Command worker stopped");
    }

    /// Run the loop on a background task.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Ask the loop to exit once the current command, if any, finishes.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn log(&self, id: CommandId, level: LogLevel, message: &str) {
        if let Err(e) = self.store.append_log(id, level, message).await {
            tracing::warn!(command_id = id.0, error = %e, "Failed to persist command log line");
        }
    }
}
