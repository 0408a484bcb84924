// ABOUTME: Config scaffolding for new installations.
// ABOUTME: Writes a commented stackyard.yml holding the default settings.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::StackId;

use super::{CONFIG_FILENAME, Config};

pub fn init_config(dir: &Path, prefix: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = Config::default();
    if let Some(prefix) = prefix {
        StackId::new(prefix).map_err(|e| Error::InvalidConfig(format!("prefix: {e}")))?;
        config.prefix = prefix.to_string();
    }

    std::fs::write(&config_path, template_yaml(&config))?;
    Ok(())
}

fn human(d: std::time::Duration) -> String {
    match d.as_millis() {
        ms if ms % 1000 == 0 => format!("{}s", ms / 1000),
        ms => format!("{ms}ms"),
    }
}

fn template_yaml(config: &Config) -> String {
    format!(
        r#"# SQLite file holding stacks, versions and the command queue.
database: {database}
# Prefix for container, network and volume names and label keys.
prefix: {prefix}

# runtime:
#   runtime: docker   # or podman; auto-detected when omitted
#   socket: /var/run/docker.sock

timeouts:
  pull: {pull}
  exec: {exec}
  stop: {stop}

worker:
  poll_interval: {poll}
  error_backoff: {backoff}
"#,
        database = config.database.display(),
        prefix = config.prefix,
        pull = human(config.timeouts.pull),
        exec = human(config.timeouts.exec),
        stop = human(config.timeouts.stop),
        poll = human(config.worker.poll_interval),
        backoff = human(config.worker.error_backoff),
    )
}
