// ABOUTME: Integration tests for the stackyard CLI commands.
// ABOUTME: Drives init, stacks, versions and the command queue against a temp SQLite file.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

mod support;

fn stackyard_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("stackyard"));
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

/// A directory with a config file and one stack holding one version.
fn workspace_with_version() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    stackyard_cmd(dir.path()).arg("init").assert().success();
    stackyard_cmd(dir.path())
        .args(["stack", "create", "shop", "--name", "Shop"])
        .assert()
        .success();

    let body = serde_yaml::to_string(&support::web_db_body()).unwrap();
    fs::write(dir.path().join("shop.yml"), body).unwrap();
    stackyard_cmd(dir.path())
        .args(["version", "create", "shop", "--file", "shop.yml", "--label", "v1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created version v1 of shop"));
    dir
}

#[test]
fn help_shows_commands() {
    let dir = tempfile::tempdir().unwrap();
    stackyard_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("worker"));
}

mod init {
    use super::*;

    #[test]
    fn creates_config_file() {
        let dir = tempfile::tempdir().unwrap();
        stackyard_cmd(dir.path())
            .args(["init", "--prefix", "sy"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Wrote stackyard.yml"));

        let content = fs::read_to_string(dir.path().join("stackyard.yml")).unwrap();
        assert!(content.contains("prefix: sy"));
        assert!(content.contains("poll_interval: 250ms"));
    }

    #[test]
    fn refuses_to_overwrite_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("stackyard.yml"), "prefix: mine\n").unwrap();

        stackyard_cmd(dir.path())
            .arg("init")
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));

        stackyard_cmd(dir.path())
            .args(["init", "--force"])
            .assert()
            .success();
    }

    #[test]
    fn invalid_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("stackyard.yml"), "logs:\n  page_size: 0\n").unwrap();

        stackyard_cmd(dir.path())
            .args(["stack", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("logs.page_size must be at least 1"));
    }
}

mod stacks {
    use super::*;

    #[test]
    fn create_list_and_show() {
        let dir = workspace_with_version();

        stackyard_cmd(dir.path())
            .args(["stack", "list", "--quiet"])
            .assert()
            .success()
            .stdout("shop\n");

        stackyard_cmd(dir.path())
            .args(["stack", "show", "shop"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Stack:    shop (Shop)"))
            .stdout(predicate::str::contains("Applied:  (none)"))
            .stdout(predicate::str::contains("Latest:   v1"));
    }

    #[test]
    fn invalid_stack_id_fails() {
        let dir = tempfile::tempdir().unwrap();
        stackyard_cmd(dir.path())
            .args(["stack", "create", "Not Valid"])
            .assert()
            .failure()
            .stderr(predicate::str::starts_with("Error: "));
    }

    #[test]
    fn unchanged_body_reuses_the_version() {
        let dir = workspace_with_version();
        stackyard_cmd(dir.path())
            .args(["version", "create", "shop", "--file", "shop.yml"])
            .assert()
            .success()
            .stdout(predicate::str::contains("latest version v1 of shop reused"));

        stackyard_cmd(dir.path())
            .args(["version", "list", "shop", "--quiet"])
            .assert()
            .success()
            .stdout("v1\n");
    }

    #[test]
    fn version_show_prints_the_canonical_body() {
        let dir = workspace_with_version();
        let output = stackyard_cmd(dir.path())
            .args(["version", "show", "shop", "v1"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(body, support::web_db_body());
    }
}

mod queue {
    use super::*;

    #[test]
    fn apply_defaults_to_the_latest_version() {
        let dir = workspace_with_version();

        stackyard_cmd(dir.path())
            .args(["apply", "shop"])
            .assert()
            .success()
            .stdout("Queued command 1 (PENDING)\n");

        stackyard_cmd(dir.path())
            .args(["command", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Type:     APPLY_STACK_VERSION"))
            .stdout(predicate::str::contains(r#"Payload:  {"version":"v1"}"#));
    }

    #[test]
    fn apply_without_versions_fails() {
        let dir = tempfile::tempdir().unwrap();
        stackyard_cmd(dir.path())
            .args(["stack", "create", "empty"])
            .assert()
            .success();

        stackyard_cmd(dir.path())
            .args(["apply", "empty"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("stack empty has no versions"));
    }

    #[test]
    fn cancel_only_once() {
        let dir = workspace_with_version();
        stackyard_cmd(dir.path())
            .args(["--quiet", "stop", "shop"])
            .assert()
            .success()
            .stdout("1\n");

        stackyard_cmd(dir.path())
            .args(["cancel", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Cancelled command 1"));

        stackyard_cmd(dir.path())
            .args(["cancel", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("cannot be cancelled"));

        stackyard_cmd(dir.path())
            .args(["cancel", "42"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("command 42 not found"));
    }

    #[test]
    fn commands_lists_newest_first_as_json() {
        let dir = workspace_with_version();
        stackyard_cmd(dir.path()).args(["start", "shop"]).assert().success();
        stackyard_cmd(dir.path())
            .args(["deploy", "shop", "web", "--", "echo", "hi"])
            .assert()
            .success();

        let output = stackyard_cmd(dir.path())
            .args(["commands", "--json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let rows: Vec<serde_json::Value> = String::from_utf8(output.stdout)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["command_type"], "DEPLOY_APP");
        assert_eq!(rows[1]["command_type"], "START_STACK");
        assert_eq!(rows[1]["status"], "PENDING");
    }

    #[test]
    fn logs_of_unknown_command_fail() {
        let dir = workspace_with_version();
        stackyard_cmd(dir.path())
            .args(["logs", "7"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("command 7 not found"));
    }
}
