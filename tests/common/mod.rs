//! Common test utilities for bugtrail integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's `~/.local/share/bugtrail/` directory or pick up their
//! `~/.config/bugtrail/config.kdl`.

#![allow(dead_code)]

use assert_cmd::Command;
pub use tempfile::TempDir;

/// A test environment with isolated data storage.
///
/// Each `TestEnv` creates two temporary directories:
/// - `repo_dir`: Acts as the repository root
/// - `data_dir`: Holds bugtrail's data (via `BT_DATA_DIR`) and a private
///   config directory (via `XDG_CONFIG_HOME`)
///
/// Environment is set per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub repo_dir: TempDir,
    pub data_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with isolated directories.
    pub fn new() -> Self {
        Self {
            repo_dir: TempDir::new().unwrap(),
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a new test environment and initialize bugtrail.
    pub fn init() -> Self {
        let env = Self::new();
        env.bt().args(["system", "init"]).assert().success();
        env
    }

    /// Get a Command for the bt binary with isolated data and config directories.
    pub fn bt(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_bt"));
        cmd.current_dir(self.repo_dir.path());
        cmd.env("BT_DATA_DIR", self.data_dir.path());
        cmd.env("XDG_CONFIG_HOME", self.data_dir.path().join("config"));
        cmd.env_remove("BT_ACTOR");
        cmd.env_remove("BT_REPO");
        cmd.env_remove("BT_LOG");
        cmd
    }

    /// A bt command acting as `actor`.
    pub fn bt_as(&self, actor: &str) -> Command {
        let mut cmd = self.bt();
        cmd.env("BT_ACTOR", actor);
        cmd
    }

    /// Run a command as `actor`, assert success and parse its JSON output.
    pub fn json(&self, actor: &str, args: &[&str]) -> serde_json::Value {
        let output = self.bt_as(actor).args(args).output().unwrap();
        assert!(
            output.status.success(),
            "bt {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    /// Run a command as `actor`, assert failure and parse the JSON error.
    pub fn json_err(&self, actor: &str, args: &[&str]) -> serde_json::Value {
        let output = self.bt_as(actor).args(args).output().unwrap();
        assert!(
            !output.status.success(),
            "bt {:?} unexpectedly succeeded: {}",
            args,
            String::from_utf8_lossy(&output.stdout)
        );
        serde_json::from_slice(&output.stderr).unwrap()
    }

    /// File a bug as `alice` and return its id.
    pub fn report(&self, title: &str) -> String {
        let bug = self.json("alice", &["report", title, "-d", "Something broke"]);
        bug["id"].as_str().unwrap().to_string()
    }

    /// File a bug, triage it and assign it to `assignee`.
    pub fn assigned(&self, title: &str, severity: &str, assignee: &str) -> String {
        let id = self.report(title);
        self.json(
            "mona",
            &["manager", "triage", &id, "-s", severity, "-c", "Backend"],
        );
        self.json("mona", &["manager", "assign", &id, "--to", assignee]);
        id
    }

    /// Get the path to the repo directory.
    pub fn path(&self) -> &std::path::Path {
        self.repo_dir.path()
    }

    /// Get the path to the data directory.
    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
