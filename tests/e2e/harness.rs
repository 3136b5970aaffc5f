//! Subprocess harness for driving the compiled `sitegen` binary.

use std::process::{Command, Output};
use tempfile::TempDir;

/// The discard port; nothing answers there, so commands that would hit the
/// network fail fast instead of talking to anything real.
const UNREACHABLE_API_URL: &str = "http://127.0.0.1:9/";

pub struct CliTestHarness {
    config_dir: TempDir,
}

impl CliTestHarness {
    pub fn new() -> Self {
        Self {
            config_dir: TempDir::new().expect("create temp config dir"),
        }
    }

    /// Run `sitegen` with the given arguments against the isolated config
    /// directory and the unreachable API endpoint.
    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_sitegen"))
            .args(args)
            .env("SITEGEN_CONFIG_DIR", self.config_dir.path())
            .env("SITEGEN_API_URL", UNREACHABLE_API_URL)
            .output()
            .expect("spawn sitegen binary")
    }

    pub fn config_path(&self) -> std::path::PathBuf {
        self.config_dir.path().join("config.json")
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
