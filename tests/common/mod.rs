//! Common test utilities for jds6600-controller tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// Creates a temporary directory holding `commands.csv`
pub fn create_commands_file(content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("commands.csv");
    std::fs::write(&path, content).expect("Failed to write commands file");
    (dir, path)
}

/// The binary, isolated from the user's config and settings
///
/// Runs inside `dir`; config lookups and `settings.json` stay in there.
pub fn controller(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("jds6600-controller").expect("binary should be built");
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join("config"))
        .env("JDS6600_STATE__SETTINGS_PATH", dir.join("settings.json"))
        .env_remove("RUST_LOG")
        .arg("--no-interactive");
    cmd
}

/// A short program touching every command
pub const SAMPLE_COMMANDS: &str = r#"# warm up
freq,1000,{"waveform":"sine","amplitude":5}
wait,10
cycle,[100,200,300],on=2,off=1,pause_hz=0
mod,100,1000,1,rise,false,false
stop
wait,5
"#;

/// Sample with a syntax error on line 3
pub const BROKEN_COMMANDS: &str = "freq,1000\nwait,1\nfreqq,2000\n";
