//! Shared helpers for black-box binary specs.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Locates a workspace binary under `target/debug`. `assert_cmd`'s
/// `cargo_bin` only resolves binaries that belong to the same package as
/// the test (via `CARGO_BIN_EXE_*`), which this root test package never
/// builds — cp-manager and cp-worker live in their own workspace members.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    // Fallback: resolve relative to the test binary itself, which lives
    // at target/debug/deps/specs-<hash>.
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

pub fn manager_cmd() -> Command {
    Command::new(binary_path("cp-manager"))
}

pub fn worker_cmd() -> Command {
    Command::new(binary_path("cp-worker"))
}

/// A scratch directory holding nothing but a `--config`-supplied TOML
/// file, isolated per test.
pub struct ConfigDir {
    dir: tempfile::TempDir,
}

impl ConfigDir {
    pub fn with_toml(file_name: &str, contents: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir should succeed");
        std::fs::write(dir.path().join(file_name), contents).expect("write should succeed");
        Self { dir }
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.path().join(file_name)
    }
}

pub trait OutputExt {
    fn stdout_string(&self) -> String;
    fn stderr_string(&self) -> String;
}

impl OutputExt for Output {
    fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}
