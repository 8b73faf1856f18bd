// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker process configuration (§10.2): defaults, overlaid by an
//! optional TOML file, overlaid by environment variables, overlaid by
//! explicit CLI flags. Validated once at startup; failures are
//! descriptive errors, never a panic.

use cp_worker_runtime::WorkerRuntimeConfig;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Adapter connection settings (§6: `NATS_HOST/PORT`, `REDIS_HOST/PORT/PASSWORD`).
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub nats_url: String,
    pub redis_url: String,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self { nats_url: "nats://127.0.0.1:4222".to_string(), redis_url: "redis://127.0.0.1:6379".to_string() }
    }
}

/// Identity and capability settings resolved at startup (§4.2 step 1,
/// §6: `WORKER_ID`, `MAX_CONCURRENT_TASKS`, `MAX_MEMORY_MB`, `WORKER_TAGS`).
#[derive(Debug, Clone, Default)]
pub struct WorkerSettings {
    pub worker_id: Option<String>,
    pub tags: HashSet<String>,
    pub max_concurrent_tasks: u32,
    pub max_memory_mb: u32,
    /// Credentials forwarded verbatim to every spawned agent process
    /// (§6: "credentials for the external agent") — populated from any
    /// `AGENT_*` environment variable present at startup.
    pub agent_env: Vec<(String, String)>,
    /// External agent binary launched per task (§4.2 "Execution").
    /// Overridable for deployments that install it elsewhere.
    pub agent_program: String,
    pub agent_args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub adapters: AdapterConfig,
    pub worker: WorkerSettings,
    pub runtime: WorkerRuntimeConfig,
    pub log_path: Option<PathBuf>,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            adapters: AdapterConfig::default(),
            worker: WorkerSettings {
                max_concurrent_tasks: 4,
                max_memory_mb: 2048,
                agent_program: "cp-agent".to_string(),
                ..WorkerSettings::default()
            },
            runtime: WorkerRuntimeConfig::default(),
            log_path: None,
            log_json: false,
        }
    }
}

/// Mirrors [`Config`] but every field is optional, for layering a TOML
/// file on top of defaults without having to re-specify every field.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, rename_all = "snake_case")]
struct RawConfig {
    nats_url: Option<String>,
    redis_url: Option<String>,
    worker_id: Option<String>,
    tags: Option<Vec<String>>,
    max_concurrent_tasks: Option<u32>,
    max_memory_mb: Option<u32>,
    heartbeat_interval_ms: Option<u64>,
    progress_report_interval_ms: Option<u64>,
    shutdown_deadline_ms: Option<u64>,
    registration_ack_timeout_ms: Option<u64>,
    claim_grace_ms: Option<u64>,
    kill_grace_ms: Option<u64>,
    log_path: Option<PathBuf>,
    log_json: Option<bool>,
    agent_program: Option<String>,
    agent_args: Option<Vec<String>>,
}

impl RawConfig {
    fn merge_onto(self, config: &mut Config) {
        if let Some(v) = self.nats_url {
            config.adapters.nats_url = v;
        }
        if let Some(v) = self.redis_url {
            config.adapters.redis_url = v;
        }
        if let Some(v) = self.worker_id {
            config.worker.worker_id = Some(v);
        }
        if let Some(v) = self.tags {
            config.worker.tags = v.into_iter().collect();
        }
        if let Some(v) = self.max_concurrent_tasks {
            config.worker.max_concurrent_tasks = v;
        }
        if let Some(v) = self.max_memory_mb {
            config.worker.max_memory_mb = v;
        }
        if let Some(v) = self.heartbeat_interval_ms {
            config.runtime.heartbeat_interval = Duration::from_millis(v);
        }
        if let Some(v) = self.progress_report_interval_ms {
            config.runtime.progress_report_interval = Duration::from_millis(v);
        }
        if let Some(v) = self.shutdown_deadline_ms {
            config.runtime.shutdown_deadline = Duration::from_millis(v);
        }
        if let Some(v) = self.registration_ack_timeout_ms {
            config.runtime.registration_ack_timeout = Duration::from_millis(v);
        }
        if let Some(v) = self.claim_grace_ms {
            config.runtime.claim_grace = Duration::from_millis(v);
        }
        if let Some(v) = self.kill_grace_ms {
            config.runtime.kill_grace = Duration::from_millis(v);
        }
        if let Some(v) = self.log_path {
            config.log_path = Some(v);
        }
        if let Some(v) = self.log_json {
            config.log_json = v;
        }
        if let Some(v) = self.agent_program {
            config.worker.agent_program = v;
        }
        if let Some(v) = self.agent_args {
            config.worker.agent_args = v;
        }
    }
}

/// Environment variables consulted after the config file, before CLI
/// flags (§6, §10.2).
fn env_overlay(config: &mut Config) -> Result<(), ConfigError> {
    if let Ok(v) = std::env::var("WORKER_ID") {
        if !v.is_empty() {
            config.worker.worker_id = Some(v);
        }
    }
    let manager_host = std::env::var("MANAGER_HOST").ok();
    if let Ok(v) = std::env::var("NATS_HOST") {
        let port = std::env::var("NATS_PORT").unwrap_or_else(|_| "4222".to_string());
        config.adapters.nats_url = format!("nats://{v}:{port}");
    } else if let Some(host) = &manager_host {
        let port = std::env::var("NATS_PORT").unwrap_or_else(|_| "4222".to_string());
        config.adapters.nats_url = format!("nats://{host}:{port}");
    }
    if let Ok(v) = std::env::var("REDIS_HOST") {
        let port = std::env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
        match std::env::var("REDIS_PASSWORD") {
            Ok(password) if !password.is_empty() => {
                config.adapters.redis_url = format!("redis://:{password}@{v}:{port}");
            }
            _ => config.adapters.redis_url = format!("redis://{v}:{port}"),
        }
    } else if let Some(host) = &manager_host {
        let port = std::env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
        config.adapters.redis_url = format!("redis://{host}:{port}");
    }
    if let Ok(v) = std::env::var("MAX_CONCURRENT_TASKS") {
        config.worker.max_concurrent_tasks =
            v.parse().map_err(|_| ConfigError::Invalid { field: "MAX_CONCURRENT_TASKS", reason: v })?;
    }
    if let Ok(v) = std::env::var("MAX_MEMORY_MB") {
        config.worker.max_memory_mb = v.parse().map_err(|_| ConfigError::Invalid { field: "MAX_MEMORY_MB", reason: v })?;
    }
    if let Ok(v) = std::env::var("WORKER_TAGS") {
        config.worker.tags = v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
    }
    if let Ok(v) = std::env::var("HEARTBEAT_INTERVAL_MS") {
        let ms: u64 = v.parse().map_err(|_| ConfigError::Invalid { field: "HEARTBEAT_INTERVAL_MS", reason: v })?;
        config.runtime.heartbeat_interval = Duration::from_millis(ms);
    }
    if let Ok(v) = std::env::var("CP_WORKER_LOG_JSON") {
        config.log_json = v == "1" || v.eq_ignore_ascii_case("true");
    }
    if let Ok(v) = std::env::var("AGENT_PROGRAM") {
        if !v.is_empty() {
            config.worker.agent_program = v;
        }
    }
    if let Ok(v) = std::env::var("AGENT_ARGS") {
        config.worker.agent_args = v.split_whitespace().map(str::to_string).collect();
    }
    config.worker.agent_env =
        std::env::vars().filter(|(k, _)| k.starts_with("AGENT_") && k != "AGENT_PROGRAM" && k != "AGENT_ARGS").collect();
    Ok(())
}

impl Config {
    /// Layered load: built-in defaults, then `config_path` (or
    /// `$WORKER_CONFIG_PATH`, or `./cp-worker.toml` if present), then
    /// environment variables, then `cli_overrides`.
    pub fn load(config_path: Option<&Path>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        let explicit_path =
            config_path.map(Path::to_path_buf).or_else(|| std::env::var("WORKER_CONFIG_PATH").ok().map(PathBuf::from));
        let file_path = match explicit_path {
            Some(path) => Some(path),
            None => Some(PathBuf::from("cp-worker.toml")).filter(|p| p.exists()),
        };
        if let Some(path) = file_path {
            let contents =
                std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile { path: path.clone(), source })?;
            let raw: RawConfig = toml::from_str(&contents).map_err(|source| ConfigError::ParseFile { path, source })?;
            raw.merge_onto(&mut config);
        }

        env_overlay(&mut config)?;
        cli_overrides.apply(&mut config);

        if config.worker.max_concurrent_tasks == 0 {
            return Err(ConfigError::Invalid { field: "max_concurrent_tasks", reason: "must be at least 1".to_string() });
        }
        Ok(config)
    }
}

/// Explicit command-line flag overrides, applied last (§10.2).
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub nats_url: Option<String>,
    pub redis_url: Option<String>,
    pub worker_id: Option<String>,
    pub log_json: bool,
}

impl CliOverrides {
    fn apply(self, config: &mut Config) {
        if let Some(v) = self.nats_url {
            config.adapters.nats_url = v;
        }
        if let Some(v) = self.redis_url {
            config.adapters.redis_url = v;
        }
        if let Some(v) = self.worker_id {
            config.worker.worker_id = Some(v);
        }
        if self.log_json {
            config.log_json = true;
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
