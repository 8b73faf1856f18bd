// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manager process configuration (§10.2): defaults, overlaid by an
//! optional TOML file, overlaid by environment variables, overlaid by
//! explicit CLI flags. Validated once at startup; failures are
//! descriptive errors, never a panic.

use cp_manager_runtime::ManagerRuntimeConfig;
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

/// Adapter connection settings, distinct from the tunables in
/// [`ManagerRuntimeConfig`] because they name external endpoints rather
/// than control-plane behavior.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub nats_url: String,
    pub redis_url: String,
    pub postgres_url: String,
    pub postgres_max_connections: u32,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://127.0.0.1:4222".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            postgres_url: "postgres://localhost/cp_manager".to_string(),
            postgres_max_connections: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub adapters: AdapterConfig,
    pub runtime: ManagerRuntimeConfig,
    pub log_path: Option<PathBuf>,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            adapters: AdapterConfig::default(),
            runtime: ManagerRuntimeConfig::default(),
            log_path: None,
            log_json: false,
        }
    }
}

/// Mirrors [`Config`] but every field is optional, for layering a TOML
/// file and environment variables on top of defaults without having to
/// re-specify every field.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, rename_all = "snake_case")]
struct RawConfig {
    nats_url: Option<String>,
    redis_url: Option<String>,
    postgres_url: Option<String>,
    postgres_max_connections: Option<u32>,
    health_check_interval_ms: Option<u64>,
    worker_timeout_ms: Option<u64>,
    offline_grace_ms: Option<u64>,
    dispatch_ack_deadline_ms: Option<u64>,
    retry_limit: Option<u32>,
    question_deadline_ms: Option<u64>,
    bus_reply_timeout_ms: Option<u64>,
    shutdown_deadline_ms: Option<u64>,
    durable_buffer_limit: Option<usize>,
    progress_cache_ttl_ms: Option<u64>,
    timeline_max_len: Option<i64>,
    log_path: Option<PathBuf>,
    log_json: Option<bool>,
}

impl RawConfig {
    fn merge_onto(self, config: &mut Config) {
        if let Some(v) = self.nats_url {
            config.adapters.nats_url = v;
        }
        if let Some(v) = self.redis_url {
            config.adapters.redis_url = v;
        }
        if let Some(v) = self.postgres_url {
            config.adapters.postgres_url = v;
        }
        if let Some(v) = self.postgres_max_connections {
            config.adapters.postgres_max_connections = v;
        }
        if let Some(v) = self.health_check_interval_ms {
            config.runtime.health_check_interval = Duration::from_millis(v);
        }
        if let Some(v) = self.worker_timeout_ms {
            config.runtime.worker_timeout = Duration::from_millis(v);
        }
        if let Some(v) = self.offline_grace_ms {
            config.runtime.offline_grace = Duration::from_millis(v);
        }
        if let Some(v) = self.dispatch_ack_deadline_ms {
            config.runtime.dispatch_ack_deadline = Duration::from_millis(v);
        }
        if let Some(v) = self.retry_limit {
            config.runtime.retry_limit = v;
        }
        if let Some(v) = self.question_deadline_ms {
            config.runtime.question_deadline = Duration::from_millis(v);
        }
        if let Some(v) = self.bus_reply_timeout_ms {
            config.runtime.bus_reply_timeout = Duration::from_millis(v);
        }
        if let Some(v) = self.shutdown_deadline_ms {
            config.runtime.shutdown_deadline = Duration::from_millis(v);
        }
        if let Some(v) = self.durable_buffer_limit {
            config.runtime.durable_buffer_limit = v;
        }
        if let Some(v) = self.progress_cache_ttl_ms {
            config.runtime.progress_cache_ttl = Duration::from_millis(v);
        }
        if let Some(v) = self.timeline_max_len {
            config.runtime.timeline_max_len = v;
        }
        if let Some(v) = self.log_path {
            config.log_path = Some(v);
        }
        if let Some(v) = self.log_json {
            config.log_json = v;
        }
    }
}

/// Environment variables consulted after the config file, before CLI
/// flags (§6, §10.2). Names mirror the ones a deployment's container
/// orchestrator is most likely to already set.
fn env_overlay(config: &mut Config) -> Result<(), ConfigError> {
    if let Ok(v) = std::env::var("NATS_HOST") {
        let port = std::env::var("NATS_PORT").unwrap_or_else(|_| "4222".to_string());
        config.adapters.nats_url = format!("nats://{v}:{port}");
    }
    if let Ok(v) = std::env::var("REDIS_HOST") {
        let port = std::env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
        match std::env::var("REDIS_PASSWORD") {
            Ok(password) if !password.is_empty() => {
                config.adapters.redis_url = format!("redis://:{password}@{v}:{port}");
            }
            _ => config.adapters.redis_url = format!("redis://{v}:{port}"),
        }
    }
    if let Ok(v) = std::env::var("POSTGRES_URL") {
        config.adapters.postgres_url = v;
    }
    if let Ok(v) = std::env::var("POSTGRES_MAX_CONNECTIONS") {
        config.adapters.postgres_max_connections =
            v.parse().map_err(|_| ConfigError::Invalid { field: "POSTGRES_MAX_CONNECTIONS", reason: v })?;
    }
    if let Ok(v) = std::env::var("RETRY_LIMIT") {
        config.runtime.retry_limit = v.parse().map_err(|_| ConfigError::Invalid { field: "RETRY_LIMIT", reason: v })?;
    }
    if let Ok(v) = std::env::var("MANAGER_LOG_JSON") {
        config.log_json = v == "1" || v.eq_ignore_ascii_case("true");
    }
    Ok(())
}

impl Config {
    /// Layered load: built-in defaults, then `config_path` (or
    /// `$MANAGER_CONFIG_PATH`, or `./cp-manager.toml` if present), then
    /// environment variables, then `cli_overrides`.
    pub fn load(config_path: Option<&Path>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // An explicit path (argument or $MANAGER_CONFIG_PATH) must exist;
        // the implicit default `./cp-manager.toml` is silently optional.
        let explicit_path =
            config_path.map(Path::to_path_buf).or_else(|| std::env::var("MANAGER_CONFIG_PATH").ok().map(PathBuf::from));
        let file_path = match explicit_path {
            Some(path) => Some(path),
            None => Some(PathBuf::from("cp-manager.toml")).filter(|p| p.exists()),
        };
        if let Some(path) = file_path {
            let contents =
                std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile { path: path.clone(), source })?;
            let raw: RawConfig = toml::from_str(&contents).map_err(|source| ConfigError::ParseFile { path, source })?;
            raw.merge_onto(&mut config);
        }

        env_overlay(&mut config)?;
        cli_overrides.apply(&mut config);

        if config.runtime.retry_limit == 0 {
            return Err(ConfigError::Invalid { field: "retry_limit", reason: "must be at least 1".to_string() });
        }
        Ok(config)
    }
}

/// Explicit command-line flag overrides, applied last (§10.2).
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub nats_url: Option<String>,
    pub redis_url: Option<String>,
    pub postgres_url: Option<String>,
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
        if let Some(v) = self.postgres_url {
            config.adapters.postgres_url = v;
        }
        if self.log_json {
            config.log_json = true;
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
