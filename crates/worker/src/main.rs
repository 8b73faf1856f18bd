// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! cp-worker: the agent-hosting process. Registers with the control
//! plane over NATS/Redis, accepts task assignments, and spawns one
//! external agent process per task.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::sync::Arc;

use cp_adapters::agent::{AgentProcessConfig, ChildAgentProcess};
use cp_adapters::bus::NatsBus;
use cp_adapters::cache::RedisCache;
use cp_core::{SystemClock, WorkerCapabilities, WorkerSystemInfo};
use cp_worker::config::{CliOverrides, Config};
use cp_worker_runtime::{WorkerIdentity, WorkerRuntime};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

type Runtime = WorkerRuntime<NatsBus, RedisCache, ChildAgentProcess, SystemClock>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        ParsedArgs::Help => {
            print_help();
            return Ok(());
        }
        ParsedArgs::Version => {
            println!("cp-worker {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        ParsedArgs::Run { config_path, overrides } => (config_path, overrides),
    };
    let (config_path, overrides) = cli;

    let config = Config::load(config_path.as_deref(), overrides)?;
    let _log_guard = setup_logging(&config);

    info!("starting cp-worker");

    let worker_id = cp_worker::identity::resolve(config.worker.worker_id.clone());
    let bus = NatsBus::connect(&config.adapters.nats_url).await?;
    let cache = RedisCache::connect(&config.adapters.redis_url).await?;
    let agent = ChildAgentProcess::new(AgentProcessConfig {
        program: config.worker.agent_program.clone(),
        args: config.worker.agent_args.clone(),
    });

    let identity = WorkerIdentity {
        worker_id,
        hostname: gethostname::gethostname().to_string_lossy().into_owned(),
        tags: config.worker.tags.clone(),
        capabilities: WorkerCapabilities {
            max_concurrent_tasks: config.worker.max_concurrent_tasks,
            max_memory_mb: config.worker.max_memory_mb,
            feature_tags: config.worker.tags.clone(),
        },
        agent_env: config.worker.agent_env.clone(),
    };

    let runtime = Arc::new(Runtime::new(bus.clone(), cache, agent, SystemClock, identity, config.runtime.clone()));

    let system_info = system_info(&config);
    runtime.publish_registration(system_info.clone(), epoch_ms()).await?;

    let subscription_handles = cp_worker::subscriptions::spawn_all(runtime.clone(), bus, SystemClock).await?;
    let heartbeat_handle = spawn_heartbeat_loop(runtime.clone(), system_info, config.runtime.heartbeat_interval);

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    heartbeat_handle.abort();
    for handle in subscription_handles {
        handle.abort();
    }
    runtime.shutdown().await;
    info!("cp-worker stopped");
    Ok(())
}

fn epoch_ms() -> u64 {
    use cp_core::Clock;
    SystemClock.epoch_ms()
}

/// Best-effort host snapshot attached to registration and every
/// heartbeat (§4.2). `total_memory_mb` mirrors the configured capacity
/// rather than querying the OS, since this process has no portable way
/// to measure total host memory without an added dependency.
fn system_info(config: &Config) -> WorkerSystemInfo {
    let cpu_count = std::thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(1);
    WorkerSystemInfo { os: std::env::consts::OS.to_string(), cpu_count, total_memory_mb: config.worker.max_memory_mb }
}

fn spawn_heartbeat_loop(
    runtime: Arc<Runtime>,
    system_info: WorkerSystemInfo,
    interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = runtime.publish_heartbeat(system_info.clone(), epoch_ms()).await {
                error!(error = %e, "heartbeat publish failed");
            }
        }
    })
}

enum ParsedArgs {
    Help,
    Version,
    Run { config_path: Option<PathBuf>, overrides: CliOverrides },
}

fn parse_args(args: &[String]) -> ParsedArgs {
    let mut config_path = None;
    let mut overrides = CliOverrides::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => return ParsedArgs::Help,
            "--version" | "-V" => return ParsedArgs::Version,
            "--config" => config_path = iter.next().map(PathBuf::from),
            "--nats-url" => overrides.nats_url = iter.next().cloned(),
            "--redis-url" => overrides.redis_url = iter.next().cloned(),
            "--worker-id" => overrides.worker_id = iter.next().cloned(),
            "--log-json" => overrides.log_json = true,
            other => {
                eprintln!("warning: ignoring unrecognized argument '{other}'");
            }
        }
    }
    ParsedArgs::Run { config_path, overrides }
}

fn print_help() {
    println!("cp-worker {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Agent-hosting process for a distributed task-execution fleet.");
    println!();
    println!("USAGE:");
    println!("    cp-worker [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --config <PATH>       Load settings from a TOML file");
    println!("    --nats-url <URL>      Override the NATS connection URL");
    println!("    --redis-url <URL>     Override the Redis connection URL");
    println!("    --worker-id <ID>      Override the resolved worker identity");
    println!("    --log-json            Emit structured JSON logs");
    println!("    -h, --help            Print help information");
    println!("    -V, --version         Print version information");
}

/// Logs to stderr by default; `config.log_path` redirects to a file
/// instead, following the same non-blocking-appender pattern either way.
fn setup_logging(config: &Config) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (non_blocking, guard) = match &config.log_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let file_name = path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("cp-worker.log"));
            let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
            let appender = tracing_appender::rolling::never(parent, file_name);
            tracing_appender::non_blocking(appender)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry.with(fmt::layer().with_writer(non_blocking).json()).init();
    } else {
        registry.with(fmt::layer().with_writer(non_blocking)).init();
    }

    guard
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
