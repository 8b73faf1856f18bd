// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! cp-manager: the control-plane binary. Speaks newline-delimited JSON
//! over stdin/stdout to an operator process, and NATS/Redis/Postgres to
//! the rest of the fleet.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cp_adapters::bus::NatsBus;
use cp_adapters::cache::RedisCache;
use cp_core::id::UuidIdGen;
use cp_core::{Clock, SystemClock};
use cp_manager::{CliOverrides, Config, ListenCtx, ProcessContainerSpawner};
use cp_manager_runtime::ManagerRuntime;
use cp_storage::PgStore;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info, warn};

type Runtime = ManagerRuntime<NatsBus, RedisCache, PgStore, UuidIdGen, SystemClock>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        ParsedArgs::Help => {
            print_help();
            return Ok(());
        }
        ParsedArgs::Version => {
            println!("cp-manager {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        ParsedArgs::Run { config_path, overrides } => (config_path, overrides),
    };
    let (config_path, overrides) = cli;

    let config = Config::load(config_path.as_deref(), overrides)?;
    let _log_guard = setup_logging(&config);

    info!("starting cp-manager");

    let bus = NatsBus::connect(&config.adapters.nats_url).await?;
    let cache = RedisCache::connect(&config.adapters.redis_url).await?;
    let store = PgStore::connect(&config.adapters.postgres_url, config.adapters.postgres_max_connections).await?;
    store.run_migrations().await?;

    let runtime = Arc::new(Runtime::new(
        bus.clone(),
        cache,
        store.clone(),
        SystemClock,
        UuidIdGen,
        config.runtime.clone(),
    ));

    let subscription_handles = cp_manager::subscriptions::spawn_all(runtime.clone(), bus.clone(), SystemClock).await?;

    let shutdown = Arc::new(Notify::new());
    let sweep_handle = spawn_sweep_loop(runtime.clone(), config.runtime.health_check_interval);

    let container_spawner = ProcessContainerSpawner::new(worker_binary_path(), Vec::new());
    let ctx = Arc::new(ListenCtx {
        runtime: runtime.clone(),
        bus,
        store,
        container_spawner,
        clock: SystemClock,
        shutdown: shutdown.clone(),
    });

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let stdio_ctx = ctx.clone();
    let stdio_handle = tokio::spawn(async move {
        let mut reader = tokio::io::BufReader::new(tokio::io::stdin());
        let mut writer = tokio::io::stdout();
        cp_manager::listener::run_stdio(stdio_ctx, &mut reader, &mut writer).await
    });

    tokio::select! {
        result = stdio_handle => {
            match result {
                Ok(Ok(())) => info!("operator connection closed"),
                Ok(Err(e)) => error!(error = %e, "operator connection failed"),
                Err(e) => error!(error = %e, "operator listener task panicked"),
            }
        }
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
        _ = ctx.shutdown.notified() => info!("shutdown requested"),
    }

    shutdown.notify_waiters();
    sweep_handle.abort();
    for handle in subscription_handles {
        handle.abort();
    }
    if let Err(e) = runtime.shutdown().await {
        error!(error = %e, "error during graceful shutdown");
    }
    info!("cp-manager stopped");
    Ok(())
}

/// Worker binary launched by `spawn_worker_container` (§6). Overridable
/// via `CP_WORKER_BINARY` for deployments that install it elsewhere.
fn worker_binary_path() -> String {
    std::env::var("CP_WORKER_BINARY").unwrap_or_else(|_| "cp-worker".to_string())
}

/// Runs until aborted by the caller (§10.6 shutdown path); Tokio cancels
/// the in-flight sweep cleanly at its next `.await` point.
fn spawn_sweep_loop(runtime: Arc<Runtime>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let now_ms = SystemClock.epoch_ms();
            match runtime.run_periodic_sweep(now_ms).await {
                Ok(report) => tracing::debug!(?report, "periodic sweep complete"),
                Err(e) => warn!(error = %e, "periodic sweep failed"),
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
            "--postgres-url" => overrides.postgres_url = iter.next().cloned(),
            "--log-json" => overrides.log_json = true,
            other => {
                eprintln!("warning: ignoring unrecognized argument '{other}'");
            }
        }
    }
    ParsedArgs::Run { config_path, overrides }
}

fn print_help() {
    println!("cp-manager {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Control-plane process for a distributed task-execution fleet.");
    println!("Speaks newline-delimited JSON over stdin/stdout to one operator process.");
    println!();
    println!("USAGE:");
    println!("    cp-manager [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --config <PATH>         Load settings from a TOML file");
    println!("    --nats-url <URL>        Override the NATS connection URL");
    println!("    --redis-url <URL>       Override the Redis connection URL");
    println!("    --postgres-url <URL>    Override the Postgres connection URL");
    println!("    --log-json              Emit structured JSON logs");
    println!("    -h, --help              Print help information");
    println!("    -V, --version           Print version information");
}

/// Logs to stderr by default (stdout is the operator protocol's wire);
/// `config.log_path` redirects to a file instead, following the same
/// non-blocking-appender pattern either way.
fn setup_logging(config: &Config) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (non_blocking, guard) = match &config.log_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let file_name = path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("cp-manager.log"));
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
