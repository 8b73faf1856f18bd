use crate::prelude::*;

#[test]
fn help_prints_usage_and_exits_zero() {
    let output = manager_cmd().arg("--help").output().expect("command should run");
    assert!(output.status.success());
    assert!(output.stdout_string().contains("cp-manager"));
}

#[test]
fn version_flag_prints_version_and_exits_zero() {
    let output = manager_cmd().arg("-V").output().expect("command should run");
    assert!(output.status.success());
    assert!(output.stdout_string().contains("cp-manager"));
}

#[test]
fn unrecognized_flag_is_ignored_with_a_warning() {
    // An unknown flag never short-circuits parsing, so it falls through to
    // an attempted startup, which fails fast on an unreachable NATS URL
    // instead of blocking on a real connection.
    let output = manager_cmd()
        .args(["--bogus-flag", "--nats-url", "nats://127.0.0.1:1"])
        .output()
        .expect("command should run");
    assert!(!output.status.success());
    assert!(output.stderr_string().contains("ignoring unrecognized argument"));
}

#[test]
fn malformed_config_file_is_a_descriptive_startup_error() {
    let dir = ConfigDir::with_toml("cp-manager.toml", "max_concurrent_tasks = [this is not valid toml");
    let output = manager_cmd()
        .arg("--config")
        .arg(dir.path("cp-manager.toml"))
        .output()
        .expect("command should run");
    assert!(!output.status.success());
    assert!(output.stderr_string().contains("ParseFile"));
}

#[test]
fn zero_retry_limit_is_rejected_before_any_network_call() {
    let dir = ConfigDir::with_toml("cp-manager.toml", "retry_limit = 0\n");
    let output = manager_cmd().arg("--config").arg(dir.path("cp-manager.toml")).output().expect("command should run");
    assert!(!output.status.success());
    assert!(output.stderr_string().contains("retry_limit"));
}
