use super::*;

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[test]
fn help_flag_short_circuits_before_config() {
    assert!(matches!(parse_args(&args(&["--help"])), ParsedArgs::Help));
    assert!(matches!(parse_args(&args(&["-h"])), ParsedArgs::Help));
}

#[test]
fn version_flag_short_circuits_before_config() {
    assert!(matches!(parse_args(&args(&["--version"])), ParsedArgs::Version));
    assert!(matches!(parse_args(&args(&["-V"])), ParsedArgs::Version));
}

#[test]
fn config_and_override_flags_are_collected() {
    let ParsedArgs::Run { config_path, overrides } =
        parse_args(&args(&["--config", "/etc/cp-manager.toml", "--nats-url", "nats://n:4222", "--log-json"]))
    else {
        panic!("expected ParsedArgs::Run")
    };
    assert_eq!(config_path, Some(PathBuf::from("/etc/cp-manager.toml")));
    assert_eq!(overrides.nats_url, Some("nats://n:4222".to_string()));
    assert!(overrides.log_json);
}

#[test]
fn unrecognized_flags_do_not_abort_parsing() {
    let ParsedArgs::Run { config_path, .. } = parse_args(&args(&["--bogus", "--config", "c.toml"])) else {
        panic!("expected ParsedArgs::Run")
    };
    assert_eq!(config_path, Some(PathBuf::from("c.toml")));
}

#[test]
fn worker_binary_path_defaults_when_env_unset() {
    std::env::remove_var("CP_WORKER_BINARY");
    assert_eq!(worker_binary_path(), "cp-worker");
}
