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
        parse_args(&args(&["--config", "/etc/cp-worker.toml", "--worker-id", "w-1", "--log-json"]))
    else {
        panic!("expected ParsedArgs::Run")
    };
    assert_eq!(config_path, Some(PathBuf::from("/etc/cp-worker.toml")));
    assert_eq!(overrides.worker_id, Some("w-1".to_string()));
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
fn system_info_reports_configured_memory_capacity() {
    let config = Config::default();
    let info = system_info(&config);
    assert_eq!(info.total_memory_mb, config.worker.max_memory_mb);
    assert!(info.cpu_count >= 1);
}
