//! Configuration resolution and graceful degradation tests
//!
//! Tests that manipulate SBWS_CONFIG are marked with #[serial] so they run
//! sequentially, not in parallel.

use std::env;
use std::io::Write;
use std::path::PathBuf;

use sbws_common::config::{
    load_config, read_toml_config, resolve_config_source, ConfigSource, TieBreak, CONFIG_ENV_VAR,
};
use sbws_common::Error;
use serial_test::serial;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/sbws-env-config.toml");

    let source = resolve_config_source(Some(PathBuf::from("/tmp/cli.toml").as_path()));
    assert_eq!(source, ConfigSource::CommandLine(PathBuf::from("/tmp/cli.toml")));

    // Cleanup
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_argument() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/sbws-env-config.toml");

    let source = resolve_config_source(None);
    assert_eq!(
        source,
        ConfigSource::Environment(PathBuf::from("/tmp/sbws-env-config.toml"))
    );

    // Cleanup
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_config_file_is_loaded() {
    let file = write_config(
        r#"
        excluded_lfs = ["small_video", "hacking"]
        ground_truth = false

        [model]
        seed = 7
        "#,
    );
    env::set_var(CONFIG_ENV_VAR, file.path());

    let config = load_config(None).unwrap();
    assert_eq!(config.excluded_lfs.len(), 2);
    assert!(!config.ground_truth);
    assert_eq!(config.model.seed, 7);
    assert_eq!(config.model.epochs, 500);

    // Cleanup
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_explicit_missing_file_is_configuration_error() {
    env::remove_var(CONFIG_ENV_VAR);

    let result = load_config(Some(PathBuf::from("/nonexistent/sbws/config.toml").as_path()));
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn test_invalid_toml_is_configuration_error() {
    let file = write_config("[model\nepochs = ");
    let result = read_toml_config(file.path());
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn test_tie_break_and_logging_parse() {
    let file = write_config(
        r#"
        [model]
        tie_break = "abstain"

        [logging]
        level = "debug"
        "#,
    );
    let config = read_toml_config(file.path()).unwrap();
    assert_eq!(config.model.tie_break, TieBreak::Abstain);
    assert_eq!(config.logging.level, "debug");
}
