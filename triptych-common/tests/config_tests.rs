//! Tests for configuration loading and root folder resolution
//!
//! Uses serial_test: tests touching TRIPTYCH_* environment variables run
//! sequentially.

use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use triptych_common::config::{
    load_toml_config, prepare_root_folder, resolve_root_folder, TomlConfig, CONFIG_PATH_ENV,
    DATABASE_FILE, ROOT_FOLDER_ENV,
};

#[test]
fn test_defaults_when_file_missing() {
    let config = load_toml_config(Some(Path::new("/nonexistent/triptych/config.toml"))).unwrap();

    assert_eq!(config.logging.level, "info");
    assert_eq!(config.curation.exposure_window_days, 14);
    assert_eq!(config.curation.arc_target_days, 7);
    assert!(config.generation.api_key.is_none());
    assert!(config.catalog.musicbrainz_url.starts_with("https://musicbrainz.org"));
}

#[test]
fn test_partial_file_fills_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
port = 6000

[logging]
level = "debug"

[curation]
exposure_window_days = 21
"#
    )
    .unwrap();

    let config = load_toml_config(Some(file.path())).unwrap();

    assert_eq!(config.port, Some(6000));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.curation.exposure_window_days, 21);
    assert_eq!(config.curation.arc_target_days, 7);
    assert_eq!(config.generation.max_tokens, 2048);
}

#[test]
fn test_malformed_file_is_config_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "port = \"not a number").unwrap();

    let result = load_toml_config(Some(file.path()));
    assert!(matches!(result, Err(triptych_common::Error::Config(_))));
}

#[test]
fn test_out_of_range_curation_values_are_config_errors() {
    for body in [
        "[curation]\nexposure_window_days = 0\n",
        "[curation]\nexposure_window_days = 200000000\n",
        "[curation]\narc_target_days = 0\n",
    ] {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", body).unwrap();

        let result = load_toml_config(Some(file.path()));
        assert!(
            matches!(result, Err(triptych_common::Error::Config(_))),
            "accepted {:?}",
            body
        );
    }
}

#[test]
#[serial]
fn test_config_path_from_environment() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[generation]\napi_key = \"from-env-file\"").unwrap();

    env::set_var(CONFIG_PATH_ENV, file.path());
    let config = load_toml_config(None).unwrap();
    env::remove_var(CONFIG_PATH_ENV);

    assert_eq!(config.generation.api_key.as_deref(), Some("from-env-file"));
}

#[test]
#[serial]
fn test_root_folder_cli_wins() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..TomlConfig::default()
    };

    let resolved = resolve_root_folder(Some(Path::new("/from/cli")), &toml);
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/cli"));
}

#[test]
#[serial]
fn test_root_folder_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..TomlConfig::default()
    };

    let resolved = resolve_root_folder(None, &toml);
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/env"));
}

#[test]
#[serial]
fn test_root_folder_toml_then_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..TomlConfig::default()
    };
    assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/from/toml"));

    let fallback = resolve_root_folder(None, &TomlConfig::default());
    assert!(fallback.to_string_lossy().contains("triptych"));
}

#[test]
fn test_prepare_root_folder_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("data");

    let db_path = prepare_root_folder(&root).unwrap();

    assert!(root.is_dir());
    assert_eq!(db_path, root.join(DATABASE_FILE));
}
