// Config file resolution through a real TOML file on disk

use draw_engine::config::{ENV_CONFIG_PATH, ENV_RECONCILE_SECRET};
use draw_engine::EngineConfig;
use std::io::Write;
use std::path::PathBuf;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_explicit_file() {
    let file = write_config(
        r#"
database_path = "/srv/draws/engine.db"
bind_address = "0.0.0.0:9000"
reconcile_secret = "from-file"
stuck_after_minutes = 30
actor = "nightly-job"
"#,
    );

    let config = EngineConfig::load_with(Some(file.path()), |_| None).unwrap();

    assert_eq!(config.database_path, PathBuf::from("/srv/draws/engine.db"));
    assert_eq!(config.bind_address, "0.0.0.0:9000");
    assert_eq!(config.reconcile_secret(), Some("from-file"));
    assert_eq!(config.stuck_after_minutes, 30);
    assert_eq!(config.actor, "nightly-job");
    assert_eq!(config.match_threshold, 0.6);
}

#[test]
fn test_config_path_from_environment_and_secret_override() {
    let file = write_config("reconcile_secret = \"from-file\"\n");
    let path = file.path().to_string_lossy().to_string();

    let config = EngineConfig::load_with(None, |key| match key {
        k if k == ENV_CONFIG_PATH => Some(path.clone()),
        k if k == ENV_RECONCILE_SECRET => Some("from-env".to_string()),
        _ => None,
    })
    .unwrap();

    assert_eq!(config.reconcile_secret(), Some("from-env"));
}

#[test]
fn test_invalid_file_rejected() {
    let file = write_config("match_threshold = \"high\"\n");
    let err = EngineConfig::load_with(Some(file.path()), |_| None).unwrap_err();
    assert_eq!(err.reason(), "invalid_argument");
}
