//! Core module integration tests.
//!
//! Configuration loading from real files, the configuration-fault
//! checks, and secret handling.

mod common;

use std::io::Write;
use tempfile::NamedTempFile;
use warden::core::config::Config;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("failed to write config");
    file
}

#[test]
fn config_loads_from_file() {
    let file = write_config(
        r#"
[node]
name = "node-a"

[server]
admin_port = 9500
secret_file = "/etc/warden/admin.secret"
master_host = "meta-master.internal"

[cluster]
attribute = "meta-version"

[snapshots]
retention_minutes = 1440
"#,
    );

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.node.name, "node-a");
    assert_eq!(config.server.admin_port, 9500);
    assert_eq!(config.cluster.attribute, "meta-version");
    assert_eq!(config.snapshots.retention_minutes, 1440);
}

#[test]
fn missing_config_file_is_an_error() {
    assert!(Config::from_file(std::path::Path::new("/nonexistent/warden.toml")).is_err());
}

#[test]
fn malformed_toml_is_an_error() {
    let file = write_config("this is not toml [");
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn missing_required_section_is_an_error() {
    // No [server] section at all.
    let file = write_config(
        r#"
[node]
name = "node-a"

[cluster]
"#,
    );
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn secret_loads_trimmed() {
    let dir = tempfile::tempdir().unwrap();
    let secret_path = dir.path().join("admin.secret");
    std::fs::write(&secret_path, "s3cret-token\n").unwrap();

    let toml = format!(
        r#"
[node]
name = "node-a"

[server]
secret_file = "{}"
master_host = "meta-master.internal"

[cluster]
"#,
        secret_path.display()
    );
    let config = Config::from_toml(&toml).unwrap();
    assert_eq!(config.load_secret().unwrap(), "s3cret-token");
}

#[test]
fn empty_secret_is_a_configuration_fault() {
    let dir = tempfile::tempdir().unwrap();
    let secret_path = dir.path().join("admin.secret");
    std::fs::write(&secret_path, "\n").unwrap();

    let toml = format!(
        r#"
[node]
name = "node-a"

[server]
secret_file = "{}"
master_host = "meta-master.internal"

[cluster]
"#,
        secret_path.display()
    );
    let config = Config::from_toml(&toml).unwrap();
    assert!(config.load_secret().is_err());
}

#[test]
fn missing_secret_file_is_a_configuration_fault() {
    let config = common::test_config(tempfile::tempdir().unwrap().path());
    // test_config points at a secret file that was never created.
    assert!(config.load_secret().is_err());
}
