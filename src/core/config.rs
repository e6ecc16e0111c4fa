//! Configuration parsing and validation.
//!
//! Warden configuration is loaded from a TOML file. Validation runs before
//! any lifecycle action: a missing required setting is a configuration
//! fault and fails the invocation immediately with a configuration-error
//! status, so the resource manager never acts on a half-configured node.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level warden configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Identity of this node within the cluster.
    pub node: NodeConfig,

    /// Managed metadata-server process and admin endpoint.
    pub server: ServerConfig,

    /// Filesystem paths.
    #[serde(default)]
    pub paths: PathConfig,

    /// Resource-manager integration.
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Probe and shutdown timing.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Snapshot rotation and archive retention.
    #[serde(default)]
    pub snapshots: SnapshotConfig,
}

/// Node identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node name as known to the resource manager. Compared against the
    /// cluster's recorded leader when classifying degraded probe results.
    pub name: String,
}

/// Managed metadata-server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server binary, also the command-line pattern matched in the
    /// process table.
    #[serde(default = "default_server_binary")]
    pub binary: String,

    /// Admin endpoint host.
    #[serde(default = "default_admin_host")]
    pub admin_host: String,

    /// Admin endpoint port.
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,

    /// File holding the shared admin secret. The secret travels only on
    /// the admin connection, never on an argument list.
    pub secret_file: PathBuf,

    /// Host of the current master, followed by shadows.
    pub master_host: String,

    /// Replication port on the master.
    #[serde(default = "default_master_port")]
    pub master_port: u16,
}

/// Filesystem paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Metadata-server data directory (dump, changelog, lock).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Advisory lock file name, relative to the data directory.
    #[serde(default = "default_lock_file")]
    pub lock_file: String,

    /// Personality marker file name, relative to the data directory.
    /// Rewritten on personality changes; an external config generator
    /// reads it to regenerate the server's static configuration.
    #[serde(default = "default_personality_file")]
    pub personality_file: String,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            lock_file: default_lock_file(),
            personality_file: default_personality_file(),
        }
    }
}

/// Resource-manager integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Name of the shared metadata-version attribute.
    #[serde(default = "default_attribute")]
    pub attribute: String,

    /// Resource id of the metadata server within the manager, used when
    /// clearing error state after a promotion.
    #[serde(default = "default_resource")]
    pub resource: String,

    /// Control tool invoked for attribute, vote-weight, leader, and
    /// transition queries.
    #[serde(default = "default_manager_ctl")]
    pub manager_ctl: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            attribute: default_attribute(),
            resource: default_resource(),
            manager_ctl: default_manager_ctl(),
        }
    }
}

/// Probe and shutdown timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Admin connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Admin read/write timeout in milliseconds.
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,

    /// Delay before the single probe retry, in milliseconds. The total
    /// retry budget must stay well under the manager's monitor timeout.
    #[serde(default = "default_probe_retry_delay_ms")]
    pub probe_retry_delay_ms: u64,

    /// How long to wait for the process to exit after a graceful stop
    /// before escalating to a kill, in milliseconds.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,

    /// Delays before the two post-promotion error-clearing passes,
    /// in milliseconds.
    #[serde(default = "default_cleanup_delays_ms")]
    pub cleanup_delays_ms: [u64; 2],
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            io_timeout_ms: default_io_timeout_ms(),
            probe_retry_delay_ms: default_probe_retry_delay_ms(),
            stop_grace_ms: default_stop_grace_ms(),
            cleanup_delays_ms: default_cleanup_delays_ms(),
        }
    }
}

/// Snapshot rotation and archive retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Archives older than this many minutes are pruned after rotation.
    #[serde(default = "default_retention_minutes")]
    pub retention_minutes: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            retention_minutes: default_retention_minutes(),
        }
    }
}

fn default_server_binary() -> String {
    "metad".to_string()
}

fn default_admin_host() -> String {
    "127.0.0.1".to_string()
}

fn default_admin_port() -> u16 {
    9421
}

fn default_master_port() -> u16 {
    9420
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/metad")
}

fn default_lock_file() -> String {
    "warden.lock".to_string()
}

fn default_personality_file() -> String {
    "personality".to_string()
}

fn default_attribute() -> String {
    "metadata-version".to_string()
}

fn default_resource() -> String {
    "metad".to_string()
}

fn default_manager_ctl() -> String {
    "crmctl".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    2_000
}

fn default_io_timeout_ms() -> u64 {
    5_000
}

fn default_probe_retry_delay_ms() -> u64 {
    3_000
}

fn default_stop_grace_ms() -> u64 {
    30_000
}

fn default_cleanup_delays_ms() -> [u64; 2] {
    [2_000, 10_000]
}

fn default_retention_minutes() -> u64 {
    10_080 // 7 days
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Check required settings.
    ///
    /// These are the configuration faults of the error taxonomy: each is
    /// fatal and reported before any lifecycle action runs.
    pub fn validate(&self) -> Result<()> {
        if self.node.name.is_empty() {
            anyhow::bail!("node.name must not be empty");
        }
        if self.server.admin_host.is_empty() {
            anyhow::bail!("server.admin_host must not be empty");
        }
        if self.server.admin_port == 0 {
            anyhow::bail!("server.admin_port must not be zero");
        }
        if self.server.secret_file.as_os_str().is_empty() {
            anyhow::bail!("server.secret_file must be set");
        }
        if self.server.master_host.is_empty() {
            anyhow::bail!("server.master_host must not be empty");
        }
        if self.paths.data_dir.as_os_str().is_empty() {
            anyhow::bail!("paths.data_dir must be set");
        }
        if self.snapshots.retention_minutes == 0 {
            anyhow::bail!("snapshots.retention_minutes must not be zero");
        }
        Ok(())
    }

    /// Read the shared admin secret from the configured file.
    pub fn load_secret(&self) -> Result<String> {
        let secret = std::fs::read_to_string(&self.server.secret_file).with_context(|| {
            format!(
                "failed to read admin secret file: {}",
                self.server.secret_file.display()
            )
        })?;
        let secret = secret.trim().to_string();
        if secret.is_empty() {
            anyhow::bail!(
                "admin secret file is empty: {}",
                self.server.secret_file.display()
            );
        }
        Ok(secret)
    }

    /// Path of the advisory lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.paths.data_dir.join(&self.paths.lock_file)
    }

    /// Path of the personality marker file.
    pub fn personality_path(&self) -> PathBuf {
        self.paths.data_dir.join(&self.paths.personality_file)
    }

    /// Delay before the single probe retry.
    pub fn probe_retry_delay(&self) -> Duration {
        Duration::from_millis(self.timing.probe_retry_delay_ms)
    }

    /// Grace period between a graceful stop and the kill escalation.
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.timing.stop_grace_ms)
    }

    /// Archive retention window.
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.snapshots.retention_minutes * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
[node]
name = "node-a"

[server]
secret_file = "/etc/warden/admin.secret"
master_host = "meta-master.internal"

[cluster]
"#
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config = Config::from_toml(minimal_toml()).unwrap();
        assert_eq!(config.server.binary, "metad");
        assert_eq!(config.server.admin_port, 9421);
        assert_eq!(config.cluster.attribute, "metadata-version");
        assert_eq!(config.snapshots.retention_minutes, 10_080);
        assert_eq!(config.timing.probe_retry_delay_ms, 3_000);
    }

    #[test]
    fn missing_node_name_is_rejected() {
        let toml = r#"
[node]
name = ""

[server]
secret_file = "/etc/warden/admin.secret"
master_host = "meta-master.internal"

[cluster]
"#;
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn missing_master_host_is_rejected() {
        let toml = r#"
[node]
name = "node-a"

[server]
secret_file = "/etc/warden/admin.secret"
master_host = ""

[cluster]
"#;
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn zero_retention_is_rejected() {
        let toml = r#"
[node]
name = "node-a"

[server]
secret_file = "/etc/warden/admin.secret"
master_host = "meta-master.internal"

[cluster]

[snapshots]
retention_minutes = 0
"#;
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn lock_and_personality_paths_join_data_dir() {
        let config = Config::from_toml(minimal_toml()).unwrap();
        assert_eq!(
            config.lock_path(),
            PathBuf::from("/var/lib/metad/warden.lock")
        );
        assert_eq!(
            config.personality_path(),
            PathBuf::from("/var/lib/metad/personality")
        );
    }
}
