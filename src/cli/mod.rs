//! Command-line interface.
//!
//! The warden is invoked by the cluster resource manager with exactly one
//! lifecycle action per run; anything else is a usage error (clap reports
//! it and exits with the argument-error code). The process exit code is
//! the action's [`AgentStatus`] code.

use crate::core::config::Config;
use crate::core::error::AgentStatus;
use clap::{Parser, Subcommand};
use serde::Serialize;

/// Warden - failover agent for replicated metadata-server clusters.
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub action: Action,
}

/// Lifecycle actions invoked by the resource manager.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Start the metadata server with shadow personality.
    Start,
    /// Stop the metadata server; a shadow's snapshot is rotated away.
    Stop,
    /// Probe, reconcile, and report the current role status.
    Monitor,
    /// Promote this node to master if its local data is fresh enough.
    Promote,
    /// Halt a running master and release its lock.
    Demote,
    /// Acknowledge a cluster event.
    Notify,
    /// Check the configuration without touching the server.
    Validate,
    /// Print the capabilities document as JSON.
    DescribeCapabilities,
}

/// Initialize the tracing subscriber if the telemetry feature is enabled.
#[cfg(feature = "telemetry")]
pub fn init_tracing(level: Option<&str>) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = level
        .map(EnvFilter::new)
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

#[cfg(not(feature = "telemetry"))]
pub fn init_tracing(_level: Option<&str>) {}

/// One entry of the capabilities document.
#[derive(Debug, Serialize)]
pub struct ActionCapability {
    /// Action name as invoked.
    pub name: &'static str,
    /// Role the hint applies to, when it differs per role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    /// Suggested manager-side timeout in seconds.
    pub timeout_hint_secs: u64,
}

/// Configuration parameter description in the capabilities document.
#[derive(Debug, Serialize)]
pub struct ParameterInfo {
    /// Config key.
    pub key: &'static str,
    /// Whether the key must be set.
    pub required: bool,
    /// What the key controls.
    pub description: &'static str,
}

/// Capabilities document printed by `describe-capabilities`.
#[derive(Debug, Serialize)]
pub struct Capabilities {
    /// Agent name.
    pub agent: &'static str,
    /// Agent version.
    pub version: &'static str,
    /// Whether the agent manages a promotable (master/shadow) resource.
    pub promotable: bool,
    /// Supported actions with timeout hints.
    pub actions: Vec<ActionCapability>,
    /// Recognized configuration parameters.
    pub parameters: Vec<ParameterInfo>,
}

/// Build the capabilities document.
pub fn capabilities() -> Capabilities {
    Capabilities {
        agent: "warden",
        version: env!("CARGO_PKG_VERSION"),
        promotable: true,
        actions: vec![
            ActionCapability {
                name: "start",
                role: None,
                timeout_hint_secs: 1800,
            },
            ActionCapability {
                name: "stop",
                role: None,
                timeout_hint_secs: 1800,
            },
            ActionCapability {
                name: "monitor",
                role: Some("master"),
                timeout_hint_secs: 20,
            },
            ActionCapability {
                name: "monitor",
                role: Some("shadow"),
                timeout_hint_secs: 40,
            },
            ActionCapability {
                name: "promote",
                role: None,
                timeout_hint_secs: 1800,
            },
            ActionCapability {
                name: "demote",
                role: None,
                timeout_hint_secs: 1200,
            },
            ActionCapability {
                name: "notify",
                role: None,
                timeout_hint_secs: 60,
            },
            ActionCapability {
                name: "validate",
                role: None,
                timeout_hint_secs: 60,
            },
        ],
        parameters: vec![
            ParameterInfo {
                key: "node.name",
                required: true,
                description: "node name as known to the resource manager",
            },
            ParameterInfo {
                key: "server.secret_file",
                required: true,
                description: "file holding the shared admin secret",
            },
            ParameterInfo {
                key: "server.master_host",
                required: true,
                description: "host of the current master, followed by shadows",
            },
            ParameterInfo {
                key: "paths.data_dir",
                required: false,
                description: "metadata-server data directory",
            },
            ParameterInfo {
                key: "cluster.attribute",
                required: false,
                description: "name of the shared metadata-version attribute",
            },
            ParameterInfo {
                key: "snapshots.retention_minutes",
                required: false,
                description: "how long rotated dump archives are kept",
            },
        ],
    }
}

/// Run the describe-capabilities action.
pub fn run_describe_capabilities() -> AgentStatus {
    match serde_json::to_string_pretty(&capabilities()) {
        Ok(doc) => {
            println!("{doc}");
            AgentStatus::Success
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize capabilities");
            AgentStatus::ErrGeneric
        }
    }
}

/// Run the validate action against an already loaded configuration.
///
/// Loading already ran the required-setting checks; this adds the
/// environment-side ones (secret readable, data directory present).
pub fn run_validate(config: &Config) -> AgentStatus {
    if let Err(e) = config.load_secret() {
        tracing::error!(error = format!("{e:#}").as_str(), "configuration fault");
        return AgentStatus::ErrConfigured;
    }
    if !config.paths.data_dir.is_dir() {
        tracing::error!(
            data_dir = %config.paths.data_dir.display(),
            "configuration fault: data directory does not exist"
        );
        return AgentStatus::ErrConfigured;
    }
    tracing::info!("configuration valid");
    AgentStatus::Success
}

/// Run the notify action.
pub fn run_notify() -> AgentStatus {
    // The warden takes no action on cluster events; the next monitor
    // re-reconciles from scratch anyway.
    tracing::info!("cluster event acknowledged");
    AgentStatus::Success
}
