//! Warden - unified agent entrypoint.
//!
//! Usage:
//!   warden monitor --config /etc/warden/warden.toml
//!   warden start | stop | promote | demote | notify
//!   warden validate
//!   warden describe-capabilities
//!
//! Exactly one action per invocation; the process exit code is the
//! action's status code, consumed by the cluster resource manager.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use warden::actions::{self, AgentContext};
use warden::cli::{self, Action, Cli};
use warden::cluster::ManagerCtl;
use warden::core::config::Config;
use warden::core::error::AgentStatus;
use warden::server::admin::TcpAdminClient;
use warden::server::process::SystemProcessManager;

fn main() {
    let cli = Cli::parse();
    cli::init_tracing(cli.log_level.as_deref());

    let status = run(&cli);
    tracing::debug!(action = ?cli.action, status = %status, "action finished");
    std::process::exit(status.exit_code());
}

fn run(cli: &Cli) -> AgentStatus {
    // Capability description needs no configuration at all.
    if cli.action == Action::DescribeCapabilities {
        return cli::run_describe_capabilities();
    }

    let config_path = cli
        .config
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/etc/warden/warden.toml"));
    let config = match Config::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = format!("{e:#}").as_str(), "configuration fault");
            return AgentStatus::ErrConfigured;
        }
    };

    match cli.action {
        Action::Validate => return cli::run_validate(&config),
        Action::Notify => return cli::run_notify(),
        _ => {}
    }

    let secret = match config.load_secret() {
        Ok(secret) => secret,
        Err(e) => {
            tracing::error!(error = format!("{e:#}").as_str(), "configuration fault");
            return AgentStatus::ErrConfigured;
        }
    };

    let admin = TcpAdminClient::new(
        config.server.admin_host.clone(),
        config.server.admin_port,
        secret,
        Duration::from_millis(config.timing.connect_timeout_ms),
        Duration::from_millis(config.timing.io_timeout_ms),
    );
    let process = SystemProcessManager::new(
        config.server.binary.clone(),
        config.paths.data_dir.clone(),
    );
    let coordinator = ManagerCtl::new(
        config.cluster.manager_ctl.clone(),
        config.node.name.clone(),
        config.cluster.resource.clone(),
    );
    let ctx = AgentContext::new(&config, &admin, &process, &coordinator);

    match cli.action {
        Action::Start => actions::start::run(&ctx),
        Action::Stop => actions::stop::run(&ctx),
        Action::Monitor => actions::monitor::run(&ctx),
        Action::Promote => actions::promote::run(&ctx),
        Action::Demote => actions::demote::run(&ctx),
        // Handled before collaborator construction.
        Action::Notify | Action::Validate | Action::DescribeCapabilities => AgentStatus::Success,
    }
}
