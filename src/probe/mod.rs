//! Process probe.
//!
//! The probe turns one admin status query into a classified picture of
//! the local metadata server: role, connection state, and the local
//! metadata version. Transport flakiness is absorbed here, not in the
//! reconciler:
//!
//! - A transient fault (timeout, reset) while a managed process exists is
//!   retried exactly once after a fixed delay. The retry budget stays
//!   well under the manager's action timeout.
//! - A fault that persists on a node the cluster records as leader is
//!   reported as a busy master, degraded but alive — demoting a leader
//!   because it was too loaded to answer one probe is worse than waiting
//!   a monitor interval. On any other node it reads as a syncing shadow.
//! - A "not connected" report during an in-flight start/stop transition
//!   is resolved against the process table, not surfaced as a fault.
//! - Anything unrecognized is surfaced verbatim as unknown/unknown with
//!   the raw text attached.
//!
//! When a live shadow reports version 0, the probe consults the on-disk
//! dump header; a positive header version means the data exists but only
//! offline, which the reconciler maps to the restart promotion path.

pub mod faults;

use crate::cluster::Coordinator;
use crate::server::admin::{AdminClient, MetadataStatus};
use crate::server::process::{ProcessManager, TransitionKind};
use crate::storage::snapshot;
use faults::FaultClass;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Replica role reported by (or inferred for) the metadata server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaRole {
    /// Serving mutations as cluster leader.
    Master,
    /// Following the leader's change log.
    Shadow,
    /// Role could not be determined.
    Unknown,
}

impl FromStr for ReplicaRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "master" => Ok(Self::Master),
            "shadow" => Ok(Self::Shadow),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

impl std::fmt::Display for ReplicaRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Master => write!(f, "master"),
            Self::Shadow => write!(f, "shadow"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Connection state reported by (or inferred for) the metadata server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Master serving normally.
    Running,
    /// Shutting down.
    Stopping,
    /// Coming up, not serving yet.
    Starting,
    /// Alive but too loaded to answer the probe.
    Busy,
    /// Shadow connected to the master.
    Connected,
    /// Shadow lost its link to the master.
    Disconnected,
    /// Shadow replaying the change log.
    Syncing,
}

impl FromStr for ConnectionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "stopping" => Ok(Self::Stopping),
            "starting" => Ok(Self::Starting),
            "busy" => Ok(Self::Busy),
            "connected" => Ok(Self::Connected),
            "disconnected" => Ok(Self::Disconnected),
            "syncing" => Ok(Self::Syncing),
            other => Err(format!("unknown connection state: {other}")),
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Starting => write!(f, "starting"),
            Self::Busy => write!(f, "busy"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Syncing => write!(f, "syncing"),
        }
    }
}

/// Where the reported metadata version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    /// Applied state in the running server's memory.
    LiveMemory,
    /// Header of the on-disk dump; promotion must re-read from disk.
    OfflineDump,
}

/// Classified state of the local metadata server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerState {
    /// Replica role.
    pub role: ReplicaRole,
    /// Connection state.
    pub connection: ConnectionState,
    /// Local metadata version.
    pub version: u64,
    /// Where the version came from.
    pub source: VersionSource,
}

/// Result of one probe pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The server answered, or a degraded-but-alive state was inferred.
    Alive(ServerState),
    /// No server process and no answer.
    Down,
    /// Unclassified fault, raw vendor text attached for diagnostics.
    Fault {
        /// Fault text exactly as received.
        raw: String,
    },
}

/// One probe pass over the local metadata server.
pub struct Probe<'a> {
    admin: &'a dyn AdminClient,
    process: &'a dyn ProcessManager,
    coordinator: &'a dyn Coordinator,
    node_name: &'a str,
    data_dir: &'a Path,
    retry_delay: Duration,
}

impl<'a> Probe<'a> {
    /// Create a probe over the given collaborators.
    pub fn new(
        admin: &'a dyn AdminClient,
        process: &'a dyn ProcessManager,
        coordinator: &'a dyn Coordinator,
        node_name: &'a str,
        data_dir: &'a Path,
        retry_delay: Duration,
    ) -> Self {
        Self {
            admin,
            process,
            coordinator,
            node_name,
            data_dir,
            retry_delay,
        }
    }

    /// Run the probe.
    pub fn run(&self) -> ProbeOutcome {
        match self.admin.metadata_status() {
            Ok(status) => self.refine(status),
            Err(raw) => self.handle_fault(raw),
        }
    }

    /// Fill in the version source for a successful status reply.
    fn refine(&self, status: MetadataStatus) -> ProbeOutcome {
        let mut version = status.version;
        let mut source = VersionSource::LiveMemory;

        if status.role == ReplicaRole::Shadow && status.version == 0 {
            match snapshot::read_dump_version(self.data_dir) {
                Ok(v) if v > 0 => {
                    version = v;
                    source = VersionSource::OfflineDump;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "dump header unreadable, keeping live version 0");
                }
            }
        }

        ProbeOutcome::Alive(ServerState {
            role: status.role,
            connection: status.connection,
            version,
            source,
        })
    }

    fn handle_fault(&self, raw: String) -> ProbeOutcome {
        let class = faults::classify(&raw);
        match class {
            FaultClass::Timeout | FaultClass::Reset => {
                if !self.process.exists() {
                    return ProbeOutcome::Down;
                }
                tracing::debug!(fault = %raw, class = %class, "transient probe fault, retrying once");
                std::thread::sleep(self.retry_delay);
                match self.admin.metadata_status() {
                    Ok(status) => self.refine(status),
                    Err(retry_raw) => {
                        tracing::warn!(fault = %retry_raw, "probe fault persisted after retry");
                        self.degraded()
                    }
                }
            }
            FaultClass::NotConnected => {
                if self.process.transition_in_progress(TransitionKind::Stop) {
                    return self.transitional(ConnectionState::Stopping);
                }
                if self.process.transition_in_progress(TransitionKind::Start) {
                    return self.transitional(ConnectionState::Starting);
                }
                if self.process.exists() {
                    return self.degraded();
                }
                ProbeOutcome::Down
            }
            FaultClass::Refused => {
                if self.process.exists() {
                    self.degraded()
                } else {
                    ProbeOutcome::Down
                }
            }
            FaultClass::Unknown => ProbeOutcome::Fault { raw },
        }
    }

    /// State for a start/stop transition confirmed via the process table.
    fn transitional(&self, connection: ConnectionState) -> ProbeOutcome {
        ProbeOutcome::Alive(ServerState {
            role: self.cluster_role(),
            connection,
            version: 0,
            source: VersionSource::LiveMemory,
        })
    }

    /// Degraded-but-alive classification for a persistent fault.
    fn degraded(&self) -> ProbeOutcome {
        let state = match self.cluster_role() {
            ReplicaRole::Master => ServerState {
                role: ReplicaRole::Master,
                connection: ConnectionState::Busy,
                version: 0,
                source: VersionSource::LiveMemory,
            },
            _ => ServerState {
                role: ReplicaRole::Shadow,
                connection: ConnectionState::Syncing,
                version: 0,
                source: VersionSource::LiveMemory,
            },
        };
        ProbeOutcome::Alive(state)
    }

    /// Role according to the cluster's recorded leader.
    fn cluster_role(&self) -> ReplicaRole {
        match self.coordinator.recorded_leader() {
            Ok(Some(leader)) if leader == self.node_name => ReplicaRole::Master,
            Ok(_) => ReplicaRole::Shadow,
            Err(e) => {
                tracing::warn!(error = %e, "recorded leader unavailable, assuming shadow");
                ReplicaRole::Shadow
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_and_print() {
        assert_eq!("master".parse::<ReplicaRole>().unwrap(), ReplicaRole::Master);
        assert_eq!("shadow".parse::<ReplicaRole>().unwrap(), ReplicaRole::Shadow);
        assert!("leader".parse::<ReplicaRole>().is_err());
        assert_eq!(ReplicaRole::Master.to_string(), "master");
    }

    #[test]
    fn connection_states_parse_and_print() {
        for s in [
            "running",
            "stopping",
            "starting",
            "busy",
            "connected",
            "disconnected",
            "syncing",
        ] {
            let state = s.parse::<ConnectionState>().unwrap();
            assert_eq!(state.to_string(), s);
        }
        assert!("waltzing".parse::<ConnectionState>().is_err());
    }
}
