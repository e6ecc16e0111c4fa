//! Managed metadata-server process control.
//!
//! The server binary's process surface, as the warden drives it:
//!
//! - `metad run -p {master|shadow} -d DIR [--managed]` — the daemon
//!   itself. The warden spawns it detached and identifies it later by
//!   this command line and its data directory.
//! - `metad stop -d DIR` — a helper invocation that asks a running
//!   daemon to shut down and waits for it.
//!
//! Helper invocations abandoned by a timed-out lifecycle action linger in
//! the process table; the probe uses [`ProcessManager::transition_in_progress`]
//! to tell such an in-flight transition apart from a dead server.
//! Signals are delivered through `kill(1)` so the warden needs no direct
//! syscall surface.

use crate::core::error::{WardenError, WardenResult};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Configured personality of a metadata-server instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Personality {
    /// Serves mutations, publishes the cluster metadata version.
    Master,
    /// Follows the master's change log.
    Shadow,
}

impl Personality {
    /// Command-line and marker-file spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Shadow => "shadow",
        }
    }
}

impl std::fmt::Display for Personality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle transition whose command line may appear in the process
/// table while the admin endpoint is not answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// A daemon is present but not serving yet (loading metadata).
    Start,
    /// A stop helper is asking the daemon to shut down.
    Stop,
}

/// Process-level operations on the managed metadata server.
pub trait ProcessManager {
    /// Whether a daemon for our data directory is present in the process
    /// table.
    fn exists(&self) -> bool;

    /// Spawn the daemon detached with the given personality. Returns the
    /// daemon pid.
    fn start(&self, personality: Personality, managed: bool) -> WardenResult<u32>;

    /// Deliver a termination signal to the daemon. Absent daemon is not
    /// an error; stop paths stay idempotent.
    fn stop(&self) -> WardenResult<()>;

    /// Forcibly kill the daemon.
    fn kill(&self) -> WardenResult<()>;

    /// Block until the daemon has left the process table, up to
    /// `timeout`. Returns true if it is gone.
    fn wait_exit(&self, timeout: Duration) -> bool;

    /// Whether a process matching the expected transition command line
    /// exists.
    fn transition_in_progress(&self, kind: TransitionKind) -> bool;
}

/// `/proc`-backed implementation of [`ProcessManager`].
#[derive(Debug, Clone)]
pub struct SystemProcessManager {
    binary: String,
    data_dir: PathBuf,
}

impl SystemProcessManager {
    /// Create a manager for `binary` instances using `data_dir`.
    pub fn new(binary: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Pids of daemon processes (`<binary> run ... <data_dir> ...`).
    fn daemon_pids(&self) -> Vec<u32> {
        self.matching_pids("run")
    }

    /// Pids whose command line names our binary, the given subcommand,
    /// and our data directory.
    fn matching_pids(&self, subcommand: &str) -> Vec<u32> {
        let data_dir = self.data_dir.display().to_string();
        let mut pids = Vec::new();

        let Ok(entries) = std::fs::read_dir("/proc") else {
            return pids;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(pid) = name.to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            let Ok(raw) = std::fs::read(entry.path().join("cmdline")) else {
                continue;
            };
            let argv = parse_cmdline(&raw);
            if command_matches(&argv, &self.binary, subcommand, &data_dir) {
                pids.push(pid);
            }
        }
        pids
    }

    /// Signal every daemon pid with `kill(1)`.
    fn signal(&self, signal: &str) -> WardenResult<()> {
        for pid in self.daemon_pids() {
            let status = Command::new("kill")
                .arg(signal)
                .arg(pid.to_string())
                .status()
                .map_err(|e| WardenError::Process(format!("kill {pid}: {e}")))?;
            if !status.success() {
                return Err(WardenError::Process(format!(
                    "kill {signal} {pid} exited with {status}"
                )));
            }
        }
        Ok(())
    }
}

impl ProcessManager for SystemProcessManager {
    fn exists(&self) -> bool {
        !self.daemon_pids().is_empty()
    }

    fn start(&self, personality: Personality, managed: bool) -> WardenResult<u32> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("run")
            .arg("-p")
            .arg(personality.as_str())
            .arg("-d")
            .arg(&self.data_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if managed {
            cmd.arg("--managed");
        }

        let child = cmd
            .spawn()
            .map_err(|e| WardenError::Process(format!("spawn {}: {e}", self.binary)))?;
        Ok(child.id())
    }

    fn stop(&self) -> WardenResult<()> {
        self.signal("-TERM")
    }

    fn kill(&self) -> WardenResult<()> {
        self.signal("-KILL")
    }

    fn wait_exit(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.exists() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(200));
        }
    }

    fn transition_in_progress(&self, kind: TransitionKind) -> bool {
        match kind {
            TransitionKind::Start => !self.daemon_pids().is_empty(),
            TransitionKind::Stop => !self.matching_pids("stop").is_empty(),
        }
    }
}

/// Split a `/proc/<pid>/cmdline` buffer into argv strings.
fn parse_cmdline(raw: &[u8]) -> Vec<String> {
    raw.split(|b| *b == 0)
        .filter(|part| !part.is_empty())
        .map(|part| String::from_utf8_lossy(part).into_owned())
        .collect()
}

/// Whether argv names `binary` (by basename), `subcommand`, and mentions
/// `data_dir`.
fn command_matches(argv: &[String], binary: &str, subcommand: &str, data_dir: &str) -> bool {
    let Some(argv0) = argv.first() else {
        return false;
    };
    let basename = argv0.rsplit('/').next().unwrap_or(argv0);
    basename == binary
        && argv.get(1).map(String::as_str) == Some(subcommand)
        && argv.iter().any(|arg| arg == data_dir)
}
