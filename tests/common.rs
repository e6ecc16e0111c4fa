//! Common test utilities.
//!
//! Shared fakes for the admin channel, the process table, and the
//! resource manager, plus config and dump-file builders. Import with
//! `mod common;` in test files.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use warden::cluster::Coordinator;
use warden::core::config::Config;
use warden::core::error::{WardenError, WardenResult};
use warden::probe::{ConnectionState, ReplicaRole};
use warden::server::admin::{AdminClient, MetadataStatus};
use warden::server::process::{Personality, ProcessManager, TransitionKind};
use warden::storage::snapshot::{DUMP_FILE, DUMP_MAGIC};

/// Build a validated configuration rooted in `data_dir`, with timing
/// shrunk so probe retries and stop grace do not slow tests down.
pub fn test_config(data_dir: &Path) -> Config {
    let toml = format!(
        r#"
[node]
name = "node-a"

[server]
secret_file = "{data_dir}/admin.secret"
master_host = "meta-master.internal"

[paths]
data_dir = "{data_dir}"

[cluster]

[timing]
probe_retry_delay_ms = 5
stop_grace_ms = 50
cleanup_delays_ms = [0, 0]
"#,
        data_dir = data_dir.display()
    );
    Config::from_toml(&toml).expect("test config must validate")
}

/// Write a dump file with the given header version into `data_dir`.
pub fn write_dump(data_dir: &Path, version: u64) {
    let mut bytes = DUMP_MAGIC.to_vec();
    bytes.extend_from_slice(&version.to_le_bytes());
    std::fs::write(data_dir.join(DUMP_FILE), bytes).unwrap();
}

/// Build a status tuple.
pub fn status(role: ReplicaRole, connection: ConnectionState, version: u64) -> MetadataStatus {
    MetadataStatus {
        role,
        connection,
        version,
    }
}

/// In-memory admin channel.
///
/// Status replies are consumed in order; the last one repeats once the
/// queue is drained. Control commands are recorded by name.
#[derive(Default)]
pub struct FakeAdmin {
    replies: Mutex<Vec<Result<MetadataStatus, String>>>,
    pub status_calls: AtomicUsize,
    pub commands: Mutex<Vec<&'static str>>,
    pub fail_commands: AtomicBool,
}

impl FakeAdmin {
    /// Admin that always reports the given status.
    pub fn with_status(role: ReplicaRole, connection: ConnectionState, version: u64) -> Self {
        let fake = Self::default();
        fake.push_reply(Ok(status(role, connection, version)));
        fake
    }

    /// Admin that always reports the given fault text.
    pub fn with_fault(raw: &str) -> Self {
        let fake = Self::default();
        fake.push_reply(Err(raw.to_string()));
        fake
    }

    /// Queue one more status reply.
    pub fn push_reply(&self, reply: Result<MetadataStatus, String>) {
        self.replies.lock().unwrap().push(reply);
    }

    /// Names of the control commands issued so far.
    pub fn issued(&self) -> Vec<&'static str> {
        self.commands.lock().unwrap().clone()
    }

    fn command(&self, name: &'static str) -> WardenResult<()> {
        self.commands.lock().unwrap().push(name);
        if self.fail_commands.load(Ordering::SeqCst) {
            Err(WardenError::Admin {
                command: name,
                message: "injected failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl AdminClient for FakeAdmin {
    fn metadata_status(&self) -> Result<MetadataStatus, String> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Err("no reply configured".to_string());
        }
        if replies.len() > 1 {
            replies.remove(0)
        } else {
            replies[0].clone()
        }
    }

    fn promote(&self) -> WardenResult<()> {
        self.command("PROMOTE")
    }

    fn stop(&self) -> WardenResult<()> {
        self.command("STOP")
    }

    fn quick_stop(&self) -> WardenResult<()> {
        self.command("QUICK-STOP")
    }

    fn save(&self) -> WardenResult<()> {
        self.command("SAVE")
    }

    fn restart(&self) -> WardenResult<()> {
        self.command("RESTART")
    }

    fn reload(&self) -> WardenResult<()> {
        self.command("RELOAD")
    }
}

/// In-memory process table.
#[derive(Default)]
pub struct FakeProcess {
    pub exists: AtomicBool,
    pub start_transition: AtomicBool,
    pub stop_transition: AtomicBool,
    pub started: Mutex<Vec<(Personality, bool)>>,
    pub term_signals: AtomicUsize,
    pub kill_signals: AtomicUsize,
    pub fail_start: AtomicBool,
    pub fail_kill: AtomicBool,
    /// Whether the daemon honors stop/kill by leaving the table.
    pub dies: AtomicBool,
}

impl FakeProcess {
    /// A daemon present in the process table that dies when asked to.
    pub fn running() -> Self {
        let fake = Self::default();
        fake.exists.store(true, Ordering::SeqCst);
        fake.dies.store(true, Ordering::SeqCst);
        fake
    }

    /// An empty process table.
    pub fn absent() -> Self {
        let fake = Self::default();
        fake.dies.store(true, Ordering::SeqCst);
        fake
    }
}

impl ProcessManager for FakeProcess {
    fn exists(&self) -> bool {
        self.exists.load(Ordering::SeqCst)
    }

    fn start(&self, personality: Personality, managed: bool) -> WardenResult<u32> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(WardenError::Process("injected start failure".to_string()));
        }
        self.started.lock().unwrap().push((personality, managed));
        self.exists.store(true, Ordering::SeqCst);
        Ok(4242)
    }

    fn stop(&self) -> WardenResult<()> {
        self.term_signals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn kill(&self) -> WardenResult<()> {
        if self.fail_kill.load(Ordering::SeqCst) {
            return Err(WardenError::Process("injected kill failure".to_string()));
        }
        self.kill_signals.fetch_add(1, Ordering::SeqCst);
        self.exists.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn wait_exit(&self, _timeout: std::time::Duration) -> bool {
        if self.dies.load(Ordering::SeqCst) {
            self.exists.store(false, Ordering::SeqCst);
            return true;
        }
        !self.exists.load(Ordering::SeqCst)
    }

    fn transition_in_progress(&self, kind: TransitionKind) -> bool {
        match kind {
            TransitionKind::Start => self.start_transition.load(Ordering::SeqCst),
            TransitionKind::Stop => self.stop_transition.load(Ordering::SeqCst),
        }
    }
}

/// In-memory resource manager.
#[derive(Default)]
pub struct FakeCoordinator {
    pub attributes: Mutex<HashMap<String, u64>>,
    pub attribute_writes: Mutex<Vec<(String, u64)>>,
    pub weights: Mutex<Vec<i64>>,
    pub transition: AtomicBool,
    pub leader: Mutex<Option<String>>,
    pub cleared: AtomicUsize,
    pub fail_attribute_get: AtomicBool,
}

impl FakeCoordinator {
    /// Coordinator with the metadata-version attribute preset.
    pub fn with_version(version: u64) -> Self {
        let fake = Self::default();
        fake.attributes
            .lock()
            .unwrap()
            .insert("metadata-version".to_string(), version);
        fake
    }

    /// Record `node` as the cluster's current leader.
    pub fn set_leader(&self, node: &str) {
        *self.leader.lock().unwrap() = Some(node.to_string());
    }

    /// Last published vote weight, if any.
    pub fn last_weight(&self) -> Option<i64> {
        self.weights.lock().unwrap().last().copied()
    }
}

impl Coordinator for FakeCoordinator {
    fn attribute_get(&self, name: &str) -> WardenResult<u64> {
        if self.fail_attribute_get.load(Ordering::SeqCst) {
            return Err(WardenError::Coordinator(
                "injected attribute failure".to_string(),
            ));
        }
        Ok(self
            .attributes
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(0))
    }

    fn attribute_set(&self, name: &str, value: u64) -> WardenResult<()> {
        self.attribute_writes
            .lock()
            .unwrap()
            .push((name.to_string(), value));
        self.attributes
            .lock()
            .unwrap()
            .insert(name.to_string(), value);
        Ok(())
    }

    fn set_vote_weight(&self, weight: i64) -> WardenResult<()> {
        self.weights.lock().unwrap().push(weight);
        Ok(())
    }

    fn transition_pending(&self) -> WardenResult<bool> {
        Ok(self.transition.load(Ordering::SeqCst))
    }

    fn recorded_leader(&self) -> WardenResult<Option<String>> {
        Ok(self.leader.lock().unwrap().clone())
    }

    fn clear_errors(&self) -> WardenResult<()> {
        self.cleared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
