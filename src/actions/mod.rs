//! Lifecycle actions.
//!
//! Each action is one synchronous, non-reentrant invocation by the
//! resource manager. Every action reconciles first and acts on the
//! resulting value; nothing is cached between invocations, so an action
//! abandoned at the manager's timeout is recovered by the next scheduled
//! monitor re-reconciling from scratch. All actions are idempotent.

pub mod demote;
pub mod monitor;
pub mod promote;
pub mod start;
pub mod stop;

use crate::cluster::Coordinator;
use crate::core::config::Config;
use crate::core::error::{WardenError, WardenResult};
use crate::probe::Probe;
use crate::reconcile::{reconcile, ReconcileInput, Reconciliation};
use crate::server::admin::AdminClient;
use crate::server::lock::LockFile;
use crate::server::process::{Personality, ProcessManager};

/// Collaborator bundle for one lifecycle invocation.
pub struct AgentContext<'a> {
    /// Validated configuration.
    pub config: &'a Config,
    /// Admin channel to the metadata server.
    pub admin: &'a dyn AdminClient,
    /// Process-level control of the metadata server.
    pub process: &'a dyn ProcessManager,
    /// Resource-manager access.
    pub coordinator: &'a dyn Coordinator,
}

impl<'a> AgentContext<'a> {
    /// Bundle the collaborators for one invocation.
    pub fn new(
        config: &'a Config,
        admin: &'a dyn AdminClient,
        process: &'a dyn ProcessManager,
        coordinator: &'a dyn Coordinator,
    ) -> Self {
        Self {
            config,
            admin,
            process,
            coordinator,
        }
    }

    /// Probe the local server and reconcile against the cluster's shared
    /// state.
    pub fn reconcile(&self) -> WardenResult<Reconciliation> {
        let probe = Probe::new(
            self.admin,
            self.process,
            self.coordinator,
            &self.config.node.name,
            &self.config.paths.data_dir,
            self.config.probe_retry_delay(),
        )
        .run();

        let cluster_version = self
            .coordinator
            .attribute_get(&self.config.cluster.attribute)?;
        let lock_held = self.lock().is_held();
        let transition_pending = self.coordinator.transition_pending()?;

        Ok(reconcile(ReconcileInput {
            probe,
            cluster_version,
            lock_held,
            transition_pending,
        }))
    }

    /// Handle for the advisory lock file.
    pub fn lock(&self) -> LockFile {
        LockFile::new(self.config.lock_path())
    }

    /// Rewrite the personality marker. An external config generator
    /// reads it and regenerates the server's static configuration.
    pub fn write_personality(&self, personality: Personality) -> WardenResult<()> {
        std::fs::write(self.config.personality_path(), format!("{personality}\n"))?;
        Ok(())
    }

    /// Take the metadata server down, gracefully if possible.
    ///
    /// `graceful` is the already-issued admin command result. If the
    /// command failed, or the process outlives the grace period, escalate
    /// to a kill; a successful kill still counts as a clean termination.
    pub(crate) fn terminate(&self, graceful: WardenResult<()>) -> WardenResult<()> {
        let grace = self.config.stop_grace();
        let gone = match graceful {
            Ok(()) => self.process.wait_exit(grace),
            Err(e) => {
                tracing::warn!(error = %e, "graceful stop failed, escalating to kill");
                false
            }
        };
        if gone {
            return Ok(());
        }

        // Termination signal first, kill as the last resort.
        if self.process.stop().is_ok() && self.process.wait_exit(grace) {
            return Ok(());
        }
        self.process.kill()?;
        if !self.process.wait_exit(grace) {
            return Err(WardenError::Process(
                "metadata server survived kill".to_string(),
            ));
        }
        Ok(())
    }
}
