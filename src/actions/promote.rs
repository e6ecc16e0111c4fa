//! Promotion controller.
//!
//! Promotion consumes the policy computed by the reconciliation that
//! immediately precedes it — there is no cached promote decision to act
//! on. Three strategies:
//!
//! - **Reload**: live promote command; the shadow reattaches as leader
//!   without a restart.
//! - **Restart**: stop the shadow, release the lock, start again with
//!   master personality. Only used when the metadata must be re-read
//!   from the on-disk dump rather than from live memory.
//! - **Prevent**: refuse, with operator guidance, and report a permanent
//!   failure so the manager stops retrying this node.
//!
//! After a successful promotion a detached thread clears the resource's
//! error state twice with staggered delays, so standbys whose monitors
//! failed during the transition re-probe the new leader. The thread is
//! best-effort and idempotent; promote() never waits on it.

use super::AgentContext;
use crate::cluster::{Coordinator, ManagerCtl};
use crate::core::error::AgentStatus;
use crate::probe::{ConnectionState, ProbeOutcome};
use crate::reconcile::{PromoteMode, Reconciliation};
use crate::server::process::Personality;
use std::time::Duration;

/// Run the promote action.
pub fn run(ctx: &AgentContext) -> AgentStatus {
    let recon = match ctx.reconcile() {
        Ok(recon) => recon,
        Err(e) => {
            tracing::error!(error = %e, "reconciliation failed");
            return AgentStatus::ErrGeneric;
        }
    };

    match recon.status {
        AgentStatus::RunningMaster => {
            tracing::info!("already running as master");
            AgentStatus::Success
        }
        AgentStatus::Success => {
            let Some(state) = recon.server_state() else {
                tracing::error!("live status without server state");
                return AgentStatus::ErrGeneric;
            };
            match state.connection {
                ConnectionState::Connected | ConnectionState::Disconnected => {
                    match recon.promote {
                        PromoteMode::Reload => reload(ctx),
                        PromoteMode::Restart => restart(ctx),
                        PromoteMode::Prevent => prevent(&recon),
                    }
                }
                // A shadow mid-sync or mid-transition is not promotable
                // right now, but may well be on the next attempt; this
                // must not look permanent.
                other => {
                    tracing::error!(connection = %other, "shadow not in a promotable state");
                    AgentStatus::ErrGeneric
                }
            }
        }
        AgentStatus::FailedMaster => {
            tracing::error!(
                "refusing to promote a crashed node; clear its state and the resource error first"
            );
            AgentStatus::ErrPermanent
        }
        other => {
            tracing::error!(status = %other, "cannot promote from this state");
            AgentStatus::ErrGeneric
        }
    }
}

/// Live promotion of a running shadow.
fn reload(ctx: &AgentContext) -> AgentStatus {
    if let Err(e) = ctx.admin.promote() {
        tracing::error!(error = %e, "live promote failed");
        return AgentStatus::FailedMaster;
    }
    if let Err(e) = ctx.write_personality(Personality::Master) {
        tracing::error!(error = %e, "failed to write personality marker after promote");
        return AgentStatus::FailedMaster;
    }

    schedule_error_clearing(ctx);
    tracing::info!("promoted to master in place");
    AgentStatus::Success
}

/// Promotion through a personality restart.
fn restart(ctx: &AgentContext) -> AgentStatus {
    if let Err(e) = ctx.terminate(ctx.admin.stop()) {
        tracing::error!(error = %e, "failed to stop shadow for promotion");
        return AgentStatus::FailedMaster;
    }
    if let Err(e) = ctx.lock().release() {
        tracing::error!(error = %e, "failed to release advisory lock");
        return AgentStatus::FailedMaster;
    }
    if let Err(e) = ctx.write_personality(Personality::Master) {
        tracing::error!(error = %e, "failed to write personality marker");
        return AgentStatus::FailedMaster;
    }

    let pid = match ctx.process.start(Personality::Master, true) {
        Ok(pid) => pid,
        Err(e) => {
            tracing::error!(error = %e, "failed to start metadata server as master");
            return AgentStatus::FailedMaster;
        }
    };
    if let Err(e) = ctx.lock().acquire(pid) {
        tracing::error!(error = %e, "failed to acquire advisory lock");
        return AgentStatus::FailedMaster;
    }

    schedule_error_clearing(ctx);
    tracing::info!(pid, "promoted to master via restart");
    AgentStatus::Success
}

/// Refusal with operator guidance.
fn prevent(recon: &Reconciliation) -> AgentStatus {
    let local_version = match &recon.probe {
        ProbeOutcome::Alive(state) => state.version,
        _ => 0,
    };
    tracing::error!(
        local_version,
        cluster_version = recon.cluster_version,
        "refusing promotion: local metadata is stale or absent. Recovery: compare metadata \
         versions across all replicas; restore from the change log on the most advanced node; \
         reset the cluster metadata-version attribute to match; clear the resource error state \
         to re-enable automatic failover"
    );
    AgentStatus::ErrPermanent
}

/// Detach the post-promotion error-clearing thread.
fn schedule_error_clearing(ctx: &AgentContext) {
    let tool = ctx.config.cluster.manager_ctl.clone();
    let node = ctx.config.node.name.clone();
    let resource = ctx.config.cluster.resource.clone();
    let delays = ctx
        .config
        .timing
        .cleanup_delays_ms
        .map(Duration::from_millis);

    std::thread::spawn(move || {
        let ctl = ManagerCtl::new(tool, node, resource);
        run_error_clearing(&ctl, delays);
    });
}

/// Run the staggered error-clearing passes.
///
/// Safe to race with a concurrent monitor pass: clearing an already
/// clean resource is a no-op, and failures are only logged — by then the
/// promotion itself has long been reported.
pub fn run_error_clearing(coordinator: &dyn Coordinator, delays: [Duration; 2]) {
    for delay in delays {
        std::thread::sleep(delay);
        if let Err(e) = coordinator.clear_errors() {
            tracing::debug!(error = %e, "post-promotion error clearing failed");
        }
    }
}
