//! Start action.
//!
//! Starts the metadata server with shadow personality. A node always
//! starts as a shadow — leadership is only ever granted through promote,
//! so a restarted node can never claim to lead with whatever state it
//! happens to hold on disk.

use super::AgentContext;
use crate::core::error::AgentStatus;
use crate::reconcile::score;
use crate::server::process::Personality;

/// Run the start action.
pub fn run(ctx: &AgentContext) -> AgentStatus {
    let recon = match ctx.reconcile() {
        Ok(recon) => recon,
        Err(e) => {
            tracing::error!(error = %e, "reconciliation failed");
            return AgentStatus::ErrGeneric;
        }
    };

    match recon.status {
        AgentStatus::RunningMaster | AgentStatus::Success => {
            tracing::info!("metadata server already running");
            AgentStatus::Success
        }
        AgentStatus::FailedMaster => {
            // Crash leftovers. Start is the recovery path: clear the
            // stale lock and cold-start as a shadow. The rotated-away or
            // still-present dump decides eligibility later, not here.
            tracing::warn!("stale advisory lock from a crashed instance, clearing before start");
            if let Err(e) = ctx.lock().release() {
                tracing::error!(error = %e, "failed to clear stale lock");
                return AgentStatus::ErrGeneric;
            }
            cold_start(ctx)
        }
        AgentStatus::NotRunning => cold_start(ctx),
        other => {
            tracing::error!(status = %other, "cannot start from this state");
            AgentStatus::ErrGeneric
        }
    }
}

fn cold_start(ctx: &AgentContext) -> AgentStatus {
    if let Err(e) = ctx.write_personality(Personality::Shadow) {
        tracing::error!(error = %e, "failed to write personality marker");
        return AgentStatus::ErrGeneric;
    }

    let pid = match ctx.process.start(Personality::Shadow, true) {
        Ok(pid) => pid,
        Err(e) => {
            tracing::error!(error = %e, "failed to start metadata server");
            return AgentStatus::ErrGeneric;
        }
    };

    if let Err(e) = ctx.lock().acquire(pid) {
        tracing::error!(error = %e, "failed to acquire advisory lock");
        return AgentStatus::ErrGeneric;
    }

    // A fresh shadow has replayed nothing yet; it must not win an
    // election before its first clean monitor pass says otherwise.
    if let Err(e) = ctx.coordinator.set_vote_weight(score::INELIGIBLE) {
        tracing::warn!(error = %e, "failed to publish initial vote weight");
    }

    // One verification pass: the probe classifies a booting daemon as
    // starting/syncing, so anything but a live classification means the
    // spawn went nowhere.
    match ctx.reconcile() {
        Ok(recon)
            if matches!(
                recon.status,
                AgentStatus::Success | AgentStatus::RunningMaster
            ) =>
        {
            tracing::info!(pid, "metadata server started as shadow");
            AgentStatus::Success
        }
        Ok(recon) => {
            tracing::error!(status = %recon.status, "metadata server did not come up");
            AgentStatus::ErrGeneric
        }
        Err(e) => {
            tracing::error!(error = %e, "verification after start failed");
            AgentStatus::ErrGeneric
        }
    }
}
