//! Demotion controller.
//!
//! Demotion halts a leader quickly — no metadata flush, the on-disk dump
//! stays the restart basis — and releases its lock. It deliberately does
//! not bring the node back as a shadow; starting is its own lifecycle
//! step, requested separately by the manager when it wants one.

use super::AgentContext;
use crate::core::error::AgentStatus;

/// Run the demote action.
pub fn run(ctx: &AgentContext) -> AgentStatus {
    let recon = match ctx.reconcile() {
        Ok(recon) => recon,
        Err(e) => {
            tracing::error!(error = %e, "reconciliation failed");
            return AgentStatus::ErrGeneric;
        }
    };

    match recon.status {
        AgentStatus::RunningMaster => quick_halt(ctx),
        AgentStatus::Success => {
            tracing::info!("already a shadow, demote is a no-op");
            AgentStatus::Success
        }
        other => {
            // A stopped or crashed node is not a valid demotion target.
            tracing::error!(status = %other, "cannot demote from this state");
            AgentStatus::ErrGeneric
        }
    }
}

fn quick_halt(ctx: &AgentContext) -> AgentStatus {
    if let Err(e) = ctx.terminate(ctx.admin.quick_stop()) {
        tracing::error!(error = %e, "failed to halt master");
        return AgentStatus::ErrGeneric;
    }
    if let Err(e) = ctx.lock().release() {
        tracing::error!(error = %e, "failed to release advisory lock");
        return AgentStatus::ErrGeneric;
    }

    tracing::info!("master halted and lock released");
    AgentStatus::Success
}
