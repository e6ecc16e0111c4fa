//! Stop action and shadow snapshot rotation.
//!
//! A leader's dump stays where it is — it may be the basis for a future
//! restart. A shadow's dump is rotated away after the process is down, so
//! a stale offline shadow can never silently re-seed the cluster as
//! leader; bringing its data back requires an explicit operator restore.

use super::AgentContext;
use crate::core::error::AgentStatus;
use crate::probe::ReplicaRole;
use crate::storage::snapshot;
use chrono::Utc;

/// Run the stop action.
pub fn run(ctx: &AgentContext) -> AgentStatus {
    let recon = match ctx.reconcile() {
        Ok(recon) => recon,
        Err(e) => {
            tracing::error!(error = %e, "reconciliation failed");
            return AgentStatus::ErrGeneric;
        }
    };

    match recon.status {
        AgentStatus::NotRunning => {
            // Nothing to stop; clear any leftover lock so the next
            // monitor reads a clean stop, not a crash.
            if let Err(e) = ctx.lock().release() {
                tracing::error!(error = %e, "failed to release advisory lock");
                return AgentStatus::ErrGeneric;
            }
            AgentStatus::Success
        }
        AgentStatus::FailedMaster => {
            tracing::warn!("stopping a crashed node: process already gone, releasing stale lock");
            if let Err(e) = ctx.lock().release() {
                tracing::error!(error = %e, "failed to release advisory lock");
                return AgentStatus::ErrGeneric;
            }
            AgentStatus::Success
        }
        AgentStatus::RunningMaster | AgentStatus::Success => {
            let Some(state) = recon.server_state().copied() else {
                tracing::error!("live status without server state");
                return AgentStatus::ErrGeneric;
            };
            shutdown(ctx, state.role, state.version)
        }
        other => {
            tracing::error!(status = %other, "cannot stop from this state");
            AgentStatus::ErrGeneric
        }
    }
}

fn shutdown(ctx: &AgentContext, role: ReplicaRole, version: u64) -> AgentStatus {
    // Graceful first: the admin stop saves metadata and exits.
    if let Err(e) = ctx.terminate(ctx.admin.stop()) {
        tracing::error!(error = %e, "failed to stop metadata server");
        return AgentStatus::ErrGeneric;
    }

    if role == ReplicaRole::Shadow && version > 0 {
        if rotate_snapshots(ctx) == AgentStatus::ErrGeneric {
            return AgentStatus::ErrGeneric;
        }
    }

    if let Err(e) = ctx.lock().release() {
        tracing::error!(error = %e, "failed to release advisory lock");
        return AgentStatus::ErrGeneric;
    }

    tracing::info!(role = %role, "metadata server stopped");
    AgentStatus::Success
}

fn rotate_snapshots(ctx: &AgentContext) -> AgentStatus {
    let data_dir = &ctx.config.paths.data_dir;
    let now = Utc::now();

    match snapshot::rotate(data_dir, now) {
        Ok(report) => {
            if let Some(archive) = &report.archived {
                tracing::info!(archive = %archive.display(), "archived oldest dump generation");
            }
            if report.rotated_current {
                tracing::info!("rotated current dump into generation 1");
            }
        }
        Err(e) => {
            // The rotation is the safety control here; a shadow stop
            // that leaves the current dump in place must not report
            // success.
            tracing::error!(error = %e, "snapshot rotation failed");
            return AgentStatus::ErrGeneric;
        }
    }

    match snapshot::prune_archives(data_dir, ctx.config.retention(), now) {
        Ok(removed) if !removed.is_empty() => {
            tracing::info!(count = removed.len(), "pruned expired dump archives");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "archive pruning failed");
        }
    }

    AgentStatus::Success
}
