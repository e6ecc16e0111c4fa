//! Monitor action.
//!
//! The periodic health check: reconcile, publish the side effects the
//! reconciler decided on (vote score, cluster metadata version), and
//! report the role status. Side-effect publication is best effort — a
//! failed attribute or weight write is logged and retried by the next
//! monitor pass, it never turns a healthy role report into an error.

use super::AgentContext;
use crate::core::error::AgentStatus;
use crate::reconcile::{Reconciliation, ScoreAction};

/// Run the monitor action.
pub fn run(ctx: &AgentContext) -> AgentStatus {
    let recon = match ctx.reconcile() {
        Ok(recon) => recon,
        Err(e) => {
            tracing::error!(error = %e, "reconciliation failed");
            return AgentStatus::ErrGeneric;
        }
    };

    if recon.intervention {
        tracing::error!(
            lock = %ctx.config.lock_path().display(),
            "metadata server absent but advisory lock present: the last instance did not stop \
             cleanly; inspect this node, restore or remove its on-disk state, then clear the \
             resource error to re-enable automatic failover"
        );
    }

    publish(ctx, &recon);
    recon.status
}

/// Publish the reconciliation's side effects to the cluster.
pub(crate) fn publish(ctx: &AgentContext, recon: &Reconciliation) {
    if let Some(version) = recon.attr_write {
        match ctx
            .coordinator
            .attribute_set(&ctx.config.cluster.attribute, version)
        {
            Ok(()) => tracing::info!(version, "published cluster metadata version"),
            Err(e) => tracing::warn!(error = %e, version, "failed to publish metadata version"),
        }
    }

    if let ScoreAction::Set(weight) = recon.score {
        if let Err(e) = ctx.coordinator.set_vote_weight(weight) {
            tracing::warn!(error = %e, weight, "failed to publish vote weight");
        }
    }
}
