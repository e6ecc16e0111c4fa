//! State reconciler.
//!
//! A pure mapping from one probe pass plus the cluster's shared state to
//! a status code, a vote-score action, an optional attribute write, and a
//! promotion policy. Nothing here touches a collaborator; the action
//! layer applies the side effects. That keeps the failover safety rules
//! in one place, exhaustively matchable and testable without a cluster.
//!
//! The promotion policy is recomputed on every pass and threaded through
//! as a value. It is never cached: a promote decision must always rest on
//! the reconciliation that immediately precedes it.

use crate::core::error::AgentStatus;
use crate::probe::{ConnectionState, ProbeOutcome, ReplicaRole, ServerState, VersionSource};

/// Vote-score constants consumed by the cluster's election weighting.
/// Higher is more promotion-eligible.
pub mod score {
    /// A serving master.
    pub const LEADER: i64 = 1000;
    /// A shadow whose local version is at least the cluster's.
    pub const SYNCED: i64 = 800;
    /// A shadow with data, but behind the cluster.
    pub const LAGGING: i64 = 500;
    /// Anything that must never win an election.
    pub const INELIGIBLE: i64 = 0;
}

/// Promotion strategy for this node, valid for one reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromoteMode {
    /// Refuse to promote; the replica's data is stale or absent.
    Prevent,
    /// Live promote command; the shadow reattaches as leader in place.
    Reload,
    /// Stop and start with master personality; metadata must be re-read
    /// from disk.
    Restart,
}

/// What to do with this node's published vote score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreAction {
    /// Publish this weight.
    Set(i64),
    /// Leave the currently published weight untouched.
    Keep,
}

/// Input of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileInput {
    /// Probe result for the local server.
    pub probe: ProbeOutcome,
    /// Cluster-wide last known-good metadata version (0 when unset).
    pub cluster_version: u64,
    /// Whether the advisory lock file is present.
    pub lock_held: bool,
    /// Whether the manager believes a cluster transition is in flight.
    pub transition_pending: bool,
}

/// Output of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Status code for the invoking lifecycle action.
    pub status: AgentStatus,
    /// Vote-score side effect.
    pub score: ScoreAction,
    /// Metadata version to publish to the cluster attribute, if any.
    pub attr_write: Option<u64>,
    /// Promotion policy derived from this pass.
    pub promote: PromoteMode,
    /// Whether manual-intervention guidance must be emitted (crash
    /// detected: process absent, lock present).
    pub intervention: bool,
    /// The probe outcome this pass was derived from.
    pub probe: ProbeOutcome,
    /// The cluster version this pass compared against.
    pub cluster_version: u64,
}

impl Reconciliation {
    fn new(probe: ProbeOutcome, status: AgentStatus, score: ScoreAction) -> Self {
        Self {
            status,
            score,
            attr_write: None,
            promote: PromoteMode::Prevent,
            intervention: false,
            probe,
            cluster_version: 0,
        }
    }

    /// Server state when the probe saw a live server.
    pub fn server_state(&self) -> Option<&ServerState> {
        match &self.probe {
            ProbeOutcome::Alive(state) => Some(state),
            _ => None,
        }
    }
}

/// Reconcile one probe pass against the cluster's shared state.
pub fn reconcile(input: ReconcileInput) -> Reconciliation {
    let mut result = match &input.probe {
        ProbeOutcome::Alive(state) => reconcile_alive(*state, &input),
        ProbeOutcome::Down => {
            if input.lock_held {
                let mut r = Reconciliation::new(
                    ProbeOutcome::Down,
                    AgentStatus::FailedMaster,
                    ScoreAction::Keep,
                );
                r.intervention = true;
                r
            } else {
                Reconciliation::new(ProbeOutcome::Down, AgentStatus::NotRunning, ScoreAction::Keep)
            }
        }
        ProbeOutcome::Fault { raw } => Reconciliation::new(
            ProbeOutcome::Fault { raw: raw.clone() },
            AgentStatus::ErrGeneric,
            ScoreAction::Keep,
        ),
    };
    result.cluster_version = input.cluster_version;
    result
}

fn reconcile_alive(state: ServerState, input: &ReconcileInput) -> Reconciliation {
    let probe = ProbeOutcome::Alive(state);
    match (state.role, state.connection) {
        (ReplicaRole::Master, ConnectionState::Running) => {
            let mut r = Reconciliation::new(
                probe,
                AgentStatus::RunningMaster,
                ScoreAction::Set(score::LEADER),
            );
            // Publish only a real advance, and never mid-transition: a
            // repeated pass with unchanged input must not re-write, and
            // the attribute never moves backwards.
            if !input.transition_pending && state.version > input.cluster_version {
                r.attr_write = Some(state.version);
            }
            r
        }

        (ReplicaRole::Master, ConnectionState::Stopping | ConnectionState::Starting) => {
            Reconciliation::new(
                probe,
                AgentStatus::RunningMaster,
                ScoreAction::Set(score::INELIGIBLE),
            )
        }

        // A loaded leader that could not answer the probe. Touching its
        // weight here could trigger a false demotion.
        (ReplicaRole::Master, ConnectionState::Busy) => {
            Reconciliation::new(probe, AgentStatus::RunningMaster, ScoreAction::Keep)
        }

        // A master still wearing follower connection state indicates a
        // half-finished promotion; keep it leader-status but weightless
        // until a clean pass.
        (
            ReplicaRole::Master,
            ConnectionState::Connected | ConnectionState::Disconnected | ConnectionState::Syncing,
        ) => Reconciliation::new(
            probe,
            AgentStatus::RunningMaster,
            ScoreAction::Set(score::INELIGIBLE),
        ),

        (
            ReplicaRole::Shadow,
            ConnectionState::Stopping
            | ConnectionState::Starting
            | ConnectionState::Syncing
            | ConnectionState::Busy,
        ) => Reconciliation::new(
            probe,
            AgentStatus::Success,
            ScoreAction::Set(score::INELIGIBLE),
        ),

        (ReplicaRole::Shadow, ConnectionState::Connected | ConnectionState::Disconnected) => {
            reconcile_promotable_shadow(state, input)
        }

        // Servers report `running` only for masters; an unknown role or a
        // contradictory pairing is surfaced, not guessed around.
        (ReplicaRole::Shadow, ConnectionState::Running)
        | (ReplicaRole::Unknown, _) => {
            Reconciliation::new(probe, AgentStatus::ErrGeneric, ScoreAction::Keep)
        }
    }
}

/// Promotion policy for a shadow in a stable connection state.
fn reconcile_promotable_shadow(state: ServerState, input: &ReconcileInput) -> Reconciliation {
    let probe = ProbeOutcome::Alive(state);

    if state.version == 0 {
        // No local data at all. The minimum weight and the Prevent policy
        // make sure this replica can never seed the cluster.
        let mut r = Reconciliation::new(
            probe,
            AgentStatus::Success,
            ScoreAction::Set(score::INELIGIBLE),
        );
        r.promote = PromoteMode::Prevent;
        return r;
    }

    let mode = match state.source {
        VersionSource::LiveMemory => PromoteMode::Reload,
        VersionSource::OfflineDump => PromoteMode::Restart,
    };
    let weight = if state.version >= input.cluster_version {
        score::SYNCED
    } else {
        score::LAGGING
    };

    let mut r = Reconciliation::new(probe, AgentStatus::Success, ScoreAction::Set(weight));
    r.promote = mode;
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alive(
        role: ReplicaRole,
        connection: ConnectionState,
        version: u64,
        source: VersionSource,
    ) -> ProbeOutcome {
        ProbeOutcome::Alive(ServerState {
            role,
            connection,
            version,
            source,
        })
    }

    fn input(probe: ProbeOutcome, cluster_version: u64) -> ReconcileInput {
        ReconcileInput {
            probe,
            cluster_version,
            lock_held: false,
            transition_pending: false,
        }
    }

    #[test]
    fn running_master_publishes_version_and_top_score() {
        let r = reconcile(input(
            alive(
                ReplicaRole::Master,
                ConnectionState::Running,
                57,
                VersionSource::LiveMemory,
            ),
            12,
        ));
        assert_eq!(r.status, AgentStatus::RunningMaster);
        assert_eq!(r.score, ScoreAction::Set(score::LEADER));
        assert_eq!(r.attr_write, Some(57));
        assert_eq!(r.promote, PromoteMode::Prevent);
    }

    #[test]
    fn master_attribute_write_is_idempotent_and_monotonic() {
        let probe = alive(
            ReplicaRole::Master,
            ConnectionState::Running,
            57,
            VersionSource::LiveMemory,
        );
        // Same version already published: no duplicate write.
        let r = reconcile(input(probe.clone(), 57));
        assert_eq!(r.attr_write, None);
        // Cluster already ahead: never move the attribute backwards.
        let r = reconcile(input(probe, 60));
        assert_eq!(r.attr_write, None);
    }

    #[test]
    fn master_write_is_suppressed_during_transition() {
        let mut i = input(
            alive(
                ReplicaRole::Master,
                ConnectionState::Running,
                57,
                VersionSource::LiveMemory,
            ),
            12,
        );
        i.transition_pending = true;
        let r = reconcile(i);
        assert_eq!(r.attr_write, None);
        assert_eq!(r.score, ScoreAction::Set(score::LEADER));
    }

    #[test]
    fn transitional_master_is_weightless() {
        for conn in [ConnectionState::Stopping, ConnectionState::Starting] {
            let r = reconcile(input(
                alive(ReplicaRole::Master, conn, 57, VersionSource::LiveMemory),
                12,
            ));
            assert_eq!(r.status, AgentStatus::RunningMaster);
            assert_eq!(r.score, ScoreAction::Set(score::INELIGIBLE));
            assert_eq!(r.attr_write, None);
        }
    }

    #[test]
    fn busy_master_keeps_score_untouched() {
        let r = reconcile(input(
            alive(
                ReplicaRole::Master,
                ConnectionState::Busy,
                0,
                VersionSource::LiveMemory,
            ),
            12,
        ));
        assert_eq!(r.status, AgentStatus::RunningMaster);
        assert_eq!(r.score, ScoreAction::Keep);
        assert_eq!(r.attr_write, None);
    }

    #[test]
    fn syncing_or_stopping_shadow_is_success_with_zero_score() {
        for conn in [ConnectionState::Syncing, ConnectionState::Stopping] {
            let r = reconcile(input(
                alive(ReplicaRole::Shadow, conn, 30, VersionSource::LiveMemory),
                12,
            ));
            assert_eq!(r.status, AgentStatus::Success);
            assert_eq!(r.score, ScoreAction::Set(score::INELIGIBLE));
            assert_ne!(r.status, AgentStatus::RunningMaster);
        }
    }

    #[test]
    fn synced_live_shadow_reloads() {
        for conn in [ConnectionState::Connected, ConnectionState::Disconnected] {
            let r = reconcile(input(
                alive(ReplicaRole::Shadow, conn, 12, VersionSource::LiveMemory),
                12,
            ));
            assert_eq!(r.status, AgentStatus::Success);
            assert_eq!(r.score, ScoreAction::Set(score::SYNCED));
            assert_eq!(r.promote, PromoteMode::Reload);
        }
    }

    #[test]
    fn synced_offline_dump_requires_restart() {
        let r = reconcile(input(
            alive(
                ReplicaRole::Shadow,
                ConnectionState::Connected,
                15,
                VersionSource::OfflineDump,
            ),
            12,
        ));
        assert_eq!(r.score, ScoreAction::Set(score::SYNCED));
        assert_eq!(r.promote, PromoteMode::Restart);
    }

    #[test]
    fn lagging_shadow_gets_mid_score() {
        let r = reconcile(input(
            alive(
                ReplicaRole::Shadow,
                ConnectionState::Connected,
                5,
                VersionSource::LiveMemory,
            ),
            12,
        ));
        assert_eq!(r.status, AgentStatus::Success);
        assert_eq!(r.score, ScoreAction::Set(score::LAGGING));
        assert_eq!(r.promote, PromoteMode::Reload);
    }

    #[test]
    fn empty_shadow_is_never_promotable() {
        for cluster in [0, 5, 1000] {
            let r = reconcile(input(
                alive(
                    ReplicaRole::Shadow,
                    ConnectionState::Connected,
                    0,
                    VersionSource::LiveMemory,
                ),
                cluster,
            ));
            assert_eq!(r.promote, PromoteMode::Prevent);
            assert_eq!(r.score, ScoreAction::Set(score::INELIGIBLE));
        }
    }

    #[test]
    fn fresh_replica_is_always_promotable_somehow() {
        // local >= cluster > 0 must map to Reload or Restart, never
        // Prevent.
        for (local, cluster) in [(12, 12), (20, 12), (1, 1)] {
            for source in [VersionSource::LiveMemory, VersionSource::OfflineDump] {
                let r = reconcile(input(
                    alive(ReplicaRole::Shadow, ConnectionState::Connected, local, source),
                    cluster,
                ));
                assert_ne!(r.promote, PromoteMode::Prevent);
            }
        }
    }

    #[test]
    fn absent_process_without_lock_is_not_running() {
        let r = reconcile(input(ProbeOutcome::Down, 12));
        assert_eq!(r.status, AgentStatus::NotRunning);
        assert!(!r.intervention);
        assert_eq!(r.score, ScoreAction::Keep);
    }

    #[test]
    fn absent_process_with_lock_is_a_crash() {
        let mut i = input(ProbeOutcome::Down, 12);
        i.lock_held = true;
        let r = reconcile(i);
        assert_eq!(r.status, AgentStatus::FailedMaster);
        assert!(r.intervention);
    }

    #[test]
    fn unclassified_fault_is_generic_error() {
        let r = reconcile(input(
            ProbeOutcome::Fault {
                raw: "protocol version mismatch".to_string(),
            },
            12,
        ));
        assert_eq!(r.status, AgentStatus::ErrGeneric);
        assert_eq!(r.promote, PromoteMode::Prevent);
    }

    #[test]
    fn shadow_running_pairing_is_rejected() {
        let r = reconcile(input(
            alive(
                ReplicaRole::Shadow,
                ConnectionState::Running,
                12,
                VersionSource::LiveMemory,
            ),
            12,
        ));
        assert_eq!(r.status, AgentStatus::ErrGeneric);
    }

    #[test]
    fn repeated_pass_with_unchanged_input_is_stable() {
        let probe = alive(
            ReplicaRole::Shadow,
            ConnectionState::Connected,
            12,
            VersionSource::LiveMemory,
        );
        let first = reconcile(input(probe.clone(), 12));
        let second = reconcile(input(probe, 12));
        assert_eq!(first.status, second.status);
        assert_eq!(first.score, second.score);
        assert_eq!(first.attr_write, second.attr_write);
        assert_eq!(first.promote, second.promote);
    }
}
