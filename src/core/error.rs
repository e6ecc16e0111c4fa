//! Error types and lifecycle status codes.
//!
//! `WardenError` covers the fault taxonomy: configuration faults are fatal
//! and checked before any lifecycle action runs; operational faults mean a
//! commanded transition did not reach the expected state; an unsafe
//! promotion is a deliberate, permanent refusal. The status a lifecycle
//! action reports back to the resource manager is a separate type,
//! [`AgentStatus`], with fixed numeric exit codes.

use thiserror::Error;

/// Common warden error conditions.
#[derive(Debug, Error)]
pub enum WardenError {
    /// Required configuration is missing or invalid.
    #[error("configuration fault: {0}")]
    Config(String),

    /// The admin endpoint rejected or failed a control command.
    #[error("admin command {command} failed: {message}")]
    Admin {
        command: &'static str,
        message: String,
    },

    /// The managed metadata-server process could not be controlled.
    #[error("process control failed: {0}")]
    Process(String),

    /// The resource manager's control tool failed or returned garbage.
    #[error("cluster coordinator failed: {0}")]
    Coordinator(String),

    /// On-disk snapshot state is unreadable or corrupt.
    #[error("snapshot fault: {0}")]
    Snapshot(String),

    /// Promotion refused because the replica's data is stale or absent.
    #[error("unsafe promotion refused: {0}")]
    UnsafePromotion(String),

    /// Filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for warden operations.
pub type WardenResult<T> = Result<T, WardenError>;

/// Outcome of one lifecycle action, as consumed by the resource manager.
///
/// The numeric exit codes are a fixed contract; the manager keys its
/// recovery decisions on them (in particular, `ErrPermanent` stops
/// automatic retries until an operator clears the resource).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    /// Action completed; for monitor, a healthy shadow.
    Success,
    /// Generic, retryable failure.
    ErrGeneric,
    /// Bad invocation (wrong or missing action argument).
    ErrArgs,
    /// Action not implemented on this agent.
    Unimplemented,
    /// Permanent failure; automatic retries must stop.
    ErrPermanent,
    /// Fatal configuration fault.
    ErrConfigured,
    /// The metadata server is not running and no crash is indicated.
    NotRunning,
    /// The metadata server is running as the cluster leader.
    RunningMaster,
    /// Leader state lost unexpectedly (crash with lock present, or a
    /// failed promotion step).
    FailedMaster,
}

impl AgentStatus {
    /// Numeric exit code reported to the resource manager.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::ErrGeneric => 1,
            Self::ErrArgs => 2,
            Self::Unimplemented => 3,
            Self::ErrPermanent => 4,
            Self::ErrConfigured => 6,
            Self::NotRunning => 7,
            Self::RunningMaster => 8,
            Self::FailedMaster => 9,
        }
    }

    /// Whether the status represents any kind of failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ErrGeneric
                | Self::ErrArgs
                | Self::Unimplemented
                | Self::ErrPermanent
                | Self::ErrConfigured
                | Self::FailedMaster
        )
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::ErrGeneric => write!(f, "generic-error"),
            Self::ErrArgs => write!(f, "argument-error"),
            Self::Unimplemented => write!(f, "unimplemented"),
            Self::ErrPermanent => write!(f, "permanent-error"),
            Self::ErrConfigured => write!(f, "configuration-error"),
            Self::NotRunning => write!(f, "not-running"),
            Self::RunningMaster => write!(f, "running-master"),
            Self::FailedMaster => write!(f, "failed-master"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(AgentStatus::Success.exit_code(), 0);
        assert_eq!(AgentStatus::ErrGeneric.exit_code(), 1);
        assert_eq!(AgentStatus::ErrArgs.exit_code(), 2);
        assert_eq!(AgentStatus::Unimplemented.exit_code(), 3);
        assert_eq!(AgentStatus::ErrPermanent.exit_code(), 4);
        assert_eq!(AgentStatus::ErrConfigured.exit_code(), 6);
        assert_eq!(AgentStatus::NotRunning.exit_code(), 7);
        assert_eq!(AgentStatus::RunningMaster.exit_code(), 8);
        assert_eq!(AgentStatus::FailedMaster.exit_code(), 9);
    }

    #[test]
    fn failure_classification() {
        assert!(AgentStatus::FailedMaster.is_failure());
        assert!(AgentStatus::ErrPermanent.is_failure());
        assert!(!AgentStatus::Success.is_failure());
        assert!(!AgentStatus::RunningMaster.is_failure());
        assert!(!AgentStatus::NotRunning.is_failure());
    }
}
