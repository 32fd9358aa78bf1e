//! Saga state machine states.

use serde::{Deserialize, Serialize};

/// Where a composition saga is in its protocol.
///
/// Not persisted: at runtime the state is the name of the continuation a
/// queued message will invoke.
///
/// ```text
/// Started ──► AwaitingMetadataResult ──┬──► FailedClean
///                                      └──► AwaitingRollbackDecision ──┬──► Completed
///                                                                      └──► AwaitingRollbackResult ──┬──► FailedClean
///                                                                                                    └──► FailedInconsistent
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    /// The caller-facing entry point is validating the request.
    #[default]
    Started,

    /// The balance swap was dispatched.
    AwaitingMetadataResult,

    /// The metadata replacement was dispatched.
    AwaitingRollbackDecision,

    /// The compensating swap was dispatched.
    AwaitingRollbackResult,

    Completed,

    /// Failed with every ledger effect undone, or never applied.
    FailedClean,

    /// The compensating swap failed. Needs an operator.
    FailedInconsistent,
}

impl SagaState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaState::Completed | SagaState::FailedClean | SagaState::FailedInconsistent
        )
    }

    /// Returns true for states entered by a runtime continuation.
    pub fn is_continuation(&self) -> bool {
        matches!(
            self,
            SagaState::AwaitingMetadataResult
                | SagaState::AwaitingRollbackDecision
                | SagaState::AwaitingRollbackResult
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Started => "Started",
            SagaState::AwaitingMetadataResult => "AwaitingMetadataResult",
            SagaState::AwaitingRollbackDecision => "AwaitingRollbackDecision",
            SagaState::AwaitingRollbackResult => "AwaitingRollbackResult",
            SagaState::Completed => "Completed",
            SagaState::FailedClean => "FailedClean",
            SagaState::FailedInconsistent => "FailedInconsistent",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SagaState; 7] = [
        SagaState::Started,
        SagaState::AwaitingMetadataResult,
        SagaState::AwaitingRollbackDecision,
        SagaState::AwaitingRollbackResult,
        SagaState::Completed,
        SagaState::FailedClean,
        SagaState::FailedInconsistent,
    ];

    #[test]
    fn default_state_is_started() {
        assert_eq!(SagaState::default(), SagaState::Started);
    }

    #[test]
    fn terminal_and_continuation_partition_non_start_states() {
        for state in ALL {
            let expected_continuation = !state.is_terminal() && state != SagaState::Started;
            assert_eq!(state.is_continuation(), expected_continuation, "{state}");
        }
        assert_eq!(ALL.iter().filter(|s| s.is_terminal()).count(), 3);
    }

    #[test]
    fn display_matches_as_str() {
        for state in ALL {
            assert_eq!(state.to_string(), state.as_str());
        }
        assert_eq!(
            SagaState::FailedInconsistent.to_string(),
            "FailedInconsistent"
        );
    }

    #[test]
    fn serializes_as_variant_name() {
        let json = serde_json::to_string(&SagaState::AwaitingRollbackResult).unwrap();
        assert_eq!(json, "\"AwaitingRollbackResult\"");
        let back: SagaState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SagaState::AwaitingRollbackResult);
    }
}
