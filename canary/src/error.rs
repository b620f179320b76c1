//! Error taxonomy for producing-test sessions.
//!
//! Remote failures ([`SessionError::Connectivity`], [`SessionError::MalformedPayload`])
//! are recovered locally: the session returns to its pre-call phase and records a
//! user-visible notice. Rejected operations leave the session untouched.

use thiserror::Error;

use crate::core::types::Phase;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors surfaced by session operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A remote call failed (transport error, timeout, non-success status).
    #[error("unable to reach the test service: {0}")]
    Connectivity(String),

    /// A remote response could not be decoded into the expected shape.
    #[error("test service returned an unreadable response: {0}")]
    MalformedPayload(String),

    /// The operation is not legal in the current phase.
    #[error("{operation} is not allowed while the session is {phase}")]
    InvalidTransition {
        operation: &'static str,
        phase: Phase,
    },

    /// Another remote call is still in flight.
    #[error("{operation} rejected: a request is already in flight")]
    InFlight { operation: &'static str },

    /// The state code is not a known jurisdiction.
    #[error("unknown jurisdiction '{0}'")]
    UnknownJurisdiction(String),

    /// An operation argument was empty or otherwise unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl SessionError {
    /// True for the two remote-call failure kinds.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SessionError::Connectivity(_) | SessionError::MalformedPayload(_)
        )
    }

    /// True for operations rejected by the state machine.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidTransition { .. } | SessionError::InFlight { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_names_operation_and_phase() {
        let err = SessionError::InvalidTransition {
            operation: "run_test",
            phase: Phase::TypeDeclared,
        };
        assert_eq!(
            err.to_string(),
            "run_test is not allowed while the session is type_declared"
        );
        assert!(err.is_rejection());
        assert!(!err.is_remote());
    }

    #[test]
    fn remote_kinds_are_classified() {
        assert!(SessionError::Connectivity("timeout".to_string()).is_remote());
        assert!(SessionError::MalformedPayload("bad".to_string()).is_remote());
        assert!(!SessionError::InvalidInput("empty".to_string()).is_remote());
    }
}
