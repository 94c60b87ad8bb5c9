//! Session-level errors and transient-failure classification.

use thiserror::Error;

use crate::consistency::Consistency;

/// Errors surfaced by a [`crate::Session`] implementation.
///
/// Only [`SessionError::WriteTimeout`] is ever inspected by callers to make a
/// decision (retry); every other variant is opaque and passed through.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The store could not confirm sufficient replica acknowledgment for a
    /// write within its internal deadline. Ambiguous: the write may or may
    /// not have been applied. This is the transient, retryable class.
    #[error("write timeout at {consistency}: received {received} of {block_for} acks ({write_type})")]
    WriteTimeout {
        consistency: Consistency,
        received: u32,
        block_for: u32,
        write_type: String,
    },

    /// The statement was rejected as invalid (syntax, unknown table/column,
    /// duplicate schema object).
    #[error("invalid statement: {0}")]
    Invalid(String),

    /// Not enough replicas were alive to attempt the operation.
    #[error("unavailable at {consistency}: {alive} of {required} replicas alive")]
    Unavailable {
        consistency: Consistency,
        required: u32,
        alive: u32,
    },

    /// Any other driver/transport failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl SessionError {
    /// True for the transient write-timeout class, the only failure class the
    /// write engine retries.
    pub fn is_write_timeout(&self) -> bool {
        matches!(self, SessionError::WriteTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_timeout_classification() {
        let wto = SessionError::WriteTimeout {
            consistency: Consistency::LocalQuorum,
            received: 1,
            block_for: 2,
            write_type: "CAS".into(),
        };
        assert!(wto.is_write_timeout());
        assert!(!SessionError::Backend("connection reset".into()).is_write_timeout());
        assert!(!SessionError::Invalid("unknown column".into()).is_write_timeout());
    }
}
