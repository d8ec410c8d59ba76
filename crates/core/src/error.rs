//! Why a society, outing or ledger operation was refused.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic refusal of a command or calculation.
///
/// Replaying the same history and command always produces the same error;
/// storage and transport failures are reported by the layers that own them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Bad input: a blank outing name, a malformed amount, a wrong join code.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request is well formed but breaks a ledger or outing rule, such
    /// as recording into a completed outing or an instance whose payer is
    /// not on the roster.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The society or outing has never been created.
    #[error("not found")]
    NotFound,

    /// Repeating something that may only happen once: creating a society
    /// twice, joining again, reusing an instance id.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The participant is not a member of the society they act in.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
