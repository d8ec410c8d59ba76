use serde::{Deserialize, Serialize};
use thiserror::Error;

use compass_core::{DomainError, InstanceId, Money, ParticipantId};

/// Which side of an instance referenced a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Payer,
    Member,
}

impl core::fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ParticipantRole::Payer => f.write_str("payer"),
            ParticipantRole::Member => f.write_str("split member"),
        }
    }
}

/// Rejection reasons of the ledger engine.
///
/// The engine never returns a partial result: any of these aborts the whole
/// computation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("instance {instance_id}: {role} {participant_id} is not on the roster")]
    UnknownParticipant {
        instance_id: InstanceId,
        participant_id: ParticipantId,
        role: ParticipantRole,
    },

    #[error("instance {instance_id}: split has no participants")]
    EmptySplit { instance_id: InstanceId },

    #[error("instance {instance_id}: participant {participant_id} listed more than once")]
    DuplicateParticipant {
        instance_id: InstanceId,
        participant_id: ParticipantId,
    },

    #[error("instance {instance_id}: amount must be positive (got {amount})")]
    NonPositiveAmount { instance_id: InstanceId, amount: Money },

    #[error("balances do not sum to zero (off by {total} minor units)")]
    Unbalanced { total: i128 },

    #[error("amount overflow while totalling participant {participant_id}")]
    Overflow { participant_id: ParticipantId },
}

impl LedgerError {
    /// An instance referenced a participant outside the roster.
    pub fn is_invalid_reference(&self) -> bool {
        matches!(self, LedgerError::UnknownParticipant { .. })
    }

    /// An instance was malformed on its own (empty split, bad amount, ...).
    pub fn is_degenerate_instance(&self) -> bool {
        matches!(
            self,
            LedgerError::EmptySplit { .. }
                | LedgerError::DuplicateParticipant { .. }
                | LedgerError::NonPositiveAmount { .. }
        )
    }

    /// The offending instance, when the rejection is tied to one.
    pub fn instance_id(&self) -> Option<InstanceId> {
        match self {
            LedgerError::UnknownParticipant { instance_id, .. }
            | LedgerError::EmptySplit { instance_id }
            | LedgerError::DuplicateParticipant { instance_id, .. }
            | LedgerError::NonPositiveAmount { instance_id, .. } => Some(*instance_id),
            LedgerError::Unbalanced { .. } | LedgerError::Overflow { .. } => None,
        }
    }
}

impl From<LedgerError> for DomainError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::Unbalanced { .. } | LedgerError::Overflow { .. } => {
                DomainError::invariant(value.to_string())
            }
            _ => DomainError::validation(value.to_string()),
        }
    }
}
