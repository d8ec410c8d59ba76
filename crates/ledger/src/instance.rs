use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use compass_core::{Entity, InstanceId, Money, ParticipantId};

use crate::error::{LedgerError, ParticipantRole};

/// One discrete expense (a bill) within an outing.
///
/// `paid_by` does not have to be part of `participants`: a payer may cover a
/// bill for others only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseInstance {
    pub id: InstanceId,
    /// Short label, e.g. "Hotel Booking".
    pub name: String,
    /// Positive amount in minor units.
    pub amount: Money,
    pub paid_by: ParticipantId,
    /// Who shares the cost (non-empty, no duplicates).
    pub participants: Vec<ParticipantId>,
    pub description: Option<String>,
    /// Ordering/display only; never used in computation.
    pub created_at: DateTime<Utc>,
}

impl Entity for ExpenseInstance {
    type Id = InstanceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl ExpenseInstance {
    /// Checks that do not depend on any roster: positive amount, non-empty
    /// and duplicate-free split.
    pub fn validate_shape(&self) -> Result<(), LedgerError> {
        if !self.amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount {
                instance_id: self.id,
                amount: self.amount,
            });
        }
        if self.participants.is_empty() {
            return Err(LedgerError::EmptySplit {
                instance_id: self.id,
            });
        }

        let mut seen = BTreeSet::new();
        for participant in &self.participants {
            if !seen.insert(*participant) {
                return Err(LedgerError::DuplicateParticipant {
                    instance_id: self.id,
                    participant_id: *participant,
                });
            }
        }
        Ok(())
    }

    /// Full validation against a roster.
    ///
    /// Shape errors are reported before reference errors; among references
    /// the payer is checked first, then members in listed order.
    pub fn validate(&self, roster: &BTreeSet<ParticipantId>) -> Result<(), LedgerError> {
        self.validate_shape()?;

        if !roster.contains(&self.paid_by) {
            return Err(LedgerError::UnknownParticipant {
                instance_id: self.id,
                participant_id: self.paid_by,
                role: ParticipantRole::Payer,
            });
        }
        if let Some(unknown) = self.participants.iter().find(|p| !roster.contains(p)) {
            return Err(LedgerError::UnknownParticipant {
                instance_id: self.id,
                participant_id: *unknown,
                role: ParticipantRole::Member,
            });
        }
        Ok(())
    }
}
