//! Full recompute over an outing's current instances.

use serde::{Deserialize, Serialize};

use compass_core::{Money, ParticipantId};

use crate::balance::{Balance, Balances, compute_balances};
use crate::error::LedgerError;
use crate::instance::ExpenseInstance;
use crate::settlement::{Transfer, compute_settlement};

/// Balances plus the transfers that settle them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub balances: Balances,
    pub transfers: Vec<Transfer>,
}

impl LedgerSnapshot {
    /// "My balance" view for a single participant.
    pub fn balance_of(&self, participant: &ParticipantId) -> Option<&Balance> {
        self.balances.get(participant)
    }

    /// Transfers a participant has to pay.
    pub fn payments_from<'a>(
        &'a self,
        participant: &'a ParticipantId,
    ) -> impl Iterator<Item = &'a Transfer> + 'a {
        self.transfers.iter().filter(move |t| t.from == *participant)
    }

    /// Transfers a participant should receive.
    pub fn payments_to<'a>(
        &'a self,
        participant: &'a ParticipantId,
    ) -> impl Iterator<Item = &'a Transfer> + 'a {
        self.transfers.iter().filter(move |t| t.to == *participant)
    }

    /// Sum of all transfer amounts.
    pub fn volume(&self) -> Money {
        self.transfers.iter().map(|t| t.amount).sum()
    }
}

/// Recompute balances and settlement from scratch.
///
/// Pure: calling it any number of times with the same roster and instances
/// gives identical output, transfer order included.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(roster = roster.len(), instances = instances.len())
)]
pub fn recompute_on_instance_change(
    roster: &[ParticipantId],
    instances: &[ExpenseInstance],
) -> Result<LedgerSnapshot, LedgerError> {
    let balances = compute_balances(instances, roster)?;
    let transfers = compute_settlement(&balances)?;

    tracing::debug!(
        unsettled = balances.unsettled_count(),
        transfers = transfers.len(),
        "ledger recomputed"
    );

    Ok(LedgerSnapshot {
        balances,
        transfers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use compass_core::InstanceId;
    use uuid::Uuid;

    fn pid(n: u128) -> ParticipantId {
        ParticipantId::from_uuid(Uuid::from_u128(n))
    }

    fn instance(id: u128, amount: i64, paid_by: u128, participants: &[u128]) -> ExpenseInstance {
        ExpenseInstance {
            id: InstanceId::from_uuid(Uuid::from_u128(id)),
            name: format!("bill {id}"),
            amount: Money::from_minor(amount),
            paid_by: pid(paid_by),
            participants: participants.iter().copied().map(pid).collect(),
            description: Some("shared".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn three_participant_dinner_settles_to_payer() {
        let roster = [pid(1), pid(2), pid(3)];
        let snapshot =
            recompute_on_instance_change(&roster, &[instance(1, 10_000, 1, &[1, 2, 3])]).unwrap();

        assert_eq!(snapshot.balance_of(&pid(1)).unwrap().net, Money::from_minor(6_666));
        assert_eq!(
            snapshot.transfers,
            vec![
                Transfer { from: pid(2), to: pid(1), amount: Money::from_minor(3_333) },
                Transfer { from: pid(3), to: pid(1), amount: Money::from_minor(3_333) },
            ]
        );
        assert_eq!(snapshot.volume(), Money::from_minor(6_666));
        assert_eq!(snapshot.payments_to(&pid(1)).count(), 2);
        assert_eq!(snapshot.payments_from(&pid(1)).count(), 0);
    }

    #[test]
    fn solo_self_paid_instance_needs_no_transfers() {
        let snapshot = recompute_on_instance_change(&[pid(1)], &[instance(1, 4_200, 1, &[1])]).unwrap();
        assert!(snapshot.balance_of(&pid(1)).unwrap().is_settled());
        assert!(snapshot.transfers.is_empty());
    }

    #[test]
    fn unknown_participant_rejects_without_result() {
        let result = recompute_on_instance_change(&[pid(1), pid(2)], &[instance(7, 1_000, 1, &[1, 5])]);
        match result {
            Err(LedgerError::UnknownParticipant {
                instance_id,
                participant_id,
                ..
            }) => {
                assert_eq!(instance_id, InstanceId::from_uuid(Uuid::from_u128(7)));
                assert_eq!(participant_id, pid(5));
            }
            other => panic!("expected UnknownParticipant, got {other:?}"),
        }
    }

    #[test]
    fn repeated_calls_are_identical() {
        let roster = [pid(4), pid(2), pid(3), pid(1)];
        let instances = [
            instance(1, 24_000, 1, &[1, 2, 3, 4]),
            instance(2, 12_001, 2, &[4, 3, 2, 1]),
            instance(3, 9_000, 3, &[1, 2, 3]),
        ];

        let first = recompute_on_instance_change(&roster, &instances).unwrap();
        let second = recompute_on_instance_change(&roster, &instances).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_outing_has_zero_balances_and_no_transfers() {
        let snapshot = recompute_on_instance_change(&[pid(1), pid(2)], &[]).unwrap();
        assert_eq!(snapshot.balances.len(), 2);
        assert_eq!(snapshot.balances.unsettled_count(), 0);
        assert!(snapshot.transfers.is_empty());
    }
}
