//! Per-participant aggregation: paid, owed and net.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use compass_core::{Money, ParticipantId, ValueObject};

use crate::error::LedgerError;
use crate::instance::ExpenseInstance;

/// A participant's position: `net = total_paid - total_owed`.
///
/// Positive `net` means the group owes the participant; negative means the
/// participant owes the group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub total_paid: Money,
    pub total_owed: Money,
    pub net: Money,
}

impl ValueObject for Balance {}

impl Balance {
    pub fn new(total_paid: Money, total_owed: Money) -> Self {
        Self {
            total_paid,
            total_owed,
            net: total_paid - total_owed,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.net.is_zero()
    }
}

/// Balances keyed by participant, iterated in ascending participant id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balances(BTreeMap<ParticipantId, Balance>);

impl Balances {
    pub fn get(&self, participant: &ParticipantId) -> Option<&Balance> {
        self.0.get(participant)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantId, &Balance)> {
        self.0.iter()
    }

    pub fn participants(&self) -> impl Iterator<Item = &ParticipantId> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all nets, widened so that arbitrary inputs cannot overflow.
    pub fn net_total(&self) -> i128 {
        self.0.values().map(|b| b.net.minor() as i128).sum()
    }

    /// Number of participants whose net is not zero.
    pub fn unsettled_count(&self) -> usize {
        self.0.values().filter(|b| !b.is_settled()).count()
    }

    pub fn into_inner(self) -> BTreeMap<ParticipantId, Balance> {
        self.0
    }
}

impl FromIterator<(ParticipantId, Balance)> for Balances {
    fn from_iter<I: IntoIterator<Item = (ParticipantId, Balance)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Balances {
    type Item = (ParticipantId, Balance);
    type IntoIter = std::collections::btree_map::IntoIter<ParticipantId, Balance>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Split `amount` into equal shares over `participants`.
///
/// Every participant receives `floor(amount / n)`; the remaining
/// `amount mod n` minor units go one each to the first participants in
/// ascending id order. Duplicates are collapsed. The shares always sum to
/// `amount` exactly. Returns an empty list when there is nobody to split
/// between or the amount is negative.
pub fn split_equally(amount: Money, participants: &[ParticipantId]) -> Vec<(ParticipantId, Money)> {
    let ordered: BTreeSet<ParticipantId> = participants.iter().copied().collect();
    let Some((base, remainder)) = amount.split(ordered.len()) else {
        return Vec::new();
    };

    ordered
        .into_iter()
        .enumerate()
        .map(|(idx, participant)| {
            let extra = if (idx as i64) < remainder { 1 } else { 0 };
            (participant, base + Money::from_minor(extra))
        })
        .collect()
}

fn credit(
    totals: &mut BTreeMap<ParticipantId, Money>,
    participant: ParticipantId,
    amount: Money,
) -> Result<(), LedgerError> {
    let slot = totals.entry(participant).or_insert(Money::ZERO);
    *slot = slot.checked_add(amount).ok_or(LedgerError::Overflow {
        participant_id: participant,
    })?;
    Ok(())
}

/// Compute paid/owed/net for every roster participant.
///
/// All instances are validated against the roster before anything is
/// aggregated; the first failure rejects the whole computation. With no
/// instances every roster participant gets a zero balance.
pub fn compute_balances(
    instances: &[ExpenseInstance],
    roster: &[ParticipantId],
) -> Result<Balances, LedgerError> {
    let roster: BTreeSet<ParticipantId> = roster.iter().copied().collect();
    for instance in instances {
        instance.validate(&roster)?;
    }

    let mut paid: BTreeMap<ParticipantId, Money> =
        roster.iter().map(|p| (*p, Money::ZERO)).collect();
    let mut owed = paid.clone();

    for instance in instances {
        credit(&mut paid, instance.paid_by, instance.amount)?;
        for (participant, share) in split_equally(instance.amount, &instance.participants) {
            credit(&mut owed, participant, share)?;
        }
    }

    let balances: Balances = roster
        .into_iter()
        .map(|p| {
            let total_paid = paid.get(&p).copied().unwrap_or_default();
            let total_owed = owed.get(&p).copied().unwrap_or_default();
            (p, Balance::new(total_paid, total_owed))
        })
        .collect();

    debug_assert_eq!(balances.net_total(), 0);
    Ok(balances)
}

/// Sum several balance sets per participant (e.g. all outings of a society).
///
/// Participants missing from one set simply contribute nothing there.
/// Conservation carries over: if every input nets to zero, so does the result.
pub fn merge_balances<'a, I>(sets: I) -> Result<Balances, LedgerError>
where
    I: IntoIterator<Item = &'a Balances>,
{
    let mut paid: BTreeMap<ParticipantId, Money> = BTreeMap::new();
    let mut owed: BTreeMap<ParticipantId, Money> = BTreeMap::new();

    for set in sets {
        for (participant, balance) in set.iter() {
            credit(&mut paid, *participant, balance.total_paid)?;
            credit(&mut owed, *participant, balance.total_owed)?;
        }
    }

    Ok(paid
        .into_iter()
        .map(|(p, total_paid)| {
            let total_owed = owed.get(&p).copied().unwrap_or_default();
            (p, Balance::new(total_paid, total_owed))
        })
        .collect())
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
            id: InstanceId::from_uuid(Uuid::from_u128(1_000 + id)),
            name: format!("bill {id}"),
            amount: Money::from_minor(amount),
            paid_by: pid(paid_by),
            participants: participants.iter().copied().map(pid).collect(),
            description: None,
            created_at: Utc::now(),
        }
    }

    fn m(minor: i64) -> Money {
        Money::from_minor(minor)
    }

    #[test]
    fn remainder_goes_to_lowest_ids_first() {
        // Listed out of order on purpose: the order of the list does not matter.
        let shares = split_equally(m(10_000), &[pid(3), pid(1), pid(2)]);
        assert_eq!(
            shares,
            vec![(pid(1), m(3_334)), (pid(2), m(3_333)), (pid(3), m(3_333))]
        );

        let shares = split_equally(m(11), &[pid(4), pid(2), pid(9), pid(1)]);
        assert_eq!(
            shares,
            vec![(pid(1), m(3)), (pid(2), m(3)), (pid(4), m(3)), (pid(9), m(2))]
        );
    }

    #[test]
    fn split_with_nobody_is_empty() {
        assert!(split_equally(m(100), &[]).is_empty());
    }

    #[test]
    fn three_way_dinner_matches_expected_cents() {
        let roster = [pid(1), pid(2), pid(3)];
        let balances = compute_balances(&[instance(1, 10_000, 1, &[1, 2, 3])], &roster).unwrap();

        assert_eq!(balances.get(&pid(1)), Some(&Balance::new(m(10_000), m(3_334))));
        assert_eq!(balances.get(&pid(1)).unwrap().net, m(6_666));
        assert_eq!(balances.get(&pid(2)).unwrap().net, m(-3_333));
        assert_eq!(balances.get(&pid(3)).unwrap().net, m(-3_333));
        assert_eq!(balances.net_total(), 0);
    }

    #[test]
    fn self_paid_solo_instance_nets_to_zero_but_counts() {
        let balances = compute_balances(&[instance(1, 2_500, 1, &[1])], &[pid(1)]).unwrap();
        let b = balances.get(&pid(1)).unwrap();
        assert_eq!(b.total_paid, m(2_500));
        assert_eq!(b.total_owed, m(2_500));
        assert!(b.is_settled());
    }

    #[test]
    fn empty_input_yields_zero_balance_for_every_roster_member() {
        let balances = compute_balances(&[], &[pid(2), pid(1)]).unwrap();
        assert_eq!(balances.len(), 2);
        assert!(balances.iter().all(|(_, b)| *b == Balance::default()));
        assert_eq!(balances.participants().copied().collect::<Vec<_>>(), vec![pid(1), pid(2)]);
    }

    #[test]
    fn weekend_trip_balances() {
        let roster = [pid(1), pid(2), pid(3), pid(4)];
        let instances = [
            instance(1, 24_000, 1, &[1, 2, 3, 4]),
            instance(2, 12_000, 2, &[1, 2, 3, 4]),
            instance(3, 9_000, 3, &[1, 2, 3]),
        ];
        let balances = compute_balances(&instances, &roster).unwrap();

        let nets: Vec<i64> = balances.iter().map(|(_, b)| b.net.minor()).collect();
        assert_eq!(nets, vec![12_000, 0, -3_000, -9_000]);
        assert_eq!(balances.get(&pid(4)).unwrap().total_owed, m(9_000));
    }

    #[test]
    fn invalid_reference_rejects_everything() {
        let roster = [pid(1), pid(2)];
        let instances = [instance(1, 500, 1, &[1, 2]), instance(2, 700, 1, &[1, 3])];
        let err = compute_balances(&instances, &roster).unwrap_err();
        assert!(err.is_invalid_reference());
        assert_eq!(err.instance_id(), Some(InstanceId::from_uuid(Uuid::from_u128(1_002))));
    }

    #[test]
    fn overflowing_totals_are_rejected() {
        let roster = [pid(1)];
        let instances = [
            instance(1, i64::MAX, 1, &[1]),
            instance(2, 1, 1, &[1]),
        ];
        assert_eq!(
            compute_balances(&instances, &roster).unwrap_err(),
            LedgerError::Overflow { participant_id: pid(1) }
        );
    }

    #[test]
    fn merge_sums_per_participant() {
        let first = compute_balances(&[instance(1, 600, 1, &[1, 2])], &[pid(1), pid(2)]).unwrap();
        let second = compute_balances(&[instance(2, 900, 3, &[2, 3])], &[pid(2), pid(3)]).unwrap();

        let merged = merge_balances([&first, &second]).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get(&pid(1)).unwrap().net, m(300));
        assert_eq!(merged.get(&pid(2)).unwrap(), &Balance::new(m(0), m(750)));
        assert_eq!(merged.get(&pid(3)).unwrap().net, m(450));
        assert_eq!(merged.net_total(), 0);
    }

    #[test]
    fn balances_serialize_as_participant_map() {
        let balances = compute_balances(&[], &[pid(1)]).unwrap();
        let json = serde_json::to_value(&balances).unwrap();
        let key = pid(1).to_string();
        assert_eq!(json[&key]["net"], 0);
    }
}
