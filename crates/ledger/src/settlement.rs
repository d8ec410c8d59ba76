//! Settlement: turn net balances into a short list of payments.
//!
//! Greedy max-pair: the largest remaining creditor is paired with the
//! largest remaining debtor, ties broken by ascending participant id, until
//! everyone is at zero. Every step zeroes at least one side and the last step
//! zeroes both, so at most `k - 1` transfers are produced for `k` unsettled
//! participants. This is not guaranteed to reach the minimum possible number
//! of transfers (that problem is NP-hard); it is deterministic and close in
//! practice.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use serde::{Deserialize, Serialize};

use compass_core::{Money, ParticipantId, ValueObject};

use crate::balance::Balances;
use crate::error::LedgerError;

/// Suggested payment: `from` pays `amount` to `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: ParticipantId,
    pub to: ParticipantId,
    /// Strictly positive.
    pub amount: Money,
}

impl ValueObject for Transfer {}

/// Max-heap entry: larger magnitude first, then lower participant id.
type Pending = (Money, Reverse<ParticipantId>);

/// Compute the transfers that bring every balance to zero.
///
/// Rejects balances that do not sum to zero instead of settling them
/// partially.
pub fn compute_settlement(balances: &Balances) -> Result<Vec<Transfer>, LedgerError> {
    let total = balances.net_total();
    if total != 0 {
        return Err(LedgerError::Unbalanced { total });
    }

    let mut creditors: BinaryHeap<Pending> = BinaryHeap::new();
    let mut debtors: BinaryHeap<Pending> = BinaryHeap::new();

    for (participant, balance) in balances.iter() {
        let net = balance.net.minor();
        let magnitude = net.checked_abs().ok_or(LedgerError::Overflow {
            participant_id: *participant,
        })?;
        if net > 0 {
            creditors.push((Money::from_minor(magnitude), Reverse(*participant)));
        } else if net < 0 {
            debtors.push((Money::from_minor(magnitude), Reverse(*participant)));
        }
    }

    let mut transfers = Vec::with_capacity(creditors.len() + debtors.len());

    while let (Some((credit, Reverse(creditor))), Some((debt, Reverse(debtor)))) =
        (creditors.pop(), debtors.pop())
    {
        let amount = credit.min(debt);
        transfers.push(Transfer {
            from: debtor,
            to: creditor,
            amount,
        });

        if credit > amount {
            creditors.push((credit - amount, Reverse(creditor)));
        }
        if debt > amount {
            debtors.push((debt - amount, Reverse(debtor)));
        }
    }

    debug_assert!(creditors.is_empty() && debtors.is_empty());
    Ok(transfers)
}

/// Nets left over after paying `transfers`: the payer's net rises by the
/// amount, the receiver's falls by it. A correct settlement leaves all zeros.
pub fn residual_after(balances: &Balances, transfers: &[Transfer]) -> BTreeMap<ParticipantId, i128> {
    let mut residual: BTreeMap<ParticipantId, i128> = balances
        .iter()
        .map(|(p, b)| (*p, b.net.minor() as i128))
        .collect();

    for transfer in transfers {
        *residual.entry(transfer.from).or_insert(0) += transfer.amount.minor() as i128;
        *residual.entry(transfer.to).or_insert(0) -= transfer.amount.minor() as i128;
    }

    residual
}
