use serde::Deserialize;
use serde_json::{Value, json};

use compass_core::{Money, ParticipantId};
use compass_infra::{
    OutingSettlement, ParticipantPosition, ParticipantSummary, SocietyParticipation, SocietySummary,
};
use compass_ledger::{Balance, Balances, ExpenseInstance, LedgerSnapshot, Transfer};
use compass_outings::{Outing, OutingStatus, Society};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateSocietyRequest {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinSocietyRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateOutingRequest {
    pub name: String,
    #[serde(default)]
    pub participants: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddParticipantRequest {
    pub participant_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordInstanceRequest {
    pub name: String,
    /// Decimal amount in display units, e.g. `"100.00"`.
    pub amount: String,
    /// Defaults to the caller.
    pub paid_by: Option<String>,
    /// Defaults to the whole roster.
    pub participants: Option<Vec<String>>,
    pub description: Option<String>,
}

// -------------------------
// Response mapping
// -------------------------

fn status_str(status: OutingStatus) -> &'static str {
    match status {
        OutingStatus::Ongoing => "ongoing",
        OutingStatus::Completed => "completed",
    }
}

fn ids_json<'a>(ids: impl IntoIterator<Item = &'a ParticipantId>) -> Vec<String> {
    ids.into_iter().map(|id| id.to_string()).collect()
}

/// Display form of a signed amount.
pub fn money_str(amount: Money, scale: u32) -> String {
    amount.to_decimal_string(scale)
}

pub fn society_to_json(society: &Society) -> Value {
    json!({
        "id": society.id_typed().to_string(),
        "name": society.name(),
        "code": society.code(),
        "created_by": society.created_by().map(|p| p.to_string()),
        "members": ids_json(society.members()),
        "member_count": society.member_count(),
        "created_at": society.created_at().map(|t| t.to_rfc3339()),
    })
}

pub fn instance_to_json(instance: &ExpenseInstance, scale: u32) -> Value {
    json!({
        "id": instance.id.to_string(),
        "name": instance.name,
        "amount_minor": instance.amount.minor(),
        "amount": money_str(instance.amount, scale),
        "paid_by": instance.paid_by.to_string(),
        "participants": ids_json(&instance.participants),
        "description": instance.description,
        "created_at": instance.created_at.to_rfc3339(),
    })
}

/// Compact listing entry.
pub fn outing_summary_to_json(outing: &Outing, scale: u32) -> Value {
    json!({
        "id": outing.id_typed().to_string(),
        "name": outing.name(),
        "status": status_str(outing.status()),
        "participant_count": outing.roster().len(),
        "instance_count": outing.instance_count(),
        "total_amount_minor": outing.total_amount().minor(),
        "total_amount": money_str(outing.total_amount(), scale),
        "created_at": outing.created_at().map(|t| t.to_rfc3339()),
    })
}

pub fn outing_to_json(outing: &Outing, scale: u32) -> Value {
    json!({
        "id": outing.id_typed().to_string(),
        "society_id": outing.society_id().map(|s| s.to_string()),
        "name": outing.name(),
        "status": status_str(outing.status()),
        "created_by": outing.created_by().map(|p| p.to_string()),
        "participants": ids_json(&outing.roster()),
        "instances": outing
            .instances()
            .iter()
            .map(|i| instance_to_json(i, scale))
            .collect::<Vec<_>>(),
        "instance_count": outing.instance_count(),
        "total_amount_minor": outing.total_amount().minor(),
        "total_amount": money_str(outing.total_amount(), scale),
        "created_at": outing.created_at().map(|t| t.to_rfc3339()),
    })
}

pub fn balance_to_json(participant: &ParticipantId, balance: &Balance, scale: u32) -> Value {
    let position = if balance.net.is_positive() {
        "owed"
    } else if balance.net.is_negative() {
        "owes"
    } else {
        "settled"
    };
    json!({
        "participant_id": participant.to_string(),
        "total_paid_minor": balance.total_paid.minor(),
        "total_paid": money_str(balance.total_paid, scale),
        "total_owed_minor": balance.total_owed.minor(),
        "total_owed": money_str(balance.total_owed, scale),
        "net_minor": balance.net.minor(),
        "net": money_str(balance.net, scale),
        "position": position,
    })
}

pub fn balances_to_json(balances: &Balances, scale: u32) -> Vec<Value> {
    balances
        .iter()
        .map(|(p, b)| balance_to_json(p, b, scale))
        .collect()
}

pub fn transfer_to_json(transfer: &Transfer, scale: u32) -> Value {
    json!({
        "from": transfer.from.to_string(),
        "to": transfer.to.to_string(),
        "amount_minor": transfer.amount.minor(),
        "amount": money_str(transfer.amount, scale),
    })
}

pub fn snapshot_to_json(snapshot: &LedgerSnapshot, scale: u32) -> Value {
    json!({
        "balances": balances_to_json(&snapshot.balances, scale),
        "transfers": snapshot
            .transfers
            .iter()
            .map(|t| transfer_to_json(t, scale))
            .collect::<Vec<_>>(),
        "volume_minor": snapshot.volume().minor(),
        "volume": money_str(snapshot.volume(), scale),
    })
}

pub fn settlement_to_json(settlement: &OutingSettlement, scale: u32) -> Value {
    json!({
        "outing_id": settlement.outing_id.to_string(),
        "status": status_str(settlement.status),
        "instance_count": settlement.instance_count,
        "total_amount_minor": settlement.total_amount.minor(),
        "total_amount": money_str(settlement.total_amount, scale),
        "settlement": snapshot_to_json(&settlement.snapshot, scale),
    })
}

/// "My balance" view: position plus the transfers that involve the caller.
pub fn my_balance_to_json(
    position: &ParticipantPosition,
    participant: &ParticipantId,
    scale: u32,
) -> Value {
    let snapshot = &position.settlement.snapshot;
    let pay = snapshot
        .payments_from(participant)
        .map(|t| transfer_to_json(t, scale))
        .collect::<Vec<_>>();
    let receive = snapshot
        .payments_to(participant)
        .map(|t| transfer_to_json(t, scale))
        .collect::<Vec<_>>();

    json!({
        "outing_id": position.settlement.outing_id.to_string(),
        "balance": balance_to_json(participant, &position.balance, scale),
        "payments_to_make": pay,
        "payments_to_receive": receive,
    })
}

/// A society as listed for one of its members.
pub fn membership_to_json(society: &Society, participant: &ParticipantId, outing_count: usize) -> Value {
    json!({
        "id": society.id_typed().to_string(),
        "name": society.name(),
        "code": society.code(),
        "is_creator": society.created_by() == Some(*participant),
        "joined_at": society.joined_at(participant).map(|t| t.to_rfc3339()),
        "member_count": society.member_count(),
        "outing_count": outing_count,
    })
}

fn participation_to_json(p: &SocietyParticipation, scale: u32) -> Value {
    json!({
        "society_id": p.society_id.to_string(),
        "name": p.name,
        "outing_count": p.outing_count,
        "net_minor": p.balance.net.minor(),
        "net": money_str(p.balance.net, scale),
    })
}

pub fn participant_summary_to_json(summary: &ParticipantSummary, scale: u32) -> Value {
    json!({
        "participant_id": summary.participant_id.to_string(),
        "total_societies": summary.total_societies,
        "total_outings": summary.total_outings,
        "total_spent_minor": summary.total_spent.minor(),
        "total_spent": money_str(summary.total_spent, scale),
        "balance": balance_to_json(&summary.participant_id, &summary.balance, scale),
        "societies": summary
            .societies
            .iter()
            .map(|p| participation_to_json(p, scale))
            .collect::<Vec<_>>(),
    })
}

pub fn summary_to_json(summary: &SocietySummary, scale: u32) -> Value {
    json!({
        "society_id": summary.society_id.to_string(),
        "outing_count": summary.outing_count,
        "total_amount_minor": summary.total_amount.minor(),
        "total_amount": money_str(summary.total_amount, scale),
        "balances": balances_to_json(&summary.balances, scale),
    })
}
