//! Read-side queries over outings: settlement, personal balance, society and
//! participant summaries.
//!
//! Nothing here is cached; every call rehydrates from the event store and
//! recomputes with the ledger engine, so results always reflect the latest
//! committed instances.

use serde::Serialize;
use tracing::debug;

use compass_core::{AggregateId, DomainError, Money, ParticipantId, SocietyId};
use compass_ledger::{Balance, Balances, LedgerSnapshot, merge_balances};
use compass_outings::{Outing, OutingId, OutingStatus, Society, outing};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

/// Settlement view of one outing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutingSettlement {
    pub outing_id: OutingId,
    pub status: OutingStatus,
    pub total_amount: Money,
    pub instance_count: usize,
    #[serde(flatten)]
    pub snapshot: LedgerSnapshot,
}

/// Balances merged across every outing of a society.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocietySummary {
    pub society_id: SocietyId,
    pub outing_count: usize,
    pub total_amount: Money,
    pub balances: Balances,
}

/// A participant's standing within one outing, next to the settlement it
/// was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantPosition {
    pub settlement: OutingSettlement,
    pub balance: Balance,
}

/// One society as seen by a single member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocietyParticipation {
    pub society_id: SocietyId,
    pub name: String,
    /// Outings of this society the participant is on.
    pub outing_count: usize,
    pub balance: Balance,
}

/// Everything a participant has across their societies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantSummary {
    pub participant_id: ParticipantId,
    pub total_societies: usize,
    pub total_outings: usize,
    /// The participant's own share of every expense they took part in.
    pub total_spent: Money,
    pub balance: Balance,
    pub societies: Vec<SocietyParticipation>,
}

pub struct LedgerQueries<'a, S> {
    dispatcher: &'a CommandDispatcher<S>,
}

impl<'a, S> LedgerQueries<'a, S>
where
    S: EventStore,
{
    pub fn new(dispatcher: &'a CommandDispatcher<S>) -> Self {
        Self { dispatcher }
    }

    pub fn society(&self, society_id: SocietyId) -> Result<Society, DispatchError> {
        let society: Society = self
            .dispatcher
            .load(society_id, AggregateId::from(society_id), |sid, _| Society::empty(sid))?;
        if !society.is_created() {
            return Err(DispatchError::NotFound);
        }
        Ok(society)
    }

    pub fn outing(&self, society_id: SocietyId, outing_id: OutingId) -> Result<Outing, DispatchError> {
        let loaded: Outing = self
            .dispatcher
            .load(society_id, outing_id.0, |_, id| Outing::empty(OutingId::new(id)))?;
        if !loaded.is_created() {
            return Err(DispatchError::NotFound);
        }
        Ok(loaded)
    }

    /// All outings of a society, ascending by id (creation order for v7 ids).
    pub fn outings(&self, society_id: SocietyId) -> Result<Vec<Outing>, DispatchError> {
        self.dispatcher
            .stream_ids(society_id, outing::AGGREGATE_TYPE)?
            .into_iter()
            .map(|id| self.outing(society_id, OutingId::new(id)))
            .collect()
    }

    /// Current settlement of an outing; a completed outing reports the
    /// snapshot frozen at completion.
    pub fn outing_settlement(
        &self,
        society_id: SocietyId,
        outing_id: OutingId,
    ) -> Result<OutingSettlement, DispatchError> {
        let loaded = self.outing(society_id, outing_id)?;
        settlement_of(&loaded)
    }

    /// One participant's balance within an outing. `NotFound` when they are
    /// not on its roster.
    pub fn participant_position(
        &self,
        society_id: SocietyId,
        outing_id: OutingId,
        participant: ParticipantId,
    ) -> Result<ParticipantPosition, DispatchError> {
        let settlement = self.outing_settlement(society_id, outing_id)?;
        let balance = settlement
            .snapshot
            .balance_of(&participant)
            .copied()
            .ok_or(DispatchError::NotFound)?;
        Ok(ParticipantPosition { settlement, balance })
    }

    pub fn society_summary(&self, society_id: SocietyId) -> Result<SocietySummary, DispatchError> {
        let outings = self.outings(society_id)?;
        let settlements = outings
            .iter()
            .map(settlement_of)
            .collect::<Result<Vec<_>, _>>()?;

        let balances = merge_balances(settlements.iter().map(|s| &s.snapshot.balances))
            .map_err(DomainError::from)?;
        let total_amount = settlements
            .iter()
            .try_fold(Money::ZERO, |acc, s| acc.checked_add(s.total_amount))
            .ok_or_else(|| DispatchError::InvariantViolation("society total overflows".to_string()))?;

        debug!(%society_id, outings = outings.len(), "society summary computed");

        Ok(SocietySummary {
            society_id,
            outing_count: outings.len(),
            total_amount,
            balances,
        })
    }

    /// Merge a participant's balances over the outings they are on, society
    /// by society and then overall. `memberships` are the societies to cover.
    pub fn participant_summary(
        &self,
        participant: ParticipantId,
        memberships: &[Society],
    ) -> Result<ParticipantSummary, DispatchError> {
        let mut societies = Vec::with_capacity(memberships.len());
        let mut per_society = Vec::with_capacity(memberships.len());

        for society in memberships {
            let settlements = self
                .outings(society.id_typed())?
                .iter()
                .filter(|o| o.is_participant(&participant))
                .map(settlement_of)
                .collect::<Result<Vec<_>, _>>()?;
            let merged = merge_balances(settlements.iter().map(|s| &s.snapshot.balances))
                .map_err(DomainError::from)?;

            societies.push(SocietyParticipation {
                society_id: society.id_typed(),
                name: society.name().to_string(),
                outing_count: settlements.len(),
                balance: merged.get(&participant).copied().unwrap_or_default(),
            });
            per_society.push(merged);
        }

        let overall = merge_balances(per_society.iter()).map_err(DomainError::from)?;
        let balance = overall.get(&participant).copied().unwrap_or_default();
        let total_outings: usize = societies.iter().map(|s| s.outing_count).sum();

        debug!(%participant, societies = societies.len(), total_outings, "participant summary computed");

        Ok(ParticipantSummary {
            participant_id: participant,
            total_societies: societies.len(),
            total_outings,
            total_spent: balance.total_owed,
            balance,
            societies,
        })
    }
}

fn settlement_of(loaded: &Outing) -> Result<OutingSettlement, DispatchError> {
    let snapshot = match loaded.final_settlement() {
        Some(frozen) => frozen.clone(),
        None => loaded.settlement().map_err(DomainError::from)?,
    };

    Ok(OutingSettlement {
        outing_id: loaded.id_typed(),
        status: loaded.status(),
        total_amount: loaded.total_amount(),
        instance_count: loaded.instance_count(),
        snapshot,
    })
}
