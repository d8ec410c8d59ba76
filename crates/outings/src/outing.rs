use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use compass_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, Money, ParticipantId, SocietyId,
};
use compass_events::Event;
use compass_ledger::{ExpenseInstance, LedgerError, LedgerSnapshot, recompute_on_instance_change};

/// Stream type tag for outing event streams.
pub const AGGREGATE_TYPE: &str = "outings.outing";

/// Outing identifier (society-scoped via `society_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutingId(pub AggregateId);

impl OutingId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OutingId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Outing lifecycle: `Ongoing -> Completed` (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutingStatus {
    Ongoing,
    Completed,
}

/// Aggregate root: Outing (a dated activity accumulating expense instances).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outing {
    id: OutingId,
    society_id: Option<SocietyId>,
    name: String,
    created_by: Option<ParticipantId>,
    roster: BTreeSet<ParticipantId>,
    /// In recording order.
    instances: Vec<ExpenseInstance>,
    status: OutingStatus,
    created_at: Option<DateTime<Utc>>,
    final_settlement: Option<LedgerSnapshot>,
    version: u64,
    created: bool,
}

impl Outing {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OutingId) -> Self {
        Self {
            id,
            society_id: None,
            name: String::new(),
            created_by: None,
            roster: BTreeSet::new(),
            instances: Vec::new(),
            status: OutingStatus::Ongoing,
            created_at: None,
            final_settlement: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OutingId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn society_id(&self) -> Option<SocietyId> {
        self.society_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_by(&self) -> Option<ParticipantId> {
        self.created_by
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn status(&self) -> OutingStatus {
        self.status
    }

    /// Roster in ascending participant id order.
    pub fn roster(&self) -> Vec<ParticipantId> {
        self.roster.iter().copied().collect()
    }

    pub fn is_participant(&self, participant: &ParticipantId) -> bool {
        self.roster.contains(participant)
    }

    pub fn instances(&self) -> &[ExpenseInstance] {
        &self.instances
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Sum of all recorded amounts (bounded at entry, cannot overflow).
    pub fn total_amount(&self) -> Money {
        self.instances.iter().map(|i| i.amount).sum()
    }

    /// Current balances and settlement over the recorded instances.
    pub fn settlement(&self) -> Result<LedgerSnapshot, LedgerError> {
        recompute_on_instance_change(&self.roster(), &self.instances)
    }

    /// Snapshot frozen at completion.
    pub fn final_settlement(&self) -> Option<&LedgerSnapshot> {
        self.final_settlement.as_ref()
    }
}

impl AggregateRoot for Outing {
    type Id = OutingId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateOuting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOuting {
    pub society_id: SocietyId,
    pub outing_id: OutingId,
    pub name: String,
    pub created_by: ParticipantId,
    /// Additional participants; the creator is always on the roster.
    pub participants: Vec<ParticipantId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddParticipant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddParticipant {
    pub society_id: SocietyId,
    pub outing_id: OutingId,
    pub participant_id: ParticipantId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordInstance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInstance {
    pub society_id: SocietyId,
    pub outing_id: OutingId,
    pub instance: ExpenseInstance,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteOuting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteOuting {
    pub society_id: SocietyId,
    pub outing_id: OutingId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutingCommand {
    CreateOuting(CreateOuting),
    AddParticipant(AddParticipant),
    RecordInstance(RecordInstance),
    CompleteOuting(CompleteOuting),
}

/// Event: OutingCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutingCreated {
    pub society_id: SocietyId,
    pub outing_id: OutingId,
    pub name: String,
    pub created_by: ParticipantId,
    /// Full initial roster, ascending id order, creator included.
    pub participants: Vec<ParticipantId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ParticipantAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantAdded {
    pub society_id: SocietyId,
    pub outing_id: OutingId,
    pub participant_id: ParticipantId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InstanceRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecorded {
    pub society_id: SocietyId,
    pub outing_id: OutingId,
    pub instance: ExpenseInstance,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OutingCompleted, carrying the final settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutingCompleted {
    pub society_id: SocietyId,
    pub outing_id: OutingId,
    pub settlement: LedgerSnapshot,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutingEvent {
    OutingCreated(OutingCreated),
    ParticipantAdded(ParticipantAdded),
    InstanceRecorded(InstanceRecorded),
    OutingCompleted(OutingCompleted),
}

impl Event for OutingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OutingEvent::OutingCreated(_) => "outings.outing.created",
            OutingEvent::ParticipantAdded(_) => "outings.outing.participant_added",
            OutingEvent::InstanceRecorded(_) => "outings.outing.instance_recorded",
            OutingEvent::OutingCompleted(_) => "outings.outing.completed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OutingEvent::OutingCreated(e) => e.occurred_at,
            OutingEvent::ParticipantAdded(e) => e.occurred_at,
            OutingEvent::InstanceRecorded(e) => e.occurred_at,
            OutingEvent::OutingCompleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Outing {
    type Command = OutingCommand;
    type Event = OutingEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OutingEvent::OutingCreated(e) => {
                self.id = e.outing_id;
                self.society_id = Some(e.society_id);
                self.name = e.name.clone();
                self.created_by = Some(e.created_by);
                self.roster = e.participants.iter().copied().collect();
                self.roster.insert(e.created_by);
                self.status = OutingStatus::Ongoing;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            OutingEvent::ParticipantAdded(e) => {
                self.roster.insert(e.participant_id);
            }
            OutingEvent::InstanceRecorded(e) => {
                self.instances.push(e.instance.clone());
            }
            OutingEvent::OutingCompleted(e) => {
                self.status = OutingStatus::Completed;
                self.final_settlement = Some(e.settlement.clone());
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OutingCommand::CreateOuting(cmd) => self.handle_create(cmd),
            OutingCommand::AddParticipant(cmd) => self.handle_add_participant(cmd),
            OutingCommand::RecordInstance(cmd) => self.handle_record(cmd),
            OutingCommand::CompleteOuting(cmd) => self.handle_complete(cmd),
        }
    }
}

impl Outing {
    fn ensure_existing(&self, society_id: SocietyId, outing_id: OutingId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.society_id != Some(society_id) {
            return Err(DomainError::invariant("society mismatch"));
        }
        if self.id != outing_id {
            return Err(DomainError::invariant("outing_id mismatch"));
        }
        Ok(())
    }

    fn ensure_ongoing(&self) -> Result<(), DomainError> {
        if self.status == OutingStatus::Completed {
            return Err(DomainError::invariant("outing is completed"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateOuting) -> Result<Vec<OutingEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("outing already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        let mut roster: BTreeSet<ParticipantId> = cmd.participants.iter().copied().collect();
        roster.insert(cmd.created_by);

        Ok(vec![OutingEvent::OutingCreated(OutingCreated {
            society_id: cmd.society_id,
            outing_id: cmd.outing_id,
            name: cmd.name.trim().to_string(),
            created_by: cmd.created_by,
            participants: roster.into_iter().collect(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_participant(
        &self,
        cmd: &AddParticipant,
    ) -> Result<Vec<OutingEvent>, DomainError> {
        self.ensure_existing(cmd.society_id, cmd.outing_id)?;
        self.ensure_ongoing()?;

        if self.roster.contains(&cmd.participant_id) {
            return Err(DomainError::conflict("participant is already on the outing"));
        }

        Ok(vec![OutingEvent::ParticipantAdded(ParticipantAdded {
            society_id: cmd.society_id,
            outing_id: cmd.outing_id,
            participant_id: cmd.participant_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record(&self, cmd: &RecordInstance) -> Result<Vec<OutingEvent>, DomainError> {
        self.ensure_existing(cmd.society_id, cmd.outing_id)?;
        self.ensure_ongoing()?;

        let instance = &cmd.instance;
        if instance.name.trim().is_empty() {
            return Err(DomainError::validation("instance name cannot be empty"));
        }
        if self.instances.iter().any(|i| i.id == instance.id) {
            return Err(DomainError::conflict("instance already recorded"));
        }

        // Reject at entry whatever would make later settlement reads fail.
        instance.validate(&self.roster)?;
        if self.total_amount().checked_add(instance.amount).is_none() {
            return Err(DomainError::validation("outing total would overflow"));
        }
        let mut next = self.instances.clone();
        next.push(instance.clone());
        recompute_on_instance_change(&self.roster(), &next)?;

        Ok(vec![OutingEvent::InstanceRecorded(InstanceRecorded {
            society_id: cmd.society_id,
            outing_id: cmd.outing_id,
            instance: instance.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteOuting) -> Result<Vec<OutingEvent>, DomainError> {
        self.ensure_existing(cmd.society_id, cmd.outing_id)?;
        if self.status == OutingStatus::Completed {
            return Err(DomainError::conflict("outing is already completed"));
        }

        let settlement = self.settlement()?;

        Ok(vec![OutingEvent::OutingCompleted(OutingCompleted {
            society_id: cmd.society_id,
            outing_id: cmd.outing_id,
            settlement,
            occurred_at: cmd.occurred_at,
        })])
    }
}
