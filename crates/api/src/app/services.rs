use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;

use compass_core::{Aggregate, AggregateId, DomainError, ParticipantId, SocietyId};
use compass_infra::{
    CommandDispatcher, DispatchError, EventStoreError, InMemoryEventStore, LedgerQueries,
    SocietyDirectory, StoredEvent,
};
use compass_outings::{CreateSociety, JoinSociety, Society, SocietyCommand, society};

type InMemoryDispatcher = CommandDispatcher<Arc<InMemoryEventStore>>;

/// Shared application services handed to every handler.
pub struct AppServices {
    dispatcher: InMemoryDispatcher,
    currency_scale: u32,
    /// Serialises society creation so two societies never share a code.
    society_codes: Mutex<()>,
}

impl AppServices {
    pub fn in_memory(currency_scale: u32) -> Self {
        let store = Arc::new(InMemoryEventStore::new());
        tracing::info!("using in-memory event store");
        Self {
            dispatcher: CommandDispatcher::new(store),
            currency_scale,
            society_codes: Mutex::new(()),
        }
    }

    pub fn currency_scale(&self) -> u32 {
        self.currency_scale
    }

    pub fn dispatch<A>(
        &self,
        society_id: SocietyId,
        aggregate_id: AggregateId,
        aggregate_type: &'static str,
        command: A::Command,
        make_aggregate: impl FnOnce(SocietyId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: compass_events::Event + Serialize + DeserializeOwned,
    {
        self.dispatcher
            .dispatch(society_id, aggregate_id, aggregate_type, command, make_aggregate)
    }

    pub fn queries(&self) -> LedgerQueries<'_, Arc<InMemoryEventStore>> {
        LedgerQueries::new(&self.dispatcher)
    }

    pub fn directory(&self) -> SocietyDirectory<'_, Arc<InMemoryEventStore>> {
        SocietyDirectory::new(&self.dispatcher)
    }

    /// Create a society whose join code no other society uses yet.
    pub fn create_society(&self, cmd: CreateSociety) -> Result<Society, DispatchError> {
        let _guard = self.society_codes.lock().map_err(|_| {
            DispatchError::Store(EventStoreError::Unavailable(
                "society code registry poisoned".to_string(),
            ))
        })?;

        if self.directory().find_by_code(&cmd.code)?.is_some() {
            tracing::debug!(code = %cmd.code, "society code already taken");
            return Err(DispatchError::Concurrency(format!(
                "society code {} is already in use",
                cmd.code.trim()
            )));
        }

        let society_id = cmd.society_id;
        self.dispatch::<Society>(
            society_id,
            AggregateId::from(society_id),
            society::AGGREGATE_TYPE,
            SocietyCommand::CreateSociety(cmd),
            |sid, _| Society::empty(sid),
        )?;
        self.queries().society(society_id)
    }

    /// Join `society_id` as `participant`, proving membership with `code`.
    pub fn join_society(
        &self,
        society_id: SocietyId,
        participant: ParticipantId,
        code: String,
    ) -> Result<Society, DispatchError> {
        self.dispatch::<Society>(
            society_id,
            AggregateId::from(society_id),
            society::AGGREGATE_TYPE,
            SocietyCommand::JoinSociety(JoinSociety {
                society_id,
                participant_id: participant,
                code,
                occurred_at: chrono::Utc::now(),
            }),
            |sid, _| Society::empty(sid),
        )?;
        self.queries().society(society_id)
    }

    /// Join whichever society `code` opens. `NotFound` for an unknown code.
    pub fn join_by_code(&self, participant: ParticipantId, code: String) -> Result<Society, DispatchError> {
        let target = self
            .directory()
            .find_by_code(&code)?
            .ok_or(DispatchError::NotFound)?;
        self.join_society(target.id_typed(), participant, code)
    }

    /// Load a society and require `participant` to be one of its members.
    pub fn require_member(
        &self,
        society_id: SocietyId,
        participant: ParticipantId,
    ) -> Result<Society, DispatchError> {
        let society = self.queries().society(society_id)?;
        if !society.is_member(&participant) {
            tracing::debug!(%society_id, %participant, "non-member access rejected");
            return Err(DispatchError::Unauthorized);
        }
        Ok(society)
    }
}
