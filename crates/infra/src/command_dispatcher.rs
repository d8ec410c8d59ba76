//! Command execution pipeline (application-level orchestration).
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store (society-scoped)
//!   ↓
//! 2. Validate the loaded stream (scope + ordering)
//!   ↓
//! 3. Rehydrate aggregate
//!   ↓
//! 4. Handle command (pure decision logic, produces events)
//!   ↓
//! 5. Append events (optimistic concurrency check)
//! ```
//!
//! The dispatcher contains no IO itself; it composes the `EventStore` trait.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use compass_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, SocietyId};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure or a domain conflict (duplicate, stale).
    #[error("conflict: {0}")]
    Concurrency(String),
    /// A loaded stream mixed societies or aggregates.
    #[error("society isolation violation: {0}")]
    SocietyIsolation(String),
    /// Domain validation failure (deterministic).
    #[error("validation failed: {0}")]
    Validation(String),
    /// Domain invariant failure (deterministic).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    /// Domain authorization failure.
    #[error("unauthorized")]
    Unauthorized,
    /// Domain-level not found.
    #[error("not found")]
    NotFound,
    /// Failed to deserialize historical event payloads into the aggregate event type.
    #[error("event deserialization failed: {0}")]
    Deserialize(String),
    /// The event store failed.
    #[error(transparent)]
    Store(EventStoreError),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            EventStoreError::SocietyIsolation(msg) => DispatchError::SocietyIsolation(msg.clone()),
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Every command runs against a freshly rehydrated aggregate and appends with
/// `ExpectedVersion::Exact(loaded_version)`, so two racing commands on the same
/// stream cannot both commit: the loser gets `DispatchError::Concurrency`.
///
/// Aggregates must be deterministic and side-effect free; replaying the same
/// stream always yields the same state.
#[derive(Debug)]
pub struct CommandDispatcher<S> {
    store: S,
}

impl<S> CommandDispatcher<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> CommandDispatcher<S>
where
    S: EventStore,
{
    /// Dispatch a command through the full pipeline and return the committed
    /// events (with their assigned sequence numbers).
    ///
    /// `make_aggregate` builds the empty aggregate to rehydrate into, e.g.
    /// `|_, id| Outing::empty(OutingId::new(id))`.
    pub fn dispatch<A>(
        &self,
        society_id: SocietyId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(SocietyId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: compass_events::Event + Serialize + DeserializeOwned,
    {
        let aggregate_type = aggregate_type.into();

        // 1) Load history (society-scoped)
        let history = self.store.load_stream(society_id, aggregate_id)?;
        validate_loaded_stream(society_id, aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(society_id, aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = match aggregate.handle(&command) {
            Ok(events) => events,
            Err(err) => {
                debug!(
                    %society_id,
                    %aggregate_id,
                    aggregate_type = %aggregate_type,
                    error = %err,
                    "command rejected"
                );
                return Err(DispatchError::from(err));
            }
        };
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Persist (append-only, optimistic)
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    society_id,
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected).map_err(|err| {
            warn!(%society_id, %aggregate_id, error = %err, "append failed");
            DispatchError::from(err)
        })?;

        for stored in &committed {
            info!(
                %society_id,
                %aggregate_id,
                event_type = %stored.event_type,
                sequence_number = stored.sequence_number,
                "event committed"
            );
        }

        Ok(committed)
    }

    /// Rehydrate an aggregate for reading. A stream that was never written
    /// yields the empty aggregate; callers decide whether that is "not found".
    pub fn load<A>(
        &self,
        society_id: SocietyId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(SocietyId, AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(society_id, aggregate_id)?;
        validate_loaded_stream(society_id, aggregate_id, &history)?;

        let mut aggregate = make_aggregate(society_id, aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Ids of all streams of one aggregate type within a society.
    pub fn stream_ids(
        &self,
        society_id: SocietyId,
        aggregate_type: &str,
    ) -> Result<Vec<AggregateId>, DispatchError> {
        Ok(self.store.stream_ids(society_id, aggregate_type)?)
    }

    /// `(society, aggregate)` pairs of every stream of one type.
    pub fn streams_of_type(
        &self,
        aggregate_type: &str,
    ) -> Result<Vec<(SocietyId, AggregateId)>, DispatchError> {
        Ok(self.store.streams_of_type(aggregate_type)?)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    society_id: SocietyId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Checked even though the store scopes by key: a misbehaving backend must
    // not leak another society's events into this aggregate.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.society_id != society_id {
            return Err(DispatchError::SocietyIsolation(format!(
                "loaded stream contains wrong society_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::SocietyIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let envelope = stored.decode::<A::Event>().map_err(|e| {
            DispatchError::Deserialize(format!(
                "{} at position {}: {e}",
                stored.event_type, stored.sequence_number
            ))
        })?;
        aggregate.apply(envelope.payload());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use compass_core::{AggregateRoot, ParticipantId};
    use compass_outings::{
        CreateOuting, CreateSociety, JoinSociety, Outing, OutingCommand, OutingId, Society,
        SocietyCommand, outing, society,
    };

    use crate::event_store::InMemoryEventStore;

    fn dispatcher() -> CommandDispatcher<Arc<InMemoryEventStore>> {
        CommandDispatcher::new(Arc::new(InMemoryEventStore::new()))
    }

    fn create_society(
        d: &CommandDispatcher<Arc<InMemoryEventStore>>,
        society_id: SocietyId,
        creator: ParticipantId,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        d.dispatch(
            society_id,
            AggregateId::from(society_id),
            society::AGGREGATE_TYPE,
            SocietyCommand::CreateSociety(CreateSociety {
                society_id,
                name: "Hiking Club".to_string(),
                code: "trail".to_string(),
                created_by: creator,
                occurred_at: Utc::now(),
            }),
            |sid, _| Society::empty(sid),
        )
    }

    #[test]
    fn dispatch_persists_and_load_rehydrates() {
        let d = dispatcher();
        let society_id = SocietyId::new();
        let creator = ParticipantId::new();

        let committed = create_society(&d, society_id, creator).unwrap();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].event_type, "outings.society.created");
        assert_eq!(committed[0].sequence_number, 1);

        let joiner = ParticipantId::new();
        d.dispatch(
            society_id,
            AggregateId::from(society_id),
            society::AGGREGATE_TYPE,
            SocietyCommand::JoinSociety(JoinSociety {
                society_id,
                participant_id: joiner,
                code: "TRAIL".to_string(),
                occurred_at: Utc::now(),
            }),
            |sid, _| Society::empty(sid),
        )
        .unwrap();

        let loaded: Society = d
            .load(society_id, AggregateId::from(society_id), |sid, _| Society::empty(sid))
            .unwrap();
        assert_eq!(loaded.version(), 2);
        assert!(loaded.is_member(&creator));
        assert!(loaded.is_member(&joiner));
    }

    #[test]
    fn domain_errors_map_to_dispatch_errors() {
        let d = dispatcher();
        let society_id = SocietyId::new();
        let creator = ParticipantId::new();

        create_society(&d, society_id, creator).unwrap();
        let err = create_society(&d, society_id, creator).unwrap_err();
        assert!(matches!(err, DispatchError::Concurrency(_)));

        let err = d
            .dispatch(
                society_id,
                AggregateId::from(society_id),
                society::AGGREGATE_TYPE,
                SocietyCommand::JoinSociety(JoinSociety {
                    society_id,
                    participant_id: ParticipantId::new(),
                    code: "WRONG".to_string(),
                    occurred_at: Utc::now(),
                }),
                |sid, _| Society::empty(sid),
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[test]
    fn load_of_unwritten_stream_is_empty_aggregate() {
        let d = dispatcher();
        let outing_id = OutingId::new(AggregateId::new());
        let loaded: Outing = d
            .load(SocietyId::new(), outing_id.0, |_, id| Outing::empty(OutingId::new(id)))
            .unwrap();
        assert!(!loaded.is_created());
    }

    #[test]
    fn outing_streams_are_listed_per_society() {
        let d = dispatcher();
        let society_id = SocietyId::new();
        let creator = ParticipantId::new();
        create_society(&d, society_id, creator).unwrap();

        let mut created = Vec::new();
        for name in ["Birthday Celebration", "Weekend Trip"] {
            let outing_id = OutingId::new(AggregateId::new());
            d.dispatch(
                society_id,
                outing_id.0,
                outing::AGGREGATE_TYPE,
                OutingCommand::CreateOuting(CreateOuting {
                    society_id,
                    outing_id,
                    name: name.to_string(),
                    created_by: creator,
                    participants: vec![],
                    occurred_at: Utc::now(),
                }),
                |_, id| Outing::empty(OutingId::new(id)),
            )
            .unwrap();
            created.push(outing_id.0);
        }
        created.sort();

        assert_eq!(d.stream_ids(society_id, outing::AGGREGATE_TYPE).unwrap(), created);
        assert!(
            d.stream_ids(SocietyId::new(), outing::AGGREGATE_TYPE)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn undecodable_history_names_the_bad_event() {
        let store = Arc::new(InMemoryEventStore::new());
        let d = CommandDispatcher::new(Arc::clone(&store));
        let society_id = SocietyId::new();
        let outing_id = OutingId::new(AggregateId::new());

        store
            .append(
                vec![UncommittedEvent {
                    event_id: Uuid::now_v7(),
                    society_id,
                    aggregate_id: outing_id.0,
                    aggregate_type: outing::AGGREGATE_TYPE.to_string(),
                    event_type: "outings.outing.created".to_string(),
                    event_version: 1,
                    occurred_at: Utc::now(),
                    payload: serde_json::json!({ "unexpected": true }),
                }],
                ExpectedVersion::Exact(0),
            )
            .unwrap();

        let err = d
            .load(society_id, outing_id.0, |_, id| Outing::empty(OutingId::new(id)))
            .unwrap_err();
        match err {
            DispatchError::Deserialize(msg) => {
                assert!(msg.contains("outings.outing.created at position 1"), "{msg}");
            }
            other => panic!("expected a decode failure, got {other:?}"),
        }
    }
}
