use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use compass_core::{AggregateId, ExpectedVersion, SocietyId};

/// An event ready to be appended to a stream (not yet assigned a sequence number).
///
/// Lifecycle: a domain event produced by `Aggregate::handle` is wrapped with
/// stream metadata here, persisted as a [`StoredEvent`], and can be handed to
/// readers as a typed `EventEnvelope` via [`StoredEvent::decode`].
///
/// Use [`UncommittedEvent::from_typed`] to build one from a typed domain event;
/// it serializes the payload and captures the metadata needed to read it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub society_id: SocietyId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A persisted event in an append-only stream.
///
/// Sequence numbers are assigned by the store on append, start at 1, and are
/// per stream (`society_id` + `aggregate_id`) with no gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub society_id: SocietyId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Decode the payload into a typed envelope for replay.
    pub fn decode<E>(&self) -> Result<compass_events::EventEnvelope<E>, serde_json::Error>
    where
        E: DeserializeOwned,
    {
        let payload = serde_json::from_value(self.payload.clone())?;
        Ok(compass_events::EventEnvelope::new(
            self.event_id,
            self.society_id,
            self.aggregate_id,
            self.sequence_number,
            self.occurred_at,
            payload,
        ))
    }
}

/// Event store operation error.
///
/// These are infrastructure failures (storage, concurrency, isolation), as
/// opposed to domain errors.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("society isolation violation: {0}")]
    SocietyIsolation(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Append-only, society-scoped event store.
///
/// One stream per aggregate instance, keyed by `(society_id, aggregate_id)`.
///
/// `append()`:
/// - requires every event in the batch to target the same stream and type
/// - checks `expected_version` against the current stream version
/// - assigns sequence numbers starting at `current_version + 1`
/// - persists the batch atomically
///
/// `load_stream()` returns the stream in sequence order, or an empty vector
/// when nothing has been appended yet.
pub trait EventStore: Send + Sync {
    /// Append events to an aggregate stream.
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the full stream for a society + aggregate.
    fn load_stream(
        &self,
        society_id: SocietyId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Ids of every stream of `aggregate_type` within a society, ascending.
    fn stream_ids(
        &self,
        society_id: SocietyId,
        aggregate_type: &str,
    ) -> Result<Vec<AggregateId>, EventStoreError>;

    /// Every stream of `aggregate_type` across all societies, ascending by
    /// `(society_id, aggregate_id)`.
    fn streams_of_type(
        &self,
        aggregate_type: &str,
    ) -> Result<Vec<(SocietyId, AggregateId)>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(
        &self,
        society_id: SocietyId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(society_id, aggregate_id)
    }

    fn stream_ids(
        &self,
        society_id: SocietyId,
        aggregate_type: &str,
    ) -> Result<Vec<AggregateId>, EventStoreError> {
        (**self).stream_ids(society_id, aggregate_type)
    }

    fn streams_of_type(
        &self,
        aggregate_type: &str,
    ) -> Result<Vec<(SocietyId, AggregateId)>, EventStoreError> {
        (**self).streams_of_type(aggregate_type)
    }
}

impl UncommittedEvent {
    /// Build an uncommitted event from a typed domain event.
    pub fn from_typed<E>(
        society_id: SocietyId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: compass_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            society_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
