use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use compass_core::{AggregateId, SocietyId};

/// One decoded entry of a society's history.
///
/// A society writes two kinds of streams: its own membership stream (keyed by
/// the society id) and one stream per outing. The envelope records which of
/// them the payload came from and where in that stream it sits, so readers
/// can replay outings and memberships without touching raw JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    society_id: SocietyId,
    stream_id: AggregateId,
    /// 1-based, gap-free within `stream_id`.
    position: u64,
    occurred_at: DateTime<Utc>,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        society_id: SocietyId,
        stream_id: AggregateId,
        position: u64,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            society_id,
            stream_id,
            position,
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn society_id(&self) -> SocietyId {
        self.society_id
    }

    pub fn stream_id(&self) -> AggregateId {
        self.stream_id
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// True for the society's own membership stream, false for an outing.
    pub fn is_membership_event(&self) -> bool {
        self.stream_id == AggregateId::from(self.society_id)
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
