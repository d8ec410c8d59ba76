use std::collections::BTreeMap;
use std::sync::RwLock;

use compass_core::{AggregateId, ExpectedVersion, SocietyId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct StreamKey {
    society_id: SocietyId,
    aggregate_id: AggregateId,
}

/// In-memory append-only event store.
///
/// Intended for tests/dev and the single-process server. Streams are kept in
/// key order so listings are deterministic.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<BTreeMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };

        // All events must target the same society + aggregate stream.
        let society_id = first.society_id;
        let aggregate_id = first.aggregate_id;
        let aggregate_type = first.aggregate_type.clone();

        for (idx, e) in events.iter().enumerate() {
            if e.society_id != society_id {
                return Err(EventStoreError::SocietyIsolation(format!(
                    "batch contains multiple society_ids (index {idx})"
                )));
            }
            if e.aggregate_id != aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        let key = StreamKey {
            society_id,
            aggregate_id,
        };

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        let stream = streams.entry(key).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        if let Some(existing) = stream.first() {
            if existing.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    existing.aggregate_type, aggregate_type
                )));
            }
        }

        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                society_id: e.society_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            stream.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    fn load_stream(
        &self,
        society_id: SocietyId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            society_id,
            aggregate_id,
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(streams.get(&key).cloned().unwrap_or_default())
    }

    fn stream_ids(
        &self,
        society_id: SocietyId,
        aggregate_type: &str,
    ) -> Result<Vec<AggregateId>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(streams
            .iter()
            .filter(|(key, stream)| {
                key.society_id == society_id
                    && stream
                        .first()
                        .is_some_and(|e| e.aggregate_type == aggregate_type)
            })
            .map(|(key, _)| key.aggregate_id)
            .collect())
    }

    fn streams_of_type(
        &self,
        aggregate_type: &str,
    ) -> Result<Vec<(SocietyId, AggregateId)>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(streams
            .iter()
            .filter(|(_, stream)| {
                stream
                    .first()
                    .is_some_and(|e| e.aggregate_type == aggregate_type)
            })
            .map(|(key, _)| (key.society_id, key.aggregate_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn event(society_id: SocietyId, aggregate_id: AggregateId, aggregate_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            society_id,
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "outings.outing.created".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn append_assigns_sequence_numbers_from_one() {
        let store = InMemoryEventStore::new();
        let society = SocietyId::new();
        let agg = AggregateId::new();

        let committed = store
            .append(
                vec![event(society, agg, "outings.outing"), event(society, agg, "outings.outing")],
                ExpectedVersion::Exact(0),
            )
            .unwrap();
        assert_eq!(
            committed.iter().map(|e| e.sequence_number).collect::<Vec<_>>(),
            vec![1, 2]
        );

        let more = store
            .append(vec![event(society, agg, "outings.outing")], ExpectedVersion::Exact(2))
            .unwrap();
        assert_eq!(more[0].sequence_number, 3);
        assert_eq!(store.load_stream(society, agg).unwrap().len(), 3);
    }

    #[test]
    fn stored_events_decode_into_envelopes() {
        let store = InMemoryEventStore::new();
        let society = SocietyId::new();
        let membership = AggregateId::from(society);
        let mut joined = event(society, membership, "outings.society");
        joined.payload = json!({ "participant": "p-1" });

        let stored = store.append(vec![joined], ExpectedVersion::Exact(0)).unwrap();
        let envelope = stored[0].decode::<serde_json::Value>().unwrap();

        assert_eq!(envelope.position(), 1);
        assert_eq!(envelope.society_id(), society);
        assert!(envelope.is_membership_event());
        assert_eq!(envelope.payload()["participant"], "p-1");
        assert!(stored[0].decode::<Vec<u8>>().is_err());
    }

    #[test]
    fn stale_expected_version_is_rejected() {
        let store = InMemoryEventStore::new();
        let society = SocietyId::new();
        let agg = AggregateId::new();
        store
            .append(vec![event(society, agg, "outings.outing")], ExpectedVersion::Exact(0))
            .unwrap();

        let err = store
            .append(vec![event(society, agg, "outings.outing")], ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
    }

    #[test]
    fn mixed_society_batch_is_rejected() {
        let store = InMemoryEventStore::new();
        let agg = AggregateId::new();
        let err = store
            .append(
                vec![
                    event(SocietyId::new(), agg, "outings.outing"),
                    event(SocietyId::new(), agg, "outings.outing"),
                ],
                ExpectedVersion::Any,
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::SocietyIsolation(_)));
    }

    #[test]
    fn streams_are_invisible_across_societies() {
        let store = InMemoryEventStore::new();
        let society = SocietyId::new();
        let other = SocietyId::new();
        let agg = AggregateId::new();
        store
            .append(vec![event(society, agg, "outings.outing")], ExpectedVersion::Exact(0))
            .unwrap();

        assert!(store.load_stream(other, agg).unwrap().is_empty());
        assert!(store.stream_ids(other, "outings.outing").unwrap().is_empty());
    }

    #[test]
    fn stream_ids_filter_by_type_in_ascending_order() {
        let store = InMemoryEventStore::new();
        let society = SocietyId::new();
        let first = AggregateId::new();
        let second = AggregateId::new();
        let society_stream = AggregateId::from(society);

        store
            .append(vec![event(society, second, "outings.outing")], ExpectedVersion::Exact(0))
            .unwrap();
        store
            .append(vec![event(society, first, "outings.outing")], ExpectedVersion::Exact(0))
            .unwrap();
        store
            .append(
                vec![event(society, society_stream, "outings.society")],
                ExpectedVersion::Exact(0),
            )
            .unwrap();

        let mut expected = vec![first, second];
        expected.sort();
        assert_eq!(store.stream_ids(society, "outings.outing").unwrap(), expected);
        assert_eq!(
            store.stream_ids(society, "outings.society").unwrap(),
            vec![society_stream]
        );
    }

    #[test]
    fn streams_of_type_spans_societies() {
        let store = InMemoryEventStore::new();
        let first = SocietyId::new();
        let second = SocietyId::new();
        for society in [first, second] {
            store
                .append(
                    vec![event(society, AggregateId::from(society), "outings.society")],
                    ExpectedVersion::Exact(0),
                )
                .unwrap();
            store
                .append(
                    vec![event(society, AggregateId::new(), "outings.outing")],
                    ExpectedVersion::Exact(0),
                )
                .unwrap();
        }

        let mut expected = vec![
            (first, AggregateId::from(first)),
            (second, AggregateId::from(second)),
        ];
        expected.sort();
        assert_eq!(store.streams_of_type("outings.society").unwrap(), expected);
        assert_eq!(store.streams_of_type("outings.outing").unwrap().len(), 2);
        assert!(store.streams_of_type("unknown").unwrap().is_empty());
    }
}
