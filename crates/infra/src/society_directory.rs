//! Cross-society lookups: join codes and a participant's memberships.

use compass_core::{ParticipantId, SocietyId};
use compass_outings::{Society, normalize_code, society};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

pub struct SocietyDirectory<'a, S> {
    dispatcher: &'a CommandDispatcher<S>,
}

impl<'a, S> SocietyDirectory<'a, S>
where
    S: EventStore,
{
    pub fn new(dispatcher: &'a CommandDispatcher<S>) -> Self {
        Self { dispatcher }
    }

    /// Every created society, ascending by id.
    pub fn all(&self) -> Result<Vec<Society>, DispatchError> {
        let mut societies = Vec::new();
        for (society_id, aggregate_id) in self.dispatcher.streams_of_type(society::AGGREGATE_TYPE)? {
            let loaded: Society = self
                .dispatcher
                .load(society_id, aggregate_id, |sid, _| Society::empty(sid))?;
            if loaded.is_created() {
                societies.push(loaded);
            }
        }
        Ok(societies)
    }

    /// The society a join code opens, if any. Codes compare case-insensitively.
    pub fn find_by_code(&self, code: &str) -> Result<Option<Society>, DispatchError> {
        if normalize_code(code).is_empty() {
            return Ok(None);
        }
        Ok(self.all()?.into_iter().find(|s| s.accepts_code(code)))
    }

    /// Societies `participant` belongs to, ascending by id.
    pub fn memberships(&self, participant: ParticipantId) -> Result<Vec<Society>, DispatchError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|s| s.is_member(&participant))
            .collect())
    }

    pub fn society_ids_of(&self, participant: ParticipantId) -> Result<Vec<SocietyId>, DispatchError> {
        Ok(self
            .memberships(participant)?
            .iter()
            .map(Society::id_typed)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use compass_core::AggregateId;
    use compass_outings::{CreateSociety, JoinSociety, SocietyCommand};

    use crate::event_store::InMemoryEventStore;

    type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>>;

    fn create(d: &Dispatcher, code: &str, creator: ParticipantId) -> SocietyId {
        let society_id = SocietyId::new();
        d.dispatch(
            society_id,
            AggregateId::from(society_id),
            society::AGGREGATE_TYPE,
            SocietyCommand::CreateSociety(CreateSociety {
                society_id,
                name: format!("Society {code}"),
                code: code.to_string(),
                created_by: creator,
                occurred_at: Utc::now(),
            }),
            |sid, _| Society::empty(sid),
        )
        .unwrap();
        society_id
    }

    fn join(d: &Dispatcher, society_id: SocietyId, code: &str, who: ParticipantId) {
        d.dispatch(
            society_id,
            AggregateId::from(society_id),
            society::AGGREGATE_TYPE,
            SocietyCommand::JoinSociety(JoinSociety {
                society_id,
                participant_id: who,
                code: code.to_string(),
                occurred_at: Utc::now(),
            }),
            |sid, _| Society::empty(sid),
        )
        .unwrap();
    }

    #[test]
    fn finds_society_by_code_in_any_case() {
        let d = CommandDispatcher::new(Arc::new(InMemoryEventStore::new()));
        let office = create(&d, "WORK456", ParticipantId::new());
        create(&d, "COLL123", ParticipantId::new());

        let dir = SocietyDirectory::new(&d);
        let found = dir.find_by_code(" work456 ").unwrap().unwrap();
        assert_eq!(found.id_typed(), office);
        assert!(dir.find_by_code("NOPE").unwrap().is_none());
        assert!(dir.find_by_code("   ").unwrap().is_none());
        assert_eq!(dir.all().unwrap().len(), 2);
    }

    #[test]
    fn memberships_follow_creation_and_joins() {
        let d = CommandDispatcher::new(Arc::new(InMemoryEventStore::new()));
        let alice = ParticipantId::new();
        let bob = ParticipantId::new();
        let first = create(&d, "FIRST", alice);
        let second = create(&d, "SECOND", bob);
        join(&d, second, "second", alice);

        let dir = SocietyDirectory::new(&d);
        let mut expected = vec![first, second];
        expected.sort();
        assert_eq!(dir.society_ids_of(alice).unwrap(), expected);
        assert_eq!(dir.society_ids_of(bob).unwrap(), vec![second]);
        assert!(dir.memberships(ParticipantId::new()).unwrap().is_empty());
    }
}
