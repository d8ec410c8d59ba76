use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use compass_core::{Aggregate, AggregateRoot, DomainError, ParticipantId, SocietyId};
use compass_events::Event;

/// Stream type tag for society event streams.
pub const AGGREGATE_TYPE: &str = "outings.society";

/// Aggregate root: Society (a persistent group of participants).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Society {
    id: SocietyId,
    name: String,
    code: String,
    created_by: Option<ParticipantId>,
    /// Member -> when they joined.
    members: BTreeMap<ParticipantId, DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Society {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SocietyId) -> Self {
        Self {
            id,
            name: String::new(),
            code: String::new(),
            created_by: None,
            members: BTreeMap::new(),
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SocietyId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Join code, always upper case.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn created_by(&self) -> Option<ParticipantId> {
        self.created_by
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Members in ascending id order.
    pub fn members(&self) -> impl Iterator<Item = &ParticipantId> {
        self.members.keys()
    }

    pub fn joined_at(&self, participant: &ParticipantId) -> Option<DateTime<Utc>> {
        self.members.get(participant).copied()
    }

    /// Whether a join code (any case, surrounding blanks ignored) opens this society.
    pub fn accepts_code(&self, code: &str) -> bool {
        self.created && normalize_code(code) == self.code
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_member(&self, participant: &ParticipantId) -> bool {
        self.members.contains_key(participant)
    }
}

impl AggregateRoot for Society {
    type Id = SocietyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateSociety.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSociety {
    pub society_id: SocietyId,
    pub name: String,
    pub code: String,
    pub created_by: ParticipantId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: JoinSociety (by join code).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSociety {
    pub society_id: SocietyId,
    pub participant_id: ParticipantId,
    pub code: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocietyCommand {
    CreateSociety(CreateSociety),
    JoinSociety(JoinSociety),
}

/// Event: SocietyCreated (the creator is the first member).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocietyCreated {
    pub society_id: SocietyId,
    pub name: String,
    pub code: String,
    pub created_by: ParticipantId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MemberJoined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberJoined {
    pub society_id: SocietyId,
    pub participant_id: ParticipantId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocietyEvent {
    SocietyCreated(SocietyCreated),
    MemberJoined(MemberJoined),
}

impl Event for SocietyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SocietyEvent::SocietyCreated(_) => "outings.society.created",
            SocietyEvent::MemberJoined(_) => "outings.society.member_joined",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SocietyEvent::SocietyCreated(e) => e.occurred_at,
            SocietyEvent::MemberJoined(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Society {
    type Command = SocietyCommand;
    type Event = SocietyEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SocietyEvent::SocietyCreated(e) => {
                self.id = e.society_id;
                self.name = e.name.clone();
                self.code = e.code.clone();
                self.created_by = Some(e.created_by);
                self.members.insert(e.created_by, e.occurred_at);
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            SocietyEvent::MemberJoined(e) => {
                self.members.insert(e.participant_id, e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SocietyCommand::CreateSociety(cmd) => self.handle_create(cmd),
            SocietyCommand::JoinSociety(cmd) => self.handle_join(cmd),
        }
    }
}

/// Canonical join code form: trimmed, upper case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl Society {
    fn ensure_society_id(&self, society_id: SocietyId) -> Result<(), DomainError> {
        if self.id != society_id {
            return Err(DomainError::invariant("society_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateSociety) -> Result<Vec<SocietyEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("society already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let code = normalize_code(&cmd.code);
        if code.is_empty() {
            return Err(DomainError::validation("code cannot be empty"));
        }

        Ok(vec![SocietyEvent::SocietyCreated(SocietyCreated {
            society_id: cmd.society_id,
            name: cmd.name.trim().to_string(),
            code,
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_join(&self, cmd: &JoinSociety) -> Result<Vec<SocietyEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_society_id(cmd.society_id)?;

        if !self.accepts_code(&cmd.code) {
            return Err(DomainError::validation("society code does not match"));
        }
        if self.is_member(&cmd.participant_id) {
            return Err(DomainError::conflict("participant is already a member"));
        }

        Ok(vec![SocietyEvent::MemberJoined(MemberJoined {
            society_id: cmd.society_id,
            participant_id: cmd.participant_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_core::aggregate::execute;

    fn test_society_id() -> SocietyId {
        SocietyId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_society(society_id: SocietyId, creator: ParticipantId) -> Society {
        let mut society = Society::empty(society_id);
        execute(
            &mut society,
            &SocietyCommand::CreateSociety(CreateSociety {
                society_id,
                name: "College Friends".to_string(),
                code: "coll123".to_string(),
                created_by: creator,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        society
    }

    #[test]
    fn create_society_normalizes_code_and_adds_creator() {
        let society_id = test_society_id();
        let creator = ParticipantId::new();
        let society = created_society(society_id, creator);

        assert_eq!(society.code(), "COLL123");
        assert_eq!(society.name(), "College Friends");
        assert_eq!(society.created_by(), Some(creator));
        assert!(society.is_member(&creator));
        assert_eq!(society.member_count(), 1);
        assert_eq!(society.version(), 1);
    }

    #[test]
    fn create_society_rejects_blank_name_or_code() {
        let society = Society::empty(test_society_id());
        for (name, code) in [("   ", "ABC"), ("Office Team", "  ")] {
            let cmd = SocietyCommand::CreateSociety(CreateSociety {
                society_id: society.id_typed(),
                name: name.to_string(),
                code: code.to_string(),
                created_by: ParticipantId::new(),
                occurred_at: test_time(),
            });
            match society.handle(&cmd).unwrap_err() {
                DomainError::Validation(_) => {}
                other => panic!("Expected Validation error, got {other:?}"),
            }
        }
    }

    #[test]
    fn create_society_rejects_duplicate_creation() {
        let society_id = test_society_id();
        let society = created_society(society_id, ParticipantId::new());
        let cmd = SocietyCommand::CreateSociety(CreateSociety {
            society_id,
            name: "Again".to_string(),
            code: "X".to_string(),
            created_by: ParticipantId::new(),
            occurred_at: test_time(),
        });

        match society.handle(&cmd).unwrap_err() {
            DomainError::Conflict(_) => {}
            other => panic!("Expected Conflict error, got {other:?}"),
        }
    }

    #[test]
    fn join_with_matching_code_is_case_insensitive() {
        let society_id = test_society_id();
        let mut society = created_society(society_id, ParticipantId::new());
        let joiner = ParticipantId::new();

        let events = execute(
            &mut society,
            &SocietyCommand::JoinSociety(JoinSociety {
                society_id,
                participant_id: joiner,
                code: " Coll123 ".to_string(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        assert_eq!(events.len(), 1);
        assert!(society.is_member(&joiner));
        assert_eq!(society.member_count(), 2);
    }

    #[test]
    fn join_rejects_wrong_code_and_repeat_joins() {
        let society_id = test_society_id();
        let creator = ParticipantId::new();
        let society = created_society(society_id, creator);

        let wrong = SocietyCommand::JoinSociety(JoinSociety {
            society_id,
            participant_id: ParticipantId::new(),
            code: "WORK456".to_string(),
            occurred_at: test_time(),
        });
        assert!(matches!(society.handle(&wrong), Err(DomainError::Validation(_))));

        let again = SocietyCommand::JoinSociety(JoinSociety {
            society_id,
            participant_id: creator,
            code: "COLL123".to_string(),
            occurred_at: test_time(),
        });
        assert!(matches!(society.handle(&again), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn join_rejects_missing_society() {
        let society = Society::empty(test_society_id());
        let cmd = SocietyCommand::JoinSociety(JoinSociety {
            society_id: society.id_typed(),
            participant_id: ParticipantId::new(),
            code: "ANY".to_string(),
            occurred_at: test_time(),
        });
        assert_eq!(society.handle(&cmd).unwrap_err(), DomainError::NotFound);
    }

    #[test]
    fn members_remember_when_they_joined() {
        let society_id = test_society_id();
        let creator = ParticipantId::new();
        let mut society = created_society(society_id, creator);
        let joiner = ParticipantId::new();
        let joined = test_time();

        execute(
            &mut society,
            &SocietyCommand::JoinSociety(JoinSociety {
                society_id,
                participant_id: joiner,
                code: "coll123".to_string(),
                occurred_at: joined,
            }),
        )
        .unwrap();

        assert_eq!(society.joined_at(&joiner), Some(joined));
        assert_eq!(society.joined_at(&creator), society.created_at());
        assert_eq!(society.joined_at(&ParticipantId::new()), None);
    }

    #[test]
    fn accepts_code_ignores_case_and_blanks() {
        let society = created_society(test_society_id(), ParticipantId::new());
        assert!(society.accepts_code("  coll123"));
        assert!(!society.accepts_code("COLL12"));
        assert!(!Society::empty(test_society_id()).accepts_code(""));
        assert_eq!(normalize_code(" ab-c "), "AB-C");
    }
}
