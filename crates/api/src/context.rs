use compass_core::ParticipantId;

/// Header carrying the acting participant's id.
pub const PARTICIPANT_HEADER: &str = "x-participant-id";

/// Acting participant for a request.
///
/// Inserted by the participant middleware and present on every route except
/// `/health`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ParticipantContext {
    participant_id: ParticipantId,
}

impl ParticipantContext {
    pub fn new(participant_id: ParticipantId) -> Self {
        Self { participant_id }
    }

    pub fn participant_id(&self) -> ParticipantId {
        self.participant_id
    }
}
