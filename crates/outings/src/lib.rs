//! Societies and outings (event-sourced).
//!
//! Business rules for groups of participants and the outings they share
//! expenses in, implemented purely as deterministic domain logic (no IO, no
//! HTTP, no storage). Balance and settlement math is delegated to
//! `compass-ledger`.

pub mod outing;
pub mod society;

pub use outing::{
    AddParticipant, CompleteOuting, CreateOuting, InstanceRecorded, Outing, OutingCommand,
    OutingCompleted, OutingCreated, OutingEvent, OutingId, OutingStatus, ParticipantAdded,
    RecordInstance,
};
pub use society::{
    CreateSociety, JoinSociety, MemberJoined, Society, SocietyCommand, SocietyCreated,
    SocietyEvent, normalize_code,
};
