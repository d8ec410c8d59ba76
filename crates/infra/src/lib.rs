//! Infrastructure layer: event storage, command dispatch, ledger queries and
//! the society directory.

pub mod command_dispatcher;
pub mod event_store;
pub mod ledger_queries;
pub mod society_directory;

pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use ledger_queries::{
    LedgerQueries, OutingSettlement, ParticipantPosition, ParticipantSummary, SocietyParticipation,
    SocietySummary,
};
pub use society_directory::SocietyDirectory;
