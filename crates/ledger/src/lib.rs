//! Ledger engine: balances and settlement for shared expenses.
//!
//! Pure domain logic only: no IO, no persistence, no shared state. Every
//! function is a deterministic function of its inputs and may be called
//! concurrently from any number of threads.
//!
//! All amounts are integer minor currency units ([`compass_core::Money`]).

pub mod balance;
pub mod engine;
pub mod error;
pub mod instance;
pub mod settlement;

pub use balance::{Balance, Balances, compute_balances, merge_balances, split_equally};
pub use engine::{LedgerSnapshot, recompute_on_instance_change};
pub use error::{LedgerError, ParticipantRole};
pub use instance::ExpenseInstance;
pub use settlement::{Transfer, compute_settlement, residual_after};
