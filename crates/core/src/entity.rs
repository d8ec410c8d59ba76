//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Expense instances are entities: two instances with the same amount and
/// payer are still different bills.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
