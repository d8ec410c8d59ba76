//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity and are compared by their attribute values.
/// `Money` and the derived ledger results (`Balance`, `Transfer`) are value
/// objects; participants and expense instances are entities.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
