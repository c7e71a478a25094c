//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. In this
/// core the `(action, resource)` permission pair and a caller's role set are
/// value objects: two permissions naming the same pair are the same permission
/// regardless of which storage row they were read from.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
