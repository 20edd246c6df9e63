//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two quantities
/// of `600` bushels are the same quantity, while two lots of `600` bushels are
/// different lots.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
