//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity: two values with the same attributes are the
/// same value. They are immutable; "changing" one means building a new one.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct StorageReference { kind: StorageKind, id: String }
///
/// impl ValueObject for StorageReference {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
