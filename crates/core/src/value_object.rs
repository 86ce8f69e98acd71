//! Value objects: data compared structurally.

/// Marker for immutable values with structural equality.
///
/// Two value objects are interchangeable when their fields are equal; there is
/// no identity to compare (see [`Entity`](crate::Entity) for that). Keep fields
/// private and construct through a validating function so that an instance is
/// always valid, and replace rather than mutate.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// pub struct UserName(String);
///
/// impl ValueObject for UserName {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
