//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Two entities are the same entity when their identifiers match, whatever
/// their other attributes hold. Implementors that want `==` to follow identity
/// can delegate `PartialEq` to [`Entity::same_identity`].
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Identity comparison, ignoring every non-identity attribute.
    fn same_identity(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
