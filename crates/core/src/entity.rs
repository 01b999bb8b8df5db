//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Every persisted record is keyed by its identifier; the record store
/// adapters use this to address documents without knowing the record type.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug + AsRef<str>;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
