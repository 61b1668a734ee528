//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Crops, storage units and stations are entities: a tray keeps its identity while
/// its crops change, and a crop keeps its identity when it is transplanted.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
