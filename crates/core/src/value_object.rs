//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: a crop position, a
/// tray layout or a utilization percentage carry no identity of their own. To
/// "modify" one, build a new value.
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// struct Percent(u8);
///
/// impl ValueObject for Percent {}
///
/// assert_eq!(Percent(75), Percent(75));
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
