//! Forward-only status discipline shared by transactions and withdrawals.

/// A status column that only ever moves forward
pub trait Lifecycle: Copy + PartialEq + std::fmt::Display {
    /// Terminal statuses accept no further transition
    fn is_terminal(&self) -> bool;

    /// Whether `self -> next` is a legal move
    fn can_transition_to(&self, next: Self) -> bool;

    /// Storage representation
    fn as_str(&self) -> &'static str;
}
