//! Write-point identifiers
//!
//! Every successful commit that publishes at least one ref advances the
//! global write point by one and stamps that value onto every history
//! entry it creates. Write points therefore totally order commits, and a
//! transaction's read point (the write point captured at its start) is
//! the upper bound for what its snapshot may observe.

use std::fmt;

/// A global write-point value
///
/// Monotonically increasing per world. The initial value is zero; the
/// first publishing commit stamps its entries with one.
///
/// ## Invariants
///
/// - Write points within one world are totally ordered
/// - A ref's history entries carry strictly decreasing write points,
///   newest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct WritePoint(u64);

impl WritePoint {
    /// The initial write point of a fresh world
    pub const ZERO: WritePoint = WritePoint(0);

    /// Create a write point from a raw counter value
    pub const fn new(value: u64) -> Self {
        WritePoint(value)
    }

    /// Get the raw counter value
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The write point allocated to the next publishing commit
    ///
    /// # Panics
    ///
    /// Panics if the counter reaches `u64::MAX` (overflow).
    pub fn next(self) -> Self {
        WritePoint(
            self.0
                .checked_add(1)
                .expect("write point overflow: u64::MAX reached"),
        )
    }
}

impl fmt::Display for WritePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for WritePoint {
    fn from(value: u64) -> Self {
        WritePoint(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_initial() {
        assert_eq!(WritePoint::ZERO.as_u64(), 0);
        assert_eq!(WritePoint::default(), WritePoint::ZERO);
    }

    #[test]
    fn test_next_increments() {
        let wp = WritePoint::new(41);
        assert_eq!(wp.next(), WritePoint::new(42));
    }

    #[test]
    fn test_ordering() {
        assert!(WritePoint::new(1) < WritePoint::new(2));
        assert!(WritePoint::ZERO < WritePoint::new(1));
    }

    #[test]
    #[should_panic(expected = "write point overflow")]
    fn test_next_panics_on_overflow() {
        let _ = WritePoint::new(u64::MAX).next();
    }
}
