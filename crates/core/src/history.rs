//! Bounded version history for refs
//!
//! `VersionHistory<T>` holds a ref's published entries ordered
//! newest-first, capped at a fixed depth. The head is the globally
//! visible value; older entries exist solely to serve in-flight readers
//! whose read point predates the head. When a snapshot has aged past the
//! oldest retained entry, the reader must retry against a fresher read
//! point - bounded memory is traded for best-effort old snapshots.

use crate::config::DEFAULT_MAX_HISTORY;
use crate::versioned::Versioned;
use crate::write_point::WritePoint;
use smallvec::SmallVec;

/// A non-empty, bounded sequence of versioned values, newest first.
///
/// # Invariants
///
/// - Never empty: constructed with an initial entry, and `record` only
///   adds
/// - Entry write points strictly decrease from head to tail
/// - `len() <= max_entries()` at all times
#[derive(Debug, Clone)]
pub struct VersionHistory<T> {
    /// Entries ordered newest-first. Always non-empty.
    entries: SmallVec<[Versioned<T>; DEFAULT_MAX_HISTORY]>,

    /// Capacity bound. At least 1.
    max_entries: usize,
}

impl<T> VersionHistory<T> {
    /// Create a history holding exactly the initial entry.
    ///
    /// `max_entries` is clamped to at least 1 so the head always exists.
    pub fn new(initial: Versioned<T>, max_entries: usize) -> Self {
        let mut entries = SmallVec::new();
        entries.push(initial);
        VersionHistory {
            entries,
            max_entries: max_entries.max(1),
        }
    }

    /// Get the head entry (the most recently published value).
    pub fn latest(&self) -> &Versioned<T> {
        &self.entries[0]
    }

    /// Get the newest entry visible at `read_point`.
    ///
    /// Scans newest-to-oldest for the first entry whose write point is
    /// `<= read_point`. Returns `None` when every retained entry is
    /// newer - the snapshot has fallen off the back of the window and
    /// the reader must retry.
    pub fn visible_at(&self, read_point: WritePoint) -> Option<&Versioned<T>> {
        self.entries.iter().find(|e| e.write_point <= read_point)
    }

    /// Record a newly published entry, evicting the oldest past capacity.
    ///
    /// Callers publish under the commit lock with a freshly allocated
    /// write point, so the new entry is strictly newer than the head.
    pub fn record(&mut self, entry: Versioned<T>) {
        debug_assert!(
            entry.write_point > self.entries[0].write_point,
            "history entries must be recorded in increasing write-point order"
        );
        self.entries.insert(0, entry);
        self.entries.truncate(self.max_entries);
    }

    /// Number of entries currently retained.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// A history is never empty; kept for API completeness.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The capacity bound of this history.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// All retained entries, newest first.
    pub fn entries(&self) -> &[Versioned<T>] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: i64, wp: u64) -> Versioned<i64> {
        Versioned::new(value, WritePoint::new(wp))
    }

    fn history_with(entries: &[(i64, u64)], cap: usize) -> VersionHistory<i64> {
        let mut it = entries.iter();
        let (v, wp) = it.next().expect("at least one entry");
        let mut h = VersionHistory::new(entry(*v, *wp), cap);
        for (v, wp) in it {
            h.record(entry(*v, *wp));
        }
        h
    }

    #[test]
    fn test_new_has_single_entry() {
        let h = VersionHistory::new(entry(10, 0), 3);
        assert_eq!(h.len(), 1);
        assert_eq!(*h.latest().value(), 10);
        assert_eq!(h.latest().write_point, WritePoint::ZERO);
    }

    #[test]
    fn test_capacity_clamped_to_one() {
        let mut h = VersionHistory::new(entry(1, 0), 0);
        assert_eq!(h.max_entries(), 1);
        h.record(entry(2, 1));
        assert_eq!(h.len(), 1);
        assert_eq!(*h.latest().value(), 2);
    }

    #[test]
    fn test_record_prepends() {
        let h = history_with(&[(1, 0), (2, 1), (3, 2)], 5);
        assert_eq!(*h.latest().value(), 3);
        assert_eq!(h.entries()[2].value, 1);
    }

    #[test]
    fn test_record_evicts_oldest_at_capacity() {
        let h = history_with(&[(1, 0), (2, 1), (3, 2), (4, 3)], 3);
        assert_eq!(h.len(), 3);
        // Oldest entry (1 @ wp 0) fell off the back
        assert_eq!(h.entries()[2].value, 2);
        assert_eq!(*h.latest().value(), 4);
    }

    #[test]
    fn test_visible_at_finds_newest_at_or_below() {
        let h = history_with(&[(1, 0), (2, 3), (3, 7)], 5);
        assert_eq!(h.visible_at(WritePoint::new(7)).unwrap().value, 3);
        assert_eq!(h.visible_at(WritePoint::new(6)).unwrap().value, 2);
        assert_eq!(h.visible_at(WritePoint::new(3)).unwrap().value, 2);
        assert_eq!(h.visible_at(WritePoint::new(2)).unwrap().value, 1);
        assert_eq!(h.visible_at(WritePoint::new(0)).unwrap().value, 1);
    }

    #[test]
    fn test_visible_at_none_when_snapshot_aged_out() {
        // Capacity 3: wp 0 has been evicted
        let h = history_with(&[(1, 0), (2, 1), (3, 2), (4, 3)], 3);
        assert!(h.visible_at(WritePoint::ZERO).is_none());
        assert_eq!(h.visible_at(WritePoint::new(1)).unwrap().value, 2);
    }

    #[test]
    fn test_write_points_strictly_decrease() {
        let h = history_with(&[(1, 0), (2, 1), (3, 5)], 5);
        let points: Vec<u64> = h.entries().iter().map(|e| e.write_point.as_u64()).collect();
        assert_eq!(points, vec![5, 1, 0]);
    }
}
