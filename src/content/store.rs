//! Content Store: the append-only entry sequence shared by one response.
//!
//! Every content unit and every buffer opening is recorded here in document
//! order. A buffer's region is a contiguous index range `[start, end)` whose
//! first entry is the buffer's own marker, so a single linear scan over the
//! store reconstructs the nesting.
//!
//! Out-of-range access is a caller bug and panics.

use super::unit::ContentUnit;
use crate::buffer::BufferId;

/// One entry of the store.
#[derive(Debug, Clone)]
pub enum StoreEntry {
    /// A fragment of output.
    Unit(ContentUnit),
    /// The position at which a buffer was opened.
    Buffer(BufferId),
}

/// Append-only sequence of entries.
#[derive(Debug, Default)]
pub struct ContentStore {
    entries: Vec<StoreEntry>,
}

impl ContentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Number of entries appended so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a content unit.
    #[inline]
    pub fn append_unit(&mut self, unit: ContentUnit) {
        self.entries.push(StoreEntry::Unit(unit));
    }

    /// Append a buffer marker.
    #[inline]
    pub fn append_buffer(&mut self, id: BufferId) {
        self.entries.push(StoreEntry::Buffer(id));
    }

    /// Get the entry at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&StoreEntry> {
        self.entries.get(index)
    }

    /// Iterate over `[start, end)`.
    ///
    /// # Panics
    /// Panics if the range is inverted or reaches past the end of the store.
    pub fn cursor(&self, start: usize, end: usize) -> StoreCursor<'_> {
        assert!(
            start <= end && end <= self.entries.len(),
            "store range {start}..{end} out of bounds (len {})",
            self.entries.len()
        );
        StoreCursor {
            entries: &self.entries,
            next: start,
            end,
        }
    }

    /// Drop every entry, keeping the allocation.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Approximate heap usage in bytes.
    pub fn memory_usage(&self) -> usize {
        self.entries.capacity() * std::mem::size_of::<StoreEntry>()
    }
}

/// A forward cursor over a range of the store.
///
/// Yields `(index, entry)` pairs. [`skip_to`](Self::skip_to) jumps over the
/// interior of a child region that has already been handled.
#[derive(Debug, Clone)]
pub struct StoreCursor<'a> {
    entries: &'a [StoreEntry],
    next: usize,
    end: usize,
}

impl StoreCursor<'_> {
    /// Index of the entry the next call to `next` yields.
    #[inline]
    pub const fn position(&self) -> usize {
        self.next
    }

    /// Continue iteration at `index`.
    ///
    /// # Panics
    /// Panics if `index` is behind the cursor or past the end of its range.
    pub fn skip_to(&mut self, index: usize) {
        assert!(
            index >= self.next && index <= self.end,
            "skip_to({index}) outside cursor range {}..{}",
            self.next,
            self.end
        );
        self.next = index;
    }
}

impl<'a> Iterator for StoreCursor<'a> {
    type Item = (usize, &'a StoreEntry);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some((index, &self.entries[index]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for StoreCursor<'_> {}
