//! Response Buffer: a named, checksummed region of the content store.
//!
//! A buffer covers the store range `[start, end)`. The entry at `start` is
//! the buffer's own marker; everything after it up to `end` is the region's
//! content, nested regions included. The checksum only covers the buffer's
//! own top-level content (plus child names, depending on its kind), so
//! nested changes are found by recursing, not by comparing the parent.

use super::checksum::Checksum;
use super::scope::ScopeRegistry;
use crate::content::{ContentStore, ContentUnit, Encoding};
use crate::error::{Error, Result};
use bitflags::bitflags;
use std::borrow::Borrow;
use std::sync::Arc;

/// Index of a buffer within its response.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct BufferId(u32);

impl BufferId {
    /// Create an id from an arena index.
    ///
    /// # Panics
    /// Panics if `index` does not fit in 32 bits.
    #[inline]
    pub fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("more than u32::MAX buffers in one response"))
    }

    /// The arena index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifier correlating a buffer with its counterpart in the previous
/// response. Cheap to clone.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferName(Arc<str>);

impl BufferName {
    /// Create a name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// The name as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for BufferName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BufferName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for BufferName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl std::fmt::Display for BufferName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Debug for BufferName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

/// How a buffer takes part in diffing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum BufferKind {
    /// A plain nested region. Children are compared by position.
    #[default]
    Normal,
    /// An ordered collection of rows that can be inserted, deleted or moved.
    Scope,
    /// One row of a [`BufferKind::Scope`].
    ScopeChild,
}

bitflags! {
    /// Per-buffer state flags.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
    pub struct BufferFlags: u8 {
        /// Re-send the region on every response.
        const ALWAYS_RENDER = 0b0000_0001;
        /// Whitespace-only units do not affect the checksum.
        const IGNORE_WHITESPACE = 0b0000_0010;
        /// The end index is fixed.
        const CLOSED = 0b0000_0100;
    }
}

/// A node of the response buffer tree.
#[derive(Debug, Clone)]
pub struct ResponseBuffer {
    name: BufferName,
    kind: BufferKind,
    flags: BufferFlags,
    checksum: Checksum,
    /// Direct children in document order.
    children: Vec<BufferId>,
    start: usize,
    end: usize,
}

impl ResponseBuffer {
    /// Open a buffer at the current end of `store`.
    ///
    /// Scope buffers ignore whitespace-only content by default.
    pub fn open(
        name: BufferName,
        kind: BufferKind,
        always_render: bool,
        store: &ContentStore,
    ) -> Self {
        let mut flags = BufferFlags::empty();
        flags.set(BufferFlags::ALWAYS_RENDER, always_render);
        flags.set(BufferFlags::IGNORE_WHITESPACE, kind == BufferKind::Scope);
        let start = store.len();
        Self {
            name,
            kind,
            flags,
            checksum: Checksum::ZERO,
            children: Vec::new(),
            start,
            end: start,
        }
    }

    /// A buffer outside of any store that only accumulates checksums.
    pub fn accumulator(name: BufferName) -> Self {
        Self {
            name,
            kind: BufferKind::Normal,
            flags: BufferFlags::empty(),
            checksum: Checksum::ZERO,
            children: Vec::new(),
            start: 0,
            end: 0,
        }
    }

    /// Override whether whitespace-only units are ignored.
    pub fn set_ignore_whitespace(&mut self, ignore: bool) {
        self.flags.set(BufferFlags::IGNORE_WHITESPACE, ignore);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::BufferClosed {
                name: self.name.to_string(),
            });
        }
        Ok(())
    }

    /// Whether `unit` counts towards this buffer's checksum.
    #[inline]
    pub fn charges_unit(&self, unit: &ContentUnit) -> bool {
        !(unit.is_whitespace() && self.ignores_whitespace())
    }

    /// Whether a child of `kind` has its name folded into this buffer's
    /// checksum. Rows of a scope are tracked in the row registry instead.
    #[inline]
    pub const fn folds_child_name(&self, kind: BufferKind) -> bool {
        !matches!((self.kind, kind), (BufferKind::Scope, BufferKind::ScopeChild))
    }

    /// Append a unit to the store and charge it to this buffer.
    pub fn append_unit(
        &mut self,
        unit: ContentUnit,
        store: &mut ContentStore,
        encoding: Encoding,
    ) -> Result<()> {
        self.ensure_open()?;
        if self.charges_unit(&unit) {
            self.checksum.fold(unit.bytes(encoding));
        }
        store.append_unit(unit);
        Ok(())
    }

    /// Record `child` as the next nested region.
    ///
    /// The child's marker goes into the store at the current position.
    /// Rows of a scope are registered in `scopes` instead of being folded
    /// into the scope's checksum.
    pub fn append_child(
        &mut self,
        id: BufferId,
        child: &Self,
        store: &mut ContentStore,
        scopes: &mut ScopeRegistry,
    ) -> Result<()> {
        self.ensure_open()?;
        debug_assert_eq!(child.start, store.len(), "child must open at the store end");
        if self.folds_child_name(child.kind) {
            self.checksum.fold_name(child.name.as_str());
        } else {
            scopes.register(&self.name, &child.name, id);
        }
        store.append_buffer(id);
        self.children.push(id);
        Ok(())
    }

    /// Fix the end of the region at the current end of `store`.
    pub fn close(&mut self, store: &ContentStore) -> Result<()> {
        self.ensure_open()?;
        self.end = store.len();
        self.flags.insert(BufferFlags::CLOSED);
        Ok(())
    }

    /// Fold another buffer's checksum into this one.
    pub fn absorb(&mut self, checksum: Checksum) {
        self.checksum.fold_checksum(checksum);
    }

    /// Whether no re-render is needed relative to `other`.
    #[inline]
    pub fn is_equal(&self, other: &Self) -> bool {
        self.checksum == other.checksum
    }

    /// The correlation name.
    #[inline]
    pub const fn name(&self) -> &BufferName {
        &self.name
    }

    /// The buffer kind.
    #[inline]
    pub const fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Whether this is a scope buffer.
    #[inline]
    pub fn is_scope(&self) -> bool {
        self.kind == BufferKind::Scope
    }

    /// The state flags.
    #[inline]
    pub const fn flags(&self) -> BufferFlags {
        self.flags
    }

    /// Whether the region is re-sent on every response.
    #[inline]
    pub const fn always_render(&self) -> bool {
        self.flags.contains(BufferFlags::ALWAYS_RENDER)
    }

    /// Whether whitespace-only units are left out of the checksum.
    #[inline]
    pub const fn ignores_whitespace(&self) -> bool {
        self.flags.contains(BufferFlags::IGNORE_WHITESPACE)
    }

    /// Whether the end index is fixed.
    #[inline]
    pub const fn is_closed(&self) -> bool {
        self.flags.contains(BufferFlags::CLOSED)
    }

    /// The running checksum.
    #[inline]
    pub const fn checksum(&self) -> Checksum {
        self.checksum
    }

    /// Direct children in document order.
    #[inline]
    pub fn children(&self) -> &[BufferId] {
        &self.children
    }

    /// Store index of this buffer's marker.
    #[inline]
    pub const fn start_index(&self) -> usize {
        self.start
    }

    /// Store index one past the region's last entry. Only meaningful once closed.
    #[inline]
    pub const fn end_index(&self) -> usize {
        self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(name: &str, kind: BufferKind, store: &ContentStore) -> ResponseBuffer {
        ResponseBuffer::open(name.into(), kind, false, store)
    }

    #[test]
    fn test_scope_ignores_whitespace_by_default() {
        let store = ContentStore::new();
        assert!(open("t", BufferKind::Scope, &store).ignores_whitespace());
        assert!(!open("n", BufferKind::Normal, &store).ignores_whitespace());
        assert!(!open("r", BufferKind::ScopeChild, &store).ignores_whitespace());
    }

    #[test]
    fn test_whitespace_folding() {
        let mut store = ContentStore::new();
        let mut scope = open("t", BufferKind::Scope, &store);
        let mut normal = open("n", BufferKind::Normal, &store);
        scope.append_unit(ContentUnit::text("\n  "), &mut store, Encoding::Utf8).unwrap();
        normal.append_unit(ContentUnit::text("\n  "), &mut store, Encoding::Utf8).unwrap();
        assert_eq!(scope.checksum(), Checksum::ZERO);
        assert_ne!(normal.checksum(), Checksum::ZERO);
    }

    #[test]
    fn test_different_content_not_equal() {
        let mut store = ContentStore::new();
        let mut a = open("a", BufferKind::Normal, &store);
        let mut b = open("a", BufferKind::Normal, &store);
        a.append_unit(ContentUnit::text("Alice"), &mut store, Encoding::Utf8).unwrap();
        b.append_unit(ContentUnit::text("Alicf"), &mut store, Encoding::Utf8).unwrap();
        assert!(!a.is_equal(&b));
    }

    #[test]
    fn test_normal_folds_child_names() {
        let mut store = ContentStore::new();
        let mut scopes = ScopeRegistry::default();
        let mut with_child = open("p", BufferKind::Normal, &store);
        let without_child = open("p", BufferKind::Normal, &store);
        let child = open("c", BufferKind::Normal, &store);
        with_child
            .append_child(BufferId::new(1), &child, &mut store, &mut scopes)
            .unwrap();
        assert!(!with_child.is_equal(&without_child));
        assert_eq!(with_child.children(), &[BufferId::new(1)]);
    }

    #[test]
    fn test_text_and_child_name_do_not_run_together() {
        let mut store = ContentStore::new();
        let mut scopes = ScopeRegistry::default();
        let mut a = open("p", BufferKind::Normal, &store);
        a.append_unit(ContentUnit::text("ab"), &mut store, Encoding::Utf8).unwrap();
        let c = open("c", BufferKind::Normal, &store);
        a.append_child(BufferId::new(1), &c, &mut store, &mut scopes).unwrap();

        let mut b = open("p", BufferKind::Normal, &store);
        b.append_unit(ContentUnit::text("a"), &mut store, Encoding::Utf8).unwrap();
        let bc = open("bc", BufferKind::Normal, &store);
        b.append_child(BufferId::new(2), &bc, &mut store, &mut scopes).unwrap();

        assert!(!a.is_equal(&b));
    }

    #[test]
    fn test_scope_registers_rows_without_folding() {
        let mut store = ContentStore::new();
        let mut scopes = ScopeRegistry::default();
        let mut scope = open("tbl", BufferKind::Scope, &store);
        let row = open("r1", BufferKind::ScopeChild, &store);
        scope.append_child(BufferId::new(1), &row, &mut store, &mut scopes).unwrap();
        assert_eq!(scope.checksum(), Checksum::ZERO);
        assert_eq!(scopes.row("tbl", "r1"), Some(BufferId::new(1)));

        let header = open("head", BufferKind::Normal, &store);
        scope.append_child(BufferId::new(2), &header, &mut store, &mut scopes).unwrap();
        assert_ne!(scope.checksum(), Checksum::ZERO);
        assert_eq!(scopes.row("tbl", "head"), None);
    }

    #[test]
    fn test_close_fixes_bounds() {
        let mut store = ContentStore::new();
        let mut buffer = open("b", BufferKind::Normal, &store);
        store.append_buffer(BufferId::new(0));
        buffer.append_unit(ContentUnit::text("x"), &mut store, Encoding::Utf8).unwrap();
        buffer.close(&store).unwrap();
        assert_eq!(buffer.start_index(), 0);
        assert_eq!(buffer.end_index(), 2);
        assert!(buffer.is_closed());

        let err = buffer.append_unit(ContentUnit::text("y"), &mut store, Encoding::Utf8);
        assert!(matches!(err, Err(Error::BufferClosed { .. })));
        assert!(matches!(buffer.close(&store), Err(Error::BufferClosed { .. })));
    }

    #[test]
    fn test_always_render_flag() {
        let store = ContentStore::new();
        let buffer = ResponseBuffer::open("clock".into(), BufferKind::Normal, true, &store);
        assert!(buffer.always_render());
        assert!(buffer.flags().contains(BufferFlags::ALWAYS_RENDER));
    }
}
