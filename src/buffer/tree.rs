//! Buffer tree: the arena of buffers, the content store they index into,
//! and the scope row registry of one response.

use super::buffer::{BufferId, BufferKind, BufferName, ResponseBuffer};
use super::checksum::Checksum;
use super::scope::ScopeRegistry;
use crate::content::{ContentStore, ContentUnit, Encoding, StoreEntry};
use crate::error::{Error, Result};

/// All buffers of one response.
///
/// Buffers are reachable twice: through their marker in the store and
/// through their parent's child list. The tree owns both.
#[derive(Debug, Default)]
pub struct BufferTree {
    buffers: Vec<ResponseBuffer>,
    store: ContentStore,
    scopes: ScopeRegistry,
    root: Option<BufferId>,
}

impl BufferTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tree with room for `capacity` store entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: ContentStore::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Open the document root: a whitespace-insensitive `Normal` buffer.
    ///
    /// # Panics
    /// Panics if the root is already open.
    pub fn open_root(&mut self, name: BufferName) -> BufferId {
        assert!(self.root.is_none(), "document root opened twice");
        let mut root = ResponseBuffer::open(name, BufferKind::Normal, false, &self.store);
        root.set_ignore_whitespace(true);
        let id = BufferId::new(self.buffers.len());
        self.store.append_buffer(id);
        self.buffers.push(root);
        self.root = Some(id);
        id
    }

    /// Open a buffer nested in `parent`.
    ///
    /// A scope may not sit directly inside a scope, and a scope child needs
    /// a scope parent.
    pub fn open_child(
        &mut self,
        parent: BufferId,
        name: BufferName,
        kind: BufferKind,
        always_render: bool,
    ) -> Result<BufferId> {
        let parent_kind = self.buffer(parent).kind();
        match (parent_kind, kind) {
            (BufferKind::Scope, BufferKind::Scope) => {
                return Err(Error::NestedScope {
                    parent: self.buffer(parent).name().to_string(),
                    child: name.to_string(),
                });
            }
            (BufferKind::Normal | BufferKind::ScopeChild, BufferKind::ScopeChild) => {
                return Err(Error::OrphanScopeChild { name: name.to_string() });
            }
            _ => {}
        }

        let child = ResponseBuffer::open(name, kind, always_render, &self.store);
        let id = BufferId::new(self.buffers.len());
        self.buffers[parent.index()].append_child(id, &child, &mut self.store, &mut self.scopes)?;
        if kind == BufferKind::Scope {
            self.scopes.bind(child.name());
        }
        self.buffers.push(child);
        Ok(id)
    }

    /// Append a unit to buffer `id`.
    pub fn append_unit(
        &mut self,
        id: BufferId,
        unit: ContentUnit,
        encoding: Encoding,
    ) -> Result<()> {
        self.buffers[id.index()].append_unit(unit, &mut self.store, encoding)
    }

    /// Close buffer `id`.
    pub fn close(&mut self, id: BufferId) -> Result<()> {
        self.buffers[id.index()].close(&self.store)
    }

    /// The buffer with `id`.
    ///
    /// # Panics
    /// Panics if `id` does not belong to this tree.
    #[inline]
    pub fn buffer(&self, id: BufferId) -> &ResponseBuffer {
        &self.buffers[id.index()]
    }

    /// The buffer with `id`, if it exists.
    #[inline]
    pub fn get(&self, id: BufferId) -> Option<&ResponseBuffer> {
        self.buffers.get(id.index())
    }

    /// The document root, once opened.
    #[inline]
    pub const fn root(&self) -> Option<BufferId> {
        self.root
    }

    /// First buffer named `name`, in opening order.
    pub fn find(&self, name: &str) -> Option<BufferId> {
        self.buffers
            .iter()
            .position(|buffer| buffer.name().as_str() == name)
            .map(BufferId::new)
    }

    /// The content store.
    #[inline]
    pub const fn store(&self) -> &ContentStore {
        &self.store
    }

    /// The scope row registry.
    #[inline]
    pub const fn scopes(&self) -> &ScopeRegistry {
        &self.scopes
    }

    /// Number of buffers.
    #[inline]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether no buffer was opened.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Whether the content of `id` is still held by the store.
    pub fn has_content(&self, id: BufferId) -> bool {
        let buffer = self.buffer(id);
        buffer.is_closed() && buffer.end_index() <= self.store.len() && !self.store.is_empty()
    }

    /// Render the full region of `id`, or `None` once content is released.
    pub fn render_bytes(&self, id: BufferId, encoding: Encoding) -> Option<Vec<u8>> {
        if !self.has_content(id) {
            return None;
        }
        let buffer = self.buffer(id);
        let mut bytes = Vec::new();
        for (_, entry) in self.store.cursor(buffer.start_index() + 1, buffer.end_index()) {
            if let StoreEntry::Unit(unit) = entry {
                bytes.extend_from_slice(unit.bytes(encoding));
            }
        }
        Some(bytes)
    }

    /// The bytes folded into the checksum of `id`: its own units and the
    /// framed names of its children, nested content skipped. `None` once
    /// content is released.
    pub fn checksummed_bytes(&self, id: BufferId, encoding: Encoding) -> Option<Vec<u8>> {
        if !self.has_content(id) {
            return None;
        }
        let buffer = self.buffer(id);
        let mut bytes = Vec::new();
        let mut cursor = self.store.cursor(buffer.start_index() + 1, buffer.end_index());
        while let Some((_, entry)) = cursor.next() {
            match entry {
                StoreEntry::Unit(unit) => {
                    if buffer.charges_unit(unit) {
                        bytes.extend_from_slice(unit.bytes(encoding));
                    }
                }
                StoreEntry::Buffer(child) => {
                    let child = self.buffer(*child);
                    if buffer.folds_child_name(child.kind()) {
                        Checksum::name_frame(child.name().as_str(), &mut bytes);
                    }
                    cursor.skip_to(child.end_index());
                }
            }
        }
        Some(bytes)
    }

    /// Drop the store's entries. Buffers, checksums and rows stay, which is
    /// all a previous response needs.
    pub fn release_content(&mut self) {
        self.store.clear();
    }
}
