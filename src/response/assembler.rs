//! Response Assembler: turns the renderer's push/append/pop calls into a
//! buffer tree.

use super::response::Response;
use crate::buffer::{BufferId, BufferKind, BufferName, BufferTree, ResponseBuffer};
use crate::config::DiffConfig;
use crate::content::ContentUnit;
use crate::error::{Error, Result};

/// Name given to the lazily created document root.
pub const ROOT_NAME: &str = "document";

/// Name of the accumulator that vetoes incremental delivery.
const REFRESH_NAME: &str = "full-page-refresh";

/// Builds one response during rendering.
///
/// Every `push_buffer` must be matched by exactly one `pop_buffer`. The
/// document root is created on first use and popped by [`finish`](Self::finish).
#[derive(Debug)]
pub struct ResponseAssembler {
    config: DiffConfig,
    tree: BufferTree,
    /// Open buffers, innermost last.
    stack: Vec<BufferId>,
    /// Checksums of buffers popped with `force_refresh`.
    refresh: ResponseBuffer,
}

impl Default for ResponseAssembler {
    fn default() -> Self {
        Self::new(DiffConfig::default())
    }
}

impl ResponseAssembler {
    /// Create an assembler.
    pub fn new(config: DiffConfig) -> Self {
        Self {
            config,
            tree: BufferTree::with_capacity(256),
            stack: Vec::new(),
            refresh: ResponseBuffer::accumulator(REFRESH_NAME.into()),
        }
    }

    /// The active buffer, creating the document root on first access.
    ///
    /// Once the root has been popped this still returns the root; appending
    /// to it then fails with [`Error::BufferClosed`].
    pub fn current_buffer(&mut self) -> BufferId {
        if let Some(&top) = self.stack.last() {
            return top;
        }
        if let Some(root) = self.tree.root() {
            return root;
        }
        let root = self.tree.open_root(ROOT_NAME.into());
        self.stack.push(root);
        root
    }

    /// Number of open buffers, root included.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Open a refreshable region inside the active buffer.
    ///
    /// The kind is inferred: `Scope` if `is_scope`, a row if the active
    /// buffer is a scope, `Normal` otherwise.
    pub fn push_buffer(
        &mut self,
        name: impl Into<BufferName>,
        is_scope: bool,
        always_render: bool,
    ) -> Result<BufferId> {
        let parent = self.current_buffer();
        let kind = if is_scope {
            BufferKind::Scope
        } else if self.tree.buffer(parent).is_scope() {
            BufferKind::ScopeChild
        } else {
            BufferKind::Normal
        };
        self.push_buffer_with_kind(name, kind, always_render)
    }

    /// Open a region of an explicit kind, such as a non-row child of a scope.
    pub fn push_buffer_with_kind(
        &mut self,
        name: impl Into<BufferName>,
        kind: BufferKind,
        always_render: bool,
    ) -> Result<BufferId> {
        let parent = self.current_buffer();
        if self.tree.buffer(parent).is_closed() {
            return Err(Error::BufferClosed {
                name: self.tree.buffer(parent).name().to_string(),
            });
        }
        let id = self.tree.open_child(parent, name.into(), kind, always_render)?;
        self.stack.push(id);
        Ok(id)
    }

    /// Append a unit to the active buffer.
    pub fn append_unit(&mut self, unit: ContentUnit) -> Result<()> {
        let id = self.current_buffer();
        self.tree.append_unit(id, unit, self.config.encoding)
    }

    /// Append text to the active buffer.
    pub fn append_text(&mut self, text: &str) -> Result<()> {
        self.append_unit(ContentUnit::text(text))
    }

    /// Append binary content to the active buffer.
    pub fn append_binary(&mut self, bytes: &[u8]) -> Result<()> {
        self.append_unit(ContentUnit::binary(bytes))
    }

    /// Close the active buffer.
    ///
    /// With `force_refresh`, the buffer's checksum is folded into the
    /// full-page-refresh accumulator: any change to it makes the next
    /// delivery a full page instead of a diff.
    pub fn pop_buffer(&mut self, force_refresh: bool) -> Result<BufferId> {
        let id = self.stack.pop().ok_or(Error::UnbalancedPop)?;
        self.tree.close(id)?;
        if force_refresh {
            self.refresh.absorb(self.tree.buffer(id).checksum());
        }
        Ok(id)
    }

    /// Close the document root and hand over the finished response.
    ///
    /// Fails if any buffer other than the root is still open.
    pub fn finish(mut self) -> Result<Response> {
        self.current_buffer();
        if self.stack.len() > 1 {
            return Err(Error::BuffersStillOpen { open: self.stack.len() });
        }
        if !self.stack.is_empty() {
            self.pop_buffer(false)?;
        }
        Ok(Response::new(self.tree, self.refresh.checksum(), self.config))
    }
}
