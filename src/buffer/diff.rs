//! Diffing Engine: decide which regions of a response must be re-sent.
//!
//! This module implements the incremental delivery logic:
//! 1. Gate every region on its checksum against the previous response
//! 2. Re-send changed regions in full (`render_all`)
//! 3. Recurse into unchanged `Normal` regions by position
//! 4. Diff unchanged `Scope` regions row by row, emitting only inserted or
//!    updated rows plus one `scopeChanged` directive
//!
//! All output is accumulated in an [`OutputBuffer`] and flushed by the caller.

use super::buffer::{BufferId, BufferKind, ResponseBuffer};
use super::scope::ScopeChanges;
use super::tree::BufferTree;
use crate::config::DiffConfig;
use crate::content::StoreEntry;
use crate::output::{Directive, OutputBuffer};
use tracing::{debug, trace, warn};

/// Result of a diff pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    /// Regions re-sent in full.
    pub rendered_all: usize,
    /// Regions found unchanged.
    pub unchanged: usize,
    /// Scope rows inserted (or moved).
    pub rows_inserted: usize,
    /// Scope rows re-sent because their content changed.
    pub rows_updated: usize,
    /// Scope rows removed.
    pub rows_deleted: usize,
    /// `scopeReplaced` directives written.
    pub scopes_replaced: usize,
    /// `scopeChanged` directives written.
    pub scopes_changed: usize,
    /// Total bytes produced.
    pub bytes_written: usize,
}

impl DiffStats {
    /// Whether the pass found nothing to send.
    pub const fn is_unchanged(&self) -> bool {
        self.rendered_all == 0
            && self.rows_inserted == 0
            && self.rows_updated == 0
            && self.rows_deleted == 0
            && self.scopes_replaced == 0
    }
}

/// Walks a current buffer tree against the previous one and writes the
/// minimal output.
///
/// # Example
///
/// ```rust,ignore
/// let mut writer = DiffWriter::new(&current, Some(&previous), &config);
/// writer.write_to(current_root, previous_root, &mut output);
/// let stats = writer.finish();
/// ```
#[derive(Debug)]
pub struct DiffWriter<'a> {
    current: &'a BufferTree,
    previous: Option<&'a BufferTree>,
    config: &'a DiffConfig,
    stats: DiffStats,
}

impl<'a> DiffWriter<'a> {
    /// Create a writer for `current`, diffed against `previous` if present.
    pub fn new(
        current: &'a BufferTree,
        previous: Option<&'a BufferTree>,
        config: &'a DiffConfig,
    ) -> Self {
        Self {
            current,
            previous,
            config,
            stats: DiffStats::default(),
        }
    }

    /// Statistics gathered so far.
    pub const fn stats(&self) -> &DiffStats {
        &self.stats
    }

    /// Finish the pass and return its statistics.
    pub const fn finish(self) -> DiffStats {
        self.stats
    }

    /// Write `node`, diffed against `previous_node` of the previous tree.
    ///
    /// # Decision
    ///
    /// 1. Always-rendered, unmatched, or changed: `render_all`, plus a
    ///    `scopeReplaced` directive for scopes
    /// 2. Unchanged scope: row-level diff
    /// 3. Unchanged anything else: pairwise recursion by position
    pub fn write_to(
        &mut self,
        node: BufferId,
        previous_node: Option<BufferId>,
        output: &mut OutputBuffer,
    ) {
        let current = self.current;
        let buffer = current.buffer(node);
        let counterpart = self
            .previous
            .zip(previous_node)
            .map(|(tree, id)| (tree, id, tree.buffer(id)));

        match counterpart {
            Some((previous, previous_id, previous_buffer))
                if !buffer.always_render() && buffer.is_equal(previous_buffer) =>
            {
                trace!(name = %buffer.name(), "region unchanged");
                self.stats.unchanged += 1;
                if self.config.verify_equal_content {
                    self.verify_equal(node, previous, previous_id);
                }
                if buffer.is_scope() {
                    self.write_scope(node, previous, previous_id, output);
                } else {
                    self.write_positional(buffer, previous.buffer(previous_id), output);
                }
            }
            _ => {
                trace!(name = %buffer.name(), kind = ?buffer.kind(), "rendering region in full");
                self.render_all(node, output);
                if buffer.is_scope() {
                    self.write_replaced(buffer, output);
                }
            }
        }
    }

    /// Write every content unit of `node`'s region, nested regions included.
    pub fn render_all(&mut self, node: BufferId, output: &mut OutputBuffer) {
        let current = self.current;
        let buffer = current.buffer(node);
        let store = current.store();
        for (_, entry) in store.cursor(buffer.start_index() + 1, buffer.end_index()) {
            if let StoreEntry::Unit(unit) = entry {
                output.write_unit(unit);
            }
        }
        self.stats.rendered_all += 1;
    }

    /// Children matched strictly by position.
    fn write_positional(
        &mut self,
        buffer: &ResponseBuffer,
        previous: &ResponseBuffer,
        output: &mut OutputBuffer,
    ) {
        let previous_children = previous.children();
        for (i, &child) in buffer.children().iter().enumerate() {
            self.write_to(child, previous_children.get(i).copied(), output);
        }
    }

    fn write_replaced(&mut self, buffer: &ResponseBuffer, output: &mut OutputBuffer) {
        output.write_directive(&Directive::ScopeReplaced {
            scope: buffer.name().clone(),
        });
        self.stats.scopes_replaced += 1;
    }

    /// Row-level diff of a scope whose own content is unchanged.
    fn write_scope(
        &mut self,
        node: BufferId,
        previous: &'a BufferTree,
        previous_id: BufferId,
        output: &mut OutputBuffer,
    ) {
        let current = self.current;
        let buffer = current.buffer(node);
        let changes = ScopeChanges::compute(current, node, previous, previous_id);

        if changes.total() > self.config.scope_change_threshold {
            debug!(
                scope = %buffer.name(),
                changes = changes.total(),
                threshold = self.config.scope_change_threshold,
                "too many row changes; replacing scope"
            );
            self.render_all(node, output);
            self.write_replaced(buffer, output);
            return;
        }

        trace!(
            scope = %buffer.name(),
            inserted = changes.inserted.len(),
            updated = changes.updated.len(),
            deleted = changes.deleted.len(),
            "patching scope"
        );

        if changes.has_rerenders() {
            // Wrapper markup verbatim, new or changed rows in full, unchanged rows skipped
            let mut cursor = current.store().cursor(buffer.start_index() + 1, buffer.end_index());
            while let Some((_, entry)) = cursor.next() {
                match entry {
                    StoreEntry::Unit(unit) => output.write_unit(unit),
                    StoreEntry::Buffer(child) => {
                        if changes.rerenders(*child) {
                            self.render_all(*child, output);
                        }
                        cursor.skip_to(current.buffer(*child).end_index());
                    }
                }
            }
        }

        for &child in buffer.children() {
            if changes.rerenders(child) {
                continue;
            }
            let counterpart = Self::scope_counterpart(current, child, previous, previous_id);
            self.write_to(child, counterpart, output);
        }

        self.stats.rows_inserted += changes.inserted.len();
        self.stats.rows_updated += changes.updated.len();
        self.stats.rows_deleted += changes.deleted.len();

        if changes.has_structural_changes() {
            output.write_directive(&Directive::ScopeChanged {
                scope: buffer.name().clone(),
                inserted: changes
                    .inserted
                    .into_iter()
                    .map(|insertion| (insertion.predecessor, insertion.name))
                    .collect(),
                deleted: changes.deleted,
            });
            self.stats.scopes_changed += 1;
        }
    }

    /// Previous counterpart of a scope's child: rows by name through the
    /// previous row registry, other children by name among the previous
    /// scope's direct children.
    fn scope_counterpart(
        current: &BufferTree,
        child: BufferId,
        previous: &BufferTree,
        previous_scope: BufferId,
    ) -> Option<BufferId> {
        let child = current.buffer(child);
        let scope = previous.buffer(previous_scope);
        if child.kind() == BufferKind::ScopeChild {
            previous.scopes().row(scope.name().as_str(), child.name().as_str())
        } else {
            scope
                .children()
                .iter()
                .copied()
                .find(|&id| previous.buffer(id).name() == child.name())
        }
    }

    /// Diagnostic: equal checksums over different bytes.
    fn verify_equal(&self, node: BufferId, previous: &BufferTree, previous_id: BufferId) {
        let encoding = self.config.encoding;
        let (Some(now), Some(before)) = (
            self.current.checksummed_bytes(node, encoding),
            previous.checksummed_bytes(previous_id, encoding),
        ) else {
            return;
        };
        if now != before {
            warn!(
                name = %self.current.buffer(node).name(),
                checksum = ?self.current.buffer(node).checksum(),
                "checksum collision: region judged unchanged but its bytes differ"
            );
        }
    }
}
