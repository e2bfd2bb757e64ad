//! `Response`: a finished buffer tree, ready to be written in full or as a
//! diff against the previous response of the same page.

use crate::buffer::{
    BufferId, BufferName, BufferTree, Checksum, DiffStats, DiffWriter, ResponseBuffer,
};
use crate::config::DiffConfig;
use crate::content::ContentStore;
use crate::error::Result;
use crate::output::OutputBuffer;
use std::collections::HashMap;
use std::io::Write;
use tracing::{debug, instrument};

/// A completely assembled response.
#[derive(Debug)]
pub struct Response {
    tree: BufferTree,
    refresh: Checksum,
    config: DiffConfig,
}

impl Response {
    pub(crate) const fn new(tree: BufferTree, refresh: Checksum, config: DiffConfig) -> Self {
        Self { tree, refresh, config }
    }

    /// The document root.
    pub fn root(&self) -> BufferId {
        // A finished response always has its root
        self.tree.root().unwrap_or(BufferId::new(0))
    }

    /// Metadata of a buffer.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this response.
    pub fn buffer(&self, id: BufferId) -> &ResponseBuffer {
        self.tree.buffer(id)
    }

    /// The whole buffer tree.
    pub const fn tree(&self) -> &BufferTree {
        &self.tree
    }

    /// The content store. Empty once content was released.
    pub const fn store(&self) -> &ContentStore {
        self.tree.store()
    }

    /// The configuration the response was assembled with.
    pub const fn config(&self) -> &DiffConfig {
        &self.config
    }

    /// Rows of the named scope, keyed by row name.
    pub fn scope_children(&self, scope: &str) -> Option<&HashMap<BufferName, BufferId>> {
        self.tree.scopes().rows(scope)
    }

    /// Whether any force-refresh region differs from `other`'s.
    pub fn requires_full_refresh(&self, other: &Self) -> bool {
        self.refresh != other.refresh
    }

    /// Whether writing against `previous` would send anything.
    ///
    /// Checksums only cover a region's own content, so this runs the diff
    /// into a scratch buffer. Always-rendered regions count as changes.
    pub fn has_changed_since(&self, previous: &Self) -> bool {
        if self.requires_full_refresh(previous) {
            return true;
        }
        let config = self.config.with_verify_equal_content(false);
        let mut scratch = OutputBuffer::with_capacity(0, config.encoding);
        let mut writer = DiffWriter::new(&self.tree, Some(&previous.tree), &config);
        writer.write_to(self.root(), Some(previous.root()), &mut scratch);
        !writer.finish().is_unchanged()
    }

    /// Write this response to `sink`.
    ///
    /// Without a previous response, or when a force-refresh region changed,
    /// the whole document is written. Otherwise only the changed regions are
    /// written, with directives telling the client how to patch them in.
    /// Output is accumulated and flushed in one call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`](crate::Error::Transport) if the sink fails.
    #[instrument(level = "debug", skip_all, fields(incremental = previous.is_some()))]
    pub fn write_to<W: Write>(&self, previous: Option<&Self>, sink: &mut W) -> Result<DiffStats> {
        let mut output =
            OutputBuffer::with_capacity(self.config.output_capacity, self.config.encoding);
        let previous = previous.filter(|previous| {
            let refresh = self.requires_full_refresh(previous);
            if refresh {
                debug!("force-refresh region changed; writing full page");
            }
            !refresh
        });

        let mut writer = DiffWriter::new(&self.tree, previous.map(|p| &p.tree), &self.config);
        match previous {
            Some(previous) => writer.write_to(self.root(), Some(previous.root()), &mut output),
            None => writer.render_all(self.root(), &mut output),
        }
        let mut stats = writer.finish();
        stats.bytes_written = output.len();

        output.flush_to(sink)?;
        debug!(bytes = stats.bytes_written, unchanged = stats.is_unchanged(), "response written");
        Ok(stats)
    }

    /// Drop content, keeping only what diffing a later response needs.
    pub fn release_content(&mut self) {
        self.tree.release_content();
    }

    /// Whether content is still held.
    pub fn has_content(&self) -> bool {
        !self.store().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::response::ResponseAssembler;
    use pretty_assertions::assert_eq;
    use std::io;

    struct ClosedSink;

    impl Write for ClosedSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn page(body: &str, title: &str) -> Response {
        let mut assembler = ResponseAssembler::default();
        assembler.append_text("<html>").unwrap();
        assembler.push_buffer("title", false, false).unwrap();
        assembler.append_text(title).unwrap();
        assembler.pop_buffer(true).unwrap();
        assembler.push_buffer("body", false, false).unwrap();
        assembler.append_text(body).unwrap();
        assembler.pop_buffer(false).unwrap();
        assembler.append_text("</html>").unwrap();
        assembler.finish().unwrap()
    }

    fn written(response: &Response, previous: Option<&Response>) -> (String, DiffStats) {
        let mut sink = Vec::new();
        let stats = response.write_to(previous, &mut sink).unwrap();
        (String::from_utf8(sink).unwrap(), stats)
    }

    #[test]
    fn test_full_write_without_previous() {
        let response = page("<p>hi</p>", "T");
        let (out, stats) = written(&response, None);
        assert_eq!(out, "<html>T<p>hi</p></html>");
        assert_eq!(stats.bytes_written, out.len());
        assert_eq!(stats.rendered_all, 1);
    }

    #[test]
    fn test_incremental_write() {
        let before = page("<p>hi</p>", "T");
        let after = page("<p>bye</p>", "T");
        assert!(after.has_changed_since(&before));
        let (out, _) = written(&after, Some(&before));
        assert_eq!(out, "<p>bye</p>");
    }

    #[test]
    fn test_identical_writes_nothing() {
        let before = page("<p>hi</p>", "T");
        let after = page("<p>hi</p>", "T");
        assert!(!after.has_changed_since(&before));
        let (out, stats) = written(&after, Some(&before));
        assert_eq!(out, "");
        assert!(stats.is_unchanged());
    }

    #[test]
    fn test_force_refresh_writes_full_page() {
        let before = page("<p>hi</p>", "Old");
        let after = page("<p>hi</p>", "New");
        let (out, _) = written(&after, Some(&before));
        assert_eq!(out, "<html>New<p>hi</p></html>");
    }

    #[test]
    fn test_diff_against_released_previous() {
        let mut before = page("<p>hi</p>", "T");
        before.release_content();
        assert!(!before.has_content());
        let after = page("<p>bye</p>", "T");
        let (out, _) = written(&after, Some(&before));
        assert_eq!(out, "<p>bye</p>");
    }

    #[test]
    fn test_transport_failure() {
        let response = page("x", "T");
        assert!(matches!(response.write_to(None, &mut ClosedSink), Err(Error::Transport(_))));
    }
}
