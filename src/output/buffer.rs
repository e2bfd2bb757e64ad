//! `OutputBuffer`: single-flush accumulator for response bytes.

use super::directive::Directive;
use crate::content::{ContentUnit, Encoding};
use std::io::Write;

/// Pre-allocated buffer for building a response body.
///
/// Markup and directives are accumulated here, then flushed to the sink in
/// a single `write_all`. A failed flush leaves nothing to retry.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    data: Vec<u8>,
    encoding: Encoding,
}

impl OutputBuffer {
    /// Create a new output buffer with the given capacity.
    pub fn with_capacity(capacity: usize, encoding: Encoding) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            encoding,
        }
    }

    /// Create a UTF-8 buffer sized for a typical partial page (4KB).
    pub fn new() -> Self {
        Self::with_capacity(4096, Encoding::Utf8)
    }

    /// The encoding units are written in.
    #[inline]
    pub const fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Clear the buffer for reuse.
    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Get the buffer contents.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take the buffer contents.
    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Get the buffer length.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if buffer is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write raw bytes.
    #[inline]
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Write a content unit in the buffer's encoding.
    #[inline]
    pub fn write_unit(&mut self, unit: &ContentUnit) {
        self.data.extend_from_slice(unit.bytes(self.encoding));
    }

    /// Write an inline script directive.
    pub fn write_directive(&mut self, directive: &Directive) {
        let text = directive.to_string();
        self.data.extend_from_slice(&self.encoding.encode(&text));
    }

    /// Flush to a writer in a single call.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying writer fails.
    pub fn flush_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.data)?;
        writer.flush()
    }
}
