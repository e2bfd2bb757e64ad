//! Tunables for the diff engine.

use crate::content::Encoding;

/// Default number of row changes a scope may carry before it is replaced
/// wholesale instead of patched piecewise.
pub const DEFAULT_SCOPE_CHANGE_THRESHOLD: usize = 50;

/// Configuration for assembling and writing responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffConfig {
    /// Maximum inserted + updated + deleted rows for a piecewise scope update.
    pub scope_change_threshold: usize,
    /// Character encoding for text units, both for checksums and output.
    pub encoding: Encoding,
    /// Compare bytes of regions judged equal by checksum and warn on mismatch.
    ///
    /// Requires the previous response to keep its content, so it costs memory.
    pub verify_equal_content: bool,
    /// Initial capacity of the output accumulator.
    pub output_capacity: usize,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            scope_change_threshold: DEFAULT_SCOPE_CHANGE_THRESHOLD,
            encoding: Encoding::Utf8,
            verify_equal_content: false,
            output_capacity: 4096,
        }
    }
}

impl DiffConfig {
    /// Set the scope change threshold.
    pub const fn with_scope_change_threshold(mut self, threshold: usize) -> Self {
        self.scope_change_threshold = threshold;
        self
    }

    /// Set the output encoding.
    pub const fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Enable or disable the checksum collision diagnostic.
    pub const fn with_verify_equal_content(mut self, verify: bool) -> Self {
        self.verify_equal_content = verify;
        self
    }

    /// Set the initial output capacity.
    pub const fn with_output_capacity(mut self, capacity: usize) -> Self {
        self.output_capacity = capacity;
        self
    }
}
