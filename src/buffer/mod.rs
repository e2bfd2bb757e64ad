//! Buffer module: refreshable regions of a response and the diff over them.
//!
//! This module contains:
//! - [`ResponseBuffer`]: a named region with its checksum and store bounds
//! - [`Checksum`]: CRC-32 plus byte count over a region's own content
//! - [`BufferTree`]: the arena of regions for one response
//! - [`ScopeRegistry`] and [`ScopeChanges`]: rows of repeating regions
//! - [`diff`]: the incremental write engine

#[allow(clippy::module_inception)]
mod buffer;
mod checksum;
pub mod diff;
mod scope;
mod tree;

pub use buffer::{BufferFlags, BufferId, BufferKind, BufferName, ResponseBuffer};
pub use checksum::Checksum;
pub use diff::{DiffStats, DiffWriter};
pub use scope::{Insertion, ScopeChanges, ScopeRegistry};
pub use tree::BufferTree;
