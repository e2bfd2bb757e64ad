//! # response-diff
//!
//! Incremental delivery of server-rendered pages.
//!
//! A page is rendered into named, refreshable regions. Each region carries a
//! checksum of its own content, so the next rendering of the same page can be
//! compared against the previous one and only the regions that changed are
//! sent, together with small inline directives the client uses to patch them
//! into the live document.
//!
//! ## Core Concepts
//!
//! - **Content store**: one append-only sequence of content units per response
//! - **Response buffers**: named regions with a checksum and store bounds
//! - **Scopes**: regions of repeating rows, patched by row insert/update/delete
//! - **Force refresh**: regions whose change vetoes incremental delivery
//!
//! ## Example
//!
//! ```rust
//! use response_diff::{PageSession, ResponseAssembler};
//!
//! fn render(rows: &[(&str, &str)]) -> response_diff::Result<response_diff::Response> {
//!     let mut page = ResponseAssembler::default();
//!     page.append_text("<table>")?;
//!     page.push_buffer("people", true, false)?;
//!     for (id, name) in rows {
//!         page.push_buffer(*id, false, false)?;
//!         page.append_text(&format!("<tr>{name}</tr>"))?;
//!         page.pop_buffer(false)?;
//!     }
//!     page.pop_buffer(false)?;
//!     page.append_text("</table>")?;
//!     page.finish()
//! }
//!
//! # fn main() -> response_diff::Result<()> {
//! let mut session = PageSession::new();
//! let mut sink = Vec::new();
//! session.deliver(render(&[("r1", "Alice")])?, &mut sink)?;
//!
//! sink.clear();
//! session.deliver(render(&[("r1", "Alice"), ("r2", "Bob")])?, &mut sink)?;
//! assert_eq!(
//!     String::from_utf8_lossy(&sink),
//!     "<tr>Bob</tr><script>scopeChanged('people', ['r1','r2'], null);</script>"
//! );
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod buffer;
pub mod config;
pub mod content;
pub mod error;
pub mod output;
pub mod response;

// Re-exports for convenience
pub use buffer::{
    BufferId, BufferKind, BufferName, BufferTree, Checksum, DiffStats, DiffWriter, ResponseBuffer,
};
pub use config::{DiffConfig, DEFAULT_SCOPE_CHANGE_THRESHOLD};
pub use content::{ContentStore, ContentUnit, Encoding};
pub use error::{Error, Result};
pub use output::{Directive, DirectiveError, OutputBuffer};
pub use response::{PageSession, Response, ResponseAssembler};
