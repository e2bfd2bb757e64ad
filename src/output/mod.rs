//! Output module: bytes on their way to the client.
//!
//! - [`OutputBuffer`]: accumulates markup and directives, flushed once
//! - [`Directive`]: inline script instructions for the client-side patcher

mod buffer;
mod directive;

pub use buffer::OutputBuffer;
pub use directive::{Directive, DirectiveError};
