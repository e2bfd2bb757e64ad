//! Response module: assembling responses and delivering them page by page.
//!
//! - [`ResponseAssembler`]: push/append/pop calls into a buffer tree
//! - [`Response`]: a finished tree, written in full or as a diff
//! - [`PageSession`]: retains the previous response for one cycle

mod assembler;
#[allow(clippy::module_inception)]
mod response;
mod session;

pub use assembler::{ResponseAssembler, ROOT_NAME};
pub use response::Response;
pub use session::PageSession;
