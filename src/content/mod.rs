//! Content module: what a response is made of.
//!
//! - [`ContentUnit`]: an immutable, interned fragment of output
//! - [`Encoding`]: byte encodings a unit can be written in
//! - [`ContentStore`]: the append-only entry sequence of one response

mod store;
mod unit;

pub use store::{ContentStore, StoreCursor, StoreEntry};
pub use unit::{ContentUnit, Encoding, UnitInterner};
