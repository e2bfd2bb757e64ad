//! Error types for response assembly and delivery.
//!
//! Consistency violations indicate a renderer that broke the push/pop
//! contract. They are reported to the caller and never recovered from
//! inside the engine.

use std::io;

/// Errors raised while assembling or writing a response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `pop_buffer` was called with no buffer open.
    #[error("buffer stack is empty: pop without matching push")]
    UnbalancedPop,

    /// The response was finished while nested buffers were still open.
    #[error("response finished with {open} buffer(s) still open")]
    BuffersStillOpen {
        /// Number of open buffers, root included.
        open: usize,
    },

    /// A scope buffer was opened directly inside another scope buffer.
    #[error("scope `{child}` may not be nested directly inside scope `{parent}`")]
    NestedScope {
        /// Name of the enclosing scope.
        parent: String,
        /// Name of the rejected scope.
        child: String,
    },

    /// A scope child was opened outside of a scope buffer.
    #[error("scope child `{name}` has no enclosing scope")]
    OrphanScopeChild {
        /// Name of the rejected row.
        name: String,
    },

    /// Content was appended to a buffer whose bounds are already fixed.
    #[error("buffer `{name}` is closed")]
    BufferClosed {
        /// Name of the closed buffer.
        name: String,
    },

    /// Writing to the output sink failed.
    #[error("transport failure while writing response")]
    Transport(#[from] io::Error),
}

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_wraps_io_error() {
        let err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(err, Error::Transport(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_messages_name_buffers() {
        let err = Error::NestedScope {
            parent: "outer".into(),
            child: "inner".into(),
        };
        assert_eq!(
            err.to_string(),
            "scope `inner` may not be nested directly inside scope `outer`"
        );
        assert_eq!(
            Error::BuffersStillOpen { open: 3 }.to_string(),
            "response finished with 3 buffer(s) still open"
        );
    }
}
