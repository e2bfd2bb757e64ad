//! `PageSession`: keeps the last delivered response of one page so the next
//! one can be sent as a diff.

use super::response::Response;
use crate::buffer::DiffStats;
use crate::error::Result;
use std::io::Write;
use tracing::{instrument, warn};

/// One page's delivery history, exactly one response deep.
#[derive(Debug, Default)]
pub struct PageSession {
    previous: Option<Response>,
    deliveries: u64,
}

impl PageSession {
    /// Create a session with no history; the first delivery is a full page.
    pub fn new() -> Self {
        Self::default()
    }

    /// The response the next delivery will be diffed against.
    pub const fn previous(&self) -> Option<&Response> {
        self.previous.as_ref()
    }

    /// Number of successful deliveries.
    pub const fn deliveries(&self) -> u64 {
        self.deliveries
    }

    /// Forget the history, forcing the next delivery to be a full page.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Write `response` to `sink`, diffed against the last delivered one,
    /// then keep it for the next cycle.
    ///
    /// The kept response's content is released unless
    /// `verify_equal_content` is set, which needs the bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`](crate::Error::Transport) if the sink
    /// fails. The history is dropped, since the client state is unknown.
    #[instrument(level = "debug", skip_all, fields(delivery = self.deliveries))]
    pub fn deliver<W: Write>(&mut self, mut response: Response, sink: &mut W) -> Result<DiffStats> {
        let previous = self.previous.take();
        let stats = match response.write_to(previous.as_ref(), sink) {
            Ok(stats) => stats,
            Err(err) => {
                warn!(error = %err, "delivery failed; next response will be a full page");
                return Err(err);
            }
        };
        if !response.config().verify_equal_content {
            response.release_content();
        }
        self.previous = Some(response);
        self.deliveries += 1;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiffConfig;
    use crate::response::ResponseAssembler;
    use pretty_assertions::assert_eq;
    use std::io;

    struct ClosedSink;

    impl Write for ClosedSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn counter(value: u32, config: DiffConfig) -> Response {
        let mut assembler = ResponseAssembler::new(config);
        assembler.append_text("<div>").unwrap();
        assembler.push_buffer("count", false, false).unwrap();
        assembler.append_text(&value.to_string()).unwrap();
        assembler.pop_buffer(false).unwrap();
        assembler.append_text("</div>").unwrap();
        assembler.finish().unwrap()
    }

    fn deliver(session: &mut PageSession, response: Response) -> String {
        let mut sink = Vec::new();
        session.deliver(response, &mut sink).unwrap();
        String::from_utf8(sink).unwrap()
    }

    #[test]
    fn test_first_full_then_diff() {
        let config = DiffConfig::default();
        let mut session = PageSession::new();
        assert_eq!(deliver(&mut session, counter(1, config)), "<div>1</div>");
        assert_eq!(deliver(&mut session, counter(2, config)), "2");
        assert_eq!(deliver(&mut session, counter(2, config)), "");
        assert_eq!(session.deliveries(), 3);
    }

    #[test]
    fn test_previous_released() {
        let mut session = PageSession::new();
        deliver(&mut session, counter(1, DiffConfig::default()));
        assert!(session.previous().is_some_and(|previous| !previous.has_content()));

        let verify = DiffConfig::default().with_verify_equal_content(true);
        deliver(&mut session, counter(1, verify));
        assert!(session.previous().is_some_and(Response::has_content));
    }

    #[test]
    fn test_failure_drops_history() {
        let config = DiffConfig::default();
        let mut session = PageSession::new();
        deliver(&mut session, counter(1, config));
        assert!(session.deliver(counter(2, config), &mut ClosedSink).is_err());
        assert!(session.previous().is_none());
        assert_eq!(deliver(&mut session, counter(3, config)), "<div>3</div>");
    }

    #[test]
    fn test_reset() {
        let config = DiffConfig::default();
        let mut session = PageSession::new();
        deliver(&mut session, counter(1, config));
        session.reset();
        assert_eq!(deliver(&mut session, counter(1, config)), "<div>1</div>");
    }
}
