//! HTTP client implementation
//!
//! The client writes a request head followed by a body pulled from a
//! [`BodySource`], then reads the response incrementally. The head is
//! returned as soon as it is complete; the body is streamed by the caller.

use super::{HttpRequest, HttpSession, ResponseHead, ResponseParser, Result, SessionOps};
use crate::body::BodySource;
use std::time::{Duration, Instant};

/// Size of each body write and each socket read
pub const IO_CHUNK: usize = 64 * 1024;

/// HTTP client
///
/// Provides methods for sending requests and receiving responses over one
/// connection. The same client is reused across redirect hops when the
/// connection stays open.
pub struct HttpClient<S: SessionOps> {
    session: HttpSession<S>,
    parser: ResponseParser,
    buffer: Vec<u8>,
}

impl<S: SessionOps> HttpClient<S> {
    /// Create a new HTTP client with a session
    pub fn new(session: S) -> Self {
        HttpClient {
            session: HttpSession::new(session),
            parser: ResponseParser::new(),
            buffer: vec![0u8; IO_CHUNK],
        }
    }

    /// Set the timeout for a single read or write
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.session.set_timeout(timeout);
    }

    /// Set the deadline of the whole operation
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.session.set_deadline(deadline);
    }

    /// Attach per-direction rate limits in bytes per second
    pub fn set_rate_limits(&mut self, recv: Option<u64>, send: Option<u64>) {
        self.session.set_read_limit(recv);
        self.session.set_write_limit(send);
    }

    /// Reject response bodies larger than `limit`
    pub fn set_body_limit(&mut self, limit: Option<u64>) {
        self.parser.set_body_limit(limit);
    }

    /// Send a request head and stream its body
    pub fn send(&mut self, request: &HttpRequest, body: &mut dyn BodySource) -> Result<()> {
        self.session.write_all(&request.to_wire())?;

        let mut chunk = vec![0u8; IO_CHUNK];
        loop {
            let read = body.read(&mut chunk)?;
            self.session.write_all(&chunk[..read.bytes])?;
            if read.finished {
                break;
            }
        }

        self.session.flush()
    }

    /// Read until the final response head is available
    pub fn read_head(&mut self, head_request: bool) -> Result<ResponseHead> {
        self.parser.start(head_request);
        // Bytes left over from the previous response
        self.parser.feed(&[])?;

        loop {
            if let Some(head) = self.parser.head() {
                return Ok(head.clone());
            }
            self.read_some()?;
        }
    }

    /// Read once from the session into the parser
    pub fn read_some(&mut self) -> Result<()> {
        let n = self.session.read(&mut self.buffer)?;
        if n == 0 {
            return self.parser.finish_eof();
        }
        self.parser.feed(&self.buffer[..n])
    }

    /// Body bytes available and not yet consumed
    pub fn pull_body(&self) -> &[u8] {
        self.parser.pull_body()
    }

    /// Acknowledge `n` body bytes
    pub fn consume_body(&mut self, n: usize) {
        self.parser.consume_body(n);
    }

    /// The current response has been fully received
    pub fn is_complete(&self) -> bool {
        self.parser.is_complete()
    }

    /// Discard the rest of the current response body
    pub fn drain_body(&mut self) -> Result<()> {
        loop {
            let n = self.parser.pull_body().len();
            self.parser.consume_body(n);
            if self.parser.is_complete() {
                return Ok(());
            }
            self.read_some()?;
        }
    }

    /// Close the connection, waiting at most `grace` for the peer
    pub fn shutdown(&mut self, grace: Duration) -> Result<()> {
        self.session.shutdown(grace)
    }

    /// Get a reference to the session
    pub fn session(&self) -> &HttpSession<S> {
        &self.session
    }
}

impl<S: SessionOps> std::fmt::Debug for HttpClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("closed", &self.session.is_closed())
            .finish()
    }
}
