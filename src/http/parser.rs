//! HTTP response parsing
//!
//! This module provides an incremental response parser. Bytes read from the
//! session are fed in as they arrive; once the head is complete the body is
//! exposed through `pull_body()` / `consume_body()` so callers can stream it
//! without holding the whole message.

use super::chunked::{find_crlf, ChunkedDecoder};
use super::{Error, Headers, ResponseHead, Result, Status, Version, MAX_HEAD_SIZE};
use bytes::{Buf, BytesMut};

/// Parse HTTP response status line
///
/// Format: VERSION STATUS REASON\r\n
/// Example: HTTP/1.1 200 OK\r\n
pub fn parse_status_line(line: &str) -> Result<(Version, Status, String)> {
    let parts: Vec<&str> = line.splitn(3, ' ').collect();

    if parts.len() < 2 {
        return Err(Error::Parse(format!(
            "Invalid status line: expected at least 2 parts, got {}",
            parts.len()
        )));
    }

    let version = parts[0].parse::<Version>()?;
    let status_code = parts[1]
        .parse::<u16>()
        .map_err(|_| Error::Parse(format!("Invalid status code: {}", parts[1])))?;
    let status = Status::new(status_code)?;
    let reason = match parts.get(2) {
        Some(reason) => reason.to_string(),
        None => status.reason_phrase().to_string(),
    };

    Ok((version, status, reason))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    Head,
    Body,
    Complete,
}

/// How the end of the body is determined
#[derive(Debug)]
enum Framing {
    Empty,
    Length(u64),
    Chunked(ChunkedDecoder),
    UntilClose,
}

/// HTTP response parser
pub struct ResponseParser {
    state: ParserState,
    buffer: BytesMut,
    head: Option<ResponseHead>,
    framing: Framing,
    body: BytesMut,
    received: u64,
    body_limit: Option<u64>,
    head_request: bool,
}

impl ResponseParser {
    /// Create a new response parser
    pub fn new() -> Self {
        ResponseParser {
            state: ParserState::Head,
            buffer: BytesMut::with_capacity(8192),
            head: None,
            framing: Framing::Empty,
            body: BytesMut::new(),
            received: 0,
            body_limit: None,
            head_request: false,
        }
    }

    /// Reject bodies larger than `limit` bytes
    pub fn set_body_limit(&mut self, limit: Option<u64>) {
        self.body_limit = limit;
    }

    /// Prepare for the next response on the same connection
    ///
    /// Bytes already buffered beyond the previous message are kept.
    pub fn start(&mut self, head_request: bool) {
        self.state = ParserState::Head;
        self.head = None;
        self.framing = Framing::Empty;
        self.body.clear();
        self.received = 0;
        self.head_request = head_request;
    }

    /// Feed data to the parser
    pub fn feed(&mut self, data: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(data);
        self.advance()
    }

    /// Signal that the peer closed the connection
    pub fn finish_eof(&mut self) -> Result<()> {
        match (self.state, &self.framing) {
            (ParserState::Complete, _) => Ok(()),
            (ParserState::Body, Framing::UntilClose) => {
                self.state = ParserState::Complete;
                Ok(())
            }
            (ParserState::Head, _) if self.buffer.is_empty() => Err(Error::ConnectionClosed),
            _ => Err(Error::Incomplete),
        }
    }

    /// The final (non-interim) response head, once parsed
    pub fn head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }

    /// Body bytes available and not yet consumed
    pub fn pull_body(&self) -> &[u8] {
        &self.body
    }

    /// Acknowledge `n` bytes returned by `pull_body()`
    pub fn consume_body(&mut self, n: usize) {
        self.body.advance(n.min(self.body.len()));
    }

    /// The whole message has been parsed
    pub fn is_complete(&self) -> bool {
        self.state == ParserState::Complete
    }

    fn advance(&mut self) -> Result<()> {
        loop {
            match self.state {
                ParserState::Head => {
                    if !self.parse_head()? {
                        return Ok(());
                    }
                }
                ParserState::Body => return self.parse_body(),
                ParserState::Complete => return Ok(()),
            }
        }
    }

    /// Returns false when more data is needed
    fn parse_head(&mut self) -> Result<bool> {
        let Some(end) = find_head_end(&self.buffer) else {
            if self.buffer.len() > MAX_HEAD_SIZE {
                return Err(Error::Parse("Response head too large".to_string()));
            }
            return Ok(false);
        };

        let raw = self.buffer.split_to(end);
        let text = String::from_utf8_lossy(&raw);
        let mut lines = text.split("\r\n");

        let status_line = lines.next().unwrap_or_default();
        let (version, status, reason) = parse_status_line(status_line)?;

        let mut headers = Headers::new();
        for line in lines.filter(|l| !l.is_empty()) {
            let (name, value) = Headers::parse_header_line(line)?;
            headers.insert(name, value);
        }

        // Interim responses are skipped; the final head follows
        if status.is_informational() && status.code() != 101 {
            return Ok(true);
        }

        let head = ResponseHead::new(version, status, reason, headers, raw.to_vec());
        self.framing = self.framing_for(&head)?;
        self.state = match self.framing {
            Framing::Empty | Framing::Length(0) => ParserState::Complete,
            _ => ParserState::Body,
        };
        self.head = Some(head);

        Ok(true)
    }

    fn framing_for(&self, head: &ResponseHead) -> Result<Framing> {
        if !head.has_body(self.head_request) {
            return Ok(Framing::Empty);
        }

        if head.is_chunked() {
            return Ok(Framing::Chunked(ChunkedDecoder::new()));
        }

        match head.content_length()? {
            Some(length) => {
                if let Some(limit) = self.body_limit {
                    if length > limit {
                        return Err(Error::BodyTooLarge(limit));
                    }
                }
                Ok(Framing::Length(length))
            }
            None => Ok(Framing::UntilClose),
        }
    }

    fn parse_body(&mut self) -> Result<()> {
        let before = self.body.len();

        match &mut self.framing {
            Framing::Empty => self.state = ParserState::Complete,
            Framing::Length(remaining) => {
                let n = (*remaining).min(self.buffer.len() as u64) as usize;
                self.body.extend_from_slice(&self.buffer.split_to(n));
                *remaining -= n as u64;
                if *remaining == 0 {
                    self.state = ParserState::Complete;
                }
            }
            Framing::Chunked(decoder) => {
                let mut decoded = Vec::new();
                let (consumed, complete) = decoder.decode(&self.buffer, &mut decoded)?;
                self.buffer.advance(consumed);
                self.body.extend_from_slice(&decoded);
                if complete {
                    self.state = ParserState::Complete;
                }
            }
            Framing::UntilClose => {
                self.body.extend_from_slice(&self.buffer.split());
            }
        }

        self.received += (self.body.len() - before) as u64;
        if let Some(limit) = self.body_limit {
            if self.received > limit {
                return Err(Error::BodyTooLarge(limit));
            }
        }

        Ok(())
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Offset just past the blank line ending a head
fn find_head_end(buf: &[u8]) -> Option<usize> {
    let mut pos = 0;
    while let Some(crlf) = find_crlf(&buf[pos..]) {
        if crlf == 0 && pos > 0 {
            return Some(pos + 2);
        }
        pos += crlf + 2;
    }
    None
}
