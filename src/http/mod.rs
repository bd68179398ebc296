//! HTTP/1.1 client layer
//!
//! This module provides the blocking HTTP/1.1 machinery the transfer engine
//! drives: header collections, request/response heads, an incremental
//! response parser and the session abstraction over plain and TLS streams.
//!
//! # Architecture
//!
//! The HTTP layer uses a session operations abstraction so that the same
//! client code runs over plain TCP and TLS connections:
//!
//! - `SessionOps` trait defines operations (poll, read, write, shutdown)
//! - `Transport` is the closed set of session variants (plain or TLS)
//! - `HttpSession` adds timeouts, an overall deadline and rate limits
//! - `HttpClient` serializes requests with a streamed body and parses responses
//!
//! # Examples
//!
//! ```no_run
//! use vcurl::http::{HttpClient, HttpRequest, Method, PlainSession, Transport};
//! use vcurl::body::EmptySource;
//! use std::net::TcpStream;
//!
//! let stream = TcpStream::connect("127.0.0.1:8080").unwrap();
//! let mut client = HttpClient::new(Transport::Plain(PlainSession::new(stream)));
//!
//! let mut request = HttpRequest::new(Method::Get, "/");
//! request.headers_mut().set("Host", "localhost");
//! client.send(&request, &mut EmptySource).unwrap();
//!
//! let head = client.read_head(false).unwrap();
//! assert_eq!(head.status().code(), 200);
//! ```

pub mod chunked;
pub mod client;
pub mod headers;
pub mod message;
pub mod parser;
pub mod rate;
pub mod session;
pub mod tls;

pub use client::HttpClient;
pub use headers::Headers;
pub use message::{HttpRequest, Method, ResponseHead, Status, Version};
pub use parser::ResponseParser;
pub use rate::Throttle;
pub use session::{HttpSession, PlainSession, PollEvents, SessionOps, Transport};

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// A client over either transport variant
pub type Connection = HttpClient<Transport>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] tls::TlsError),

    #[error("request body: {0}")]
    Body(#[from] crate::body::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Incomplete message")]
    Incomplete,

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Stream truncated")]
    Truncated,

    #[error("Maximum file size exceeded ({0} bytes)")]
    BodyTooLarge(u64),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Maximum number of headers per message
pub const MAX_HEADERS: usize = 100;

/// Maximum size of a response head in bytes
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Default HTTPS port
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// CRLF line ending
pub const CRLF: &str = "\r\n";
