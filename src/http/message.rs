//! HTTP message types
//!
//! This module defines the request head the client serializes and the
//! response head the parser produces. Request bodies are not stored here;
//! they are streamed from a [`BodySource`](crate::body::BodySource).

use super::{Error, Headers, Result, CRLF};
use std::fmt;
use std::str::FromStr;

/// HTTP methods
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
    /// Any other token given with `--request`
    Extension(String),
}

impl Method {
    /// Convert method to string
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
            Method::Extension(m) => m,
        }
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "CONNECT" => Method::Connect,
            "OPTIONS" => Method::Options,
            "TRACE" => Method::Trace,
            "PATCH" => Method::Patch,
            _ if is_token(s) => Method::Extension(s.to_string()),
            _ => return Err(Error::InvalidMethod(s.to_string())),
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RFC 9110 token characters
pub(crate) fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

/// HTTP version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    Http10,
    #[default]
    Http11,
}

impl Version {
    /// Convert version to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "HTTP/1.0" => Ok(Version::Http10),
            "HTTP/1.1" => Ok(Version::Http11),
            _ => Err(Error::InvalidVersion(s.to_string())),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status {
    code: u16,
}

impl Status {
    /// Create a new status code
    pub fn new(code: u16) -> Result<Self> {
        if (100..600).contains(&code) {
            Ok(Status { code })
        } else {
            Err(Error::InvalidStatus(format!("Invalid status code: {}", code)))
        }
    }

    /// Get the status code
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Get the canonical reason phrase for this status code
    pub fn reason_phrase(&self) -> &'static str {
        match self.code {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            206 => "Partial Content",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            408 => "Request Timeout",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            505 => "HTTP Version Not Supported",
            _ => "Unknown",
        }
    }

    /// Check if this is an informational status (1xx)
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Check if this is a client or server error (4xx, 5xx)
    pub fn is_error(&self) -> bool {
        self.code >= 400
    }

    pub const OK: Status = Status { code: 200 };
    pub const NO_CONTENT: Status = Status { code: 204 };
    pub const NOT_MODIFIED: Status = Status { code: 304 };
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason_phrase())
    }
}

/// HTTP request head
///
/// Mutated in place across redirect hops: method, target and several
/// headers are rewritten before the request is sent again.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    target: String,
    version: Version,
    headers: Headers,
}

impl HttpRequest {
    /// Create a new HTTP request
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        HttpRequest {
            method,
            target: target.into(),
            version: Version::default(),
            headers: Headers::new(),
        }
    }

    /// Get the request method
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Get the request target
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn set_target(&mut self, target: impl Into<String>) {
        self.target = target.into();
    }

    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Get the headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get mutable headers
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Convert the request head to wire format
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);

        buf.extend_from_slice(self.method.as_str().as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.target.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.version.as_str().as_bytes());
        buf.extend_from_slice(CRLF.as_bytes());

        for (name, value) in self.headers.iter() {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(CRLF.as_bytes());
        }

        buf.extend_from_slice(CRLF.as_bytes());
        buf
    }
}

/// HTTP response head
#[derive(Debug, Clone)]
pub struct ResponseHead {
    version: Version,
    status: Status,
    reason: String,
    headers: Headers,
    raw: Vec<u8>,
}

impl ResponseHead {
    pub fn new(version: Version, status: Status, reason: String, headers: Headers, raw: Vec<u8>) -> Self {
        ResponseHead {
            version,
            status,
            reason,
            headers,
            raw,
        }
    }

    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get the status code
    pub fn status(&self) -> Status {
        self.status
    }

    /// Get the reason phrase
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Get the headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The head exactly as received, including the terminating blank line
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Check whether the server asked to close the connection
    pub fn connection_close(&self) -> bool {
        self.headers.has_token("Connection", "close")
    }

    /// HTTP/1.1 without `Connection: close`
    pub fn keep_alive(&self) -> bool {
        self.version == Version::Http11 && !self.connection_close()
    }

    /// Whether this response carries a body at all
    pub fn has_body(&self, head_request: bool) -> bool {
        !(head_request
            || self.status.is_informational()
            || self.status == Status::NO_CONTENT
            || self.status == Status::NOT_MODIFIED)
    }

    /// The body ends only when the peer closes the connection
    pub fn delimited_by_close(&self, head_request: bool) -> bool {
        self.has_body(head_request) && !self.is_chunked() && !self.headers.contains("Content-Length")
    }

    /// Parsed Content-Length, if present
    pub fn content_length(&self) -> Result<Option<u64>> {
        match self.headers.get("Content-Length") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| Error::Parse(format!("Invalid Content-Length: {}", v))),
            None => Ok(None),
        }
    }

    /// Check for chunked transfer coding
    pub fn is_chunked(&self) -> bool {
        self.headers.has_token("Transfer-Encoding", "chunked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("POST".parse::<Method>().unwrap(), Method::Post);
        assert_eq!(
            "PROPFIND".parse::<Method>().unwrap(),
            Method::Extension("PROPFIND".to_string())
        );
        assert!("BAD METHOD".parse::<Method>().is_err());
        assert!("".parse::<Method>().is_err());
    }

    #[test]
    fn test_version_parse() {
        assert_eq!("HTTP/1.0".parse::<Version>().unwrap(), Version::Http10);
        assert_eq!("HTTP/1.1".parse::<Version>().unwrap(), Version::Http11);
        assert!("HTTP/2.0".parse::<Version>().is_err());
    }

    #[test]
    fn test_status_validation() {
        assert!(Status::new(200).is_ok());
        assert!(Status::new(99).is_err());
        assert!(Status::new(600).is_err());
        assert!(Status::new(404).unwrap().is_error());
        assert!(!Status::OK.is_error());
    }

    #[test]
    fn test_request_to_wire() {
        let mut request = HttpRequest::new(Method::Post, "/submit?x=1");
        request.headers_mut().insert("Host", "example.com");
        request.headers_mut().insert("Content-Length", "5");

        let wire = String::from_utf8(request.to_wire()).unwrap();
        assert_eq!(
            wire,
            "POST /submit?x=1 HTTP/1.1\r\nHost: example.com\r\nContent-Length: 5\r\n\r\n"
        );
    }

    #[test]
    fn test_request_http10() {
        let mut request = HttpRequest::new(Method::Head, "/");
        request.set_version(Version::Http10);
        assert!(request.to_wire().starts_with(b"HEAD / HTTP/1.0\r\n"));
    }

    #[test]
    fn test_response_keep_alive() {
        let mut headers = Headers::new();
        headers.insert("Connection", "close");
        let head = ResponseHead::new(Version::Http11, Status::OK, "OK".into(), headers, Vec::new());
        assert!(head.connection_close());
        assert!(!head.keep_alive());

        let head = ResponseHead::new(Version::Http10, Status::OK, "OK".into(), Headers::new(), Vec::new());
        assert!(!head.keep_alive());

        let head = ResponseHead::new(Version::Http11, Status::OK, "OK".into(), Headers::new(), Vec::new());
        assert!(head.keep_alive());
    }

    #[test]
    fn test_response_delimited_by_close() {
        let head = ResponseHead::new(Version::Http11, Status::OK, "OK".into(), Headers::new(), Vec::new());
        assert!(head.delimited_by_close(false));
        assert!(!head.delimited_by_close(true));

        let mut headers = Headers::new();
        headers.insert("Content-Length", "5");
        let head = ResponseHead::new(Version::Http11, Status::OK, "OK".into(), headers, Vec::new());
        assert!(!head.delimited_by_close(false));

        let mut headers = Headers::new();
        headers.insert("Transfer-Encoding", "chunked");
        let head = ResponseHead::new(Version::Http11, Status::OK, "OK".into(), headers, Vec::new());
        assert!(!head.delimited_by_close(false));

        let head = ResponseHead::new(Version::Http11, Status::NO_CONTENT, String::new(), Headers::new(), Vec::new());
        assert!(!head.delimited_by_close(false));
    }
}
