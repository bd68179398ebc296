//! Request body encoders
//!
//! Bodies are produced on demand: the HTTP client hands a destination
//! buffer to a [`BodySource`] until it reports `finished`. A [`Body`] is
//! the immutable description of what to send; every call to
//! [`Body::source`] starts a fresh cursor over it, so the same body can be
//! replayed on a retry or a 307/308 redirect.

pub mod multipart;
pub mod urlencoded;

pub use multipart::{MultipartForm, MultipartSource};
pub use urlencoded::UrlEncodedForm;

use crate::http::{HttpRequest, Method};
use std::io;
use std::path::PathBuf;

/// Body encoder errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} shrank to {actual} bytes after being added ({expected} expected)", path.display())]
    FileShrunk {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}

impl Error {
    pub(crate) fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::File {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of one [`BodySource::read`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResult {
    /// Bytes written to the front of the buffer
    pub bytes: usize,
    /// No more bytes will follow
    pub finished: bool,
}

/// Incremental producer of request body bytes
pub trait BodySource {
    /// Fill as much of `buf` as possible
    ///
    /// A source never returns zero bytes without `finished` while `buf`
    /// is non-empty.
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadResult>;
}

/// A source with no bytes
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySource;

impl BodySource for EmptySource {
    fn read(&mut self, _buf: &mut [u8]) -> Result<ReadResult> {
        Ok(ReadResult {
            bytes: 0,
            finished: true,
        })
    }
}

/// A source over a fixed buffer
#[derive(Debug, Clone)]
pub struct BufferSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BufferSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BufferSource { data, pos: 0 }
    }
}

impl BodySource for BufferSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadResult> {
        let remaining = &self.data[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(ReadResult {
            bytes: n,
            finished: self.pos == self.data.len(),
        })
    }
}

/// Request body description
#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    None,
    UrlEncoded(UrlEncodedForm),
    Multipart(MultipartForm),
}

impl Body {
    pub fn is_none(&self) -> bool {
        matches!(self, Body::None)
    }

    /// The method implied by sending this body
    pub fn method(&self) -> Option<Method> {
        match self {
            Body::None => None,
            Body::UrlEncoded(_) | Body::Multipart(_) => Some(Method::Post),
        }
    }

    pub fn content_type(&self) -> Option<String> {
        match self {
            Body::None => None,
            Body::UrlEncoded(_) => Some(UrlEncodedForm::CONTENT_TYPE.to_string()),
            Body::Multipart(form) => Some(form.content_type()),
        }
    }

    pub fn content_length(&self) -> u64 {
        match self {
            Body::None => 0,
            Body::UrlEncoded(form) => form.content_length(),
            Body::Multipart(form) => form.content_length(),
        }
    }

    /// Set Content-Type and Content-Length on `request`
    pub fn set_headers(&self, request: &mut HttpRequest) {
        if let Some(content_type) = self.content_type() {
            let headers = request.headers_mut();
            headers.set("Content-Type", content_type);
            headers.set("Content-Length", self.content_length().to_string());
        }
    }

    /// Start a new cursor over the body
    pub fn source(&self) -> Box<dyn BodySource + '_> {
        match self {
            Body::None => Box::new(EmptySource),
            Body::UrlEncoded(form) => Box::new(form.source()),
            Body::Multipart(form) => Box::new(form.source()),
        }
    }
}

#[cfg(test)]
pub(crate) fn drain(source: &mut dyn BodySource, chunk: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; chunk];
    loop {
        let read = source.read(&mut buf)?;
        assert!(read.bytes > 0 || read.finished, "stalled source");
        out.extend_from_slice(&buf[..read.bytes]);
        if read.finished {
            return Ok(out);
        }
    }
}
