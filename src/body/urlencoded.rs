//! `application/x-www-form-urlencoded` bodies
//!
//! The form is encoded once, up front, into a flat buffer. File inputs are
//! read in bounded chunks while encoding so the raw file is never held in
//! memory alongside its encoded form.

use super::{BufferSource, Error, Result};
use percent_encoding::{percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Bytes left unescaped besides ASCII alphanumerics
const FORM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'*')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_');

const READ_CHUNK: usize = 64 * 1024;

/// URL-encoded form
#[derive(Debug, Clone, Default)]
pub struct UrlEncodedForm {
    body: Vec<u8>,
}

impl UrlEncodedForm {
    pub const CONTENT_TYPE: &'static str = "application/x-www-form-urlencoded";

    pub fn new() -> Self {
        UrlEncodedForm { body: Vec::new() }
    }

    /// Append `name=value`, encoding the value
    ///
    /// The name is taken as given. An empty value appends just the name.
    pub fn append(&mut self, name: &str, value: &str) {
        self.separator();
        self.body.extend_from_slice(name.as_bytes());
        if !value.is_empty() {
            self.body.push(b'=');
            encode_into(&mut self.body, value.as_bytes());
        }
    }

    /// Append an already-encoded fragment
    pub fn append_raw(&mut self, data: &[u8]) {
        self.separator();
        self.body.extend_from_slice(data);
    }

    /// Append the raw contents of a file
    pub fn append_raw_file(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path).map_err(|e| Error::file(path, e))?;
        self.separator();
        self.read_from(file, false)
            .map_err(|e| Error::file(path, e))
    }

    /// Append the encoded contents of `reader`, optionally as `name=...`
    pub fn append_reader(&mut self, name: Option<&str>, reader: impl Read) -> io::Result<()> {
        self.separator();
        if let Some(name) = name {
            self.body.extend_from_slice(name.as_bytes());
            self.body.push(b'=');
        }
        self.read_from(reader, true)
    }

    fn read_from(&mut self, mut reader: impl Read, encode: bool) -> io::Result<()> {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if encode {
                encode_into(&mut self.body, &chunk[..n]);
            } else {
                self.body.extend_from_slice(&chunk[..n]);
            }
        }
    }

    /// Append the encoded contents of a file, optionally as `name=...`
    pub fn append_file(&mut self, name: Option<&str>, path: &Path) -> Result<()> {
        let file = File::open(path).map_err(|e| Error::file(path, e))?;
        self.append_reader(name, file)
            .map_err(|e| Error::file(path, e))
    }

    /// Append the encoded contents of a text value without a name
    pub fn append_value(&mut self, value: &str) {
        self.separator();
        encode_into(&mut self.body, value.as_bytes());
    }

    /// The encoded body
    pub fn as_bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn content_length(&self) -> u64 {
        self.body.len() as u64
    }

    pub fn source(&self) -> BufferSource<'_> {
        BufferSource::new(&self.body)
    }

    fn separator(&mut self) {
        if !self.body.is_empty() {
            self.body.push(b'&');
        }
    }
}

/// Percent-encode `input` with space as `+`
fn encode_into(out: &mut Vec<u8>, input: &[u8]) {
    for (i, part) in input.split(|&b| b == b' ').enumerate() {
        if i > 0 {
            out.push(b'+');
        }
        for piece in percent_encode(part, FORM) {
            out.extend_from_slice(piece.as_bytes());
        }
    }
}
