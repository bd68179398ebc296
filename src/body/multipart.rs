//! `multipart/form-data` bodies
//!
//! A [`MultipartForm`] is an immutable list of parts plus a boundary. The
//! body is never materialized: [`MultipartSource`] walks the parts with an
//! explicit cursor (part index, step, offset) and copies each piece into
//! whatever buffer it is given, reading file content straight from disk.
//! [`MultipartForm::content_length`] sums the same pieces, so the header
//! value always equals the number of bytes the source emits.

use super::{BodySource, Error, ReadResult, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// `--` + 24 dashes + 22 random characters + `--`
const BOUNDARY_LEN: usize = 2 + 46 + 2;
const RANDOM_LEN: usize = 22;

const CONTENT_DISPOSITION: &str = "\r\nContent-Disposition: form-data; name=\"";
const FILENAME: &str = "; filename=\"";
const CONTENT_TYPE: &str = "\r\nContent-Type: ";
const QUOTE: &str = "\"";
const HEADER_END: &str = "\r\n\r\n";
const CONTENT_END: &str = "\r\n";

#[derive(Debug, Clone)]
enum Content {
    Text(String),
    File(PathBuf),
}

/// One form field
#[derive(Debug, Clone)]
pub struct Part {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    /// Captured when the part is added
    size: u64,
    content: Content,
}

impl Part {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Multipart form
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: [u8; BOUNDARY_LEN],
    parts: Vec<Part>,
}

impl MultipartForm {
    /// Create an empty form with a fresh random boundary
    pub fn new() -> Self {
        let mut boundary = [b'-'; BOUNDARY_LEN];
        let random = rand::thread_rng().sample_iter(&Alphanumeric).take(RANDOM_LEN);
        for (slot, byte) in boundary[BOUNDARY_LEN - 2 - RANDOM_LEN..BOUNDARY_LEN - 2]
            .iter_mut()
            .zip(random)
        {
            *slot = byte;
        }

        MultipartForm {
            boundary,
            parts: Vec::new(),
        }
    }

    /// The boundary token as it appears in Content-Type
    pub fn boundary(&self) -> &str {
        self.boundary_str(2, BOUNDARY_LEN - 2)
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary())
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn append_text(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        content_type: Option<String>,
    ) {
        let value = value.into();
        self.parts.push(Part {
            name: name.into(),
            filename: None,
            content_type,
            size: value.len() as u64,
            content: Content::Text(value),
        });
    }

    /// Add a file upload; its size is read now and trusted at send time
    ///
    /// The filename defaults to the last component of `path`.
    pub fn append_file(
        &mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        filename: Option<String>,
        content_type: Option<String>,
    ) -> Result<()> {
        let path = path.into();
        let size = std::fs::metadata(&path)
            .map_err(|e| Error::file(&path, e))?
            .len();
        let filename = filename.unwrap_or_else(|| default_filename(&path));

        self.parts.push(Part {
            name: name.into(),
            filename: Some(filename),
            content_type,
            size,
            content: Content::File(path),
        });
        Ok(())
    }

    /// Exact number of bytes a source over this form produces
    pub fn content_length(&self) -> u64 {
        let mut length = 0u64;
        for part in &self.parts {
            length += (BOUNDARY_LEN - 2) as u64;
            length += CONTENT_DISPOSITION.len() as u64;
            length += part.name.len() as u64;
            length += QUOTE.len() as u64;

            if let Some(filename) = &part.filename {
                length += (FILENAME.len() + filename.len() + QUOTE.len()) as u64;
            }

            if let Some(content_type) = &part.content_type {
                length += (CONTENT_TYPE.len() + content_type.len()) as u64;
            }

            length += HEADER_END.len() as u64;
            length += part.size;
            length += CONTENT_END.len() as u64;
        }
        length + BOUNDARY_LEN as u64
    }

    /// Start a new cursor at the beginning of the body
    pub fn source(&self) -> MultipartSource<'_> {
        MultipartSource {
            form: self,
            part: 0,
            step: Step::Boundary,
            offset: 0,
            file: None,
        }
    }

    fn boundary_str(&self, start: usize, end: usize) -> &str {
        // Only ASCII dashes and alphanumerics are ever stored
        std::str::from_utf8(&self.boundary[start..end]).unwrap_or_default()
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

fn default_filename(path: &Path) -> String {
    let path = path.to_string_lossy();
    match path.rfind(['/', '\\']) {
        Some(pos) => path[pos + 1..].to_string(),
        None => path.into_owned(),
    }
}

/// Position within a part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Boundary,
    Disposition,
    Name,
    NameQuote,
    FilenameAttr,
    Filename,
    FilenameQuote,
    ContentTypeAttr,
    ContentType,
    HeaderEnd,
    Content,
    ContentEnd,
}

impl Step {
    fn next(self) -> Option<Step> {
        Some(match self {
            Step::Boundary => Step::Disposition,
            Step::Disposition => Step::Name,
            Step::Name => Step::NameQuote,
            Step::NameQuote => Step::FilenameAttr,
            Step::FilenameAttr => Step::Filename,
            Step::Filename => Step::FilenameQuote,
            Step::FilenameQuote => Step::ContentTypeAttr,
            Step::ContentTypeAttr => Step::ContentType,
            Step::ContentType => Step::HeaderEnd,
            Step::HeaderEnd => Step::Content,
            Step::Content => Step::ContentEnd,
            Step::ContentEnd => return None,
        })
    }
}

/// Cursor producing the bytes of a [`MultipartForm`]
///
/// `offset` is always below the length of the current step's bytes; a
/// finished step moves to the next with offset 0. Once every part is
/// emitted the closing boundary follows and the source reports finished.
pub struct MultipartSource<'a> {
    form: &'a MultipartForm,
    part: usize,
    step: Step,
    offset: u64,
    file: Option<File>,
}

/// Bytes of an in-memory step, `None` when the step does not apply
fn segment<'f>(step: Step, form: &'f MultipartForm, part: &'f Part) -> Option<&'f [u8]> {
    let bytes = match step {
        Step::Boundary => &form.boundary[..BOUNDARY_LEN - 2],
        Step::Disposition => CONTENT_DISPOSITION.as_bytes(),
        Step::Name => part.name.as_bytes(),
        Step::NameQuote => QUOTE.as_bytes(),
        Step::FilenameAttr => {
            part.filename.as_ref()?;
            FILENAME.as_bytes()
        }
        Step::Filename => part.filename.as_deref()?.as_bytes(),
        Step::FilenameQuote => {
            part.filename.as_ref()?;
            QUOTE.as_bytes()
        }
        Step::ContentTypeAttr => {
            part.content_type.as_ref()?;
            CONTENT_TYPE.as_bytes()
        }
        Step::ContentType => part.content_type.as_deref()?.as_bytes(),
        Step::HeaderEnd => HEADER_END.as_bytes(),
        Step::Content => match &part.content {
            Content::Text(text) => text.as_bytes(),
            Content::File(_) => return None,
        },
        Step::ContentEnd => CONTENT_END.as_bytes(),
    };
    Some(bytes)
}

impl MultipartSource<'_> {
    /// Copy the rest of `bytes` into `buf`; true when all of it fit
    fn copy(&mut self, bytes: &[u8], buf: &mut [u8], written: &mut usize) -> bool {
        let remaining = &bytes[self.offset as usize..];
        let n = remaining.len().min(buf.len() - *written);
        buf[*written..*written + n].copy_from_slice(&remaining[..n]);
        *written += n;
        self.offset += n as u64;

        if self.offset as usize != bytes.len() {
            return false;
        }
        self.offset = 0;
        true
    }

    /// Copy file content; true when the captured size has been emitted
    fn read_file(&mut self, part: &Part, buf: &mut [u8], written: &mut usize) -> Result<bool> {
        let Content::File(path) = &part.content else {
            return Ok(true);
        };

        while self.offset < part.size {
            if *written == buf.len() {
                return Ok(false);
            }

            let file = match self.file.take() {
                Some(file) => file,
                None => {
                    let mut file = File::open(path).map_err(|e| Error::file(path, e))?;
                    file.seek(SeekFrom::Start(self.offset))
                        .map_err(|e| Error::file(path, e))?;
                    file
                }
            };
            let file = self.file.insert(file);

            let want = (part.size - self.offset).min((buf.len() - *written) as u64) as usize;
            let n = match file.read(&mut buf[*written..*written + want]) {
                Ok(0) => {
                    return Err(Error::FileShrunk {
                        path: path.clone(),
                        expected: part.size,
                        actual: self.offset,
                    })
                }
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::file(path, e)),
            };

            *written += n;
            self.offset += n as u64;
        }

        self.file = None;
        self.offset = 0;
        Ok(true)
    }
}

impl BodySource for MultipartSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadResult> {
        let form = self.form;
        let mut written = 0;

        while let Some(part) = form.parts.get(self.part) {
            let done = match (self.step, &part.content) {
                (Step::Content, Content::File(_)) => self.read_file(part, buf, &mut written)?,
                (step, _) => match segment(step, form, part) {
                    Some(bytes) => self.copy(bytes, buf, &mut written),
                    None => true,
                },
            };

            if !done {
                return Ok(ReadResult {
                    bytes: written,
                    finished: false,
                });
            }

            match self.step.next() {
                Some(step) => self.step = step,
                None => {
                    self.step = Step::Boundary;
                    self.part += 1;
                }
            }
        }

        let finished = self.copy(&form.boundary, buf, &mut written);
        Ok(ReadResult {
            bytes: written,
            finished,
        })
    }
}
