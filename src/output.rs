//! Response output
//!
//! [`OutputSink`] receives response bodies (and echoed heads with
//! `--include`). Files are created on the first write so a failed transfer
//! that never produced data leaves nothing behind. When the sink is an
//! interactive terminal, body data containing a NUL byte is refused.
//!
//! [`HeaderSink`] is the `--dump-header` destination and
//! [`ContentDecoder`] undoes `Content-Encoding` when `--compressed` is on.

use crate::error::{Error, Result};
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fallback name for `--remote-name` when the URL has no file name
pub const DEFAULT_REMOTE_NAME: &str = "vcurl_response";

enum Target {
    Writer(Box<dyn Write>),
    File {
        path: PathBuf,
        create_dirs: bool,
        file: Option<BufWriter<File>>,
    },
}

/// Destination of a response body
pub struct OutputSink {
    target: Target,
    check_binary: bool,
}

impl OutputSink {
    /// Standard output; `forced` disables the binary check
    pub fn stdout(forced: bool) -> Self {
        let terminal = io::stdout().is_terminal();
        OutputSink::writer(Box::new(io::stdout()), terminal && !forced)
    }

    pub fn writer(writer: Box<dyn Write>, check_binary: bool) -> Self {
        OutputSink {
            target: Target::Writer(writer),
            check_binary,
        }
    }

    /// A file created on first write
    pub fn file(path: impl Into<PathBuf>, create_dirs: bool) -> Self {
        OutputSink {
            target: Target::File {
                path: path.into(),
                create_dirs,
                file: None,
            },
            check_binary: false,
        }
    }

    /// Path of a file sink
    pub fn path(&self) -> Option<&Path> {
        match &self.target {
            Target::File { path, .. } => Some(path),
            Target::Writer(_) => None,
        }
    }

    /// Replace the file name of a file sink that has not been written yet
    pub fn rename(&mut self, name: &str) {
        if let Target::File {
            path, file: None, ..
        } = &mut self.target
        {
            debug!("Saving to {} instead of {}", name, path.display());
            path.set_file_name(name);
        }
    }

    /// Write body data
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.check_binary && data.contains(&0) {
            return Err(Error::BinaryOutput);
        }
        self.write_raw(data)
    }

    /// Write without the binary check
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        match &mut self.target {
            Target::Writer(writer) => writer.write_all(data).map_err(|source| Error::Output {
                path: PathBuf::from("-"),
                source,
            }),
            Target::File {
                path,
                create_dirs,
                file,
            } => {
                if file.is_none() {
                    *file = Some(BufWriter::new(create_file(path, *create_dirs)?));
                }
                match file.as_mut() {
                    Some(file) => file.write_all(data).map_err(|source| Error::Output {
                        path: path.clone(),
                        source,
                    }),
                    None => Ok(()),
                }
            }
        }
    }

    /// Flush everything written so far
    pub fn finish(&mut self) -> Result<()> {
        let (result, path) = match &mut self.target {
            Target::Writer(writer) => (writer.flush(), PathBuf::from("-")),
            Target::File {
                path,
                file: Some(file),
                ..
            } => (file.flush(), path.clone()),
            Target::File { .. } => return Ok(()),
        };
        result.map_err(|source| Error::Output { path, source })
    }

    /// Delete a file this sink created
    pub fn remove_partial(&mut self) {
        if let Target::File { path, file, .. } = &mut self.target {
            if file.take().is_some() {
                match fs::remove_file(&*path) {
                    Ok(()) => debug!("Removed partial output {}", path.display()),
                    Err(e) => debug!("Could not remove {}: {}", path.display(), e),
                }
            }
        }
    }
}

fn create_file(path: &Path, create_dirs: bool) -> Result<File> {
    let output_error = |source| Error::Output {
        path: path.to_path_buf(),
        source,
    };
    if create_dirs {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(output_error)?;
        }
    }
    File::create(path).map_err(output_error)
}

/// `--dump-header` destination
pub struct HeaderSink {
    writer: Box<dyn Write>,
    path: PathBuf,
}

impl HeaderSink {
    /// Open `path`; `-` is stdout
    pub fn create(path: &Path) -> Result<Self> {
        let writer: Box<dyn Write> = if path == Path::new("-") {
            Box::new(io::stdout())
        } else {
            let file = File::create(path).map_err(|source| Error::Output {
                path: path.to_path_buf(),
                source,
            })?;
            Box::new(BufWriter::new(file))
        };
        Ok(HeaderSink {
            writer,
            path: path.to_path_buf(),
        })
    }

    pub fn write(&mut self, head: &[u8]) -> Result<()> {
        self.writer
            .write_all(head)
            .and_then(|()| self.writer.flush())
            .map_err(|source| Error::Output {
                path: self.path.clone(),
                source,
            })
    }
}

/// File name from a `Content-Disposition` header, without any directory part
pub fn disposition_filename(value: &str) -> Option<String> {
    let param = value.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("filename")
            .then(|| value.trim())
    })?;

    let unquoted = param
        .strip_prefix('"')
        .map(|p| p.split('"').next().unwrap_or_default())
        .unwrap_or(param);
    let name = unquoted.rsplit(['/', '\\']).next().unwrap_or_default();

    (!name.is_empty() && name != "." && name != "..").then(|| name.to_string())
}

/// Decoder for the response `Content-Encoding`
pub enum ContentDecoder {
    Identity,
    #[cfg(feature = "compression")]
    Gzip(flate2::write::GzDecoder<Vec<u8>>),
    #[cfg(feature = "compression")]
    Deflate(flate2::write::ZlibDecoder<Vec<u8>>),
}

impl ContentDecoder {
    /// Pick a decoder; unknown encodings pass through untouched
    pub fn for_encoding(encoding: Option<&str>) -> Self {
        match encoding.map(|e| e.trim().to_ascii_lowercase()).as_deref() {
            #[cfg(feature = "compression")]
            Some("gzip") | Some("x-gzip") => {
                ContentDecoder::Gzip(flate2::write::GzDecoder::new(Vec::new()))
            }
            #[cfg(feature = "compression")]
            Some("deflate") => ContentDecoder::Deflate(flate2::write::ZlibDecoder::new(Vec::new())),
            _ => ContentDecoder::Identity,
        }
    }

    /// Decode one chunk of the body
    pub fn decode<'a>(&mut self, input: &'a [u8]) -> io::Result<Cow<'a, [u8]>> {
        match self {
            ContentDecoder::Identity => Ok(Cow::Borrowed(input)),
            #[cfg(feature = "compression")]
            ContentDecoder::Gzip(decoder) => {
                decoder.write_all(input)?;
                Ok(Cow::Owned(std::mem::take(decoder.get_mut())))
            }
            #[cfg(feature = "compression")]
            ContentDecoder::Deflate(decoder) => {
                decoder.write_all(input)?;
                Ok(Cow::Owned(std::mem::take(decoder.get_mut())))
            }
        }
    }

    /// Bytes still held by the decoder at the end of the body
    pub fn finish(&mut self) -> io::Result<Vec<u8>> {
        match self {
            ContentDecoder::Identity => Ok(Vec::new()),
            #[cfg(feature = "compression")]
            ContentDecoder::Gzip(decoder) => {
                decoder.try_finish()?;
                Ok(std::mem::take(decoder.get_mut()))
            }
            #[cfg(feature = "compression")]
            ContentDecoder::Deflate(decoder) => {
                decoder.try_finish()?;
                Ok(std::mem::take(decoder.get_mut()))
            }
        }
    }
}
