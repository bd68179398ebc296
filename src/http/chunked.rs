//! Chunked transfer encoding support
//!
//! This module decodes HTTP chunked transfer encoding incrementally, as
//! response bytes arrive from the session.

use super::{Error, Result};

/// Chunked decoder
///
/// Decodes HTTP chunked transfer encoding format. The decoder keeps its
/// position across calls so input may be split at any byte.
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: DecoderState,
    chunk_size: u64,
    chunk_read: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DecoderState {
    ChunkSize,
    ChunkData,
    ChunkEnd,
    Trailer,
    Complete,
}

impl ChunkedDecoder {
    /// Create a new chunked decoder
    pub fn new() -> Self {
        ChunkedDecoder {
            state: DecoderState::ChunkSize,
            chunk_size: 0,
            chunk_read: 0,
        }
    }

    /// Decode from the input buffer, appending chunk payload to `output`
    ///
    /// Returns (bytes_consumed, is_complete). Unconsumed input is an
    /// incomplete line and must be offered again with more data appended.
    pub fn decode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<(usize, bool)> {
        let mut input_pos = 0;

        while input_pos < input.len() {
            match self.state {
                DecoderState::ChunkSize => {
                    let Some(crlf_pos) = find_crlf(&input[input_pos..]) else {
                        break;
                    };
                    let line = String::from_utf8_lossy(&input[input_pos..input_pos + crlf_pos]);

                    // Chunk extensions (after semicolon) are ignored
                    let size_str = line.split(';').next().unwrap_or_default().trim();
                    self.chunk_size = u64::from_str_radix(size_str, 16)
                        .map_err(|_| Error::InvalidChunkSize(size_str.to_string()))?;

                    input_pos += crlf_pos + 2;
                    self.chunk_read = 0;
                    self.state = if self.chunk_size == 0 {
                        DecoderState::Trailer
                    } else {
                        DecoderState::ChunkData
                    };
                }

                DecoderState::ChunkData => {
                    let remaining_in_chunk = self.chunk_size - self.chunk_read;
                    let available_input = (input.len() - input_pos) as u64;
                    let to_copy = remaining_in_chunk.min(available_input) as usize;

                    output.extend_from_slice(&input[input_pos..input_pos + to_copy]);
                    input_pos += to_copy;
                    self.chunk_read += to_copy as u64;

                    if self.chunk_read == self.chunk_size {
                        self.state = DecoderState::ChunkEnd;
                    }
                }

                DecoderState::ChunkEnd => {
                    if input.len() - input_pos < 2 {
                        break;
                    }
                    if &input[input_pos..input_pos + 2] != b"\r\n" {
                        return Err(Error::Protocol("Expected CRLF after chunk".to_string()));
                    }
                    input_pos += 2;
                    self.state = DecoderState::ChunkSize;
                }

                DecoderState::Trailer => {
                    // Trailer fields are skipped until the empty line
                    let Some(crlf_pos) = find_crlf(&input[input_pos..]) else {
                        break;
                    };
                    input_pos += crlf_pos + 2;
                    if crlf_pos == 0 {
                        self.state = DecoderState::Complete;
                        return Ok((input_pos, true));
                    }
                }

                DecoderState::Complete => break,
            }
        }

        Ok((input_pos, self.state == DecoderState::Complete))
    }

    /// Check if decoding is complete
    pub fn is_complete(&self) -> bool {
        self.state == DecoderState::Complete
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Find CRLF in buffer
pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}
