use crate::Error;

/// Maximum number of hex digits accepted in a chunk size line. 16 digits
/// already covers a u64; anything longer is not a size line.
const MAX_SIZE_DIGITS: usize = 16;

/// Incremental decoder of `Transfer-Encoding: chunked` bodies.
///
/// Bytes are pushed in arbitrary-sized increments; the decoder tolerates a
/// chunk size line, payload or delimiter split at any byte boundary. A
/// zero-size chunk followed by the final CRLF terminates the body.
#[derive(Debug)]
pub(crate) struct ChunkedDecoder {
    state: ChunkState,
    /// Bytes left of the current chunk's payload.
    remaining: u64,
    /// Accumulated value of the size line being read.
    size: u64,
    /// How many hex digits the current size line has produced.
    digits: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    /// Reading hex digits of a chunk size.
    Size,
    /// Skipping a chunk extension up to the CR.
    SizeExt,
    /// Seen CR after the size, expecting LF.
    SizeLf,
    /// Copying chunk payload.
    Data,
    /// Expecting CR after payload.
    DataCr,
    /// Expecting LF after payload CR.
    DataLf,
    /// Zero-size chunk seen, expecting the final CR.
    EndCr,
    /// Expecting the final LF.
    EndLf,
    /// Terminal.
    End,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        ChunkedDecoder {
            state: ChunkState::Size,
            remaining: 0,
            size: 0,
            digits: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        self.state == ChunkState::End
    }

    /// Consume as much of `src` as the framing allows, appending decoded
    /// payload bytes to `out`. Returns the number of bytes consumed; once
    /// the terminating chunk is fully read, remaining input is untouched.
    pub fn feed(&mut self, src: &[u8], out: &mut Vec<u8>) -> Result<usize, Error> {
        let mut pos = 0;

        while pos < src.len() {
            let b = src[pos];

            match self.state {
                ChunkState::Size => match b {
                    b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F' => {
                        if self.digits == MAX_SIZE_DIGITS {
                            return Err(Error::MalformedChunk("chunk size line too long".into()));
                        }
                        self.size = self.size * 16 + hex_val(b);
                        self.digits += 1;
                        pos += 1;
                    }
                    b';' if self.digits > 0 => {
                        self.state = ChunkState::SizeExt;
                        pos += 1;
                    }
                    b'\r' if self.digits > 0 => {
                        self.state = ChunkState::SizeLf;
                        pos += 1;
                    }
                    _ => {
                        return Err(Error::MalformedChunk(format!(
                            "bad byte in chunk size: 0x{:02x}",
                            b
                        )));
                    }
                },

                ChunkState::SizeExt => {
                    if b == b'\r' {
                        self.state = ChunkState::SizeLf;
                    }
                    pos += 1;
                }

                ChunkState::SizeLf => {
                    if b != b'\n' {
                        return Err(Error::MalformedChunk("expected LF after chunk size".into()));
                    }
                    pos += 1;
                    if self.size == 0 {
                        self.state = ChunkState::EndCr;
                    } else {
                        self.remaining = self.size;
                        self.state = ChunkState::Data;
                    }
                    self.size = 0;
                    self.digits = 0;
                }

                ChunkState::Data => {
                    let take = ((src.len() - pos) as u64).min(self.remaining) as usize;
                    out.extend_from_slice(&src[pos..pos + take]);
                    self.remaining -= take as u64;
                    pos += take;
                    if self.remaining == 0 {
                        self.state = ChunkState::DataCr;
                    }
                }

                ChunkState::DataCr => {
                    if b != b'\r' {
                        return Err(Error::MalformedChunk("expected CR after chunk data".into()));
                    }
                    pos += 1;
                    self.state = ChunkState::DataLf;
                }

                ChunkState::DataLf => {
                    if b != b'\n' {
                        return Err(Error::MalformedChunk("expected LF after chunk data".into()));
                    }
                    pos += 1;
                    self.state = ChunkState::Size;
                }

                ChunkState::EndCr => {
                    if b != b'\r' {
                        return Err(Error::MalformedChunk("expected CRLF after last chunk".into()));
                    }
                    pos += 1;
                    self.state = ChunkState::EndLf;
                }

                ChunkState::EndLf => {
                    if b != b'\n' {
                        return Err(Error::MalformedChunk("expected CRLF after last chunk".into()));
                    }
                    pos += 1;
                    self.state = ChunkState::End;
                }

                ChunkState::End => break,
            }
        }

        Ok(pos)
    }
}

fn hex_val(b: u8) -> u64 {
    match b {
        b'0'..=b'9' => (b - b'0') as u64,
        b'a'..=b'f' => (b - b'a' + 10) as u64,
        _ => (b - b'A' + 10) as u64,
    }
}
