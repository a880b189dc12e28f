//! Line-terminator detection and a bounded line reader
//!
//! FASTA files arrive with LF, CRLF, CR or LFCR terminators. The terminator is
//! detected from the first bytes of the file; the reader then splits on its
//! final byte and strips any terminator characters from the end of each line.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, Read};
use std::path::Path;

/// Bytes inspected when auto-detecting the terminator
pub const TERMINATOR_SCAN_BYTES: usize = 100_000;

/// Lines longer than this are skipped rather than parsed
pub const MAX_PARSE_LINE_LENGTH: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineTerminator {
    #[default]
    Lf,
    CrLf,
    Cr,
    LfCr,
}

impl LineTerminator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineTerminator::Lf => "\n",
            LineTerminator::CrLf => "\r\n",
            LineTerminator::Cr => "\r",
            LineTerminator::LfCr => "\n\r",
        }
    }

    pub fn as_bytes(&self) -> &'static [u8] {
        self.as_str().as_bytes()
    }

    /// Byte that ends every line for this terminator
    pub fn split_byte(&self) -> u8 {
        match self {
            LineTerminator::Lf | LineTerminator::CrLf => b'\n',
            LineTerminator::Cr | LineTerminator::LfCr => b'\r',
        }
    }
}

/// Detects the terminator from the first CR or LF in `bytes`; LF if none.
pub fn detect_line_terminator_in(bytes: &[u8]) -> LineTerminator {
    let Some(pos) = bytes.iter().position(|&b| b == b'\r' || b == b'\n') else {
        return LineTerminator::Lf;
    };
    match (bytes[pos], bytes.get(pos + 1)) {
        (b'\r', Some(b'\n')) => LineTerminator::CrLf,
        (b'\r', _) => LineTerminator::Cr,
        (b'\n', Some(b'\r')) => LineTerminator::LfCr,
        _ => LineTerminator::Lf,
    }
}

pub fn detect_line_terminator(path: &Path) -> io::Result<LineTerminator> {
    let mut buffer = Vec::with_capacity(TERMINATOR_SCAN_BYTES);
    File::open(path)?
        .take(TERMINATOR_SCAN_BYTES as u64)
        .read_to_end(&mut buffer)?;
    Ok(detect_line_terminator_in(&buffer))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// Line content without terminator; empty when `too_long` is set
    pub text: String,
    /// Content length in bytes, even when the text was discarded
    pub length: usize,
    pub too_long: bool,
    pub terminated: bool,
}

/// Reads lines without ever buffering more than `max_line_length` bytes of one line.
pub struct LineReader<R: BufRead> {
    reader: R,
    split_byte: u8,
    max_line_length: usize,
    bytes_read: u64,
    buffer: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R, terminator: LineTerminator, max_line_length: usize) -> Self {
        Self {
            reader,
            split_byte: terminator.split_byte(),
            max_line_length,
            bytes_read: 0,
            buffer: Vec::new(),
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn read_line(&mut self) -> io::Result<Option<RawLine>> {
        self.buffer.clear();
        let mut raw_length = 0usize;
        let mut terminated = false;
        // Room for the terminator bytes on top of the content limit
        let keep_limit = self.max_line_length.saturating_add(2);

        loop {
            let available = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                break;
            }

            let (take, found) = match available.iter().position(|&b| b == self.split_byte) {
                Some(pos) => (pos + 1, true),
                None => (available.len(), false),
            };

            let room = keep_limit.saturating_sub(self.buffer.len());
            self.buffer.extend_from_slice(&available[..take.min(room)]);
            raw_length += take;
            self.reader.consume(take);
            self.bytes_read += take as u64;

            if found {
                terminated = true;
                break;
            }
        }

        if raw_length == 0 {
            return Ok(None);
        }

        let mut content_length = raw_length;
        if self.buffer.len() < raw_length {
            // Tail was discarded; only the split byte is known to be a terminator
            if terminated {
                content_length -= 1;
            }
        } else if terminated {
            while content_length > 0 && matches!(self.buffer[content_length - 1], b'\r' | b'\n') {
                content_length -= 1;
            }
        }

        let too_long = content_length > self.max_line_length;
        let text = if too_long {
            String::new()
        } else {
            String::from_utf8_lossy(&self.buffer[..content_length]).into_owned()
        };

        Ok(Some(RawLine {
            text,
            length: content_length,
            too_long,
            terminated,
        }))
    }
}
