//! Rewrites a file with a single canonical line terminator

use super::lines::LineTerminator;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tempfile::TempPath;

const COPY_BUFFER_SIZE: usize = 1 << 16;

/// Copies `input` to a temporary file in `work_dir`, converting every CR, LF,
/// CRLF and LFCR terminator to `target`.
///
/// The returned path is removed when dropped.
pub fn normalize_line_endings(input: &Path, target: LineTerminator, work_dir: &Path) -> io::Result<TempPath> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "input".to_string());
    let temp = tempfile::Builder::new()
        .prefix(&format!("{}_", stem))
        .suffix(".normalized.fasta")
        .tempfile_in(work_dir)?;

    let (file, path) = temp.into_parts();
    let mut reader = BufReader::new(File::open(input)?);
    let mut writer = BufWriter::new(file);
    convert_terminators(&mut reader, &mut writer, target)?;
    writer.flush()?;

    Ok(path)
}

/// Streams `reader` to `writer`, replacing each terminator with `target`.
pub fn convert_terminators<R: Read, W: Write>(reader: &mut R, writer: &mut W, target: LineTerminator) -> io::Result<u64> {
    let mut chunk = vec![0u8; COPY_BUFFER_SIZE];
    let mut output = Vec::with_capacity(COPY_BUFFER_SIZE + COPY_BUFFER_SIZE / 2);
    // First byte of a terminator whose partner may follow
    let mut pending: Option<u8> = None;
    let mut lines = 0u64;

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        output.clear();
        for &byte in &chunk[..n] {
            match byte {
                b'\r' | b'\n' => {
                    if let Some(first) = pending {
                        if first != byte {
                            pending = None;
                            continue;
                        }
                    }
                    output.extend_from_slice(target.as_bytes());
                    pending = Some(byte);
                    lines += 1;
                }
                _ => {
                    pending = None;
                    output.push(byte);
                }
            }
        }
        writer.write_all(&output)?;
    }

    Ok(lines)
}
