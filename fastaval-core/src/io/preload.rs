//! Preloading a previously generated protein hash file
//!
//! The hash file is sorted by its digest column (delegated to a
//! `HashFileSorter`), then every protein after the first one for a given
//! digest is put on a skip list. The validator uses that list to leave
//! duplicates out of the fixed FASTA file without hashing anything itself.

use super::reports::HASH_INFO_HEADER;
use crate::spanner::SpanningNameSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempPath;
use thiserror::Error;

/// 0-based column holding the digest in a `_ProteinHashes.txt` file
pub const HASH_COLUMN: usize = 3;
pub const NAME_COLUMN: usize = 1;

#[derive(Debug, Error)]
pub enum PreloadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sort tool '{tool}' failed: {message}")]
    SortFailed { tool: String, message: String },

    #[error("Malformed hash file {path} at line {line}: {message}")]
    Malformed { path: PathBuf, line: usize, message: String },
}

pub type PreloadResult<T> = Result<T, PreloadError>;

/// Sorts a tab-separated file by one column
pub trait HashFileSorter {
    /// Returns a temporary file holding the rows of `input` sorted by `column`
    /// (0-based). Rows with equal keys keep their input order.
    fn sort_by_column(&self, input: &Path, column: usize) -> PreloadResult<TempPath>;

    fn name(&self) -> &'static str;
}

/// Sorts in memory; suitable for files that fit comfortably in RAM.
#[derive(Debug, Default, Clone, Copy)]
pub struct InMemorySorter;

impl HashFileSorter for InMemorySorter {
    fn sort_by_column(&self, input: &Path, column: usize) -> PreloadResult<TempPath> {
        let reader = BufReader::new(File::open(input)?);
        let mut rows = reader.lines().collect::<Result<Vec<String>, _>>()?;
        rows.sort_by(|a, b| column_value(a, column).cmp(column_value(b, column)));

        let temp = tempfile::NamedTempFile::new()?;
        let (file, path) = temp.into_parts();
        let mut writer = BufWriter::new(file);
        for row in &rows {
            writeln!(writer, "{}", row)?;
        }
        writer.flush()?;
        Ok(path)
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

/// Delegates to the platform `sort` utility, which spills to disk for large inputs.
#[derive(Debug, Clone)]
pub struct SystemSortTool {
    binary_path: PathBuf,
}

impl SystemSortTool {
    pub fn new(binary_path: Option<PathBuf>) -> Self {
        let binary_path = binary_path.unwrap_or_else(|| which::which("sort").unwrap_or_else(|_| PathBuf::from("sort")));
        Self { binary_path }
    }

    pub fn is_available(&self) -> bool {
        which::which(&self.binary_path).is_ok()
    }
}

impl HashFileSorter for SystemSortTool {
    fn sort_by_column(&self, input: &Path, column: usize) -> PreloadResult<TempPath> {
        let output = tempfile::NamedTempFile::new()?.into_temp_path();
        let key = format!("{},{}", column + 1, column + 1);

        let mut cmd = Command::new(&self.binary_path);
        cmd.env("LC_ALL", "C")
            .arg("-s")
            .arg("-t")
            .arg("\t")
            .arg("-k")
            .arg(&key)
            .arg("-o")
            .arg(&*output)
            .arg(input);

        log::info!("Running sort: {:?}", cmd);
        let result = cmd.output()?;
        if !result.status.success() {
            return Err(PreloadError::SortFailed {
                tool: self.binary_path.display().to_string(),
                message: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "sort"
    }
}

/// Names to leave out of the fixed file, derived from an existing hash file
#[derive(Debug, Clone, Default)]
pub struct ExistingHashPreload {
    skip_names: SpanningNameSet,
    pub proteins_read: usize,
    pub distinct_hashes: usize,
}

impl ExistingHashPreload {
    pub fn should_skip(&self, protein_name: &str) -> bool {
        self.skip_names.contains(protein_name)
    }

    pub fn skip_count(&self) -> usize {
        self.skip_names.len()
    }
}

/// Sorts `hash_file` by digest and keeps only the first protein name per digest.
pub fn load_existing_hashes(
    hash_file: &Path,
    sorter: &dyn HashFileSorter,
    spanner_length: usize,
) -> PreloadResult<ExistingHashPreload> {
    log::info!(
        "Sorting existing protein hashes in {} using {}",
        hash_file.display(),
        sorter.name()
    );
    let sorted = sorter.sort_by_column(hash_file, HASH_COLUMN)?;

    let mut preload = ExistingHashPreload {
        skip_names: SpanningNameSet::new(spanner_length),
        ..Default::default()
    };
    let mut previous_hash: Option<String> = None;

    let reader = BufReader::new(File::open(&sorted)?);
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.first() == Some(&HASH_INFO_HEADER[0]) {
            continue;
        }
        if fields.len() <= HASH_COLUMN {
            return Err(PreloadError::Malformed {
                path: hash_file.to_path_buf(),
                line: index + 1,
                message: format!("expected {} columns, found {}", HASH_COLUMN + 1, fields.len()),
            });
        }

        let name = fields[NAME_COLUMN];
        let hash = fields[HASH_COLUMN];
        preload.proteins_read += 1;

        if previous_hash.as_deref() == Some(hash) {
            preload.skip_names.insert(name);
        } else {
            preload.distinct_hashes += 1;
            previous_hash = Some(hash.to_string());
        }
    }

    log::info!(
        "Loaded {} proteins with {} distinct sequences; {} duplicates will be skipped",
        preload.proteins_read,
        preload.distinct_hashes,
        preload.skip_count()
    );
    Ok(preload)
}

fn column_value(row: &str, column: usize) -> &str {
    row.split('\t').nth(column).unwrap_or("")
}
