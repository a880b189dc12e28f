//! Second pass over the fixed FASTA file
//!
//! Once pass one has seen every sequence, the fixed file is re-read protein
//! by protein. The first protein carrying each sequence digest is written and
//! (optionally) annotated with the names of the proteins sharing its sequence;
//! later proteins with the same digest are dropped. The rewrite goes to a
//! temporary file in the same directory that replaces the fixed file only
//! after it has been written completely.

use crate::duplicates::{ProteinSequenceHashRecord, SequenceDuplicateTracker};
use crate::hasher::compute_sequence_hash;
use crate::io::lines::{LineReader, LineTerminator, MAX_PARSE_LINE_LENGTH};
use crate::names::{format_header, renamed_base, split_header};
use crate::options::{DuplicateNamePolicy, ValidatorOptions};
use crate::progress::{AbortHandle, ABORT_CHECK_INTERVAL};
use crate::spanner::SpanningKeyIndex;
use crate::stats::Diagnostics;
use crate::types::{DiagnosticEvent, MessageCode};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Descriptions annotated with duplicate names are cut to this many characters
pub const MAX_CONSOLIDATED_DESCRIPTION_LENGTH: usize = 850;

const DUPLICATE_LIST_PREFIX: &str = "Duplicate proteins: ";
const ELLIPSIS: &str = "...";

#[derive(Debug, Error)]
pub enum ConsolidateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("No sequence hash recorded for protein {protein_name} (line {line_number} of {path})")]
    HashRecordMissing {
        path: PathBuf,
        protein_name: String,
        line_number: u64,
    },

    #[error("Consolidation aborted")]
    Aborted,
}

pub type ConsolidateResult<T> = Result<T, ConsolidateError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationSummary {
    pub proteins_read: usize,
    pub proteins_written: usize,
    /// Proteins dropped because an earlier protein has the same sequence
    pub duplicate_sequences_removed: usize,
    /// Repeated names dropped because their sequence matches the first occurrence
    pub duplicate_names_removed: usize,
    pub duplicate_names_retained: usize,
    pub descriptions_annotated: usize,
}

struct CachedProtein {
    name: String,
    description: String,
    header_line: u64,
    residue_lines: Vec<String>,
}

pub struct DuplicateConsolidator<'a> {
    tracker: &'a SequenceDuplicateTracker,
    sentinel: char,
    ignore_il: bool,
    annotate_and_remove: bool,
    keep_unless_matching: bool,
    spanner_length: usize,
    abort: AbortHandle,
}

impl<'a> DuplicateConsolidator<'a> {
    pub fn new(tracker: &'a SequenceDuplicateTracker, options: &ValidatorOptions, spanner_length: usize) -> Self {
        Self {
            tracker,
            sentinel: options.sentinel,
            ignore_il: options.hashes_ignore_il(),
            annotate_and_remove: options.fix.consolidate_duplicate_sequences,
            keep_unless_matching: options.fix.duplicate_name_policy == DuplicateNamePolicy::KeepUnlessMatchingSequence,
            spanner_length,
            abort: AbortHandle::new(),
        }
    }

    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    /// Rewrites `fixed_path` in place. On error the file is left unchanged.
    pub fn consolidate(
        &self,
        fixed_path: &Path,
        terminator: LineTerminator,
        diagnostics: &mut Diagnostics,
    ) -> ConsolidateResult<ConsolidationSummary> {
        log::info!("Consolidating duplicate sequences in {}", fixed_path.display());

        let dir = fixed_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let temp = tempfile::Builder::new()
            .prefix(".consolidate_")
            .suffix(".fasta")
            .tempfile_in(dir)?;
        let (file, temp_path) = temp.into_parts();
        let mut writer = BufWriter::new(file);

        let mut pass = ConsolidationPass {
            consolidator: self,
            path: fixed_path,
            terminator,
            written: vec![false; self.tracker.len()],
            name_hashes: SpanningKeyIndex::new(self.spanner_length),
            summary: ConsolidationSummary::default(),
        };

        let mut reader = LineReader::new(BufReader::new(File::open(fixed_path)?), terminator, MAX_PARSE_LINE_LENGTH);
        let mut current: Option<CachedProtein> = None;
        let mut line_number = 0u64;

        while let Some(line) = reader.read_line()? {
            line_number += 1;
            if line_number % ABORT_CHECK_INTERVAL == 0 && self.abort.is_aborted() {
                return Err(ConsolidateError::Aborted);
            }
            if line.too_long || line.text.is_empty() {
                continue;
            }

            if line.text.starts_with(self.sentinel) {
                if let Some(protein) = current.take() {
                    pass.process(protein, &mut writer, diagnostics)?;
                }
                let header = split_header(&line.text, self.sentinel);
                current = Some(CachedProtein {
                    name: header.name,
                    description: header.description,
                    header_line: line_number,
                    residue_lines: Vec::new(),
                });
            } else if let Some(protein) = current.as_mut() {
                protein.residue_lines.push(line.text);
            }
        }
        if let Some(protein) = current.take() {
            pass.process(protein, &mut writer, diagnostics)?;
        }

        writer.flush()?;
        drop(writer);
        temp_path.persist(fixed_path).map_err(|e| e.error)?;

        let summary = pass.summary;
        log::info!(
            "Consolidation wrote {} of {} proteins ({} duplicate sequences removed)",
            summary.proteins_written,
            summary.proteins_read,
            summary.duplicate_sequences_removed
        );
        Ok(summary)
    }
}

struct ConsolidationPass<'c, 'a> {
    consolidator: &'c DuplicateConsolidator<'a>,
    path: &'c Path,
    terminator: LineTerminator,
    /// Whether a protein with each record's digest has been written
    written: Vec<bool>,
    /// Digest of the first occurrence of each (lower-cased) name
    name_hashes: SpanningKeyIndex<String>,
    summary: ConsolidationSummary,
}

impl ConsolidationPass<'_, '_> {
    fn process<W: Write>(
        &mut self,
        protein: CachedProtein,
        writer: &mut W,
        diagnostics: &mut Diagnostics,
    ) -> ConsolidateResult<()> {
        self.summary.proteins_read += 1;
        let residues: String = protein.residue_lines.concat();
        let hash = compute_sequence_hash(&residues, self.consolidator.ignore_il);

        let tracker = self.consolidator.tracker;
        let (slot, record) = tracker
            .lookup(&hash)
            .ok_or_else(|| ConsolidateError::HashRecordMissing {
                path: self.path.to_path_buf(),
                protein_name: protein.name.clone(),
                line_number: protein.header_line,
            })?;

        // Nameless headers never share a name
        if !protein.name.is_empty() {
            let name_key = protein.name.to_lowercase();
            match self.name_hashes.get(&name_key).map(|first_hash| *first_hash == hash) {
                Some(true) => {
                    self.summary.duplicate_names_removed += 1;
                    diagnostics.record_builtin(
                        MessageCode::ProteinRemovedSinceDuplicateSequence,
                        DiagnosticEvent::new(0, 1, protein.name.as_str(), MessageCode::ProteinRemovedSinceDuplicateSequence.code())
                            .with_extra_info("same name and sequence as an earlier protein"),
                    );
                    return Ok(());
                }
                Some(false) if self.consolidator.keep_unless_matching => {
                    self.summary.duplicate_names_retained += 1;
                    diagnostics.record_builtin(
                        MessageCode::DuplicateProteinNameRetained,
                        DiagnosticEvent::new(0, 1, protein.name.as_str(), MessageCode::DuplicateProteinNameRetained.code())
                            .with_extra_info("sequence differs from the first protein with this name"),
                    );
                }
                Some(false) => {}
                None => {
                    self.name_hashes.insert(name_key, hash.clone());
                }
            }
        }

        let mut description = protein.description;
        if self.written[slot] {
            if self.consolidator.annotate_and_remove {
                self.summary.duplicate_sequences_removed += 1;
                log::debug!("Removing {}; sequence already written", protein.name);
                return Ok(());
            }
        } else {
            self.written[slot] = true;
            if self.consolidator.annotate_and_remove {
                let others = duplicate_names_for(record, &protein.name);
                if !others.is_empty() {
                    description = append_duplicate_list(&description, &others);
                    self.summary.descriptions_annotated += 1;
                }
            }
        }

        let terminator = self.terminator.as_str();
        write!(
            writer,
            "{}{}",
            format_header(self.consolidator.sentinel, &protein.name, &description),
            terminator
        )?;
        for line in &protein.residue_lines {
            write!(writer, "{}{}", line, terminator)?;
        }
        self.summary.proteins_written += 1;
        Ok(())
    }
}

/// Names sharing `record`'s sequence, excluding `name` and its rename siblings.
pub fn duplicate_names_for<'r>(record: &'r ProteinSequenceHashRecord, name: &str) -> Vec<&'r str> {
    let own_base = renamed_base(name).unwrap_or(name);
    std::iter::once(record.first_protein_name.as_str())
        .chain(record.additional_protein_names.iter().map(String::as_str))
        .filter(|other| !other.eq_ignore_ascii_case(name))
        .filter(|other| {
            let other_base = renamed_base(other).unwrap_or(*other);
            !other_base.eq_ignore_ascii_case(own_base)
        })
        .collect()
}

/// Appends `Duplicate proteins: a,b` to `description`, capping its length.
pub fn append_duplicate_list(description: &str, names: &[&str]) -> String {
    let list = format!("{}{}", DUPLICATE_LIST_PREFIX, names.join(","));
    let combined = if description.is_empty() {
        list
    } else {
        format!("{}; {}", description, list)
    };

    if combined.chars().count() <= MAX_CONSOLIDATED_DESCRIPTION_LENGTH {
        return combined;
    }
    let keep = MAX_CONSOLIDATED_DESCRIPTION_LENGTH - ELLIPSIS.len();
    let mut truncated: String = combined.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}
