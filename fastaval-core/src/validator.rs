//! Streaming FASTA validation and repair
//!
//! `FastaValidator::validate_file` runs the whole pipeline for one input:
//! optional line-ending normalization, spanner tuning, optional preload of an
//! existing hash file, the line-by-line first pass (diagnostics, fixed FASTA,
//! hash info), the duplicate-sequence reports, the optional consolidation
//! pass and finally the stats file.

use crate::consolidate::{ConsolidateError, ConsolidationSummary, DuplicateConsolidator};
use crate::duplicates::{NameCheck, ProteinNameTracker, SequenceDuplicateTracker, SequenceObservation};
use crate::hasher::compute_sequence_hash;
use crate::io::line_endings::normalize_line_endings;
use crate::io::lines::{detect_line_terminator, LineReader, LineTerminator, RawLine, MAX_PARSE_LINE_LENGTH};
use crate::io::preload::{load_existing_hashes, ExistingHashPreload, HashFileSorter, PreloadError, SystemSortTool};
use crate::io::reports::{
    append_stats_file, write_duplicate_mapping_report, write_unique_sequences_report, HashInfoWriter,
};
use crate::names::{format_header, split_header, NameNormalizer, NormalizedName};
use crate::options::{
    OptionsError, SpannerLength, ValidatorOptions, BASIC_HASH_INFO_SUFFIX, DUPLICATE_MAPPING_SUFFIX,
    FIXED_FASTA_SUFFIX, UNIQUE_SEQUENCES_SUFFIX,
};
use crate::progress::{AbortHandle, NoopObserver, Phase, ProgressObserver, ABORT_CHECK_INTERVAL};
use crate::rules::{RuleEngine, RuleError, RuleTarget, RuleViolation};
use crate::stats::Diagnostics;
use crate::tuner::tune_spanner_length;
use crate::types::{DiagnosticEvent, LineNumber, MessageCatalog, MessageCode};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Lines longer than this produce a `LineIsVeryLong` warning
pub const VERY_LONG_LINE_LENGTH: usize = 100_000;
/// Lines longer than this produce a `LineIsExtremelyLong` warning
pub const EXTREMELY_LONG_LINE_LENGTH: usize = 1_000_000;

/// Hex digests only need a short prefix to spread across partitions
const MAX_HASH_SPANNER_LENGTH: usize = 2;

#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Failed to read input file {path}: {source}")]
    InputIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid options: {0}")]
    Options(#[from] OptionsError),

    #[error("Invalid rule: {0}")]
    Rule(#[from] RuleError),

    #[error("Failed to preload existing protein hashes: {0}")]
    Preload(#[from] PreloadError),
}

pub type ValidateResult<T> = Result<T, ValidateError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Complete,
    Aborted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFiles {
    pub fixed_fasta: Option<PathBuf>,
    pub hash_info: Option<PathBuf>,
    pub unique_sequences: Option<PathBuf>,
    pub duplicate_mapping: Option<PathBuf>,
    pub stats_file: Option<PathBuf>,
}

/// Counts of the repairs applied while writing the fixed FASTA file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixStats {
    pub names_truncated: usize,
    pub names_split: usize,
    pub names_with_invalid_chars_replaced: usize,
    pub residue_lines_cleaned: usize,
    pub stop_codons_stripped: usize,
    pub proteins_rewrapped: usize,
    pub duplicate_names_renamed: usize,
    pub duplicate_names_skipped: usize,
    pub proteins_skipped_from_existing_hashes: usize,
}

/// An output stream that could not be written; processing continued without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFailure {
    pub output: String,
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub source: PathBuf,
    pub status: RunStatus,
    pub line_count: u64,
    pub protein_count: u64,
    pub residue_count: u64,
    pub unique_sequence_count: usize,
    /// Proteins whose sequence matched an earlier protein
    pub repeated_sequence_count: usize,
    pub spanner_length: usize,
    pub line_terminator: LineTerminator,
    pub line_endings_normalized: bool,
    pub linefeed_appended: bool,
    pub diagnostics: Diagnostics,
    pub catalog: MessageCatalog,
    pub outputs: OutputFiles,
    pub fix_stats: FixStats,
    pub consolidation: Option<ConsolidationSummary>,
    pub output_failures: Vec<OutputFailure>,
}

impl ValidationReport {
    pub fn error_count(&self) -> usize {
        self.diagnostics.error_count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.warning_count()
    }

    /// Complete run with no errors
    pub fn is_valid(&self) -> bool {
        self.status == RunStatus::Complete && self.error_count() == 0
    }

    pub fn describe(&self, message_code: u32) -> String {
        self.catalog.describe(message_code)
    }
}

pub struct FastaValidator {
    options: ValidatorOptions,
    rules: RuleEngine,
    normalizer: NameNormalizer,
    observer: Box<dyn ProgressObserver>,
    sorter: Box<dyn HashFileSorter>,
    abort: AbortHandle,
    max_line_length: usize,
}

impl FastaValidator {
    pub fn new(options: ValidatorOptions) -> ValidateResult<Self> {
        options.validate()?;
        let rules = RuleEngine::new(&options)?;
        let normalizer = NameNormalizer::new(options.fix.clone(), options.max_protein_name_length);

        Ok(Self {
            options,
            rules,
            normalizer,
            observer: Box::new(NoopObserver),
            sorter: Box::new(SystemSortTool::new(None)),
            abort: AbortHandle::new(),
            max_line_length: MAX_PARSE_LINE_LENGTH,
        })
    }

    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_sorter(mut self, sorter: Box<dyn HashFileSorter>) -> Self {
        self.sorter = sorter;
        self
    }

    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    /// Lines longer than `max_line_length` are reported and skipped unparsed
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    /// Handle that cancels a running validation from another thread
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    pub fn validate_file(&self, input: &Path) -> ValidateResult<ValidationReport> {
        if !input.is_file() {
            return Err(ValidateError::InputNotFound(input.to_path_buf()));
        }
        let input_error = |source: io::Error| ValidateError::InputIo {
            path: input.to_path_buf(),
            source,
        };

        log::info!("Validating {}", input.display());
        let original_terminator = detect_line_terminator(input).map_err(input_error)?;

        let normalized = if self.options.normalize_line_endings {
            self.observer.on_phase(Phase::NormalizingLineEndings);
            let work_dir = self.work_dir(input);
            let path = normalize_line_endings(input, LineTerminator::CrLf, &work_dir).map_err(input_error)?;
            log::info!("Line endings normalized to CRLF in {}", path.display());
            self.observer.on_line_endings_normalized(input, &path);
            Some(path)
        } else {
            None
        };
        let (read_path, terminator) = match &normalized {
            Some(path) => (&**path, LineTerminator::CrLf),
            None => (input, original_terminator),
        };

        let spanner_length = match self.options.spanner_length {
            SpannerLength::Fixed(length) => length,
            SpannerLength::Auto => {
                self.observer.on_phase(Phase::TuningSpanner);
                tune_spanner_length(read_path, self.options.sentinel, &self.abort)
                    .map_err(input_error)?
                    .spanner_length
            }
        };

        let preload = match &self.options.existing_hash_file {
            Some(hash_file) => {
                self.observer.on_phase(Phase::PreloadingHashes);
                Some(load_existing_hashes(hash_file, self.sorter.as_ref(), spanner_length)?)
            }
            None => None,
        };

        let file_len = std::fs::metadata(read_path).map_err(input_error)?.len();
        let reader = File::open(read_path).map_err(input_error)?;

        let mut pass = FirstPass::new(self, input, terminator, spanner_length, preload);
        self.observer.on_phase(Phase::Validating);
        pass.run(BufReader::new(reader), file_len).map_err(input_error)?;

        if pass.line_count > 0 && !pass.last_line_terminated && pass.status == RunStatus::Complete {
            pass.handle_missing_final_terminator(input, original_terminator);
        }

        Ok(pass.finish())
    }

    fn work_dir(&self, input: &Path) -> PathBuf {
        match &self.options.output_directory {
            Some(dir) => dir.clone(),
            None => input
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    AwaitingHeader,
    HeaderSeen,
    InResidueBlock,
}

struct ProteinEntry {
    name: String,
    description: String,
    header_line: LineNumber,
    residue_lines: Vec<String>,
    write_to_fixed: bool,
}

struct FirstPass<'v> {
    validator: &'v FastaValidator,
    options: &'v ValidatorOptions,
    source: PathBuf,
    terminator: LineTerminator,
    spanner_length: usize,
    preload: Option<ExistingHashPreload>,

    state: ParserState,
    /// First line of the current run of blank lines
    pending_blank_line: Option<LineNumber>,
    orphan_reported: bool,
    current: Option<ProteinEntry>,

    status: RunStatus,
    line_count: u64,
    protein_count: u64,
    residue_count: u64,
    repeated_sequence_count: usize,
    last_line_terminated: bool,
    last_line_length: usize,
    linefeed_appended: bool,

    diagnostics: Diagnostics,
    names: ProteinNameTracker,
    sequences: SequenceDuplicateTracker,
    fix_stats: FixStats,
    outputs: OutputFiles,
    output_failures: Vec<OutputFailure>,

    fixed_writer: Option<BufWriter<File>>,
    hash_writer: Option<HashInfoWriter>,
}

impl<'v> FirstPass<'v> {
    fn new(
        validator: &'v FastaValidator,
        source: &Path,
        terminator: LineTerminator,
        spanner_length: usize,
        preload: Option<ExistingHashPreload>,
    ) -> Self {
        let options = &validator.options;
        let mut pass = Self {
            validator,
            options,
            source: source.to_path_buf(),
            terminator,
            spanner_length,
            preload,
            state: ParserState::AwaitingHeader,
            pending_blank_line: None,
            orphan_reported: false,
            current: None,
            status: RunStatus::Complete,
            line_count: 0,
            protein_count: 0,
            residue_count: 0,
            repeated_sequence_count: 0,
            last_line_terminated: true,
            last_line_length: 0,
            linefeed_appended: false,
            diagnostics: Diagnostics::new(options.max_errors_per_code),
            names: ProteinNameTracker::new(spanner_length),
            sequences: SequenceDuplicateTracker::new(spanner_length.min(MAX_HASH_SPANNER_LENGTH)),
            fix_stats: FixStats::default(),
            outputs: OutputFiles::default(),
            output_failures: Vec::new(),
            fixed_writer: None,
            hash_writer: None,
        };
        pass.open_outputs();
        pass
    }

    fn open_outputs(&mut self) {
        if self.options.generate_fixed_fasta {
            let path = self.options.output_path_for(&self.source, FIXED_FASTA_SUFFIX);
            match File::create(&path) {
                Ok(file) => {
                    log::info!("Writing fixed FASTA file {}", path.display());
                    self.fixed_writer = Some(BufWriter::new(file));
                    self.outputs.fixed_fasta = Some(path);
                }
                Err(e) => self.output_failed("fixed FASTA", &path, &e),
            }
        }

        if self.options.save_basic_hash_info_file || self.options.save_hash_info_files {
            let path = self.options.output_path_for(&self.source, BASIC_HASH_INFO_SUFFIX);
            match HashInfoWriter::create(&path) {
                Ok(writer) => {
                    self.hash_writer = Some(writer);
                    self.outputs.hash_info = Some(path);
                }
                Err(e) => self.output_failed("hash info", &path, &e),
            }
        }
    }

    fn output_failed(&mut self, output: &str, path: &Path, error: &io::Error) {
        log::error!("Disabling {} output {}: {}", output, path.display(), error);
        self.output_failures.push(OutputFailure {
            output: output.to_string(),
            path: path.to_path_buf(),
            message: error.to_string(),
        });
    }

    fn run<R: io::BufRead>(&mut self, reader: R, file_len: u64) -> io::Result<()> {
        let mut lines = LineReader::new(reader, self.terminator, self.validator.max_line_length);

        loop {
            if self.line_count % ABORT_CHECK_INTERVAL == 0 {
                if self.validator.abort.is_aborted() {
                    log::warn!("Validation of {} aborted at line {}", self.source.display(), self.line_count);
                    self.status = RunStatus::Aborted;
                    break;
                }
                if file_len > 0 {
                    self.validator
                        .observer
                        .on_progress(lines.bytes_read() as f32 / file_len as f32 * 100.0);
                }
            }

            let Some(line) = lines.read_line()? else {
                break;
            };
            self.line_count += 1;
            self.last_line_terminated = line.terminated;
            self.last_line_length = line.length;
            self.process_line(line);
        }

        if self.status == RunStatus::Complete {
            if let Some(protein) = self.current.take() {
                self.flush_protein(protein, true);
            }
            if self.protein_count == 0 {
                self.builtin(MessageCode::ProteinEntriesNotFound, DiagnosticEvent::new(0, 0, "", MessageCode::ProteinEntriesNotFound.code()));
            }
            self.validator.observer.on_progress(100.0);
        }
        Ok(())
    }

    fn process_line(&mut self, line: RawLine) {
        let line_number = self.line_count;

        if line.too_long {
            self.builtin(
                MessageCode::LineTooLongToParse,
                self.event(line_number, 1, MessageCode::LineTooLongToParse)
                    .with_extra_info(format!("{} characters", line.length)),
            );
            return;
        }
        if line.length > EXTREMELY_LONG_LINE_LENGTH {
            self.builtin(
                MessageCode::LineIsExtremelyLong,
                self.event(line_number, 1, MessageCode::LineIsExtremelyLong)
                    .with_extra_info(format!("{} characters", line.length)),
            );
        } else if line.length > VERY_LONG_LINE_LENGTH {
            self.builtin(
                MessageCode::LineIsVeryLong,
                self.event(line_number, 1, MessageCode::LineIsVeryLong)
                    .with_extra_info(format!("{} characters", line.length)),
            );
        }

        let text = line.text;
        if text.trim().is_empty() {
            if self.pending_blank_line.is_none() {
                self.pending_blank_line = Some(line_number);
            }
            return;
        }

        let trimmed = text.trim_start();
        if trimmed.starts_with(self.options.sentinel) {
            self.resolve_blank_lines(true);
            let leading = text.len() - trimmed.len();
            if leading > 0 {
                self.builtin(
                    MessageCode::LineStartsWithSpace,
                    DiagnosticEvent::new(line_number, 1, "", MessageCode::LineStartsWithSpace.code())
                        .with_context(crate::rules::context_window(&text, 0, self.options.context_length)),
                );
            }
            if let Some(protein) = self.current.take() {
                self.flush_protein(protein, false);
            }
            self.process_header(line_number, &text, leading);
        } else {
            self.resolve_blank_lines(false);
            self.process_residues(line_number, text);
        }
    }

    /// Reports the blank lines seen since the last non-blank line, now that the next line is known.
    fn resolve_blank_lines(&mut self, next_is_header: bool) {
        let Some(blank_line) = self.pending_blank_line.take() else {
            return;
        };
        let name = self.current_name();
        let code = match (next_is_header, self.state) {
            (true, _) if self.options.warn_blank_lines_between_proteins => MessageCode::BlankLineBeforeProteinName,
            (true, _) => return,
            (false, ParserState::HeaderSeen) => MessageCode::BlankLineBetweenProteinNameAndResidues,
            (false, ParserState::InResidueBlock) => MessageCode::BlankLineInMiddleOfResidues,
            (false, ParserState::AwaitingHeader) => return,
        };
        self.builtin(code, DiagnosticEvent::new(blank_line, 1, name, code.code()));
    }

    fn process_header(&mut self, line_number: LineNumber, line: &str, leading: usize) {
        self.state = ParserState::HeaderSeen;
        self.orphan_reported = false;
        self.protein_count += 1;

        let sentinel = self.options.sentinel;
        let context_length = self.options.context_length;
        let header = &line[leading..];
        let parsed = split_header(header, sentinel);
        let name_offset = leading + sentinel.len_utf8();
        let rules = &self.validator.rules;

        let mut violations = rules.evaluate(RuleTarget::HeaderLine, line_number, &parsed.name, header, leading, line, context_length);
        if !parsed.name.is_empty() {
            violations.extend(rules.evaluate(RuleTarget::ProteinName, line_number, &parsed.name, &parsed.name, name_offset, line, context_length));
        }
        if !parsed.description.is_empty() {
            violations.extend(rules.evaluate(
                RuleTarget::ProteinDescription,
                line_number,
                &parsed.name,
                &parsed.description,
                leading + parsed.description_start,
                line,
                context_length,
            ));
        }
        self.record_violations(violations);

        let name_length = parsed.name.chars().count();
        if name_length > 0 && name_length < self.options.min_protein_name_length {
            self.builtin(
                MessageCode::ProteinNameIsTooShort,
                DiagnosticEvent::new(line_number, name_offset + 1, parsed.name.as_str(), MessageCode::ProteinNameIsTooShort.code())
                    .with_extra_info(format!("{} characters", name_length)),
            );
        } else if name_length > self.options.max_protein_name_length {
            self.builtin(
                MessageCode::ProteinNameIsTooLong,
                DiagnosticEvent::new(line_number, name_offset + 1, parsed.name.as_str(), MessageCode::ProteinNameIsTooLong.code())
                    .with_extra_info(format!("{} characters", name_length)),
            );
        }

        let repair = self.options.generate_fixed_fasta;
        let normalized = if repair && !parsed.name.is_empty() {
            self.validator.normalizer.normalize(&parsed.name, &parsed.description)
        } else {
            NormalizedName {
                name: parsed.name.clone(),
                description: parsed.description.clone(),
                changes: Default::default(),
            }
        };
        self.count_name_changes(&parsed.name, &normalized);

        let mut name = normalized.name;
        let mut write_to_fixed = true;

        if self.options.check_duplicate_protein_names && !name.is_empty() {
            match self.names.check(&name, self.options.fix.duplicate_name_policy, repair) {
                NameCheck::Unique => {}
                NameCheck::Renamed(renamed) => {
                    log::debug!("Renamed duplicate protein {} to {}", name, renamed);
                    self.fix_stats.duplicate_names_renamed += 1;
                    self.builtin(
                        MessageCode::RenamedProtein,
                        DiagnosticEvent::new(line_number, name_offset + 1, name.as_str(), MessageCode::RenamedProtein.code())
                            .with_extra_info(format!("renamed to {}", renamed)),
                    );
                    name = renamed;
                }
                NameCheck::Retained => {
                    if !self.options.consolidation_requested() {
                        self.builtin(
                            MessageCode::DuplicateProteinNameRetained,
                            DiagnosticEvent::new(line_number, name_offset + 1, name.as_str(), MessageCode::DuplicateProteinNameRetained.code()),
                        );
                    }
                }
                NameCheck::Skip => {
                    self.builtin(
                        MessageCode::DuplicateProteinName,
                        DiagnosticEvent::new(line_number, name_offset + 1, name.as_str(), MessageCode::DuplicateProteinName.code())
                            .with_context(crate::rules::context_window(line, name_offset, context_length)),
                    );
                    // Hash side-files keep one row per protein, so the repeat stays in the fixed file
                    let hash_side_file = self.options.save_basic_hash_info_file || self.options.save_hash_info_files;
                    if repair && !hash_side_file {
                        self.fix_stats.duplicate_names_skipped += 1;
                        write_to_fixed = false;
                    }
                }
            }
        }

        if let Some(preload) = &self.preload {
            if preload.should_skip(&name) {
                self.fix_stats.proteins_skipped_from_existing_hashes += 1;
                self.builtin(
                    MessageCode::ProteinRemovedSinceDuplicateSequence,
                    DiagnosticEvent::new(line_number, name_offset + 1, name.as_str(), MessageCode::ProteinRemovedSinceDuplicateSequence.code())
                        .with_extra_info("listed as a duplicate in the existing hash file"),
                );
                write_to_fixed = false;
            }
        }

        self.current = Some(ProteinEntry {
            name,
            description: normalized.description,
            header_line: line_number,
            residue_lines: Vec::new(),
            write_to_fixed,
        });
    }

    fn count_name_changes(&mut self, original: &str, normalized: &NormalizedName) {
        let changes = normalized.changes;
        if !changes.any() {
            return;
        }
        log::debug!("Protein name {} normalized to {}", original, normalized.name);
        if changes.truncated {
            self.fix_stats.names_truncated += 1;
        }
        if changes.known_accession_split || changes.multi_ref_split {
            self.fix_stats.names_split += 1;
        }
        if changes.invalid_chars_replaced {
            self.fix_stats.names_with_invalid_chars_replaced += 1;
        }
    }

    fn process_residues(&mut self, line_number: LineNumber, text: String) {
        if self.current.is_none() {
            if !self.orphan_reported {
                self.orphan_reported = true;
                self.builtin(
                    MessageCode::ResiduesFoundWithoutProteinHeader,
                    DiagnosticEvent::new(line_number, 1, "", MessageCode::ResiduesFoundWithoutProteinHeader.code())
                        .with_context(crate::rules::context_window(&text, 0, self.options.context_length)),
                );
            }
            return;
        }
        self.state = ParserState::InResidueBlock;

        let name = self.current_name();
        let violations = self.validator.rules.evaluate(
            RuleTarget::ProteinSequence,
            line_number,
            &name,
            &text,
            0,
            &text,
            self.options.context_length,
        );
        self.record_violations(violations);

        let residue_count = text.chars().filter(char::is_ascii_alphabetic).count();
        if residue_count > self.options.max_residues_per_line {
            self.builtin(
                MessageCode::ResiduesLineTooLong,
                DiagnosticEvent::new(line_number, self.options.max_residues_per_line + 1, name.as_str(), MessageCode::ResiduesLineTooLong.code())
                    .with_extra_info(format!("{} residues", residue_count)),
            );
        }
        self.residue_count += residue_count as u64;

        if let Some(protein) = self.current.as_mut() {
            protein.residue_lines.push(text);
        }
    }

    fn flush_protein(&mut self, protein: ProteinEntry, at_end_of_file: bool) {
        if protein.residue_lines.is_empty() {
            let code = if at_end_of_file {
                MessageCode::FinalProteinEntryMissingResidues
            } else {
                MessageCode::ProteinEntryMissingResidues
            };
            self.builtin(code, DiagnosticEvent::new(protein.header_line, 1, protein.name.as_str(), code.code()));
            return;
        }

        let repair = self.options.generate_fixed_fasta;
        let mut lines = protein.residue_lines;
        if repair && self.options.fix.remove_invalid_residues {
            for line in lines.iter_mut() {
                if line.chars().any(|c| !c.is_ascii_alphabetic() && c != '*') {
                    line.retain(|c| c.is_ascii_alphabetic() || c == '*');
                    self.fix_stats.residue_lines_cleaned += 1;
                }
            }
            lines.retain(|l| !l.is_empty());
        }
        if strip_trailing_stop_codons(&mut lines) {
            self.fix_stats.stop_codons_stripped += 1;
        }

        let sequence = lines.concat();
        let sequence_length = sequence.chars().count();
        // Flushed before the next header is counted
        let protein_id = self.protein_count;

        if self.options.needs_sequence_hashes() {
            let hash = compute_sequence_hash(&sequence, self.options.hashes_ignore_il());

            if let Some(writer) = self.hash_writer.as_mut() {
                if let Err(e) = writer.write_row(protein_id, &protein.name, sequence_length, &hash) {
                    let path = writer.path().to_path_buf();
                    self.hash_writer = None;
                    self.outputs.hash_info = None;
                    self.output_failed("hash info", &path, &e);
                }
            }

            let track = self.options.check_duplicate_protein_sequences
                || self.options.save_hash_info_files
                || self.options.consolidation_requested();
            if track && (protein.write_to_fixed || !repair) {
                match self.sequences.observe(&hash, sequence_length, &protein.name) {
                    SequenceObservation::New(_) => {}
                    SequenceObservation::RepeatedName(_) | SequenceObservation::AdditionalName(_) => {
                        self.repeated_sequence_count += 1;
                    }
                }
            }
        }

        if protein.write_to_fixed && self.fixed_writer.is_some() {
            let rewrap = self.options.fix.wrap_long_residue_lines
                && lines.iter().any(|l| l.chars().count() > self.options.max_residues_per_line);
            if rewrap {
                self.fix_stats.proteins_rewrapped += 1;
                lines = wrap_residues(&sequence, self.options.fix.residues_per_line_for_wrap);
            }

            let header = format_header(self.options.sentinel, &protein.name, &protein.description);
            if let Err(e) = self.write_fixed(&header, &lines) {
                let path = self.outputs.fixed_fasta.take().unwrap_or_default();
                self.fixed_writer = None;
                self.output_failed("fixed FASTA", &path, &e);
            }
        }
    }

    fn write_fixed(&mut self, header: &str, lines: &[String]) -> io::Result<()> {
        let terminator = self.terminator.as_str();
        if let Some(writer) = self.fixed_writer.as_mut() {
            write!(writer, "{}{}", header, terminator)?;
            for line in lines {
                write!(writer, "{}{}", line, terminator)?;
            }
        }
        Ok(())
    }

    fn handle_missing_final_terminator(&mut self, input: &Path, terminator: LineTerminator) {
        let line_number = self.line_count;
        if self.options.fix_missing_final_linefeed {
            let appended = OpenOptions::new()
                .append(true)
                .open(input)
                .and_then(|mut file| file.write_all(terminator.as_bytes()));
            match appended {
                Ok(()) => {
                    log::info!("Appended missing final line terminator to {}", input.display());
                    self.linefeed_appended = true;
                    return;
                }
                Err(e) => self.output_failed("input line terminator", input, &e),
            }
        }
        self.builtin(
            MessageCode::FileDoesNotEndWithLinefeed,
            DiagnosticEvent::new(line_number, self.last_line_length + 1, "", MessageCode::FileDoesNotEndWithLinefeed.code()),
        );
    }

    fn finish(mut self) -> ValidationReport {
        if let Some(mut writer) = self.fixed_writer.take() {
            if let Err(e) = writer.flush() {
                let path = self.outputs.fixed_fasta.take().unwrap_or_default();
                self.output_failed("fixed FASTA", &path, &e);
            }
        }
        if let Some(writer) = self.hash_writer.take() {
            let path = writer.path().to_path_buf();
            match writer.finish() {
                Ok(rows) => log::info!("Wrote {} protein hashes to {}", rows, path.display()),
                Err(e) => {
                    self.outputs.hash_info = None;
                    self.output_failed("hash info", &path, &e);
                }
            }
        }

        let mut consolidation = None;
        if self.status == RunStatus::Complete {
            self.validator.observer.on_phase(Phase::WritingReports);
            self.report_duplicate_sequences();
            self.write_sequence_reports();

            if self.options.consolidation_requested() {
                if let Some(fixed) = self.outputs.fixed_fasta.clone() {
                    self.validator.observer.on_phase(Phase::Consolidating);
                    let consolidator = DuplicateConsolidator::new(&self.sequences, self.options, self.spanner_length)
                        .with_abort_handle(self.validator.abort.clone());
                    match consolidator.consolidate(&fixed, self.terminator, &mut self.diagnostics) {
                        Ok(summary) => consolidation = Some(summary),
                        Err(ConsolidateError::Aborted) => {
                            log::warn!("Consolidation of {} aborted", fixed.display());
                            self.status = RunStatus::Aborted;
                        }
                        Err(e) => {
                            log::error!("Consolidation of {} failed: {}", fixed.display(), e);
                            self.output_failures.push(OutputFailure {
                                output: "consolidation".to_string(),
                                path: fixed,
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        if self.status == RunStatus::Complete {
            if let Some(stats_path) = self.options.stats_file.clone() {
                let source = self.source.display().to_string();
                let delimiter = if self.options.file_output_active() { '\t' } else { ',' };
                let catalog = self.validator.rules.catalog();
                match append_stats_file(&stats_path, &source, &self.diagnostics, catalog, delimiter) {
                    Ok(()) => self.outputs.stats_file = Some(stats_path),
                    Err(e) => self.output_failed("stats file", &stats_path, &e),
                }
            }
        }

        log::info!(
            "{}: {} proteins, {} errors, {} warnings",
            self.source.display(),
            self.protein_count,
            self.diagnostics.error_count(),
            self.diagnostics.warning_count()
        );

        ValidationReport {
            source: self.source,
            status: self.status,
            line_count: self.line_count,
            protein_count: self.protein_count,
            residue_count: self.residue_count,
            unique_sequence_count: self.sequences.len(),
            repeated_sequence_count: self.repeated_sequence_count,
            spanner_length: self.spanner_length,
            line_terminator: self.terminator,
            line_endings_normalized: self.options.normalize_line_endings,
            linefeed_appended: self.linefeed_appended,
            diagnostics: self.diagnostics,
            catalog: self.validator.rules.catalog().clone(),
            outputs: self.outputs,
            fix_stats: self.fix_stats,
            consolidation,
            output_failures: self.output_failures,
        }
    }

    /// One warning per sequence shared by differently named proteins, after all pass-one events
    fn report_duplicate_sequences(&mut self) {
        if !self.options.check_duplicate_protein_sequences || self.sequences.is_empty() {
            return;
        }
        let events: Vec<DiagnosticEvent> = self
            .sequences
            .duplicated_records()
            .map(|(_, record)| {
                DiagnosticEvent::new(0, 1, record.first_protein_name.as_str(), MessageCode::DuplicateProteinSequence.code())
                    .with_extra_info(format!("same sequence as {}", record.additional_protein_names.join(", ")))
            })
            .collect();
        for event in events {
            self.builtin(MessageCode::DuplicateProteinSequence, event);
        }
    }

    fn write_sequence_reports(&mut self) {
        if !self.options.save_hash_info_files {
            return;
        }
        let unique = self.options.output_path_for(&self.source, UNIQUE_SEQUENCES_SUFFIX);
        match write_unique_sequences_report(&unique, self.sequences.records()) {
            Ok(()) => self.outputs.unique_sequences = Some(unique),
            Err(e) => self.output_failed("unique sequences report", &unique, &e),
        }

        let mapping = self.options.output_path_for(&self.source, DUPLICATE_MAPPING_SUFFIX);
        match write_duplicate_mapping_report(&mapping, self.sequences.records()) {
            Ok(true) => self.outputs.duplicate_mapping = Some(mapping),
            Ok(false) => {}
            Err(e) => self.output_failed("duplicate mapping report", &mapping, &e),
        }
    }

    fn record_violations(&mut self, violations: Vec<RuleViolation>) {
        for violation in violations {
            self.diagnostics.record(violation.severity, violation.event);
        }
    }

    fn builtin(&mut self, code: MessageCode, event: DiagnosticEvent) {
        self.diagnostics.record_builtin(code, event);
    }

    fn event(&self, line_number: LineNumber, column: usize, code: MessageCode) -> DiagnosticEvent {
        DiagnosticEvent::new(line_number, column, self.current_name(), code.code())
    }

    fn current_name(&self) -> String {
        self.current.as_ref().map(|p| p.name.clone()).unwrap_or_default()
    }
}

/// Removes trailing `*` from the end of the residue block, dropping lines left empty.
fn strip_trailing_stop_codons(lines: &mut Vec<String>) -> bool {
    let mut stripped = false;
    while let Some(last) = lines.last_mut() {
        let kept = last.trim_end_matches('*').len();
        if kept == last.len() {
            break;
        }
        stripped = true;
        last.truncate(kept);
        if last.is_empty() {
            lines.pop();
        } else {
            break;
        }
    }
    stripped
}

fn wrap_residues(sequence: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = sequence.chars().collect();
    chars.chunks(width.max(1)).map(|chunk| chunk.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::FixedFastaOptions;

    fn run(content: &str, options: ValidatorOptions) -> (tempfile::TempDir, ValidationReport) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.fasta");
        std::fs::write(&input, content).unwrap();
        let report = FastaValidator::new(options).unwrap().validate_file(&input).unwrap();
        (dir, report)
    }

    fn codes(report: &ValidationReport) -> Vec<u32> {
        report
            .diagnostics
            .errors
            .events()
            .iter()
            .chain(report.diagnostics.warnings.events())
            .map(|e| e.message_code)
            .collect()
    }

    #[test]
    fn test_strip_trailing_stop_codons() {
        let mut lines = vec!["MKLV".to_string(), "GG**".to_string()];
        assert!(strip_trailing_stop_codons(&mut lines));
        assert_eq!(lines, vec!["MKLV", "GG"]);

        let mut lines = vec!["MKLV*".to_string(), "**".to_string()];
        assert!(strip_trailing_stop_codons(&mut lines));
        assert_eq!(lines, vec!["MKLV"]);

        let mut lines = vec!["MKLV".to_string()];
        assert!(!strip_trailing_stop_codons(&mut lines));
    }

    #[test]
    fn test_wrap_residues() {
        assert_eq!(wrap_residues("ABCDEFG", 3), vec!["ABC", "DEF", "G"]);
    }

    #[test]
    fn test_blank_line_classification() {
        let (_dir, report) = run(">Prot1\n\nMKLV\n\nGGGG\n\n>Prot2\nMKLA\n", ValidatorOptions::default());
        let found = codes(&report);
        assert!(found.contains(&MessageCode::BlankLineBetweenProteinNameAndResidues.code()));
        assert!(found.contains(&MessageCode::BlankLineInMiddleOfResidues.code()));
        assert!(found.contains(&MessageCode::BlankLineBeforeProteinName.code()));

        let event = report
            .diagnostics
            .errors
            .events()
            .iter()
            .find(|e| e.message_code == MessageCode::BlankLineBetweenProteinNameAndResidues.code())
            .unwrap();
        assert_eq!(event.line_number, 2);
        assert_eq!(report.protein_count, 2);
    }

    #[test]
    fn test_missing_residues_mid_file_and_at_end() {
        let (_dir, report) = run(">P1\n>P2\nMKLV\n>P3\n", ValidatorOptions::default());
        let found = codes(&report);
        assert!(found.contains(&MessageCode::ProteinEntryMissingResidues.code()));
        assert!(found.contains(&MessageCode::FinalProteinEntryMissingResidues.code()));
        assert_eq!(report.protein_count, 3);
    }

    #[test]
    fn test_no_proteins() {
        let (_dir, report) = run("", ValidatorOptions::default());
        assert_eq!(codes(&report), vec![MessageCode::ProteinEntriesNotFound.code()]);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_header_with_leading_space() {
        let (_dir, report) = run("  >Prot1\nMKLV\n", ValidatorOptions::default());
        let found = codes(&report);
        assert_eq!(found, vec![MessageCode::LineStartsWithSpace.code()]);
        assert_eq!(report.protein_count, 1);
    }

    #[test]
    fn test_rewrap_and_stop_codon_removal() {
        let mut options = ValidatorOptions::repair();
        options.max_residues_per_line = 5;
        options.fix = FixedFastaOptions {
            residues_per_line_for_wrap: 4,
            ..FixedFastaOptions::default()
        };
        options.allow_asterisk_in_residues = true;
        let (dir, report) = run(">P1\nMKLVGGAA*\n", options);

        let fixed = std::fs::read_to_string(dir.path().join("input_new.fasta")).unwrap();
        assert_eq!(fixed, ">P1\nMKLV\nGGAA\n");
        assert_eq!(report.fix_stats.proteins_rewrapped, 1);
        assert_eq!(report.fix_stats.stop_codons_stripped, 1);
    }

    #[test]
    fn test_aborted_run() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.fasta");
        std::fs::write(&input, ">P1\nMKLV\n").unwrap();
        let validator = FastaValidator::new(ValidatorOptions::default()).unwrap();
        validator.abort_handle().abort();
        let report = validator.validate_file(&input).unwrap();
        assert_eq!(report.status, RunStatus::Aborted);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_long_lines_warned_or_skipped() {
        let very_long = "A".repeat(VERY_LONG_LINE_LENGTH + 1);
        let extremely_long = "A".repeat(EXTREMELY_LONG_LINE_LENGTH + 1);
        let unparsable = "A".repeat(1_500_001);
        let content = format!(
            ">P1\n{}\n>P2\n{}\n>P3\n{}\n>P4\nMKLV\n",
            very_long, extremely_long, unparsable
        );

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.fasta");
        std::fs::write(&input, content).unwrap();
        let options = ValidatorOptions {
            spanner_length: SpannerLength::Fixed(1),
            ..ValidatorOptions::default()
        };
        let report = FastaValidator::new(options)
            .unwrap()
            .with_max_line_length(1_500_000)
            .validate_file(&input)
            .unwrap();

        let diagnostics = &report.diagnostics;
        assert_eq!(diagnostics.total_for(MessageCode::LineIsVeryLong.code()), 1);
        assert_eq!(diagnostics.total_for(MessageCode::LineIsExtremelyLong.code()), 1);
        assert_eq!(diagnostics.total_for(MessageCode::LineTooLongToParse.code()), 1);

        let skipped = diagnostics
            .errors
            .events()
            .iter()
            .chain(diagnostics.warnings.events())
            .find(|e| e.message_code == MessageCode::LineTooLongToParse.code())
            .unwrap();
        assert_eq!((skipped.line_number, skipped.column), (6, 1));
        assert_eq!(skipped.protein_name, "P3");

        // P3's only residue line was skipped; P4 is still parsed afterwards
        assert_eq!(diagnostics.total_for(MessageCode::ProteinEntryMissingResidues.code()), 1);
        assert_eq!(report.protein_count, 4);
        assert_eq!(report.line_count, 8);
    }

    #[test]
    fn test_repeated_sequences_counted_and_reported_at_column_one() {
        let options = ValidatorOptions {
            spanner_length: SpannerLength::Fixed(1),
            ..ValidatorOptions::default()
        };
        let (_dir, report) = run(">P1\nMKLV\n>P2\nMKLV\n>P3\nGGGG\n>P2\nMKLV\n", options);

        assert_eq!(report.unique_sequence_count, 2);
        assert_eq!(report.repeated_sequence_count, 2);
        let event = report
            .diagnostics
            .warnings
            .events()
            .iter()
            .find(|e| e.message_code == MessageCode::DuplicateProteinSequence.code())
            .unwrap();
        assert_eq!(event.protein_name, "P1");
        assert_eq!(event.column, 1);
    }

    #[test]
    fn test_missing_input() {
        let validator = FastaValidator::new(ValidatorOptions::default()).unwrap();
        let result = validator.validate_file(Path::new("/nonexistent/input.fasta"));
        assert!(matches!(result, Err(ValidateError::InputNotFound(_))));
    }
}
