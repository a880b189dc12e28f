//! Validator configuration
//!
//! `ValidatorOptions` is an immutable value handed to the validator when it is
//! constructed. It derives serde so the CLI can load it from TOML.

use crate::rules::CustomRuleSets;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_SENTINEL: char = '>';
pub const DEFAULT_MIN_PROTEIN_NAME_LENGTH: usize = 3;
pub const DEFAULT_MAX_PROTEIN_NAME_LENGTH: usize = 60;
pub const DEFAULT_MAX_RESIDUES_PER_LINE: usize = 120;
pub const DEFAULT_RESIDUES_PER_LINE_FOR_WRAP: usize = 60;
pub const DEFAULT_MAX_ERRORS_PER_CODE: usize = 10;
pub const DEFAULT_CONTEXT_LENGTH: usize = 11;

pub const FIXED_FASTA_SUFFIX: &str = "_new.fasta";
pub const BASIC_HASH_INFO_SUFFIX: &str = "_ProteinHashes.txt";
pub const UNIQUE_SEQUENCES_SUFFIX: &str = "_UniqueProteinSeqs.txt";
pub const DUPLICATE_MAPPING_SUFFIX: &str = "_UniqueProteinSeqDuplicates.txt";

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("Maximum protein name length ({max}) is smaller than the minimum ({min})")]
    NameLengthRange { min: usize, max: usize },

    #[error("Invalid parameter {name}: {message}")]
    InvalidParameter { name: &'static str, message: String },
}

pub type OptionsResult<T> = Result<T, OptionsError>;

/// What to do with a protein whose name was already seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateNamePolicy {
    /// Report an error and leave the repeat out of the fixed file
    #[default]
    Skip,
    /// Rename the repeat to `name-b`, `name-c`, ...
    Rename,
    /// Keep the repeat unless its sequence matches an earlier entry of the same name
    KeepUnlessMatchingSequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpannerLength {
    /// Sample the input file to pick a prefix length
    #[default]
    Auto,
    Fixed(usize),
}

/// Normalizations applied when writing the fixed FASTA file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedFastaOptions {
    pub split_out_multiple_refs_in_protein_name: bool,
    pub split_out_multiple_refs_for_known_accession: bool,
    pub truncate_long_protein_names: bool,
    pub long_protein_name_split_chars: Vec<char>,
    pub protein_name_invalid_chars_to_remove: Vec<char>,
    pub protein_name_first_ref_sep_chars: Vec<char>,
    pub protein_name_subsequent_ref_sep_chars: Vec<char>,
    pub remove_invalid_residues: bool,
    pub wrap_long_residue_lines: bool,
    pub residues_per_line_for_wrap: usize,
    pub duplicate_name_policy: DuplicateNamePolicy,
    pub consolidate_duplicate_sequences: bool,
    pub consolidate_ignore_il_diff: bool,
}

impl Default for FixedFastaOptions {
    fn default() -> Self {
        Self {
            split_out_multiple_refs_in_protein_name: false,
            split_out_multiple_refs_for_known_accession: false,
            truncate_long_protein_names: true,
            long_protein_name_split_chars: vec!['|'],
            protein_name_invalid_chars_to_remove: Vec::new(),
            protein_name_first_ref_sep_chars: vec![':', '|'],
            protein_name_subsequent_ref_sep_chars: vec![':', '|', ';'],
            remove_invalid_residues: false,
            wrap_long_residue_lines: true,
            residues_per_line_for_wrap: DEFAULT_RESIDUES_PER_LINE_FOR_WRAP,
            duplicate_name_policy: DuplicateNamePolicy::Skip,
            consolidate_duplicate_sequences: false,
            consolidate_ignore_il_diff: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorOptions {
    pub sentinel: char,
    pub min_protein_name_length: usize,
    pub max_protein_name_length: usize,
    pub max_residues_per_line: usize,
    pub allow_asterisk_in_residues: bool,
    pub allow_dash_in_residues: bool,
    pub allow_all_symbols_in_protein_names: bool,
    pub warn_blank_lines_between_proteins: bool,
    pub check_duplicate_protein_names: bool,
    pub check_duplicate_protein_sequences: bool,
    /// Detailed events kept per message code; further occurrences are only counted
    pub max_errors_per_code: usize,
    pub context_length: usize,
    pub spanner_length: SpannerLength,
    pub normalize_line_endings: bool,
    /// Append a terminator to an input file whose last line lacks one
    pub fix_missing_final_linefeed: bool,
    pub generate_fixed_fasta: bool,
    pub save_basic_hash_info_file: bool,
    pub save_hash_info_files: bool,
    pub output_directory: Option<PathBuf>,
    pub stats_file: Option<PathBuf>,
    /// Previously generated `_ProteinHashes.txt` used to filter the fixed file
    pub existing_hash_file: Option<PathBuf>,
    pub fix: FixedFastaOptions,
    pub custom_rules: CustomRuleSets,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            sentinel: DEFAULT_SENTINEL,
            min_protein_name_length: DEFAULT_MIN_PROTEIN_NAME_LENGTH,
            max_protein_name_length: DEFAULT_MAX_PROTEIN_NAME_LENGTH,
            max_residues_per_line: DEFAULT_MAX_RESIDUES_PER_LINE,
            allow_asterisk_in_residues: false,
            allow_dash_in_residues: false,
            allow_all_symbols_in_protein_names: false,
            warn_blank_lines_between_proteins: true,
            check_duplicate_protein_names: true,
            check_duplicate_protein_sequences: true,
            max_errors_per_code: DEFAULT_MAX_ERRORS_PER_CODE,
            context_length: DEFAULT_CONTEXT_LENGTH,
            spanner_length: SpannerLength::Auto,
            normalize_line_endings: false,
            fix_missing_final_linefeed: false,
            generate_fixed_fasta: false,
            save_basic_hash_info_file: false,
            save_hash_info_files: false,
            output_directory: None,
            stats_file: None,
            existing_hash_file: None,
            fix: FixedFastaOptions::default(),
            custom_rules: CustomRuleSets::default(),
        }
    }
}

impl ValidatorOptions {
    /// Defaults with the fixed FASTA file enabled
    pub fn repair() -> Self {
        Self {
            generate_fixed_fasta: true,
            ..Self::default()
        }
    }

    pub fn with_fix(mut self, fix: FixedFastaOptions) -> Self {
        self.fix = fix;
        self
    }

    pub fn with_output_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_directory = Some(dir.into());
        self
    }

    pub fn validate(&self) -> OptionsResult<()> {
        if self.max_protein_name_length < self.min_protein_name_length {
            return Err(OptionsError::NameLengthRange {
                min: self.min_protein_name_length,
                max: self.max_protein_name_length,
            });
        }
        if self.fix.residues_per_line_for_wrap == 0 {
            return Err(OptionsError::InvalidParameter {
                name: "residues_per_line_for_wrap",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.context_length == 0 {
            return Err(OptionsError::InvalidParameter {
                name: "context_length",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.sentinel.is_whitespace() {
            return Err(OptionsError::InvalidParameter {
                name: "sentinel",
                message: "cannot be whitespace".to_string(),
            });
        }
        if let SpannerLength::Fixed(length) = self.spanner_length {
            if length > crate::tuner::MAX_SPANNER_LENGTH {
                return Err(OptionsError::InvalidParameter {
                    name: "spanner_length",
                    message: format!("must be at most {}", crate::tuner::MAX_SPANNER_LENGTH),
                });
            }
        }
        Ok(())
    }

    /// True when a second pass over the fixed file is required
    pub fn consolidation_requested(&self) -> bool {
        self.generate_fixed_fasta
            && (self.fix.consolidate_duplicate_sequences
                || self.fix.duplicate_name_policy == DuplicateNamePolicy::KeepUnlessMatchingSequence)
    }

    pub fn hashes_ignore_il(&self) -> bool {
        self.fix.consolidate_ignore_il_diff
    }

    pub fn needs_sequence_hashes(&self) -> bool {
        self.check_duplicate_protein_sequences
            || self.save_basic_hash_info_file
            || self.save_hash_info_files
            || self.consolidation_requested()
    }

    /// True when the run writes a repaired file or a hash report next to the input
    pub fn file_output_active(&self) -> bool {
        self.generate_fixed_fasta || self.save_basic_hash_info_file || self.save_hash_info_files
    }

    /// Output path `<dir>/<input stem><suffix>`
    pub fn output_path_for(&self, input: &Path, suffix: &str) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        let dir = match &self.output_directory {
            Some(dir) => dir.clone(),
            None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        dir.join(format!("{}{}", stem, suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = ValidatorOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.sentinel, '>');
        assert!(!options.consolidation_requested());
    }

    #[test]
    fn test_name_length_range_checked() {
        let options = ValidatorOptions {
            min_protein_name_length: 10,
            max_protein_name_length: 5,
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(OptionsError::NameLengthRange { .. })));
    }

    #[test]
    fn test_consolidation_needs_fixed_file() {
        let mut options = ValidatorOptions::default();
        options.fix.consolidate_duplicate_sequences = true;
        assert!(!options.consolidation_requested());
        options.generate_fixed_fasta = true;
        assert!(options.consolidation_requested());
        assert!(options.needs_sequence_hashes());
    }

    #[test]
    fn test_file_output_active() {
        let mut options = ValidatorOptions::default();
        assert!(!options.file_output_active());
        options.save_basic_hash_info_file = true;
        assert!(options.file_output_active());
        options.save_basic_hash_info_file = false;
        options.generate_fixed_fasta = true;
        assert!(options.file_output_active());
    }

    #[test]
    fn test_output_path_uses_stem() {
        let options = ValidatorOptions::default();
        let path = options.output_path_for(Path::new("/data/yeast.fasta"), FIXED_FASTA_SUFFIX);
        assert_eq!(path, PathBuf::from("/data/yeast_new.fasta"));

        let options = options.with_output_directory("/out");
        let path = options.output_path_for(Path::new("/data/yeast.fasta"), BASIC_HASH_INFO_SUFFIX);
        assert_eq!(path, PathBuf::from("/out/yeast_ProteinHashes.txt"));
    }
}
