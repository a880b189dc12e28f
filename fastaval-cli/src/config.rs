//! Configuration handling for the FastaVal CLI
//!
//! Supports loading configuration from fastaval.toml files with CLI argument overrides.

use anyhow::{Context, Result};
use fastaval_core::options::{
    DEFAULT_CONTEXT_LENGTH, DEFAULT_MAX_ERRORS_PER_CODE, DEFAULT_MAX_PROTEIN_NAME_LENGTH,
    DEFAULT_MAX_RESIDUES_PER_LINE, DEFAULT_MIN_PROTEIN_NAME_LENGTH, DEFAULT_SENTINEL,
};
use fastaval_core::{CustomRuleSets, FixedFastaOptions, SpannerLength, ValidatorOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "fastaval.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub validation: ValidationConfig,
    pub fix: FixedFastaOptions,
    pub outputs: OutputsConfig,
    pub rules: CustomRuleSets,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Character that starts every header line
    pub sentinel: char,

    pub min_protein_name_length: usize,
    pub max_protein_name_length: usize,
    pub max_residues_per_line: usize,

    /// Treat `*` in residues as valid; a trailing `*` is stripped from the fixed file
    pub allow_asterisk_in_residues: bool,
    pub allow_dash_in_residues: bool,
    pub allow_all_symbols_in_protein_names: bool,
    pub warn_blank_lines_between_proteins: bool,
    pub check_duplicate_protein_names: bool,
    pub check_duplicate_protein_sequences: bool,

    /// Detailed diagnostics kept per message code
    pub max_errors_per_code: usize,

    /// Characters of line context attached to each diagnostic
    pub context_length: usize,

    /// Prefix length for partitioned indexes; sampled from the input when unset
    pub spanner_length: Option<usize>,
}

impl Default for ValidationConfig {
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
            spanner_length: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputsConfig {
    /// Write `<stem>_new.fasta` with the repairs applied
    pub generate_fixed_fasta: bool,
    pub save_basic_hash_info_file: bool,
    pub save_hash_info_files: bool,
    pub normalize_line_endings: bool,
    pub fix_missing_final_linefeed: bool,
    pub output_directory: Option<PathBuf>,
    pub stats_file: Option<PathBuf>,
    pub existing_hash_file: Option<PathBuf>,
    /// Sort existing hash files in process instead of with the system `sort`
    pub in_memory_sort: bool,
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    log::info!("Loading configuration from: {}", DEFAULT_CONFIG_FILE);
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).context("Failed to serialize default configuration")
    }

    /// Flatten the file sections into the options value the validator takes
    pub fn to_validator_options(&self) -> ValidatorOptions {
        let v = &self.validation;
        let o = &self.outputs;
        ValidatorOptions {
            sentinel: v.sentinel,
            min_protein_name_length: v.min_protein_name_length,
            max_protein_name_length: v.max_protein_name_length,
            max_residues_per_line: v.max_residues_per_line,
            allow_asterisk_in_residues: v.allow_asterisk_in_residues,
            allow_dash_in_residues: v.allow_dash_in_residues,
            allow_all_symbols_in_protein_names: v.allow_all_symbols_in_protein_names,
            warn_blank_lines_between_proteins: v.warn_blank_lines_between_proteins,
            check_duplicate_protein_names: v.check_duplicate_protein_names,
            check_duplicate_protein_sequences: v.check_duplicate_protein_sequences,
            max_errors_per_code: v.max_errors_per_code,
            context_length: v.context_length,
            spanner_length: v.spanner_length.map_or(SpannerLength::Auto, SpannerLength::Fixed),
            normalize_line_endings: o.normalize_line_endings,
            fix_missing_final_linefeed: o.fix_missing_final_linefeed,
            generate_fixed_fasta: o.generate_fixed_fasta,
            save_basic_hash_info_file: o.save_basic_hash_info_file,
            save_hash_info_files: o.save_hash_info_files,
            output_directory: o.output_directory.clone(),
            stats_file: o.stats_file.clone(),
            existing_hash_file: o.existing_hash_file.clone(),
            fix: self.fix.clone(),
            custom_rules: self.rules.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fastaval_core::DuplicateNamePolicy;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.validation.sentinel, '>');
        assert_eq!(config.validation.max_protein_name_length, 60);
        assert!(!config.outputs.generate_fixed_fasta);
        assert_eq!(config.to_validator_options(), ValidatorOptions::default());
    }

    #[test]
    fn test_config_roundtrip() -> Result<()> {
        let mut config = Config::default();
        config.validation.spanner_length = Some(3);
        config.fix.duplicate_name_policy = DuplicateNamePolicy::Rename;
        let temp_file = NamedTempFile::new()?;

        config.save_to_file(temp_file.path())?;
        let loaded = Config::load_from_file(temp_file.path())?;

        assert_eq!(loaded.validation.spanner_length, Some(3));
        assert_eq!(loaded.fix.duplicate_name_policy, DuplicateNamePolicy::Rename);
        assert_eq!(loaded.to_validator_options().spanner_length, SpannerLength::Fixed(3));

        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let config: Config = toml::from_str(
            r#"
            [validation]
            max_residues_per_line = 80

            [fix]
            consolidate_duplicate_sequences = true

            [[rules.description]]
            pattern = "hypothetical"
            message = "Hypothetical protein"
            severity = 2
            "#,
        )?;
        assert_eq!(config.validation.max_residues_per_line, 80);
        assert_eq!(config.validation.min_protein_name_length, 3);
        assert!(config.fix.consolidate_duplicate_sequences);
        assert!(config.fix.wrap_long_residue_lines);
        assert_eq!(config.rules.description.len(), 1);
        assert!(config.rules.description[0].match_means_problem);
        Ok(())
    }

    #[test]
    fn test_example_toml_generation() -> Result<()> {
        let example = Config::example_toml()?;
        assert!(example.contains("[validation]"));
        assert!(example.contains("[fix]"));
        assert!(example.contains("[outputs]"));
        Ok(())
    }
}
