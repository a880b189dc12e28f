//! Error handling for the FastaVal CLI

use fastaval_core::io::PreloadError;
use fastaval_core::ValidateError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Input/Output error: {message}")]
    Io { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid rule: {message}")]
    Rule { message: String },

    #[error("External tool error: {tool} - {message}")]
    ExternalTool { tool: String, message: String },

    #[error("Existing hash file error: {message}")]
    HashFile { message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io { message: message.into() }
    }

    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::io(format!("JSON serialization error: {}", err))
    }
}

impl From<ValidateError> for CliError {
    fn from(err: ValidateError) -> Self {
        match err {
            ValidateError::InputNotFound(path) => Self::file_not_found(path),
            ValidateError::Options(e) => Self::config(e.to_string()),
            ValidateError::Rule(e) => Self::Rule { message: e.to_string() },
            ValidateError::Preload(PreloadError::SortFailed { tool, message }) => {
                Self::ExternalTool { tool, message }
            }
            ValidateError::Preload(e) => Self::HashFile { message: e.to_string() },
            other => Self::io(other.to_string()),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the file path is correct: {}\n\
                 • Ensure you have read permissions for the file\n\
                 • Compressed FASTA files must be decompressed first",
                path.display()
            ));
        }

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your fastaval.toml configuration file\n\
                 • Use 'fastaval config --example' to generate a sample configuration\n\
                 • Verify that all configuration values are valid",
            );
        }

        CliError::Rule { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Custom rule patterns use Rust regex syntax (no look-around)\n\
                 • Severity must be between 0 and 9; 0-4 is a warning, 5-9 an error",
            );
        }

        CliError::ExternalTool { tool, .. } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Ensure {} is in your PATH\n\
                 • Pass --in-memory-sort to sort the hash file without {}",
                tool, tool
            ));
        }

        CliError::HashFile { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • The file must be a tab-delimited _ProteinHashes.txt written by fastaval\n\
                 • Regenerate it with --basic-hash-info",
            );
        }

        _ => {}
    }

    message
}

/// Print error with helpful suggestions and exit
pub fn print_error_and_exit(error: &CliError) -> ! {
    eprintln!("Error: {}", format_error_with_suggestions(error));
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CliError::config("test message");
        assert!(matches!(err, CliError::Config { .. }));
        assert_eq!(err.to_string(), "Configuration error: test message");
    }

    #[test]
    fn test_error_suggestions() {
        let err = CliError::file_not_found(PathBuf::from("test.fasta"));
        let formatted = format_error_with_suggestions(&err);
        assert!(formatted.contains("Suggestions:"));
        assert!(formatted.contains("Check that the file path is correct"));
    }

    #[test]
    fn test_sort_failure_maps_to_external_tool() {
        let err: CliError = ValidateError::Preload(PreloadError::SortFailed {
            tool: "sort".to_string(),
            message: "exit status 2".to_string(),
        })
        .into();
        assert!(matches!(err, CliError::ExternalTool { .. }));
        assert!(format_error_with_suggestions(&err).contains("--in-memory-sort"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        assert!(matches!(cli_err, CliError::Io { .. }));
    }
}
