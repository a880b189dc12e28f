use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;
mod config;
mod error;
mod progress;

use config::Config;
use error::{print_error_and_exit, CliError};

#[derive(Parser)]
#[command(name = "fastaval")]
#[command(about = "FastaVal - protein FASTA validation and repair")]
#[command(version)]
#[command(long_about = "
FastaVal checks protein FASTA files against structural and content rules and can
write a repaired copy with normalized names, cleaned residues and duplicate
proteins removed or consolidated.

Examples:
  fastaval validate proteins.fasta
  fastaval validate proteins.fasta --fix --duplicate-names rename
  fastaval validate *.fasta --fix --consolidate --hash-info --stats-file stats.txt
  fastaval config --example > fastaval.toml
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate one or more protein FASTA files
    Validate(ValidateArgs),

    /// Show or write configuration
    Config {
        /// Print an example configuration with every default
        #[arg(long)]
        example: bool,

        /// Write the effective configuration to this file
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct ValidateArgs {
    /// Input FASTA files
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Write a repaired copy of each input (<stem>_new.fasta)
    #[arg(long)]
    pub fix: bool,

    /// Directory for the repaired file and reports (defaults to the input directory)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Append diagnostics for every input to this file (tab-delimited with --fix or hash output, else comma)
    #[arg(long)]
    pub stats_file: Option<PathBuf>,

    /// Write the per-protein hash table (<stem>_ProteinHashes.txt)
    #[arg(long)]
    pub basic_hash_info: bool,

    /// Write the hash table plus the unique-sequence and duplicate reports
    #[arg(long)]
    pub hash_info: bool,

    /// Leave proteins listed in a previous _ProteinHashes.txt out of the repaired file
    #[arg(long)]
    pub existing_hashes: Option<PathBuf>,

    /// Sort the existing hash file in memory instead of with the system sort tool
    #[arg(long)]
    pub in_memory_sort: bool,

    /// How repeated protein names are handled in the repaired file
    #[arg(long)]
    pub duplicate_names: Option<DuplicateNames>,

    /// Merge proteins with identical sequences into the first one seen
    #[arg(long)]
    pub consolidate: bool,

    /// Treat I and L as the same residue when comparing sequences
    #[arg(long)]
    pub ignore_il: bool,

    /// Remove invalid characters from residue lines
    #[arg(long)]
    pub remove_invalid_residues: bool,

    /// Split names holding several references into name and description
    #[arg(long)]
    pub split_multiple_refs: bool,

    /// Do not wrap long residue lines in the repaired file
    #[arg(long)]
    pub no_wrap: bool,

    /// Rewrite the input to CRLF line endings on a temporary file first
    #[arg(long)]
    pub normalize_line_endings: bool,

    /// Append a line terminator to inputs whose last line lacks one
    #[arg(long)]
    pub fix_final_linefeed: bool,

    /// Prefix length for the partitioned indexes (sampled from the input when omitted)
    #[arg(long)]
    pub spanner_length: Option<usize>,

    /// Detailed diagnostics kept per message code
    #[arg(long)]
    pub max_errors: Option<usize>,

    /// Accept '*' in residues
    #[arg(long)]
    pub allow_asterisk: bool,

    /// Accept '-' in residues
    #[arg(long)]
    pub allow_dash: bool,

    /// Print each report as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DuplicateNames {
    Skip,
    Rename,
    KeepUnlessMatching,
}

fn setup_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => print_error_and_exit(&CliError::config(format!("{:#}", e))),
    };

    let outcome = match cli.command {
        Commands::Validate(args) => commands::validate::execute(&config, &args, cli.quiet),
        Commands::Config { example, write } => commands::config::execute(&config, example, write),
    };

    if let Err(e) = outcome {
        print_error_and_exit(&e);
    }

    Ok(())
}
