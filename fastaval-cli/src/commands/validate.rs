//! Validate command implementation

use fastaval_core::io::{HashFileSorter, InMemorySorter, SystemSortTool};
use fastaval_core::{
    DuplicateNamePolicy, FastaValidator, RunStatus, Severity, SpannerLength, ValidationReport, ValidatorOptions,
};
use std::io::Write;

use crate::config::Config;
use crate::error::{CliError, CliResult};
use crate::progress::BarObserver;
use crate::{DuplicateNames, ValidateArgs};

pub fn execute(config: &Config, args: &ValidateArgs, quiet: bool) -> CliResult<()> {
    let options = build_options(config, args);
    let sorter = choose_sorter(config.outputs.in_memory_sort || args.in_memory_sort);

    let bar = BarObserver::new(!quiet && !args.json);
    let validator = FastaValidator::new(options)?
        .with_observer(Box::new(bar.handle()))
        .with_sorter(sorter);

    let stdout = std::io::stdout();
    let mut failed = Vec::new();

    for input in &args.inputs {
        log::info!("Validating {}", input.display());
        bar.start_file(input);

        let report = match validator.validate_file(input) {
            Ok(report) => report,
            Err(e) if args.inputs.len() == 1 => {
                bar.finish();
                return Err(e.into());
            }
            Err(e) => {
                log::error!("{}: {}", input.display(), e);
                failed.push(input.display().to_string());
                continue;
            }
        };
        bar.finish();

        let mut out = stdout.lock();
        if args.json {
            serde_json::to_writer_pretty(&mut out, &report)?;
            writeln!(out)?;
        } else if !quiet {
            print_report(&mut out, &report)?;
        }

        if report.status == RunStatus::Aborted || !report.is_valid() {
            failed.push(input.display().to_string());
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(CliError::validation(format!("{} of {} input(s): {}", failed.len(), args.inputs.len(), failed.join(", "))))
    }
}

/// Config file values with command-line flags applied on top
pub fn build_options(config: &Config, args: &ValidateArgs) -> ValidatorOptions {
    let mut options = config.to_validator_options();

    if args.fix {
        options.generate_fixed_fasta = true;
    }
    if let Some(dir) = &args.output_dir {
        options.output_directory = Some(dir.clone());
    }
    if let Some(stats) = &args.stats_file {
        options.stats_file = Some(stats.clone());
    }
    if args.basic_hash_info {
        options.save_basic_hash_info_file = true;
    }
    if args.hash_info {
        options.save_hash_info_files = true;
    }
    if let Some(existing) = &args.existing_hashes {
        options.existing_hash_file = Some(existing.clone());
    }
    if let Some(policy) = args.duplicate_names {
        options.fix.duplicate_name_policy = match policy {
            DuplicateNames::Skip => DuplicateNamePolicy::Skip,
            DuplicateNames::Rename => DuplicateNamePolicy::Rename,
            DuplicateNames::KeepUnlessMatching => DuplicateNamePolicy::KeepUnlessMatchingSequence,
        };
    }
    if args.consolidate {
        options.fix.consolidate_duplicate_sequences = true;
    }
    if args.ignore_il {
        options.fix.consolidate_ignore_il_diff = true;
    }
    if args.remove_invalid_residues {
        options.fix.remove_invalid_residues = true;
    }
    if args.split_multiple_refs {
        options.fix.split_out_multiple_refs_in_protein_name = true;
    }
    if args.no_wrap {
        options.fix.wrap_long_residue_lines = false;
    }
    if args.normalize_line_endings {
        options.normalize_line_endings = true;
    }
    if args.fix_final_linefeed {
        options.fix_missing_final_linefeed = true;
    }
    if let Some(length) = args.spanner_length {
        options.spanner_length = SpannerLength::Fixed(length);
    }
    if let Some(max) = args.max_errors {
        options.max_errors_per_code = max;
    }
    if args.allow_asterisk {
        options.allow_asterisk_in_residues = true;
    }
    if args.allow_dash {
        options.allow_dash_in_residues = true;
    }

    options
}

fn choose_sorter(in_memory: bool) -> Box<dyn HashFileSorter> {
    if in_memory {
        return Box::new(InMemorySorter);
    }
    let tool = SystemSortTool::new(None);
    if tool.is_available() {
        Box::new(tool)
    } else {
        log::debug!("No sort tool found in PATH; sorting hash files in memory");
        Box::new(InMemorySorter)
    }
}

fn print_report<W: Write>(out: &mut W, report: &ValidationReport) -> std::io::Result<()> {
    writeln!(out, "{}", report.source.display())?;
    writeln!(
        out,
        "  {} lines, {} proteins, {} residues, {} unique sequences ({} repeats)",
        report.line_count,
        report.protein_count,
        report.residue_count,
        report.unique_sequence_count,
        report.repeated_sequence_count
    )?;
    if report.status == RunStatus::Aborted {
        writeln!(out, "  run aborted; reports were not written")?;
    }

    for severity in [Severity::Error, Severity::Warning] {
        let sink = report.diagnostics.sink(severity);
        if sink.is_empty() {
            continue;
        }
        writeln!(out, "  {}s: {}", severity.label(), sink.total())?;
        for count in sink.counts() {
            writeln!(
                out,
                "    [{}] {} ({})",
                count.message_code,
                report.describe(count.message_code),
                count.total()
            )?;
            for event in sink.events().iter().filter(|e| e.message_code == count.message_code) {
                let mut line = format!(
                    "      line {}, col {}: {}",
                    event.line_number,
                    event.column,
                    event.display_protein_name()
                );
                if !event.extra_info.is_empty() {
                    line.push_str(&format!(" ({})", event.extra_info));
                }
                writeln!(out, "{}", line)?;
            }
            if count.overflow > 0 {
                writeln!(out, "      ... {} more", count.overflow)?;
            }
        }
    }

    if let Some(fixed) = &report.outputs.fixed_fasta {
        writeln!(out, "  repaired file: {}", fixed.display())?;
    }
    if let Some(summary) = &report.consolidation {
        writeln!(
            out,
            "  consolidated: {} of {} proteins written, {} duplicate sequences removed",
            summary.proteins_written, summary.proteins_read, summary.duplicate_sequences_removed
        )?;
    }
    for failure in &report.output_failures {
        writeln!(out, "  could not write {} ({}): {}", failure.output, failure.path.display(), failure.message)?;
    }
    Ok(())
}
