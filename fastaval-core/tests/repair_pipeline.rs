use fastaval_core::io::InMemorySorter;
use fastaval_core::{
    AbortHandle, CustomRuleSpec, DuplicateNamePolicy, FastaValidator, MessageCode, Phase, ProgressObserver, RunStatus,
    ValidationReport, ValidatorOptions,
};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

fn write_input(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("sample.fasta");
    std::fs::write(&path, content).expect("write input");
    path
}

fn validate(path: &Path, options: ValidatorOptions) -> ValidationReport {
    FastaValidator::new(options)
        .expect("valid options")
        .validate_file(path)
        .expect("validation runs")
}

fn fixed_content(dir: &TempDir) -> String {
    std::fs::read_to_string(dir.path().join("sample_new.fasta")).expect("fixed file")
}

#[test]
fn consolidation_merges_duplicate_sequences() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, ">ProtA first\nMKLVAAGG\n>ProtB\nMKLVAAGG\n>ProtC\nTTTTPPPP\n");

    let mut options = ValidatorOptions::repair();
    options.fix.consolidate_duplicate_sequences = true;
    let report = validate(&input, options);

    assert_eq!(
        fixed_content(&dir),
        ">ProtA first; Duplicate proteins: ProtB\nMKLVAAGG\n>ProtC\nTTTTPPPP\n"
    );
    let summary = report.consolidation.expect("consolidation ran");
    assert_eq!(summary.proteins_read, 3);
    assert_eq!(summary.proteins_written, 2);
    assert_eq!(summary.duplicate_sequences_removed, 1);
    assert!(report.output_failures.is_empty());
}

#[test]
fn consolidation_can_ignore_leucine_isoleucine() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, ">ProtA\nMKLVAAGG\n>ProtB\nMKIVAAGG\n");

    let mut options = ValidatorOptions::repair();
    options.fix.consolidate_duplicate_sequences = true;
    options.fix.consolidate_ignore_il_diff = true;
    validate(&input, options);

    assert_eq!(fixed_content(&dir), ">ProtA Duplicate proteins: ProtB\nMKLVAAGG\n");
}

#[test]
fn duplicate_names_are_renamed_in_repair_mode() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, ">ProtA\nMKLV\n>ProtA\nGGGG\n>ProtA\nTTTT\n");

    let mut options = ValidatorOptions::repair();
    options.fix.duplicate_name_policy = DuplicateNamePolicy::Rename;
    let report = validate(&input, options);

    assert_eq!(fixed_content(&dir), ">ProtA\nMKLV\n>ProtA-b\nGGGG\n>ProtA-c\nTTTT\n");
    assert_eq!(report.diagnostics.total_for(MessageCode::RenamedProtein.code()), 2);
    assert_eq!(report.diagnostics.total_for(MessageCode::DuplicateProteinName.code()), 0);
    assert_eq!(report.fix_stats.duplicate_names_renamed, 2);
}

#[test]
fn duplicate_names_are_skipped_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, ">ProtA\nMKLV\n>ProtA\nGGGG\n");

    let report = validate(&input, ValidatorOptions::repair());
    assert_eq!(fixed_content(&dir), ">ProtA\nMKLV\n");
    assert_eq!(report.diagnostics.total_for(MessageCode::DuplicateProteinName.code()), 1);
    assert_eq!(report.fix_stats.duplicate_names_skipped, 1);
}

#[test]
fn duplicate_names_stay_in_fixed_file_when_hashes_are_saved() {
    let dir = tempfile::tempdir().unwrap();
    let content = ">ProtA\nMKLV\n>ProtA\nGGGG\n";
    let input = write_input(&dir, content);

    let options = ValidatorOptions {
        save_basic_hash_info_file: true,
        ..ValidatorOptions::repair()
    };
    let report = validate(&input, options);

    assert_eq!(fixed_content(&dir), content);
    assert_eq!(report.diagnostics.total_for(MessageCode::DuplicateProteinName.code()), 1);
    assert_eq!(report.fix_stats.duplicate_names_skipped, 0);

    let hashes = std::fs::read_to_string(dir.path().join("sample_ProteinHashes.txt")).unwrap();
    assert_eq!(hashes.lines().count(), 3);
}

#[test]
fn keep_unless_matching_sequence_drops_exact_repeats() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, ">ProtA\nMKLV\n>ProtA\nGGGG\n>ProtA\nMKLV\n");

    let mut options = ValidatorOptions::repair();
    options.fix.duplicate_name_policy = DuplicateNamePolicy::KeepUnlessMatchingSequence;
    let report = validate(&input, options);

    assert_eq!(fixed_content(&dir), ">ProtA\nMKLV\n>ProtA\nGGGG\n");
    let summary = report.consolidation.expect("consolidation ran");
    assert_eq!(summary.duplicate_names_retained, 1);
    assert_eq!(summary.duplicate_names_removed, 1);
}

#[test]
fn long_names_are_truncated_into_the_description() {
    let dir = tempfile::tempdir().unwrap();
    let long_name = format!("Contig_12345:{}", "x".repeat(70));
    let input = write_input(&dir, &format!(">{} desc\nMKLV\n", long_name));

    let report = validate(&input, ValidatorOptions::repair());
    assert_eq!(report.diagnostics.total_for(MessageCode::ProteinNameIsTooLong.code()), 1);
    assert_eq!(report.fix_stats.names_truncated, 1);
    assert_eq!(fixed_content(&dir), format!(">Contig_12345 {} desc\nMKLV\n", "x".repeat(70)));
}

#[test]
fn invalid_residues_are_removed_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, ">ProtA\nMK1LV\nGG\n");

    let mut options = ValidatorOptions::repair();
    options.fix.remove_invalid_residues = true;
    let report = validate(&input, options);

    assert_eq!(fixed_content(&dir), ">ProtA\nMKLV\nGG\n");
    assert_eq!(report.fix_stats.residue_lines_cleaned, 1);
    let event = report
        .diagnostics
        .errors
        .events()
        .iter()
        .find(|e| e.message_code == MessageCode::InvalidResidues.code())
        .expect("invalid residue event");
    assert_eq!((event.line_number, event.column), (2, 3));
    assert_eq!(event.extra_info, "1");
}

#[test]
fn existing_hash_file_filters_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let hash_file = dir.path().join("previous_ProteinHashes.txt");
    std::fs::write(
        &hash_file,
        "Protein_ID\tProtein_Name\tSequence_Length\tSequence_Hash\n\
         1\tProtA\t4\tH1\n\
         2\tProtB\t4\tH1\n\
         3\tProtC\t4\tH2\n",
    )
    .unwrap();
    let input = write_input(&dir, ">ProtA\nMKLV\n>ProtB\nMKLV\n>ProtC\nGGGG\n");

    let options = ValidatorOptions {
        existing_hash_file: Some(hash_file),
        ..ValidatorOptions::repair()
    };
    let report = FastaValidator::new(options)
        .unwrap()
        .with_sorter(Box::new(InMemorySorter))
        .validate_file(&input)
        .unwrap();

    assert_eq!(fixed_content(&dir), ">ProtA\nMKLV\n>ProtC\nGGGG\n");
    assert_eq!(report.fix_stats.proteins_skipped_from_existing_hashes, 1);
}

#[derive(Default)]
struct RecordingObserver {
    phases: RefCell<Vec<Phase>>,
    normalized: RefCell<Vec<PathBuf>>,
}

struct SharedObserver(Rc<RecordingObserver>);

impl ProgressObserver for SharedObserver {
    fn on_phase(&self, phase: Phase) {
        self.0.phases.borrow_mut().push(phase);
    }

    fn on_line_endings_normalized(&self, _source: &Path, normalized: &Path) {
        self.0.normalized.borrow_mut().push(normalized.to_path_buf());
    }
}

#[test]
fn line_endings_are_normalized_through_a_temporary_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, ">ProtA\rMKLV\r>ProtB\nGGGG\r\n");

    let recorder = Rc::new(RecordingObserver::default());
    let options = ValidatorOptions {
        normalize_line_endings: true,
        ..ValidatorOptions::repair()
    };
    let report = FastaValidator::new(options)
        .unwrap()
        .with_observer(Box::new(SharedObserver(Rc::clone(&recorder))))
        .validate_file(&input)
        .unwrap();

    assert!(report.is_valid());
    assert!(report.line_endings_normalized);
    assert_eq!(fixed_content(&dir), ">ProtA\r\nMKLV\r\n>ProtB\r\nGGGG\r\n");

    let normalized = recorder.normalized.borrow();
    assert_eq!(normalized.len(), 1);
    assert!(!normalized[0].exists());
    assert_eq!(recorder.phases.borrow()[0], Phase::NormalizingLineEndings);
}

#[test]
fn nameless_proteins_survive_consolidation() {
    let dir = tempfile::tempdir().unwrap();
    let content = "> first desc\nMKLV\n> second desc\nGGGG\n";
    let input = write_input(&dir, content);

    let mut options = ValidatorOptions::repair();
    options.fix.consolidate_duplicate_sequences = true;
    let report = validate(&input, options);

    assert_eq!(fixed_content(&dir), content);
    let summary = report.consolidation.expect("consolidation ran");
    assert_eq!(summary.proteins_written, 2);
    assert_eq!(summary.duplicate_names_removed, 0);
}

struct AbortOnPhase {
    phase: Phase,
    abort: AbortHandle,
}

impl ProgressObserver for AbortOnPhase {
    fn on_phase(&self, phase: Phase) {
        if phase == self.phase {
            self.abort.abort();
        }
    }
}

#[test]
fn abort_during_consolidation_marks_run_aborted() {
    let dir = tempfile::tempdir().unwrap();
    let stats = dir.path().join("stats.txt");
    let content: String = (0..200).map(|i| format!(">Prot{}\nMKLV{}\n", i, "G".repeat(i % 7 + 1))).collect();
    let input = write_input(&dir, &content);

    let mut options = ValidatorOptions::repair();
    options.fix.consolidate_duplicate_sequences = true;
    options.stats_file = Some(stats.clone());
    let abort = AbortHandle::new();
    let report = FastaValidator::new(options)
        .unwrap()
        .with_abort_handle(abort.clone())
        .with_observer(Box::new(AbortOnPhase {
            phase: Phase::Consolidating,
            abort,
        }))
        .validate_file(&input)
        .unwrap();

    assert_eq!(report.status, RunStatus::Aborted);
    assert!(!report.is_valid());
    assert!(report.consolidation.is_none());
    assert!(report.output_failures.is_empty());
    assert!(!stats.exists());
    assert_eq!(fixed_content(&dir), content);
}

#[test]
fn stats_file_collects_every_run() {
    let dir = tempfile::tempdir().unwrap();
    let stats = dir.path().join("stats.txt");
    let input = write_input(&dir, ">ProtA\nMK LV\n");

    let options = ValidatorOptions {
        stats_file: Some(stats.clone()),
        ..ValidatorOptions::default()
    };
    let validator = FastaValidator::new(options).unwrap();
    validator.validate_file(&input).unwrap();
    validator.validate_file(&input).unwrap();

    let content = std::fs::read_to_string(&stats).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert!(lines[0].starts_with("Date,SourceFile,MessageType"));
    assert_eq!(lines.iter().filter(|l| l.starts_with("Date,")).count(), 1);
    assert!(lines.iter().any(|l| l.contains("A space or tab was found in the residues")));
    // One summary row and one event row per run
    assert_eq!(lines.len(), 5);
}

#[test]
fn stats_file_is_tab_delimited_alongside_file_output() {
    let dir = tempfile::tempdir().unwrap();
    let stats = dir.path().join("stats.txt");
    let input = write_input(&dir, ">ProtA\nMK LV\n");

    let options = ValidatorOptions {
        stats_file: Some(stats.clone()),
        ..ValidatorOptions::repair()
    };
    let report = validate(&input, options);
    assert_eq!(report.outputs.stats_file, Some(stats.clone()));

    let content = std::fs::read_to_string(&stats).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert!(lines[0].starts_with("Date\tSourceFile\tMessageType"));
    assert!(lines[1..].iter().all(|l| l.contains('\t')));
}

#[test]
fn custom_rules_get_ids_from_one_thousand() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, ">ProtA hypothetical protein\nMKXLV\n");

    let mut options = ValidatorOptions::default();
    options.custom_rules.description.push(CustomRuleSpec {
        pattern: "hypothetical".to_string(),
        match_means_problem: true,
        message: "Hypothetical protein".to_string(),
        severity: 2,
        display_matching_text: false,
    });
    options.custom_rules.sequence.push(CustomRuleSpec {
        pattern: "^M".to_string(),
        match_means_problem: false,
        message: "Sequence does not start with methionine".to_string(),
        severity: 6,
        display_matching_text: false,
    });
    options.custom_rules.sequence.push(CustomRuleSpec {
        pattern: "X".to_string(),
        match_means_problem: true,
        message: "Unknown residue".to_string(),
        severity: 5,
        display_matching_text: true,
    });
    let report = validate(&input, options);

    assert_eq!(report.diagnostics.warnings.total_for(1000), 1);
    assert_eq!(report.diagnostics.errors.total_for(1001), 0);
    assert_eq!(report.diagnostics.errors.total_for(1002), 1);
    assert_eq!(report.describe(1002), "Unknown residue");

    let event = report
        .diagnostics
        .errors
        .events()
        .iter()
        .find(|e| e.message_code == 1002)
        .unwrap();
    assert_eq!(event.column, 3);
    assert_eq!(event.extra_info, "X");
}

#[test]
fn report_serializes_to_json() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, ">ProtA\nMKLV\n");

    let report = validate(&input, ValidatorOptions::default());
    assert_eq!(report.status, RunStatus::Complete);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "Complete");
    assert_eq!(json["protein_count"], 1);
}
