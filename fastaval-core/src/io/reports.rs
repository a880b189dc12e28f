//! Tab-separated side files and the diagnostics stats table

use crate::duplicates::ProteinSequenceHashRecord;
use crate::stats::Diagnostics;
use crate::types::{MessageCatalog, Severity};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const HASH_INFO_HEADER: [&str; 4] = ["Protein_ID", "Protein_Name", "Sequence_Length", "Sequence_Hash"];

pub const UNIQUE_SEQUENCES_HEADER: [&str; 6] = [
    "Sequence_Index",
    "Protein_Name_First",
    "Sequence_Length",
    "Sequence_Hash",
    "Protein_Count",
    "Duplicate_Proteins",
];

pub const DUPLICATE_MAPPING_HEADER: [&str; 4] =
    ["Sequence_Index", "Protein_Name_First", "Sequence_Length", "Duplicate_Protein"];

pub const STATS_HEADER: [&str; 8] = [
    "Date",
    "SourceFile",
    "MessageType",
    "LineNumber",
    "ColumnNumber",
    "Description_or_Protein",
    "Info",
    "Context",
];

/// One row per protein, written while streaming the input
pub struct HashInfoWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: u64,
}

impl HashInfoWriter {
    pub fn create(path: &Path) -> io::Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "{}", HASH_INFO_HEADER.join("\t"))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            rows: 0,
        })
    }

    pub fn write_row(&mut self, protein_id: u64, protein_name: &str, sequence_length: usize, hash: &str) -> io::Result<()> {
        writeln!(self.writer, "{}\t{}\t{}\t{}", protein_id, protein_name, sequence_length, hash)?;
        self.rows += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn finish(mut self) -> io::Result<u64> {
        self.writer.flush()?;
        Ok(self.rows)
    }
}

/// One row per distinct sequence digest
pub fn write_unique_sequences_report(path: &Path, records: &[ProteinSequenceHashRecord]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "{}", UNIQUE_SEQUENCES_HEADER.join("\t"))?;
    for (index, record) in records.iter().enumerate() {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            index + 1,
            record.first_protein_name,
            record.sequence_length,
            record.hash,
            record.protein_count(),
            record.additional_protein_names.join(", ")
        )?;
    }
    writer.flush()
}

/// One row per (first name, duplicate name) pair.
///
/// Returns false without creating the file when there are no duplicates.
pub fn write_duplicate_mapping_report(path: &Path, records: &[ProteinSequenceHashRecord]) -> io::Result<bool> {
    if !records.iter().any(ProteinSequenceHashRecord::has_duplicates) {
        return Ok(false);
    }

    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "{}", DUPLICATE_MAPPING_HEADER.join("\t"))?;
    for (index, record) in records.iter().enumerate() {
        for duplicate in &record.additional_protein_names {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                index + 1,
                record.first_protein_name,
                record.sequence_length,
                duplicate
            )?;
        }
    }
    writer.flush()?;
    Ok(true)
}

/// Writes per-code summary rows followed by the detailed events of each sink.
pub fn write_diagnostic_table<W: Write>(
    writer: &mut W,
    source_file: &str,
    diagnostics: &Diagnostics,
    catalog: &MessageCatalog,
    delimiter: char,
    timestamp: &str,
) -> io::Result<()> {
    for severity in [Severity::Error, Severity::Warning] {
        let sink = diagnostics.sink(severity);

        for count in sink.counts() {
            write_row(
                writer,
                delimiter,
                &[
                    timestamp,
                    source_file,
                    severity.label(),
                    "0",
                    "0",
                    &catalog.describe(count.message_code),
                    &count.total().to_string(),
                    "",
                ],
            )?;
        }

        for event in sink.events() {
            let mut info = catalog.describe(event.message_code);
            if !event.extra_info.is_empty() {
                info.push_str(": ");
                info.push_str(&event.extra_info);
            }
            write_row(
                writer,
                delimiter,
                &[
                    timestamp,
                    source_file,
                    severity.label(),
                    &event.line_number.to_string(),
                    &event.column.to_string(),
                    event.display_protein_name(),
                    &info,
                    &event.context,
                ],
            )?;
        }
    }
    Ok(())
}

/// Appends the diagnostics for one file to the stats file, adding a header to a new file.
///
/// Runs that write repaired files or hash reports use tabs; plain validation runs use commas.
pub fn append_stats_file(
    path: &Path,
    source_file: &str,
    diagnostics: &Diagnostics,
    catalog: &MessageCatalog,
    delimiter: char,
) -> io::Result<()> {
    let needs_header = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);

    if needs_header {
        writeln!(writer, "{}", STATS_HEADER.join(&delimiter.to_string()))?;
    }
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    write_diagnostic_table(&mut writer, source_file, diagnostics, catalog, delimiter, &timestamp)?;
    writer.flush()
}

fn write_row<W: Write>(writer: &mut W, delimiter: char, fields: &[&str]) -> io::Result<()> {
    let escaped: Vec<String> = fields.iter().map(|f| escape_field(f, delimiter)).collect();
    writeln!(writer, "{}", escaped.join(&delimiter.to_string()))
}

fn escape_field(value: &str, delimiter: char) -> String {
    if delimiter == '\t' {
        return value.replace(['\t', '\r', '\n'], " ");
    }
    if value.contains([delimiter, '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DiagnosticEvent, MessageCode};

    fn record(name: &str, dups: &[&str]) -> ProteinSequenceHashRecord {
        ProteinSequenceHashRecord {
            hash: format!("HASH_{}", name),
            sequence_length: 5,
            first_protein_name: name.to_string(),
            additional_protein_names: dups.iter().map(|d| d.to_string()).collect(),
            duplicate_name_count: 0,
        }
    }

    #[test]
    fn test_hash_info_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_ProteinHashes.txt");
        let mut writer = HashInfoWriter::create(&path).unwrap();
        writer.write_row(1, "P1", 5, "ABC").unwrap();
        writer.write_row(2, "P2", 7, "DEF").unwrap();
        assert_eq!(writer.finish().unwrap(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Protein_ID\tProtein_Name\tSequence_Length\tSequence_Hash");
        assert_eq!(lines[2], "2\tP2\t7\tDEF");
    }

    #[test]
    fn test_unique_and_duplicate_reports() {
        let dir = tempfile::tempdir().unwrap();
        let unique = dir.path().join("u.txt");
        let mapping = dir.path().join("d.txt");
        let records = vec![record("P1", &["P3", "P4"]), record("P2", &[])];

        write_unique_sequences_report(&unique, &records).unwrap();
        let content = std::fs::read_to_string(&unique).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "1\tP1\t5\tHASH_P1\t3\tP3, P4");
        assert_eq!(lines[2], "2\tP2\t5\tHASH_P2\t1\t");

        assert!(write_duplicate_mapping_report(&mapping, &records).unwrap());
        let content = std::fs::read_to_string(&mapping).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "1\tP1\t5\tP4");
    }

    #[test]
    fn test_no_duplicate_report_without_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = dir.path().join("d.txt");
        assert!(!write_duplicate_mapping_report(&mapping, &[record("P1", &[])]).unwrap());
        assert!(!mapping.exists());
    }

    #[test]
    fn test_diagnostic_table_csv_escaping() {
        let mut diagnostics = Diagnostics::new(5);
        diagnostics.record_builtin(
            MessageCode::InvalidResidues,
            DiagnosticEvent::new(4, 3, "P,1", MessageCode::InvalidResidues.code())
                .with_extra_info("#")
                .with_context("MK#LV"),
        );
        let mut out = Vec::new();
        write_diagnostic_table(&mut out, "in.fasta", &diagnostics, &MessageCatalog::new(), ',', "T").unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "T,in.fasta,Error,0,0,Invalid residues found,1,");
        assert_eq!(lines[1], "T,in.fasta,Error,4,3,\"P,1\",Invalid residues found: #,MK#LV");
    }

    #[test]
    fn test_stats_file_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.txt");
        let mut diagnostics = Diagnostics::new(5);
        diagnostics.record_builtin(
            MessageCode::ProteinEntriesNotFound,
            DiagnosticEvent::new(0, 0, "", MessageCode::ProteinEntriesNotFound.code()),
        );
        append_stats_file(&path, "a.fasta", &diagnostics, &MessageCatalog::new(), '\t').unwrap();
        append_stats_file(&path, "b.fasta", &diagnostics, &MessageCatalog::new(), '\t').unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().filter(|l| l.starts_with("Date\t")).count(), 1);
        assert_eq!(content.lines().count(), 5);
    }

    #[test]
    fn test_stats_file_comma_delimited() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        let mut diagnostics = Diagnostics::new(5);
        diagnostics.record_builtin(
            MessageCode::InvalidResidues,
            DiagnosticEvent::new(2, 3, "P,1", MessageCode::InvalidResidues.code()),
        );
        append_stats_file(&path, "a.fasta", &diagnostics, &MessageCatalog::new(), ',').unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Date,SourceFile,MessageType"));
        assert!(!lines[0].contains('\t'));
        assert!(lines[2].contains(",a.fasta,Error,2,3,\"P,1\","));
    }
}
