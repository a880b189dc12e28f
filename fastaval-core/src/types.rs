use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type LineNumber = u64;

/// First id handed out to user-supplied rules; lower ids are reserved for built-ins.
pub const FIRST_CUSTOM_RULE_ID: u32 = 1000;

/// Severity levels at or above this value are errors, anything lower is a warning.
pub const ERROR_SEVERITY_THRESHOLD: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn from_level(level: u8) -> Self {
        if level >= ERROR_SEVERITY_THRESHOLD {
            Severity::Error
        } else {
            Severity::Warning
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }
}

/// Built-in message codes. Codes below 100 are errors, 100-999 are warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum MessageCode {
    UnspecifiedError = 0,
    ProteinNameIsTooLong = 1,
    LineStartsWithSpace = 2,
    SentinelFollowedBySpace = 3,
    SentinelFollowedByTab = 4,
    SentinelButNoProteinName = 5,
    BlankLineBetweenProteinNameAndResidues = 6,
    BlankLineInMiddleOfResidues = 7,
    ResiduesFoundWithoutProteinHeader = 8,
    ProteinEntriesNotFound = 9,
    FinalProteinEntryMissingResidues = 10,
    FileDoesNotEndWithLinefeed = 11,
    DuplicateProteinName = 12,
    ProteinNameContainsInvalidCharacters = 13,
    ResiduesLineStartsWithSpace = 14,
    ResiduesLineContainsWhitespace = 15,
    ResiduesWithAsterisk = 16,
    ResiduesWithDash = 17,
    InvalidResidues = 18,
    DescriptionContainsEscapeCode = 19,
    ProteinEntryMissingResidues = 20,
    LineTooLongToParse = 21,

    ProteinNameIsTooShort = 100,
    ProteinNameContainsMultipleRefs = 101,
    ProteinNameContainsWarningCharacters = 102,
    BlankLineBeforeProteinName = 103,
    ProteinNameAndDescriptionSeparatedByTab = 104,
    DescriptionContainsTab = 105,
    DescriptionContainsQuotationMark = 106,
    DescriptionContainsEscapedSlash = 107,
    DescriptionTooLong = 108,
    ResiduesLineTooLong = 109,
    ResiduesContainSelenocysteine = 110,
    DuplicateProteinSequence = 111,
    RenamedProtein = 112,
    DuplicateProteinNameRetained = 113,
    ProteinRemovedSinceDuplicateSequence = 114,
    LineIsVeryLong = 115,
    LineIsExtremelyLong = 116,
}

impl MessageCode {
    pub const ALL: [MessageCode; 39] = [
        MessageCode::UnspecifiedError,
        MessageCode::ProteinNameIsTooLong,
        MessageCode::LineStartsWithSpace,
        MessageCode::SentinelFollowedBySpace,
        MessageCode::SentinelFollowedByTab,
        MessageCode::SentinelButNoProteinName,
        MessageCode::BlankLineBetweenProteinNameAndResidues,
        MessageCode::BlankLineInMiddleOfResidues,
        MessageCode::ResiduesFoundWithoutProteinHeader,
        MessageCode::ProteinEntriesNotFound,
        MessageCode::FinalProteinEntryMissingResidues,
        MessageCode::FileDoesNotEndWithLinefeed,
        MessageCode::DuplicateProteinName,
        MessageCode::ProteinNameContainsInvalidCharacters,
        MessageCode::ResiduesLineStartsWithSpace,
        MessageCode::ResiduesLineContainsWhitespace,
        MessageCode::ResiduesWithAsterisk,
        MessageCode::ResiduesWithDash,
        MessageCode::InvalidResidues,
        MessageCode::DescriptionContainsEscapeCode,
        MessageCode::ProteinEntryMissingResidues,
        MessageCode::LineTooLongToParse,
        MessageCode::ProteinNameIsTooShort,
        MessageCode::ProteinNameContainsMultipleRefs,
        MessageCode::ProteinNameContainsWarningCharacters,
        MessageCode::BlankLineBeforeProteinName,
        MessageCode::ProteinNameAndDescriptionSeparatedByTab,
        MessageCode::DescriptionContainsTab,
        MessageCode::DescriptionContainsQuotationMark,
        MessageCode::DescriptionContainsEscapedSlash,
        MessageCode::DescriptionTooLong,
        MessageCode::ResiduesLineTooLong,
        MessageCode::ResiduesContainSelenocysteine,
        MessageCode::DuplicateProteinSequence,
        MessageCode::RenamedProtein,
        MessageCode::DuplicateProteinNameRetained,
        MessageCode::ProteinRemovedSinceDuplicateSequence,
        MessageCode::LineIsVeryLong,
        MessageCode::LineIsExtremelyLong,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.code() == code)
    }

    /// Severity used when the parser reports this code directly.
    pub fn severity(self) -> Severity {
        if self.code() < 100 {
            Severity::Error
        } else {
            Severity::Warning
        }
    }

    pub fn description(self) -> &'static str {
        use MessageCode::*;
        match self {
            UnspecifiedError => "Unspecified error",
            ProteinNameIsTooLong => "Protein name is longer than the maximum allowed length",
            LineStartsWithSpace => "Line starts with a space or tab",
            SentinelFollowedBySpace => "Space found directly after the header sentinel",
            SentinelFollowedByTab => "Tab found directly after the header sentinel",
            SentinelButNoProteinName => "Line starts with the header sentinel but does not contain a protein name",
            BlankLineBetweenProteinNameAndResidues => "A blank line was found between the protein name and its residues",
            BlankLineInMiddleOfResidues => "A blank line was found in the middle of the residue block for the protein",
            ResiduesFoundWithoutProteinHeader => "Residues were found, but a protein header line was not present",
            ProteinEntriesNotFound => "File does not contain any protein entries",
            FinalProteinEntryMissingResidues => "The last entry in the file is a protein header line, but there is no protein sequence line after it",
            FileDoesNotEndWithLinefeed => "File does not end in a blank line; this is a problem for some tools",
            DuplicateProteinName => "Duplicate protein name found",
            ProteinNameContainsInvalidCharacters => "Protein name contains invalid characters",
            ResiduesLineStartsWithSpace => "A space or tab was found at the beginning of the protein residue line",
            ResiduesLineContainsWhitespace => "A space or tab was found in the residues",
            ResiduesWithAsterisk => "An asterisk was found in the residues",
            ResiduesWithDash => "A dash was found in the residues",
            InvalidResidues => "Invalid residues found",
            DescriptionContainsEscapeCode => "Protein description contains an escape code character",
            ProteinEntryMissingResidues => "Protein header line is not followed by any residues",
            LineTooLongToParse => "Line is too long to parse and was skipped",
            ProteinNameIsTooShort => "Protein name is shorter than the minimum suggested length",
            ProteinNameContainsMultipleRefs => "Protein name contains two or more reference separators",
            ProteinNameContainsWarningCharacters => "Protein name contains undesirable characters",
            BlankLineBeforeProteinName => "Blank line found before the protein header line",
            ProteinNameAndDescriptionSeparatedByTab => "Protein name is separated from the protein description by a tab",
            DescriptionContainsTab => "Protein description contains a tab character",
            DescriptionContainsQuotationMark => "Protein description contains a quotation mark",
            DescriptionContainsEscapedSlash => "Protein description contains an escaped slash",
            DescriptionTooLong => "Protein description is over 900 characters long",
            ResiduesLineTooLong => "Residues line is longer than the suggested maximum length",
            ResiduesContainSelenocysteine => "Residues line contains U (selenocysteine)",
            DuplicateProteinSequence => "Duplicate protein sequences found",
            RenamedProtein => "Renamed protein because the name is a duplicate",
            DuplicateProteinNameRetained => "Duplicate protein name retained because its sequence differs",
            ProteinRemovedSinceDuplicateSequence => "Protein removed because its sequence duplicates another protein",
            LineIsVeryLong => "Line is over 100,000 characters long",
            LineIsExtremelyLong => "Line is over 1,000,000 characters long",
        }
    }
}

/// One diagnostic finding, created by the rule engine or directly by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub line_number: LineNumber,
    /// 1-based column; 0 only for findings about the whole file
    pub column: usize,
    pub protein_name: String,
    pub message_code: u32,
    pub extra_info: String,
    pub context: String,
}

impl DiagnosticEvent {
    pub fn new(line_number: LineNumber, column: usize, protein_name: impl Into<String>, message_code: u32) -> Self {
        Self {
            line_number,
            column,
            protein_name: protein_name.into(),
            message_code,
            extra_info: String::new(),
            context: String::new(),
        }
    }

    pub fn with_extra_info(mut self, extra_info: impl Into<String>) -> Self {
        self.extra_info = extra_info.into();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn display_protein_name(&self) -> &str {
        if self.protein_name.is_empty() {
            "N/A"
        } else {
            &self.protein_name
        }
    }
}

/// Lookup from message code to display text, covering built-ins and custom rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageCatalog {
    messages: HashMap<u32, String>,
}

impl MessageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, code: u32, message: impl Into<String>) {
        self.messages.insert(code, message.into());
    }

    pub fn describe(&self, code: u32) -> String {
        if let Some(message) = self.messages.get(&code) {
            return message.clone();
        }
        match MessageCode::from_code(code) {
            Some(builtin) => builtin.description().to_string(),
            None => format!("Unknown message code {}", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_threshold() {
        assert_eq!(Severity::from_level(4), Severity::Warning);
        assert_eq!(Severity::from_level(5), Severity::Error);
        assert_eq!(Severity::from_level(9), Severity::Error);
    }

    #[test]
    fn test_message_code_lookup() {
        assert_eq!(MessageCode::from_code(12), Some(MessageCode::DuplicateProteinName));
        assert_eq!(MessageCode::DuplicateProteinName.severity(), Severity::Error);
        assert_eq!(MessageCode::DuplicateProteinSequence.severity(), Severity::Warning);
        assert!(MessageCode::from_code(999).is_none());
    }

    #[test]
    fn test_catalog_prefers_registered_text() {
        let mut catalog = MessageCatalog::new();
        catalog.register(1000, "Custom rule");
        assert_eq!(catalog.describe(1000), "Custom rule");
        assert_eq!(catalog.describe(9), MessageCode::ProteinEntriesNotFound.description());
        assert!(catalog.describe(4242).contains("4242"));
    }

    #[test]
    fn test_event_protein_placeholder() {
        let event = DiagnosticEvent::new(3, 1, "", MessageCode::InvalidResidues.code());
        assert_eq!(event.display_protein_name(), "N/A");
    }
}
