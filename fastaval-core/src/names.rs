//! Protein name parsing and normalization
//!
//! Splits a header line into name and description, and (in repair mode)
//! shortens overlong or multi-reference names by moving the excess text into
//! the description.

use crate::options::FixedFastaOptions;
use regex::Regex;

/// Names shortened by repeated splitting keep at least this many characters.
pub const MIN_TRUNCATED_NAME_LENGTH: usize = 6;

/// Replacing invalid characters is only committed if the result is this long.
pub const MIN_NAME_LENGTH_AFTER_CHAR_REMOVAL: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHeader {
    pub name: String,
    pub description: String,
    /// Byte offset of the description within the header line
    pub description_start: usize,
}

/// Splits `line` (which starts with `sentinel`) at the first space or tab.
///
/// A delimiter directly after the sentinel yields an empty name.
pub fn split_header(line: &str, sentinel: char) -> ParsedHeader {
    let body_start = if line.starts_with(sentinel) { sentinel.len_utf8() } else { 0 };
    let body = &line[body_start..];

    let (name, rest, rest_start) = match body.find([' ', '\t']) {
        Some(0) => ("", body, body_start),
        Some(split) => (&body[..split], &body[split + 1..], body_start + split + 1),
        None => (body, "", line.len()),
    };

    let leading = rest.len() - rest.trim_start().len();
    ParsedHeader {
        name: name.to_string(),
        description: rest.trim().to_string(),
        description_start: rest_start + leading,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NameChanges {
    pub known_accession_split: bool,
    pub truncated: bool,
    pub invalid_chars_replaced: bool,
    pub multi_ref_split: bool,
}

impl NameChanges {
    pub fn any(&self) -> bool {
        self.known_accession_split || self.truncated || self.invalid_chars_replaced || self.multi_ref_split
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedName {
    pub name: String,
    pub description: String,
    pub changes: NameChanges,
}

pub struct NameNormalizer {
    options: FixedFastaOptions,
    max_name_length: usize,
    known_accessions: Vec<Regex>,
    generic_accession: Regex,
}

impl NameNormalizer {
    pub fn new(options: FixedFastaOptions, max_name_length: usize) -> Self {
        // Patterns are constants; compilation cannot fail
        let known_accessions = [
            r"^(IPI:IPI[0-9.]+)\|(.+)$",
            r"^(gi\|[0-9]+)\|(.+)$",
            r"^(jgi\|[^|]+\|[^|]+)\|(.+)$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid accession pattern"))
        .collect();

        Self {
            options,
            max_name_length,
            known_accessions,
            generic_accession: Regex::new(r"^([A-Za-z0-9_]+)[|:;](.+)$").expect("valid generic pattern"),
        }
    }

    /// Applies the configured auto-fix pipeline to a name and its description.
    pub fn normalize(&self, name: &str, description: &str) -> NormalizedName {
        let mut name = name.to_string();
        let mut moved: Vec<String> = Vec::new();
        let mut changes = NameChanges::default();
        let too_long = name.chars().count() > self.max_name_length;

        if self.options.split_out_multiple_refs_for_known_accession
            || (self.options.truncate_long_protein_names && too_long)
        {
            if let Some((head, tail)) = self.split_known_accession(&name) {
                name = head;
                moved.push(tail);
                changes.known_accession_split = true;
            }
        }

        if !changes.known_accession_split
            && self.options.truncate_long_protein_names
            && name.chars().count() > self.max_name_length
        {
            if let Some((head, tail)) = self.truncate(&name) {
                name = head;
                moved.push(tail);
                changes.truncated = true;
            }
        }

        if !self.options.protein_name_invalid_chars_to_remove.is_empty() {
            if let Some(replaced) = self.replace_invalid_chars(&name) {
                name = replaced;
                changes.invalid_chars_replaced = true;
            }
        }

        if self.options.split_out_multiple_refs_in_protein_name && !changes.known_accession_split {
            if let Some((head, tail)) = self.split_multiple_refs(&name) {
                name = head;
                moved.insert(0, tail);
                changes.multi_ref_split = true;
            }
        }

        let mut parts: Vec<&str> = moved.iter().map(String::as_str).collect();
        parts.push(description);
        let description = parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        NormalizedName {
            name,
            description: trim_description_start(&description).to_string(),
            changes,
        }
    }

    fn split_known_accession(&self, name: &str) -> Option<(String, String)> {
        self.known_accessions.iter().find_map(|pattern| {
            pattern
                .captures(name)
                .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        })
    }

    fn truncate(&self, name: &str) -> Option<(String, String)> {
        if let Some(caps) = self.generic_accession.captures(name) {
            let head = &caps[1];
            if head.len() >= MIN_TRUNCATED_NAME_LENGTH && head.len() <= self.max_name_length {
                return Some((head.to_string(), caps[2].to_string()));
            }
        }

        let split_chars = &self.options.long_protein_name_split_chars;
        let mut head = name;
        while head.chars().count() > self.max_name_length {
            match head.rfind(|c| split_chars.contains(&c)) {
                Some(pos) if pos >= MIN_TRUNCATED_NAME_LENGTH => head = &head[..pos],
                _ => break,
            }
        }

        if head.len() == name.len() {
            None
        } else {
            let tail = name[head.len()..].trim_start_matches(|c| split_chars.contains(&c));
            Some((head.to_string(), tail.to_string()))
        }
    }

    fn replace_invalid_chars(&self, name: &str) -> Option<String> {
        let invalid = &self.options.protein_name_invalid_chars_to_remove;
        let trimmed = name.trim_matches(|c| invalid.contains(&c));
        let replaced: String = trimmed
            .chars()
            .map(|c| if invalid.contains(&c) { '_' } else { c })
            .collect();

        if replaced != name && replaced.chars().count() >= MIN_NAME_LENGTH_AFTER_CHAR_REMOVAL {
            Some(replaced)
        } else {
            None
        }
    }

    /// Splits at the second reference separator; `jgi|org|id` counts as one reference.
    fn split_multiple_refs(&self, name: &str) -> Option<(String, String)> {
        let first_seps = &self.options.protein_name_first_ref_sep_chars;
        let next_seps = &self.options.protein_name_subsequent_ref_sep_chars;

        let first = name.find(|c| first_seps.contains(&c))?;
        let mut search_from = first + 1;
        if name[..first].eq_ignore_ascii_case("jgi") {
            search_from += name[search_from..].find('|')? + 1;
        }

        let second = search_from + name[search_from..].find(|c| next_seps.contains(&c))?;
        let tail = &name[second + 1..];
        if tail.is_empty() {
            return None;
        }
        Some((name[..second].to_string(), tail.to_string()))
    }
}

/// Header line text for `name` and `description`, without terminator.
pub fn format_header(sentinel: char, name: &str, description: &str) -> String {
    if description.is_empty() {
        format!("{}{}", sentinel, name)
    } else {
        format!("{}{} {}", sentinel, name, description)
    }
}

/// Removes leading `|` and spaces from a description.
pub fn trim_description_start(description: &str) -> &str {
    description.trim_start_matches(['|', ' '])
}

/// Next unused name in the sequence `name-b` ... `name-z`, `name-a1` ... `name-z1`, `name-a2` ...
pub fn next_available_name<F: Fn(&str) -> bool>(base: &str, is_used: F) -> String {
    for letter in 'b'..='z' {
        let candidate = format!("{}-{}", base, letter);
        if !is_used(&candidate) {
            return candidate;
        }
    }
    let mut round = 1u64;
    loop {
        for letter in 'a'..='z' {
            let candidate = format!("{}-{}{}", base, letter, round);
            if !is_used(&candidate) {
                return candidate;
            }
        }
        round += 1;
    }
}

/// Base name if `name` follows the `base-b` / `base-a2` rename convention.
pub fn renamed_base(name: &str) -> Option<&str> {
    let (base, suffix) = name.rsplit_once('-')?;
    let mut chars = suffix.chars();
    let letter = chars.next()?;
    let digits = chars.as_str();
    if base.is_empty() || !letter.is_ascii_lowercase() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if digits.is_empty() && letter == 'a' {
        return None;
    }
    Some(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer(options: FixedFastaOptions) -> NameNormalizer {
        NameNormalizer::new(options, 20)
    }

    #[test]
    fn test_split_header_with_description() {
        let parsed = split_header(">Prot1 Some protein  ", '>');
        assert_eq!(parsed.name, "Prot1");
        assert_eq!(parsed.description, "Some protein");
        assert_eq!(parsed.description_start, 7);
    }

    #[test]
    fn test_split_header_tab_and_no_description() {
        let parsed = split_header(">Prot1\tdesc here", '>');
        assert_eq!(parsed.name, "Prot1");
        assert_eq!(parsed.description, "desc here");

        let parsed = split_header(">Prot1", '>');
        assert_eq!(parsed.name, "Prot1");
        assert_eq!(parsed.description, "");
    }

    #[test]
    fn test_split_header_delimiter_after_sentinel() {
        let parsed = split_header("> Prot1 desc", '>');
        assert_eq!(parsed.name, "");
        assert_eq!(parsed.description, "Prot1 desc");
        assert_eq!(parsed.description_start, 2);
    }

    #[test]
    fn test_known_accession_split() {
        let normalizer = normalizer(FixedFastaOptions {
            split_out_multiple_refs_for_known_accession: true,
            ..Default::default()
        });
        let result = normalizer.normalize("gi|12345|ref|NP_0001|", "Actin");
        assert_eq!(result.name, "gi|12345");
        assert_eq!(result.description, "ref|NP_0001| Actin");
        assert!(result.changes.known_accession_split);

        let result = normalizer.normalize("IPI:IPI00000001.2|SWISS-PROT:O95793", "");
        assert_eq!(result.name, "IPI:IPI00000001.2");
        assert_eq!(result.description, "SWISS-PROT:O95793");

        let result = normalizer.normalize("jgi|Org1|1234|gm1.1_g", "desc");
        assert_eq!(result.name, "jgi|Org1|1234");
        assert_eq!(result.description, "gm1.1_g desc");
    }

    #[test]
    fn test_truncation_by_split_char() {
        let normalizer = normalizer(FixedFastaOptions::default());
        let result = normalizer.normalize("ABCDEFGH.1234|XYZ|more-stuff-here", "desc");
        assert_eq!(result.name, "ABCDEFGH.1234|XYZ");
        assert_eq!(result.description, "more-stuff-here desc");
        assert!(result.changes.truncated);
    }

    #[test]
    fn test_truncation_generic_pattern() {
        let normalizer = normalizer(FixedFastaOptions::default());
        let result = normalizer.normalize("Contig_12345:some.long.remainder.text", "");
        assert_eq!(result.name, "Contig_12345");
        assert_eq!(result.description, "some.long.remainder.text");
    }

    #[test]
    fn test_truncation_keeps_minimum_prefix() {
        let normalizer = normalizer(FixedFastaOptions::default());
        let result = normalizer.normalize("AB|CDEFGHIJKLMNOPQRSTUVWXYZ", "");
        assert_eq!(result.name, "AB|CDEFGHIJKLMNOPQRSTUVWXYZ");
        assert!(!result.changes.truncated);
    }

    #[test]
    fn test_invalid_character_replacement() {
        let normalizer = normalizer(FixedFastaOptions {
            protein_name_invalid_chars_to_remove: vec!['\'', '"', ' '],
            ..Default::default()
        });
        let result = normalizer.normalize("'Prot'A'", "");
        assert_eq!(result.name, "Prot_A");
        assert!(result.changes.invalid_chars_replaced);

        // Too short after replacement, left alone
        let result = normalizer.normalize("'A'", "");
        assert_eq!(result.name, "'A'");
    }

    #[test]
    fn test_multi_reference_split() {
        let normalizer = normalizer(FixedFastaOptions {
            split_out_multiple_refs_in_protein_name: true,
            ..Default::default()
        });
        let result = normalizer.normalize("sp|P12345|ALBU", "Albumin");
        assert_eq!(result.name, "sp|P12345");
        assert_eq!(result.description, "ALBU Albumin");
        assert!(result.changes.multi_ref_split);

        let result = normalizer.normalize("jgi|Org|123|extra", "");
        assert_eq!(result.name, "jgi|Org|123");
        assert_eq!(result.description, "extra");

        let result = normalizer.normalize("jgi|Org|123", "");
        assert_eq!(result.name, "jgi|Org|123");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let normalizer = normalizer(FixedFastaOptions {
            split_out_multiple_refs_in_protein_name: true,
            split_out_multiple_refs_for_known_accession: true,
            protein_name_invalid_chars_to_remove: vec!['"'],
            ..Default::default()
        });
        for (name, desc) in [
            ("gi|12345|ref|NP_0001|", "Actin"),
            ("sp|P12345|ALBU_HUMAN", ""),
            ("ABCDEFGH.1234|XYZ|more-stuff-here", "x"),
            ("Plain_Name", "desc"),
        ] {
            let first = normalizer.normalize(name, desc);
            let second = normalizer.normalize(&first.name, "");
            assert_eq!(second.name, first.name, "input {}", name);
            assert_eq!(second.description, "");
            assert!(!second.changes.any());
        }
    }

    #[test]
    fn test_description_leading_bars_trimmed() {
        assert_eq!(trim_description_start("|| desc"), "desc");
    }

    #[test]
    fn test_next_available_name_sequence() {
        let used = ["P1", "P1-b", "P1-c"];
        assert_eq!(next_available_name("P1", |n| used.contains(&n)), "P1-d");

        let mut all: Vec<String> = ('b'..='z').map(|c| format!("X-{}", c)).collect();
        all.push("X-a1".to_string());
        assert_eq!(next_available_name("X", |n| all.iter().any(|u| u == n)), "X-b1");
    }

    #[test]
    fn test_renamed_base() {
        assert_eq!(renamed_base("Prot1-b"), Some("Prot1"));
        assert_eq!(renamed_base("Prot1-a2"), Some("Prot1"));
        assert_eq!(renamed_base("Prot1-a"), None);
        assert_eq!(renamed_base("Prot-12"), None);
        assert_eq!(renamed_base("Prot1"), None);
    }
}
