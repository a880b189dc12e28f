//! Pattern rules evaluated against header lines, names, descriptions and residues
//!
//! Rules live in four independent ordered lists. Every rule in a list is
//! checked for every input so that unrelated problems on the same text are all
//! reported.

use crate::options::ValidatorOptions;
use crate::types::{
    DiagnosticEvent, LineNumber, MessageCatalog, MessageCode, Severity, FIRST_CUSTOM_RULE_ID,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_RULE_SEVERITY: u8 = 9;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Invalid rule pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Rule severity {0} is out of range (0-9)")]
    SeverityOutOfRange(u8),
}

pub type RuleResult<T> = Result<T, RuleError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTarget {
    HeaderLine,
    ProteinName,
    ProteinDescription,
    ProteinSequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulePolarity {
    MatchMeansProblem,
    AbsenceMeansProblem,
}

#[derive(Debug, Clone)]
pub struct RuleDefinition {
    pattern: Regex,
    polarity: RulePolarity,
    message: String,
    severity: u8,
    display_matching_text: bool,
    id: u32,
}

impl RuleDefinition {
    pub fn new(
        pattern: &str,
        polarity: RulePolarity,
        message: impl Into<String>,
        severity: u8,
        display_matching_text: bool,
        id: u32,
    ) -> RuleResult<Self> {
        if severity > MAX_RULE_SEVERITY {
            return Err(RuleError::SeverityOutOfRange(severity));
        }
        let compiled = Regex::new(pattern).map_err(|source| RuleError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: compiled,
            polarity,
            message: message.into(),
            severity,
            display_matching_text,
            id,
        })
    }

    fn builtin(pattern: &str, code: MessageCode, severity: u8, display_matching_text: bool) -> RuleResult<Self> {
        Self::new(
            pattern,
            RulePolarity::MatchMeansProblem,
            code.description(),
            severity,
            display_matching_text,
            code.code(),
        )
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn polarity(&self) -> RulePolarity {
        self.polarity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        Severity::from_level(self.severity)
    }

    pub fn severity_level(&self) -> u8 {
        self.severity
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

fn default_true() -> bool {
    true
}

/// User-supplied rule as read from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRuleSpec {
    pub pattern: String,
    #[serde(default = "default_true")]
    pub match_means_problem: bool,
    pub message: String,
    pub severity: u8,
    #[serde(default)]
    pub display_matching_text: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomRuleSets {
    pub header: Vec<CustomRuleSpec>,
    pub name: Vec<CustomRuleSpec>,
    pub description: Vec<CustomRuleSpec>,
    pub sequence: Vec<CustomRuleSpec>,
}

impl CustomRuleSets {
    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.name.is_empty() && self.description.is_empty() && self.sequence.is_empty()
    }
}

/// A fired rule together with the sink it belongs in
#[derive(Debug, Clone, PartialEq)]
pub struct RuleViolation {
    pub severity: Severity,
    pub event: DiagnosticEvent,
}

#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    header: Vec<RuleDefinition>,
    name: Vec<RuleDefinition>,
    description: Vec<RuleDefinition>,
    sequence: Vec<RuleDefinition>,
    catalog: MessageCatalog,
}

impl RuleEngine {
    /// Engine with no rules at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in rules for `options`, followed by the configured custom rules
    pub fn new(options: &ValidatorOptions) -> RuleResult<Self> {
        let mut engine = Self::empty();
        engine.add_builtin_rules(options)?;

        let custom = &options.custom_rules;
        let mut next_id = FIRST_CUSTOM_RULE_ID;
        for (target, specs) in [
            (RuleTarget::HeaderLine, &custom.header),
            (RuleTarget::ProteinName, &custom.name),
            (RuleTarget::ProteinDescription, &custom.description),
            (RuleTarget::ProteinSequence, &custom.sequence),
        ] {
            for spec in specs {
                let polarity = if spec.match_means_problem {
                    RulePolarity::MatchMeansProblem
                } else {
                    RulePolarity::AbsenceMeansProblem
                };
                let rule = RuleDefinition::new(
                    &spec.pattern,
                    polarity,
                    spec.message.clone(),
                    spec.severity,
                    spec.display_matching_text,
                    next_id,
                )?;
                engine.add_rule(target, rule);
                next_id += 1;
            }
        }

        Ok(engine)
    }

    fn add_builtin_rules(&mut self, options: &ValidatorOptions) -> RuleResult<()> {
        let s = regex::escape(&options.sentinel.to_string());

        self.add_rule(RuleTarget::HeaderLine, RuleDefinition::builtin(&format!(r"^{}[ \t]*$", s), MessageCode::SentinelButNoProteinName, 7, false)?);
        self.add_rule(RuleTarget::HeaderLine, RuleDefinition::builtin(&format!(r"^{} +\S", s), MessageCode::SentinelFollowedBySpace, 7, false)?);
        self.add_rule(RuleTarget::HeaderLine, RuleDefinition::builtin(&format!(r"^{}\t+\S", s), MessageCode::SentinelFollowedByTab, 7, false)?);
        self.add_rule(RuleTarget::HeaderLine, RuleDefinition::builtin(&format!(r"^{}[^ \t]+\t", s), MessageCode::ProteinNameAndDescriptionSeparatedByTab, 3, false)?);

        if options.allow_all_symbols_in_protein_names {
            self.add_rule(RuleTarget::ProteinName, RuleDefinition::builtin(r"[\x00-\x1F\x7F]", MessageCode::ProteinNameContainsInvalidCharacters, 7, true)?);
        } else {
            self.add_rule(RuleTarget::ProteinName, RuleDefinition::builtin(r"[^A-Za-z0-9.\-_:,|/()\[\]=+#]", MessageCode::ProteinNameContainsInvalidCharacters, 7, true)?);
        }
        self.add_rule(RuleTarget::ProteinName, RuleDefinition::builtin(r"[:|][^:|;]*[:|;]", MessageCode::ProteinNameContainsMultipleRefs, 4, false)?);
        if !options.allow_all_symbols_in_protein_names {
            self.add_rule(RuleTarget::ProteinName, RuleDefinition::builtin(r"[/()\[\],=+#]", MessageCode::ProteinNameContainsWarningCharacters, 3, true)?);
        }

        self.add_rule(RuleTarget::ProteinDescription, RuleDefinition::builtin(r"\t", MessageCode::DescriptionContainsTab, 1, false)?);
        self.add_rule(RuleTarget::ProteinDescription, RuleDefinition::builtin(r#"""#, MessageCode::DescriptionContainsQuotationMark, 1, false)?);
        self.add_rule(RuleTarget::ProteinDescription, RuleDefinition::builtin(r"\\/", MessageCode::DescriptionContainsEscapedSlash, 3, false)?);
        self.add_rule(RuleTarget::ProteinDescription, RuleDefinition::builtin(r"[\x00-\x08\x0E-\x1F]", MessageCode::DescriptionContainsEscapeCode, 7, false)?);
        self.add_rule(RuleTarget::ProteinDescription, RuleDefinition::builtin(r"(?s)^.{900}", MessageCode::DescriptionTooLong, 4, false)?);

        self.add_rule(RuleTarget::ProteinSequence, RuleDefinition::builtin(r"^[ \t]", MessageCode::ResiduesLineStartsWithSpace, 7, false)?);
        self.add_rule(RuleTarget::ProteinSequence, RuleDefinition::builtin(r"\S[ \t]", MessageCode::ResiduesLineContainsWhitespace, 7, false)?);
        if !options.allow_asterisk_in_residues {
            self.add_rule(RuleTarget::ProteinSequence, RuleDefinition::builtin(r"\*", MessageCode::ResiduesWithAsterisk, 7, false)?);
        }
        if !options.allow_dash_in_residues {
            self.add_rule(RuleTarget::ProteinSequence, RuleDefinition::builtin(r"-", MessageCode::ResiduesWithDash, 7, false)?);
        }
        self.add_rule(RuleTarget::ProteinSequence, RuleDefinition::builtin(r"[^A-Za-z \t*\-]", MessageCode::InvalidResidues, 7, true)?);
        self.add_rule(RuleTarget::ProteinSequence, RuleDefinition::builtin(r"U", MessageCode::ResiduesContainSelenocysteine, 3, false)?);

        Ok(())
    }

    pub fn add_rule(&mut self, target: RuleTarget, rule: RuleDefinition) {
        self.catalog.register(rule.id, rule.message.clone());
        self.rules_mut(target).push(rule);
    }

    pub fn rules(&self, target: RuleTarget) -> &[RuleDefinition] {
        match target {
            RuleTarget::HeaderLine => &self.header,
            RuleTarget::ProteinName => &self.name,
            RuleTarget::ProteinDescription => &self.description,
            RuleTarget::ProteinSequence => &self.sequence,
        }
    }

    fn rules_mut(&mut self, target: RuleTarget) -> &mut Vec<RuleDefinition> {
        match target {
            RuleTarget::HeaderLine => &mut self.header,
            RuleTarget::ProteinName => &mut self.name,
            RuleTarget::ProteinDescription => &mut self.description,
            RuleTarget::ProteinSequence => &mut self.sequence,
        }
    }

    pub fn catalog(&self) -> &MessageCatalog {
        &self.catalog
    }

    /// Run every rule for `target` against `text`.
    ///
    /// `offset_in_line` is the 0-based byte offset of `text` inside `full_line`;
    /// reported columns are 1-based.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &self,
        target: RuleTarget,
        line_number: LineNumber,
        protein_name: &str,
        text: &str,
        offset_in_line: usize,
        full_line: &str,
        context_length: usize,
    ) -> Vec<RuleViolation> {
        let mut violations = Vec::new();

        for rule in self.rules(target) {
            let found = rule.pattern.find(text);
            let fires = match rule.polarity {
                RulePolarity::MatchMeansProblem => found.is_some(),
                RulePolarity::AbsenceMeansProblem => found.is_none(),
            };
            if !fires {
                continue;
            }

            let match_start = found.map(|m| m.start()).unwrap_or(0);
            let position = offset_in_line + match_start;
            let mut event = DiagnosticEvent::new(line_number, position + 1, protein_name, rule.id)
                .with_context(context_window(full_line, position, context_length));
            if rule.display_matching_text {
                if let Some(m) = found {
                    event = event.with_extra_info(m.as_str());
                }
            }

            violations.push(RuleViolation {
                severity: rule.severity(),
                event,
            });
        }

        violations
    }
}

/// Odd-length window of `line` centred on byte offset `center`, clamped to the line.
pub fn context_window(line: &str, center: usize, length: usize) -> &str {
    let length = if length % 2 == 0 { length + 1 } else { length };
    let half = length / 2;
    let start = floor_char_boundary(line, center.saturating_sub(half).min(line.len()));
    let end = ceil_char_boundary(line, (center.saturating_sub(half) + length).min(line.len()));
    &line[start..end.max(start)]
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index
}
