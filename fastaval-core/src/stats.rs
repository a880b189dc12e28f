//! Bounded storage of diagnostic events with per-code counters

use crate::types::{DiagnosticEvent, MessageCode, Severity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeCount {
    pub message_code: u32,
    /// Occurrences stored with full detail
    pub detailed: usize,
    /// Occurrences beyond the per-code cap; counted only
    pub overflow: usize,
}

impl CodeCount {
    pub fn total(&self) -> usize {
        self.detailed + self.overflow
    }
}

/// Events for one sink (errors or warnings).
///
/// At most `max_detail_per_code` events are kept for each message code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorStats {
    max_detail_per_code: usize,
    events: Vec<DiagnosticEvent>,
    counts: Vec<CodeCount>,
}

impl ErrorStats {
    pub fn new(max_detail_per_code: usize) -> Self {
        Self {
            max_detail_per_code,
            events: Vec::new(),
            counts: Vec::new(),
        }
    }

    /// Returns true if the event was stored with detail.
    pub fn record(&mut self, event: DiagnosticEvent) -> bool {
        let slot = match self.counts.iter().position(|c| c.message_code == event.message_code) {
            Some(slot) => slot,
            None => {
                self.counts.push(CodeCount {
                    message_code: event.message_code,
                    detailed: 0,
                    overflow: 0,
                });
                self.counts.len() - 1
            }
        };

        let count = &mut self.counts[slot];
        if count.detailed < self.max_detail_per_code {
            count.detailed += 1;
            self.events.push(event);
            true
        } else {
            count.overflow += 1;
            false
        }
    }

    pub fn events(&self) -> &[DiagnosticEvent] {
        &self.events
    }

    /// Per-code counters in first-seen order
    pub fn counts(&self) -> &[CodeCount] {
        &self.counts
    }

    pub fn count_for(&self, message_code: u32) -> Option<&CodeCount> {
        self.counts.iter().find(|c| c.message_code == message_code)
    }

    pub fn total_for(&self, message_code: u32) -> usize {
        self.count_for(message_code).map(CodeCount::total).unwrap_or(0)
    }

    /// Detailed plus overflow occurrences across all codes
    pub fn total(&self) -> usize {
        self.counts.iter().map(CodeCount::total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn max_detail_per_code(&self) -> usize {
        self.max_detail_per_code
    }
}

/// The error and warning sinks for one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    pub errors: ErrorStats,
    pub warnings: ErrorStats,
}

impl Diagnostics {
    pub fn new(max_detail_per_code: usize) -> Self {
        Self {
            errors: ErrorStats::new(max_detail_per_code),
            warnings: ErrorStats::new(max_detail_per_code),
        }
    }

    pub fn record(&mut self, severity: Severity, event: DiagnosticEvent) -> bool {
        match severity {
            Severity::Error => self.errors.record(event),
            Severity::Warning => self.warnings.record(event),
        }
    }

    /// Records a built-in code with its inherent severity
    pub fn record_builtin(&mut self, code: MessageCode, event: DiagnosticEvent) -> bool {
        debug_assert_eq!(event.message_code, code.code());
        self.record(code.severity(), event)
    }

    pub fn error_count(&self) -> usize {
        self.errors.total()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.total()
    }

    pub fn sink(&self, severity: Severity) -> &ErrorStats {
        match severity {
            Severity::Error => &self.errors,
            Severity::Warning => &self.warnings,
        }
    }

    /// Total occurrences of a code across both sinks
    pub fn total_for(&self, message_code: u32) -> usize {
        self.errors.total_for(message_code) + self.warnings.total_for(message_code)
    }
}
