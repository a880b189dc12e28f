//! Duplicate protein name and duplicate sequence tracking

use crate::names::next_available_name;
use crate::options::DuplicateNamePolicy;
use crate::spanner::{SpanningKeyIndex, SpanningNameSet};
use serde::{Deserialize, Serialize};

/// Everything known about one distinct sequence digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProteinSequenceHashRecord {
    pub hash: String,
    pub sequence_length: usize,
    pub first_protein_name: String,
    pub additional_protein_names: Vec<String>,
    /// Repeats of the first name with this same sequence
    pub duplicate_name_count: usize,
}

impl ProteinSequenceHashRecord {
    fn new(hash: &str, sequence_length: usize, name: &str) -> Self {
        Self {
            hash: hash.to_string(),
            sequence_length,
            first_protein_name: name.to_string(),
            additional_protein_names: Vec::new(),
            duplicate_name_count: 0,
        }
    }

    /// Number of protein entries that carried this sequence
    pub fn protein_count(&self) -> usize {
        1 + self.additional_protein_names.len() + self.duplicate_name_count
    }

    pub fn has_duplicates(&self) -> bool {
        !self.additional_protein_names.is_empty()
    }

    pub fn is_first_name(&self, name: &str) -> bool {
        self.first_protein_name.eq_ignore_ascii_case(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceObservation {
    /// First time this digest was seen
    New(usize),
    /// Same digest under the record's first name
    RepeatedName(usize),
    /// Same digest under a different name
    AdditionalName(usize),
}

/// Digest-to-record map. Records are stored in a vector and referenced by index.
#[derive(Debug, Clone, Default)]
pub struct SequenceDuplicateTracker {
    index: SpanningKeyIndex<usize>,
    records: Vec<ProteinSequenceHashRecord>,
}

impl SequenceDuplicateTracker {
    pub fn new(spanner_length: usize) -> Self {
        Self {
            index: SpanningKeyIndex::new(spanner_length),
            records: Vec::new(),
        }
    }

    pub fn observe(&mut self, hash: &str, sequence_length: usize, protein_name: &str) -> SequenceObservation {
        if let Some(&slot) = self.index.get(hash) {
            let record = &mut self.records[slot];
            if record.is_first_name(protein_name) {
                record.duplicate_name_count += 1;
                return SequenceObservation::RepeatedName(slot);
            }
            if record
                .additional_protein_names
                .iter()
                .any(|n| n.eq_ignore_ascii_case(protein_name))
            {
                record.duplicate_name_count += 1;
                return SequenceObservation::RepeatedName(slot);
            }
            record.additional_protein_names.push(protein_name.to_string());
            return SequenceObservation::AdditionalName(slot);
        }

        self.records.push(ProteinSequenceHashRecord::new(hash, sequence_length, protein_name));
        let slot = self.records.len() - 1;
        self.index.insert(hash, slot);
        SequenceObservation::New(slot)
    }

    pub fn lookup(&self, hash: &str) -> Option<(usize, &ProteinSequenceHashRecord)> {
        let slot = *self.index.get(hash)?;
        self.records.get(slot).map(|r| (slot, r))
    }

    /// All records in first-seen order
    pub fn records(&self) -> &[ProteinSequenceHashRecord] {
        &self.records
    }

    pub fn duplicated_records(&self) -> impl Iterator<Item = (usize, &ProteinSequenceHashRecord)> {
        self.records.iter().enumerate().filter(|(_, r)| r.has_duplicates())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Outcome of checking a protein name against the names seen so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameCheck {
    Unique,
    Renamed(String),
    Retained,
    Skip,
}

#[derive(Debug, Clone, Default)]
pub struct ProteinNameTracker {
    names: SpanningNameSet,
}

impl ProteinNameTracker {
    pub fn new(spanner_length: usize) -> Self {
        Self {
            names: SpanningNameSet::new(spanner_length),
        }
    }

    /// Registers `name`, applying `policy` to repeats.
    ///
    /// Renaming only happens in repair mode; otherwise a repeat under the
    /// rename policy is treated as a skip.
    pub fn check(&mut self, name: &str, policy: DuplicateNamePolicy, repair_mode: bool) -> NameCheck {
        if self.names.insert(name) {
            return NameCheck::Unique;
        }

        match policy {
            DuplicateNamePolicy::Rename if repair_mode => {
                let renamed = next_available_name(name, |candidate| self.names.contains(candidate));
                self.names.insert(&renamed);
                NameCheck::Renamed(renamed)
            }
            DuplicateNamePolicy::KeepUnlessMatchingSequence => NameCheck::Retained,
            _ => NameCheck::Skip,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
