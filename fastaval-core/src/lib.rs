//! FastaVal Core Library
//!
//! Streaming validation and repair of protein FASTA files: rule evaluation,
//! protein name normalization, duplicate name and sequence detection backed
//! by a partitioned key index, and duplicate-sequence consolidation.

pub mod consolidate;
pub mod duplicates;
pub mod hasher;
pub mod io;
pub mod names;
pub mod options;
pub mod progress;
pub mod rules;
pub mod spanner;
pub mod stats;
pub mod tuner;
pub mod types;
pub mod validator;

// Re-export commonly used types and functions
pub use consolidate::{ConsolidateError, ConsolidationSummary, DuplicateConsolidator};
pub use duplicates::{ProteinSequenceHashRecord, SequenceDuplicateTracker};
pub use hasher::compute_sequence_hash;
pub use names::{NameNormalizer, NormalizedName};
pub use options::{DuplicateNamePolicy, FixedFastaOptions, SpannerLength, ValidatorOptions};
pub use progress::{AbortHandle, Phase, ProgressObserver};
pub use rules::{CustomRuleSets, CustomRuleSpec, RuleEngine, RuleError};
pub use spanner::{SpanningKeyIndex, SpanningNameSet};
pub use stats::{Diagnostics, ErrorStats};
pub use types::{DiagnosticEvent, MessageCatalog, MessageCode, Severity};
pub use validator::{FastaValidator, RunStatus, ValidateError, ValidationReport};

/// Version information for the FastaVal core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
