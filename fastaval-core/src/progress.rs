//! Progress reporting and cooperative cancellation

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lines processed between abort checks and progress callbacks
pub const ABORT_CHECK_INTERVAL: u64 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    NormalizingLineEndings,
    TuningSpanner,
    PreloadingHashes,
    Validating,
    WritingReports,
    Consolidating,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::NormalizingLineEndings => "Normalizing line endings",
            Phase::TuningSpanner => "Sampling protein names",
            Phase::PreloadingHashes => "Loading existing protein hashes",
            Phase::Validating => "Validating",
            Phase::WritingReports => "Writing reports",
            Phase::Consolidating => "Consolidating duplicate sequences",
        }
    }
}

/// Receives progress events from a running validation. All methods default to no-ops.
pub trait ProgressObserver {
    fn on_phase(&self, _phase: Phase) {}

    fn on_progress(&self, _percent: f32) {}

    fn on_line_endings_normalized(&self, _source: &Path, _normalized: &Path) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Shared cancellation flag; clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
