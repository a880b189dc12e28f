//! Terminal progress bar for validation runs

use fastaval_core::{Phase, ProgressObserver};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

pub struct BarObserver {
    bar: ProgressBar,
}

impl BarObserver {
    pub fn new(visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new(100);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("━━─");
            bar.set_style(style);
            bar
        } else {
            ProgressBar::hidden()
        };
        Self { bar }
    }

    /// Reset between input files
    pub fn start_file(&self, path: &Path) {
        self.bar.reset();
        self.bar.set_message(format!("{}", path.display()));
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    pub fn handle(&self) -> BarHandle {
        BarHandle(self.bar.clone())
    }
}

/// Observer handed to the validator; shares the bar with its `BarObserver`.
pub struct BarHandle(ProgressBar);

impl ProgressObserver for BarHandle {
    fn on_phase(&self, phase: Phase) {
        self.0.set_message(phase.label());
        if phase == Phase::Validating {
            self.0.set_position(0);
        }
    }

    fn on_progress(&self, percent: f32) {
        self.0.set_position(percent.clamp(0.0, 100.0) as u64);
    }

    fn on_line_endings_normalized(&self, source: &Path, normalized: &Path) {
        self.0.suspend(|| {
            log::info!(
                "Normalized line endings of {} into {}",
                source.display(),
                normalized.display()
            )
        });
    }
}
