//! File I/O for the validator
//!
//! Line reading with terminator detection, line-ending normalization, the
//! tab-separated report files and the existing-hash preload.

pub mod line_endings;
pub mod lines;
pub mod preload;
pub mod reports;

pub use line_endings::normalize_line_endings;
pub use lines::{detect_line_terminator, LineReader, LineTerminator, RawLine};
pub use preload::{load_existing_hashes, ExistingHashPreload, HashFileSorter, InMemorySorter, PreloadError, SystemSortTool};
pub use reports::{append_stats_file, write_diagnostic_table, HashInfoWriter};
