//! Sequence digests used for duplicate detection

use sha1::{Digest, Sha1};

/// Removes trailing stop-codon markers from a residue block.
pub fn strip_stop_codons(residues: &str) -> &str {
    residues.trim_end_matches('*')
}

/// Upper-case hex SHA-1 of a residue block.
///
/// Trailing `*` characters are ignored. With `ignore_il` set, leucine is
/// rewritten to isoleucine first so that mass-equivalent sequences collide.
pub fn compute_sequence_hash(residues: &str, ignore_il: bool) -> String {
    let residues = strip_stop_codons(residues);
    let mut hasher = Sha1::new();
    if ignore_il {
        let normalized: String = residues
            .chars()
            .map(|c| if c == 'L' { 'I' } else { c })
            .collect();
        hasher.update(normalized.as_bytes());
    } else {
        hasher.update(residues.as_bytes());
    }
    format!("{:X}", hasher.finalize())
}
