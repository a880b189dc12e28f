//! Spanner length auto-tuning
//!
//! Samples protein names from up to ten evenly spaced windows of the input,
//! sorts them and measures the common prefix of each name with its
//! predecessor. The number of names whose prefix differs within the first `k`
//! characters approximates the number of distinct `k`-character partitions,
//! which together with the estimated protein count gives the expected
//! partition size for each candidate spanner length.

use crate::names::split_header;
use crate::progress::AbortHandle;
use crate::spanner::DEFAULT_SPANNER_LENGTH;
use memmap2::Mmap;
use std::fs::File;
use std::io;
use std::path::Path;

pub const MAX_SPANNER_LENGTH: usize = 12;

/// Expected entries per partition that the tuner aims to stay under
pub const TARGET_PARTITION_SIZE: f64 = 1_000_000.0;

pub const SAMPLE_WINDOWS: usize = 10;
pub const SAMPLE_WINDOW_BYTES: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq)]
pub struct SpannerTuning {
    pub spanner_length: usize,
    pub names_sampled: usize,
    pub bytes_sampled: u64,
    pub estimated_proteins: f64,
    /// Count of sampled names by common-prefix length with the previous sorted name
    pub prefix_histogram: Vec<usize>,
    pub aborted: bool,
}

impl SpannerTuning {
    fn fallback() -> Self {
        Self {
            spanner_length: DEFAULT_SPANNER_LENGTH,
            names_sampled: 0,
            bytes_sampled: 0,
            estimated_proteins: 0.0,
            prefix_histogram: vec![0; MAX_SPANNER_LENGTH + 1],
            aborted: false,
        }
    }
}

pub fn tune_spanner_length(path: &Path, sentinel: char, abort: &AbortHandle) -> io::Result<SpannerTuning> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    if file_len == 0 {
        return Ok(SpannerTuning::fallback());
    }

    // The file is opened read-only and not modified while mapped
    let mmap = unsafe { Mmap::map(&file)? };
    let data: &[u8] = &mmap;

    let mut sentinel_buf = [0u8; 4];
    let sentinel_bytes = sentinel.encode_utf8(&mut sentinel_buf).as_bytes();

    let mut tuning = SpannerTuning::fallback();
    let mut names = Vec::new();

    for (start, end) in sample_windows(data.len()) {
        if abort.is_aborted() {
            log::warn!("Spanner tuning aborted after sampling {} names", names.len());
            tuning.aborted = true;
            break;
        }
        tuning.bytes_sampled += (end - start) as u64;
        collect_names(&data[start..end], start > 0, end < data.len(), sentinel_bytes, sentinel, &mut names);
    }

    tuning.names_sampled = names.len();
    if names.is_empty() || tuning.bytes_sampled == 0 {
        return Ok(tuning);
    }

    tuning.estimated_proteins = names.len() as f64 * file_len as f64 / tuning.bytes_sampled as f64;
    tuning.prefix_histogram = prefix_histogram(&mut names);
    tuning.spanner_length =
        choose_spanner_length(&tuning.prefix_histogram, tuning.estimated_proteins, TARGET_PARTITION_SIZE);

    log::info!(
        "Sampled {} protein names ({} bytes); estimated {:.0} proteins; spanner length {}",
        tuning.names_sampled,
        tuning.bytes_sampled,
        tuning.estimated_proteins,
        tuning.spanner_length
    );
    Ok(tuning)
}

/// Byte ranges to sample; the whole file when it is small.
fn sample_windows(file_len: usize) -> Vec<(usize, usize)> {
    if file_len <= SAMPLE_WINDOWS * SAMPLE_WINDOW_BYTES {
        return vec![(0, file_len)];
    }
    let stride = (file_len - SAMPLE_WINDOW_BYTES) / (SAMPLE_WINDOWS - 1);
    (0..SAMPLE_WINDOWS)
        .map(|i| {
            let start = i * stride;
            (start, (start + SAMPLE_WINDOW_BYTES).min(file_len))
        })
        .collect()
}

fn collect_names(
    window: &[u8],
    skip_first: bool,
    skip_last: bool,
    sentinel_bytes: &[u8],
    sentinel: char,
    names: &mut Vec<String>,
) {
    let mut lines: Vec<&[u8]> = window.split(|&b| b == b'\n' || b == b'\r').collect();
    if skip_last && !lines.is_empty() {
        lines.pop();
    }
    let skip = usize::from(skip_first && !lines.is_empty());

    for line in lines.into_iter().skip(skip) {
        if !line.starts_with(sentinel_bytes) {
            continue;
        }
        let header = String::from_utf8_lossy(line);
        let parsed = split_header(&header, sentinel);
        if !parsed.name.is_empty() {
            names.push(parsed.name.to_lowercase());
        }
    }
}

/// Sorts `names` and histograms each name's common-prefix length with its predecessor.
///
/// The last bucket collects every prefix of `MAX_SPANNER_LENGTH` characters or more.
pub fn prefix_histogram(names: &mut [String]) -> Vec<usize> {
    names.sort_unstable();
    let mut histogram = vec![0usize; MAX_SPANNER_LENGTH + 1];
    for pair in names.windows(2) {
        let shared = common_prefix_length(&pair[0], &pair[1]);
        histogram[shared.min(MAX_SPANNER_LENGTH)] += 1;
    }
    histogram
}

/// Smallest length whose estimated partition size stays under `target`.
pub fn choose_spanner_length(histogram: &[usize], estimated_total: f64, target: f64) -> usize {
    if estimated_total <= target {
        return DEFAULT_SPANNER_LENGTH;
    }

    let mut distinct_prefixes = 1usize;
    for k in 1..=MAX_SPANNER_LENGTH {
        // Names differing from their predecessor before character k start a new partition
        distinct_prefixes += histogram.get(k - 1).copied().unwrap_or(0);
        if estimated_total / distinct_prefixes as f64 <= target {
            return k;
        }
    }
    MAX_SPANNER_LENGTH
}

fn common_prefix_length(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}
