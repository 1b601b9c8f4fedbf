//! Evenly spaced sampling of a crawl's paths listing.
//!
//! A listing is a gzip file with one archive path per line. With `n` paths and
//! a budget of `max_files`, every `n / max_files`-th path is taken, starting at
//! `offset`. Different offsets give disjoint samples of the same crawl.

use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use tracing::{debug, instrument};
use url::Url;

use ccjoin_shared::{CcJoinError, Result};

/// Paths chosen from one listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Non-empty lines in the listing.
    pub total: usize,
    /// Distance between selected lines.
    pub interval: usize,
    /// Selected paths, in listing order.
    pub paths: Vec<String>,
}

/// Spacing between selected lines. Never zero.
pub fn sample_interval(total: usize, max_files: usize) -> usize {
    (total / max_files.max(1)).max(1)
}

/// Pick at most `max_files` lines: line `i` is taken when `i % interval == offset`.
pub fn select(lines: Vec<String>, max_files: usize, offset: usize) -> Result<Sample> {
    if max_files == 0 {
        return Err(CcJoinError::validation("max_files must be at least 1"));
    }

    let total = lines.len();
    let interval = sample_interval(total, max_files);
    if total > 0 && offset >= interval {
        return Err(CcJoinError::validation(format!(
            "offset {offset} must be smaller than the sampling interval {interval} \
             ({total} paths / {max_files} files)"
        )));
    }

    let paths = lines
        .into_iter()
        .enumerate()
        .filter(|(i, _)| i % interval == offset)
        .map(|(_, line)| line)
        .take(max_files)
        .collect();

    Ok(Sample {
        total,
        interval,
        paths,
    })
}

/// Read a gzip paths listing and sample it.
#[instrument(skip_all, fields(listing = %listing.display(), max_files, offset))]
pub fn sample_listing(listing: &Path, max_files: usize, offset: usize) -> Result<Sample> {
    let lines = read_listing(listing)?;
    let sample = select(lines, max_files, offset)?;
    debug!(
        total = sample.total,
        interval = sample.interval,
        selected = sample.paths.len(),
        "sampled paths listing"
    );
    Ok(sample)
}

/// Non-empty, trimmed lines of a gzip paths listing.
pub fn read_listing(listing: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(listing).map_err(|e| CcJoinError::io(listing, e))?;
    let reader = BufReader::new(MultiGzDecoder::new(file));

    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| CcJoinError::io(listing, e))?;
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

/// Download URL for a listing entry.
pub fn archive_url(base: &Url, path: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|e| CcJoinError::validation(format!("bad archive path '{path}': {e}")))
}

/// Archive file name for a listing entry (its last path segment).
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
