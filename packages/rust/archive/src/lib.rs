//! Streaming reader for web-crawl archive containers.
//!
//! A container is a sequence of self-delimited records (version line, header
//! block, `Content-Length` bytes of body), usually gzip-compressed one member
//! per record. This crate provides:
//! - [`ArchiveReader`]: forward-only, lazy record decoding over any `BufRead`
//! - [`ArchiveRecord`] / [`RecordHeaders`] / [`RecordKind`]: one decoded record
//! - [`http`]: payload extraction for `application/http` blocks
//! - [`ArchiveWriter`]: minimal record writer, used to build fixtures

pub mod http;
mod reader;
mod record;
mod writer;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use tracing::{debug, instrument};

use ccjoin_shared::{CcJoinError, Result};

pub use reader::ArchiveReader;
pub use record::{ArchiveRecord, Body, RecordHeaders, RecordKind};
pub use writer::ArchiveWriter;

/// Reader over a gzip-compressed archive file on disk.
pub type FileArchiveReader = ArchiveReader<BufReader<MultiGzDecoder<File>>>;

/// Open a compressed archive on disk.
///
/// Only the open itself can fail here; framing problems surface from
/// [`ArchiveReader::next_record`].
#[instrument(skip_all, fields(path = %path.display()))]
pub fn open(path: &Path) -> Result<FileArchiveReader> {
    let file = File::open(path).map_err(|e| CcJoinError::io(path, e))?;
    debug!("opened archive");
    Ok(from_gzip(file))
}

/// Wrap any compressed byte stream. Concatenated gzip members are read as one stream.
pub fn from_gzip<R: Read>(inner: R) -> ArchiveReader<BufReader<MultiGzDecoder<R>>> {
    ArchiveReader::new(BufReader::new(MultiGzDecoder::new(inner)))
}
