//! English page extraction from raw-capture and derived-text archives.
//!
//! This crate provides:
//! - [`RawContentExtractor`]: request/response/metadata cycles → decoded HTML
//! - [`DerivedTextExtractor`]: conversion records → extracted plain text
//! - [`extract_file`] / [`extract_stream`]: drive an extractor over one archive
//!
//! Per-record problems never fail a file: they become a [`SkipReason`] and are
//! counted in [`ExtractStats`]. Stream corruption stops the file; it fails the
//! file only when not a single record could be decoded.

pub mod charset;
mod derived;
pub mod metadata;
mod raw;

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use ccjoin_archive::{ArchiveReader, ArchiveRecord};
use ccjoin_shared::{ArchiveKind, CcJoinError, ExtractedRecord, Result};

pub use derived::DerivedTextExtractor;
pub use metadata::PageMetadata;
pub use raw::RawContentExtractor;

// ---------------------------------------------------------------------------
// Outcomes and statistics
// ---------------------------------------------------------------------------

/// Why a record did not produce an [`ExtractedRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Language metadata missing or not in the expected shape.
    UnparsableLanguageTag,
    /// Language identified, but not English.
    NotEnglish,
    /// Metadata arrived with no response waiting for it.
    NoPendingResponse,
    /// Declared charset unknown, absent, or unable to decode the bytes.
    DecodeFailure,
    /// Decoded content was empty.
    EmptyContent,
    /// Target URI or correlation header absent.
    MissingHeader,
    /// HTTP envelope of a response could not be parsed.
    MalformedPayload,
}

/// What an extractor did with one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A page to emit.
    Emit(ExtractedRecord),
    /// A page that was dropped.
    Skip(SkipReason),
    /// The record carries no page on its own (request, stored response, warcinfo, ...).
    Absorbed,
}

/// Counters for one archive pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractStats {
    pub records_read: usize,
    pub emitted: usize,
    pub unparsable_language: usize,
    pub not_english: usize,
    pub no_pending_response: usize,
    pub decode_failures: usize,
    pub empty_content: usize,
    pub missing_headers: usize,
    pub malformed_payloads: usize,
    /// Responses replaced by a later response before their metadata arrived.
    pub overwritten_responses: usize,
    /// Stream corruption cut the pass short.
    pub truncated: bool,
}

impl ExtractStats {
    pub fn record_skip(&mut self, reason: SkipReason) {
        let counter = match reason {
            SkipReason::UnparsableLanguageTag => &mut self.unparsable_language,
            SkipReason::NotEnglish => &mut self.not_english,
            SkipReason::NoPendingResponse => &mut self.no_pending_response,
            SkipReason::DecodeFailure => &mut self.decode_failures,
            SkipReason::EmptyContent => &mut self.empty_content,
            SkipReason::MissingHeader => &mut self.missing_headers,
            SkipReason::MalformedPayload => &mut self.malformed_payloads,
        };
        *counter += 1;
    }

    /// Total pages dropped for any reason.
    pub fn skipped(&self) -> usize {
        self.unparsable_language
            + self.not_english
            + self.no_pending_response
            + self.decode_failures
            + self.empty_content
            + self.missing_headers
            + self.malformed_payloads
    }
}

/// Result of one archive pass.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub kind: ArchiveKind,
    /// Pages in stream order.
    pub records: Vec<ExtractedRecord>,
    pub stats: ExtractStats,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A per-archive-kind record filter.
///
/// One instance handles exactly one stream; state never crosses files.
pub trait Extractor {
    /// Archive kind this extractor understands.
    const KIND: ArchiveKind;

    /// Consume one record.
    ///
    /// Only stream corruption is returned as an error; every per-record
    /// problem is reported as [`Outcome::Skip`].
    fn observe<R: BufRead>(&mut self, record: ArchiveRecord<'_, R>) -> Result<Outcome>;

    /// Extractor-specific counters, merged into the pass statistics.
    fn stats_mut(&mut self) -> &mut ExtractStats;

    fn into_stats(self) -> ExtractStats;
}

// ---------------------------------------------------------------------------
// Drivers
// ---------------------------------------------------------------------------

/// Stops an extraction between records when raised from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Run `extractor` over every record of `reader`.
pub fn extract_all<E: Extractor, R: BufRead>(
    extractor: E,
    reader: &mut ArchiveReader<R>,
) -> Result<Extraction> {
    extract_until(extractor, reader, &CancelFlag::new())
}

/// Like [`extract_all`], but gives up with [`CcJoinError::Cancelled`] once
/// `cancel` is raised. Partial records are dropped.
pub fn extract_until<E: Extractor, R: BufRead>(
    mut extractor: E,
    reader: &mut ArchiveReader<R>,
    cancel: &CancelFlag,
) -> Result<Extraction> {
    let mut records = Vec::new();

    loop {
        if cancel.is_cancelled() {
            return Err(CcJoinError::Cancelled {
                records_read: reader.records_read(),
            });
        }
        let record = match reader.next_record() {
            Ok(Some(record)) => record,
            Ok(None) => break,
            Err(e) => {
                stop_on_corruption(e, extractor.stats_mut())?;
                break;
            }
        };
        let index = record.index();
        extractor.stats_mut().records_read += 1;

        match extractor.observe(record) {
            Ok(Outcome::Emit(page)) => {
                extractor.stats_mut().emitted += 1;
                records.push(page);
            }
            Ok(Outcome::Skip(reason)) => {
                debug!(index, ?reason, "record skipped");
                extractor.stats_mut().record_skip(reason);
            }
            Ok(Outcome::Absorbed) => {}
            Err(e) => {
                stop_on_corruption(e, extractor.stats_mut())?;
                break;
            }
        }
    }

    Ok(Extraction {
        kind: E::KIND,
        records,
        stats: extractor.into_stats(),
    })
}

/// Corruption before the first record fails the file; later corruption keeps
/// what was extracted and marks the pass truncated.
fn stop_on_corruption(err: CcJoinError, stats: &mut ExtractStats) -> Result<()> {
    if err.is_corrupt_at_start() {
        return Err(err);
    }
    match err {
        CcJoinError::CorruptArchive {
            record_index,
            message,
        } => {
            warn!(record_index, %message, "archive corrupt, keeping records read so far");
            stats.truncated = true;
            Ok(())
        }
        other => Err(other),
    }
}

/// Extract English pages of `kind` from an already-open stream.
pub fn extract_stream<R: BufRead>(
    kind: ArchiveKind,
    reader: &mut ArchiveReader<R>,
) -> Result<Extraction> {
    extract_stream_until(kind, reader, &CancelFlag::new())
}

fn extract_stream_until<R: BufRead>(
    kind: ArchiveKind,
    reader: &mut ArchiveReader<R>,
    cancel: &CancelFlag,
) -> Result<Extraction> {
    match kind {
        ArchiveKind::Warc => extract_until(RawContentExtractor::new(), reader, cancel),
        ArchiveKind::Wet => extract_until(DerivedTextExtractor::new(), reader, cancel),
    }
}

/// Extract English pages of `kind` from a compressed archive on disk.
pub fn extract_file(kind: ArchiveKind, path: &Path) -> Result<Extraction> {
    extract_file_until(kind, path, &CancelFlag::new())
}

/// [`extract_file`] that can be stopped from another thread.
#[instrument(skip_all, fields(kind = %kind, path = %path.display()))]
pub fn extract_file_until(kind: ArchiveKind, path: &Path, cancel: &CancelFlag) -> Result<Extraction> {
    let mut reader = ccjoin_archive::open(path)?;
    let extraction = extract_stream_until(kind, &mut reader, cancel)?;

    info!(
        records = extraction.stats.records_read,
        emitted = extraction.stats.emitted,
        skipped = extraction.stats.skipped(),
        truncated = extraction.stats.truncated,
        "extraction complete"
    );

    Ok(extraction)
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Cursor;

    use ccjoin_archive::{ArchiveReader, ArchiveWriter};

    /// A `metadata` block as the crawler writes it.
    pub fn metadata_block(code: &str, charset: &str) -> String {
        format!(
            "fetchTimeMs: 120\r\ncharset-detected: {charset}\r\nlanguages-cld2: \
             {{\"reliable\":true,\"text-bytes\":1200,\"languages\":[{{\"code\":\"{code}\",\
             \"text-covered\":0.99,\"score\":1024.0}}]}}\r\n"
        )
    }

    /// Builder for uncompressed test archives.
    pub struct Archive {
        writer: ArchiveWriter<Vec<u8>>,
    }

    impl Archive {
        pub fn new() -> Self {
            Self {
                writer: ArchiveWriter::uncompressed(Vec::new()),
            }
        }

        pub fn record(mut self, headers: &[(&str, &str)], block: &[u8]) -> Self {
            self.writer.write_record(headers, block).expect("write record");
            self
        }

        /// Full request/response/metadata cycle for one page.
        pub fn capture(self, url: &str, id: &str, html: &[u8], metadata: &str) -> Self {
            let mut response = b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n".to_vec();
            response.extend_from_slice(html);
            self.record(
                &[
                    ("WARC-Type", "request"),
                    ("WARC-Target-URI", url),
                    ("Content-Type", "application/http; msgtype=request"),
                ],
                b"GET / HTTP/1.1\r\n\r\n",
            )
            .record(
                &[
                    ("WARC-Type", "response"),
                    ("WARC-Target-URI", url),
                    ("WARC-Record-ID", id),
                    ("Content-Type", "application/http; msgtype=response"),
                ],
                &response,
            )
            .record(
                &[
                    ("WARC-Type", "metadata"),
                    ("WARC-Target-URI", url),
                    ("WARC-Concurrent-To", id),
                    ("Content-Type", "application/warc-fields"),
                ],
                metadata.as_bytes(),
            )
        }

        /// One derived-text conversion record.
        pub fn conversion(self, url: &str, refers_to: &str, language: &str, text: &[u8]) -> Self {
            self.record(
                &[
                    ("WARC-Type", "conversion"),
                    ("WARC-Target-URI", url),
                    ("WARC-Refers-To", refers_to),
                    ("WARC-Identified-Content-Language", language),
                    ("Content-Type", "text/plain"),
                ],
                text,
            )
        }

        pub fn bytes(self) -> Vec<u8> {
            self.writer.finish().expect("finish archive")
        }

        pub fn reader(self) -> ArchiveReader<Cursor<Vec<u8>>> {
            ArchiveReader::new(Cursor::new(self.bytes()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::test_support::{Archive, metadata_block};
    use super::*;

    #[test]
    fn truncated_stream_keeps_earlier_pages() {
        let mut bytes = Archive::new()
            .capture("https://a.example/", "<urn:uuid:a>", b"<p>a</p>", &metadata_block("en", "UTF-8"))
            .capture("https://b.example/", "<urn:uuid:b>", b"<p>b</p>", &metadata_block("en", "UTF-8"))
            .bytes();
        let cut = bytes
            .windows(8)
            .position(|w| w == b"<p>b</p>")
            .expect("second page present");
        bytes.truncate(cut);

        let mut reader = ArchiveReader::new(Cursor::new(bytes));
        let extraction = extract_stream(ArchiveKind::Warc, &mut reader).unwrap();

        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].url, "https://a.example/");
        assert!(extraction.stats.truncated);
    }

    #[test]
    fn corruption_at_first_record_fails_the_file() {
        let mut reader = ArchiveReader::new(Cursor::new(b"garbage\r\n\r\n".to_vec()));
        let err = extract_stream(ArchiveKind::Wet, &mut reader).unwrap_err();
        assert!(err.is_corrupt_at_start());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = extract_file(ArchiveKind::Warc, Path::new("/nonexistent/ccjoin/x.warc.gz"))
            .unwrap_err();
        assert!(matches!(err, CcJoinError::Io { .. }));
    }

    #[test]
    fn reads_gzip_file_from_disk() {
        let dir = std::env::temp_dir().join(format!("ccjoin-extract-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sample.warc.wet.gz");

        let mut writer = ccjoin_archive::ArchiveWriter::new(Vec::new());
        writer
            .write_record(
                &[
                    ("WARC-Type", "conversion"),
                    ("WARC-Target-URI", "https://a.example/"),
                    ("WARC-Refers-To", "<urn:uuid:a>"),
                    ("WARC-Identified-Content-Language", "eng"),
                ],
                b"plain text",
            )
            .unwrap();
        std::fs::write(&path, writer.finish().unwrap()).unwrap();

        let extraction = extract_file(ArchiveKind::Wet, &path).unwrap();
        assert_eq!(
            extraction.records,
            vec![ExtractedRecord::new("https://a.example/", "<urn:uuid:a>", "plain text")]
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn raised_flag_stops_extraction() {
        let mut reader = Archive::new()
            .conversion("https://a.example/", "<urn:uuid:a>", "eng", b"Alpha")
            .reader();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = extract_until(DerivedTextExtractor::new(), &mut reader, &cancel).unwrap_err();
        assert!(matches!(err, CcJoinError::Cancelled { records_read: 0 }));
    }

    #[test]
    fn stats_total_skips() {
        let mut stats = ExtractStats::default();
        stats.record_skip(SkipReason::NotEnglish);
        stats.record_skip(SkipReason::DecodeFailure);
        stats.record_skip(SkipReason::DecodeFailure);
        assert_eq!(stats.skipped(), 3);
        assert_eq!(stats.decode_failures, 2);
    }
}
