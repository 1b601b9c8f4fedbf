//! Forward-only record decoder.

use std::io::{self, BufRead, Read};

use tracing::{debug, trace};

use ccjoin_shared::{CcJoinError, Result};

use crate::record::{ArchiveRecord, Body, RecordHeaders};

/// Longest header line accepted before the stream is declared corrupt.
const MAX_HEADER_LINE: u64 = 64 * 1024;

/// Most header lines accepted in one record.
const MAX_HEADER_LINES: usize = 1024;

/// Lazily decodes records from a byte stream.
///
/// Only the current record's headers are held in memory; its body streams from
/// the underlying reader on demand and any unread part is skipped when the
/// next record is requested. After an error the reader is finished and yields
/// no further records.
pub struct ArchiveReader<R> {
    inner: R,
    /// Unread bytes of the current record's block.
    remaining: u64,
    /// Index of the next record to decode.
    next_index: usize,
    finished: bool,
}

impl<R: BufRead> ArchiveReader<R> {
    /// Decode records from an uncompressed stream.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            remaining: 0,
            next_index: 0,
            finished: false,
        }
    }

    /// Number of records handed out so far.
    pub fn records_read(&self) -> usize {
        self.next_index
    }

    /// Decode the next record.
    ///
    /// Returns `Ok(None)` at a clean end of stream and
    /// [`CcJoinError::CorruptArchive`] when framing cannot be decoded.
    pub fn next_record(&mut self) -> Result<Option<ArchiveRecord<'_, R>>> {
        if self.finished {
            return Ok(None);
        }

        let index = self.next_index;
        let headers = match self.read_header_block(index) {
            Ok(Some(headers)) => headers,
            Ok(None) => {
                debug!(records = index, "end of archive");
                self.finished = true;
                return Ok(None);
            }
            Err(e) => {
                self.finished = true;
                return Err(e);
            }
        };

        let Some(length) = headers.content_length() else {
            self.finished = true;
            return Err(CcJoinError::corrupt(index, "missing or invalid Content-Length"));
        };

        trace!(index, length, "decoded record header");
        self.remaining = length;
        self.next_index += 1;

        let body = Body {
            inner: &mut self.inner,
            remaining: &mut self.remaining,
            record_index: index,
        };
        Ok(Some(ArchiveRecord::new(index, headers, length, body)))
    }

    /// Skip the previous body, then read the version line and header block.
    fn read_header_block(&mut self, index: usize) -> Result<Option<RecordHeaders>> {
        self.skip_unread_body(index)?;

        let mut line = Vec::new();

        // Blank lines separate a block from the next record.
        let version = loop {
            if self.read_line(&mut line, index)? == 0 {
                return Ok(None);
            }
            let text = trim_eol(&line);
            if !text.is_empty() {
                break String::from_utf8_lossy(text).into_owned();
            }
        };

        if !version.starts_with("WARC/") {
            return Err(CcJoinError::corrupt(
                index,
                format!("expected version line, found {:?}", preview(&version)),
            ));
        }

        let mut headers = RecordHeaders::new(version);
        loop {
            if self.read_line(&mut line, index)? == 0 {
                return Err(CcJoinError::corrupt(
                    index,
                    "stream ended inside header block",
                ));
            }
            let text = trim_eol(&line);
            if text.is_empty() {
                break;
            }
            if headers.len() >= MAX_HEADER_LINES {
                return Err(CcJoinError::corrupt(index, "too many header lines"));
            }

            let text = String::from_utf8_lossy(text);
            if text.starts_with([' ', '\t']) {
                if !headers.continue_last(text.trim()) {
                    return Err(CcJoinError::corrupt(
                        index,
                        "continuation line before any header",
                    ));
                }
                continue;
            }

            let (name, value) = text.split_once(':').ok_or_else(|| {
                CcJoinError::corrupt(index, format!("malformed header line {:?}", preview(&text)))
            })?;
            headers.push(name.trim(), value.trim());
        }

        Ok(Some(headers))
    }

    fn skip_unread_body(&mut self, index: usize) -> Result<()> {
        if self.remaining == 0 {
            return Ok(());
        }
        let expected = self.remaining;
        let skipped = io::copy(&mut (&mut self.inner).take(expected), &mut io::sink())
            .map_err(|e| CcJoinError::corrupt(index, format!("skipping previous body: {e}")))?;
        self.remaining = 0;
        if skipped < expected {
            return Err(CcJoinError::corrupt(
                index,
                format!("previous body truncated: {skipped} of {expected} bytes"),
            ));
        }
        Ok(())
    }

    /// Read one line into `buf` (cleared first). Returns bytes read; 0 at end of stream.
    fn read_line(&mut self, buf: &mut Vec<u8>, index: usize) -> Result<usize> {
        buf.clear();
        let n = (&mut self.inner)
            .take(MAX_HEADER_LINE + 1)
            .read_until(b'\n', buf)
            .map_err(|e| CcJoinError::corrupt(index, format!("reading header: {e}")))?;
        if n as u64 > MAX_HEADER_LINE {
            return Err(CcJoinError::corrupt(index, "header line too long"));
        }
        Ok(n)
    }
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn preview(text: &str) -> String {
    text.chars().take(40).collect()
}
