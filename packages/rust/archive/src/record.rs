//! Decoded archive records: type, headers, and a lazily-read body.

use std::io::{self, BufRead, Read};

use ccjoin_shared::{CcJoinError, Result};

use crate::http;

/// Header names this workspace looks at.
pub(crate) const WARC_TYPE: &str = "WARC-Type";
pub(crate) const TARGET_URI: &str = "WARC-Target-URI";
pub(crate) const CONCURRENT_TO: &str = "WARC-Concurrent-To";
pub(crate) const REFERS_TO: &str = "WARC-Refers-To";
pub(crate) const CONTENT_LENGTH: &str = "Content-Length";
pub(crate) const CONTENT_TYPE: &str = "Content-Type";

/// Upper bound on the initial allocation for a body buffer.
const MAX_PREALLOC: u64 = 1024 * 1024;

// ---------------------------------------------------------------------------
// RecordKind
// ---------------------------------------------------------------------------

/// Value of the `WARC-Type` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    Request,
    Response,
    Metadata,
    Conversion,
    /// Anything else (`warcinfo`, `resource`, `revisit`, ...), or a missing header.
    Other(String),
}

impl RecordKind {
    fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::Other(String::new());
        };
        match value.to_ascii_lowercase().as_str() {
            "request" => Self::Request,
            "response" => Self::Response,
            "metadata" => Self::Metadata,
            "conversion" => Self::Conversion,
            _ => Self::Other(value.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordHeaders
// ---------------------------------------------------------------------------

/// Ordered header block of one record.
///
/// Names compare case-insensitively; when a name repeats, the last value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordHeaders {
    version: String,
    entries: Vec<(String, String)>,
}

impl RecordHeaders {
    pub(crate) fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_string(), value.to_string()));
    }

    /// Fold a continuation line into the previous header. Returns `false` if
    /// there is no previous header.
    pub(crate) fn continue_last(&mut self, more: &str) -> bool {
        match self.entries.last_mut() {
            Some((_, value)) => {
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(more);
                true
            }
            None => false,
        }
    }

    /// Version line, e.g. `WARC/1.0`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Look up a header value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All headers in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn content_length(&self) -> Option<u64> {
        self.get(CONTENT_LENGTH)?.trim().parse().ok()
    }
}

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

/// The unread remainder of one record's block.
///
/// Reads stop at the record boundary. Whatever is left unread is skipped by
/// the reader before it decodes the next record.
pub struct Body<'a, R> {
    pub(crate) inner: &'a mut R,
    pub(crate) remaining: &'a mut u64,
    pub(crate) record_index: usize,
}

impl<R: BufRead> Read for Body<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if *self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = buf.len().min(usize::try_from(*self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "record {} body truncated with {} bytes missing",
                    self.record_index, self.remaining
                ),
            ));
        }
        *self.remaining -= n as u64;
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// ArchiveRecord
// ---------------------------------------------------------------------------

/// One record decoded from an archive stream.
///
/// The body can be consumed once; every body accessor takes `self`.
pub struct ArchiveRecord<'a, R> {
    index: usize,
    kind: RecordKind,
    headers: RecordHeaders,
    length: u64,
    body: Body<'a, R>,
}

impl<'a, R: BufRead> ArchiveRecord<'a, R> {
    pub(crate) fn new(index: usize, headers: RecordHeaders, length: u64, body: Body<'a, R>) -> Self {
        let kind = RecordKind::from_header(headers.get(WARC_TYPE));
        Self {
            index,
            kind,
            headers,
            length,
            body,
        }
    }

    /// Zero-based position of this record in the stream.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> &RecordKind {
        &self.kind
    }

    pub fn headers(&self) -> &RecordHeaders {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// `WARC-Target-URI`.
    pub fn target_uri(&self) -> Option<&str> {
        self.headers.get(TARGET_URI)
    }

    /// `WARC-Concurrent-To`: the response a metadata record describes.
    pub fn concurrent_to(&self) -> Option<&str> {
        self.headers.get(CONCURRENT_TO)
    }

    /// `WARC-Refers-To`: the response a conversion record was derived from.
    pub fn refers_to(&self) -> Option<&str> {
        self.headers.get(REFERS_TO)
    }

    /// Declared block length in bytes.
    pub fn content_length(&self) -> u64 {
        self.length
    }

    /// Split into headers and the raw body reader.
    pub fn into_parts(self) -> (RecordHeaders, Body<'a, R>) {
        (self.headers, self.body)
    }

    /// Read the whole block exactly as stored.
    pub fn read_block(self) -> Result<Vec<u8>> {
        let index = self.index;
        let mut body = self.body;
        let mut buf = Vec::with_capacity(self.length.min(MAX_PREALLOC) as usize);
        body.read_to_end(&mut buf)
            .map_err(|e| CcJoinError::corrupt(index, format!("reading record body: {e}")))?;
        Ok(buf)
    }

    /// Read the block and, for `application/http` records, return only the
    /// HTTP payload with transfer and content encodings removed.
    ///
    /// Stream failures are [`CcJoinError::CorruptArchive`]; a malformed HTTP
    /// message inside an intact block is [`CcJoinError::Parse`].
    pub fn read_content(self) -> Result<Vec<u8>> {
        let is_http = self
            .headers
            .get(CONTENT_TYPE)
            .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("application/http"));
        let block = self.read_block()?;
        if is_http {
            http::decode_payload(&block)
        } else {
            Ok(block)
        }
    }
}

impl<R> std::fmt::Debug for ArchiveRecord<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveRecord")
            .field("index", &self.index)
            .field("kind", &self.kind)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_last_wins_case_insensitive() {
        let mut headers = RecordHeaders::new("WARC/1.0");
        headers.push("WARC-Type", "request");
        headers.push("warc-type", "response");
        assert_eq!(headers.get("WARC-TYPE"), Some("response"));
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("WARC-Target-URI"), None);
    }

    #[test]
    fn continuation_folds_into_previous() {
        let mut headers = RecordHeaders::new("WARC/1.0");
        assert!(!headers.continue_last("orphan"));
        headers.push("X-Note", "first");
        assert!(headers.continue_last("second"));
        assert_eq!(headers.get("x-note"), Some("first second"));
    }

    #[test]
    fn record_kind_from_header() {
        assert_eq!(RecordKind::from_header(Some("response")), RecordKind::Response);
        assert_eq!(RecordKind::from_header(Some("Conversion")), RecordKind::Conversion);
        assert_eq!(
            RecordKind::from_header(Some("warcinfo")),
            RecordKind::Other("warcinfo".into())
        );
        assert_eq!(RecordKind::from_header(None), RecordKind::Other(String::new()));
    }
}
