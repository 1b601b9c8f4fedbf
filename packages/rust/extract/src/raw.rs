//! Raw-content extraction from full-capture archives.
//!
//! Pages arrive as request, response, metadata. The response carries the page
//! bytes; the metadata that follows carries the language, the charset, and the
//! `WARC-Concurrent-To` link back to the response. Decoding is deferred until
//! the metadata says the page is English.

use std::io::BufRead;

use tracing::debug;

use ccjoin_archive::{ArchiveRecord, RecordKind};
use ccjoin_shared::{ArchiveKind, CcJoinError, ENGLISH_ISO_639_1, ExtractedRecord, Result};

use crate::metadata::PageMetadata;
use crate::{ExtractStats, Extractor, Outcome, SkipReason, charset};

/// At most one response waits for its metadata.
#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    HaveResponse { payload: Vec<u8> },
    /// The response was already counted as malformed; its metadata only closes the cycle.
    Discarded,
}

/// Turns request/response/metadata cycles into decoded English HTML.
#[derive(Debug, Default)]
pub struct RawContentExtractor {
    state: State,
    stats: ExtractStats,
}

impl RawContentExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a response is waiting for its metadata.
    pub fn has_pending_response(&self) -> bool {
        matches!(self.state, State::HaveResponse { .. })
    }

    fn on_response<R: BufRead>(&mut self, record: ArchiveRecord<'_, R>) -> Result<Outcome> {
        let index = record.index();
        let payload = match record.read_content() {
            Ok(payload) => payload,
            Err(e @ CcJoinError::CorruptArchive { .. }) => return Err(e),
            Err(e) => {
                debug!(index, error = %e, "unreadable response payload");
                self.state = State::Discarded;
                return Ok(Outcome::Skip(SkipReason::MalformedPayload));
            }
        };

        if let State::HaveResponse { .. } = self.state {
            debug!(index, "response replaced before its metadata arrived");
            self.stats.overwritten_responses += 1;
        }
        self.state = State::HaveResponse { payload };
        Ok(Outcome::Absorbed)
    }

    fn on_metadata<R: BufRead>(&mut self, record: ArchiveRecord<'_, R>) -> Result<Outcome> {
        // Metadata always closes the cycle, matched or not.
        let pending = std::mem::take(&mut self.state);
        if let State::Discarded = pending {
            return Ok(Outcome::Absorbed);
        }

        let url = record.target_uri().map(str::to_owned);
        let correlation_id = record.concurrent_to().map(str::to_owned);
        let block = record.read_block()?;
        let meta = PageMetadata::parse(&String::from_utf8_lossy(&block));

        let Some(language) = meta.language.as_deref() else {
            return Ok(Outcome::Skip(SkipReason::UnparsableLanguageTag));
        };
        if language != ENGLISH_ISO_639_1 {
            return Ok(Outcome::Skip(SkipReason::NotEnglish));
        }

        let State::HaveResponse { payload } = pending else {
            return Ok(Outcome::Skip(SkipReason::NoPendingResponse));
        };
        let (Some(url), Some(correlation_id)) = (url, correlation_id) else {
            return Ok(Outcome::Skip(SkipReason::MissingHeader));
        };
        let Some(label) = meta.charset.as_deref() else {
            return Ok(Outcome::Skip(SkipReason::DecodeFailure));
        };
        let Some(content) = charset::decode(&payload, label) else {
            debug!(%url, charset = label, "payload does not decode in declared charset");
            return Ok(Outcome::Skip(SkipReason::DecodeFailure));
        };
        if content.is_empty() {
            return Ok(Outcome::Skip(SkipReason::EmptyContent));
        }

        Ok(Outcome::Emit(ExtractedRecord {
            url,
            correlation_id,
            content,
        }))
    }
}

impl Extractor for RawContentExtractor {
    const KIND: ArchiveKind = ArchiveKind::Warc;

    fn observe<R: BufRead>(&mut self, record: ArchiveRecord<'_, R>) -> Result<Outcome> {
        match record.kind() {
            RecordKind::Response => self.on_response(record),
            RecordKind::Metadata => self.on_metadata(record),
            _ => Ok(Outcome::Absorbed),
        }
    }

    fn stats_mut(&mut self) -> &mut ExtractStats {
        &mut self.stats
    }

    fn into_stats(self) -> ExtractStats {
        self.stats
    }
}
