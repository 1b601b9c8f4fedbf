//! Derived-text extraction from conversion-only archives.

use std::io::BufRead;

use tracing::debug;

use ccjoin_archive::{ArchiveRecord, RecordKind};
use ccjoin_shared::{ArchiveKind, ENGLISH_ISO_639_3, ExtractedRecord, Result};

use crate::{ExtractStats, Extractor, Outcome, SkipReason};

/// Language header written on conversion records (three-letter codes,
/// comma-separated when several languages were identified).
const IDENTIFIED_LANGUAGE: &str = "WARC-Identified-Content-Language";

/// Emits the plain text of English `conversion` records.
#[derive(Debug, Default)]
pub struct DerivedTextExtractor {
    stats: ExtractStats,
}

impl DerivedTextExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Extractor for DerivedTextExtractor {
    const KIND: ArchiveKind = ArchiveKind::Wet;

    fn observe<R: BufRead>(&mut self, record: ArchiveRecord<'_, R>) -> Result<Outcome> {
        if record.kind() != &RecordKind::Conversion {
            return Ok(Outcome::Absorbed);
        }

        match record.header(IDENTIFIED_LANGUAGE) {
            None | Some("") => return Ok(Outcome::Skip(SkipReason::UnparsableLanguageTag)),
            Some(language) if language != ENGLISH_ISO_639_3 => {
                return Ok(Outcome::Skip(SkipReason::NotEnglish));
            }
            Some(_) => {}
        }

        let (Some(url), Some(correlation_id)) = (
            record.target_uri().map(str::to_owned),
            record.refers_to().map(str::to_owned),
        ) else {
            return Ok(Outcome::Skip(SkipReason::MissingHeader));
        };

        let block = record.read_block()?;
        let content = match String::from_utf8(block) {
            Ok(text) => text,
            Err(e) => {
                debug!(%url, error = %e, "conversion text is not UTF-8");
                return Ok(Outcome::Skip(SkipReason::DecodeFailure));
            }
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

    fn stats_mut(&mut self) -> &mut ExtractStats {
        &mut self.stats
    }

    fn into_stats(self) -> ExtractStats {
        self.stats
    }
}
