//! Core domain types shared by the extractors, the join engine and the orchestrator.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Current schema version for the run manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Two-letter tag the crawler's metadata records use for English.
pub const ENGLISH_ISO_639_1: &str = "en";

/// Three-letter tag derived-text conversion records use for English.
pub const ENGLISH_ISO_639_3: &str = "eng";

// ---------------------------------------------------------------------------
// ArchiveKind
// ---------------------------------------------------------------------------

/// The two archive flavours a crawl publishes and this tool consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    /// Full request/response/metadata captures (`*.warc.gz`).
    Warc,
    /// Derived plain-text conversions (`*.warc.wet.gz`).
    Wet,
}

impl ArchiveKind {
    /// Both kinds, in processing order.
    pub const ALL: [ArchiveKind; 2] = [ArchiveKind::Warc, ArchiveKind::Wet];

    /// Short lowercase name (`warc` / `wet`).
    pub fn name(self) -> &'static str {
        match self {
            Self::Warc => "warc",
            Self::Wet => "wet",
        }
    }

    /// File name of the gzip paths listing for this kind.
    pub fn paths_listing(self) -> String {
        format!("{}.paths.gz", self.name())
    }

    /// Directory that downloaded archives of this kind land in.
    pub fn index_dir(self) -> String {
        format!("{}_index", self.name())
    }

    /// Directory holding per-archive extraction output for this kind.
    pub fn json_dir(self) -> String {
        format!("{}_json_data", self.name())
    }

    /// Whether `file_name` is an archive of this kind.
    pub fn matches_file_name(self, file_name: &str) -> bool {
        match self {
            Self::Warc => file_name.ends_with(".warc.gz") && !file_name.ends_with(".wet.gz"),
            Self::Wet => file_name.ends_with(".warc.wet.gz"),
        }
    }
}

impl std::fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ArchiveKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "warc" => Ok(Self::Warc),
            "wet" => Ok(Self::Wet),
            other => Err(format!("unknown archive kind '{other}': expected 'warc' or 'wet'")),
        }
    }
}

/// Stem shared by a WARC file and its WET sibling: everything before the first `.`.
///
/// `CC-MAIN-20231128083443-20231128113443-00000.warc.wet.gz` →
/// `CC-MAIN-20231128083443-20231128113443-00000`.
pub fn archive_base_name(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One English page pulled out of an archive.
///
/// Persisted positionally as `[url, correlation_id, content]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRecord {
    /// Target URI of the capture.
    pub url: String,
    /// Record ID of the response this page belongs to.
    pub correlation_id: String,
    /// Decoded HTML (WARC) or extracted text (WET). Never empty.
    pub content: String,
}

impl ExtractedRecord {
    pub fn new(
        url: impl Into<String>,
        correlation_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            correlation_id: correlation_id.into(),
            content: content.into(),
        }
    }
}

impl Serialize for ExtractedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (&self.url, &self.correlation_id, &self.content).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ExtractedRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let (url, correlation_id, content) = <(String, String, String)>::deserialize(deserializer)?;
        Ok(Self {
            url,
            correlation_id,
            content,
        })
    }
}

/// A page present in both archives: raw markup next to the crawler's extracted text.
///
/// Persisted positionally as `[url, correlation_id, raw_content, derived_text]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRecord {
    pub url: String,
    pub correlation_id: String,
    pub raw_content: String,
    pub derived_text: String,
}

impl Serialize for JoinedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (
            &self.url,
            &self.correlation_id,
            &self.raw_content,
            &self.derived_text,
        )
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JoinedRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let (url, correlation_id, raw_content, derived_text) =
            <(String, String, String, String)>::deserialize(deserializer)?;
        Ok(Self {
            url,
            correlation_id,
            raw_content,
            derived_text,
        })
    }
}

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one batch run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracted_record_serializes_as_tuple() {
        let record = ExtractedRecord::new("https://a.example/", "<urn:uuid:1>", "<html>hi");
        let json = serde_json::to_string(&record).expect("serialize");
        assert_eq!(json, r#"["https://a.example/","<urn:uuid:1>","<html>hi"]"#);
    }

    #[test]
    fn joined_record_field_order() {
        let record = JoinedRecord {
            url: "u1".into(),
            correlation_id: "A".into(),
            raw_content: "<html>1".into(),
            derived_text: "text1".into(),
        };
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value, serde_json::json!(["u1", "A", "<html>1", "text1"]));
    }

    #[test]
    fn extracted_record_rejects_wrong_arity() {
        let parsed: std::result::Result<ExtractedRecord, _> =
            serde_json::from_str(r#"["u1","A"]"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn archive_kind_file_matching() {
        let warc = "CC-MAIN-20231128083443-20231128113443-00000.warc.gz";
        let wet = "CC-MAIN-20231128083443-20231128113443-00000.warc.wet.gz";

        assert!(ArchiveKind::Warc.matches_file_name(warc));
        assert!(!ArchiveKind::Warc.matches_file_name(wet));
        assert!(ArchiveKind::Wet.matches_file_name(wet));
        assert!(!ArchiveKind::Wet.matches_file_name(warc));
        assert!(!ArchiveKind::Wet.matches_file_name("notes.txt"));
    }

    #[test]
    fn base_name_is_shared_by_siblings() {
        assert_eq!(
            archive_base_name("CC-MAIN-2023-00000.warc.wet.gz"),
            archive_base_name("CC-MAIN-2023-00000.warc.gz"),
        );
        assert_eq!(archive_base_name("plain"), "plain");
    }

    #[test]
    fn archive_kind_names() {
        assert_eq!(ArchiveKind::Warc.paths_listing(), "warc.paths.gz");
        assert_eq!(ArchiveKind::Wet.index_dir(), "wet_index");
        assert_eq!(ArchiveKind::Wet.json_dir(), "wet_json_data");
        assert_eq!("WET".parse::<ArchiveKind>(), Ok(ArchiveKind::Wet));
        assert!("wat".parse::<ArchiveKind>().is_err());
    }

    #[test]
    fn joined_fixture_validates() {
        let fixture = std::fs::read_to_string("../../../fixtures/json/combined.fixture.json")
            .expect("read fixture");
        let parsed: Vec<JoinedRecord> =
            serde_json::from_str(&fixture).expect("deserialize fixture joined records");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].url, "https://example.com/");
        assert!(parsed[0].raw_content.starts_with("<!doctype html>"));
        assert_eq!(parsed[1].derived_text, "Second page\nMore text");
    }
}
