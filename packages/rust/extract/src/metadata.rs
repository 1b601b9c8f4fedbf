//! Language and charset hints from a capture's metadata record.
//!
//! The block is a list of `name: value` fields. `charset-detected` names the
//! charset the crawler detected; `languages-cld2` carries a JSON report whose
//! first `languages[].code` is the page's primary language (two-letter tag).
//! Fields are decoded structurally first. The regexes only run when that finds
//! nothing, for blocks that do not follow the field layout.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

/// `"code":"xx"` anywhere in the block.
static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""code"\s*:\s*"([^"]+)""#).expect("code regex"));

/// `charset-detected: NAME` anywhere in the block.
static CHARSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"charset-detected:\s+(\S+)").expect("charset regex"));

/// Language and charset hints for one page. Either may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    /// Primary language code, as written by the crawler.
    pub language: Option<String>,
    /// Declared character-set label.
    pub charset: Option<String>,
}

/// Shape of a language report, either as a field value or as the whole block.
#[derive(Debug, Deserialize)]
struct LanguageReport {
    #[serde(default)]
    languages: Vec<DetectedLanguage>,
    #[serde(default, rename = "charset-detected")]
    charset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetectedLanguage {
    code: String,
}

impl LanguageReport {
    fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text.trim()).ok()
    }

    fn primary_code(&self) -> Option<String> {
        self.languages
            .first()
            .map(|l| l.code.trim().to_string())
            .filter(|c| !c.is_empty())
    }
}

impl PageMetadata {
    /// Parse a metadata block. Never fails; unknown content yields empty hints.
    pub fn parse(block: &str) -> Self {
        let mut meta = Self::from_fields(block);

        if meta.language.is_none() || meta.charset.is_none() {
            if let Some(report) = LanguageReport::parse(block) {
                meta.language = meta.language.or_else(|| report.primary_code());
                meta.charset = meta.charset.or(report.charset);
            }
        }

        if meta.language.is_none() {
            meta.language = CODE_RE
                .captures(block)
                .map(|c| c[1].to_string());
        }
        if meta.charset.is_none() {
            meta.charset = CHARSET_RE
                .captures(block)
                .map(|c| c[1].to_string());
        }

        meta
    }

    fn from_fields(block: &str) -> Self {
        let mut meta = Self::default();
        for line in block.lines() {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();

            if name == "charset-detected" {
                if let Some(label) = value.split_whitespace().next() {
                    meta.charset = Some(label.to_string());
                }
            } else if name.starts_with("languages") && meta.language.is_none() {
                meta.language = LanguageReport::parse(value).and_then(|r| r.primary_code());
            }
        }
        meta
    }

    /// Whether the primary language is exactly `code`.
    pub fn language_is(&self, code: &str) -> bool {
        self.language.as_deref() == Some(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_crawler_fields() {
        let block = std::fs::read_to_string("../../../fixtures/metadata/cld2-english.txt")
            .expect("read metadata fixture");
        let meta = PageMetadata::parse(&block);
        assert_eq!(meta.language.as_deref(), Some("en"));
        assert_eq!(meta.charset.as_deref(), Some("ISO-8859-1"));
        assert!(meta.language_is("en"));
    }

    #[test]
    fn missing_language_is_unknown() {
        let block = std::fs::read_to_string("../../../fixtures/metadata/no-language.txt")
            .expect("read metadata fixture");
        let meta = PageMetadata::parse(&block);
        assert_eq!(meta.language, None);
        assert_eq!(meta.charset.as_deref(), Some("UTF-8"));
    }

    #[test]
    fn first_language_is_primary() {
        let block = "languages-cld2: {\"languages\":[{\"code\":\"de\"},{\"code\":\"en\"}]}\r\n";
        assert_eq!(PageMetadata::parse(block).language.as_deref(), Some("de"));
    }

    #[test]
    fn whole_block_json() {
        let block = r#"{"charset-detected":"UTF-8","languages":[{"code":"en","score":900.0}]}"#;
        let meta = PageMetadata::parse(block);
        assert_eq!(meta.language.as_deref(), Some("en"));
        assert_eq!(meta.charset.as_deref(), Some("UTF-8"));
    }

    #[test]
    fn truncated_json_falls_back_to_pattern() {
        let block = "charset-detected: windows-1252\nlanguages-cld2: {\"languages\":[{\"code\":\"en\",\"score\":";
        let meta = PageMetadata::parse(block);
        assert_eq!(meta.language.as_deref(), Some("en"));
        assert_eq!(meta.charset.as_deref(), Some("windows-1252"));
    }

    #[test]
    fn empty_language_list_is_unknown() {
        let block = "languages-cld2: {\"reliable\":false,\"languages\":[]}\n";
        assert_eq!(PageMetadata::parse(block).language, None);
    }

    #[test]
    fn garbage_does_not_panic() {
        let meta = PageMetadata::parse("\u{0}\u{1}::: {{{ \"code\": ");
        assert_eq!(meta, PageMetadata::default());
    }

    #[test]
    fn language_match_is_exact() {
        let meta = PageMetadata {
            language: Some("EN".into()),
            charset: None,
        };
        assert!(!meta.language_is("en"));
    }
}
