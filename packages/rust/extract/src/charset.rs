//! Strict decoding of captured bytes in a declared character set.

use std::borrow::Cow;

use encoding_rs::Encoding;

/// Labels meaning 7-bit ASCII. The web label table folds these into windows-1252.
const ASCII_LABELS: &[&str] = &[
    "ascii",
    "us_ascii",
    "us",
    "646",
    "iso646_us",
    "ansi_x3.4_1968",
    "csascii",
];

/// Labels meaning ISO-8859-1 proper, where every byte is the code point of the same value.
const LATIN1_LABELS: &[&str] = &[
    "latin1",
    "latin_1",
    "l1",
    "iso_8859_1",
    "iso8859_1",
    "iso_8859_1:1987",
    "iso_ir_100",
    "8859",
    "cp819",
    "ibm819",
    "csisolatin1",
];

/// Decode `bytes` as `label`.
///
/// Returns `None` when the label names no known encoding or when any byte
/// sequence is malformed for it. Nothing is replaced; a BOM is kept as text.
pub fn decode(bytes: &[u8], label: &str) -> Option<String> {
    let normalized = label.trim().to_ascii_lowercase().replace(['-', ' '], "_");
    if ASCII_LABELS.contains(&normalized.as_str()) {
        return bytes.is_ascii().then(|| bytes.iter().map(|&b| char::from(b)).collect());
    }
    if LATIN1_LABELS.contains(&normalized.as_str()) {
        return Some(bytes.iter().map(|&b| char::from(b)).collect());
    }

    let encoding = Encoding::for_label(label.trim().as_bytes())?;
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf8() {
        assert_eq!(decode("héllo".as_bytes(), "UTF-8").as_deref(), Some("héllo"));
    }

    #[test]
    fn label_is_case_insensitive() {
        assert_eq!(decode(b"abc", "utf-8").as_deref(), Some("abc"));
        assert_eq!(decode(b"abc", " Windows-1252 ").as_deref(), Some("abc"));
    }

    #[test]
    fn decodes_single_byte_charset() {
        // 0xE9 is 'é' in Latin-1 and windows-1252.
        assert_eq!(decode(b"caf\xE9", "ISO-8859-1").as_deref(), Some("café"));
        assert_eq!(decode(b"caf\xE9", "windows-1252").as_deref(), Some("café"));
    }

    #[test]
    fn ascii_rejects_high_bytes() {
        assert_eq!(decode(b"caf\xE9", "US-ASCII"), None);
        assert_eq!(decode(b"caf\xE9", "ascii"), None);
        assert_eq!(decode(b"cafe", "US-ASCII").as_deref(), Some("cafe"));
    }

    #[test]
    fn latin1_maps_c1_range_to_control_chars() {
        assert_eq!(decode(b"\x80", "ISO-8859-1").as_deref(), Some("\u{80}"));
        assert_eq!(decode(b"\x9F", "latin1").as_deref(), Some("\u{9F}"));
        // windows-1252 keeps its own mapping for the same byte.
        assert_eq!(decode(b"\x80", "windows-1252").as_deref(), Some("€"));
    }

    #[test]
    fn invalid_utf8_fails() {
        assert_eq!(decode(b"caf\xE9", "UTF-8"), None);
    }

    #[test]
    fn unknown_label_fails() {
        assert_eq!(decode(b"abc", "not-a-charset"), None);
    }
}
