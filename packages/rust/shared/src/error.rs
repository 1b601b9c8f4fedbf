//! Error types for ccjoin.
//!
//! Library crates use [`CcJoinError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Record-level conditions (a page in the wrong language, bytes that do not
//! decode in the declared charset, a raw page without a derived twin) are not
//! errors; extractors and the join engine count and skip them.

use std::path::PathBuf;

/// Top-level error type for all ccjoin operations.
#[derive(Debug, thiserror::Error)]
pub enum CcJoinError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while downloading an archive or listing.
    #[error("network error: {0}")]
    Network(String),

    /// Container framing could not be decoded. Fatal for the rest of one file.
    #[error("corrupt archive at record {record_index}: {message}")]
    CorruptArchive { record_index: usize, message: String },

    /// A structure inside an otherwise intact record could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad sampling parameters, invalid file name, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// JSON (de)serialization error for persisted record sets.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Work stopped on request (per-file timeout).
    #[error("cancelled after {records_read} records")]
    Cancelled { records_read: usize },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CcJoinError>;

impl CcJoinError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a corrupt-archive error for the record at `record_index`.
    pub fn corrupt(record_index: usize, msg: impl Into<String>) -> Self {
        Self::CorruptArchive {
            record_index,
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is stream-level corruption detected before any record
    /// could be decoded, i.e. the whole file is unusable.
    pub fn is_corrupt_at_start(&self) -> bool {
        matches!(self, Self::CorruptArchive { record_index: 0, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = CcJoinError::config("bad base_url");
        assert_eq!(err.to_string(), "config error: bad base_url");

        let err = CcJoinError::corrupt(7, "truncated header block");
        assert_eq!(
            err.to_string(),
            "corrupt archive at record 7: truncated header block"
        );
    }

    #[test]
    fn corrupt_at_start_only_for_first_record() {
        assert!(CcJoinError::corrupt(0, "bad magic").is_corrupt_at_start());
        assert!(!CcJoinError::corrupt(3, "bad frame").is_corrupt_at_start());
        assert!(!CcJoinError::validation("x").is_corrupt_at_start());
    }
}
