//! Shared types, error model, and configuration for ccjoin.
//!
//! This crate is the foundation depended on by all other ccjoin crates.
//! It provides:
//! - [`CcJoinError`]: the unified error type
//! - Domain types ([`ExtractedRecord`], [`JoinedRecord`], [`ArchiveKind`])
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, DownloadConfig, ExtractConfig, RunConfig, RunMode, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{CcJoinError, Result};
pub use types::{
    ArchiveKind, CURRENT_SCHEMA_VERSION, ENGLISH_ISO_639_1, ENGLISH_ISO_639_3,
    ExtractedRecord, JoinedRecord, RunId, archive_base_name,
};
