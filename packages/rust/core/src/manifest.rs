//! `run-manifest.json`: what one batch run did.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ccjoin_extract::ExtractStats;
use ccjoin_join::JoinStats;
use ccjoin_shared::{ArchiveKind, CURRENT_SCHEMA_VERSION, CcJoinError, Result, RunId, RunMode};

use crate::persist::{OutputMeta, write_json_pretty_atomic};

/// How a single archive download ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadStatus {
    Downloaded { bytes: u64 },
    AlreadyPresent,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadReport {
    pub kind: ArchiveKind,
    pub url: String,
    pub file_name: String,
    #[serde(flatten)]
    pub status: DownloadStatus,
}

/// How extraction of a single archive ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    /// Output written. `stats.truncated` tells whether the archive ended early.
    Extracted,
    Failed { error: String },
    TimedOut { after_ms: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub kind: ArchiveKind,
    pub file_name: String,
    #[serde(flatten)]
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ExtractStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputMeta>,
}

impl FileReport {
    pub fn is_extracted(&self) -> bool {
        self.status == FileStatus::Extracted
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairReport {
    pub base: String,
    pub stats: JoinStats,
    pub output: OutputMeta,
}

/// Top-level manifest document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub run_id: RunId,
    pub tool_version: String,
    pub mode: RunMode,
    pub max_files: usize,
    pub offset: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default)]
    pub downloads: Vec<DownloadReport>,
    #[serde(default)]
    pub files: Vec<FileReport>,
    #[serde(default)]
    pub joins: Vec<PairReport>,
}

impl RunManifest {
    pub fn new(run_id: RunId, mode: RunMode, max_files: usize, offset: usize) -> Self {
        let now = Utc::now();
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            run_id,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            mode,
            max_files,
            offset,
            started_at: now,
            finished_at: now,
            downloads: Vec::new(),
            files: Vec::new(),
            joins: Vec::new(),
        }
    }

    /// Stamp the finish time and write the manifest.
    pub fn finish(&mut self, path: &Path) -> Result<OutputMeta> {
        self.finished_at = Utc::now();
        write_json_pretty_atomic(path, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CcJoinError::io(path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| CcJoinError::validation(format!("invalid run manifest: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_roundtrip() {
        let dir = std::env::temp_dir().join(format!("ccjoin-manifest-{}", uuid::Uuid::now_v7()));
        let path = dir.join("run-manifest.json");

        let mut manifest = RunManifest::new(RunId::new(), RunMode::WetOnly, 3, 1);
        manifest.files.push(FileReport {
            kind: ArchiveKind::Wet,
            file_name: "a.warc.wet.gz".into(),
            status: FileStatus::TimedOut { after_ms: 5000 },
            stats: None,
            output: None,
        });
        manifest.finish(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"mode\": \"wet-only\""));
        assert!(raw.contains("\"status\": \"timed_out\""));

        let loaded = RunManifest::load(&path).unwrap();
        assert_eq!(loaded.run_id, manifest.run_id);
        assert_eq!(loaded.files[0].status, FileStatus::TimedOut { after_ms: 5000 });
        assert!(loaded.finished_at >= loaded.started_at);

        std::fs::remove_dir_all(&dir).ok();
    }
}
