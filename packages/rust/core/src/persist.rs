//! Atomic JSON persistence for record sets and the run manifest.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use ccjoin_shared::{CcJoinError, Result};

/// A file written by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputMeta {
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: u64,
}

/// Serialize `data` as compact JSON and move it into place at `path`.
///
/// The bytes go to a hidden temp file in the same directory first, so readers
/// never observe a half-written file.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<OutputMeta> {
    let json = serde_json::to_vec(data)
        .map_err(|e| CcJoinError::Serialization(format!("{}: {e}", path.display())))?;
    write_bytes_atomic(path, &json)
}

/// Pretty-printed variant for small human-read files.
pub fn write_json_pretty_atomic<T: Serialize + ?Sized>(
    path: &Path,
    data: &T,
) -> Result<OutputMeta> {
    let json = serde_json::to_vec_pretty(data)
        .map_err(|e| CcJoinError::Serialization(format!("{}: {e}", path.display())))?;
    write_bytes_atomic(path, &json)
}

fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<OutputMeta> {
    let dir = path
        .parent()
        .ok_or_else(|| CcJoinError::validation(format!("{} has no parent", path.display())))?;
    std::fs::create_dir_all(dir).map_err(|e| CcJoinError::io(dir, e))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CcJoinError::validation(format!("{} has no file name", path.display())))?;
    let temp = dir.join(format!(".{file_name}.tmp"));

    std::fs::write(&temp, bytes).map_err(|e| CcJoinError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| CcJoinError::io(path, e))?;

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let sha256 = format!("{:x}", hasher.finalize());

    debug!(path = %path.display(), size = bytes.len(), "wrote JSON file");

    Ok(OutputMeta {
        path: path.to_path_buf(),
        sha256,
        size_bytes: bytes.len() as u64,
    })
}

/// Read a JSON array of records.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read(path).map_err(|e| CcJoinError::io(path, e))?;
    serde_json::from_slice(&content)
        .map_err(|e| CcJoinError::Serialization(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccjoin_shared::{ExtractedRecord, JoinedRecord};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ccjoin-persist-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn writes_positional_arrays() {
        let dir = temp_dir();
        let path = dir.join("warc_json_data").join("a.json");
        let records = vec![ExtractedRecord::new("https://a.example/", "<urn:uuid:1>", "<p>a</p>")];

        let meta = write_json_atomic(&path, &records).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, r#"[["https://a.example/","<urn:uuid:1>","<p>a</p>"]]"#);
        assert_eq!(meta.size_bytes, raw.len() as u64);
        assert_eq!(meta.sha256.len(), 64);
        assert!(!dir.join("warc_json_data").join(".a.json.tmp").exists());

        let back: Vec<ExtractedRecord> = read_records(&path).unwrap();
        assert_eq!(back, records);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn overwrite_replaces_content() {
        let dir = temp_dir();
        let path = dir.join("a.json");
        write_json_atomic(&path, &vec![ExtractedRecord::new("u", "id", "old")]).unwrap();
        write_json_atomic(&path, &Vec::<ExtractedRecord>::new()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn reads_joined_fixture() {
        let records: Vec<JoinedRecord> =
            read_records(Path::new("../../../fixtures/json/combined.fixture.json")).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].url, "https://example.com/");
    }

    #[test]
    fn wrong_shape_is_serialization_error() {
        let dir = temp_dir();
        let path = dir.join("bad.json");
        std::fs::write(&path, r#"[{"url":"u"}]"#).unwrap();
        let err = read_records::<ExtractedRecord>(&path).unwrap_err();
        assert!(matches!(err, CcJoinError::Serialization(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_records::<ExtractedRecord>(Path::new("/nonexistent/ccjoin.json")).unwrap_err();
        assert!(matches!(err, CcJoinError::Io { .. }));
    }
}
