//! On-disk layout of a data root.
//!
//! ```text
//! <root>/
//!   warc.paths.gz  wet.paths.gz     path listings (input)
//!   warc_index/  wet_index/         downloaded archives
//!   warc_json_data/  wet_json_data/ per-archive extraction output
//!   combined_json_data/             joined output
//!   run-manifest.json
//! ```

use std::path::{Path, PathBuf};

use ccjoin_shared::{ArchiveKind, CcJoinError, Result, archive_base_name};

const COMBINED_DIR: &str = "combined_json_data";
const MANIFEST_FILE: &str = "run-manifest.json";

/// Index directory for the third crawl flavour; never written, only cleaned up.
const WAT_INDEX_DIR: &str = "wat_index";

/// Paths under one data root. Every path is derived from `root`; nothing
/// depends on the process working directory.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths_listing(&self, kind: ArchiveKind) -> PathBuf {
        self.root.join(kind.paths_listing())
    }

    pub fn index_dir(&self, kind: ArchiveKind) -> PathBuf {
        self.root.join(kind.index_dir())
    }

    pub fn json_dir(&self, kind: ArchiveKind) -> PathBuf {
        self.root.join(kind.json_dir())
    }

    pub fn combined_dir(&self) -> PathBuf {
        self.root.join(COMBINED_DIR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Extraction output for the archive named `file_name`.
    pub fn json_output(&self, kind: ArchiveKind, file_name: &str) -> PathBuf {
        self.json_dir(kind)
            .join(format!("{}.json", archive_base_name(file_name)))
    }

    /// Joined output for a base name.
    pub fn combined_output(&self, base: &str) -> PathBuf {
        self.combined_dir().join(format!("{base}.json"))
    }

    /// Download index directories, including ones this tool never fills.
    pub fn scratch_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = ArchiveKind::ALL
            .iter()
            .map(|kind| self.index_dir(*kind))
            .collect();
        dirs.push(self.root.join(WAT_INDEX_DIR));
        dirs
    }

    /// Archives of `kind` in its index directory, sorted by file name.
    /// A missing directory yields an empty list.
    pub fn list_archives(&self, kind: ArchiveKind) -> Result<Vec<PathBuf>> {
        let dir = self.index_dir(kind);
        let mut found = list_files(&dir, |name| kind.matches_file_name(name))?;
        found.sort();
        Ok(found)
    }

    /// Base names with extraction output for `kind`, sorted.
    pub fn list_json_bases(&self, kind: ArchiveKind) -> Result<Vec<String>> {
        let dir = self.json_dir(kind);
        let mut bases: Vec<String> = list_files(&dir, |name| name.ends_with(".json"))?
            .iter()
            .filter_map(|path| path.file_stem()?.to_str().map(str::to_owned))
            .collect();
        bases.sort();
        Ok(bases)
    }

    /// Base names with extraction output for both kinds, sorted.
    pub fn paired_bases(&self) -> Result<Vec<String>> {
        let wet = self.list_json_bases(ArchiveKind::Wet)?;
        Ok(self
            .list_json_bases(ArchiveKind::Warc)?
            .into_iter()
            .filter(|base| wet.binary_search(base).is_ok())
            .collect())
    }
}

fn list_files(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CcJoinError::io(dir, e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CcJoinError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if keep(name) {
                files.push(path);
            }
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ccjoin-layout-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn paths_follow_root() {
        let layout = Layout::new("/data/cc");
        assert_eq!(
            layout.paths_listing(ArchiveKind::Wet),
            PathBuf::from("/data/cc/wet.paths.gz")
        );
        assert_eq!(
            layout.json_output(ArchiveKind::Wet, "CC-MAIN-1-2-00000.warc.wet.gz"),
            PathBuf::from("/data/cc/wet_json_data/CC-MAIN-1-2-00000.json")
        );
        assert_eq!(
            layout.combined_output("CC-MAIN-1-2-00000"),
            PathBuf::from("/data/cc/combined_json_data/CC-MAIN-1-2-00000.json")
        );
    }

    #[test]
    fn lists_archives_by_kind() {
        let root = temp_dir();
        let layout = Layout::new(&root);
        touch(&layout.index_dir(ArchiveKind::Warc).join("b.warc.gz"));
        touch(&layout.index_dir(ArchiveKind::Warc).join("a.warc.gz"));
        touch(&layout.index_dir(ArchiveKind::Warc).join("a.warc.gz.part"));
        touch(&layout.index_dir(ArchiveKind::Warc).join("stray.warc.wet.gz"));
        touch(&layout.index_dir(ArchiveKind::Wet).join("a.warc.wet.gz"));

        let warc: Vec<_> = layout
            .list_archives(ArchiveKind::Warc)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(warc, vec!["a.warc.gz", "b.warc.gz"]);
        assert_eq!(layout.list_archives(ArchiveKind::Wet).unwrap().len(), 1);

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn missing_index_is_empty() {
        let layout = Layout::new(temp_dir());
        assert!(layout.list_archives(ArchiveKind::Wet).unwrap().is_empty());
        std::fs::remove_dir_all(layout.root()).ok();
    }

    #[test]
    fn pairs_only_common_bases() {
        let root = temp_dir();
        let layout = Layout::new(&root);
        touch(&layout.json_dir(ArchiveKind::Warc).join("a.json"));
        touch(&layout.json_dir(ArchiveKind::Warc).join("b.json"));
        touch(&layout.json_dir(ArchiveKind::Wet).join("b.json"));
        touch(&layout.json_dir(ArchiveKind::Wet).join("c.json"));

        assert_eq!(layout.paired_bases().unwrap(), vec!["b".to_string()]);

        std::fs::remove_dir_all(&root).ok();
    }
}
