//! Application configuration for ccjoin.
//!
//! User config lives at `~/.ccjoin/ccjoin.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CcJoinError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "ccjoin.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".ccjoin";

// ---------------------------------------------------------------------------
// Config structs (matching ccjoin.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Sampling and worker defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Archive download settings.
    #[serde(default)]
    pub download: DownloadConfig,

    /// Per-file extraction settings.
    #[serde(default)]
    pub extract: ExtractConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Maximum number of archives to sample from each paths listing.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Offset within each sampling interval.
    #[serde(default)]
    pub offset: usize,

    /// Number of archive files processed at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            offset: 0,
            concurrency: default_concurrency(),
        }
    }
}

fn default_max_files() -> usize {
    5
}
fn default_concurrency() -> usize {
    4
}

/// `[download]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Prefix joined with each line of a paths listing.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whole-request timeout for one archive download.
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,

    /// Appended to the User-Agent header, e.g. a contact address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent_suffix: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_download_timeout(),
            user_agent_suffix: None,
        }
    }
}

fn default_base_url() -> String {
    "https://data.commoncrawl.org/".into()
}
fn default_download_timeout() -> u64 {
    600
}

/// `[extract]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Time limit for processing one archive file; 0 disables the limit.
    #[serde(default)]
    pub file_timeout_secs: u64,
}

// ---------------------------------------------------------------------------
// Run config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Which archive kinds a run downloads and extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// WARC and WET, followed by the join.
    Both,
    /// Raw-content archives only, no join.
    WarcOnly,
    /// Derived-text archives only, no join.
    WetOnly,
}

/// Runtime configuration for one batch run, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Data root holding the paths listings and all outputs.
    pub root: PathBuf,
    /// Maximum archives sampled per kind.
    pub max_files: usize,
    /// Offset within each sampling interval.
    pub offset: usize,
    /// Archive kinds to process.
    pub mode: RunMode,
    /// Remove downloaded archives once processing finishes.
    pub delete_after: bool,
    /// Prefix for download URLs.
    pub base_url: Url,
    /// Parallel file workers.
    pub concurrency: usize,
    /// Per-file extraction time limit.
    pub file_timeout: Option<Duration>,
}

impl RunConfig {
    /// Build a run config for `root` from the loaded application config.
    pub fn from_app(config: &AppConfig, root: impl Into<PathBuf>) -> Result<Self> {
        let base_url = Url::parse(&config.download.base_url).map_err(|e| {
            CcJoinError::config(format!(
                "invalid download.base_url '{}': {e}",
                config.download.base_url
            ))
        })?;

        let file_timeout = match config.extract.file_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            root: root.into(),
            max_files: config.defaults.max_files,
            offset: config.defaults.offset,
            mode: RunMode::Both,
            delete_after: false,
            base_url,
            concurrency: config.defaults.concurrency.max(1),
            file_timeout,
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.ccjoin/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| CcJoinError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.ccjoin/ccjoin.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CcJoinError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| CcJoinError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CcJoinError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CcJoinError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CcJoinError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_files"));
        assert!(toml_str.contains("https://data.commoncrawl.org/"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.max_files, 5);
        assert_eq!(parsed.defaults.concurrency, 4);
        assert_eq!(parsed.extract.file_timeout_secs, 0);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
max_files = 12

[extract]
file_timeout_secs = 90
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.max_files, 12);
        assert_eq!(config.defaults.offset, 0);
        assert_eq!(config.download.timeout_secs, 600);
        assert_eq!(config.extract.file_timeout_secs, 90);
    }

    #[test]
    fn run_config_from_app_config() {
        let mut app = AppConfig::default();
        app.extract.file_timeout_secs = 30;
        app.defaults.concurrency = 0;

        let run = RunConfig::from_app(&app, "/data/cc").expect("run config");
        assert_eq!(run.root, PathBuf::from("/data/cc"));
        assert_eq!(run.max_files, 5);
        assert_eq!(run.mode, RunMode::Both);
        assert_eq!(run.concurrency, 1);
        assert_eq!(run.file_timeout, Some(Duration::from_secs(30)));
        assert_eq!(run.base_url.as_str(), "https://data.commoncrawl.org/");
    }

    #[test]
    fn run_config_rejects_bad_base_url() {
        let mut app = AppConfig::default();
        app.download.base_url = "not a url".into();
        let err = RunConfig::from_app(&app, "/tmp").unwrap_err();
        assert!(err.to_string().contains("download.base_url"));
    }
}
