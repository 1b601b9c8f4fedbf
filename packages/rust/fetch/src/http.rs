//! HTTP fetcher backed by `reqwest`.

use std::path::Path;
use std::time::Duration;

use ccjoin_shared::{CcJoinError, DownloadConfig, Result};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::Fetcher;

/// Maximum number of redirects to follow for one download.
const MAX_REDIRECTS: usize = 5;

/// Base User-Agent string for download requests.
const USER_AGENT: &str = concat!("ccjoin/", env!("CARGO_PKG_VERSION"));

/// Client settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Whole-request timeout in seconds. Archives are large; keep this generous.
    pub timeout_secs: u64,
    /// Appended to the User-Agent after a space.
    pub user_agent_suffix: Option<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from(&DownloadConfig::default())
    }
}

impl From<&DownloadConfig> for FetchOptions {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            timeout_secs: config.timeout_secs,
            user_agent_suffix: config.user_agent_suffix.clone(),
        }
    }
}

impl FetchOptions {
    fn user_agent(&self) -> String {
        match self.user_agent_suffix.as_deref().map(str::trim) {
            Some(suffix) if !suffix.is_empty() => format!("{USER_AGENT} {suffix}"),
            _ => USER_AGENT.to_string(),
        }
    }
}

/// Streams response bodies to disk chunk by chunk.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher with its own connection pool.
    pub fn new(opts: &FetchOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(opts.user_agent())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| CcJoinError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch_to(&self, url: &Url, dest: &Path) -> Result<u64> {
        info!(%url, "downloading");

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| CcJoinError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CcJoinError::Network(format!("{url}: HTTP {status}")));
        }
        if let Some(len) = response.content_length() {
            debug!(%url, len, "response size announced");
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| CcJoinError::io(dest, e))?;

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| CcJoinError::Network(format!("{url}: failed to read body: {e}")))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| CcJoinError::io(dest, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| CcJoinError::io(dest, e))?;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ccjoin-http-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn user_agent_suffix() {
        let mut opts = FetchOptions::default();
        assert_eq!(opts.user_agent(), USER_AGENT);

        opts.user_agent_suffix = Some("(ops@example.org)".into());
        assert_eq!(opts.user_agent(), format!("{USER_AGENT} (ops@example.org)"));

        opts.user_agent_suffix = Some("   ".into());
        assert_eq!(opts.user_agent(), USER_AGENT);
    }

    #[tokio::test]
    async fn streams_body_to_file() {
        let server = wiremock::MockServer::start().await;
        let body: Vec<u8> = (0..=255u8).cycle().take(100_000).collect();

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/crawl-data/seg/a.warc.gz"))
            .and(wiremock::matchers::header_regex("user-agent", "^ccjoin/"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = scratch_dir();
        let dest = dir.join("a.warc.gz");
        let fetcher = HttpFetcher::new(&FetchOptions::default()).unwrap();
        let url = Url::parse(&format!("{}/crawl-data/seg/a.warc.gz", server.uri())).unwrap();

        let written = fetcher.fetch_to(&url, &dest).await.unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn error_status_is_network_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = scratch_dir();
        let dest = dir.join("b.warc.gz");
        let fetcher = HttpFetcher::new(&FetchOptions::default()).unwrap();
        let url = Url::parse(&format!("{}/b.warc.gz", server.uri())).unwrap();

        let err = fetcher.fetch_to(&url, &dest).await.unwrap_err();

        assert!(matches!(err, CcJoinError::Network(ref msg) if msg.contains("503")));
        assert!(!dest.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn download_through_http() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/wet.paths.gz"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(b"listing".to_vec()))
            .mount(&server)
            .await;

        let dir = scratch_dir();
        let dest = dir.join("wet.paths.gz");
        let fetcher = HttpFetcher::new(&FetchOptions::default()).unwrap();
        let url = Url::parse(&format!("{}/wet.paths.gz", server.uri())).unwrap();

        crate::download(&fetcher, &url, &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"listing");

        std::fs::remove_dir_all(&dir).ok();
    }
}
