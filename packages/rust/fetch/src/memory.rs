//! In-memory fetcher.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use ccjoin_shared::{CcJoinError, Result};
use url::Url;

use crate::Fetcher;

/// Serves fixed bodies keyed by URL. Unknown URLs fail like an HTTP 404.
///
/// Clones share the request log, so a clone handed to a run can be inspected
/// afterwards through the original.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    bodies: HashMap<String, Arc<Vec<u8>>>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub fn with(mut self, url: impl Into<String>, body: Vec<u8>) -> Self {
        self.bodies.insert(url.into(), Arc::new(body));
        self
    }

    /// URLs requested so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Fetcher for MemoryFetcher {
    async fn fetch_to(&self, url: &Url, dest: &Path) -> Result<u64> {
        self.requested
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(url.to_string());

        let body = self
            .bodies
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| CcJoinError::Network(format!("{url}: HTTP 404 Not Found")))?;

        tokio::fs::write(dest, body.as_slice())
            .await
            .map_err(|e| CcJoinError::io(dest, e))?;
        Ok(body.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_requests() {
        let fetcher = MemoryFetcher::new().with("https://a.example/x", b"x".to_vec());
        let observer = fetcher.clone();
        let dest = std::env::temp_dir().join(format!("ccjoin-mem-{}", uuid::Uuid::now_v7()));

        let url = Url::parse("https://a.example/x").unwrap();
        assert_eq!(fetcher.fetch_to(&url, &dest).await.unwrap(), 1);

        let missing = Url::parse("https://a.example/y").unwrap();
        assert!(fetcher.fetch_to(&missing, &dest).await.is_err());

        assert_eq!(
            observer.requested(),
            vec!["https://a.example/x".to_string(), "https://a.example/y".to_string()]
        );

        std::fs::remove_file(&dest).ok();
    }
}
