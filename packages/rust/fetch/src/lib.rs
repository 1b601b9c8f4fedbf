//! Download capability for crawl archives and path listings.
//!
//! The batch orchestrator never shells out or touches the network directly:
//! it is handed a [`Fetcher`] and asks it to stream a URL into a file. The
//! production implementation is [`HttpFetcher`]; [`MemoryFetcher`] serves
//! canned bytes so runs can be exercised offline.

mod http;
mod memory;

use std::future::Future;
use std::path::{Path, PathBuf};

use ccjoin_shared::{CcJoinError, Result};
use tracing::{debug, instrument, warn};
use url::Url;

pub use http::{FetchOptions, HttpFetcher};
pub use memory::MemoryFetcher;

/// Suffix for in-flight downloads; renamed away on success.
const PARTIAL_SUFFIX: &str = ".part";

/// Something that can stream the resource at a URL into a local file.
pub trait Fetcher: Send + Sync {
    /// Write the resource at `url` to `dest`, returning the number of bytes
    /// written. `dest` is created or truncated.
    fn fetch_to(&self, url: &Url, dest: &Path) -> impl Future<Output = Result<u64>> + Send;
}

/// Fetch `url` into `dest` without ever leaving a partial file at `dest`.
///
/// The body is streamed into a sibling `.part` file that is renamed into place
/// once complete. On failure the partial file is removed.
#[instrument(skip_all, fields(url = %url, dest = %dest.display()))]
pub async fn download<F: Fetcher>(fetcher: &F, url: &Url, dest: &Path) -> Result<u64> {
    let partial = partial_path(dest);

    let bytes = match fetcher.fetch_to(url, &partial).await {
        Ok(bytes) => bytes,
        Err(e) => {
            if let Err(rm) = tokio::fs::remove_file(&partial).await {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %partial.display(), error = %rm, "could not remove partial download");
                }
            }
            return Err(e);
        }
    };

    tokio::fs::rename(&partial, dest)
        .await
        .map_err(|e| CcJoinError::io(dest, e))?;

    debug!(bytes, "download complete");
    Ok(bytes)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}
