use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::FetchError;

/// Byte-level GET used for both the manifest and the dictionary archives.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> impl Future<Output = Result<Bytes, FetchError>> + Send;
}

/// HTTP transport backed by reqwest, with proxy support and retries.
pub struct Downloader {
    pub retry_count: usize,
    pub retry_delay_secs: u64,
    pub proxy: Option<String>,
    client: Client,
}

impl Downloader {
    pub fn new(retry_count: usize, retry_delay_secs: u64, proxy: Option<String>) -> Self {
        let mut builder = Client::builder()
            .user_agent(concat!("geodic-fetch/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30));

        if let Some(ref proxy_url) = proxy {
            match reqwest::Proxy::all(proxy_url) {
                Ok(p) => {
                    builder = builder.proxy(p);
                }
                Err(e) => {
                    warn!(proxy = %proxy_url, error = %e, "ignoring invalid proxy URL");
                }
            }
        }

        let client = builder.build().unwrap_or_default();

        Self {
            retry_count: retry_count.max(1),
            retry_delay_secs,
            proxy,
            client,
        }
    }

    async fn get_once(&self, url: &str) -> Result<Bytes, FetchError> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes)
    }
}

impl Transport for Downloader {
    async fn get(&self, url: &str) -> Result<Bytes, FetchError> {
        let mut attempt = 0;
        loop {
            match self.get_once(url).await {
                Ok(bytes) => {
                    debug!(%url, len = bytes.len(), "downloaded");
                    return Ok(bytes);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.retry_count {
                        return Err(e);
                    }
                    warn!(%url, attempt, error = %e, "download failed, retrying");
                    tokio::time::sleep(Duration::from_secs(self.retry_delay_secs)).await;
                }
            }
        }
    }
}

/// Transport serving fixed bodies from memory; lets a repository run against
/// a mirrored manifest without network access.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    resources: Mutex<HashMap<String, Bytes>>,
    requests: AtomicUsize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, body: impl Into<Bytes>) {
        self.resources
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.into(), body.into());
    }

    /// Number of `get` calls served or refused so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryTransport {
    async fn get(&self, url: &str) -> Result<Bytes, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.resources
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                url: url.to_owned(),
            })
    }
}
