//! Remote manifest retrieval with a file-backed TTL cache.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use geodic_types::{Descriptor, Manifest, Origin};
use tracing::{debug, info, warn};

use crate::downloader::Transport;
use crate::error::FetchError;

/// Default lifetime of `dictionary_list.json`.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Manifest URL, without a trailing slash.
    pub server_url: String,
    pub cache_path: PathBuf,
    pub cache_ttl: Duration,
}

/// How the remote view of this run was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    /// Downloaded from the server during this call.
    Fresh,
    /// Served from a cache file younger than the TTL.
    Cached,
    /// No remote data this run; the caller continues with local entries only.
    Unavailable { reason: String },
}

/// Name-keyed remote view.
#[derive(Debug, Clone)]
pub struct RemoteCatalog {
    pub dictionaries: BTreeMap<String, Descriptor>,
    pub status: RemoteStatus,
}

impl RemoteCatalog {
    fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            dictionaries: BTreeMap::new(),
            status: RemoteStatus::Unavailable {
                reason: reason.into(),
            },
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.status, RemoteStatus::Unavailable { .. })
    }
}

/// Decode a manifest body into a name-keyed map.
///
/// Entries that do not decode, that have no usable name, or whose
/// `internal_id` is missing or not positive are skipped with a warning. When
/// two entries share a name the later one wins.
pub fn parse_manifest(body: &[u8]) -> Result<BTreeMap<String, Descriptor>, FetchError> {
    let manifest: Manifest = serde_json::from_slice(body)?;
    let mut out = BTreeMap::new();
    for (index, raw) in manifest.dictionaries.into_iter().enumerate() {
        // Decoding fills in a local id when the field is absent.
        let has_id = raw.get("internal_id").is_some_and(|v| !v.is_null());
        let descriptor: Descriptor = match serde_json::from_value(raw) {
            Ok(d) => d,
            Err(e) => {
                warn!(index, error = %e, "skipping malformed manifest entry");
                continue;
            }
        };
        let name = descriptor.name();
        if name.is_empty() {
            warn!(index, "skipping manifest entry without identifier");
            continue;
        }
        match descriptor.origin() {
            Origin::Remote(_) if has_id => {}
            _ => {
                warn!(index, %name, id = descriptor.internal_id.get(), "skipping manifest entry without a positive internal_id");
                continue;
            }
        }
        out.insert(name, descriptor);
    }
    Ok(out)
}

pub struct ManifestFetcher<T> {
    config: FetchConfig,
    transport: T,
}

impl<T: Transport> ManifestFetcher<T> {
    pub fn new(config: FetchConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn cache_age(&self) -> Option<Duration> {
        let modified = fs::metadata(&self.config.cache_path).ok()?.modified().ok()?;
        // A cache file stamped in the future counts as brand new.
        Some(SystemTime::now().duration_since(modified).unwrap_or_default())
    }

    fn cache_is_fresh(&self) -> bool {
        self.cache_age()
            .is_some_and(|age| age < self.config.cache_ttl)
    }

    /// Remote view of the catalog. Never fails: network and decoding problems
    /// are reported through [`RemoteStatus::Unavailable`] with an empty map.
    pub async fn fetch_catalog(&self) -> RemoteCatalog {
        if self.cache_is_fresh() {
            match fs::read(&self.config.cache_path)
                .map_err(FetchError::from)
                .and_then(|body| parse_manifest(&body))
            {
                Ok(dictionaries) => {
                    debug!(path = %self.config.cache_path.display(), "using cached manifest");
                    return RemoteCatalog {
                        dictionaries,
                        status: RemoteStatus::Cached,
                    };
                }
                Err(e) => {
                    warn!(path = %self.config.cache_path.display(), error = %e, "cached manifest unreadable, refetching");
                }
            }
        }

        info!(server = %self.config.server_url, "fetching dictionary manifest");
        let body = match self.transport.get(&self.config.server_url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(server = %self.config.server_url, error = %e, "dictionary manifest unavailable");
                return RemoteCatalog::unavailable(e.to_string());
            }
        };

        let dictionaries = match parse_manifest(&body) {
            Ok(d) => d,
            Err(e) => {
                warn!(server = %self.config.server_url, error = %e, "dictionary manifest is not valid");
                return RemoteCatalog::unavailable(e.to_string());
            }
        };

        if let Err(e) = self.write_cache(&body) {
            warn!(path = %self.config.cache_path.display(), error = %e, "failed to write manifest cache");
        }

        RemoteCatalog {
            dictionaries,
            status: RemoteStatus::Fresh,
        }
    }

    fn write_cache(&self, body: &[u8]) -> Result<(), FetchError> {
        if let Some(parent) = self.config.cache_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.config.cache_path, body)?;
        Ok(())
    }

    /// Delete the cache file so the next access refetches. Returns whether a
    /// file was removed.
    pub fn clear_cache(&self) -> Result<bool, FetchError> {
        match fs::remove_file(&self.config.cache_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::MemoryTransport;
    use tracing_test::traced_test;

    const SERVER: &str = "https://catalog.test/api/dictionary";

    fn manifest_body() -> String {
        r#"{"dictionaries":[
            {"identifier":"geonlp/world_country","internal_id":7,"title":"old","modified":"2024-01-01 00:00:00"},
            {"identifier":"geonlp/japan_pref","internal_id":"8","title":"prefs"},
            {"identifier":"geonlp/world_country","internal_id":7,"title":"new"},
            {"internal_id":9},
            {"identifier":"geonlp/no_id","title":"no id"},
            {"identifier":"geonlp/zero_id","internal_id":0},
            {"identifier":"geonlp/negative_id","internal_id":"-3"},
            "garbage"
        ]}"#
        .to_owned()
    }

    fn fetcher(dir: &std::path::Path, transport: MemoryTransport) -> ManifestFetcher<MemoryTransport> {
        ManifestFetcher::new(
            FetchConfig {
                server_url: SERVER.to_owned(),
                cache_path: dir.join("dictionary_list.json"),
                cache_ttl: DEFAULT_CACHE_TTL,
            },
            transport,
        )
    }

    #[test]
    fn later_duplicates_win_and_bad_entries_are_skipped() {
        let map = parse_manifest(manifest_body().as_bytes()).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["geonlp/world_country"].title, "new");
        assert_eq!(map["geonlp/japan_pref"].internal_id.get(), 8);
    }

    #[test]
    #[traced_test]
    fn entries_without_a_positive_id_are_skipped() {
        let map = parse_manifest(manifest_body().as_bytes()).unwrap();
        assert!(!map.contains_key("geonlp/no_id"));
        assert!(!map.contains_key("geonlp/zero_id"));
        assert!(!map.contains_key("geonlp/negative_id"));
        assert!(map.values().all(Descriptor::is_remote));
        assert!(logs_contain("skipping manifest entry without a positive internal_id"));
    }

    #[test]
    fn body_without_dictionaries_is_rejected() {
        assert!(parse_manifest(b"<html>busy</html>").is_err());
        assert!(parse_manifest(b"{\"items\":[]}").is_err());
    }

    #[tokio::test]
    async fn fresh_fetch_populates_cache_and_second_call_uses_it() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MemoryTransport::new();
        transport.insert(SERVER, manifest_body());
        let f = fetcher(dir.path(), transport);

        let first = f.fetch_catalog().await;
        assert_eq!(first.status, RemoteStatus::Fresh);
        assert!(dir.path().join("dictionary_list.json").is_file());

        let second = f.fetch_catalog().await;
        assert_eq!(second.status, RemoteStatus::Cached);
        assert_eq!(second.dictionaries.len(), 2);
        assert_eq!(f.transport().request_count(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn unreachable_server_yields_empty_unavailable_view() {
        let dir = tempfile::tempdir().unwrap();
        let f = fetcher(dir.path(), MemoryTransport::new());
        let catalog = f.fetch_catalog().await;
        assert!(catalog.dictionaries.is_empty());
        assert!(!catalog.is_available());
        assert!(logs_contain("dictionary manifest unavailable"));
    }

    #[tokio::test]
    async fn clear_cache_forces_refetch() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MemoryTransport::new();
        transport.insert(SERVER, manifest_body());
        let f = fetcher(dir.path(), transport);

        f.fetch_catalog().await;
        assert!(f.clear_cache().unwrap());
        assert!(!f.clear_cache().unwrap());
        let again = f.fetch_catalog().await;
        assert_eq!(again.status, RemoteStatus::Fresh);
        assert_eq!(f.transport().request_count(), 2);
    }

    #[tokio::test]
    async fn expired_cache_is_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MemoryTransport::new();
        transport.insert(SERVER, manifest_body());
        let mut f = fetcher(dir.path(), transport);
        f.config.cache_ttl = Duration::ZERO;

        f.fetch_catalog().await;
        let again = f.fetch_catalog().await;
        assert_eq!(again.status, RemoteStatus::Fresh);
        assert_eq!(f.transport().request_count(), 2);
    }

    #[tokio::test]
    async fn corrupt_cache_falls_back_to_network() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("dictionary_list.json"), "{").unwrap();
        let transport = MemoryTransport::new();
        transport.insert(SERVER, manifest_body());
        let f = fetcher(dir.path(), transport);
        let catalog = f.fetch_catalog().await;
        assert_eq!(catalog.status, RemoteStatus::Fresh);
        assert_eq!(catalog.dictionaries.len(), 2);
    }
}
