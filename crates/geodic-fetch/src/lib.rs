pub mod archive;
pub mod downloader;
pub mod error;
pub mod manifest;

pub use archive::{ExtractedArchive, extract_archive};
pub use downloader::{Downloader, MemoryTransport, Transport};
pub use error::FetchError;
pub use manifest::{FetchConfig, ManifestFetcher, RemoteCatalog, RemoteStatus, parse_manifest};

/// Manifest endpoint of the public GeoNLP server.
pub const DEFAULT_SERVER: &str = "https://geonlp.ex.nii.ac.jp/api/dictionary";

/// Strip the trailing `/` users tend to type after a server prefix.
pub fn normalize_server_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_owned()
}

/// Point an archive URL published by the default server at `server` instead.
///
/// Manifest entries embed absolute URLs on the public server; when a mirror or
/// proxying prefix is configured the archive must come from there too.
pub fn rewrite_archive_url(url: &str, server: &str) -> String {
    if server == DEFAULT_SERVER {
        return url.to_owned();
    }
    url.replace(DEFAULT_SERVER, server)
}
