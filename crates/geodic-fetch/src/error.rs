use thiserror::Error;

/// Errors that can be returned by geodic-fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// An HTTP request failed (network error, non-2xx status, etc.).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A filesystem I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to read or extract a ZIP archive.
    #[error("ZIP extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The archive did not contain a member with the required extension.
    #[error("archive contains no .{extension} member")]
    MissingMember { extension: &'static str },

    /// The in-memory transport has nothing registered for this URL.
    #[error("no resource registered for {url}")]
    NotFound { url: String },
}
