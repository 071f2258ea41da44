//! Error types of the repository core.
//!
//! Warnings (unknown names, missing catalog entries, an unreachable server)
//! are not errors here: they come back as typed outcomes. Everything in
//! [`RepoError`] stops the current operation before it touches committed
//! catalog entries.

use thiserror::Error;

use geodic_fetch::FetchError;
use geodic_types::DescriptorError;

/// All errors that can occur while managing the local repository.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Propagated from the catalog database.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Manifest or archive retrieval failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("invalid descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Bad working directory, unwritable target, undiscoverable defaults.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(
        "invalid dictionary code '{0}': use 1 to 32 characters from A-Z, a-z, 0-9, '-' and '_'"
    )]
    InvalidCode(String),

    #[error("JSON file '{0}' has no usable identifier (expected creator/name)")]
    InvalidJsonIdentifier(String),

    #[error("CSV '{0}' has no entity_id column")]
    MissingEntityId(String),

    #[error("CSV '{0}' is empty")]
    EmptyCsv(String),

    /// Local imports may never shadow a dictionary published by the server.
    #[error("'{name}' is a remote dictionary (id {id}) and cannot be overwritten by a local import")]
    RemoteCollision { name: String, id: i64 },

    #[error("no dictionaries selected for compilation; register some with `add` or `import` first")]
    NothingToCompile,

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Failures of the external compile toolchain. Fatal to the current compile;
/// the scratch database of that run is discarded.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("importing '{dictionary}' failed (exit status {status:?}): {stderr}")]
    ImportFailed {
        dictionary: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("dictionary compiler failed (exit status {status:?}): {stderr}")]
    CompileFailed {
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("tool '{tool}' is not usable: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    #[error("initial database snapshot '{0}' not found")]
    MissingSnapshot(String),

    #[error("I/O error during build: {0}")]
    Io(#[from] std::io::Error),

    #[error("scratch database error: {0}")]
    Database(#[from] sqlx::Error),
}
