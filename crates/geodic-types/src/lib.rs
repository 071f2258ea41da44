//! Shared value types for the geodic crates: the dictionary [`Descriptor`]
//! and its signed [`InternalId`].

pub mod descriptor;
pub mod id;
mod lenient;

pub use descriptor::{Descriptor, Manifest, SpatialExtent, TIMESTAMP_FORMAT};
pub use id::{InternalId, Origin};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
    /// Zero is neither a remote nor a local id.
    #[error("internal id 0 is not a valid dictionary id")]
    ZeroId,

    #[error("invalid descriptor JSON: {0}")]
    Json(#[from] serde_json::Error),
}
