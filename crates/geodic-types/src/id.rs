//! Signed dictionary identifiers.
//!
//! The remote catalog hands out positive ids; dictionaries authored on this
//! machine get negative ids. On disk the sign is spelled out (`minus3`) so the
//! extraction directories stay path-safe and compatible with existing
//! repositories.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::DescriptorError;

/// Where a dictionary was assigned its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Published by the remote catalog; carries the catalog sequence number.
    Remote(u64),
    /// Created locally; carries the local sequence number (1 for id `-1`).
    Local(u64),
}

/// Internal id as stored in the `dictionary.id` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct InternalId(i64);

impl InternalId {
    /// Wrap a raw id, rejecting zero.
    pub fn new(raw: i64) -> Result<Self, DescriptorError> {
        if raw == 0 {
            return Err(DescriptorError::ZeroId);
        }
        Ok(Self(raw))
    }

    /// Wrap a raw id without validation. Used when reading rows and manifests,
    /// where a zero id is tolerated and treated as local.
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn from_origin(origin: Origin) -> Self {
        match origin {
            Origin::Remote(seq) => Self(seq as i64),
            Origin::Local(seq) => Self(-(seq as i64)),
        }
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// Only strictly positive ids come from the remote catalog.
    pub const fn is_remote(self) -> bool {
        self.0 > 0
    }

    pub fn origin(self) -> Origin {
        if self.is_remote() {
            Origin::Remote(self.0.unsigned_abs())
        } else {
            Origin::Local(self.0.unsigned_abs())
        }
    }

    /// Directory name under `extracted/` holding the staged payload.
    pub fn repository_path(self) -> String {
        if self.0 < 0 {
            format!("minus{}", self.0.unsigned_abs())
        } else {
            self.0.to_string()
        }
    }

    /// Prefix shared by every `geonlp_id` minted for this dictionary.
    pub fn geonlp_id_prefix(self) -> String {
        if self.0 < 0 {
            format!("_n{}", self.0.unsigned_abs())
        } else {
            format!("_p{}", self.0)
        }
    }
}

impl fmt::Display for InternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<InternalId> for i64 {
    fn from(id: InternalId) -> Self {
        id.0
    }
}

impl Serialize for InternalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for InternalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        crate::lenient::int(deserializer).map(Self)
    }
}
