//! Dictionary descriptors as published in the manifest and stored in the
//! catalog, plus the manifest envelope they arrive in.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::{InternalId, Origin};
use crate::{DescriptorError, lenient};

/// Timestamp layout used by `issued` / `modified`; no timezone.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Bounding box given as two coordinate pairs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct SpatialExtent(pub [[f64; 2]; 2]);

impl<'de> Deserialize<'de> for SpatialExtent {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient::box2(deserializer).map(Self)
    }
}

/// Metadata of one dictionary, as published in the manifest or stored in the
/// `json` column of a catalog entry.
///
/// Fields not modelled here are kept in [`Descriptor::extra`] so a stored
/// descriptor survives a round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(default, deserialize_with = "lenient::string")]
    pub identifier: String,
    #[serde(default = "default_internal_id")]
    pub internal_id: InternalId,
    #[serde(default = "default_creator", deserialize_with = "lenient::string")]
    pub creator: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub source: String,
    #[serde(default)]
    pub spatial: SpatialExtent,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub subject: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub issued: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub modified: Option<String>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub report_count: u64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub record_count: u64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub icon: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_internal_id() -> InternalId {
    InternalId::from_raw(-1)
}

fn default_creator() -> String {
    "local".to_owned()
}

impl Descriptor {
    /// Skeleton for a dictionary authored locally from a bare code.
    pub fn new_local(name: impl Into<String>, id: InternalId, title: impl Into<String>) -> Self {
        Self {
            identifier: name.into(),
            internal_id: id,
            creator: default_creator(),
            title: title.into(),
            description: String::new(),
            source: String::new(),
            spatial: SpatialExtent::default(),
            subject: Vec::new(),
            issued: String::new(),
            modified: None,
            report_count: 0,
            record_count: 0,
            icon: String::new(),
            url: String::new(),
            extra: Map::new(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, DescriptorError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json_string(&self) -> Result<String, DescriptorError> {
        Ok(serde_json::to_string(self)?)
    }

    /// `creator/name`: the last two `/` segments of the identifier.
    ///
    /// This is the key of every name-keyed view and the `name` column of the
    /// catalog. Empty when the identifier is empty.
    pub fn name(&self) -> String {
        let mut segments = self
            .identifier
            .trim_matches('/')
            .rsplit('/')
            .filter(|s| !s.is_empty());
        match (segments.next(), segments.next()) {
            (Some(last), Some(prev)) => format!("{prev}/{last}"),
            (Some(last), None) => last.to_owned(),
            _ => String::new(),
        }
    }

    pub fn origin(&self) -> Origin {
        self.internal_id.origin()
    }

    pub fn is_remote(&self) -> bool {
        self.internal_id.is_remote()
    }

    pub fn repository_path(&self) -> String {
        self.internal_id.repository_path()
    }

    pub fn geonlp_id_prefix(&self) -> String {
        self.internal_id.geonlp_id_prefix()
    }

    /// Parsed `modified`; `None` when absent or not in [`TIMESTAMP_FORMAT`].
    pub fn modified_at(&self) -> Option<NaiveDateTime> {
        let raw = self.modified.as_deref()?;
        NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).ok()
    }

    pub fn set_modified(&mut self, at: NaiveDateTime) {
        self.modified = Some(at.format(TIMESTAMP_FORMAT).to_string());
    }
}

/// Wire shape of the remote manifest: `{ "dictionaries": [ ... ] }`.
///
/// Entries are kept as raw JSON so a single malformed descriptor can be
/// skipped instead of failing the whole document. A body without the
/// `dictionaries` array (an HTML error page, say) fails to decode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    pub dictionaries: Vec<Value>,
}
