//! Catalog Store: the persisted `dictionary` table.
//!
//! [`CatalogStore`] is the interface the repository engine talks to; the
//! default implementation is [`sqlite::SqliteCatalog`]. All trait methods use
//! `impl Future` in their signatures so no `async-trait` crate is needed.
//!
//! Every mutation is a single auto-committed statement. Flag setters report
//! [`RowUpdate::NotFound`] for an absent row instead of failing.

pub mod sqlite;

use std::future::Future;

use geodic_types::{Descriptor, DescriptorError, InternalId, Origin};

pub use sqlite::SqliteCatalog;

/// One row of the `dictionary` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: InternalId,
    pub name: String,
    /// Epoch seconds of the last install or import.
    pub updated: i64,
    /// `false` marks a soft-deleted entry; its files stay on disk.
    pub enabled: bool,
    pub force_prefix: bool,
    pub force_suffix: bool,
    /// Staged payload paths, relative to `extracted/<repository path>/`.
    pub json_file: String,
    pub csv_file: String,
    pub raw_json: String,
}

impl CatalogEntry {
    /// Rebuild the descriptor from the stored JSON without touching the network.
    ///
    /// The stored row is authoritative for id and name, so both are written
    /// back over whatever the JSON carried.
    pub fn descriptor(&self) -> Result<Descriptor, DescriptorError> {
        let mut descriptor = Descriptor::from_json_str(&self.raw_json)?;
        descriptor.internal_id = self.id;
        if descriptor.name() != self.name {
            descriptor.identifier = self.name.clone();
        }
        Ok(descriptor)
    }
}

/// Values written by an install or import.
#[derive(Debug, Clone)]
pub struct EntryWrite {
    pub id: InternalId,
    pub name: String,
    pub updated: i64,
    pub json_file: String,
    pub csv_file: String,
    pub raw_json: String,
}

/// Outcome of a single-row flag update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowUpdate {
    Applied,
    NotFound,
}

impl RowUpdate {
    fn from_rows_affected(rows: u64) -> Self {
        if rows == 0 { Self::NotFound } else { Self::Applied }
    }
}

pub trait CatalogStore: Send + Sync {
    fn get_by_id(
        &self,
        id: InternalId,
    ) -> impl Future<Output = Result<Option<CatalogEntry>, sqlx::Error>> + Send;

    /// Lookup by `creator/name`, disabled rows included.
    fn get_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<CatalogEntry>, sqlx::Error>> + Send;

    fn list_all(&self) -> impl Future<Output = Result<Vec<CatalogEntry>, sqlx::Error>> + Send;

    /// Enabled entries ordered by id ascending.
    fn list_enabled(&self) -> impl Future<Output = Result<Vec<CatalogEntry>, sqlx::Error>> + Send;

    /// Smallest id in the table, `None` when empty.
    fn min_id(&self) -> impl Future<Output = Result<Option<i64>, sqlx::Error>> + Send;

    /// Insert or refresh an entry, re-enabling it. Force flags of an existing
    /// row are left as they were.
    fn upsert(&self, entry: EntryWrite) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn set_enabled(
        &self,
        id: InternalId,
        enabled: bool,
    ) -> impl Future<Output = Result<RowUpdate, sqlx::Error>> + Send;

    fn set_force_prefix(
        &self,
        id: InternalId,
        on: bool,
    ) -> impl Future<Output = Result<RowUpdate, sqlx::Error>> + Send;

    fn set_force_suffix(
        &self,
        id: InternalId,
        on: bool,
    ) -> impl Future<Output = Result<RowUpdate, sqlx::Error>> + Send;
}

/// Next id for a brand-new local dictionary given the current minimum id.
///
/// Local ids count downwards from `-1`; a table holding only remote ids (or
/// nothing at all) starts the local sequence afresh.
pub fn next_local_id(min_id: Option<i64>) -> InternalId {
    let seq = match min_id {
        Some(min) if min < 0 => min.unsigned_abs() + 1,
        _ => 1,
    };
    InternalId::from_origin(Origin::Local(seq))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ids_count_down_from_minus_one() {
        assert_eq!(next_local_id(None).get(), -1);
        assert_eq!(next_local_id(Some(12)).get(), -1);
        assert_eq!(next_local_id(Some(-1)).get(), -2);
        assert_eq!(next_local_id(Some(-7)).get(), -8);
        // A stray zero row from an old repository must not yield id 0.
        assert_eq!(next_local_id(Some(0)).get(), -1);
    }

    #[test]
    fn entry_descriptor_prefers_row_identity() {
        let entry = CatalogEntry {
            id: InternalId::from_raw(-3),
            name: "local/mine".into(),
            updated: 0,
            enabled: true,
            force_prefix: false,
            force_suffix: false,
            json_file: "minus3/local-mine.json".into(),
            csv_file: "minus3/local-mine.csv".into(),
            raw_json: r#"{"identifier":"local/mine","internal_id":99,"title":"Mine"}"#.into(),
        };
        let d = entry.descriptor().unwrap();
        assert_eq!(d.internal_id.get(), -3);
        assert_eq!(d.name(), "local/mine");
        assert_eq!(d.title, "Mine");
    }
}
