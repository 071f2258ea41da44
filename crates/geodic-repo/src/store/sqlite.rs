//! SQLite implementation of [`CatalogStore`].
//!
//! The runtime-checked `sqlx::query` form is used so no `DATABASE_URL` is
//! needed at compile time. The table layout is shared with repositories
//! created by earlier releases of the tool, so schema changes are applied in
//! place by [`SqliteCatalog::ensure_schema`] rather than through migration
//! files.

use std::path::Path;
use std::str::FromStr;

use geodic_types::InternalId;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{debug, info, warn};

use super::{CatalogEntry, CatalogStore, EntryWrite, RowUpdate};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS dictionary (\
     id INTEGER PRIMARY KEY, name TEXT, updated INTEGER, enabled INTEGER, \
     force_prefix INTEGER, force_suffix INTEGER, \
     jsonfile TEXT, csvfile TEXT, json TEXT)";

const SELECT_COLUMNS: &str =
    "SELECT id, name, updated, enabled, force_prefix, force_suffix, jsonfile, csvfile, json FROM dictionary";

type EntryRow = (
    i64,
    Option<String>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn entry_from_row(row: EntryRow) -> CatalogEntry {
    let (id, name, updated, enabled, force_prefix, force_suffix, json_file, csv_file, raw_json) =
        row;
    CatalogEntry {
        id: InternalId::from_raw(id),
        name: name.unwrap_or_default(),
        updated: updated.unwrap_or(0),
        enabled: enabled.unwrap_or(0) != 0,
        force_prefix: force_prefix.unwrap_or(0) != 0,
        force_suffix: force_suffix.unwrap_or(0) != 0,
        json_file: json_file.unwrap_or_default(),
        csv_file: csv_file.unwrap_or_default(),
        raw_json: raw_json.unwrap_or_else(|| "{}".to_owned()),
    }
}

/// SQLite-backed catalog stored in `repository.sq3`.
#[derive(Clone, Debug)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    /// Open (or create) the catalog file at `path` and bring its schema up to date.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        Self::connect_with(options).await
    }

    /// Private in-memory catalog, used by tests.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        Self::connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?).await
    }

    async fn connect_with(options: SqliteConnectOptions) -> Result<Self, sqlx::Error> {
        // A single long-lived connection: the tool runs one command at a time
        // and an in-memory database lives only as long as its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        if store.ensure_schema().await? {
            info!("catalog table migrated to include force_prefix/force_suffix");
        }
        Ok(store)
    }

    /// Create the table, or rebuild a pre-force-flag table in place.
    ///
    /// Returns `true` when an existing table had to be migrated.
    pub async fn ensure_schema(&self) -> Result<bool, sqlx::Error> {
        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('dictionary')")
                .fetch_all(&self.pool)
                .await?;

        let mut migrated = false;
        if columns.is_empty() {
            debug!("creating catalog table");
            sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        } else {
            let has = |c: &str| columns.iter().any(|name| name.eq_ignore_ascii_case(c));
            if !has("force_prefix") || !has("force_suffix") {
                let carry = |c: &str| {
                    if has(c) {
                        format!("COALESCE({c}, 0)")
                    } else {
                        "0".to_owned()
                    }
                };
                let mut tx = self.pool.begin().await?;
                sqlx::query("DROP TABLE IF EXISTS dictionary_migrating")
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(&CREATE_TABLE.replace("dictionary (", "dictionary_migrating ("))
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(&format!(
                    "INSERT INTO dictionary_migrating \
                     (id, name, updated, enabled, force_prefix, force_suffix, jsonfile, csvfile, json) \
                     SELECT id, name, updated, enabled, {}, {}, jsonfile, csvfile, json FROM dictionary",
                    carry("force_prefix"),
                    carry("force_suffix"),
                ))
                .execute(&mut *tx)
                .await?;
                sqlx::query("DROP TABLE dictionary").execute(&mut *tx).await?;
                sqlx::query("ALTER TABLE dictionary_migrating RENAME TO dictionary")
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                migrated = true;
            }
        }

        // Older repositories may already hold duplicate names; they keep
        // working, only without the index.
        if let Err(e) =
            sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS dictionary_name ON dictionary(name)")
                .execute(&self.pool)
                .await
        {
            warn!(error = %e, "catalog has duplicate dictionary names; unique index not created");
        }

        Ok(migrated)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl CatalogStore for SqliteCatalog {
    async fn get_by_id(&self, id: InternalId) -> Result<Option<CatalogEntry>, sqlx::Error> {
        let row: Option<EntryRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(entry_from_row))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<CatalogEntry>, sqlx::Error> {
        let row: Option<EntryRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE name = ?1 ORDER BY id LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(entry_from_row))
    }

    async fn list_all(&self) -> Result<Vec<CatalogEntry>, sqlx::Error> {
        let rows: Vec<EntryRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(entry_from_row).collect())
    }

    async fn list_enabled(&self) -> Result<Vec<CatalogEntry>, sqlx::Error> {
        let rows: Vec<EntryRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE enabled != 0 ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(entry_from_row).collect())
    }

    async fn min_id(&self) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT MIN(id) FROM dictionary")
            .fetch_one(&self.pool)
            .await
    }

    async fn upsert(&self, entry: EntryWrite) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO dictionary \
             (id, name, updated, enabled, force_prefix, force_suffix, jsonfile, csvfile, json) \
             VALUES (?1, ?2, ?3, 1, 0, 0, ?4, ?5, ?6) \
             ON CONFLICT(id) DO UPDATE SET \
             name = excluded.name, updated = excluded.updated, enabled = 1, \
             jsonfile = excluded.jsonfile, csvfile = excluded.csvfile, json = excluded.json",
        )
        .bind(entry.id.get())
        .bind(&entry.name)
        .bind(entry.updated)
        .bind(&entry.json_file)
        .bind(&entry.csv_file)
        .bind(&entry.raw_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_enabled(&self, id: InternalId, enabled: bool) -> Result<RowUpdate, sqlx::Error> {
        let result = sqlx::query("UPDATE dictionary SET enabled = ?1 WHERE id = ?2")
            .bind(i64::from(enabled))
            .bind(id.get())
            .execute(&self.pool)
            .await?;
        Ok(RowUpdate::from_rows_affected(result.rows_affected()))
    }

    async fn set_force_prefix(&self, id: InternalId, on: bool) -> Result<RowUpdate, sqlx::Error> {
        let result = sqlx::query("UPDATE dictionary SET force_prefix = ?1 WHERE id = ?2")
            .bind(i64::from(on))
            .bind(id.get())
            .execute(&self.pool)
            .await?;
        Ok(RowUpdate::from_rows_affected(result.rows_affected()))
    }

    async fn set_force_suffix(&self, id: InternalId, on: bool) -> Result<RowUpdate, sqlx::Error> {
        let result = sqlx::query("UPDATE dictionary SET force_suffix = ?1 WHERE id = ?2")
            .bind(i64::from(on))
            .bind(id.get())
            .execute(&self.pool)
            .await?;
        Ok(RowUpdate::from_rows_affected(result.rows_affected()))
    }
}
