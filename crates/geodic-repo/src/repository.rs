//! Merge/status engine: one name-keyed view over the remote manifest and the
//! local catalog, plus the install/delete/force-flag mutations.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use geodic_fetch::{
    Downloader, ExtractedArchive, FetchConfig, ManifestFetcher, RemoteStatus, Transport,
    extract_archive, rewrite_archive_url,
};
use geodic_types::{Descriptor, InternalId, Origin};
use strum::Display;
use tracing::{debug, info, warn};

use crate::config::{RepoConfig, Workspace};
use crate::error::RepoError;
use crate::filter::{DictionaryFilter, NamePattern};
use crate::import::{CsvSource, ImportSubject, assign_geonlp_ids, payload_stem};
use crate::staging::AffixPolicy;
use crate::store::{CatalogEntry, CatalogStore, EntryWrite, RowUpdate, SqliteCatalog, next_local_id};

/// Seconds an install may precede the published `modified` stamp and still
/// count as current.
const FRESHNESS_TOLERANCE_SECS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DictionaryStatus {
    #[strum(serialize = "not installed")]
    NotInstalled,
    #[strum(serialize = "need update")]
    NeedUpdate,
    #[strum(serialize = "updated")]
    Updated,
    #[strum(serialize = "local")]
    Local,
}

/// Epoch seconds of a `modified` stamp, read as local wall-clock time.
pub fn modified_epoch(at: NaiveDateTime) -> i64 {
    Local
        .from_local_datetime(&at)
        .earliest()
        .map(|t| t.timestamp())
        .unwrap_or_else(|| at.and_utc().timestamp())
}

/// Status of `descriptor` given its catalog row (if any).
pub fn status_for(descriptor: &Descriptor, entry: Option<&CatalogEntry>) -> DictionaryStatus {
    if let Origin::Local(_) = descriptor.origin() {
        return DictionaryStatus::Local;
    }
    let Some(entry) = entry.filter(|e| e.enabled) else {
        return DictionaryStatus::NotInstalled;
    };
    match descriptor.modified_at() {
        None => DictionaryStatus::NeedUpdate,
        Some(modified) if entry.updated > modified_epoch(modified) + FRESHNESS_TOLERANCE_SECS => {
            DictionaryStatus::Updated
        }
        Some(_) => DictionaryStatus::NeedUpdate,
    }
}

/// Merged, name-keyed view returned by [`Repository::list_all`].
#[derive(Debug, Clone)]
pub struct DictionaryView {
    pub dictionaries: BTreeMap<String, Descriptor>,
    /// How the remote half was obtained; `Unavailable` means local entries only.
    pub remote: RemoteStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed {
        id: InternalId,
        json_file: String,
        csv_file: String,
    },
    /// Local dictionaries have nothing to download.
    LocalSkipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Installed(InstallOutcome),
    AlreadyCurrent(DictionaryStatus),
}

/// Result of a single-entry mutation that requires a catalog row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    NotRegistered,
    /// The row exists but is soft-deleted.
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Affix {
    #[strum(serialize = "prefix")]
    Prefix,
    #[strum(serialize = "suffix")]
    Suffix,
}

/// Per-dictionary result inside a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Installed,
    AlreadyCurrent,
    LocalSkipped,
    Removed,
    NotRegistered,
    Failed(String),
}

/// Outcome of `sync`, `add` and pattern `delete`.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub items: Vec<(String, ItemOutcome)>,
    /// Patterns that matched no dictionary.
    pub unmatched: Vec<String>,
    pub remote: RemoteStatus,
}

impl BatchReport {
    fn new(remote: RemoteStatus) -> Self {
        Self {
            items: Vec::new(),
            unmatched: Vec::new(),
            remote,
        }
    }

    pub fn failures(&self) -> usize {
        self.items
            .iter()
            .filter(|(_, o)| matches!(o, ItemOutcome::Failed(_)))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub name: String,
    pub id: InternalId,
    pub json_file: String,
    pub csv_file: String,
    pub rows: usize,
    pub kept_ids: usize,
    pub generated_ids: usize,
}

pub struct Repository<S, T> {
    workspace: Workspace,
    store: S,
    fetcher: ManifestFetcher<T>,
}

impl Repository<SqliteCatalog, Downloader> {
    /// Repository over `repository.sq3` in `workspace`, fetching over HTTP.
    pub async fn open(config: &RepoConfig, workspace: Workspace) -> Result<Self, RepoError> {
        let store = SqliteCatalog::open(workspace.catalog_path()).await?;
        let transport = Downloader::new(
            config.retry_count,
            config.retry_delay_secs,
            config.proxy.clone(),
        );
        let fetcher = ManifestFetcher::new(fetch_config(config, &workspace), transport);
        Ok(Self::new(workspace, store, fetcher))
    }
}

pub fn fetch_config(config: &RepoConfig, workspace: &Workspace) -> FetchConfig {
    FetchConfig {
        server_url: config.server_url.clone(),
        cache_path: workspace.manifest_cache_path(),
        cache_ttl: config.cache_ttl,
    }
}

impl<S: CatalogStore, T: Transport> Repository<S, T> {
    pub fn new(workspace: Workspace, store: S, fetcher: ManifestFetcher<T>) -> Self {
        Self {
            workspace,
            store,
            fetcher,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn fetcher(&self) -> &ManifestFetcher<T> {
        &self.fetcher
    }

    fn server_url(&self) -> &str {
        &self.fetcher.config().server_url
    }

    /// Remote manifest overlaid with every enabled catalog entry.
    pub async fn list_all(&self) -> Result<DictionaryView, RepoError> {
        let remote = self.fetcher.fetch_catalog().await;
        let mut dictionaries = remote.dictionaries;
        for entry in self.store.list_enabled().await? {
            match entry.descriptor() {
                Ok(descriptor) => {
                    dictionaries.insert(entry.name.clone(), descriptor);
                }
                Err(e) => {
                    warn!(name = %entry.name, id = entry.id.get(), error = %e, "stored descriptor is unreadable, skipping");
                }
            }
        }
        Ok(DictionaryView {
            dictionaries,
            remote: remote.status,
        })
    }

    pub async fn status(&self, descriptor: &Descriptor) -> Result<DictionaryStatus, RepoError> {
        if let Origin::Local(_) = descriptor.origin() {
            return Ok(DictionaryStatus::Local);
        }
        let entry = self.store.get_by_id(descriptor.internal_id).await?;
        let status = status_for(descriptor, entry.as_ref());
        if status == DictionaryStatus::NeedUpdate && descriptor.modified_at().is_none() {
            warn!(name = %descriptor.name(), "dictionary has no modified timestamp; treating as stale");
        }
        Ok(status)
    }

    /// Download, extract and register a remote dictionary.
    ///
    /// The archive is unpacked next to the staging directory and checked
    /// before anything visible changes. The previous staging directory and
    /// `<id>.zip` stay in place until the catalog row is written; if that
    /// write fails they are restored, so a failed install leaves the files
    /// and the row as they were.
    pub async fn install(&self, descriptor: &Descriptor) -> Result<InstallOutcome, RepoError> {
        let name = descriptor.name();
        let id = match descriptor.origin() {
            Origin::Remote(_) => descriptor.internal_id,
            Origin::Local(_) => {
                warn!(%name, "local dictionary, nothing to download");
                return Ok(InstallOutcome::LocalSkipped);
            }
        };
        let url = rewrite_archive_url(&descriptor.url, self.server_url());
        info!(%name, id = id.get(), %url, "downloading dictionary archive");
        let archive = self.fetcher.transport().get(&url).await?;

        let repo_path = descriptor.repository_path();
        let extracted_dir = self.workspace.extracted_dir();
        let staging = self.workspace.staging_dir(&repo_path);
        let partial = extracted_dir.join(format!(".{repo_path}.partial"));
        let previous = extracted_dir.join(format!(".{repo_path}.previous"));
        let zip_path = self.workspace.zip_dir().join(format!("{id}.zip"));
        let zip_partial = self.workspace.zip_dir().join(format!("{id}.zip.partial"));
        remove_dir_if_exists(&partial)?;

        let (extracted, raw_json) = match unpack(descriptor, &archive, &partial) {
            Ok(unpacked) => unpacked,
            Err(e) => {
                let _ = fs::remove_dir_all(&partial);
                return Err(e);
            }
        };
        if let Err(e) = fs::write(&zip_partial, &archive) {
            let _ = fs::remove_dir_all(&partial);
            return Err(e.into());
        }

        remove_dir_if_exists(&previous)?;
        let had_previous = staging.exists();
        if had_previous {
            if let Err(e) = fs::rename(&staging, &previous) {
                let _ = fs::remove_dir_all(&partial);
                let _ = fs::remove_file(&zip_partial);
                return Err(e.into());
            }
        }
        if let Err(e) = fs::rename(&partial, &staging) {
            rollback(&staging, &previous, had_previous, &zip_partial);
            let _ = fs::remove_dir_all(&partial);
            return Err(e.into());
        }
        debug!(%name, dir = %staging.display(), "archive extracted");

        let written = self
            .store
            .upsert(EntryWrite {
                id,
                name: name.clone(),
                updated: Utc::now().timestamp(),
                json_file: extracted.json_member.clone(),
                csv_file: extracted.csv_member.clone(),
                raw_json,
            })
            .await;
        if let Err(e) = written {
            warn!(%name, error = %e, "catalog write failed, restoring previous files");
            rollback(&staging, &previous, had_previous, &zip_partial);
            return Err(e.into());
        }

        fs::rename(&zip_partial, &zip_path)?;
        debug!(path = %zip_path.display(), "saved archive");
        remove_dir_if_exists(&previous)?;
        info!(%name, id = id.get(), "dictionary registered");

        Ok(InstallOutcome::Installed {
            id,
            json_file: extracted.json_member,
            csv_file: extracted.csv_member,
        })
    }

    /// Install only when the published copy is newer than the local one.
    pub async fn update(&self, descriptor: &Descriptor) -> Result<UpdateOutcome, RepoError> {
        let status = self.status(descriptor).await?;
        if status != DictionaryStatus::NeedUpdate {
            info!(name = %descriptor.name(), %status, "already up to date");
            return Ok(UpdateOutcome::AlreadyCurrent(status));
        }
        Ok(UpdateOutcome::Installed(self.install(descriptor).await?))
    }

    /// Soft-delete: the row and its files stay, the entry leaves active views.
    pub async fn delete(&self, descriptor: &Descriptor) -> Result<MutationOutcome, RepoError> {
        let name = descriptor.name();
        match self.store.set_enabled(descriptor.internal_id, false).await? {
            RowUpdate::Applied => {
                info!(%name, "dictionary removed");
                Ok(MutationOutcome::Applied)
            }
            RowUpdate::NotFound => {
                warn!(%name, "dictionary is not registered");
                Ok(MutationOutcome::NotRegistered)
            }
        }
    }

    /// Set a force flag on an enabled entry; applied at the next compile.
    pub async fn set_force(
        &self,
        descriptor: &Descriptor,
        affix: Affix,
        on: bool,
    ) -> Result<MutationOutcome, RepoError> {
        let name = descriptor.name();
        let Some(entry) = self.store.get_by_id(descriptor.internal_id).await? else {
            warn!(%name, "dictionary is not registered");
            return Ok(MutationOutcome::NotRegistered);
        };
        if !entry.enabled {
            warn!(%name, "dictionary has been deleted");
            return Ok(MutationOutcome::Disabled);
        }
        let updated = match affix {
            Affix::Prefix => self.store.set_force_prefix(entry.id, on).await?,
            Affix::Suffix => self.store.set_force_suffix(entry.id, on).await?,
        };
        if updated == RowUpdate::NotFound {
            return Ok(MutationOutcome::NotRegistered);
        }
        info!(%name, %affix, forced = on, "affix policy changed; takes effect at the next compile");
        Ok(MutationOutcome::Applied)
    }

    pub async fn set_force_prefix(
        &self,
        descriptor: &Descriptor,
        on: bool,
    ) -> Result<MutationOutcome, RepoError> {
        self.set_force(descriptor, Affix::Prefix, on).await
    }

    pub async fn set_force_suffix(
        &self,
        descriptor: &Descriptor,
        on: bool,
    ) -> Result<MutationOutcome, RepoError> {
        self.set_force(descriptor, Affix::Suffix, on).await
    }

    /// Force flags of an enabled entry; `None` when not installed.
    pub async fn forced_affixes(
        &self,
        descriptor: &Descriptor,
    ) -> Result<Option<AffixPolicy>, RepoError> {
        Ok(self
            .store
            .get_by_id(descriptor.internal_id)
            .await?
            .filter(|e| e.enabled)
            .map(|e| AffixPolicy {
                force_prefix: e.force_prefix,
                force_suffix: e.force_suffix,
            }))
    }

    /// Refresh every stale dictionary matching `filter`.
    pub async fn sync(&self, filter: &DictionaryFilter) -> Result<BatchReport, RepoError> {
        let view = self.list_all().await?;
        let mut report = BatchReport::new(view.remote);
        for (name, descriptor) in &view.dictionaries {
            if !filter.matches(descriptor) {
                continue;
            }
            match self.status(descriptor).await? {
                DictionaryStatus::NeedUpdate | DictionaryStatus::Updated => {}
                DictionaryStatus::NotInstalled | DictionaryStatus::Local => continue,
            }
            let outcome = match self.update(descriptor).await {
                Ok(UpdateOutcome::Installed(_)) => ItemOutcome::Installed,
                Ok(UpdateOutcome::AlreadyCurrent(_)) => ItemOutcome::AlreadyCurrent,
                Err(e) => {
                    warn!(%name, error = %e, "update failed");
                    ItemOutcome::Failed(e.to_string())
                }
            };
            report.items.push((name.clone(), outcome));
        }
        Ok(report)
    }

    /// Install every dictionary matched by `patterns`.
    pub async fn add(&self, patterns: &[String]) -> Result<BatchReport, RepoError> {
        let (view, matched, report) = self.match_patterns(patterns).await?;
        let mut report = report;
        for name in matched {
            let descriptor = &view.dictionaries[&name];
            let outcome = match self.install(descriptor).await {
                Ok(InstallOutcome::Installed { .. }) => ItemOutcome::Installed,
                Ok(InstallOutcome::LocalSkipped) => ItemOutcome::LocalSkipped,
                Err(e) => {
                    warn!(%name, error = %e, "install failed");
                    ItemOutcome::Failed(e.to_string())
                }
            };
            report.items.push((name, outcome));
        }
        Ok(report)
    }

    /// Soft-delete every dictionary matched by `patterns`.
    pub async fn delete_matching(&self, patterns: &[String]) -> Result<BatchReport, RepoError> {
        let (view, matched, report) = self.match_patterns(patterns).await?;
        let mut report = report;
        for name in matched {
            let descriptor = &view.dictionaries[&name];
            let outcome = match self.delete(descriptor).await {
                Ok(MutationOutcome::Applied) => ItemOutcome::Removed,
                Ok(_) => ItemOutcome::NotRegistered,
                Err(e) => {
                    warn!(%name, error = %e, "delete failed");
                    ItemOutcome::Failed(e.to_string())
                }
            };
            report.items.push((name, outcome));
        }
        Ok(report)
    }

    /// Resolve patterns against the merged view. Every dictionary appears at
    /// most once; patterns that match nothing are warned about and reported.
    async fn match_patterns(
        &self,
        patterns: &[String],
    ) -> Result<(DictionaryView, Vec<String>, BatchReport), RepoError> {
        let parsed = patterns
            .iter()
            .map(|p| NamePattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;
        let view = self.list_all().await?;
        let mut report = BatchReport::new(view.remote.clone());

        let mut hits = vec![false; parsed.len()];
        let mut matched = Vec::new();
        for name in view.dictionaries.keys() {
            let mut any = false;
            for (i, pattern) in parsed.iter().enumerate() {
                if pattern.matches(name) {
                    hits[i] = true;
                    any = true;
                }
            }
            if any {
                matched.push(name.clone());
            }
        }
        for (pattern, hit) in patterns.iter().zip(hits) {
            if !hit {
                warn!(%pattern, "dictionary not found");
                report.unmatched.push(pattern.clone());
            }
        }
        Ok((view, matched, report))
    }

    /// Allocate the catalog id for a local import under `name`.
    ///
    /// A local row already holding the name keeps its id. Otherwise a name
    /// published by the remote catalog is refused even when that dictionary
    /// is not installed. Without a remote view only the catalog rows are
    /// checked.
    async fn local_id_for(&self, name: &str) -> Result<InternalId, RepoError> {
        if let Some(existing) = self.store.get_by_name(name).await? {
            match existing.id.origin() {
                Origin::Remote(_) => {
                    return Err(RepoError::RemoteCollision {
                        name: name.to_owned(),
                        id: existing.id.get(),
                    });
                }
                Origin::Local(seq) if seq > 0 => return Ok(existing.id),
                Origin::Local(_) => {}
            }
        }
        let remote = self.fetcher.fetch_catalog().await;
        if !remote.is_available() {
            debug!(%name, "no remote view, checking local catalog only");
        }
        if let Some(published) = remote.dictionaries.get(name).filter(|d| d.is_remote()) {
            return Err(RepoError::RemoteCollision {
                name: name.to_owned(),
                id: published.internal_id.get(),
            });
        }
        Ok(next_local_id(self.store.min_id().await?))
    }

    async fn read_csv(&self, source: &CsvSource) -> Result<Vec<u8>, RepoError> {
        match source {
            CsvSource::File(path) => Ok(fs::read(path)?),
            CsvSource::Url(url) => {
                info!(%url, "downloading CSV");
                Ok(self.fetcher.transport().get(url).await?.to_vec())
            }
        }
    }

    /// Create or overwrite a local dictionary from a CSV payload.
    ///
    /// `code_or_json` is either a dictionary code (the name becomes
    /// `local/<code>`) or a JSON descriptor file. Validation of the code, the
    /// id and the CSV happens before anything is written.
    pub async fn import(
        &self,
        code_or_json: &str,
        csv_source: &str,
    ) -> Result<ImportOutcome, RepoError> {
        let subject = ImportSubject::resolve(code_or_json)?;
        let name = subject.name();
        let id = self.local_id_for(&name).await?;

        let mut descriptor = match subject {
            ImportSubject::Descriptor(d) => *d,
            ImportSubject::Code(code) => Descriptor::new_local(name.clone(), id, code),
        };
        descriptor.internal_id = id;
        descriptor.set_modified(Local::now().naive_local());

        let source = CsvSource::parse(csv_source);
        let raw_csv = self.read_csv(&source).await?;
        let (csv_bytes, ids) = {
            let mut rng = rand::thread_rng();
            assign_geonlp_ids(
                &raw_csv,
                &descriptor.geonlp_id_prefix(),
                &source.label(),
                &mut rng,
            )?
        };
        let raw_json = descriptor.to_json_string()?;

        let dir = self.workspace.staging_dir(&descriptor.repository_path());
        fs::create_dir_all(&dir)?;
        let stem = payload_stem(&name);
        let json_file = format!("{stem}.json");
        let csv_file = format!("{stem}.csv");
        fs::write(dir.join(&json_file), &raw_json)?;
        fs::write(dir.join(&csv_file), &csv_bytes)?;

        self.store
            .upsert(EntryWrite {
                id,
                name: name.clone(),
                updated: Utc::now().timestamp(),
                json_file: json_file.clone(),
                csv_file: csv_file.clone(),
                raw_json,
            })
            .await?;
        info!(%name, id = id.get(), rows = ids.rows, "local dictionary imported");

        Ok(ImportOutcome {
            name,
            id,
            json_file,
            csv_file,
            rows: ids.rows,
            kept_ids: ids.kept,
            generated_ids: ids.generated,
        })
    }

    /// Staged json and csv paths of a catalog entry.
    pub fn payload_paths(&self, entry: &CatalogEntry) -> (PathBuf, PathBuf) {
        let dir = self.workspace.staging_dir(&entry.id.repository_path());
        (dir.join(&entry.json_file), dir.join(&entry.csv_file))
    }

    /// Delete the manifest cache so the next listing refetches.
    pub fn clear_cache(&self) -> Result<bool, RepoError> {
        let removed = self.fetcher.clear_cache()?;
        if removed {
            info!("manifest cache cleared");
        }
        Ok(removed)
    }
}

/// Extract `archive` into `dir` and read its descriptor. An unreadable
/// descriptor falls back to the manifest entry.
fn unpack(
    descriptor: &Descriptor,
    archive: &[u8],
    dir: &Path,
) -> Result<(ExtractedArchive, String), RepoError> {
    let extracted = extract_archive(archive, dir)?;
    let raw_json = fs::read_to_string(dir.join(&extracted.json_member))?;
    if Descriptor::from_json_str(&raw_json).is_ok() {
        return Ok((extracted, raw_json));
    }
    warn!(name = %descriptor.name(), member = %extracted.json_member, "archive descriptor is not valid JSON, storing manifest entry instead");
    Ok((extracted, descriptor.to_json_string()?))
}

/// Put the previous staging directory back and drop the pending archive.
fn rollback(staging: &Path, previous: &Path, had_previous: bool, zip_partial: &Path) {
    let _ = fs::remove_dir_all(staging);
    if had_previous {
        if let Err(e) = fs::rename(previous, staging) {
            warn!(dir = %staging.display(), error = %e, "could not restore previous dictionary files");
        }
    }
    let _ = fs::remove_file(zip_partial);
}

fn remove_dir_if_exists(dir: &Path) -> Result<(), RepoError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodic_fetch::MemoryTransport;
    use geodic_types::TIMESTAMP_FORMAT;
    use tracing_test::traced_test;

    fn remote(id: i64, modified: Option<&str>) -> Descriptor {
        let mut d = Descriptor::new_local("geonlp/world_country", InternalId::from_raw(id), "World");
        d.creator = "geonlp".into();
        d.modified = modified.map(str::to_owned);
        d
    }

    fn entry(id: i64, updated: i64, enabled: bool) -> CatalogEntry {
        CatalogEntry {
            id: InternalId::from_raw(id),
            name: "geonlp/world_country".into(),
            updated,
            enabled,
            force_prefix: false,
            force_suffix: false,
            json_file: "a.json".into(),
            csv_file: "a.csv".into(),
            raw_json: "{}".into(),
        }
    }

    fn epoch(s: &str) -> i64 {
        modified_epoch(NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap())
    }

    #[test]
    fn local_ids_are_always_local() {
        let d = remote(-4, Some("2024-01-01 00:00:00"));
        assert_eq!(status_for(&d, None), DictionaryStatus::Local);
        assert_eq!(status_for(&d, Some(&entry(-4, 0, true))), DictionaryStatus::Local);
    }

    #[test]
    fn absent_or_disabled_entry_is_not_installed() {
        let d = remote(7, Some("2024-01-01 00:00:00"));
        assert_eq!(status_for(&d, None), DictionaryStatus::NotInstalled);
        assert_eq!(
            status_for(&d, Some(&entry(7, i64::MAX, false))),
            DictionaryStatus::NotInstalled
        );
    }

    #[test]
    fn freshness_uses_five_second_tolerance() {
        let d = remote(7, Some("2024-01-01 00:00:00"));
        let modified = epoch("2024-01-01 00:00:00");
        assert_eq!(
            status_for(&d, Some(&entry(7, modified + 5, true))),
            DictionaryStatus::NeedUpdate
        );
        assert_eq!(
            status_for(&d, Some(&entry(7, modified + 6, true))),
            DictionaryStatus::Updated
        );
    }

    #[test]
    fn missing_or_malformed_modified_needs_update() {
        let e = entry(7, i64::MAX, true);
        assert_eq!(status_for(&remote(7, None), Some(&e)), DictionaryStatus::NeedUpdate);
        assert_eq!(
            status_for(&remote(7, Some("yesterday")), Some(&e)),
            DictionaryStatus::NeedUpdate
        );
    }

    async fn memory_repo(dir: &std::path::Path) -> Repository<SqliteCatalog, MemoryTransport> {
        let workspace = Workspace::open(dir).unwrap();
        let fetcher = ManifestFetcher::new(
            FetchConfig {
                server_url: "http://geonlp.test/api".into(),
                cache_path: workspace.manifest_cache_path(),
                cache_ttl: std::time::Duration::ZERO,
            },
            MemoryTransport::new(),
        );
        Repository::new(workspace, SqliteCatalog::in_memory().await.unwrap(), fetcher)
    }

    #[tokio::test]
    #[traced_test]
    async fn delete_unregistered_warns_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let repo = memory_repo(dir.path()).await;

        let outcome = repo.delete(&remote(7, Some("2024-01-01 00:00:00"))).await.unwrap();
        assert_eq!(outcome, MutationOutcome::NotRegistered);
        assert!(logs_contain("dictionary is not registered"));
        assert!(repo.store().list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn unmatched_pattern_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let repo = memory_repo(dir.path()).await;

        let report = repo.add(&["geonlp/nowhere".to_owned()]).await.unwrap();
        assert!(report.items.is_empty());
        assert_eq!(report.unmatched, vec!["geonlp/nowhere".to_owned()]);
        assert!(matches!(report.remote, RemoteStatus::Unavailable { .. }));
        assert!(logs_contain("dictionary not found"));
    }

    #[tokio::test]
    async fn force_flags_need_an_enabled_entry() {
        let dir = tempfile::tempdir().unwrap();
        let repo = memory_repo(dir.path()).await;
        let d = remote(7, Some("2024-01-01 00:00:00"));

        assert_eq!(
            repo.set_force_suffix(&d, true).await.unwrap(),
            MutationOutcome::NotRegistered
        );
        repo.store()
            .upsert(EntryWrite {
                id: d.internal_id,
                name: d.name(),
                updated: 1,
                json_file: "a.json".into(),
                csv_file: "a.csv".into(),
                raw_json: d.to_json_string().unwrap(),
            })
            .await
            .unwrap();
        assert_eq!(repo.set_force_suffix(&d, true).await.unwrap(), MutationOutcome::Applied);
        assert_eq!(
            repo.forced_affixes(&d).await.unwrap(),
            Some(AffixPolicy {
                force_prefix: false,
                force_suffix: true
            })
        );

        repo.delete(&d).await.unwrap();
        assert_eq!(
            repo.set_force_prefix(&d, true).await.unwrap(),
            MutationOutcome::Disabled
        );
        assert_eq!(repo.forced_affixes(&d).await.unwrap(), None);
    }

    #[test]
    fn status_names() {
        assert_eq!(DictionaryStatus::NeedUpdate.to_string(), "need update");
        assert_eq!(DictionaryStatus::NotInstalled.to_string(), "not installed");
    }
}
