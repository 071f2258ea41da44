//! Fail-fast compile pipeline: reset the scratch database, import every
//! selected dictionary, then run the dictionary compiler once.

use std::path::PathBuf;

use geodic_fetch::Transport;
use geodic_types::InternalId;
use tracing::{error, info, warn};

use crate::error::{BuildError, RepoError};
use crate::filter::DictionaryFilter;
use crate::repository::{DictionaryStatus, Repository};
use crate::staging::{AffixPolicy, StagedCsv};
use crate::store::CatalogStore;
use crate::toolchain::{ToolOutput, Toolchain};

/// One dictionary scheduled for import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildItem {
    pub name: String,
    pub title: String,
    pub id: InternalId,
    pub json: PathBuf,
    pub csv: PathBuf,
    pub policy: AffixPolicy,
}

#[derive(Debug, Clone)]
pub struct CompileReport {
    /// Names imported into the scratch database, in build order.
    pub imported: Vec<String>,
    /// Names skipped because their staged files are missing.
    pub skipped: Vec<String>,
    pub compiler_output: ToolOutput,
}

impl<S: CatalogStore, T: Transport> Repository<S, T> {
    /// Dictionaries a compile would include: everything in the merged view
    /// that matches `filter` and is installed or local, ordered by id.
    pub async fn build_selection(
        &self,
        filter: &DictionaryFilter,
    ) -> Result<Vec<BuildItem>, RepoError> {
        let view = self.list_all().await?;
        let mut items = Vec::new();
        for (name, descriptor) in &view.dictionaries {
            if !filter.matches(descriptor) {
                continue;
            }
            if self.status(descriptor).await? == DictionaryStatus::NotInstalled {
                continue;
            }
            let entry = match self.store().get_by_id(descriptor.internal_id).await? {
                Some(entry) if entry.enabled => entry,
                _ => {
                    warn!(%name, "dictionary has no local payload, skipping");
                    continue;
                }
            };
            let (json, csv) = self.payload_paths(&entry);
            items.push(BuildItem {
                name: name.clone(),
                title: descriptor.title.clone(),
                id: entry.id,
                json,
                csv,
                policy: AffixPolicy {
                    force_prefix: entry.force_prefix,
                    force_suffix: entry.force_suffix,
                },
            });
        }
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    /// Select with `filter` and run the pipeline.
    pub async fn compile<C: Toolchain>(
        &self,
        filter: &DictionaryFilter,
        toolchain: &C,
    ) -> Result<CompileReport, RepoError> {
        let items = self.build_selection(filter).await?;
        run_pipeline(toolchain, &items).await
    }
}

/// Build the binary dictionary from `items`.
///
/// An empty selection is rejected before the scratch database is touched.
/// The first importer failure aborts the run; after any failure following
/// the reset the scratch database is deleted so the next run starts clean.
pub async fn run_pipeline<C: Toolchain>(
    toolchain: &C,
    items: &[BuildItem],
) -> Result<CompileReport, RepoError> {
    if items.is_empty() {
        return Err(RepoError::NothingToCompile);
    }
    toolchain.preflight().await?;
    toolchain.prepare_profiles().await?;

    let result = match toolchain.reset_scratch().await {
        Ok(()) => import_and_compile(toolchain, items).await,
        Err(e) => Err(e.into()),
    };
    if let Err(e) = &result {
        error!(error = %e, "compile aborted, discarding scratch database");
        if let Err(discard) = toolchain.discard_scratch() {
            warn!(error = %discard, "failed to delete scratch database");
        }
    }
    result
}

async fn import_and_compile<C: Toolchain>(
    toolchain: &C,
    items: &[BuildItem],
) -> Result<CompileReport, RepoError> {
    let mut imported = Vec::new();
    let mut skipped = Vec::new();

    for item in items {
        if !item.json.is_file() {
            warn!(name = %item.name, path = %item.json.display(), "JSON payload missing, skipping");
            skipped.push(item.name.clone());
            continue;
        }
        if !item.csv.is_file() {
            warn!(name = %item.name, path = %item.csv.display(), "CSV payload missing, skipping");
            skipped.push(item.name.clone());
            continue;
        }

        let staged = StagedCsv::prepare(&item.csv, item.policy)?;
        info!(name = %item.name, title = %item.title, "importing dictionary");
        let output = toolchain.import(&item.json, staged.path()).await;
        drop(staged);
        let output = output?;
        if !output.success() {
            return Err(BuildError::ImportFailed {
                dictionary: item.name.clone(),
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            }
            .into());
        }
        imported.push(item.name.clone());
    }

    info!(dictionaries = imported.len(), "compiling binary dictionary");
    let compiler_output = toolchain.compile().await?;
    if !compiler_output.success() {
        return Err(BuildError::CompileFailed {
            status: compiler_output.status,
            stdout: compiler_output.stdout,
            stderr: compiler_output.stderr,
        }
        .into());
    }
    info!("compile finished");

    Ok(CompileReport {
        imported,
        skipped,
        compiler_output,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::toolchain::InstallFile;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;

    /// Records every call; optionally fails the import of one CSV file name.
    #[derive(Default)]
    pub(crate) struct FakeToolchain {
        pub calls: Mutex<Vec<String>>,
        pub fail_import_of: Option<String>,
        pub fail_compile: bool,
        /// Contents of each CSV handed to the importer.
        pub seen_csv: Mutex<Vec<String>>,
    }

    impl FakeToolchain {
        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    fn ok() -> ToolOutput {
        ToolOutput {
            status: Some(0),
            ..ToolOutput::default()
        }
    }

    impl Toolchain for FakeToolchain {
        async fn preflight(&self) -> Result<(), BuildError> {
            self.record("preflight");
            Ok(())
        }

        async fn prepare_profiles(&self) -> Result<(), BuildError> {
            self.record("profiles");
            Ok(())
        }

        async fn reset_scratch(&self) -> Result<(), BuildError> {
            self.record("reset");
            Ok(())
        }

        async fn import(&self, _json: &Path, csv: &Path) -> Result<ToolOutput, BuildError> {
            let file = csv.file_name().unwrap().to_string_lossy().into_owned();
            self.record(format!("import {file}"));
            self.seen_csv
                .lock()
                .unwrap()
                .push(fs::read_to_string(csv).unwrap());
            if self.fail_import_of.as_deref() == Some(file.as_str()) {
                return Ok(ToolOutput {
                    status: Some(1),
                    stdout: String::new(),
                    stderr: "bad row".into(),
                });
            }
            Ok(ok())
        }

        async fn compile(&self) -> Result<ToolOutput, BuildError> {
            self.record("compile");
            if self.fail_compile {
                return Ok(ToolOutput {
                    status: Some(2),
                    ..ToolOutput::default()
                });
            }
            Ok(ok())
        }

        fn discard_scratch(&self) -> Result<(), BuildError> {
            self.record("discard");
            Ok(())
        }

        async fn install_manifest(&self) -> Result<Vec<InstallFile>, BuildError> {
            Ok(Vec::new())
        }
    }

    fn item(dir: &Path, name: &str, id: i64, policy: AffixPolicy) -> BuildItem {
        let stem = name.replace('/', "-");
        let json = dir.join(format!("{stem}.json"));
        let csv = dir.join(format!("{stem}.csv"));
        fs::write(&json, "{}").unwrap();
        fs::write(&csv, "entity_id,prefix\n1,/旧\n").unwrap();
        BuildItem {
            name: name.to_owned(),
            title: name.to_owned(),
            id: InternalId::from_raw(id),
            json,
            csv,
            policy,
        }
    }

    #[tokio::test]
    async fn empty_selection_never_resets() {
        let fake = FakeToolchain::default();
        let err = run_pipeline(&fake, &[]).await.unwrap_err();
        assert!(matches!(err, RepoError::NothingToCompile));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn imports_in_order_then_compiles_once() {
        let dir = tempfile::tempdir().unwrap();
        let forced = AffixPolicy {
            force_prefix: true,
            force_suffix: false,
        };
        let items = vec![
            item(dir.path(), "local/a", -1, AffixPolicy::default()),
            item(dir.path(), "geonlp/b", 3, forced),
        ];
        let fake = FakeToolchain::default();
        let report = run_pipeline(&fake, &items).await.unwrap();

        assert_eq!(report.imported, vec!["local/a", "geonlp/b"]);
        assert!(report.skipped.is_empty());
        assert_eq!(
            fake.calls(),
            vec![
                "preflight",
                "profiles",
                "reset",
                "import local-a.csv",
                "import _geonlp-b.csv",
                "compile"
            ]
        );
        let seen = fake.seen_csv.lock().unwrap().clone();
        assert_eq!(seen[0], "entity_id,prefix\n1,/旧\n");
        assert_eq!(seen[1], "entity_id,prefix\n1,旧\n");
        assert!(!dir.path().join("_geonlp-b.csv").exists());
    }

    #[tokio::test]
    async fn first_import_failure_aborts_and_discards() {
        let dir = tempfile::tempdir().unwrap();
        let forced = AffixPolicy {
            force_prefix: true,
            force_suffix: true,
        };
        let items = vec![
            item(dir.path(), "local/a", -2, forced),
            item(dir.path(), "local/b", -1, AffixPolicy::default()),
        ];
        let fake = FakeToolchain {
            fail_import_of: Some("_local-a.csv".into()),
            ..FakeToolchain::default()
        };
        let err = run_pipeline(&fake, &items).await.unwrap_err();
        match err {
            RepoError::Build(BuildError::ImportFailed {
                dictionary, stderr, ..
            }) => {
                assert_eq!(dictionary, "local/a");
                assert_eq!(stderr, "bad row");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let calls = fake.calls();
        assert_eq!(calls.last().map(String::as_str), Some("discard"));
        assert!(!calls.iter().any(|c| c == "compile" || c == "import local-b.csv"));
        // The normalized copy is cleaned up even though the import failed.
        assert!(!dir.path().join("_local-a.csv").exists());
    }

    #[tokio::test]
    async fn missing_payload_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let present = item(dir.path(), "local/a", -1, AffixPolicy::default());
        let mut missing = item(dir.path(), "local/b", -2, AffixPolicy::default());
        missing.csv = dir.path().join("nowhere.csv");

        let fake = FakeToolchain::default();
        let report = run_pipeline(&fake, &[present, missing]).await.unwrap();
        assert_eq!(report.imported, vec!["local/a"]);
        assert_eq!(report.skipped, vec!["local/b"]);
    }

    #[tokio::test]
    async fn compiler_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let items = vec![item(dir.path(), "local/a", -1, AffixPolicy::default())];
        let fake = FakeToolchain {
            fail_compile: true,
            ..FakeToolchain::default()
        };
        let err = run_pipeline(&fake, &items).await.unwrap_err();
        assert!(matches!(
            err,
            RepoError::Build(BuildError::CompileFailed { status: Some(2), .. })
        ));
        assert_eq!(fake.calls().last().map(String::as_str), Some("discard"));
    }
}
