//! Adapter for the external GeoNLP build tools.
//!
//! Three executables are involved: `mecab-config` (presence check only), the
//! importer `geonlp_add`, which loads one json+csv pair into the scratch
//! database, and `geonlp_ma_makedic`, which compiles the scratch database
//! into the binary dictionary and also reports the default install paths.
//! [`Toolchain`] is the seam the compile pipeline is written against.

use std::ffi::OsString;
use std::fs;
use std::future::Future;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use flate2::read::GzDecoder;
use regex::Regex;
use sqlx::{ConnectOptions, Connection};
use sqlx::sqlite::SqliteConnectOptions;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::{RepoConfig, Workspace};
use crate::error::BuildError;

/// Captured result of one external process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// One file the compiler produces and `install` copies into the data dir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallFile {
    /// Setting name as printed by the compiler, e.g. `darts_file`.
    pub key: String,
    pub file_name: String,
}

/// Paths reported by `geonlp_ma_makedic -h`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// Default data directory (where `geodic.sq3` lives).
    pub data_dir: PathBuf,
    /// Directory holding the default `geonlp.rc`.
    pub conf_dir: Option<PathBuf>,
    pub install_files: Vec<InstallFile>,
}

static DATA_DIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"sqlite3_file\s*=\s*(\S.*)/geodic\.sq3").expect("valid regex")
});
static CONF_DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(/\S*)/geonlp\.rc\b").expect("valid regex"));
static INSTALL_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9_]+)\s*=\s*\S*/([^/\s]+\.[^/\s]+)\s*$").expect("valid regex")
});

impl ToolPaths {
    /// Parse the usage/profile dump of the dictionary compiler.
    pub fn parse(usage: &str) -> Option<Self> {
        let data_dir = DATA_DIR_RE
            .captures(usage)
            .map(|c| PathBuf::from(c[1].trim()))?;
        let conf_dir = CONF_DIR_RE
            .captures(usage)
            .map(|c| PathBuf::from(&c[1]));

        let mut install_files: Vec<InstallFile> = Vec::new();
        for line in usage.lines() {
            if let Some(c) = INSTALL_LINE_RE.captures(line) {
                let file_name = c[2].to_owned();
                if file_name.ends_with(".rc") {
                    continue;
                }
                match install_files.iter_mut().find(|f| f.key == c[1]) {
                    Some(existing) => existing.file_name = file_name,
                    None => install_files.push(InstallFile {
                        key: c[1].to_owned(),
                        file_name,
                    }),
                }
            }
        }

        Some(Self {
            data_dir,
            conf_dir,
            install_files,
        })
    }
}

/// Run `program args...`, optionally in `cwd`, capturing both streams.
pub async fn run_tool(
    program: &str,
    args: &[OsString],
    cwd: Option<&Path>,
) -> Result<ToolOutput, BuildError> {
    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    debug!(program, ?args, "running external tool");
    let output = command.output().await.map_err(|e| BuildError::ToolUnavailable {
        tool: program.to_owned(),
        reason: e.to_string(),
    })?;
    Ok(ToolOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Ask the compiler for its default paths.
pub async fn discover_paths(makedic: &str) -> Result<ToolPaths, BuildError> {
    let out = run_tool(makedic, &["-h".into()], None).await?;
    let combined = format!("{}\n{}", out.stdout, out.stderr);
    ToolPaths::parse(&combined).ok_or_else(|| BuildError::ToolUnavailable {
        tool: makedic.to_owned(),
        reason: "could not find the default dictionary directory in its -h output; \
                 check that GeoNLP is installed and the tool is on PATH"
            .to_owned(),
    })
}

pub trait Toolchain: Send + Sync {
    /// Fail early when the MeCab tooling is missing.
    fn preflight(&self) -> impl Future<Output = Result<(), BuildError>> + Send;

    /// Write the build profiles into the working directory.
    fn prepare_profiles(&self) -> impl Future<Output = Result<(), BuildError>> + Send;

    /// Recreate the scratch database from the initial snapshot.
    fn reset_scratch(&self) -> impl Future<Output = Result<(), BuildError>> + Send;

    fn import(
        &self,
        json: &Path,
        csv: &Path,
    ) -> impl Future<Output = Result<ToolOutput, BuildError>> + Send;

    fn compile(&self) -> impl Future<Output = Result<ToolOutput, BuildError>> + Send;

    /// Drop a scratch database left behind by a failed run.
    fn discard_scratch(&self) -> Result<(), BuildError>;

    /// Files produced by [`Toolchain::compile`] that `install` copies.
    fn install_manifest(&self) -> impl Future<Output = Result<Vec<InstallFile>, BuildError>> + Send;
}

/// [`Toolchain`] backed by the real GeoNLP executables.
#[derive(Debug, Clone)]
pub struct ExternalToolchain {
    importer: String,
    makedic: String,
    mecab_config: String,
    work_dir: PathBuf,
    scratch_db: PathBuf,
    profile: PathBuf,
    makedic_profile: PathBuf,
    snapshot: PathBuf,
}

impl ExternalToolchain {
    pub fn new(config: &RepoConfig, workspace: &Workspace) -> Self {
        Self {
            importer: config.importer.clone(),
            makedic: config.makedic.clone(),
            mecab_config: config.mecab_config.clone(),
            work_dir: workspace.root().to_path_buf(),
            scratch_db: workspace.scratch_db_path(),
            profile: workspace.profile_path(),
            makedic_profile: workspace.makedic_profile_path(),
            snapshot: config.snapshot_path(workspace),
        }
    }

    fn rewrite_profile(&self, src: &Path, dest: &Path, data_dir: &Path) -> Result<(), BuildError> {
        let text = fs::read_to_string(src)?;
        let rewritten = text.replace(
            &*data_dir.to_string_lossy(),
            &self.work_dir.to_string_lossy(),
        );
        fs::write(dest, rewritten)?;
        debug!(profile = %dest.display(), "wrote build profile");
        Ok(())
    }
}

impl Toolchain for ExternalToolchain {
    async fn preflight(&self) -> Result<(), BuildError> {
        let out = run_tool(&self.mecab_config, &["--libexecdir".into()], None).await?;
        if !out.success() {
            return Err(BuildError::ToolUnavailable {
                tool: self.mecab_config.clone(),
                reason: format!("exited with {:?}: {}", out.status, out.stderr.trim()),
            });
        }
        Ok(())
    }

    async fn prepare_profiles(&self) -> Result<(), BuildError> {
        let paths = discover_paths(&self.makedic).await?;
        let conf_dir = paths.conf_dir.clone().unwrap_or_else(|| paths.data_dir.clone());
        self.rewrite_profile(&conf_dir.join("geonlp.rc"), &self.profile, &paths.data_dir)?;
        self.rewrite_profile(
            &conf_dir.join("geonlp_ma_makedic.rc"),
            &self.makedic_profile,
            &paths.data_dir,
        )?;
        Ok(())
    }

    async fn reset_scratch(&self) -> Result<(), BuildError> {
        if !self.snapshot.is_file() {
            return Err(BuildError::MissingSnapshot(
                self.snapshot.display().to_string(),
            ));
        }
        let mut sql = String::new();
        GzDecoder::new(fs::File::open(&self.snapshot)?).read_to_string(&mut sql)?;

        self.discard_scratch()?;
        let mut conn = SqliteConnectOptions::new()
            .filename(&self.scratch_db)
            .create_if_missing(true)
            .connect()
            .await?;
        sqlx::Executor::execute(&mut conn, sqlx::raw_sql(&sql)).await?;
        conn.close().await?;
        info!(db = %self.scratch_db.display(), "scratch database reset from snapshot");
        Ok(())
    }

    async fn import(&self, json: &Path, csv: &Path) -> Result<ToolOutput, BuildError> {
        let mut rc = OsString::from("--rc=");
        rc.push(&self.profile);
        let args = [rc, json.as_os_str().to_owned(), csv.as_os_str().to_owned()];
        run_tool(&self.importer, &args, Some(&self.work_dir)).await
    }

    async fn compile(&self) -> Result<ToolOutput, BuildError> {
        let args = [
            OsString::from("-u"),
            OsString::from("-f"),
            self.makedic_profile.as_os_str().to_owned(),
            self.profile.as_os_str().to_owned(),
        ];
        run_tool(&self.makedic, &args, Some(&self.work_dir)).await
    }

    fn discard_scratch(&self) -> Result<(), BuildError> {
        match fs::remove_file(&self.scratch_db) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn install_manifest(&self) -> Result<Vec<InstallFile>, BuildError> {
        Ok(discover_paths(&self.makedic).await?.install_files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const USAGE: &str = "\
プロファイルをロード中 : /usr/local/etc/geonlp/geonlp.rc
  sqlite3_file = /usr/local/lib/geonlp/geodic.sq3
  darts_file   = /usr/local/lib/geonlp/geo_name_fullname.drt
  wordlist_file = /usr/local/lib/geonlp/geo_name_fullname.txt
  mecab_userdic = /usr/local/lib/geonlp/mecabusr.dic
Usage: geonlp_ma_makedic [options] [profile_filepath]
-f filepath\tspecify configuration file (geonlp_ma_makedic.rc)
";

    #[test]
    fn parses_compiler_usage() {
        let paths = ToolPaths::parse(USAGE).unwrap();
        assert_eq!(paths.data_dir, PathBuf::from("/usr/local/lib/geonlp"));
        assert_eq!(paths.conf_dir, Some(PathBuf::from("/usr/local/etc/geonlp")));
        let files: Vec<(&str, &str)> = paths
            .install_files
            .iter()
            .map(|f| (f.key.as_str(), f.file_name.as_str()))
            .collect();
        assert_eq!(
            files,
            vec![
                ("sqlite3_file", "geodic.sq3"),
                ("darts_file", "geo_name_fullname.drt"),
                ("wordlist_file", "geo_name_fullname.txt"),
                ("mecab_userdic", "mecabusr.dic"),
            ]
        );
    }

    #[test]
    fn usage_without_data_dir_is_rejected() {
        assert!(ToolPaths::parse("Usage: geonlp_ma_makedic [options]").is_none());
    }

    #[tokio::test]
    async fn missing_tool_is_reported_as_unavailable() {
        let err = run_tool("geodic-no-such-tool-for-tests", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::ToolUnavailable { .. }));
    }

    #[tokio::test]
    async fn reset_scratch_loads_gzipped_dump() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        let snapshot = dir.path().join("init.dump.gz");
        let mut gz = GzEncoder::new(fs::File::create(&snapshot).unwrap(), Compression::default());
        gz.write_all(
            b"PRAGMA foreign_keys=OFF;\nBEGIN TRANSACTION;\n\
              CREATE TABLE dictionary(id INTEGER PRIMARY KEY, json TEXT);\n\
              INSERT INTO dictionary VALUES(1,'{}');\nCOMMIT;\n",
        )
        .unwrap();
        gz.finish().unwrap();

        let mut config = RepoConfig::from_lookup(|_| None);
        config.init_snapshot = Some(snapshot);
        let toolchain = ExternalToolchain::new(&config, &workspace);

        fs::write(workspace.scratch_db_path(), b"stale").unwrap();
        toolchain.reset_scratch().await.unwrap();

        let mut conn = SqliteConnectOptions::new()
            .filename(workspace.scratch_db_path())
            .connect()
            .await
            .unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dictionary")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn reset_without_snapshot_leaves_scratch_alone() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        let toolchain = ExternalToolchain::new(&RepoConfig::from_lookup(|_| None), &workspace);
        fs::write(workspace.scratch_db_path(), b"previous").unwrap();

        let err = toolchain.reset_scratch().await.unwrap_err();
        assert!(matches!(err, BuildError::MissingSnapshot(_)));
        assert!(workspace.scratch_db_path().is_file());
    }
}
