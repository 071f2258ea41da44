//! Repository configuration, loaded from environment variables and then
//! overridden by command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use geodic_fetch::{DEFAULT_SERVER, normalize_server_url};
use tracing::info;

use crate::error::RepoError;

/// Runtime configuration of the dictionary repository.
///
/// Every field has a default so the tool works without any environment
/// variables set, except `base_dir`, which falls back to the data directory
/// reported by the dictionary compiler.
#[derive(Debug, Clone)]
pub struct RepoConfig {
    /// Directory holding the installed binary dictionary (`GEONLP_DIR`).
    pub base_dir: Option<PathBuf>,

    /// Manifest URL (`GEODIC_SERVER`), without a trailing slash.
    pub server_url: String,

    /// HTTP/HTTPS proxy (`HTTP_PROXY` / `HTTPS_PROXY`).
    pub proxy: Option<String>,

    /// Lifetime of the cached manifest (`GEODIC_CACHE_TTL_SECS`, default 3600).
    pub cache_ttl: Duration,

    /// Attempts per HTTP request (`GEODIC_RETRY_COUNT`, default 3).
    pub retry_count: usize,

    /// Pause between attempts (`GEODIC_RETRY_DELAY_SECS`, default 1).
    pub retry_delay_secs: u64,

    /// Gzipped SQL dump the scratch build database is rebuilt from
    /// (`GEODIC_INIT_SNAPSHOT`, default `<base_dir>/geodic-init.dump.gz`).
    pub init_snapshot: Option<PathBuf>,

    /// Importer executable (`GEODIC_IMPORTER`, default `geonlp_add`).
    pub importer: String,

    /// Dictionary compiler executable (`GEODIC_MAKEDIC`, default `geonlp_ma_makedic`).
    pub makedic: String,

    /// MeCab configuration helper (`GEODIC_MECAB_CONFIG`, default `mecab-config`).
    pub mecab_config: String,

    /// `tracing` filter string (`GEODIC_LOG`, default `info`).
    pub log_level: String,

    /// Emit log records as newline-delimited JSON (`GEODIC_LOG_JSON`).
    pub log_json: bool,
}

impl RepoConfig {
    /// Build [`RepoConfig`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`RepoConfig`] from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let env_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_owned());
        let parse_env = |key: &str, default: u64| -> u64 {
            get(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
        };

        Self {
            base_dir: get("GEONLP_DIR").map(PathBuf::from),
            server_url: normalize_server_url(&env_or("GEODIC_SERVER", DEFAULT_SERVER)),
            proxy: get("HTTP_PROXY").or_else(|| get("HTTPS_PROXY")),
            cache_ttl: Duration::from_secs(parse_env("GEODIC_CACHE_TTL_SECS", 3600)),
            retry_count: parse_env("GEODIC_RETRY_COUNT", 3) as usize,
            retry_delay_secs: parse_env("GEODIC_RETRY_DELAY_SECS", 1),
            init_snapshot: get("GEODIC_INIT_SNAPSHOT").map(PathBuf::from),
            importer: env_or("GEODIC_IMPORTER", "geonlp_add"),
            makedic: env_or("GEODIC_MAKEDIC", "geonlp_ma_makedic"),
            mecab_config: env_or("GEODIC_MECAB_CONFIG", "mecab-config"),
            log_level: env_or("GEODIC_LOG", "info"),
            log_json: get("GEODIC_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    pub fn with_server(mut self, server: &str) -> Self {
        self.server_url = normalize_server_url(server);
        self
    }

    pub fn snapshot_path(&self, workspace: &Workspace) -> PathBuf {
        self.init_snapshot
            .clone()
            .unwrap_or_else(|| workspace.base_dir().join("geodic-init.dump.gz"))
    }
}

/// On-disk layout of a repository: `<base_dir>/.geonlp-dic-util/`.
#[derive(Debug, Clone)]
pub struct Workspace {
    base_dir: PathBuf,
    root: PathBuf,
}

impl Workspace {
    pub const DIR_NAME: &'static str = ".geonlp-dic-util";

    /// Validate (or create) the working directory under `base_dir`.
    ///
    /// An existing path that is not a writable directory is a configuration
    /// error; nothing is created in that case.
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self, RepoError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let root = base_dir.join(Self::DIR_NAME);

        if root.exists() {
            if !root.is_dir() {
                return Err(RepoError::Config(format!(
                    "repository path '{}' exists but is not a directory",
                    root.display()
                )));
            }
            probe_writable(&root)?;
        } else {
            info!(path = %root.display(), "creating local repository");
            fs::create_dir_all(&root).map_err(|e| {
                RepoError::Config(format!(
                    "cannot create repository directory '{}': {e}; use --dir or GEONLP_DIR to choose another location",
                    root.display()
                ))
            })?;
        }

        let workspace = Self { base_dir, root };
        fs::create_dir_all(workspace.zip_dir())?;
        fs::create_dir_all(workspace.extracted_dir())?;
        Ok(workspace)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn zip_dir(&self) -> PathBuf {
        self.root.join("zip")
    }

    pub fn extracted_dir(&self) -> PathBuf {
        self.root.join("extracted")
    }

    /// Staging directory of one dictionary, keyed by its path-safe id.
    pub fn staging_dir(&self, repository_path: &str) -> PathBuf {
        self.extracted_dir().join(repository_path)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join("repository.sq3")
    }

    pub fn manifest_cache_path(&self) -> PathBuf {
        self.root.join("dictionary_list.json")
    }

    /// Scratch build database fed by the importer.
    pub fn scratch_db_path(&self) -> PathBuf {
        self.root.join("geodic.sq3")
    }

    pub fn profile_path(&self) -> PathBuf {
        self.root.join("geonlp.rc")
    }

    pub fn makedic_profile_path(&self) -> PathBuf {
        self.root.join("geonlp_ma_makedic.rc")
    }
}

fn probe_writable(dir: &Path) -> Result<(), RepoError> {
    let probe = dir.join(".write-probe");
    fs::write(&probe, b"").map_err(|e| {
        RepoError::Config(format!(
            "repository directory '{}' is not writable: {e}",
            dir.display()
        ))
    })?;
    let _ = fs::remove_file(&probe);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = RepoConfig::from_lookup(|_| None);
        assert!(cfg.base_dir.is_none());
        assert_eq!(cfg.server_url, DEFAULT_SERVER);
        assert_eq!(cfg.cache_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.retry_count, 3);
        assert_eq!(cfg.importer, "geonlp_add");
        assert_eq!(cfg.makedic, "geonlp_ma_makedic");
        assert!(!cfg.log_json);
    }

    #[test]
    fn environment_overrides_defaults() {
        let cfg = RepoConfig::from_lookup(lookup(&[
            ("GEONLP_DIR", "/srv/geonlp"),
            ("GEODIC_SERVER", "http://mirror.local/api/dictionary/"),
            ("HTTPS_PROXY", "http://proxy:3128"),
            ("GEODIC_CACHE_TTL_SECS", "60"),
            ("GEODIC_RETRY_COUNT", "not a number"),
            ("GEODIC_LOG_JSON", "TRUE"),
        ]));
        assert_eq!(cfg.base_dir.as_deref(), Some(Path::new("/srv/geonlp")));
        assert_eq!(cfg.server_url, "http://mirror.local/api/dictionary");
        assert_eq!(cfg.proxy.as_deref(), Some("http://proxy:3128"));
        assert_eq!(cfg.cache_ttl, Duration::from_secs(60));
        assert_eq!(cfg.retry_count, 3);
        assert!(cfg.log_json);
    }

    #[test]
    fn workspace_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        assert!(ws.zip_dir().is_dir());
        assert!(ws.extracted_dir().is_dir());
        assert_eq!(ws.root(), dir.path().join(".geonlp-dic-util"));
        assert_eq!(ws.staging_dir("minus2"), ws.extracted_dir().join("minus2"));
    }

    #[test]
    fn workspace_rejects_file_in_the_way() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(Workspace::DIR_NAME), b"oops").unwrap();
        let err = Workspace::open(dir.path()).unwrap_err();
        assert!(matches!(err, RepoError::Config(_)));
    }
}
