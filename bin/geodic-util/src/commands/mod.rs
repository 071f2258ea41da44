//! Command handlers. Each submodule exposes `execute` functions that run
//! against an opened [`Session`].

pub mod build;
pub mod import;
pub mod list;
pub mod manage;

use std::path::PathBuf;

use anyhow::{Context, Result};
use geodic_fetch::{Downloader, RemoteStatus};
use geodic_repo::{
    BatchReport, DictionaryFilter, ItemOutcome, RepoConfig, Repository, SqliteCatalog, Workspace,
    discover_paths,
};
use tracing::{info, warn};

use crate::cli::{Cli, Commands};

pub type LocalRepository = Repository<SqliteCatalog, Downloader>;

/// Everything a command needs: the effective configuration, the opened
/// repository and the global selection flags.
pub struct Session {
    pub config: RepoConfig,
    pub repo: LocalRepository,
    pub filter: DictionaryFilter,
    pub assume_yes: bool,
}

impl Session {
    pub async fn open(cli: &Cli, config: RepoConfig) -> Result<Self> {
        let filter = cli.filter().context("invalid --subject expression")?;
        let base_dir = resolve_base_dir(&config).await?;
        let workspace = Workspace::open(&base_dir)
            .with_context(|| format!("cannot use '{}' as the dictionary directory", base_dir.display()))?;
        info!(dir = %workspace.root().display(), server = %config.server_url, "repository opened");

        let repo = Repository::open(&config, workspace)
            .await
            .context("cannot open the repository catalog")?;
        if cli.clear_cache {
            repo.clear_cache().context("cannot clear the dictionary list cache")?;
        }
        Ok(Self {
            config,
            repo,
            filter,
            assume_yes: cli.yes,
        })
    }
}

/// `--dir`, then `GEONLP_DIR`, then the compiler's own default data directory.
async fn resolve_base_dir(config: &RepoConfig) -> Result<PathBuf> {
    if let Some(dir) = &config.base_dir {
        return Ok(dir.clone());
    }
    let paths = discover_paths(&config.makedic).await.with_context(|| {
        format!(
            "cannot determine the GeoNLP data directory from '{}'; set GEONLP_DIR or pass --dir",
            config.makedic
        )
    })?;
    info!(dir = %paths.data_dir.display(), "using the compiler's data directory");
    Ok(paths.data_dir)
}

pub async fn execute(cli: Cli, config: RepoConfig) -> Result<()> {
    let session = Session::open(&cli, config).await?;
    let result = match cli.command {
        Commands::List => list::list(&session).await,
        Commands::Show { names } => list::show(&session, &names).await,
        Commands::Sync => manage::sync(&session).await,
        Commands::Add { patterns } => manage::add(&session, &patterns).await,
        Commands::Delete { patterns } => manage::delete(&session, &patterns).await,
        Commands::Import { code_or_json, csv } => {
            import::execute(&session, &code_or_json, &csv).await
        }
        Commands::Compile => build::compile(&session).await,
        Commands::Install => build::install(&session).await,
        Commands::ForcePrefix { name, switch } => {
            manage::force(&session, &name, geodic_repo::Affix::Prefix, switch.is_on()).await
        }
        Commands::ForceSuffix { name, switch } => {
            manage::force(&session, &name, geodic_repo::Affix::Suffix, switch.is_on()).await
        }
    };
    session.repo.store().close().await;
    result
}

/// Tell the user once that the server could not be reached.
pub fn report_remote(status: &RemoteStatus) {
    if let RemoteStatus::Unavailable { reason } = status {
        warn!(%reason, "dictionary server unavailable, showing local dictionaries only");
        eprintln!("warning: dictionary server unavailable ({reason}); only local data is used");
    }
}

/// Print one line per processed dictionary and a trailing summary.
pub fn print_batch(report: &BatchReport) {
    report_remote(&report.remote);
    for (name, outcome) in &report.items {
        let text = match outcome {
            ItemOutcome::Installed => "installed".to_owned(),
            ItemOutcome::AlreadyCurrent => "already up to date".to_owned(),
            ItemOutcome::LocalSkipped => "local dictionary, skipped".to_owned(),
            ItemOutcome::Removed => "removed".to_owned(),
            ItemOutcome::NotRegistered => "not registered".to_owned(),
            ItemOutcome::Failed(reason) => format!("failed: {reason}"),
        };
        println!("{name}: {text}");
    }
    for pattern in &report.unmatched {
        println!("{pattern}: not found");
    }
    if report.items.is_empty() && report.unmatched.is_empty() {
        println!("nothing to do");
    }
}
