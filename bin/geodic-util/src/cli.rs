//! Command-line surface of `geodic-util`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use geodic_repo::{DictionaryFilter, RepoConfig, RepoError};

/// Manage the local repository of GeoNLP place-name dictionaries.
#[derive(Debug, Parser)]
#[command(name = "geodic-util")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Base directory of the installed binary dictionary (overrides GEONLP_DIR).
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// Dictionary server URL (overrides GEODIC_SERVER).
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// HTTP/HTTPS proxy URL (overrides HTTP_PROXY / HTTPS_PROXY).
    #[arg(long, global = true)]
    pub proxy: Option<String>,

    /// Clear the cached dictionary list before running the command.
    #[arg(long = "cc", global = true)]
    pub clear_cache: bool,

    /// Only dictionaries whose creator or name contains this text.
    #[arg(long, global = true)]
    pub creator: Option<String>,

    /// Only dictionaries with a subject tag matching this regular expression.
    #[arg(long, global = true)]
    pub subject: Option<String>,

    /// Answer yes to every confirmation.
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Layer the command-line flags over the environment configuration.
    pub fn apply(&self, mut config: RepoConfig) -> RepoConfig {
        if let Some(dir) = &self.dir {
            config.base_dir = Some(dir.clone());
        }
        if let Some(server) = &self.server {
            config = config.with_server(server);
        }
        if let Some(proxy) = &self.proxy {
            config.proxy = Some(proxy.clone());
        }
        config
    }

    pub fn filter(&self) -> Result<DictionaryFilter, RepoError> {
        DictionaryFilter::new(self.creator.as_deref(), self.subject.as_deref())
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List every known dictionary with its status.
    List,
    /// Show the details of dictionaries (`/regex/` or exact name).
    Show {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Update every installed dictionary that has a newer published version.
    Sync,
    /// Download and install dictionaries (`/regex/` or exact name).
    Add {
        #[arg(required = true)]
        patterns: Vec<String>,
    },
    /// Remove dictionaries from the repository; downloaded files are kept.
    Delete {
        #[arg(required = true)]
        patterns: Vec<String>,
    },
    /// Create or replace a local dictionary from a CSV file or URL.
    Import {
        /// Dictionary code (`[0-9A-Za-z_-]{1,32}`) or a JSON descriptor file.
        code_or_json: String,
        /// CSV path or http(s) URL.
        csv: String,
    },
    /// Build the binary dictionary from every installed dictionary.
    Compile,
    /// Copy the compiled binary dictionary into the base directory.
    Install,
    /// Require the name prefix when a dictionary is compiled.
    ForcePrefix { name: String, switch: Switch },
    /// Require the name suffix when a dictionary is compiled.
    ForceSuffix { name: String, switch: Switch },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}
