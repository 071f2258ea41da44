//! Local GeoNLP dictionary repository.
//!
//! A [`Repository`] reconciles the remote manifest with the local catalog
//! (`repository.sq3`), installs and soft-deletes dictionaries, imports local
//! CSV dictionaries, and drives the external toolchain that compiles the
//! enabled dictionaries into one binary dictionary.

pub mod compile;
pub mod config;
pub mod error;
pub mod filter;
pub mod import;
pub mod install;
pub mod repository;
pub mod staging;
pub mod store;
pub mod toolchain;

pub use compile::{BuildItem, CompileReport, run_pipeline};
pub use config::{RepoConfig, Workspace};
pub use error::{BuildError, RepoError};
pub use filter::{DictionaryFilter, NamePattern};
pub use import::{CsvSource, ImportSubject, generate_geonlp_id};
pub use install::{InstallPlan, InstallProblem, InstallStep, execute_install, plan_binary_install, plan_install};
pub use repository::{
    Affix, BatchReport, DictionaryStatus, DictionaryView, ImportOutcome, InstallOutcome,
    ItemOutcome, MutationOutcome, Repository, UpdateOutcome, fetch_config,
};
pub use staging::{AffixPolicy, StagedCsv};
pub use store::{CatalogEntry, CatalogStore, EntryWrite, RowUpdate, SqliteCatalog};
pub use toolchain::{ExternalToolchain, InstallFile, ToolOutput, ToolPaths, Toolchain, discover_paths};
