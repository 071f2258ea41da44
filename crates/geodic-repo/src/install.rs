//! Copy the compiled binary dictionary from the working directory into the
//! GeoNLP data directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::config::Workspace;
use crate::error::RepoError;
use crate::toolchain::{InstallFile, Toolchain};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallStep {
    pub key: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub source_modified: Option<DateTime<Local>>,
    /// `None` when the destination does not exist yet.
    pub destination_modified: Option<DateTime<Local>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallProblem {
    /// Nothing to copy: run `compile` first.
    Unreadable(PathBuf),
    /// The destination file or its directory cannot be written.
    Unwritable(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct InstallPlan {
    pub steps: Vec<InstallStep>,
    pub problems: Vec<InstallProblem>,
}

impl InstallPlan {
    pub fn is_executable(&self) -> bool {
        self.problems.is_empty() && !self.steps.is_empty()
    }

    pub fn has_unreadable(&self) -> bool {
        self.problems
            .iter()
            .any(|p| matches!(p, InstallProblem::Unreadable(_)))
    }
}

fn modified(path: &Path) -> Option<DateTime<Local>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Local>::from)
}

fn is_writable(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| !m.permissions().readonly())
}

/// Check every file of `files` and pair `<work_dir>/<file>` with
/// `<target_dir>/<file>`. Problems are collected, never raised.
pub fn plan_install(files: &[InstallFile], work_dir: &Path, target_dir: &Path) -> InstallPlan {
    let mut plan = InstallPlan::default();
    for file in files {
        let source = work_dir.join(&file.file_name);
        let destination = target_dir.join(&file.file_name);

        let source_modified = if source.is_file() {
            modified(&source)
        } else {
            warn!(path = %source.display(), "compiled file missing");
            plan.problems.push(InstallProblem::Unreadable(source.clone()));
            None
        };

        let destination_modified = if destination.exists() {
            if !is_writable(&destination) {
                warn!(path = %destination.display(), "install target is not writable");
                plan.problems
                    .push(InstallProblem::Unwritable(destination.clone()));
            }
            modified(&destination)
        } else {
            let parent = destination.parent().unwrap_or(target_dir);
            if !is_writable(parent) {
                warn!(path = %parent.display(), "install directory is not writable");
                plan.problems.push(InstallProblem::Unwritable(parent.to_path_buf()));
            }
            None
        };

        plan.steps.push(InstallStep {
            key: file.key.clone(),
            source,
            destination,
            source_modified,
            destination_modified,
        });
    }
    plan
}

/// Install plan for the files the toolchain reports.
pub async fn plan_binary_install<C: Toolchain>(
    toolchain: &C,
    workspace: &Workspace,
) -> Result<InstallPlan, RepoError> {
    let files = toolchain.install_manifest().await?;
    Ok(plan_install(&files, workspace.root(), workspace.base_dir()))
}

/// Copy every step of an executable plan, overwriting existing files.
pub fn execute_install(plan: &InstallPlan) -> Result<usize, RepoError> {
    if !plan.is_executable() {
        return Err(RepoError::Config(
            "install plan has unresolved problems; nothing was copied".to_owned(),
        ));
    }
    for step in &plan.steps {
        fs::copy(&step.source, &step.destination)?;
        info!(from = %step.source.display(), to = %step.destination.display(), "installed");
    }
    Ok(plan.steps.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> Vec<InstallFile> {
        vec![
            InstallFile {
                key: "sqlite3_file".into(),
                file_name: "geodic.sq3".into(),
            },
            InstallFile {
                key: "darts_file".into(),
                file_name: "geo_name_fullname.drt".into(),
            },
        ]
    }

    #[test]
    fn missing_sources_block_the_plan() {
        let work = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        fs::write(work.path().join("geodic.sq3"), b"db").unwrap();

        let plan = plan_install(&files(), work.path(), target.path());
        assert_eq!(plan.steps.len(), 2);
        assert!(plan.has_unreadable());
        assert!(!plan.is_executable());
        assert!(execute_install(&plan).is_err());
        assert!(!target.path().join("geodic.sq3").exists());
    }

    #[test]
    fn copies_and_overwrites() {
        let work = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        fs::write(work.path().join("geodic.sq3"), b"new db").unwrap();
        fs::write(work.path().join("geo_name_fullname.drt"), b"new darts").unwrap();
        fs::write(target.path().join("geodic.sq3"), b"old db").unwrap();

        let plan = plan_install(&files(), work.path(), target.path());
        assert!(plan.is_executable(), "{:?}", plan.problems);
        assert!(plan.steps[0].destination_modified.is_some());
        assert!(plan.steps[1].destination_modified.is_none());

        assert_eq!(execute_install(&plan).unwrap(), 2);
        assert_eq!(fs::read(target.path().join("geodic.sq3")).unwrap(), b"new db");
        assert_eq!(
            fs::read(target.path().join("geo_name_fullname.drt")).unwrap(),
            b"new darts"
        );
    }

    #[test]
    fn empty_manifest_is_not_executable() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan_install(&[], dir.path(), dir.path());
        assert!(!plan.is_executable());
    }
}
