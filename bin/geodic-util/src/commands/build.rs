//! `compile` and `install`.

use anyhow::{Context, Result};
use dialoguer::Confirm;
use geodic_repo::{
    BuildError, ExternalToolchain, InstallProblem, RepoError, execute_install, plan_binary_install,
};

use super::Session;

pub async fn compile(session: &Session) -> Result<()> {
    let toolchain = ExternalToolchain::new(&session.config, session.repo.workspace());
    let report = match session.repo.compile(&session.filter, &toolchain).await {
        Ok(report) => report,
        Err(e) => {
            if let RepoError::Build(
                BuildError::ImportFailed { stdout, .. } | BuildError::CompileFailed { stdout, .. },
            ) = &e
            {
                if !stdout.trim().is_empty() {
                    eprintln!("{}", stdout.trim_end());
                }
            }
            return Err(e).context("compile failed");
        }
    };

    for name in &report.imported {
        println!("imported {name}");
    }
    for name in &report.skipped {
        println!("skipped {name} (payload files missing)");
    }
    if !report.compiler_output.stdout.trim().is_empty() {
        println!("{}", report.compiler_output.stdout.trim_end());
    }
    println!(
        "binary dictionary built from {} dictionaries; run `geodic-util install` to use it",
        report.imported.len()
    );
    Ok(())
}

pub async fn install(session: &Session) -> Result<()> {
    let workspace = session.repo.workspace();
    let toolchain = ExternalToolchain::new(&session.config, workspace);
    let plan = plan_binary_install(&toolchain, workspace)
        .await
        .context("cannot determine which files to install")?;

    for step in &plan.steps {
        let built = step
            .source_modified
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "missing".to_owned());
        let current = step
            .destination_modified
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "new file".to_owned());
        println!(
            "{} -> {} (built {built}, replaces {current})",
            step.source.display(),
            step.destination.display()
        );
    }

    if !plan.is_executable() {
        for problem in &plan.problems {
            match problem {
                InstallProblem::Unreadable(path) => eprintln!("cannot read {}", path.display()),
                InstallProblem::Unwritable(path) => eprintln!("cannot write {}", path.display()),
            }
        }
        if plan.has_unreadable() {
            anyhow::bail!("compiled files are missing; run `geodic-util compile` first");
        }
        anyhow::bail!("nothing can be installed");
    }

    if !session.assume_yes {
        let confirmed = Confirm::new()
            .with_prompt("Overwrite the installed binary dictionary?")
            .default(false)
            .interact()
            .context("cannot read confirmation")?;
        if !confirmed {
            println!("install cancelled");
            return Ok(());
        }
    }

    let copied = execute_install(&plan)?;
    println!("installed {copied} files into {}", workspace.base_dir().display());
    Ok(())
}
