//! `sync`, `add`, `delete` and the force-affix switches.

use anyhow::{Context, Result};
use geodic_repo::{Affix, MutationOutcome, NamePattern};
use tracing::warn;

use super::{Session, print_batch, report_remote};

pub async fn sync(session: &Session) -> Result<()> {
    let report = session.repo.sync(&session.filter).await?;
    print_batch(&report);
    if report.failures() > 0 {
        anyhow::bail!("{} dictionaries could not be updated", report.failures());
    }
    Ok(())
}

pub async fn add(session: &Session, patterns: &[String]) -> Result<()> {
    let report = session.repo.add(patterns).await.context("add failed")?;
    print_batch(&report);
    if report.failures() > 0 {
        anyhow::bail!("{} dictionaries could not be installed", report.failures());
    }
    Ok(())
}

pub async fn delete(session: &Session, patterns: &[String]) -> Result<()> {
    let report = session
        .repo
        .delete_matching(patterns)
        .await
        .context("delete failed")?;
    print_batch(&report);
    Ok(())
}

pub async fn force(session: &Session, raw: &str, affix: Affix, on: bool) -> Result<()> {
    let pattern = NamePattern::parse(raw)?;
    let view = session.repo.list_all().await?;
    report_remote(&view.remote);

    let mut found = false;
    for (name, descriptor) in view.dictionaries.iter().filter(|(n, _)| pattern.matches(n)) {
        found = true;
        let outcome = session.repo.set_force(descriptor, affix, on).await?;
        let state = if on { "on" } else { "off" };
        match outcome {
            MutationOutcome::Applied => {
                println!("{name}: force {affix} {state} (takes effect at the next compile)");
            }
            MutationOutcome::NotRegistered => println!("{name}: not registered"),
            MutationOutcome::Disabled => println!("{name}: deleted, add it again first"),
        }
    }
    if !found {
        warn!(pattern = %raw, "dictionary not found");
        println!("{raw}: not found");
    }
    Ok(())
}
