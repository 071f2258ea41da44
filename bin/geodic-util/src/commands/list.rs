//! `list` and `show`.

use anyhow::Result;
use geodic_repo::{DictionaryStatus, NamePattern};
use geodic_types::Descriptor;
use tracing::warn;

use super::{Session, report_remote};

pub async fn list(session: &Session) -> Result<()> {
    let view = session.repo.list_all().await?;
    report_remote(&view.remote);

    let mut shown = 0usize;
    for (name, descriptor) in &view.dictionaries {
        if !session.filter.matches(descriptor) {
            continue;
        }
        let status = session.repo.status(descriptor).await?;
        println!("{name:<40} {:<14} {}", status.to_string(), descriptor.title);
        shown += 1;
    }
    println!("{shown} dictionaries");
    Ok(())
}

pub async fn show(session: &Session, names: &[String]) -> Result<()> {
    let view = session.repo.list_all().await?;
    report_remote(&view.remote);

    for raw in names {
        let pattern = NamePattern::parse(raw)?;
        let mut found = false;
        for (name, descriptor) in &view.dictionaries {
            if !pattern.matches(name) {
                continue;
            }
            found = true;
            let status = session.repo.status(descriptor).await?;
            let policy = session.repo.forced_affixes(descriptor).await?;
            print_details(descriptor, status);
            if let Some(policy) = policy {
                println!("  force prefix : {}", on_off(policy.force_prefix));
                println!("  force suffix : {}", on_off(policy.force_suffix));
            }
            println!();
        }
        if !found {
            warn!(pattern = %raw, "dictionary not found");
            println!("{raw}: not found");
        }
    }
    Ok(())
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

fn print_details(d: &Descriptor, status: DictionaryStatus) {
    println!("{}", d.name());
    println!("  status       : {status}");
    println!("  internal id  : {}", d.internal_id);
    println!("  identifier   : {}", d.identifier);
    println!("  title        : {}", d.title);
    println!("  creator      : {}", d.creator);
    if !d.description.is_empty() {
        println!("  description  : {}", d.description);
    }
    if !d.source.is_empty() {
        println!("  source       : {}", d.source);
    }
    let [[west, south], [east, north]] = d.spatial.0;
    println!("  spatial      : ({west}, {south}) - ({east}, {north})");
    println!("  subject      : {}", d.subject.join(", "));
    println!("  issued       : {}", d.issued);
    println!("  modified     : {}", d.modified.as_deref().unwrap_or("-"));
    println!("  records      : {}", d.record_count);
    println!("  reports      : {}", d.report_count);
    if !d.icon.is_empty() {
        println!("  icon         : {}", d.icon);
    }
    if !d.url.is_empty() {
        println!("  url          : {}", d.url);
    }
}
