//! `import`: register a local dictionary from a CSV file or URL.

use anyhow::{Context, Result};

use super::Session;

pub async fn execute(session: &Session, code_or_json: &str, csv: &str) -> Result<()> {
    let outcome = session
        .repo
        .import(code_or_json, csv)
        .await
        .with_context(|| format!("cannot import '{csv}'"))?;

    println!(
        "{} imported as id {} ({} rows: {} geonlp_id kept, {} generated)",
        outcome.name, outcome.id, outcome.rows, outcome.kept_ids, outcome.generated_ids
    );
    println!("  json: {}", outcome.json_file);
    println!("  csv : {}", outcome.csv_file);
    println!("run `geodic-util compile` to rebuild the binary dictionary");
    Ok(())
}
