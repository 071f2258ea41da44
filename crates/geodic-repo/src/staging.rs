//! Compile-time CSV normalization for forced name affixes.
//!
//! A dictionary row may list optional prefixes or suffixes as `/`-separated
//! alternatives where an empty alternative means "may be omitted", e.g.
//! `/株式会社`. Forcing the affix drops the empty alternatives so the
//! compiled dictionary only knows the full form.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::RepoError;

/// Force flags of one catalog entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AffixPolicy {
    pub force_prefix: bool,
    pub force_suffix: bool,
}

impl AffixPolicy {
    pub fn is_passthrough(&self) -> bool {
        !self.force_prefix && !self.force_suffix
    }
}

/// Drop empty `/`-separated segments: `"/A//B/"` becomes `"A/B"`.
pub fn strip_empty_segments(value: &str) -> String {
    value
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Rewrite `src` into `dest`, applying [`strip_empty_segments`] to the
/// `prefix` and/or `suffix` columns selected by `policy`. The header row and
/// every other column are copied unchanged. Applying it to its own output
/// yields the same file.
pub fn normalize_affixes(src: &Path, dest: &Path, policy: AffixPolicy) -> Result<(), RepoError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(src)?;
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(dest)?;

    let mut records = reader.records();
    let header = match records.next() {
        Some(header) => header?,
        None => {
            writer.flush()?;
            return Ok(());
        }
    };
    let column = |name: &str, wanted: bool| -> Option<usize> {
        if !wanted {
            return None;
        }
        header.iter().position(|field| field == name)
    };
    let prefix_col = column("prefix", policy.force_prefix);
    let suffix_col = column("suffix", policy.force_suffix);
    if policy.force_prefix && prefix_col.is_none() {
        warn!(csv = %src.display(), "force_prefix set but CSV has no prefix column");
    }
    if policy.force_suffix && suffix_col.is_none() {
        warn!(csv = %src.display(), "force_suffix set but CSV has no suffix column");
    }
    writer.write_record(&header)?;

    for record in records {
        let record = record?;
        let row: Vec<String> = record
            .iter()
            .enumerate()
            .map(|(i, field)| {
                if Some(i) == prefix_col || Some(i) == suffix_col {
                    strip_empty_segments(field)
                } else {
                    field.to_owned()
                }
            })
            .collect();
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// CSV handed to the importer for one build step.
///
/// A normalized copy lives next to the original as `_<basename>` and is
/// removed when the value is dropped, whether the import succeeded or not.
#[derive(Debug)]
pub struct StagedCsv {
    path: PathBuf,
    temporary: bool,
}

impl StagedCsv {
    /// Normalize `csv` when `policy` asks for it; otherwise pass it through.
    pub fn prepare(csv: &Path, policy: AffixPolicy) -> Result<Self, RepoError> {
        if policy.is_passthrough() {
            return Ok(Self {
                path: csv.to_path_buf(),
                temporary: false,
            });
        }
        let file_name = csv
            .file_name()
            .map(|n| format!("_{}", n.to_string_lossy()))
            .ok_or_else(|| RepoError::Config(format!("'{}' is not a file path", csv.display())))?;
        let path = csv.with_file_name(file_name);
        let staged = Self {
            path,
            temporary: true,
        };
        normalize_affixes(csv, &staged.path, policy)?;
        debug!(csv = %staged.path.display(), "wrote affix-normalized CSV");
        Ok(staged)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedCsv {
    fn drop(&mut self) {
        if self.temporary {
            if let Err(e) = fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(csv = %self.path.display(), error = %e, "failed to remove temporary CSV");
                }
            }
        }
    }
}
