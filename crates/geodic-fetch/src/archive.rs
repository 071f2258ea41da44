use std::io::Cursor;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::FetchError;

/// Relative paths of the payload members found in an extracted archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArchive {
    pub json_member: String,
    pub csv_member: String,
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Extract a ZIP archive into `dest`, keeping member paths, and locate the
/// dictionary payload: the first `.json` and the first `.csv` member
/// (extension compared case-insensitively).
///
/// Members whose path would escape `dest` are skipped.
pub fn extract_archive(bytes: &[u8], dest: &Path) -> Result<ExtractedArchive, FetchError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    std::fs::create_dir_all(dest)?;

    let mut json_member: Option<String> = None;
    let mut csv_member: Option<String> = None;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let rel_path: PathBuf = match file.enclosed_name() {
            Some(p) => p,
            None => {
                warn!(member = %file.name(), "skipping archive member outside extraction root");
                continue;
            }
        };
        let dest_path = dest.join(&rel_path);

        if file.is_dir() {
            std::fs::create_dir_all(&dest_path)?;
            continue;
        }
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&dest_path)?;
        std::io::copy(&mut file, &mut out)?;

        let member = rel_path.to_string_lossy().replace('\\', "/");
        if json_member.is_none() && has_extension(&rel_path, "json") {
            json_member = Some(member);
        } else if csv_member.is_none() && has_extension(&rel_path, "csv") {
            csv_member = Some(member);
        }
    }

    Ok(ExtractedArchive {
        json_member: json_member.ok_or(FetchError::MissingMember { extension: "json" })?,
        csv_member: csv_member.ok_or(FetchError::MissingMember { extension: "csv" })?,
    })
}
