//! Local dictionary authoring from a CSV file.
//!
//! Everything in this module is pure: the repository engine resolves the
//! subject, allocates the id, runs [`assign_geonlp_ids`] in memory and only
//! then writes files and the catalog row.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use geodic_types::Descriptor;
use rand::Rng;
use regex::Regex;
use tracing::debug;

use crate::error::RepoError;

/// Characters used for the random part of a generated `geonlp_id`.
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ID_RANDOM_LEN: usize = 4;

static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z_-]{1,32}$").expect("valid regex"));

/// What a local import is about: a full descriptor read from a JSON file, or
/// a bare dictionary code.
#[derive(Debug, Clone)]
pub enum ImportSubject {
    Descriptor(Box<Descriptor>),
    Code(String),
}

impl ImportSubject {
    /// A readable file that parses as descriptor JSON wins; anything else
    /// must be a valid dictionary code.
    pub fn resolve(code_or_json: &str) -> Result<Self, RepoError> {
        let path = Path::new(code_or_json);
        if path.is_file() {
            if let Ok(raw) = fs::read_to_string(path) {
                if let Ok(descriptor) = Descriptor::from_json_str(&raw) {
                    if descriptor.name().is_empty() {
                        return Err(RepoError::InvalidJsonIdentifier(code_or_json.to_owned()));
                    }
                    return Ok(Self::Descriptor(Box::new(descriptor)));
                }
            }
        }
        if !CODE_RE.is_match(code_or_json) {
            return Err(RepoError::InvalidCode(code_or_json.to_owned()));
        }
        Ok(Self::Code(code_or_json.to_owned()))
    }

    /// Catalog name of the dictionary being imported.
    pub fn name(&self) -> String {
        match self {
            Self::Descriptor(d) => d.name(),
            Self::Code(code) => format!("local/{code}"),
        }
    }
}

/// Where the CSV payload comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsvSource {
    File(PathBuf),
    Url(String),
}

impl CsvSource {
    pub fn parse(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(raw.to_owned())
        } else {
            Self::File(PathBuf::from(raw))
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::File(p) => p.display().to_string(),
            Self::Url(u) => u.clone(),
        }
    }
}

/// `prefix` followed by four random characters from `[0-9a-zA-Z]`.
pub fn generate_geonlp_id(prefix: &str, rng: &mut impl Rng) -> String {
    let mut id = String::with_capacity(prefix.len() + ID_RANDOM_LEN);
    id.push_str(prefix);
    for _ in 0..ID_RANDOM_LEN {
        id.push(ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char);
    }
    id
}

/// Whether `id` has the exact shape [`generate_geonlp_id`] produces for
/// `prefix`. `_n12abcd` belongs to dictionary -12, not to -1.
fn is_own_id(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix).is_some_and(|tail| {
        tail.len() == ID_RANDOM_LEN && tail.bytes().all(|b| b.is_ascii_alphanumeric())
    })
}

fn fresh_id(prefix: &str, seen: &mut HashSet<String>, rng: &mut impl Rng) -> String {
    loop {
        let candidate = generate_geonlp_id(prefix, rng);
        if seen.insert(candidate.clone()) {
            return candidate;
        }
    }
}

/// Counts reported back by [`assign_geonlp_ids`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdAssignment {
    pub rows: usize,
    pub kept: usize,
    pub generated: usize,
}

/// Validate an import CSV and give every row a `geonlp_id` unique within the file.
///
/// Without a `geonlp_id` column one is prepended and filled for every row.
/// With one, ids minted for this dictionary (`prefix` plus four random
/// characters) are kept, the first occurrence of a repeated id only, and
/// every other row gets a fresh id that collides with nothing else in the
/// file.
pub fn assign_geonlp_ids(
    csv_bytes: &[u8],
    prefix: &str,
    source_label: &str,
    rng: &mut impl Rng,
) -> Result<(Vec<u8>, IdAssignment), RepoError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(csv_bytes);
    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record?);
    }
    let mut rows = records.into_iter();
    let header = rows
        .next()
        .ok_or_else(|| RepoError::EmptyCsv(source_label.to_owned()))?;

    if !header.iter().any(|h| h == "entity_id") {
        return Err(RepoError::MissingEntityId(source_label.to_owned()));
    }
    let id_col = header.iter().position(|h| h == "geonlp_id");
    let data: Vec<csv::StringRecord> = rows.collect();

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    let mut stats = IdAssignment {
        rows: data.len(),
        ..IdAssignment::default()
    };
    let mut seen: HashSet<String> = HashSet::new();

    match id_col {
        None => {
            let mut out_header = vec!["geonlp_id"];
            out_header.extend(header.iter());
            writer.write_record(&out_header)?;
            for record in &data {
                let id = fresh_id(prefix, &mut seen, rng);
                let mut row = vec![id.as_str()];
                row.extend(record.iter());
                writer.write_record(&row)?;
                stats.generated += 1;
            }
        }
        Some(col) => {
            // Kept ids are reserved up front so that no generated id can
            // take one that appears later in the file.
            let reserved: HashSet<&str> = data
                .iter()
                .filter_map(|r| r.get(col))
                .filter(|id| is_own_id(id, prefix))
                .collect();
            seen.extend(reserved.iter().map(|s| s.to_string()));

            writer.write_record(&header)?;
            let mut kept: HashSet<&str> = HashSet::new();
            for record in &data {
                let current = record.get(col).unwrap_or("");
                let mut row: Vec<String> = record.iter().map(str::to_owned).collect();
                if is_own_id(current, prefix) && kept.insert(current) {
                    stats.kept += 1;
                } else {
                    let id = fresh_id(prefix, &mut seen, rng);
                    if col < row.len() {
                        row[col] = id;
                    } else {
                        row.resize(col, String::new());
                        row.push(id);
                    }
                    stats.generated += 1;
                }
                writer.write_record(&row)?;
            }
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| RepoError::Io(e.into_error()))?;
    debug!(
        source = source_label,
        rows = stats.rows,
        kept = stats.kept,
        generated = stats.generated,
        "assigned geonlp ids"
    );
    Ok((bytes, stats))
}

/// File stem used for imported payloads: the name with `/` replaced by `-`.
pub fn payload_stem(name: &str) -> String {
    name.replace('/', "-")
}
