//! Selection predicates over descriptors: the `--creator` / `--subject`
//! filter and the name patterns accepted by `add` and `delete`.

use geodic_types::Descriptor;
use regex::Regex;

use crate::error::RepoError;

/// Optional creator and subject constraints; an empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct DictionaryFilter {
    creator: Option<String>,
    subject: Option<Regex>,
}

impl DictionaryFilter {
    pub fn new(creator: Option<&str>, subject: Option<&str>) -> Result<Self, RepoError> {
        Ok(Self {
            creator: creator
                .filter(|c| !c.is_empty())
                .map(|c| c.to_lowercase()),
            subject: subject.filter(|s| !s.is_empty()).map(Regex::new).transpose()?,
        })
    }

    /// Creator: case-insensitive substring of the creator or of the name.
    /// Subject: the regex matches at least one subject tag.
    pub fn matches(&self, descriptor: &Descriptor) -> bool {
        if let Some(creator) = &self.creator {
            let hit = descriptor.creator.to_lowercase().contains(creator)
                || descriptor.name().to_lowercase().contains(creator);
            if !hit {
                return false;
            }
        }
        match &self.subject {
            Some(subject) => descriptor.subject.iter().any(|tag| subject.is_match(tag)),
            None => true,
        }
    }
}

/// A dictionary selector: `/regex/` or a case-insensitive exact name.
#[derive(Debug, Clone)]
pub enum NamePattern {
    Exact(String),
    Regex(Regex),
}

impl NamePattern {
    pub fn parse(raw: &str) -> Result<Self, RepoError> {
        if raw.len() >= 2 && raw.starts_with('/') && raw.ends_with('/') {
            let body = &raw[1..raw.len() - 1];
            return Ok(Self::Regex(Regex::new(body)?));
        }
        Ok(Self::Exact(raw.to_lowercase()))
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(expected) => name.to_lowercase() == *expected,
            Self::Regex(re) => re.is_match(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodic_types::InternalId;

    fn descriptor(identifier: &str, creator: &str, subjects: &[&str]) -> Descriptor {
        let mut d = Descriptor::new_local(identifier, InternalId::from_raw(1), "t");
        d.creator = creator.to_owned();
        d.subject = subjects.iter().map(|s| s.to_string()).collect();
        d
    }

    #[test]
    fn creator_matches_creator_or_name_ignoring_case() {
        let f = DictionaryFilter::new(Some("GEONLP"), None).unwrap();
        assert!(f.matches(&descriptor("geonlp/world_country", "someone", &[])));
        assert!(f.matches(&descriptor("x/y", "GeoNLP Project", &[])));
        assert!(!f.matches(&descriptor("local/y", "local", &[])));
    }

    #[test]
    fn subject_regex_matches_any_tag() {
        let f = DictionaryFilter::new(None, Some("^Rail")).unwrap();
        assert!(f.matches(&descriptor("a/b", "c", &["Station", "Railway"])));
        assert!(!f.matches(&descriptor("a/b", "c", &["Station"])));
        assert!(!f.matches(&descriptor("a/b", "c", &[])));
    }

    #[test]
    fn empty_filter_matches_everything() {
        let f = DictionaryFilter::new(Some(""), None).unwrap();
        assert!(f.matches(&descriptor("a/b", "c", &[])));
    }

    #[test]
    fn bad_subject_regex_is_rejected() {
        assert!(matches!(
            DictionaryFilter::new(None, Some("(")),
            Err(RepoError::Regex(_))
        ));
    }

    #[test]
    fn name_patterns() {
        let exact = NamePattern::parse("GeoNLP/World_Country").unwrap();
        assert!(exact.matches("geonlp/world_country"));
        assert!(!exact.matches("geonlp/world_country2"));

        let re = NamePattern::parse("/^geonlp/japan_/").unwrap();
        assert!(re.matches("geonlp/japan_pref"));
        assert!(!re.matches("local/japan_pref"));

        // A lone slash is a literal name, not an empty regex.
        assert!(matches!(NamePattern::parse("/").unwrap(), NamePattern::Exact(_)));
    }
}
