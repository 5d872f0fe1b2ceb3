//! Key Resolver
//!
//! Derives the canonical identity used to join records across sources and
//! with the website. Precedence, first non-empty wins:
//! `S2:<sourceId>` -> `DOI:<normalized doi>` -> raw url -> `TITLE:<title prefix>`.

use crate::record::PublicationRecord;
use serde::Serialize;
use std::fmt;

/// Maximum number of title characters kept in a title-derived identity.
pub const TITLE_KEY_CHARS: usize = 120;

const DOI_RESOLVER_PREFIX: &str = "https://doi.org/";
const DOI_SCHEME_PREFIX: &str = "doi:";

/// Canonical string naming one publication across all sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Resolve the identity of a record.
    ///
    /// Returns `None` only for records with no identity-bearing field, which
    /// callers count as malformed.
    pub fn resolve(record: &PublicationRecord) -> Option<Self> {
        if let Some(id) = non_empty(record.source_id.as_deref()) {
            return Some(Self(format!("S2:{}", id)));
        }

        let doi = record.doi.as_deref().map(normalize_doi).unwrap_or_default();
        if !doi.is_empty() {
            return Some(Self(format!("DOI:{}", doi)));
        }

        if let Some(url) = non_empty(record.url.as_deref()) {
            return Some(Self(url.to_string()));
        }

        non_empty(record.title.as_deref()).map(|title| {
            let prefix: String = title.to_lowercase().chars().take(TITLE_KEY_CHARS).collect();
            Self(format!("TITLE:{}", prefix))
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a DOI: trim, lowercase, then strip the resolver URL and the
/// `doi:` scheme, in that order. Idempotent.
pub fn normalize_doi(raw: &str) -> String {
    let mut doi = raw.trim().to_lowercase();
    if let Some(rest) = doi.strip_prefix(DOI_RESOLVER_PREFIX) {
        doi = rest.to_string();
    }
    if let Some(rest) = doi.strip_prefix(DOI_SCHEME_PREFIX) {
        doi = rest.to_string();
    }
    doi.trim().to_string()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(doi: Option<&str>, url: Option<&str>, title: Option<&str>) -> PublicationRecord {
        PublicationRecord {
            doi: doi.map(String::from),
            url: url.map(String::from),
            title: title.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_doi_variants_share_identity() {
        let variants = ["10.1/X", "https://doi.org/10.1/X", "DOI:10.1/x", " doi:10.1/X "];
        let ids: Vec<_> = variants
            .iter()
            .map(|d| Identity::resolve(&record(Some(d), None, None)).unwrap())
            .collect();
        assert!(ids.iter().all(|id| id.as_str() == "DOI:10.1/x"));
    }

    #[test]
    fn test_normalize_doi_is_idempotent() {
        let once = normalize_doi("https://doi.org/10.1103/PhysRevLett.1");
        assert_eq!(once, "10.1103/physrevlett.1");
        assert_eq!(normalize_doi(&once), once);
    }

    #[test]
    fn test_precedence() {
        let mut r = record(Some("10.1/x"), Some("https://example.org"), Some("Title"));
        r.source_id = Some("abc".to_string());
        assert_eq!(Identity::resolve(&r).unwrap().as_str(), "S2:abc");

        r.source_id = None;
        assert_eq!(Identity::resolve(&r).unwrap().as_str(), "DOI:10.1/x");

        r.doi = Some("https://doi.org/".to_string());
        assert_eq!(Identity::resolve(&r).unwrap().as_str(), "https://example.org");

        r.url = None;
        assert_eq!(Identity::resolve(&r).unwrap().as_str(), "TITLE:title");
    }

    #[test]
    fn test_title_prefix_is_capped() {
        let long = "Ä".repeat(200);
        let id = Identity::resolve(&record(None, None, Some(&long))).unwrap();
        assert_eq!(id.as_str().chars().count(), "TITLE:".len() + TITLE_KEY_CHARS);
        assert!(id.as_str().starts_with("TITLE:ä"));
    }

    #[test]
    fn test_no_identity() {
        assert!(Identity::resolve(&record(None, Some("  "), None)).is_none());
    }

    #[test]
    fn test_resolve_is_stable() {
        let r = record(None, None, Some("Quantum Key Distribution"));
        assert_eq!(Identity::resolve(&r), Identity::resolve(&r));
    }
}
