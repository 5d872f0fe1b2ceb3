//! Canonical publication record.
//!
//! Upstream providers disagree on field names and types (`paperId` vs
//! `sourceId`, integer vs string years, topic objects vs plain names), so
//! fields are read one at a time from the JSON object. A field with an
//! unexpected type is treated as absent instead of failing the whole record.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Keys whose presence marks a JSON object as a single publication.
pub const IDENTITY_KEYS: &[&str] = &["sourceId", "paperId", "doi", "url", "title"];

/// One bibliographic item as seen from one upstream source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationRecord {
    pub source_id: Option<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub venue: Option<String>,
    pub year: Option<i32>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub structured_topics: Vec<String>,
    pub fields_of_study: Vec<String>,
}

impl PublicationRecord {
    /// Decode a record from a JSON object.
    ///
    /// Returns `None` when none of the identity-bearing fields
    /// (`sourceId`, `doi`, `url`, `title`) is populated.
    pub fn from_object(obj: &Map<String, Value>) -> Option<Self> {
        let doi = text_field(obj, &["doi"]).or_else(|| {
            obj.get("externalIds")
                .and_then(Value::as_object)
                .and_then(|ids| text_field(ids, &["DOI", "doi"]))
        });

        let record = Self {
            source_id: text_field(obj, &["sourceId", "paperId"]),
            doi,
            url: text_field(obj, &["url"]),
            title: text_field(obj, &["title"]),
            venue: text_field(obj, &["venue", "publication"]),
            year: obj.get("year").and_then(loose_year),
            abstract_text: text_field(obj, &["abstract"]),
            structured_topics: name_list(obj, &["structuredTopics", "topics"], &["topic", "name"]),
            fields_of_study: name_list(obj, &["fieldsOfStudy"], &["category", "name"]),
        };

        record.has_identity().then_some(record)
    }

    /// Record built from a bare string entry (URL or DOI link).
    pub fn from_url(url: &str) -> Option<Self> {
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        Some(Self {
            url: Some(url.to_string()),
            ..Default::default()
        })
    }

    /// At least one identity-bearing field is present.
    pub fn has_identity(&self) -> bool {
        self.source_id.is_some() || self.doi.is_some() || self.url.is_some() || self.title.is_some()
    }

    /// Number of populated fields, used by the most-complete dedup policy.
    pub fn completeness(&self) -> usize {
        [
            self.source_id.is_some(),
            self.doi.is_some(),
            self.url.is_some(),
            self.title.is_some(),
            self.venue.is_some(),
            self.year.is_some(),
            self.abstract_text.is_some(),
            !self.structured_topics.is_empty(),
            !self.fields_of_study.is_empty(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

/// First non-empty trimmed string (or integer rendered as string) among `keys`.
fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Years arrive as integers or digit strings depending on the provider.
fn loose_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
                s.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Collect names from a list of strings or objects, de-duplicated
/// case-insensitively in first-seen order.
fn name_list(obj: &Map<String, Value>, keys: &[&str], name_keys: &[&str]) -> Vec<String> {
    let Some(items) = keys
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_array))
    else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(o) => text_field(o, name_keys),
            _ => None,
        })
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_lowercase()))
        .collect()
}
