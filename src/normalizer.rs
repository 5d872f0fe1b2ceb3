//! Record Normalizer
//!
//! Walks a parsed member artifact and yields one entry per publication.
//! Accepted shapes:
//! - `[ {...}, {...} ]` list of objects
//! - `[ "https://...", "10.1234/doi" ]` list of strings (coerced to `{url}`)
//! - `{ "publications": [...] }` (also `papers`, `items`, `results`)
//! - `{ ... }` a single publication object
//!
//! Anything else yields nothing. The iterator borrows the value, so calling
//! [`publications`] again restarts the walk.

use crate::record::{PublicationRecord, IDENTITY_KEYS};
use serde_json::{Map, Value};

/// Wrapper keys searched, in order, when an object is not itself a record.
pub const WRAPPER_KEYS: &[&str] = &["publications", "papers", "items", "results"];

/// One publication-like entry from an artifact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawEntry<'a> {
    /// A JSON object
    Object(&'a Map<String, Value>),
    /// A bare string, treated as a URL
    Url(&'a str),
    /// A list element of any other type
    Unsupported,
}

impl RawEntry<'_> {
    /// Decode into a canonical record; `None` means malformed.
    pub fn into_record(self) -> Option<PublicationRecord> {
        match self {
            RawEntry::Object(obj) => PublicationRecord::from_object(obj),
            RawEntry::Url(url) => PublicationRecord::from_url(url),
            RawEntry::Unsupported => None,
        }
    }
}

/// Lazy iterator over the entries of one artifact.
pub enum Publications<'a> {
    Single(Option<&'a Map<String, Value>>),
    List(std::slice::Iter<'a, Value>),
    Empty,
}

impl<'a> Iterator for Publications<'a> {
    type Item = RawEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Publications::Single(obj) => obj.take().map(RawEntry::Object),
            Publications::List(items) => items.next().map(|item| match item {
                Value::Object(obj) => RawEntry::Object(obj),
                Value::String(s) => RawEntry::Url(s),
                _ => RawEntry::Unsupported,
            }),
            Publications::Empty => None,
        }
    }
}

/// Start walking the publications contained in `value`.
pub fn publications(value: &Value) -> Publications<'_> {
    match value {
        Value::Array(items) => Publications::List(items.iter()),
        Value::Object(obj) => {
            if IDENTITY_KEYS.iter().any(|key| obj.contains_key(*key)) {
                return Publications::Single(Some(obj));
            }
            WRAPPER_KEYS
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_array))
                .map(|items| Publications::List(items.iter()))
                .unwrap_or(Publications::Empty)
        }
        _ => Publications::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_of_objects_and_strings() {
        let value = json!([{"title": "A"}, "https://doi.org/10.1/x", 42]);
        let entries: Vec<_> = publications(&value).collect();
        assert_eq!(entries.len(), 3);
        assert!(matches!(entries[0], RawEntry::Object(_)));
        assert_eq!(entries[1], RawEntry::Url("https://doi.org/10.1/x"));
        assert_eq!(entries[2], RawEntry::Unsupported);

        let record = entries[1].into_record().unwrap();
        assert_eq!(record.url.as_deref(), Some("https://doi.org/10.1/x"));
        assert!(entries[2].into_record().is_none());
    }

    #[test]
    fn test_single_record_object() {
        let value = json!({"doi": "10.1/x", "publications": [{"title": "ignored"}]});
        let entries: Vec<_> = publications(&value).collect();
        assert_eq!(entries.len(), 1);
        let record = entries[0].into_record().unwrap();
        assert_eq!(record.doi.as_deref(), Some("10.1/x"));
    }

    #[test]
    fn test_first_wrapper_key_wins() {
        let value = json!({
            "source": "semantic_scholar",
            "papers": [{"title": "from papers"}],
            "items": [{"title": "from items"}, {"title": "second"}]
        });
        let titles: Vec<_> = publications(&value)
            .filter_map(RawEntry::into_record)
            .filter_map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["from papers"]);
    }

    #[test]
    fn test_wrapper_that_is_not_a_list_is_skipped() {
        let value = json!({"publications": "none", "results": [{"url": "u"}]});
        assert_eq!(publications(&value).count(), 1);
    }

    #[test]
    fn test_unrecognised_shapes_yield_nothing() {
        assert_eq!(publications(&json!("just a string")).count(), 0);
        assert_eq!(publications(&json!(null)).count(), 0);
        assert_eq!(publications(&json!({"meta": {"count": 3}})).count(), 0);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let value = json!([{"title": "A"}, {"title": "B"}]);
        assert_eq!(publications(&value).count(), 2);
        assert_eq!(publications(&value).count(), 2);
    }
}
