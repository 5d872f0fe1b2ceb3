//! Deduplicator
//!
//! Folds records from every member artifact into one identity-keyed
//! collection. Identities keep the position at which they were first seen,
//! so output order follows input order (artifacts sorted by path).

use crate::identity::Identity;
use crate::record::PublicationRecord;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Which record represents an identity when several share it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DedupPolicy {
    /// Keep the first record seen; later ones are discarded.
    #[default]
    FirstSeen,
    /// Replace the representative when a later record populates strictly more fields.
    MostComplete,
}

/// Identity-keyed collection of representative records, in first-seen order.
#[derive(Debug, Default)]
pub struct Deduplicator {
    policy: DedupPolicy,
    index: HashMap<Identity, usize>,
    entries: Vec<(Identity, PublicationRecord)>,
    duplicates: usize,
}

impl Deduplicator {
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Fold one record into the collection.
    pub fn insert(&mut self, identity: Identity, record: PublicationRecord) {
        match self.index.get(&identity) {
            Some(&pos) => {
                self.duplicates += 1;
                let current = &mut self.entries[pos].1;
                if self.policy == DedupPolicy::MostComplete
                    && record.completeness() > current.completeness()
                {
                    debug!(identity = %identity, "Replacing representative with richer record");
                    *current = record;
                }
            }
            None => {
                self.index.insert(identity.clone(), self.entries.len());
                self.entries.push((identity, record));
            }
        }
    }

    /// Number of distinct identities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records folded into an existing identity.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Representatives in first-seen order.
    pub fn into_entries(self) -> Vec<(Identity, PublicationRecord)> {
        self.entries
    }
}

impl Extend<(Identity, PublicationRecord)> for Deduplicator {
    fn extend<I: IntoIterator<Item = (Identity, PublicationRecord)>>(&mut self, iter: I) {
        for (identity, record) in iter {
            self.insert(identity, record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse(title: &str) -> PublicationRecord {
        PublicationRecord {
            doi: Some("10.3/EF".to_string()),
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    fn rich(title: &str) -> PublicationRecord {
        PublicationRecord {
            venue: Some("Optica".to_string()),
            year: Some(2022),
            abstract_text: Some("An abstract.".to_string()),
            ..sparse(title)
        }
    }

    fn fold(policy: DedupPolicy, records: Vec<PublicationRecord>) -> Vec<(Identity, PublicationRecord)> {
        let mut dedup = Deduplicator::new(policy);
        dedup.extend(records.into_iter().map(|r| (Identity::resolve(&r).unwrap(), r)));
        dedup.into_entries()
    }

    #[test]
    fn test_first_seen_wins() {
        let entries = fold(DedupPolicy::FirstSeen, vec![sparse("first"), rich("second")]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0.as_str(), "DOI:10.3/ef");
        assert_eq!(entries[0].1.title.as_deref(), Some("first"));
        assert_eq!(entries[0].1.venue, None);
    }

    #[test]
    fn test_most_complete_replaces_but_keeps_position() {
        let other = PublicationRecord {
            url: Some("https://example.org/other".to_string()),
            ..Default::default()
        };
        let entries = fold(
            DedupPolicy::MostComplete,
            vec![sparse("first"), other, rich("second"), sparse("third")],
        );
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].1.title.as_deref(), Some("second"));
        assert_eq!(entries[1].0.as_str(), "https://example.org/other");
    }

    #[test]
    fn test_duplicate_count() {
        let mut dedup = Deduplicator::new(DedupPolicy::FirstSeen);
        for r in [sparse("a"), sparse("b"), sparse("c")] {
            dedup.insert(Identity::resolve(&r).unwrap(), r);
        }
        assert_eq!(dedup.len(), 1);
        assert_eq!(dedup.duplicates(), 2);
    }
}
