//! Structured-field mapping layer.
//!
//! Maps the topic labels an upstream source already attached to a record
//! (its own topics, then its coarse fields of study) onto site categories.

use super::{AssignmentSource, Strategy};
use crate::identity::Identity;
use crate::record::PublicationRecord;
use std::collections::{HashMap, HashSet};

/// Upstream topic or discipline name -> site category.
pub const TOPIC_MAP: &[(&str, &str)] = &[
    // Coarse fields of study
    ("Quantum computing", "Quantum Computing"),
    ("Quantum information", "Quantum Information"),
    ("Quantum communication", "Quantum Communication"),
    ("Optics", "Photonics"),
    ("Photonics", "Photonics"),
    ("Machine learning", "Machine Learning"),
    ("Computer science", "Machine Learning"),
    ("Electrical engineering", "Photonics"),
    ("Physics", "Quantum Information"),
    // Finer topic names
    ("Quantum key distribution", "Quantum Communication"),
    ("Quantum cryptography", "Quantum Communication"),
    ("Quantum network", "Quantum Communication"),
    ("Nonlinear optics", "Quantum Nonlinear Optics"),
    ("Spontaneous parametric down-conversion", "Quantum Nonlinear Optics"),
    ("Cavity quantum electrodynamics", "Quantum Light–Matter Interaction"),
    ("Rydberg atom", "Quantum Light–Matter Interaction"),
    ("Quantum simulator", "Quantum Simulation"),
    ("Quantum simulation", "Quantum Simulation"),
    ("Integrated photonics", "Photonic QIP"),
    ("Linear optical quantum computing", "Photonic QIP"),
    ("Ultrafast optics", "Ultrafast Quantum Photonics"),
    ("Ultrashort pulse", "Ultrafast Quantum Photonics"),
    ("Quantum machine learning", "Quantum Machine Learning"),
    ("Artificial intelligence", "Machine Learning"),
    ("Artificial neural network", "Machine Learning"),
];

/// Case-insensitive lookup over [`TOPIC_MAP`].
pub struct StructuredMapping {
    table: HashMap<String, &'static str>,
}

impl Default for StructuredMapping {
    fn default() -> Self {
        Self::new()
    }
}

impl StructuredMapping {
    pub fn new() -> Self {
        Self {
            table: TOPIC_MAP
                .iter()
                .map(|(topic, category)| (topic.to_lowercase(), *category))
                .collect(),
        }
    }

    /// Category for one upstream name, if known.
    pub fn lookup(&self, topic: &str) -> Option<&'static str> {
        self.table.get(&topic.trim().to_lowercase()).copied()
    }

    /// Mapped categories in first-seen order, without repeats.
    pub fn map_record(&self, record: &PublicationRecord) -> Vec<&'static str> {
        let mut seen = HashSet::new();
        record
            .structured_topics
            .iter()
            .chain(&record.fields_of_study)
            .filter_map(|topic| self.lookup(topic))
            .filter(|category| seen.insert(*category))
            .collect()
    }
}

impl Strategy for StructuredMapping {
    fn source(&self) -> AssignmentSource {
        AssignmentSource::StructuredMapping
    }

    fn attempt(&self, _identity: &Identity, record: &PublicationRecord) -> Option<Vec<String>> {
        let mapped = self.map_record(record);
        (!mapped.is_empty()).then(|| mapped.into_iter().map(String::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let mapping = StructuredMapping::new();
        assert_eq!(mapping.lookup("Computer Science"), Some("Machine Learning"));
        assert_eq!(mapping.lookup("computer science"), Some("Machine Learning"));
        assert_eq!(mapping.lookup(" OPTICS "), Some("Photonics"));
        assert_eq!(mapping.lookup("Sociology"), None);
    }

    #[test]
    fn test_topics_before_fields_and_deduped() {
        let record = PublicationRecord {
            title: Some("t".to_string()),
            structured_topics: vec!["Quantum key distribution".to_string(), "Unknown".to_string()],
            fields_of_study: vec!["Optics".to_string(), "Quantum communication".to_string(), "Photonics".to_string()],
            ..Default::default()
        };
        let mapped = StructuredMapping::new().map_record(&record);
        assert_eq!(mapped, vec!["Quantum Communication", "Photonics"]);
    }

    #[test]
    fn test_no_known_topics_falls_through() {
        let record = PublicationRecord {
            title: Some("t".to_string()),
            fields_of_study: vec!["History".to_string()],
            ..Default::default()
        };
        let id = Identity::resolve(&record).unwrap();
        assert!(StructuredMapping::new().attempt(&id, &record).is_none());
    }
}
