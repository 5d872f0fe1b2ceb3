//! Keyword rule layer.
//!
//! Ordered regex rules over the lowercased `title venue abstract` haystack.
//! Every matching rule contributes its category.

use super::{AssignmentSource, Strategy};
use crate::error::{PubcatError, Result};
use crate::identity::Identity;
use crate::record::PublicationRecord;
use regex::Regex;

/// (pattern, category) in evaluation order.
pub const RULES: &[(&str, &str)] = &[
    (
        r"\b(?:key distribution|qkd|bb84|decoy|quantum networks?|quantum repeaters?|satellites?)\b",
        "Quantum Communication",
    ),
    (
        r"\b(?:nonlinear|non-linear|second[- ]harmonic|four[- ]wave|parametric down[- ]conversion)\b|\bchi\([23]\)",
        "Quantum Nonlinear Optics",
    ),
    (
        r"\b(?:light[-– ]?matter|atom(?:s|ic)?|ions?|cavity|cavities|rydberg|emitters?)\b",
        "Quantum Light–Matter Interaction",
    ),
    (
        r"\b(?:quantum simulations?|simulators?|hubbard|ising|lattices?)\b",
        "Quantum Simulation",
    ),
    (
        r"\b(?:photonics?|waveguides?|ring resonators?|integrated optics|optical circuits?)\b",
        "Photonic QIP",
    ),
    (
        r"\b(?:ultrafast|femtosecond|picosecond|attosecond|pump[- ]probe)\b",
        "Ultrafast Quantum Photonics",
    ),
    (
        r"\b(?:kernels?|gaussian process(?:es)?|graph neural|neural networks?|machine learning|deep learning|reinforcement)\b",
        "Machine Learning",
    ),
];

/// Compiled [`RULES`].
pub struct KeywordRules {
    rules: Vec<(Regex, &'static str)>,
}

impl KeywordRules {
    pub fn new() -> Result<Self> {
        Self::from_table(RULES)
    }

    pub fn from_table(table: &[(&str, &'static str)]) -> Result<Self> {
        let rules = table
            .iter()
            .map(|(pattern, category)| {
                Regex::new(pattern)
                    .map(|re| (re, *category))
                    .map_err(|e| PubcatError::Config(format!("invalid rule for {}: {}", category, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Categories of every rule matching the record, in rule order.
    pub fn matches(&self, record: &PublicationRecord) -> Vec<&'static str> {
        let haystack = haystack(record);
        let mut hits: Vec<&'static str> = Vec::new();
        for (re, category) in &self.rules {
            if re.is_match(&haystack) && !hits.contains(category) {
                hits.push(*category);
            }
        }
        hits
    }
}

impl Strategy for KeywordRules {
    fn source(&self) -> AssignmentSource {
        AssignmentSource::KeywordRule
    }

    fn attempt(&self, _identity: &Identity, record: &PublicationRecord) -> Option<Vec<String>> {
        let hits = self.matches(record);
        (!hits.is_empty()).then(|| hits.into_iter().map(String::from).collect())
    }
}

fn haystack(record: &PublicationRecord) -> String {
    [&record.title, &record.venue, &record.abstract_text]
        .iter()
        .map(|field| field.as_deref().unwrap_or_default().to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titled(title: &str) -> PublicationRecord {
        PublicationRecord {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    fn rules() -> KeywordRules {
        KeywordRules::new().unwrap()
    }

    #[test]
    fn test_satellite_qkd_is_communication_only() {
        let hits = rules().matches(&titled("Quantum key distribution over satellite links"));
        assert_eq!(hits, vec!["Quantum Communication"]);
    }

    #[test]
    fn test_multiple_rules_union() {
        let record = PublicationRecord {
            title: Some("Femtosecond pulses in lithium niobate waveguides".to_string()),
            venue: Some("Optica".to_string()),
            abstract_text: Some("We observe Second-Harmonic generation driven by chi(2) processes.".to_string()),
            ..Default::default()
        };
        let hits = rules().matches(&record);
        assert_eq!(
            hits,
            vec!["Quantum Nonlinear Optics", "Photonic QIP", "Ultrafast Quantum Photonics"]
        );
    }

    #[test]
    fn test_word_boundaries() {
        // "ion" inside "distribution", "lattice" inside "satellite"
        assert!(!rules().matches(&titled("Entanglement distribution")).contains(&"Quantum Light–Matter Interaction"));
        assert!(rules().matches(&titled("Trapped ions and Rydberg atoms"))
            .contains(&"Quantum Light–Matter Interaction"));
        assert!(rules().matches(&titled("A history of the laboratory")).is_empty());
    }

    #[test]
    fn test_stems_match_compound_terms() {
        assert_eq!(rules().matches(&titled("Decoy-state protocols")), vec!["Quantum Communication"]);
        assert_eq!(rules().matches(&titled("Four-wave processes")), vec!["Quantum Nonlinear Optics"]);
        assert_eq!(rules().matches(&titled("Reinforcement agents")), vec!["Machine Learning"]);
        assert_eq!(
            rules().matches(&titled("Atomic clocks")),
            vec!["Quantum Light–Matter Interaction"]
        );
    }

    #[test]
    fn test_venue_and_abstract_are_searched() {
        let record = PublicationRecord {
            url: Some("https://example.org".to_string()),
            venue: Some("Conference on Machine Learning".to_string()),
            ..Default::default()
        };
        assert_eq!(rules().matches(&record), vec!["Machine Learning"]);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let result = KeywordRules::from_table(&[("(unclosed", "Broken")]);
        assert!(matches!(result, Err(PubcatError::Config(_))));
    }
}
