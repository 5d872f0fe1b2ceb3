//! Category Classifier
//!
//! Layered decision chain, first non-empty result wins:
//! 1. manual override ([`OverrideStore`])
//! 2. structured-field mapping ([`mapping::StructuredMapping`])
//! 3. keyword rules ([`rules::KeywordRules`])
//! 4. statistical zero-shot scoring ([`statistical`]), batched by the pipeline
//! 5. the configured default category
//!
//! Layers 1-3 are cheap and run per record through [`CategoryClassifier`].
//! Layer 4 runs only on the residual set because it calls out to a scorer.

pub mod mapping;
pub mod rules;
pub mod statistical;

use crate::error::Result;
use crate::identity::Identity;
use crate::overrides::OverrideStore;
use crate::record::PublicationRecord;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Which layer produced an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentSource {
    Override,
    StructuredMapping,
    KeywordRule,
    Statistical,
    /// No layer produced a category; the configured default was applied.
    Default,
}

impl AssignmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentSource::Override => "override",
            AssignmentSource::StructuredMapping => "structured-mapping",
            AssignmentSource::KeywordRule => "keyword-rule",
            AssignmentSource::Statistical => "statistical",
            AssignmentSource::Default => "default",
        }
    }
}

impl fmt::Display for AssignmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classification layer.
pub trait Strategy: Send + Sync {
    /// Tag recorded on assignments this layer produces.
    fn source(&self) -> AssignmentSource;

    /// Categories for the record, or `None` to fall through to the next layer.
    fn attempt(&self, identity: &Identity, record: &PublicationRecord) -> Option<Vec<String>>;
}

impl Strategy for OverrideStore {
    fn source(&self) -> AssignmentSource {
        AssignmentSource::Override
    }

    fn attempt(&self, identity: &Identity, _record: &PublicationRecord) -> Option<Vec<String>> {
        self.get(identity).map(<[String]>::to_vec)
    }
}

/// Outcome of classifying one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Sorted, de-duplicated, never empty
    pub categories: Vec<String>,
    pub source: AssignmentSource,
    /// Raw scorer probabilities in label order; statistical layer only
    pub scores: Vec<(String, f64)>,
}

impl Decision {
    /// Returns `None` when `categories` holds no usable name.
    pub fn new<I, S>(categories: I, source: AssignmentSource) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let categories: Vec<String> = categories
            .into_iter()
            .map(Into::into)
            .filter(|c| !c.trim().is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        (!categories.is_empty()).then_some(Self {
            categories,
            source,
            scores: Vec::new(),
        })
    }

    /// Default-category assignment for records no layer could classify.
    pub fn fallback(default_category: &str) -> Self {
        Self {
            categories: vec![default_category.to_string()],
            source: AssignmentSource::Default,
            scores: Vec::new(),
        }
    }
}

/// Ordered chain of the cheap layers.
pub struct CategoryClassifier {
    strategies: Vec<Box<dyn Strategy>>,
}

impl CategoryClassifier {
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    /// Override -> structured mapping -> keyword rules.
    pub fn standard(overrides: OverrideStore) -> Result<Self> {
        Ok(Self::new(vec![
            Box::new(overrides),
            Box::new(mapping::StructuredMapping::new()),
            Box::new(rules::KeywordRules::new()?),
        ]))
    }

    /// First layer with a non-empty answer, or `None` if the record needs
    /// the statistical layer.
    pub fn classify(&self, identity: &Identity, record: &PublicationRecord) -> Option<Decision> {
        self.strategies.iter().find_map(|strategy| {
            strategy
                .attempt(identity, record)
                .and_then(|cats| Decision::new(cats, strategy.source()))
        })
    }
}
