//! Statistical scorer boundary.
//!
//! The zero-shot model is consumed as a black box: texts plus candidate
//! labels in, independent per-label probabilities out (multi-label, not
//! normalized across labels). Backends:
//!
//! - [`zero_shot::ZeroShotClient`] - hosted zero-shot inference endpoint
//! - [`llm::LlmScorer`] - OpenAI-compatible chat completion endpoint

pub mod llm;
pub mod zero_shot;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Probability that one label applies to one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// External multi-label scorer.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Score every text against every label.
    ///
    /// Returns one list per input text, in input order, ranked by descending
    /// probability.
    async fn score(
        &self,
        texts: &[String],
        labels: &[String],
        hypothesis_template: &str,
    ) -> Result<Vec<Vec<LabelScore>>>;
}

/// Sort descending by score, keeping the given order among equal scores.
pub fn rank(mut scores: Vec<LabelScore>) -> Vec<LabelScore> {
    scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scores
}
