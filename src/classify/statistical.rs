//! Statistical zero-shot layer.
//!
//! Runs only on records the cheap layers left unclassified. Texts go to the
//! scorer in fixed-size batches, one batch at a time. Any scorer failure
//! aborts the run.

use super::{AssignmentSource, Decision};
use crate::config::ClassifierConfig;
use crate::error::{PubcatError, Result};
use crate::labels::CategoryLabels;
use crate::record::PublicationRecord;
use crate::scorer::{LabelScore, Scorer};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Scorer input for one record: title, venue clause, abstract excerpt.
pub fn build_prompt(record: &PublicationRecord, excerpt_chars: usize) -> String {
    let mut text = record.title.as_deref().unwrap_or_default().trim().to_string();
    if let Some(venue) = record.venue.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        text.push_str(&format!(". Venue: {}.", venue));
    }
    if let Some(abstract_text) = record
        .abstract_text
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
    {
        let excerpt: String = abstract_text.chars().take(excerpt_chars).collect();
        text.push_str(&format!(" Abstract: {}", excerpt));
    }
    if text.is_empty() {
        // URL-only records still need something to score.
        text = record.url.clone().or_else(|| record.doi.clone()).unwrap_or_default();
    }
    text
}

/// Pick categories from one text's scores.
///
/// Scores are read in label-set order and penalized per category. Labels at
/// or above the threshold are kept; if none clears it, the single best
/// label is kept (earliest label on ties). The result is capped at top-K by
/// adjusted score. Returns `None` if the scorer returned no known label.
pub fn select(
    scored: &[LabelScore],
    labels: &CategoryLabels,
    config: &ClassifierConfig,
) -> Option<Decision> {
    let raw: Vec<(&str, f64)> = labels
        .iter()
        .filter_map(|label| {
            scored
                .iter()
                .find(|s| s.label == label)
                .map(|s| (label, if s.score.is_finite() { s.score.clamp(0.0, 1.0) } else { 0.0 }))
        })
        .collect();

    let adjusted: Vec<(&str, f64)> = raw
        .iter()
        .map(|(label, score)| (*label, (score - config.penalty(label)).max(0.0)))
        .collect();

    let mut kept: Vec<(&str, f64)> = adjusted
        .iter()
        .copied()
        .filter(|(_, score)| *score >= config.threshold)
        .collect();

    if kept.is_empty() {
        let mut best: Option<(&str, f64)> = None;
        for &(label, score) in &adjusted {
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((label, score));
            }
        }
        kept.extend(best);
    }

    kept.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    kept.truncate(config.top_k);

    let mut decision = Decision::new(kept.iter().map(|(label, _)| *label), AssignmentSource::Statistical)?;
    decision.scores = raw.iter().map(|(label, score)| (label.to_string(), *score)).collect();
    Some(decision)
}

/// Batched access to the scorer with the run's labels and thresholds.
pub struct StatisticalLayer<'a> {
    scorer: &'a dyn Scorer,
    labels: &'a CategoryLabels,
    config: &'a ClassifierConfig,
}

impl<'a> StatisticalLayer<'a> {
    pub fn new(scorer: &'a dyn Scorer, labels: &'a CategoryLabels, config: &'a ClassifierConfig) -> Self {
        Self {
            scorer,
            labels,
            config,
        }
    }

    /// Classify records in order; one decision per record.
    pub async fn classify_all(&self, records: &[&PublicationRecord]) -> Result<Vec<Decision>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let batch_size = self.config.batch_size.max(1);
        let total_batches = records.len().div_ceil(batch_size);
        info!(
            records = records.len(),
            batches = total_batches,
            scorer = self.scorer.name(),
            "Starting statistical classification"
        );

        let mut decisions = Vec::with_capacity(records.len());
        for (batch_idx, chunk) in records.chunks(batch_size).enumerate() {
            let texts: Vec<String> = chunk
                .iter()
                .map(|r| build_prompt(r, self.config.excerpt_chars))
                .collect();

            let results = self
                .scorer
                .score(&texts, self.labels.as_slice(), &self.config.hypothesis_template)
                .await?;

            if results.len() != texts.len() {
                return Err(PubcatError::Scorer(format!(
                    "batch {}: expected {} results, got {}",
                    batch_idx + 1,
                    texts.len(),
                    results.len()
                )));
            }

            for (text, scored) in texts.iter().zip(&results) {
                let decision = select(scored, self.labels, self.config).ok_or_else(|| {
                    PubcatError::Scorer(format!(
                        "no scores for any candidate label (text: {})",
                        text.chars().take(50).collect::<String>()
                    ))
                })?;
                decisions.push(decision);
            }

            debug!(batch = batch_idx + 1, total_batches, "Batch classified");
        }

        Ok(decisions)
    }
}
