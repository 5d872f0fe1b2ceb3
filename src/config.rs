//! Run configuration.
//!
//! Built once at start-up (defaults, optional JSON file, CLI overrides) and
//! passed by reference into the classifier and the pipeline driver.

use crate::dedup::DedupPolicy;
use crate::error::{PubcatError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default score threshold for the statistical layer
pub const DEFAULT_THRESHOLD: f64 = 0.35;

/// Default maximum number of statistical labels kept per record
pub const DEFAULT_TOP_K: usize = 3;

/// Default number of texts per scorer call
pub const DEFAULT_BATCH_SIZE: usize = 8;

/// Default abstract excerpt length, in characters
pub const DEFAULT_EXCERPT_CHARS: usize = 400;

/// Default zero-shot hypothesis; `{}` is replaced by the label
pub const DEFAULT_HYPOTHESIS: &str = "This paper is about {}.";

/// Category assigned when every layer comes up empty
pub const DEFAULT_CATEGORY: &str = "Other";

/// Classification tuning constants.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Minimum adjusted score for a statistical label to be kept
    pub threshold: f64,
    /// Maximum statistical labels per record
    pub top_k: usize,
    /// Texts per scorer call
    pub batch_size: usize,
    /// Abstract characters included in the scorer prompt
    pub excerpt_chars: usize,
    pub hypothesis_template: String,
    /// Subtracted from the scores of broad umbrella categories before filtering
    pub penalties: Vec<(String, f64)>,
    pub default_category: String,
    pub dedup_policy: DedupPolicy,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            top_k: DEFAULT_TOP_K,
            batch_size: DEFAULT_BATCH_SIZE,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            hypothesis_template: DEFAULT_HYPOTHESIS.to_string(),
            penalties: vec![
                ("Quantum Information".to_string(), 0.05),
                ("Photonics".to_string(), 0.05),
                ("Other".to_string(), 0.10),
            ],
            default_category: DEFAULT_CATEGORY.to_string(),
            dedup_policy: DedupPolicy::FirstSeen,
        }
    }
}

impl ClassifierConfig {
    /// Load from a JSON file; missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| PubcatError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        info!(path = %path.display(), "Loaded classifier config");
        Ok(config)
    }

    /// Reject values the classifier cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(PubcatError::Config(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if self.top_k == 0 {
            return Err(PubcatError::Config("top_k must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(PubcatError::Config("batch_size must be at least 1".to_string()));
        }
        if !self.hypothesis_template.contains("{}") {
            return Err(PubcatError::Config(
                "hypothesis_template must contain a {} placeholder".to_string(),
            ));
        }
        if self.default_category.trim().is_empty() {
            return Err(PubcatError::Config("default_category must not be empty".to_string()));
        }
        if let Some((label, p)) = self.penalties.iter().find(|(_, p)| !(0.0..=1.0).contains(p)) {
            return Err(PubcatError::Config(format!("penalty for {} out of range: {}", label, p)));
        }
        Ok(())
    }

    /// Penalty configured for a label, zero when none.
    pub fn penalty(&self, label: &str) -> f64 {
        self.penalties
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, p)| *p)
            .unwrap_or(0.0)
    }
}

/// Artifact locations for one classification run.
#[derive(Debug, Clone)]
pub struct RunPaths {
    /// Directory holding one sub-directory per member
    pub members_dir: PathBuf,
    /// Artifact file name inside each member directory
    pub input_file_name: String,
    pub overrides: PathBuf,
    pub labels: Option<PathBuf>,
    pub compact_out: PathBuf,
    pub verbose_out: PathBuf,
}

impl RunPaths {
    /// Site layout: `members/*/publications.json` in, `data/*.json` out.
    pub fn from_root(root: &Path) -> Self {
        let data = root.join("data");
        let labels = data.join("categories.labels.json");
        Self {
            members_dir: root.join("members"),
            input_file_name: "publications.json".to_string(),
            overrides: data.join("categories.overrides.json"),
            labels: labels.exists().then_some(labels),
            compact_out: data.join("publication_categories.json"),
            verbose_out: data.join("publication_categories_verbose.json"),
        }
    }
}
