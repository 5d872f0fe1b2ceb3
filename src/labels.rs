//! Category label set.
//!
//! The ordered candidate labels handed to the statistical scorer. Order
//! matters: it breaks ties in the forced-fallback pick.

use crate::error::{PubcatError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Built-in labels used when no label file is configured.
pub const DEFAULT_LABELS: &[&str] = &[
    "Quantum Communication",
    "Quantum Nonlinear Optics",
    "Quantum Light–Matter Interaction",
    "Quantum Simulation",
    "Photonic QIP",
    "Ultrafast Quantum Photonics",
    "Quantum Machine Learning",
    "Machine Learning",
    "Photonics",
    "Quantum Information",
    "Quantum Computing",
    "Other",
];

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelEntry {
    Name(String),
    Named { name: String },
}

/// Ordered, de-duplicated category names fixed for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryLabels(Vec<String>);

impl Default for CategoryLabels {
    fn default() -> Self {
        Self(DEFAULT_LABELS.iter().map(|l| l.to_string()).collect())
    }
}

impl CategoryLabels {
    /// Build from names; blanks and repeats are dropped, order kept.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let labels: Vec<String> = names
            .into_iter()
            .map(|n| n.into().trim().to_string())
            .filter(|n| !n.is_empty() && seen.insert(n.clone()))
            .collect();

        if labels.is_empty() {
            return Err(PubcatError::Config("category label set is empty".to_string()));
        }
        Ok(Self(labels))
    }

    /// Load from `path`, or use the built-in labels when no path is given.
    ///
    /// Accepts a JSON array of strings or of `{"name": ...}` objects. A path
    /// that does not exist or cannot be parsed is a configuration error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!(count = DEFAULT_LABELS.len(), "Using built-in category labels");
            return Ok(Self::default());
        };
        if !path.is_file() {
            return Err(PubcatError::Config(format!(
                "label file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let entries: Vec<LabelEntry> = serde_json::from_str(&content)
            .map_err(|e| PubcatError::Config(format!("{}: {}", path.display(), e)))?;

        let labels = Self::new(entries.into_iter().map(|e| match e {
            LabelEntry::Name(name) | LabelEntry::Named { name } => name,
        }))?;
        info!(path = %path.display(), count = labels.len(), "Loaded category labels");
        Ok(labels)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_no_path_uses_defaults() -> Result<()> {
        let labels = CategoryLabels::load(None)?;
        assert_eq!(labels, CategoryLabels::default());
        assert_eq!(labels.len(), DEFAULT_LABELS.len());
        Ok(())
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = CategoryLabels::load(Some(Path::new("/nonexistent/labels.json")));
        assert!(matches!(result, Err(PubcatError::Config(_))));
    }

    #[test]
    fn test_load_mixed_entries() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, r#"["Photonics", {{"name": "Quantum Sensing"}}, " Photonics ", ""]"#)?;
        let labels = CategoryLabels::load(Some(file.path()))?;
        assert_eq!(labels.as_slice(), ["Photonics", "Quantum Sensing"]);
        Ok(())
    }

    #[test]
    fn test_malformed_file_is_error() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, r#"{{"labels": 3}}"#)?;
        assert!(matches!(CategoryLabels::load(Some(file.path())), Err(PubcatError::Config(_))));
        Ok(())
    }

    #[test]
    fn test_empty_set_is_error() {
        assert!(CategoryLabels::new(Vec::<String>::new()).is_err());
        assert!(CategoryLabels::new(["  "]).is_err());
    }
}
