//! Override Store
//!
//! Manually curated `identity -> categories` assignments. Overrides are an
//! optimization for the curators, never a correctness dependency: a missing,
//! empty or malformed file yields an empty store and the run continues.

use crate::identity::Identity;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

/// Read-only override table for one run.
#[derive(Debug, Clone, Default)]
pub struct OverrideStore {
    entries: HashMap<String, Vec<String>>,
}

impl OverrideStore {
    /// Load overrides from `path`.
    ///
    /// Returns an empty store if the file doesn't exist or is invalid.
    pub fn load(path: &Path) -> Self {
        Self {
            entries: Self::read_entries(path),
        }
    }

    fn read_entries(path: &Path) -> HashMap<String, Vec<String>> {
        if !path.exists() {
            debug!("Override file not found: {:?}", path);
            return HashMap::new();
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read override file {:?}: {}; using no overrides", path, e);
                return HashMap::new();
            }
        };

        if content.trim().is_empty() {
            warn!("Override file {:?} is empty; using no overrides", path);
            return HashMap::new();
        }

        match serde_json::from_str::<HashMap<String, Vec<String>>>(&content) {
            Ok(raw) => {
                let entries: HashMap<String, Vec<String>> = raw
                    .into_iter()
                    .filter_map(|(key, cats)| {
                        let cats = sorted_unique(cats);
                        if cats.is_empty() {
                            warn!(identity = %key, "Ignoring override with no categories");
                            None
                        } else {
                            Some((key, cats))
                        }
                    })
                    .collect();
                info!("Loaded {} overrides from {:?}", entries.len(), path);
                entries
            }
            Err(e) => {
                warn!("Failed to parse override file {:?}: {}; using no overrides", path, e);
                HashMap::new()
            }
        }
    }

    /// Build a store directly from pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<String>)>,
        K: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, cats)| (k.into(), sorted_unique(cats)))
                .filter(|(_, cats)| !cats.is_empty())
                .collect(),
        }
    }

    /// Sorted category set for `identity`, if curated.
    pub fn get(&self, identity: &Identity) -> Option<&[String]> {
        self.entries.get(identity.as_str()).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn sorted_unique(cats: Vec<String>) -> Vec<String> {
    cats.into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
