//! Pipeline Driver
//!
//! One classification run over a snapshot of member artifacts:
//!
//! 1. enumerate `members/*/<file>` sorted by path
//! 2. normalize every entry, resolve identities, dedupe
//! 3. override -> structured mapping -> keyword rules per identity
//! 4. statistical layer, batched, for the residual set only
//! 5. default category for anything still unclassified
//! 6. write compact and verbose tables, only after everything is classified
//!
//! Unreadable artifacts and malformed entries are skipped and counted. Scorer
//! and write failures abort the run before any table is replaced.

use crate::classify::statistical::StatisticalLayer;
use crate::classify::{AssignmentSource, CategoryClassifier, Decision};
use crate::config::{ClassifierConfig, RunPaths};
use crate::dedup::{DedupPolicy, Deduplicator};
use crate::error::{PubcatError, Result};
use crate::identity::Identity;
use crate::labels::CategoryLabels;
use crate::normalizer::{publications, RawEntry};
use crate::output::{write_tables, CategoryAssignment};
use crate::overrides::OverrideStore;
use crate::record::PublicationRecord;
use crate::scorer::Scorer;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub input_files: usize,
    pub skipped_files: usize,
    pub malformed_entries: usize,
    pub records: usize,
    pub duplicates: usize,
    pub identities: usize,
    pub by_source: BTreeMap<AssignmentSource, usize>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries from {} files ({} skipped), {} records, {} duplicates, {} malformed",
            self.identities,
            self.input_files,
            self.skipped_files,
            self.records,
            self.duplicates,
            self.malformed_entries
        )?;
        for (source, count) in &self.by_source {
            write!(f, ", {} {}", count, source)?;
        }
        Ok(())
    }
}

/// Records folded from a set of artifacts.
#[derive(Debug, Default)]
pub struct Collected {
    pub entries: Vec<(Identity, PublicationRecord)>,
    pub input_files: usize,
    pub skipped_files: usize,
    pub malformed_entries: usize,
    pub records: usize,
    pub duplicates: usize,
}

/// Member artifacts under `members_dir`, sorted by path.
pub fn discover_inputs(members_dir: &Path, file_name: &str) -> Result<Vec<PathBuf>> {
    if !members_dir.is_dir() {
        return Err(PubcatError::Config(format!(
            "members directory not found: {}",
            members_dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(members_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().join(file_name))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    debug!(count = paths.len(), dir = %members_dir.display(), "Discovered member artifacts");
    Ok(paths)
}

/// Fold every entry of one parsed artifact; returns the malformed count.
pub fn fold_value(value: &Value, dedup: &mut Deduplicator) -> (usize, usize) {
    let mut records = 0;
    let mut malformed = 0;
    for entry in publications(value) {
        match entry.into_record().and_then(|r| Identity::resolve(&r).map(|id| (id, r))) {
            Some((identity, record)) => {
                records += 1;
                dedup.insert(identity, record);
            }
            None => {
                if let RawEntry::Object(obj) = entry {
                    debug!(keys = ?obj.keys().collect::<Vec<_>>(), "Entry has no identity");
                }
                malformed += 1;
            }
        }
    }
    (records, malformed)
}

/// Read, normalize and dedupe all artifacts, in the given order.
pub fn collect(paths: &[PathBuf], policy: DedupPolicy) -> Collected {
    let mut dedup = Deduplicator::new(policy);
    let mut collected = Collected {
        input_files: paths.len(),
        ..Default::default()
    };

    for path in paths {
        let value = match std::fs::read_to_string(path)
            .map_err(PubcatError::from)
            .and_then(|raw| serde_json::from_str::<Value>(&raw).map_err(PubcatError::from))
        {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipped unreadable artifact");
                collected.skipped_files += 1;
                continue;
            }
        };

        let (records, malformed) = fold_value(&value, &mut dedup);
        if records == 0 && malformed == 0 {
            warn!(path = %path.display(), "Artifact has no recognizable publications");
        }
        if malformed > 0 {
            warn!(path = %path.display(), malformed, "Skipped malformed entries");
        }
        collected.records += records;
        collected.malformed_entries += malformed;
    }

    collected.duplicates = dedup.duplicates();
    collected.entries = dedup.into_entries();
    collected
}

/// Classify every identity, calling the scorer only for the residual set.
///
/// With no statistical layer, residual records get the default category.
pub async fn classify_entries(
    entries: &[(Identity, PublicationRecord)],
    classifier: &CategoryClassifier,
    statistical: Option<&StatisticalLayer<'_>>,
    default_category: &str,
) -> Result<Vec<CategoryAssignment>> {
    let mut decisions: Vec<Option<Decision>> = entries
        .iter()
        .map(|(identity, record)| classifier.classify(identity, record))
        .collect();

    let residual: Vec<usize> = decisions
        .iter()
        .enumerate()
        .filter(|(_, d)| d.is_none())
        .map(|(i, _)| i)
        .collect();

    info!(
        identities = entries.len(),
        residual = residual.len(),
        "Cheap layers finished"
    );

    if let Some(layer) = statistical {
        let records: Vec<&PublicationRecord> = residual.iter().map(|&i| &entries[i].1).collect();
        let scored = layer.classify_all(&records).await?;
        for (&i, decision) in residual.iter().zip(scored) {
            decisions[i] = Some(decision);
        }
    } else if !residual.is_empty() {
        warn!(
            count = residual.len(),
            category = default_category,
            "No scorer configured; assigning default category"
        );
    }

    Ok(entries
        .iter()
        .zip(decisions)
        .map(|((identity, record), decision)| {
            let decision = decision.unwrap_or_else(|| Decision::fallback(default_category));
            CategoryAssignment::new(identity.clone(), record, decision)
        })
        .collect())
}

/// Run the whole pipeline and write both tables.
pub async fn run(paths: &RunPaths, config: &ClassifierConfig, scorer: Option<&dyn Scorer>) -> Result<RunSummary> {
    config.validate()?;
    let labels = CategoryLabels::load(paths.labels.as_deref())?;
    let overrides = OverrideStore::load(&paths.overrides);
    let classifier = CategoryClassifier::standard(overrides)?;

    let inputs = discover_inputs(&paths.members_dir, &paths.input_file_name)?;
    let collected = collect(&inputs, config.dedup_policy);

    let statistical = scorer.map(|s| StatisticalLayer::new(s, &labels, config));
    let assignments = classify_entries(
        &collected.entries,
        &classifier,
        statistical.as_ref(),
        &config.default_category,
    )
    .await?;

    write_tables(&assignments, &paths.compact_out, &paths.verbose_out)?;

    let mut by_source = BTreeMap::new();
    for a in &assignments {
        *by_source.entry(a.source).or_insert(0) += 1;
    }

    let summary = RunSummary {
        input_files: collected.input_files,
        skipped_files: collected.skipped_files,
        malformed_entries: collected.malformed_entries,
        records: collected.records,
        duplicates: collected.duplicates,
        identities: assignments.len(),
        by_source,
    };
    info!(summary = %summary, "Classification run complete");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::stub::StubScorer;
    use serde_json::json;
    use tempfile::TempDir;

    struct Site {
        dir: TempDir,
        paths: RunPaths,
    }

    impl Site {
        fn new(members: &[(&str, Value)]) -> Self {
            let dir = TempDir::new().unwrap();
            for (member, artifact) in members {
                let member_dir = dir.path().join("members").join(member);
                std::fs::create_dir_all(&member_dir).unwrap();
                std::fs::write(member_dir.join("publications.json"), artifact.to_string()).unwrap();
            }
            std::fs::create_dir_all(dir.path().join("members")).unwrap();
            let paths = RunPaths::from_root(dir.path());
            Self { dir, paths }
        }

        fn write_overrides(&self, value: Value) {
            std::fs::create_dir_all(self.dir.path().join("data")).unwrap();
            std::fs::write(&self.paths.overrides, value.to_string()).unwrap();
        }

        fn compact(&self) -> Value {
            serde_json::from_str(&std::fs::read_to_string(&self.paths.compact_out).unwrap()).unwrap()
        }

        fn verbose(&self) -> Value {
            serde_json::from_str(&std::fs::read_to_string(&self.paths.verbose_out).unwrap()).unwrap()
        }
    }

    fn quantum_scorer() -> StubScorer {
        StubScorer::new(&[
            ("Quantum Computing", "qubit"),
            ("Quantum Simulation", "many-body"),
        ])
    }

    #[tokio::test]
    async fn test_keyword_scenario() -> Result<()> {
        let site = Site::new(&[(
            "alice",
            json!({"doi": "10.1/AB", "title": "Quantum key distribution over satellite links"}),
        )]);

        let summary = run(&site.paths, &ClassifierConfig::default(), None).await?;
        assert_eq!(summary.identities, 1);
        assert_eq!(site.compact(), json!({"DOI:10.1/ab": ["Quantum Communication"]}));
        assert_eq!(site.verbose()["DOI:10.1/ab"]["source"], "keyword-rule");
        assert_eq!(site.verbose()["DOI:10.1/ab"]["doi"], "10.1/ab");
        Ok(())
    }

    #[tokio::test]
    async fn test_structured_mapping_scenario_skips_scorer() -> Result<()> {
        let site = Site::new(&[(
            "bob",
            json!([{"url": "https://doi.org/10.2/CD", "title": "On deep nets", "fieldsOfStudy": ["Computer science"]}]),
        )]);
        let scorer = quantum_scorer();

        run(&site.paths, &ClassifierConfig::default(), Some(&scorer)).await?;
        let entry = &site.verbose()["https://doi.org/10.2/CD"];
        assert_eq!(entry["categories"], json!(["Machine Learning"]));
        assert_eq!(entry["source"], "structured-mapping");
        assert_eq!(entry["scores"], json!({}));
        assert_eq!(scorer.calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_cross_member_dedup_and_override() -> Result<()> {
        let site = Site::new(&[
            ("a", json!({"publications": [{"doi": "DOI:10.3/EF", "title": "Trapped ions in cavities"}]})),
            ("b", json!({"papers": [{"doi": "https://doi.org/10.3/ef", "title": "Later copy", "venue": "PRL"}]})),
        ]);
        site.write_overrides(json!({"DOI:10.3/ef": ["Other"]}));

        let summary = run(&site.paths, &ClassifierConfig::default(), None).await?;
        assert_eq!(summary.records, 2);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(site.compact(), json!({"DOI:10.3/ef": ["Other"]}));

        let entry = &site.verbose()["DOI:10.3/ef"];
        assert_eq!(entry["source"], "override");
        assert_eq!(entry["title"], "Trapped ions in cavities");
        assert_eq!(entry["venue"], Value::Null);
        Ok(())
    }

    #[tokio::test]
    async fn test_residual_goes_to_scorer_only() -> Result<()> {
        let site = Site::new(&[(
            "carol",
            json!([
                {"paperId": "p1", "title": "Qubit readout fidelity", "venue": "Unknown venue"},
                {"paperId": "p2", "title": "Trapped ions", "fieldsOfStudy": ["Physics"]},
                {"paperId": "p3", "title": "Satellite QKD"},
                {"paperId": "p4", "title": "A survey of everything"}
            ]),
        )]);
        let scorer = quantum_scorer();

        let summary = run(&site.paths, &ClassifierConfig::default(), Some(&scorer)).await?;
        assert_eq!(scorer.calls(), 1);
        assert_eq!(
            scorer.seen_texts(),
            vec!["Qubit readout fidelity. Venue: Unknown venue.", "A survey of everything"]
        );

        let verbose = site.verbose();
        assert_eq!(verbose["S2:p1"]["categories"], json!(["Quantum Computing"]));
        assert_eq!(verbose["S2:p1"]["source"], "statistical");
        assert!(verbose["S2:p1"]["scores"].as_object().unwrap().len() > 1);
        assert_eq!(verbose["S2:p2"]["source"], "structured-mapping");
        assert_eq!(verbose["S2:p3"]["source"], "keyword-rule");
        // forced fallback: every label ties, first label in the set wins
        assert_eq!(verbose["S2:p4"]["categories"], json!(["Quantum Communication"]));

        assert_eq!(summary.by_source.get(&AssignmentSource::Statistical), Some(&2));
        let keys: Vec<_> = verbose.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["S2:p1", "S2:p2", "S2:p3", "S2:p4"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_no_scorer_assigns_default() -> Result<()> {
        let site = Site::new(&[("dan", json!(["https://example.org/paper"]))]);
        let summary = run(&site.paths, &ClassifierConfig::default(), None).await?;
        assert_eq!(site.compact(), json!({"https://example.org/paper": ["Other"]}));
        assert_eq!(site.verbose()["https://example.org/paper"]["source"], "default");
        assert_eq!(summary.by_source.get(&AssignmentSource::Default), Some(&1));
        Ok(())
    }

    #[tokio::test]
    async fn test_scorer_failure_writes_nothing() {
        let site = Site::new(&[("erin", json!([{"title": "Unclassifiable essay"}]))]);
        let scorer = StubScorer::failing();

        let result = run(&site.paths, &ClassifierConfig::default(), Some(&scorer)).await;
        assert!(matches!(result, Err(PubcatError::Scorer(_))));
        assert!(!site.paths.compact_out.exists());
        assert!(!site.paths.verbose_out.exists());
    }

    #[tokio::test]
    async fn test_malformed_inputs_are_counted() -> Result<()> {
        let site = Site::new(&[
            ("a", json!([{"venue": "No identity"}, 7, {"title": "Ising lattices"}])),
            ("c", json!({"meta": "nothing here"})),
        ]);
        std::fs::create_dir_all(site.dir.path().join("members/b"))?;
        std::fs::write(site.dir.path().join("members/b/publications.json"), "{not json")?;
        site.write_overrides(json!("not an object"));

        let summary = run(&site.paths, &ClassifierConfig::default(), None).await?;
        assert_eq!(summary.input_files, 3);
        assert_eq!(summary.skipped_files, 1);
        assert_eq!(summary.malformed_entries, 2);
        assert_eq!(site.compact(), json!({"TITLE:ising lattices": ["Quantum Simulation"]}));
        Ok(())
    }

    #[tokio::test]
    async fn test_unwritable_verbose_table_keeps_previous_pair() -> Result<()> {
        let site = Site::new(&[("a", json!([{"title": "Ising lattices"}]))]);
        site.write_overrides(json!({}));
        std::fs::write(&site.paths.compact_out, r#"{"OLD": ["Other"]}"#)?;
        std::fs::create_dir_all(site.paths.verbose_out.join("occupied"))?;

        let result = run(&site.paths, &ClassifierConfig::default(), None).await;
        assert!(matches!(result, Err(PubcatError::Io(_))));
        assert_eq!(site.compact(), json!({"OLD": ["Other"]}));
        Ok(())
    }

    #[tokio::test]
    async fn test_runs_are_byte_identical() -> Result<()> {
        let site = Site::new(&[
            ("a", json!([{"title": "Qubit arrays"}, {"doi": "10.9/Z", "title": "Femtosecond lasers"}])),
            ("b", json!([{"title": "Many-body localization"}, "https://example.org/x"])),
        ]);
        let scorer = quantum_scorer();
        let config = ClassifierConfig::default();

        run(&site.paths, &config, Some(&scorer)).await?;
        let first = (
            std::fs::read(&site.paths.compact_out)?,
            std::fs::read(&site.paths.verbose_out)?,
        );
        run(&site.paths, &config, Some(&scorer)).await?;
        let second = (
            std::fs::read(&site.paths.compact_out)?,
            std::fs::read(&site.paths.verbose_out)?,
        );
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_discover_inputs_sorted() -> Result<()> {
        let site = Site::new(&[("zed", json!([])), ("amy", json!([]))]);
        std::fs::create_dir_all(site.dir.path().join("members/no-artifact"))?;

        let paths = discover_inputs(&site.paths.members_dir, "publications.json")?;
        let members: Vec<_> = paths
            .iter()
            .filter_map(|p| p.parent()?.file_name()?.to_str().map(String::from))
            .collect();
        assert_eq!(members, vec!["amy", "zed"]);

        assert!(discover_inputs(&site.dir.path().join("missing"), "publications.json").is_err());
        Ok(())
    }
}
