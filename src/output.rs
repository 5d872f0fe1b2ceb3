//! Output tables and atomic artifact writes.
//!
//! Two tables are produced per run:
//! - compact: `{identity: [category, ...]}`
//! - verbose: `{identity: {title, categories, doi, url, venue, year, source, scores}}`
//!
//! Both keep processing order. Files are written to a temporary sibling and
//! renamed into place so the website never reads a half-written table.

use crate::classify::{AssignmentSource, Decision};
use crate::error::{PubcatError, Result};
use crate::identity::{normalize_doi, Identity};
use crate::record::PublicationRecord;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use tempfile::{NamedTempFile, TempPath};
use tracing::{info, warn};

/// Title shown for records that never had one.
pub const UNTITLED: &str = "(untitled)";

/// Final classification of one identity, with display metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAssignment {
    #[serde(skip)]
    pub identity: Identity,
    pub title: String,
    pub categories: Vec<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub venue: Option<String>,
    pub year: Option<i32>,
    pub source: AssignmentSource,
    #[serde(serialize_with = "ordered_map")]
    pub scores: Vec<(String, f64)>,
}

impl CategoryAssignment {
    pub fn new(identity: Identity, record: &PublicationRecord, decision: Decision) -> Self {
        Self {
            identity,
            title: record.title.clone().unwrap_or_else(|| UNTITLED.to_string()),
            categories: decision.categories,
            doi: record
                .doi
                .as_deref()
                .map(normalize_doi)
                .filter(|d| !d.is_empty()),
            url: record.url.clone(),
            venue: record.venue.clone(),
            year: record.year,
            source: decision.source,
            scores: decision.scores,
        }
    }
}

fn ordered_map<S: Serializer>(pairs: &[(String, f64)], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(pairs.iter().map(|(k, v)| (k, v)))
}

/// `identity -> categories`, in processing order.
pub struct CompactTable<'a>(pub &'a [CategoryAssignment]);

impl Serialize for CompactTable<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for a in self.0 {
            map.serialize_entry(a.identity.as_str(), &a.categories)?;
        }
        map.end()
    }
}

/// `identity -> full assignment`, in processing order.
pub struct VerboseTable<'a>(pub &'a [CategoryAssignment]);

impl Serialize for VerboseTable<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for a in self.0 {
            map.serialize_entry(a.identity.as_str(), a)?;
        }
        map.end()
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Write `contents` to a temporary file next to `path`, not yet renamed.
pub fn stage(path: &Path, contents: &str) -> Result<NamedTempFile> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.as_file().sync_all()?;
    Ok(file)
}

/// Replace `path` with `contents` atomically.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    stage(path, contents)?.persist(path)?;
    Ok(())
}

/// Serialize a value as pretty JSON and replace `path` atomically.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, &serde_json::to_string_pretty(value)?)
}

/// Reject destinations a file cannot be renamed onto.
fn check_target(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Err(io::Error::other(format!("output target is a directory: {}", path.display())).into());
    }
    let dir = parent_dir(path);
    let readonly = std::fs::metadata(dir).map(|m| m.permissions().readonly()).unwrap_or(false);
    if readonly {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("output directory is read-only: {}", dir.display()),
        )
        .into());
    }
    Ok(())
}

/// Move an existing file to a temporary sibling; dropped copies are deleted.
fn set_aside(path: &Path) -> Result<Option<TempPath>> {
    if !path.is_file() {
        return Ok(None);
    }
    let aside = tempfile::Builder::new()
        .prefix(".previous-")
        .tempfile_in(parent_dir(path))?
        .into_temp_path();
    std::fs::rename(path, &aside)?;
    Ok(Some(aside))
}

/// Put back what [`set_aside`] moved, or remove a file that had no predecessor.
fn restore(path: &Path, previous: Option<TempPath>) -> Result<()> {
    match previous {
        Some(aside) => aside.persist(path).map_err(|e| PubcatError::Io(e.error))?,
        None => {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
    }
    Ok(())
}

/// Rename two staged files into place; on failure the first target is
/// returned to its prior contents.
fn commit_pair(first: (NamedTempFile, &Path), second: (NamedTempFile, &Path)) -> Result<()> {
    let (staged_first, first_path) = first;
    let (staged_second, second_path) = second;

    let previous = set_aside(first_path)?;
    if let Err(e) = staged_first.persist(first_path) {
        restore(first_path, previous)?;
        return Err(e.into());
    }
    if let Err(e) = staged_second.persist(second_path) {
        warn!(path = %first_path.display(), error = %e.error, "Second table failed; restoring first");
        restore(first_path, previous)?;
        return Err(e.into());
    }
    Ok(())
}

/// Write both tables, or neither.
///
/// Both are rendered and staged before either is renamed. If the second
/// rename fails the first table is restored.
pub fn write_tables(assignments: &[CategoryAssignment], compact_path: &Path, verbose_path: &Path) -> Result<()> {
    check_target(compact_path)?;
    check_target(verbose_path)?;

    let compact = serde_json::to_string_pretty(&CompactTable(assignments))?;
    let verbose = serde_json::to_string_pretty(&VerboseTable(assignments))?;

    let staged_compact = stage(compact_path, &compact)?;
    let staged_verbose = stage(verbose_path, &verbose)?;
    commit_pair((staged_compact, compact_path), (staged_verbose, verbose_path))?;

    info!(
        entries = assignments.len(),
        compact = %compact_path.display(),
        verbose = %verbose_path.display(),
        "Wrote output tables"
    );
    Ok(())
}
