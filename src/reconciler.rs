//! # Output Reconciliation
//!
//! Writes a run's artifacts to target directories while honoring a
//! per-target ignore list. The sentinel file `.generator-ignore` at a
//! target directory's root carries one glob pattern per line; files whose
//! target-relative path matches any pattern are never overwritten. An
//! absent sentinel file means nothing is excluded and is not an error.
//!
//! A single artifact's write failure is logged and does not stop the
//! remaining artifacts.

use std::fs;
use std::path::Path;

use glob::Pattern;
use log::{debug, error, info, warn};

use crate::artifact::GeneratedArtifact;

/// Name of the per-target ignore sentinel file.
pub const GENERATOR_IGNORE_FILE: &str = ".generator-ignore";

/// The ordered glob patterns protecting files under one target directory.
#[derive(Debug, Default)]
pub struct IgnoreList {
    patterns: Vec<Pattern>,
}

impl IgnoreList {
    /// Load the ignore list of a target directory.
    ///
    /// A missing sentinel file yields an empty list; an unreadable pattern
    /// line is skipped with a warning rather than failing the write pass.
    pub fn load(target_dir: &Path) -> Self {
        let sentinel = target_dir.join(GENERATOR_IGNORE_FILE);
        let text = match fs::read_to_string(&sentinel) {
            Ok(text) => text,
            Err(_) => {
                info!(
                    "no {} at {}, all artifacts will be written",
                    GENERATOR_IGNORE_FILE,
                    target_dir.display()
                );
                return Self::default();
            }
        };
        let mut patterns = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match Pattern::new(line) {
                Ok(pattern) => patterns.push(pattern),
                Err(e) => warn!("skipping invalid ignore glob `{}`: {}", line, e),
            }
        }
        Self { patterns }
    }

    /// Number of loaded patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the list has no patterns.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether a target-relative path matches any ignore glob.
    pub fn excludes(&self, relative_path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(relative_path))
    }
}

/// Outcome counters of one write pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Artifacts written to disk.
    pub written: usize,
    /// Artifacts skipped by the ignore list.
    pub skipped: usize,
    /// Artifacts whose write failed (logged, not fatal).
    pub failed: usize,
}

impl WriteReport {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: WriteReport) {
        self.written += other.written;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Write artifacts under `target_dir`, honoring its ignore list.
///
/// Parent directories are created as needed and existing files are
/// overwritten unless excluded. Failures are per-artifact: they are logged
/// and counted, and the remaining artifacts are still attempted.
pub fn write_artifacts(target_dir: &Path, artifacts: &[GeneratedArtifact]) -> WriteReport {
    let ignore = IgnoreList::load(target_dir);
    let mut report = WriteReport::default();
    for artifact in artifacts {
        if ignore.excludes(&artifact.path) {
            debug!(
                "skipping `{}`: excluded by {}",
                artifact.path, GENERATOR_IGNORE_FILE
            );
            report.skipped += 1;
            continue;
        }
        let out_path = target_dir.join(&artifact.path);
        if let Some(parent) = out_path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!(
                    "could not create directory `{}` for `{}`: {}",
                    parent.display(),
                    artifact.path,
                    e
                );
                report.failed += 1;
                continue;
            }
        }
        match fs::write(&out_path, &artifact.content) {
            Ok(()) => report.written += 1,
            Err(e) => {
                error!("could not write file `{}`: {}", out_path.display(), e);
                report.failed += 1;
            }
        }
    }
    report
}
