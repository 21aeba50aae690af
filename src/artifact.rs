//! # Generated Artifacts
//!
//! A [`GeneratedArtifact`] is the immutable `(path, content)` pair produced
//! once per (unit, element) task. A [`GenerationResult`] owns the two
//! collections of a run: an actor-keyed bucket for actor-scoped units and a
//! flat bucket for global units. The result is written concurrently during
//! a run (behind the orchestrator's lock) and read-only afterwards.

use std::collections::BTreeMap;

use crate::value::Value;

/// An immutable output artifact: output-relative path plus byte content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    /// Output path, relative to the target directory.
    pub path: String,
    /// Artifact bytes; empty when content production failed (the
    /// at-least-attempt policy still records the artifact).
    pub content: Vec<u8>,
}

impl GeneratedArtifact {
    /// Create an artifact from a path and byte content.
    pub fn new(path: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            content,
        }
    }

    /// Create an artifact from rendered text (stored as UTF-8 bytes).
    pub fn from_text(path: impl Into<String>, text: &str) -> Self {
        Self::new(path, text.as_bytes().to_vec())
    }
}

/// The aggregated output of one generation run.
#[derive(Debug, Clone, Default)]
pub struct GenerationResult {
    by_actor: BTreeMap<String, Vec<GeneratedArtifact>>,
    global: Vec<GeneratedArtifact>,
}

impl GenerationResult {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure an actor bucket exists, even if no unit ever writes to it.
    pub fn seed_actor(&mut self, actor_key: &str) {
        self.by_actor.entry(actor_key.to_string()).or_default();
    }

    /// Record an artifact produced for an actor-scoped unit.
    pub fn insert_for_actor(&mut self, actor_key: &str, artifact: GeneratedArtifact) {
        self.by_actor
            .entry(actor_key.to_string())
            .or_default()
            .push(artifact);
    }

    /// Record an artifact produced for a global unit.
    pub fn insert_global(&mut self, artifact: GeneratedArtifact) {
        self.global.push(artifact);
    }

    /// Artifacts generated for one actor.
    pub fn actor_artifacts(&self, actor_key: &str) -> Option<&[GeneratedArtifact]> {
        self.by_actor.get(actor_key).map(Vec::as_slice)
    }

    /// The actor keys with a bucket, in sorted order.
    pub fn actors(&self) -> impl Iterator<Item = &str> {
        self.by_actor.keys().map(String::as_str)
    }

    /// Iterate `(actor key, artifacts)` pairs.
    pub fn actor_buckets(&self) -> impl Iterator<Item = (&str, &[GeneratedArtifact])> {
        self.by_actor
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Artifacts generated by global units.
    pub fn global_artifacts(&self) -> &[GeneratedArtifact] {
        &self.global
    }

    /// Total number of artifacts across both buckets.
    pub fn len(&self) -> usize {
        self.global.len() + self.by_actor.values().map(Vec::len).sum::<usize>()
    }

    /// Whether the run produced no artifacts.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The sorted set of `(path, content)` pairs across both buckets; useful
    /// for order-independent comparisons between runs.
    pub fn sorted_pairs(&self) -> Vec<(&str, &[u8])> {
        let mut pairs: Vec<(&str, &[u8])> = self
            .global
            .iter()
            .chain(self.by_actor.values().flatten())
            .map(|a| (a.path.as_str(), a.content.as_slice()))
            .collect();
        pairs.sort();
        pairs
    }
}

/// The bucket key for an actor value: its `name` entry when present,
/// otherwise its display form.
pub fn actor_key(actor: &Value) -> String {
    actor
        .get("name")
        .map(|v| v.to_string())
        .unwrap_or_else(|| actor.to_string())
}
