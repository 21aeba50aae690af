//! # Resource Chain
//!
//! Layered template/asset lookup. A chain is an ordered list of resource
//! roots, the first being the most general and later roots stacking on top
//! as more specific layers. Resolution starts at the most specific node and
//! walks toward the root until content is found.
//!
//! On top of the plain chain walk sits the decorator convention: for a
//! location ending in the configured template suffix (default `.hbs`), a
//! sibling resource with `.override` spliced before the suffix
//! (`page.hbs` → `page.override.hbs`) takes precedence when it exists and is
//! non-empty. The override may in turn re-request the original location
//! (for example from an explicit include while it is being rendered); a
//! per-lookup visited table records which absolute override paths have
//! already been attempted for each logical location, so the second request
//! skips the override branch and reaches the wrapped original instead of
//! looping.
//!
//! The visited table is owned by a [`ChainLookup`], one per logical lookup
//! call. Concurrent tasks each create their own lookup, so one task's
//! recursion guard can never suppress another task's override resolution.
//!
//! Only `file://` roots are currently readable; other schemes are treated as
//! not-found at that node.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use log::{debug, trace};
use url::Url;

use crate::error::{Error, Result};

/// Default template suffix used by the override convention.
pub const DEFAULT_SUFFIX: &str = ".hbs";

/// One root in the chain, linked from most specific to most general.
#[derive(Debug, Clone)]
struct ChainNode {
    root: Url,
    context_path: String,
    parent: Option<Box<ChainNode>>,
}

/// A layered resource lookup chain with a decorator/override convention.
#[derive(Debug, Clone)]
pub struct ResourceChain {
    leaf: ChainNode,
    roots: Vec<Url>,
    suffix: String,
}

impl ResourceChain {
    /// Build a chain from ordered roots: the first root is the most general
    /// layer, subsequent roots stack on top as more specific layers.
    pub fn from_roots(roots: &[Url]) -> Result<Self> {
        let mut nodes = roots.iter().map(|root| ChainNode {
            root: root.clone(),
            context_path: last_path_segment(root),
            parent: None,
        });
        let first = nodes.next().ok_or_else(|| Error::Model {
            message: "at least one resource root is required".to_string(),
        })?;
        let leaf = nodes.fold(first, |general, mut specific| {
            specific.parent = Some(Box::new(general));
            specific
        });
        Ok(Self {
            leaf,
            roots: roots.to_vec(),
            suffix: DEFAULT_SUFFIX.to_string(),
        })
    }

    /// Replace the template suffix the override convention keys on.
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.suffix = suffix.to_string();
        self
    }

    /// The ordered roots this chain was built from, most general first.
    pub fn roots(&self) -> &[Url] {
        &self.roots
    }

    /// Start a logical lookup with its own fresh visited table.
    ///
    /// Use one lookup per top-level resolution; nested re-requests issued
    /// while processing the resolved content (e.g. an override including its
    /// wrapped original) must go through the same lookup.
    pub fn lookup(&self) -> ChainLookup<'_> {
        ChainLookup {
            chain: self,
            visited: HashMap::new(),
        }
    }

    /// Resolve a location to byte content in a one-shot lookup.
    pub fn resolve_content(&self, location: &str) -> Result<Vec<u8>> {
        self.lookup().content(location)
    }

    /// Resolve a location to the URL of the first node that has non-empty
    /// content for it. The override convention does not apply here.
    pub fn resolve_url(&self, location: &str) -> Result<Url> {
        let rel = location.trim_start_matches('/');
        let mut node = Some(&self.leaf);
        while let Some(current) = node {
            debug!("resolve url: {} - {}", current.root, location);
            if let Some(bytes) = open_relative(&current.root, rel) {
                if !bytes.is_empty() {
                    return Url::parse(&absolute_key(&current.root, rel)).map_err(Error::from);
                }
            }
            node = current.parent.as_deref();
        }
        Err(Error::Unresolved {
            location: location.to_string(),
        })
    }
}

/// One logical lookup call over a [`ResourceChain`].
///
/// Owns the per-location stacks of attempted override paths that make
/// decorator recursion terminate.
#[derive(Debug)]
pub struct ChainLookup<'a> {
    chain: &'a ResourceChain,
    visited: HashMap<String, Vec<String>>,
}

impl ChainLookup<'_> {
    /// Resolve a location to byte content, most specific root first.
    pub fn content(&mut self, location: &str) -> Result<Vec<u8>> {
        let chain = self.chain;
        let location = location.trim_start_matches('/');
        self.content_at(&chain.leaf, location)
    }

    fn content_at(&mut self, node: &ChainNode, location: &str) -> Result<Vec<u8>> {
        debug!("resolve content: {} - {}", node.root, location);
        let loc = strip_context_path(location, &node.context_path);
        let suffix = self.chain.suffix.clone();
        let override_suffix = format!(".override{}", suffix);

        // The override branch is skipped when the location already is an
        // override form, so an override template cannot re-trigger itself.
        if loc.ends_with(&suffix) && !loc.ends_with(&override_suffix) {
            let override_rel = format!("{}{}", &loc[..loc.len() - suffix.len()], override_suffix);
            let override_abs = absolute_key(&node.root, &override_rel);
            let stack = self.visited.entry(loc.to_string()).or_default();
            if !stack.contains(&override_abs) {
                // Record the attempt before opening, so a nested resolution
                // of the same logical location from within the override does
                // not come back into this branch.
                stack.push(override_abs);
                if let Some(bytes) = open_relative(&node.root, &override_rel) {
                    if !bytes.is_empty() {
                        return Ok(bytes);
                    }
                }
                return self.plain_at(node, &loc, location);
            }
        }

        let plain_abs = absolute_key(&node.root, &loc);
        self.visited.entry(loc.to_string()).or_default().push(plain_abs);
        self.plain_at(node, &loc, location)
    }

    fn plain_at(&mut self, node: &ChainNode, loc: &str, original: &str) -> Result<Vec<u8>> {
        if let Some(bytes) = open_relative(&node.root, loc) {
            return Ok(bytes);
        }
        trace!(
            "unable to resolve {} at {}, trying next node in the chain",
            original,
            node.root
        );
        match &node.parent {
            Some(parent) => self.content_at(parent, loc),
            None => Err(Error::ResourceNotFound {
                location: original.to_string(),
            }),
        }
    }
}

/// Read a resource relative to a root; any failure counts as not-found at
/// that node.
fn open_relative(root: &Url, rel: &str) -> Option<Vec<u8>> {
    if root.scheme() != "file" {
        debug!("unsupported resource root scheme: {}", root.scheme());
        return None;
    }
    let base: PathBuf = root.to_file_path().ok()?;
    match fs::read(base.join(rel)) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            trace!("cannot open {}/{}: {}", root, rel, e);
            None
        }
    }
}

fn absolute_key(root: &Url, rel: &str) -> String {
    format!("{}/{}", root.as_str().trim_end_matches('/'), rel)
}

fn last_path_segment(root: &Url) -> String {
    root.path()
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn strip_context_path(location: &str, context_path: &str) -> String {
    if !context_path.is_empty() {
        if let Some(stripped) = location.strip_prefix(&format!("{}/", context_path)) {
            return stripped.to_string();
        }
    }
    location.to_string()
}
