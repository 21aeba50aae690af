//! # Generation Descriptors
//!
//! This module defines the data structures that represent a generator
//! descriptor document, as well as the logic for parsing and layering it.
//! A descriptor declares a [`GenerationModel`]: a named set of
//! [`GenerationUnit`]s, each pairing a source-selection rule (the factory
//! expression), an output-path rule, and a template or raw-copy reference.
//!
//! ## Layering
//!
//! Descriptors load once per resource root, most general first. A later
//! layer's unit whose `name` matches an earlier unit's replaces it
//! atomically (total replacement, not field-level merge); units with new
//! names are appended. A missing descriptor file in a layer is a soft
//! warning contributing no units; a malformed descriptor is a hard failure
//! for the run.
//!
//! ## Validation
//!
//! Structural mistakes are rejected at load/merge time rather than deferred
//! to a confusing runtime failure: every unit needs an output path rule, and
//! a `copy` unit needs a template reference to copy from.

use std::fs;
use std::path::PathBuf;

use log::warn;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::value::Value;

/// File suffix of descriptor documents.
pub const DESCRIPTOR_SUFFIX: &str = ".yaml";

/// One named expression injected into render scope per element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBinding {
    /// Variable name the result is bound to.
    pub name: String,
    /// Expression evaluated against the per-element scope.
    pub expression: String,
}

/// One declared generation rule, producing zero or more artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationUnit {
    /// Unit identity, used for override matching across layers.
    pub name: String,

    /// Expression producing the collection of elements to iterate; a scalar
    /// result is coerced to a singleton collection. Absent means the unit
    /// itself (or the implicit actor set) is the sole element.
    #[serde(default)]
    pub factory_expression: Option<String>,

    /// Expression producing the output-relative path for an element. Must
    /// evaluate to a non-empty string.
    #[serde(default)]
    pub path_expression: Option<String>,

    /// Logical location of the template or, when `copy` is set, of the raw
    /// asset to copy.
    #[serde(default)]
    pub template: Option<String>,

    /// When set, the unit is evaluated once per actor in the active actor
    /// set, with the actor injected into scope before factory and path
    /// evaluation.
    #[serde(default)]
    pub actor_scoped: bool,

    /// When set, output content is the verbatim bytes of the resolved
    /// template reference instead of a rendered template.
    #[serde(default)]
    pub copy: bool,

    /// Ordered per-element bindings merged into the render scope.
    #[serde(default)]
    pub context_bindings: Vec<ContextBinding>,
}

impl GenerationUnit {
    /// Check the field combination declared for this unit.
    pub fn validate(&self) -> Result<()> {
        let blank = self
            .path_expression
            .as_deref()
            .map(|e| e.trim().is_empty())
            .unwrap_or(true);
        if blank {
            return Err(Error::UnitValidation {
                unit: self.name.clone(),
                message: "unit has no output path rule".to_string(),
            });
        }
        if self.copy && self.template.is_none() {
            return Err(Error::UnitValidation {
                unit: self.name.clone(),
                message: "copy unit has no template reference".to_string(),
            });
        }
        Ok(())
    }

    /// The unit descriptor as a scope value (bound as `template`, and as
    /// `self` for structural units without a factory expression).
    pub fn to_value(&self) -> Value {
        let mut entries = vec![
            ("name".to_string(), Value::from(self.name.as_str())),
            ("actorScoped".to_string(), Value::from(self.actor_scoped)),
            ("copy".to_string(), Value::from(self.copy)),
        ];
        if let Some(template) = &self.template {
            entries.push(("template".to_string(), Value::from(template.as_str())));
        }
        if let Some(path) = &self.path_expression {
            entries.push(("pathExpression".to_string(), Value::from(path.as_str())));
        }
        if let Some(factory) = &self.factory_expression {
            entries.push((
                "factoryExpression".to_string(),
                Value::from(factory.as_str()),
            ));
        }
        Value::object(entries)
    }
}

/// The effective, descriptor-derived set of generation units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationModel {
    /// Descriptive model name.
    #[serde(default)]
    pub name: String,

    /// Model-level bindings injected into every unit's render scope, before
    /// the unit's own bindings.
    #[serde(default)]
    pub context_bindings: Vec<ContextBinding>,

    /// The declared generation units.
    #[serde(default)]
    pub units: Vec<GenerationUnit>,
}

impl GenerationModel {
    /// Parse one descriptor layer from YAML and validate its units.
    pub fn parse(yaml: &str) -> Result<Self> {
        let model: GenerationModel =
            serde_yaml::from_str(yaml).map_err(|e| Error::DescriptorParse {
                message: e.to_string(),
                hint: Some(
                    "expected a document with `name`, optional `contextBindings` and a `units` list"
                        .to_string(),
                ),
            })?;
        for unit in &model.units {
            unit.validate()?;
        }
        Ok(model)
    }

    /// Merge a later, more specific layer into this model.
    ///
    /// A layer unit with a matching name replaces the earlier unit in place;
    /// unmatched names are appended. Replacement is total, never
    /// field-level.
    pub fn merge_layer(&mut self, layer: GenerationModel) {
        for unit in layer.units {
            match self.units.iter().position(|u| u.name == unit.name) {
                Some(index) => self.units[index] = unit,
                None => self.units.push(unit),
            }
        }
        self.context_bindings.extend(layer.context_bindings);
        if !layer.name.is_empty() {
            self.name = layer.name;
        }
    }

    /// Load and merge the descriptor named `descriptor_name` from every
    /// root, most general first.
    ///
    /// A root without the descriptor file contributes nothing (logged as a
    /// warning); a malformed descriptor aborts the load.
    pub fn load_layers(roots: &[Url], descriptor_name: &str) -> Result<Self> {
        if roots.is_empty() {
            return Err(Error::Model {
                message: "at least one resource root is required".to_string(),
            });
        }
        let file_name = format!("{}{}", descriptor_name, DESCRIPTOR_SUFFIX);
        let mut merged = GenerationModel::default();
        for root in roots {
            let Some(path) = descriptor_path(root, &file_name) else {
                warn!("descriptor layer not readable at non-file root {}", root);
                continue;
            };
            let yaml = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!(
                        "descriptor layer not found at {} ({}), contributing no units",
                        path.display(),
                        e
                    );
                    continue;
                }
            };
            merged.merge_layer(Self::parse(&yaml)?);
        }
        Ok(merged)
    }
}

fn descriptor_path(root: &Url, file_name: &str) -> Option<PathBuf> {
    if root.scheme() != "file" {
        return None;
    }
    root.to_file_path().ok().map(|dir| dir.join(file_name))
}
