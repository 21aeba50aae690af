//! # Variable Scopes
//!
//! A `Scope` is the per-task mapping from variable name to [`Value`] that
//! expressions and templates are evaluated against. Every scheduled
//! generation task constructs its own scope; scopes are never shared or
//! mutated across tasks.
//!
//! The orchestrator seeds each scope with a fixed set of well-known entries
//! (`self`, `model`, `actorTypes`, `actorType`, `template`, `templateDebug`)
//! plus any caller-supplied extra variables, and the generation unit's
//! context bindings extend it per element.

use std::collections::BTreeMap;

use crate::value::Value;

/// The current iteration element.
pub const SELF: &str = "self";
/// The root domain-model node.
pub const MODEL: &str = "model";
/// The full active actor set.
pub const ACTOR_TYPES: &str = "actorTypes";
/// The current actor, bound only for actor-scoped units.
pub const ACTOR_TYPE: &str = "actorType";
/// The generation unit descriptor being processed.
pub const TEMPLATE: &str = "template";
/// The run's template-debug flag, an explicit run-configuration field.
pub const TEMPLATE_DEBUG: &str = "templateDebug";

/// A named-variable scope for one generation task.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: BTreeMap<String, Value>,
}

impl Scope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable, replacing any previous binding of the same name.
    pub fn set<K: Into<String>>(&mut self, name: K, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Bind a variable and return the scope, for fluent construction.
    pub fn with<K: Into<String>>(mut self, name: K, value: Value) -> Self {
        self.set(name, value);
        self
    }

    /// Look up a variable by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Whether a variable is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Bind every `(name, value)` pair from the iterator.
    pub fn extend<I, K>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for (name, value) in entries {
            self.set(name, value);
        }
    }

    /// The bound variable names, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the scope has no bindings.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
