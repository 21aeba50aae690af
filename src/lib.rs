//! # Modelgen
//!
//! A model-driven code-generation engine. A declarative generation model (a
//! set of *generation units*, each pairing a source-selection rule, an
//! output-path rule, and a template or raw-copy reference) is evaluated
//! against a domain model instance, producing in-memory artifacts
//! (path + byte content) that a separate writer persists.
//!
//! ## Quick Example
//!
//! ```
//! use modelgen::descriptor::GenerationModel;
//!
//! // Parse one descriptor layer...
//! let mut model = GenerationModel::parse(r#"
//! units:
//!   - name: profile
//!     pathExpression: self.name + '/info'
//!     template: actors/profile.hbs
//!     actorScoped: true
//! "#).unwrap();
//!
//! // ...and merge a more specific layer over it. Units replace by name.
//! let layer = GenerationModel::parse(r#"
//! units:
//!   - name: profile
//!     pathExpression: self.name + '/profile.txt'
//!     template: actors/profile.hbs
//!     actorScoped: true
//! "#).unwrap();
//! model.merge_layer(layer);
//!
//! assert_eq!(model.units.len(), 1);
//! assert_eq!(
//!     model.units[0].path_expression.as_deref(),
//!     Some("self.name + '/profile.txt'"),
//! );
//! ```
//!
//! ## Core Concepts
//!
//! - **Descriptors (`descriptor`)**: the YAML schema of generation units and
//!   the layered merge that produces the effective generation model.
//! - **Resource Chain (`resource`)**: layered template/asset lookup with a
//!   decorator-style `.override` convention and bounded recursion, so a
//!   specific layer can wrap a general layer's template and still include
//!   the wrapped original.
//! - **Expressions and Scopes (`expression`, `scope`, `value`)**: factory,
//!   path and context-binding expressions evaluated against a per-task
//!   variable scope; the expression language is pluggable behind the
//!   `Evaluator` trait.
//! - **Rendering (`render`)**: template rendering behind the `Renderer`
//!   trait, with a built-in `{{ expression }}` interpolating default.
//! - **Orchestration (`orchestrator`)**: the fan-out/fan-in run scheduling
//!   one task per (unit, element) pair on a worker pool, aggregating an
//!   actor-keyed and a flat artifact bucket, and isolating per-task
//!   failures.
//! - **Reconciliation (`reconciler`)**: writing artifacts to target
//!   directories while honoring per-target `.generator-ignore` globs.
//!
//! ## Execution Flow
//!
//! 1. **Load**: parse and merge descriptor layers, one per resource root.
//! 2. **Fan-out**: per unit, compute the iteration space (optionally per
//!    actor) via the factory expression.
//! 3. **Generate**: per element, build a scope, evaluate the output path,
//!    then render the template or copy the raw asset through the chain.
//! 4. **Aggregate**: collect artifacts into the run result; a single broken
//!    template never blocks unrelated artifacts.
//! 5. **Write**: hand the result to the reconciler (or any other consumer).

pub mod artifact;
pub mod descriptor;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod orchestrator;
pub mod reconciler;
pub mod render;
pub mod resource;
pub mod scope;
pub mod value;
