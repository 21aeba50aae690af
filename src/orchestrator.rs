//! # Generation Orchestrator
//!
//! The fan-out/fan-in engine. A run takes the effective generation model,
//! the resource chain, the expression evaluator and template renderer, and a
//! domain model instance; it computes the iteration space of every unit,
//! schedules one independent task per (unit, element) pair on the rayon
//! worker pool, and aggregates artifacts into a [`GenerationResult`].
//!
//! Failure policy: the run is resilient. A factory-expression failure skips
//! that unit (for that actor) only; a path-expression failure skips that
//! single element's artifact; any failure while resolving or rendering
//! content is caught, logged with the artifact's intended path and the
//! unit's identity, and the artifact is still recorded with empty content so
//! that one broken template never blocks unrelated artifacts. The
//! orchestrator waits for every task and never cancels siblings.
//!
//! Every task builds its own [`Scope`]; the only cross-task shared mutable
//! state is the result, guarded by a mutex. The template-debug toggle is an
//! explicit run field (no process-wide flag), surfaced to scopes as
//! `templateDebug`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, error};
use rayon::prelude::*;

use crate::artifact::{actor_key, GeneratedArtifact, GenerationResult};
use crate::descriptor::{GenerationModel, GenerationUnit};
use crate::error::Result;
use crate::evaluator::UnitEvaluator;
use crate::expression::Evaluator;
use crate::reconciler::{self, WriteReport};
use crate::render::{Renderer, TemplateSource};
use crate::resource::ResourceChain;
use crate::scope::{Scope, ACTOR_TYPE, ACTOR_TYPES, MODEL, SELF, TEMPLATE, TEMPLATE_DEBUG};
use crate::value::Value;

/// Caller-supplied predicate selecting the active actors of a run.
pub type ActorPredicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// One configured generation run.
pub struct GeneratorRun {
    /// The effective (merged) generation model.
    pub descriptor: GenerationModel,
    /// Template/asset lookup chain.
    pub chain: ResourceChain,
    /// Expression evaluation capability.
    pub evaluator: Arc<dyn Evaluator>,
    /// Template rendering capability.
    pub renderer: Arc<dyn Renderer>,
    /// Root domain-model node, shared read-only by every task.
    pub model: Value,
    /// The full actor set of the model.
    pub actor_types: Vec<Value>,
    /// Extra variables seeded into every task scope.
    pub extra_variables: BTreeMap<String, Value>,
    /// Template-debug toggle, bound into scopes as `templateDebug`.
    pub template_debug: bool,
    actor_filter: Option<ActorPredicate>,
}

impl GeneratorRun {
    /// Configure a run with the required collaborators.
    pub fn new(
        descriptor: GenerationModel,
        chain: ResourceChain,
        evaluator: Arc<dyn Evaluator>,
        renderer: Arc<dyn Renderer>,
        model: Value,
    ) -> Self {
        Self {
            descriptor,
            chain,
            evaluator,
            renderer,
            model,
            actor_types: Vec::new(),
            extra_variables: BTreeMap::new(),
            template_debug: false,
            actor_filter: None,
        }
    }

    /// Set the actor set of the model.
    pub fn with_actor_types(mut self, actor_types: Vec<Value>) -> Self {
        self.actor_types = actor_types;
        self
    }

    /// Seed an extra variable into every task scope.
    pub fn with_extra_variable(mut self, name: &str, value: Value) -> Self {
        self.extra_variables.insert(name.to_string(), value);
        self
    }

    /// Enable the template-debug toggle for this run.
    pub fn with_template_debug(mut self, enabled: bool) -> Self {
        self.template_debug = enabled;
        self
    }

    /// Restrict generation to actors accepted by `predicate`. Buckets are
    /// still seeded for every known actor.
    pub fn with_actor_filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.actor_filter = Some(Box::new(predicate));
        self
    }

    fn active_actors(&self) -> Vec<Value> {
        match &self.actor_filter {
            Some(predicate) => self
                .actor_types
                .iter()
                .filter(|a| predicate(a))
                .cloned()
                .collect(),
            None => self.actor_types.clone(),
        }
    }

    fn base_scope(&self, active: &[Value]) -> Scope {
        let mut scope = Scope::new()
            .with(MODEL, self.model.clone())
            .with(ACTOR_TYPES, Value::List(active.to_vec()))
            .with(TEMPLATE_DEBUG, Value::Bool(self.template_debug));
        scope.extend(
            self.extra_variables
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        scope
    }

    /// Run every generation unit and aggregate the artifacts.
    ///
    /// Blocks until all scheduled tasks complete; a single task's failure
    /// never aborts its siblings.
    pub fn execute(&self) -> Result<GenerationResult> {
        let active = self.active_actors();
        let base_scope = self.base_scope(&active);

        let mut seeded = GenerationResult::new();
        for actor in &self.actor_types {
            seeded.seed_actor(&actor_key(actor));
        }

        // Fan-out planning: factory failures are unit-fatal (per actor) but
        // never run-fatal.
        let mut tasks: Vec<Task<'_>> = Vec::new();
        for unit in &self.descriptor.units {
            let unit_evaluator = UnitEvaluator::new(unit, self.evaluator.as_ref());
            if unit.actor_scoped {
                for actor in &active {
                    match unit_evaluator.actor_elements(&base_scope, actor) {
                        Ok(elements) => tasks.extend(elements.into_iter().map(|element| Task {
                            unit,
                            actor: Some(actor.clone()),
                            element,
                        })),
                        Err(e) => {
                            error!("factory expression failed for unit `{}`: {}", unit.name, e)
                        }
                    }
                }
            } else {
                match unit_evaluator.global_elements(&base_scope, &active) {
                    Ok(elements) => tasks.extend(elements.into_iter().map(|element| Task {
                        unit,
                        actor: None,
                        element,
                    })),
                    Err(e) => error!("factory expression failed for unit `{}`: {}", unit.name, e),
                }
            }
        }
        debug!(
            "scheduling {} generation tasks across {} units",
            tasks.len(),
            self.descriptor.units.len()
        );

        let result = Mutex::new(seeded);
        tasks.par_iter().for_each(|task| {
            if let Some(artifact) = self.run_task(task, &base_scope) {
                let mut guard = match result.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                match &task.actor {
                    Some(actor) => guard.insert_for_actor(&actor_key(actor), artifact),
                    None => guard.insert_global(artifact),
                }
            }
        });
        Ok(match result.into_inner() {
            Ok(result) => result,
            Err(poisoned) => poisoned.into_inner(),
        })
    }

    /// Run one (unit, element) task: scope construction, then path
    /// evaluation, then content production.
    fn run_task(&self, task: &Task<'_>, base_scope: &Scope) -> Option<GeneratedArtifact> {
        let unit = task.unit;
        let unit_evaluator = UnitEvaluator::new(unit, self.evaluator.as_ref());

        let mut scope = base_scope.clone();
        if let Some(actor) = &task.actor {
            scope.set(ACTOR_TYPE, actor.clone());
        }
        scope.set(TEMPLATE, unit.to_value());
        scope.set(SELF, task.element.clone());

        let mut content_failed = false;
        if let Err(e) = unit_evaluator.apply_bindings(&self.descriptor.context_bindings, &mut scope)
        {
            error!("context binding failed for unit `{}`: {}", unit.name, e);
            content_failed = true;
        }

        // An unevaluable path is the one condition that prevents the
        // artifact from being recorded at all.
        let path = match unit_evaluator.output_path(&scope) {
            Ok(path) => path,
            Err(e) => {
                error!("skipping artifact of unit `{}`: {}", unit.name, e);
                return None;
            }
        };

        let content = if content_failed {
            Vec::new()
        } else {
            self.produce_content(unit, &scope, &path)
        };
        Some(GeneratedArtifact::new(path, content))
    }

    fn produce_content(&self, unit: &GenerationUnit, scope: &Scope, path: &str) -> Vec<u8> {
        let Some(location) = unit.template.as_deref() else {
            debug!(
                "unit `{}` has no template; artifact `{}` recorded with empty content",
                unit.name, path
            );
            return Vec::new();
        };
        if unit.copy {
            match self.chain.resolve_content(location) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(
                        "could not resolve `{}` for artifact `{}` of unit `{}`: {}",
                        location, path, unit.name, e
                    );
                    Vec::new()
                }
            }
        } else {
            match self.render_template(location, scope) {
                Ok(text) => text.into_bytes(),
                Err(e) => {
                    error!(
                        "could not generate artifact `{}` of unit `{}`: {}",
                        path, unit.name, e
                    );
                    Vec::new()
                }
            }
        }
    }

    fn render_template(&self, location: &str, scope: &Scope) -> Result<String> {
        let bytes = self.chain.resolve_content(location)?;
        let template = TemplateSource::from_bytes(location, bytes)?;
        self.renderer.render(&template, scope)
    }

    /// Execute the run and write the result to disk: one target directory
    /// per actor (resolved by `actor_target`) plus one for the flat bucket.
    pub fn generate_to_directory(
        &self,
        global_target: &Path,
        actor_target: &dyn Fn(&str) -> PathBuf,
    ) -> Result<(GenerationResult, WriteReport)> {
        let result = self.execute()?;
        let mut report = WriteReport::default();
        for (actor, artifacts) in result.actor_buckets() {
            if artifacts.is_empty() {
                continue;
            }
            report.merge(reconciler::write_artifacts(&actor_target(actor), artifacts));
        }
        report.merge(reconciler::write_artifacts(
            global_target,
            result.global_artifacts(),
        ));
        Ok((result, report))
    }
}

struct Task<'a> {
    unit: &'a GenerationUnit,
    actor: Option<Value>,
    element: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::SimpleEvaluator;
    use crate::render::InterpolatingRenderer;
    use serial_test::serial;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;
    use url::Url;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn chain_for(dir: &Path) -> ResourceChain {
        ResourceChain::from_roots(&[Url::from_directory_path(dir).unwrap()]).unwrap()
    }

    fn actor(name: &str) -> Value {
        Value::object([("name", Value::from(name))])
    }

    fn run_for(dir: &Path, descriptor_yaml: &str) -> GeneratorRun {
        let descriptor = GenerationModel::parse(descriptor_yaml).unwrap();
        let evaluator: Arc<dyn Evaluator> = Arc::new(SimpleEvaluator::new());
        let renderer = Arc::new(InterpolatingRenderer::new(evaluator.clone()));
        GeneratorRun::new(
            descriptor,
            chain_for(dir),
            evaluator,
            renderer,
            Value::object([("name", Value::from("demo"))]),
        )
        .with_actor_types(vec![actor("Alice"), actor("Bob")])
    }

    const PROFILE_DESCRIPTOR: &str = r#"
units:
  - name: profile
    pathExpression: self.name + '/info'
    template: profile.hbs
    actorScoped: true
"#;

    #[test]
    fn test_actor_scoped_unit_generates_one_artifact_per_actor() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "profile.hbs", "Hello {{ self.name }}\n");
        let result = run_for(dir.path(), PROFILE_DESCRIPTOR).execute().unwrap();

        assert!(result.global_artifacts().is_empty());
        let alice = result.actor_artifacts("Alice").unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].path, "Alice/info");
        assert_eq!(alice[0].content, b"Hello Alice\n");
        let bob = result.actor_artifacts("Bob").unwrap();
        assert_eq!(bob[0].path, "Bob/info");
        assert_eq!(bob[0].content, b"Hello Bob\n");
    }

    #[test]
    fn test_execute_is_idempotent() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "profile.hbs", "Hello {{ self.name }}\n");
        let run = run_for(dir.path(), PROFILE_DESCRIPTOR);
        let first = run.execute().unwrap();
        let second = run.execute().unwrap();
        assert_eq!(first.sorted_pairs(), second.sorted_pairs());
    }

    #[test]
    fn test_copy_unit_copies_verbatim_bytes() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "assets/logo.png", "raw {{ not rendered }} bytes");
        let result = run_for(
            dir.path(),
            r#"
units:
  - name: logo
    pathExpression: "'static/logo.png'"
    template: assets/logo.png
    copy: true
"#,
        )
        .execute()
        .unwrap();
        assert_eq!(result.global_artifacts().len(), 1);
        assert_eq!(
            result.global_artifacts()[0].content,
            b"raw {{ not rendered }} bytes"
        );
    }

    #[test]
    fn test_render_failure_records_empty_artifact_and_isolates_siblings() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "good.hbs", "ok {{ self.name }}");
        write(dir.path(), "broken.hbs", "{{ self.name");
        let result = run_for(
            dir.path(),
            r#"
units:
  - name: good
    pathExpression: self.name + '/good'
    template: good.hbs
    actorScoped: true
  - name: broken
    pathExpression: self.name + '/broken'
    template: broken.hbs
    actorScoped: true
"#,
        )
        .execute()
        .unwrap();
        let alice = result.actor_artifacts("Alice").unwrap();
        assert_eq!(alice.len(), 2);
        let good = alice.iter().find(|a| a.path == "Alice/good").unwrap();
        assert_eq!(good.content, b"ok Alice");
        let broken = alice.iter().find(|a| a.path == "Alice/broken").unwrap();
        assert!(broken.content.is_empty());
    }

    #[test]
    #[serial]
    fn test_render_failure_is_logged_with_path_and_unit() {
        testing_logger::setup();
        let dir = TempDir::new().unwrap();
        write(dir.path(), "broken.hbs", "{{ self.name");
        run_for(
            dir.path(),
            r#"
units:
  - name: broken
    pathExpression: "'out/broken.txt'"
    template: broken.hbs
"#,
        )
        .execute()
        .unwrap();
        testing_logger::validate(|captured| {
            let errors: Vec<_> = captured
                .iter()
                .filter(|l| l.level == log::Level::Error)
                .collect();
            assert!(!errors.is_empty());
            assert!(errors[0].body.contains("out/broken.txt"));
            assert!(errors[0].body.contains("broken"));
        });
    }

    #[test]
    fn test_missing_template_resource_records_empty_artifact() {
        let dir = TempDir::new().unwrap();
        let result = run_for(
            dir.path(),
            r#"
units:
  - name: ghost
    pathExpression: "'ghost.txt'"
    template: missing.hbs
"#,
        )
        .execute()
        .unwrap();
        assert_eq!(result.global_artifacts().len(), 1);
        assert!(result.global_artifacts()[0].content.is_empty());
    }

    #[test]
    fn test_unevaluable_path_skips_artifact_only() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "page.hbs", "content");
        let result = run_for(
            dir.path(),
            r#"
units:
  - name: pathless
    pathExpression: ghost + '/x'
    template: page.hbs
  - name: fine
    pathExpression: "'fine.txt'"
    template: page.hbs
"#,
        )
        .execute()
        .unwrap();
        let paths: Vec<&str> = result
            .global_artifacts()
            .iter()
            .map(|a| a.path.as_str())
            .collect();
        assert_eq!(paths, vec!["fine.txt"]);
    }

    #[test]
    fn test_factory_failure_skips_unit_but_not_siblings() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "page.hbs", "content");
        let result = run_for(
            dir.path(),
            r#"
units:
  - name: bad-factory
    factoryExpression: "'unterminated"
    pathExpression: "'never.txt'"
    template: page.hbs
  - name: fine
    pathExpression: "'fine.txt'"
    template: page.hbs
"#,
        )
        .execute()
        .unwrap();
        assert_eq!(result.global_artifacts().len(), 1);
        assert_eq!(result.global_artifacts()[0].path, "fine.txt");
    }

    #[test]
    fn test_actor_filter_restricts_generation_but_seeds_all_buckets() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "profile.hbs", "Hello {{ self.name }}\n");
        let result = run_for(dir.path(), PROFILE_DESCRIPTOR)
            .with_actor_filter(|a| a.get("name").and_then(Value::as_str) == Some("Alice"))
            .execute()
            .unwrap();
        assert_eq!(result.actor_artifacts("Alice").unwrap().len(), 1);
        // Bob's bucket exists but stays empty.
        assert_eq!(result.actor_artifacts("Bob"), Some(&[][..]));
    }

    #[test]
    fn test_extra_variables_and_debug_flag_reach_scope() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "page.hbs",
            "extra={{ extra }} debug={{ templateDebug }}",
        );
        let result = run_for(
            dir.path(),
            r#"
units:
  - name: page
    pathExpression: "'page.txt'"
    template: page.hbs
"#,
        )
        .with_extra_variable("extra", Value::from("extra"))
        .with_template_debug(true)
        .execute()
        .unwrap();
        assert_eq!(result.global_artifacts()[0].content, b"extra=extra debug=true");
    }

    #[test]
    fn test_model_level_bindings_reach_every_unit_scope() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "page.hbs", "title={{ title }}");
        let result = run_for(
            dir.path(),
            r#"
contextBindings:
  - name: title
    expression: "'Catalog'"
units:
  - name: page
    pathExpression: "'page.txt'"
    template: page.hbs
"#,
        )
        .execute()
        .unwrap();
        assert_eq!(result.global_artifacts()[0].content, b"title=Catalog");
    }

    #[test]
    fn test_catalog_unit_generates_per_actor_into_flat_bucket() {
        let dir = TempDir::new().unwrap();
        let result = run_for(
            dir.path(),
            r#"
units:
  - name: catalog
    pathExpression: self.name + '/.keep'
"#,
        )
        .execute()
        .unwrap();
        // Global unit without template: iterates the actor set, artifacts
        // land in the flat bucket with empty content.
        let mut paths: Vec<&str> = result
            .global_artifacts()
            .iter()
            .map(|a| a.path.as_str())
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["Alice/.keep", "Bob/.keep"]);
        assert!(result.global_artifacts().iter().all(|a| a.content.is_empty()));
    }

    #[test]
    fn test_override_template_decorates_through_run() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "profile.hbs", "plain {{ self.name }}");
        write(dir.path(), "profile.override.hbs", "DECORATED {{ self.name }}");
        let result = run_for(dir.path(), PROFILE_DESCRIPTOR).execute().unwrap();
        let alice = result.actor_artifacts("Alice").unwrap();
        assert_eq!(alice[0].content, b"DECORATED Alice");
    }

    #[test]
    fn test_generate_to_directory_splits_buckets() {
        let templates = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write(templates.path(), "profile.hbs", "Hello {{ self.name }}\n");
        write(templates.path(), "manifest.hbs", "actors: {{ actorTypes }}\n");
        // The path expression is relative to the per-actor directory; the
        // resolver supplies the actor segment.
        let run = run_for(
            templates.path(),
            r#"
units:
  - name: profile
    pathExpression: "'info'"
    template: profile.hbs
    actorScoped: true
  - name: manifest
    pathExpression: "'manifest.txt'"
    template: manifest.hbs
"#,
        );
        let actors_root = output.path().join("actors");
        let (result, report) = run
            .generate_to_directory(output.path(), &|actor| actors_root.join(actor))
            .unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(report.written, 3);
        assert!(output.path().join("manifest.txt").is_file());
        assert!(actors_root.join("Alice/info").is_file());
        assert!(actors_root.join("Bob/info").is_file());
        let body = fs::read_to_string(actors_root.join("Alice/info")).unwrap();
        assert_eq!(body, "Hello Alice\n");
    }

    #[test]
    fn test_actor_prefixed_paths_use_a_shared_target_directory() {
        // When the path expression already emits the actor segment, the
        // resolver must hand every actor the same directory, or the segment
        // doubles up (`Alice/Alice/info`).
        let templates = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write(templates.path(), "profile.hbs", "Hello {{ self.name }}\n");
        let run = run_for(templates.path(), PROFILE_DESCRIPTOR);
        let shared = output.path().to_path_buf();
        let (_, report) = run
            .generate_to_directory(output.path(), &|_| shared.clone())
            .unwrap();
        assert_eq!(report.written, 2);
        assert!(output.path().join("Alice/info").is_file());
        assert!(output.path().join("Bob/info").is_file());
        assert!(!output.path().join("Alice/Alice").exists());
    }
}
