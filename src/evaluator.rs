//! # Generation Unit Evaluation
//!
//! Binds one [`GenerationUnit`] to a model instance: computes the iteration
//! space (the elements the unit generates for) and evaluates per-element
//! output paths and context bindings against a task scope.
//!
//! Iteration-space rules:
//!
//! - **Actor-scoped units** are evaluated once per actor. With a factory
//!   expression, its result (coerced to a collection) is the space for that
//!   actor; without one, the actor itself is the sole element.
//! - **Global units** with neither template reference nor factory expression
//!   default to iterating the full actor set when it is non-empty. This is
//!   the "catalog" special case (e.g. one manifest entry per actor declared
//!   as a global unit); it is intentional, preserved for compatibility, and
//!   covered by a test naming it.
//! - Otherwise a global unit's factory expression is evaluated with the unit
//!   descriptor bound as `self`, falling back to the singleton descriptor
//!   element.
//!
//! A factory expression that evaluates to a scalar is always treated as a
//! one-element collection.

use log::debug;

use crate::descriptor::{ContextBinding, GenerationUnit};
use crate::error::{Error, Result};
use crate::expression::Evaluator;
use crate::scope::{Scope, ACTOR_TYPE, SELF};
use crate::value::Value;

/// One generation unit bound to an expression evaluator.
pub struct UnitEvaluator<'a> {
    unit: &'a GenerationUnit,
    evaluator: &'a dyn Evaluator,
}

impl<'a> UnitEvaluator<'a> {
    /// Bind `unit` to `evaluator`.
    pub fn new(unit: &'a GenerationUnit, evaluator: &'a dyn Evaluator) -> Self {
        Self { unit, evaluator }
    }

    /// Iteration space for one actor of an actor-scoped unit.
    ///
    /// The actor is bound as `actorType` before the factory expression runs.
    pub fn actor_elements(&self, base_scope: &Scope, actor: &Value) -> Result<Vec<Value>> {
        let scope = base_scope.clone().with(ACTOR_TYPE, actor.clone());
        match &self.unit.factory_expression {
            Some(expression) => self.factory_elements(expression, &scope),
            None => Ok(vec![actor.clone()]),
        }
    }

    /// Iteration space for a global (non-actor-scoped) unit.
    pub fn global_elements(&self, base_scope: &Scope, actor_types: &[Value]) -> Result<Vec<Value>> {
        if self.unit.template.is_none()
            && self.unit.factory_expression.is_none()
            && !actor_types.is_empty()
        {
            // Catalog units: a structural unit with no template of its own is
            // indexed per actor.
            return Ok(actor_types.to_vec());
        }
        match &self.unit.factory_expression {
            Some(expression) => {
                let scope = base_scope.clone().with(SELF, self.unit.to_value());
                self.factory_elements(expression, &scope)
            }
            None => Ok(vec![self.unit.to_value()]),
        }
    }

    fn factory_elements(&self, expression: &str, scope: &Scope) -> Result<Vec<Value>> {
        match self.evaluator.evaluate(expression, scope)? {
            Some(value) => Ok(value.into_collection()),
            None => {
                debug!(
                    "factory expression of unit `{}` produced no value",
                    self.unit.name
                );
                Ok(Vec::new())
            }
        }
    }

    /// Evaluate the unit's path expression in the fully bound scope.
    ///
    /// The result must be a non-empty string; failure here is fatal for the
    /// element (no artifact is recorded) but not for sibling elements.
    pub fn output_path(&self, scope: &Scope) -> Result<String> {
        let expression =
            self.unit
                .path_expression
                .as_deref()
                .ok_or_else(|| Error::UnitValidation {
                    unit: self.unit.name.clone(),
                    message: "unit has no output path rule".to_string(),
                })?;
        match self.evaluator.evaluate(expression, scope)? {
            Some(value) => {
                let path = value.to_string();
                if path.trim().is_empty() {
                    return Err(Error::EmptyPath {
                        unit: self.unit.name.clone(),
                    });
                }
                Ok(path)
            }
            None => Err(Error::Evaluation {
                expression: expression.to_string(),
                message: "path expression produced no value".to_string(),
            }),
        }
    }

    /// Evaluate model-level and unit-level context bindings, in order,
    /// merging each result into `scope`. Later bindings see earlier ones.
    pub fn apply_bindings(
        &self,
        model_bindings: &[ContextBinding],
        scope: &mut Scope,
    ) -> Result<()> {
        for binding in model_bindings.iter().chain(&self.unit.context_bindings) {
            match self.evaluator.evaluate(&binding.expression, scope)? {
                Some(value) => scope.set(binding.name.clone(), value),
                None => debug!(
                    "context binding `{}` of unit `{}` produced no value",
                    binding.name, self.unit.name
                ),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::SimpleEvaluator;
    use crate::scope::MODEL;

    fn unit(name: &str) -> GenerationUnit {
        GenerationUnit {
            name: name.to_string(),
            factory_expression: None,
            path_expression: Some("self.name + '/info'".to_string()),
            template: Some("info.hbs".to_string()),
            actor_scoped: false,
            copy: false,
            context_bindings: Vec::new(),
        }
    }

    fn actor(name: &str) -> Value {
        Value::object([("name", Value::from(name))])
    }

    fn model_scope() -> Scope {
        Scope::new().with(
            MODEL,
            Value::object([(
                "entities",
                Value::from(vec![actor("Order"), actor("Product")]),
            )]),
        )
    }

    #[test]
    fn test_actor_scoped_without_factory_is_actor_singleton() {
        let u = unit("profile");
        let evaluator = SimpleEvaluator::new();
        let ue = UnitEvaluator::new(&u, &evaluator);
        let elements = ue.actor_elements(&model_scope(), &actor("Alice")).unwrap();
        assert_eq!(elements, vec![actor("Alice")]);
    }

    #[test]
    fn test_actor_scoped_factory_sees_actor_type() {
        let mut u = unit("profile");
        u.factory_expression = Some("actorType.name".to_string());
        let evaluator = SimpleEvaluator::new();
        let ue = UnitEvaluator::new(&u, &evaluator);
        let elements = ue.actor_elements(&model_scope(), &actor("Alice")).unwrap();
        // Scalar factory result coerces to a singleton collection.
        assert_eq!(elements, vec![Value::from("Alice")]);
    }

    #[test]
    fn test_factory_collection_result_iterates_all() {
        let mut u = unit("entity");
        u.factory_expression = Some("model.entities".to_string());
        let evaluator = SimpleEvaluator::new();
        let ue = UnitEvaluator::new(&u, &evaluator);
        let elements = ue.global_elements(&model_scope(), &[]).unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].get("name").and_then(Value::as_str), Some("Order"));
    }

    #[test]
    fn test_factory_absent_result_is_empty_space() {
        let mut u = unit("entity");
        u.factory_expression = Some("model.missing".to_string());
        let evaluator = SimpleEvaluator::new();
        let ue = UnitEvaluator::new(&u, &evaluator);
        let elements = ue.global_elements(&model_scope(), &[]).unwrap();
        assert!(elements.is_empty());
    }

    #[test]
    fn test_factory_failure_propagates() {
        let mut u = unit("entity");
        u.factory_expression = Some("'unterminated".to_string());
        let evaluator = SimpleEvaluator::new();
        let ue = UnitEvaluator::new(&u, &evaluator);
        assert!(ue.global_elements(&model_scope(), &[]).is_err());
    }

    #[test]
    fn test_catalog_unit_without_template_iterates_actor_set() {
        // Intentional behavior kept for compatibility: a global unit with
        // neither template nor factory expression is indexed per actor, so
        // catalog-style outputs (one manifest entry per actor) work without
        // declaring the unit actor-scoped.
        let mut u = unit("catalog");
        u.template = None;
        let evaluator = SimpleEvaluator::new();
        let ue = UnitEvaluator::new(&u, &evaluator);
        let actors = vec![actor("Alice"), actor("Bob")];
        let elements = ue.global_elements(&model_scope(), &actors).unwrap();
        assert_eq!(elements, actors);
    }

    #[test]
    fn test_global_unit_with_template_defaults_to_descriptor_singleton() {
        let u = unit("manifest");
        let evaluator = SimpleEvaluator::new();
        let ue = UnitEvaluator::new(&u, &evaluator);
        let elements = ue
            .global_elements(&model_scope(), &[actor("Alice")])
            .unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(
            elements[0].get("name").and_then(Value::as_str),
            Some("manifest")
        );
    }

    #[test]
    fn test_global_factory_binds_unit_descriptor_as_self() {
        let mut u = unit("manifest");
        u.factory_expression = Some("self.name".to_string());
        let evaluator = SimpleEvaluator::new();
        let ue = UnitEvaluator::new(&u, &evaluator);
        let elements = ue.global_elements(&model_scope(), &[]).unwrap();
        assert_eq!(elements, vec![Value::from("manifest")]);
    }

    #[test]
    fn test_output_path_from_element() {
        let u = unit("profile");
        let evaluator = SimpleEvaluator::new();
        let ue = UnitEvaluator::new(&u, &evaluator);
        let scope = Scope::new().with(SELF, actor("Alice"));
        assert_eq!(ue.output_path(&scope).unwrap(), "Alice/info");
    }

    #[test]
    fn test_output_path_must_be_non_empty() {
        let mut u = unit("profile");
        u.path_expression = Some("''".to_string());
        let evaluator = SimpleEvaluator::new();
        let ue = UnitEvaluator::new(&u, &evaluator);
        let err = ue.output_path(&Scope::new()).unwrap_err();
        assert!(matches!(err, Error::EmptyPath { .. }));
    }

    #[test]
    fn test_output_path_absent_value_is_error() {
        let mut u = unit("profile");
        u.path_expression = Some("self.name".to_string());
        let evaluator = SimpleEvaluator::new();
        let ue = UnitEvaluator::new(&u, &evaluator);
        let err = ue.output_path(&Scope::new()).unwrap_err();
        assert!(matches!(err, Error::Evaluation { .. }));
    }

    #[test]
    fn test_bindings_extend_scope_in_order() {
        let mut u = unit("profile");
        u.context_bindings = vec![
            ContextBinding {
                name: "base".to_string(),
                expression: "self.name".to_string(),
            },
            ContextBinding {
                name: "derived".to_string(),
                // Later bindings see earlier ones.
                expression: "base + '!'".to_string(),
            },
        ];
        let evaluator = SimpleEvaluator::new();
        let ue = UnitEvaluator::new(&u, &evaluator);
        let mut scope = Scope::new().with(SELF, actor("Alice"));
        ue.apply_bindings(&[], &mut scope).unwrap();
        assert_eq!(scope.get("derived"), Some(&Value::from("Alice!")));
    }

    #[test]
    fn test_model_bindings_apply_before_unit_bindings() {
        let mut u = unit("profile");
        u.context_bindings = vec![ContextBinding {
            name: "title".to_string(),
            expression: "'unit'".to_string(),
        }];
        let model_bindings = vec![ContextBinding {
            name: "title".to_string(),
            expression: "'model'".to_string(),
        }];
        let evaluator = SimpleEvaluator::new();
        let ue = UnitEvaluator::new(&u, &evaluator);
        let mut scope = Scope::new();
        ue.apply_bindings(&model_bindings, &mut scope).unwrap();
        // Unit-level binding wins over the model-level one.
        assert_eq!(scope.get("title"), Some(&Value::from("unit")));
    }

    #[test]
    fn test_binding_absent_result_is_skipped() {
        let mut u = unit("profile");
        u.context_bindings = vec![ContextBinding {
            name: "maybe".to_string(),
            expression: "ghost".to_string(),
        }];
        let evaluator = SimpleEvaluator::new();
        let ue = UnitEvaluator::new(&u, &evaluator);
        let mut scope = Scope::new();
        ue.apply_bindings(&[], &mut scope).unwrap();
        assert!(!scope.contains("maybe"));
    }
}
