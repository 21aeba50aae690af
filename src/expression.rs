//! # Expression Evaluation
//!
//! The engine treats the expression language as an opaque capability behind
//! the [`Evaluator`] trait: `evaluate(expression, scope)` returns a typed
//! [`Value`], or `None` when the expression legitimately produces nothing.
//! An absent result is distinguishable from an empty collection
//! (`Some(Value::List(vec![]))`).
//!
//! Helper functions are exposed through an explicit [`FunctionRegistry`]
//! populated by caller-supplied registration calls; there is no runtime
//! scanning of types for callables.
//!
//! [`SimpleEvaluator`] is the built-in default dialect, sufficient for
//! descriptor path and factory rules:
//!
//! - variable references with dotted member navigation: `self.name`,
//!   `model.actors.0.name` (numeric segments index into lists)
//! - single- or double-quoted string literals: `'/info'`
//! - integer literals
//! - `+` concatenation of any of the above
//! - registry function calls: `lower(self.name)`
//!
//! Richer engines plug in at the trait seam; the orchestration logic never
//! inspects evaluator internals.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::scope::Scope;
use crate::value::Value;

/// Evaluates a declarative expression string against a variable scope.
pub trait Evaluator: Send + Sync {
    /// Evaluate `expression` against `scope`.
    ///
    /// `Ok(None)` means the expression produced no value (e.g. a reference
    /// to an unbound variable); `Err` means the expression itself failed.
    fn evaluate(&self, expression: &str, scope: &Scope) -> Result<Option<Value>>;
}

/// A callable helper function usable from expressions.
pub type HelperFn = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// An explicit mapping from function name to callable.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, HelperFn>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a helper under `name`, replacing any previous registration.
    pub fn register<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.functions.insert(name.to_string(), Arc::new(function));
    }

    /// Look up a helper by name.
    pub fn get(&self, name: &str) -> Option<&HelperFn> {
        self.functions.get(name)
    }

    /// Registered helper names, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The built-in minimal expression dialect.
#[derive(Clone, Debug, Default)]
pub struct SimpleEvaluator {
    functions: FunctionRegistry,
}

impl SimpleEvaluator {
    /// Create an evaluator with no helper functions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an evaluator backed by the given helper registry.
    pub fn with_functions(functions: FunctionRegistry) -> Self {
        Self { functions }
    }

    fn eval_error(expression: &str, message: impl Into<String>) -> Error {
        Error::Evaluation {
            expression: expression.to_string(),
            message: message.into(),
        }
    }

    /// Split `input` on `separator` at paren depth zero, outside quotes.
    fn split_top_level<'a>(
        expression: &str,
        input: &'a str,
        separator: char,
    ) -> Result<Vec<&'a str>> {
        let mut parts = Vec::new();
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut start = 0usize;
        for (i, c) in input.char_indices() {
            match quote {
                Some(q) => {
                    if c == q {
                        quote = None;
                    }
                }
                None => match c {
                    '\'' | '"' => quote = Some(c),
                    '(' => depth += 1,
                    ')' => {
                        depth = depth.checked_sub(1).ok_or_else(|| {
                            Self::eval_error(expression, "unbalanced closing parenthesis")
                        })?;
                    }
                    c if c == separator && depth == 0 => {
                        parts.push(&input[start..i]);
                        start = i + c.len_utf8();
                    }
                    _ => {}
                },
            }
        }
        if quote.is_some() {
            return Err(Self::eval_error(expression, "unterminated string literal"));
        }
        if depth != 0 {
            return Err(Self::eval_error(expression, "unbalanced opening parenthesis"));
        }
        parts.push(&input[start..]);
        Ok(parts)
    }

    fn is_identifier(segment: &str) -> bool {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_')
    }

    fn eval_path(&self, expression: &str, path: &str, scope: &Scope) -> Result<Option<Value>> {
        let mut segments = path.split('.');
        let root = segments.next().unwrap_or_default();
        if !Self::is_identifier(root) {
            return Err(Self::eval_error(
                expression,
                format!("invalid term `{}`", path),
            ));
        }
        let mut current = match scope.get(root) {
            Some(value) => value.clone(),
            None => return Ok(None),
        };
        for segment in segments {
            if !Self::is_identifier(segment) {
                return Err(Self::eval_error(
                    expression,
                    format!("invalid member `{}` in `{}`", segment, path),
                ));
            }
            let next = match (&current, segment.parse::<usize>()) {
                (Value::List(items), Ok(index)) => items.get(index).cloned(),
                _ => current.get(segment).cloned(),
            };
            match next {
                Some(value) => current = value,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    fn eval_call(
        &self,
        expression: &str,
        name: &str,
        args: &str,
        scope: &Scope,
    ) -> Result<Option<Value>> {
        if !Self::is_identifier(name) {
            return Err(Self::eval_error(
                expression,
                format!("invalid function name `{}`", name),
            ));
        }
        let function = self.functions.get(name).ok_or_else(|| {
            Self::eval_error(expression, format!("unknown function `{}`", name))
        })?;
        let mut values = Vec::new();
        if !args.trim().is_empty() {
            for arg in Self::split_top_level(expression, args, ',')? {
                let value = self.eval_concat(expression, arg, scope)?;
                values.push(value.unwrap_or(Value::Null));
            }
        }
        function(&values).map(Some)
    }

    fn eval_term(&self, expression: &str, term: &str, scope: &Scope) -> Result<Option<Value>> {
        let t = term.trim();
        if t.is_empty() {
            return Err(Self::eval_error(expression, "empty term"));
        }
        if let Some(first) = t.chars().next() {
            if first == '\'' || first == '"' {
                if t.len() >= 2 && t.ends_with(first) {
                    return Ok(Some(Value::Str(t[1..t.len() - 1].to_string())));
                }
                return Err(Self::eval_error(expression, "unterminated string literal"));
            }
        }
        if let Ok(n) = t.parse::<i64>() {
            return Ok(Some(Value::Int(n)));
        }
        if let Some(open) = t.find('(') {
            if t.ends_with(')') {
                let name = &t[..open];
                let args = &t[open + 1..t.len() - 1];
                return self.eval_call(expression, name, args, scope);
            }
            return Err(Self::eval_error(
                expression,
                format!("malformed call `{}`", t),
            ));
        }
        self.eval_path(expression, t, scope)
    }

    fn eval_concat(&self, expression: &str, input: &str, scope: &Scope) -> Result<Option<Value>> {
        let parts = Self::split_top_level(expression, input, '+')?;
        if parts.len() == 1 {
            return self.eval_term(expression, parts[0], scope);
        }
        let mut rendered = String::new();
        for part in &parts {
            match self.eval_term(expression, part, scope)? {
                Some(value) => rendered.push_str(&value.to_string()),
                None => {
                    return Err(Self::eval_error(
                        expression,
                        format!("`{}` produced no value", part.trim()),
                    ));
                }
            }
        }
        Ok(Some(Value::Str(rendered)))
    }
}

impl Evaluator for SimpleEvaluator {
    fn evaluate(&self, expression: &str, scope: &Scope) -> Result<Option<Value>> {
        self.eval_concat(expression, expression, scope)
    }
}
