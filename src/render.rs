//! # Template Rendering
//!
//! Template rendering is an external capability consumed behind the
//! [`Renderer`] trait: `render(template, scope)` returns the rendered text or
//! a render error. The orchestrator resolves template content through the
//! resource chain first and hands the renderer an already-loaded
//! [`TemplateSource`].
//!
//! [`InterpolatingRenderer`] is the built-in default: it substitutes
//! `{{ expression }}` spans by evaluating them through an [`Evaluator`].
//! An absent expression result renders as the empty string; an evaluation
//! failure fails the render (the orchestrator catches it per task).

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::expression::Evaluator;
use crate::scope::Scope;

/// A loaded template: its logical location plus UTF-8 content.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    /// Logical location the template was resolved from.
    pub location: String,
    /// Template text.
    pub content: String,
}

impl TemplateSource {
    /// Create a template source from text.
    pub fn new(location: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            content: content.into(),
        }
    }

    /// Create a template source from raw bytes, which must be valid UTF-8.
    pub fn from_bytes(location: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let location = location.into();
        let content = String::from_utf8(bytes).map_err(|e| Error::Render {
            template: location.clone(),
            message: format!("template is not valid UTF-8: {}", e),
        })?;
        Ok(Self { location, content })
    }
}

/// Renders a template against a variable scope.
pub trait Renderer: Send + Sync {
    /// Render `template` with the variables bound in `scope`.
    fn render(&self, template: &TemplateSource, scope: &Scope) -> Result<String>;
}

/// The built-in `{{ expression }}` interpolating renderer.
pub struct InterpolatingRenderer {
    evaluator: Arc<dyn Evaluator>,
}

impl InterpolatingRenderer {
    /// Create a renderer that evaluates interpolation spans with `evaluator`.
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self { evaluator }
    }
}

impl Renderer for InterpolatingRenderer {
    fn render(&self, template: &TemplateSource, scope: &Scope) -> Result<String> {
        let mut output = String::with_capacity(template.content.len());
        let mut rest = template.content.as_str();
        while let Some(open) = rest.find("{{") {
            output.push_str(&rest[..open]);
            let after_open = &rest[open + 2..];
            let close = after_open.find("}}").ok_or_else(|| Error::Render {
                template: template.location.clone(),
                message: "unclosed '{{' interpolation".to_string(),
            })?;
            let expression = after_open[..close].trim();
            let value = self
                .evaluator
                .evaluate(expression, scope)
                .map_err(|e| Error::Render {
                    template: template.location.clone(),
                    message: e.to_string(),
                })?;
            if let Some(value) = value {
                output.push_str(&value.to_string());
            }
            rest = &after_open[close + 2..];
        }
        output.push_str(rest);
        Ok(output)
    }
}
