//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for the
//! `modelgen` engine. It uses the `thiserror` library to create a
//! comprehensive `Error` enum that covers all anticipated failure modes,
//! providing clear and descriptive error messages.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum that represents all possible errors that can
//!   occur within the engine. Each variant corresponds to a specific type of
//!   error and includes contextual information to aid in debugging.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`, used
//!   throughout the engine to simplify function signatures.
//!
//! The propagation policy is deliberately fine-grained: a resolution, render
//! or evaluation error is terminal for a single artifact or a single
//! generation unit, never for the whole run. Only structural failures (no
//! resource roots supplied, a malformed descriptor layer) abort a run.

use thiserror::Error;

/// Main error type for modelgen operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error occurred while parsing a generator descriptor document.
    ///
    /// This error includes the specific parsing issue and optionally a hint
    /// about how to fix it.
    #[error("Descriptor parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    DescriptorParse {
        message: String,
        /// Optional hint for how to fix the descriptor issue
        hint: Option<String>,
    },

    /// A generation unit was declared with an invalid field combination.
    ///
    /// Raised at load/merge time so that structural mistakes surface early
    /// instead of as confusing runtime failures.
    #[error("Invalid generation unit `{unit}`: {message}")]
    UnitValidation { unit: String, message: String },

    /// No node in the resource chain could produce content for a location.
    #[error("Resource not found in chain: {location}")]
    ResourceNotFound { location: String },

    /// A URL-only lookup exhausted the chain without a resolvable root.
    #[error("Could not resolve URL for: {location}")]
    Unresolved { location: String },

    /// An expression could not be parsed or evaluated.
    #[error("Expression evaluation error in `{expression}`: {message}")]
    Evaluation {
        expression: String,
        message: String,
    },

    /// A template could not be rendered.
    #[error("Template render error for `{template}`: {message}")]
    Render { template: String, message: String },

    /// A path expression evaluated to an empty string.
    ///
    /// Without an output path no artifact can be recorded for the element.
    #[error("Path expression of unit `{unit}` produced an empty path")]
    EmptyPath { unit: String },

    /// A structural problem with the generation setup (e.g. no resource
    /// roots were supplied).
    #[error("Generation model error: {message}")]
    Model { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
