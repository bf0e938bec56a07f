//! Error types for every stage of an apicheck run.
//!
//! Errors are split by the scope they fail:
//! - [`LoadError`] aborts a whole test file (unreadable file, bad YAML, bad top-level shape).
//! - [`SpecError`] fails one test before any request is sent.
//! - [`ResolveError`] fails one value lookup at execution time.
//! - [`TransportError`] is reported by the HTTP collaborator.
//! - [`RunError`] is the cause attached to an `ERROR` execution record.
//!
//! All of them render as `miette` diagnostics with stable codes.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::path::PathError;

// ============================================================================
// FILE-LEVEL ERRORS
// ============================================================================

/// A failure that prevents a whole test file from being loaded.
#[derive(Debug, Error, Diagnostic)]
pub enum LoadError {
    #[error("failed to read '{path}'")]
    #[diagnostic(code(apicheck::load::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML in '{path}'")]
    #[diagnostic(code(apicheck::load::yaml), help("check indentation and quoting"))]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("malformed suite: {message}")]
    #[diagnostic(
        code(apicheck::load::malformed),
        help("a suite is either a list of tests or a mapping with `constants` and `tests`")
    )]
    Malformed { message: String },

    #[error("failed to walk directory '{path}': {message}")]
    #[diagnostic(code(apicheck::load::discovery))]
    Discovery { path: PathBuf, message: String },
}

// ============================================================================
// PER-TEST SPECIFICATION ERRORS
// ============================================================================

/// A structural problem in one test definition, detected before execution.
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum SpecError {
    #[error("test is missing required field `{field}`")]
    #[diagnostic(code(apicheck::spec::missing_field))]
    MissingField { field: String },

    #[error("field `{field}` is malformed: {message}")]
    #[diagnostic(code(apicheck::spec::malformed_field))]
    MalformedField { field: String, message: String },

    #[error("unknown constant `{name}`")]
    #[diagnostic(
        code(apicheck::spec::unknown_constant),
        help("declare it under the suite's `constants` section")
    )]
    UnknownConstant { name: String },

    #[error("invalid path `{path}`: {message}")]
    #[diagnostic(code(apicheck::spec::invalid_path))]
    InvalidPath { path: String, message: String },

    #[error("unknown validator `{name}` on key `{key}`")]
    #[diagnostic(
        code(apicheck::spec::unknown_validator),
        help("supported validators: type, equal, not_equal, contains, not_contains, regex, date_format, range, empty, not_empty, length")
    )]
    UnknownValidator { key: String, name: String },

    #[error("invalid operand for `{validator}` on key `{key}`: {message}")]
    #[diagnostic(code(apicheck::spec::invalid_operand))]
    InvalidOperand {
        key: String,
        validator: String,
        message: String,
    },

    #[error("duplicate test name `{name}`")]
    #[diagnostic(code(apicheck::spec::duplicate_test))]
    DuplicateTest { name: String },

    #[error("`response_from` references unknown test `{target}`")]
    #[diagnostic(
        code(apicheck::spec::missing_dependency),
        help("referenced tests must be declared in the same file")
    )]
    MissingDependency { target: String },

    #[error("cyclic `response_from` dependency: {}", .cycle.join(" -> "))]
    #[diagnostic(code(apicheck::spec::cyclic_dependency))]
    CyclicDependency { cycle: Vec<String> },

    #[error("invalid request: {message}")]
    #[diagnostic(code(apicheck::spec::invalid_request))]
    InvalidRequestSpec { message: String },
}

impl SpecError {
    pub fn malformed(field: impl Into<String>, message: impl Into<String>) -> Self {
        SpecError::MalformedField {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        SpecError::InvalidRequestSpec {
            message: message.into(),
        }
    }
}

// ============================================================================
// EXECUTION-TIME ERRORS
// ============================================================================

/// A value reference that could not be materialized.
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum ResolveError {
    #[error("unknown constant `{name}`")]
    #[diagnostic(code(apicheck::resolve::unknown_constant))]
    UnknownConstant { name: String },

    #[error("dependency `{test}` is not satisfied ({reason})")]
    #[diagnostic(
        code(apicheck::resolve::dependency_unsatisfied),
        help("a `response_from` target must run and pass before its dependents")
    )]
    DependencyUnsatisfied { test: String, reason: String },

    #[error("value at `{path}` in response of `{test}` is unavailable: {source}")]
    #[diagnostic(code(apicheck::resolve::path_not_found))]
    PathNotFound {
        test: String,
        path: String,
        #[source]
        source: PathError,
    },
}

/// A failure reported by the HTTP transport.
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum TransportError {
    #[error("connection error: {0}")]
    #[diagnostic(code(apicheck::transport::connection))]
    Connection(String),

    #[error("request timed out: {0}")]
    #[diagnostic(code(apicheck::transport::timeout))]
    Timeout(String),

    #[error("failed to decode response: {0}")]
    #[diagnostic(code(apicheck::transport::decode))]
    Decode(String),

    #[error("request rejected by transport: {0}")]
    #[diagnostic(code(apicheck::transport::invalid_request))]
    InvalidRequest(String),
}

/// The cause attached to a test that ended in `ERROR`.
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum RunError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] TransportError),

    #[error("run cancelled before this test started")]
    #[diagnostic(code(apicheck::run::cancelled))]
    Cancelled,
}
