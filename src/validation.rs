//! Checks a captured response against a test's expectations.
//!
//! Validation never short-circuits: a status mismatch, a missing key and every
//! violated validator each produce their own [`Failure`], in declaration order.

use std::fmt;

use serde_json::Value;

use crate::errors::ResolveError;
use crate::path::PathError;
use crate::resolve::resolve;
use crate::runner::record::ExecutionRecord;
use crate::runner::RunContext;
use crate::suite::{ExpectationSpec, FieldRule};

pub mod validators;

pub use validators::{display_value, json_eq, type_name, ValidatorKind, REGISTRY, TYPE_NAMES};

// ============================================================================
// FAILURES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    StatusMismatch,
    FieldNotFound,
    Validator(ValidatorKind),
    /// The validator's operand could not be resolved at execution time.
    OperandUnresolved(ValidatorKind),
}

/// One violated expectation.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: FailureKind,
    /// The JSON-path key of the rule, absent for status mismatches.
    pub key: Option<String>,
    pub message: String,
}

impl Failure {
    pub fn status_mismatch(expected: u16, actual: u16) -> Self {
        Self {
            kind: FailureKind::StatusMismatch,
            key: None,
            message: format!("expected status {expected}, got {actual}"),
        }
    }

    pub fn field_not_found(key: &str, error: &PathError) -> Self {
        Self {
            kind: FailureKind::FieldNotFound,
            key: Some(key.to_string()),
            message: error.to_string(),
        }
    }

    pub fn validator(key: &str, kind: ValidatorKind, explanation: String) -> Self {
        Self {
            kind: FailureKind::Validator(kind),
            key: Some(key.to_string()),
            message: explanation,
        }
    }

    pub fn operand_unresolved(key: &str, kind: ValidatorKind, error: &ResolveError) -> Self {
        Self {
            kind: FailureKind::OperandUnresolved(kind),
            key: Some(key.to_string()),
            message: format!("operand could not be resolved: {error}"),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self.key.as_deref().unwrap_or("");
        let key = if key.is_empty() { "<root>" } else { key };
        match self.kind {
            FailureKind::StatusMismatch => write!(f, "status: {}", self.message),
            FailureKind::FieldNotFound => write!(f, "key `{key}` not found: {}", self.message),
            FailureKind::Validator(kind) | FailureKind::OperandUnresolved(kind) => {
                write!(f, "key `{key}` failed `{kind}`: {}", self.message)
            }
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Validates `record`'s captured response against `expected`.
///
/// An empty result means the test passed. A record without a response is
/// checked against a `null` body and status `0`.
pub fn validate(
    record: &ExecutionRecord,
    expected: &ExpectationSpec,
    ctx: &RunContext,
) -> Vec<Failure> {
    let mut failures = Vec::new();
    let response = record.response();

    if let Some(wanted) = expected.status {
        let actual = response.map_or(0, |captured| captured.status);
        if actual != wanted {
            failures.push(Failure::status_mismatch(wanted, actual));
        }
    }

    if let Some(body) = &expected.response {
        let tree = response.map_or(Value::Null, |captured| captured.tree());
        for rule in &body.rules {
            check_rule(rule, &tree, ctx, &mut failures);
        }
    }

    failures
}

fn check_rule(rule: &FieldRule, tree: &Value, ctx: &RunContext, failures: &mut Vec<Failure>) {
    let key = rule.key.as_str();
    let actual = match rule.key.evaluate(tree) {
        Ok(actual) => actual,
        Err(error) => {
            failures.push(Failure::field_not_found(key, &error));
            return;
        }
    };

    for validator in &rule.validators {
        let operand = match resolve(&validator.operand, ctx) {
            Ok(operand) => operand,
            Err(error) => {
                failures.push(Failure::operand_unresolved(key, validator.kind, &error));
                continue;
            }
        };
        if let Err(explanation) = validator.kind.apply(actual, &operand) {
            failures.push(Failure::validator(key, validator.kind, explanation));
        }
    }
}
