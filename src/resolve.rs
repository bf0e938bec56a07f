//! Materializes [`ValueRef`]s against a [`RunContext`].
//!
//! Resolution is depth-first: structures come back with every nested reference
//! replaced. A `response_from` target must already have a `PASSED` record.

use serde_json::{Map, Value};

use crate::errors::ResolveError;
use crate::runner::record::TestStatus;
use crate::runner::RunContext;
use crate::suite::{ResponseRef, Template, ValueRef};
use crate::validation::validators::display_value;

/// Resolves one value reference.
pub fn resolve(value: &ValueRef, ctx: &RunContext) -> Result<Value, ResolveError> {
    match value {
        ValueRef::Literal(literal) => Ok(literal.clone()),
        ValueRef::Constant(name) => constant(name, ctx).cloned(),
        ValueRef::Template(template) => render(template, ctx).map(Value::String),
        ValueRef::Response(response) => response_value(response, ctx),
        ValueRef::List(items) => items
            .iter()
            .map(|item| resolve(item, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        ValueRef::Map(entries) => entries
            .iter()
            .map(|(key, item)| Ok::<_, ResolveError>((key.clone(), resolve(item, ctx)?)))
            .collect::<Result<Map<String, Value>, ResolveError>>()
            .map(Value::Object),
    }
}

/// Substitutes every `{{name}}` in `template`. Non-string constants are
/// rendered as their JSON text.
pub fn render(template: &Template, ctx: &RunContext) -> Result<String, ResolveError> {
    template.render(|name| constant(name, ctx).map(display_value))
}

/// Resolves a value and flattens it to text, for headers and query parameters.
pub fn resolve_text(value: &ValueRef, ctx: &RunContext) -> Result<String, ResolveError> {
    resolve(value, ctx).map(|value| display_value(&value))
}

/// Fails unless `test` has completed with `PASSED`.
pub fn require_passed(test: &str, ctx: &RunContext) -> Result<(), ResolveError> {
    let unsatisfied = |reason: String| ResolveError::DependencyUnsatisfied {
        test: test.to_string(),
        reason,
    };
    match ctx.record(test) {
        None => Err(unsatisfied("it has not run".to_string())),
        Some(record) if record.status() == TestStatus::Passed => Ok(()),
        Some(record) => Err(unsatisfied(format!("it ended with {}", record.status()))),
    }
}

fn constant<'c>(name: &str, ctx: &'c RunContext) -> Result<&'c Value, ResolveError> {
    ctx.constant(name).ok_or_else(|| ResolveError::UnknownConstant {
        name: name.to_string(),
    })
}

fn response_value(response: &ResponseRef, ctx: &RunContext) -> Result<Value, ResolveError> {
    require_passed(&response.test, ctx)?;
    let tree = ctx
        .record(&response.test)
        .and_then(|record| record.response())
        .map(|captured| captured.tree())
        .unwrap_or(Value::Null);
    response
        .path
        .evaluate(&tree)
        .cloned()
        .map_err(|source| ResolveError::PathNotFound {
            test: response.test.clone(),
            path: response.path.to_string(),
            source,
        })
}
