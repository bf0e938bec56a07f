//! The in-memory model of a test suite.
//!
//! A suite is loaded once (see [`loader`]) and never mutated afterwards. Values
//! that can only be known at execution time are kept as [`ValueRef`]s and
//! materialized by [`crate::resolve`] when their test runs.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::errors::SpecError;
use crate::path::JsonPath;
use crate::validation::ValidatorKind;

pub mod loader;
pub mod template;

pub use loader::{load_file, parse_str, parse_tree};
pub use template::Template;

/// Suite-scoped constants, addressed through `{{name}}`.
pub type Constants = Map<String, Value>;

// ============================================================================
// SUITE AND TEST CASES
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct TestSuite {
    pub constants: Arc<Constants>,
    pub tests: Vec<TestEntry>,
}

impl TestSuite {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tests.iter().map(TestEntry::name)
    }
}

/// One declared test: either fully parsed, or rejected with the reason.
///
/// Rejected tests stay in the suite so they show up in the report exactly once.
#[derive(Debug, Clone)]
pub enum TestEntry {
    Ready(TestCase),
    Invalid { name: String, error: SpecError },
}

impl TestEntry {
    pub fn name(&self) -> &str {
        match self {
            TestEntry::Ready(case) => &case.name,
            TestEntry::Invalid { name, .. } => name,
        }
    }

    pub fn as_case(&self) -> Option<&TestCase> {
        match self {
            TestEntry::Ready(case) => Some(case),
            TestEntry::Invalid { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub description: Option<String>,
    pub log: LogLevel,
    pub request: RequestSpec,
    pub expected: ExpectationSpec,
}

impl TestCase {
    /// Names of the tests this one reads responses from, deduplicated, in order of first use.
    pub fn dependencies(&self) -> Vec<String> {
        let mut refs = Vec::new();
        self.for_each_value(&mut |value| value.collect_responses(&mut refs));

        let mut names: Vec<String> = Vec::new();
        for response in refs {
            if !names.iter().any(|name| name == &response.test) {
                names.push(response.test.clone());
            }
        }
        names
    }

    /// Constant names referenced anywhere in the test, repeats included.
    pub fn constant_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        if let Some(endpoint) = &self.request.endpoint {
            names.extend(endpoint.placeholders());
        }
        self.for_each_value(&mut |value| value.collect_constants(&mut names));
        names
    }

    fn for_each_value<'a>(&'a self, visit: &mut dyn FnMut(&'a ValueRef)) {
        for (_, value) in &self.request.params {
            visit(value);
        }
        for (_, value) in &self.request.headers {
            visit(value);
        }
        if let Some(body) = &self.request.body {
            visit(body);
        }
        if let Some(response) = &self.expected.response {
            for rule in &response.rules {
                for validator in &rule.validators {
                    visit(&validator.operand);
                }
            }
        }
    }
}

/// Per-test verbosity for request/response dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    /// Unrecognised levels fall back to `Info`.
    pub fn parse_lenient(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("debug") {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }
}

// ============================================================================
// REQUESTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Connect,
    Trace,
}

impl Method {
    pub const ALL: [Method; 9] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
        Method::Head,
        Method::Options,
        Method::Connect,
        Method::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Connect => "CONNECT",
            Method::Trace => "TRACE",
        }
    }
}

impl FromStr for Method {
    type Err = SpecError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let upper = raw.trim().to_ascii_uppercase();
        Method::ALL
            .into_iter()
            .find(|method| method.as_str() == upper)
            .ok_or_else(|| SpecError::invalid_request(format!("invalid HTTP verb `{raw}`")))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Declarative request description. `method` and `endpoint` are optional here so
/// that the request builder is the one place that rejects their absence.
#[derive(Debug, Clone, Default)]
pub struct RequestSpec {
    pub method: Option<Method>,
    pub endpoint: Option<Template>,
    pub params: Vec<(String, ValueRef)>,
    pub headers: Vec<(String, ValueRef)>,
    pub body: Option<ValueRef>,
}

// ============================================================================
// VALUE REFERENCES
// ============================================================================

/// A value whose concrete form may depend on constants or on earlier responses.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueRef {
    Literal(Value),
    /// A string that is exactly one `{{name}}`; keeps the constant's JSON type.
    Constant(String),
    /// A string mixing text and placeholders; always resolves to a string.
    Template(Template),
    Response(ResponseRef),
    List(Vec<ValueRef>),
    Map(Vec<(String, ValueRef)>),
}

impl ValueRef {
    pub fn literal(value: impl Into<Value>) -> Self {
        ValueRef::Literal(value.into())
    }

    /// The operand as a plain value, when it needs no resolution.
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            ValueRef::Literal(value) => Some(value),
            _ => None,
        }
    }

    fn collect_responses<'a>(&'a self, out: &mut Vec<&'a ResponseRef>) {
        match self {
            ValueRef::Response(response) => out.push(response),
            ValueRef::List(items) => items.iter().for_each(|item| item.collect_responses(out)),
            ValueRef::Map(entries) => entries
                .iter()
                .for_each(|(_, item)| item.collect_responses(out)),
            ValueRef::Literal(_) | ValueRef::Constant(_) | ValueRef::Template(_) => {}
        }
    }

    fn collect_constants<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            ValueRef::Constant(name) => out.push(name),
            ValueRef::Template(template) => out.extend(template.placeholders()),
            ValueRef::List(items) => items.iter().for_each(|item| item.collect_constants(out)),
            ValueRef::Map(entries) => entries
                .iter()
                .for_each(|(_, item)| item.collect_constants(out)),
            ValueRef::Literal(_) | ValueRef::Response(_) => {}
        }
    }
}

/// `response_from`: the value at `path` in the captured body of test `test`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRef {
    pub test: String,
    pub path: JsonPath,
}

// ============================================================================
// EXPECTATIONS
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ExpectationSpec {
    pub status: Option<u16>,
    pub response: Option<ResponseExpectation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyKind {
    #[default]
    Json,
    Text,
}

impl FromStr for BodyKind {
    type Err = SpecError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(BodyKind::Json),
            "text" => Ok(BodyKind::Text),
            other => Err(SpecError::malformed(
                "expected.response.type",
                format!("unsupported response type `{other}` (use `json` or `text`)"),
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResponseExpectation {
    pub kind: BodyKind,
    pub rules: Vec<FieldRule>,
}

/// One JSON-path key and the validators applied to the value found there.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub key: JsonPath,
    pub validators: Vec<Validator>,
}

#[derive(Debug, Clone)]
pub struct Validator {
    pub kind: ValidatorKind,
    pub operand: ValueRef,
}
