//! Turns a generic YAML/JSON tree into a [`TestSuite`].
//!
//! File- and suite-level problems (unreadable file, invalid YAML, malformed
//! `constants` or top-level shape) are [`LoadError`]s. Problems inside a single
//! test never abort the load: the test becomes a [`TestEntry::Invalid`] and is
//! reported as an error without running.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::{
    BodyKind, Constants, ExpectationSpec, FieldRule, LogLevel, Method, RequestSpec,
    ResponseExpectation, ResponseRef, Template, TestCase, TestEntry, TestSuite, Validator,
    ValueRef,
};
use crate::errors::{LoadError, SpecError};
use crate::path::JsonPath;
use crate::validation::ValidatorKind;

/// Reads and parses one suite file.
pub fn load_file(path: &Path) -> Result<TestSuite, LoadError> {
    let source = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let tree: Value = serde_yaml::from_str(&source).map_err(|source| LoadError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    parse_tree(tree)
}

/// Parses suite text; used by tests and anything that already holds the YAML.
pub fn parse_str(source: &str) -> Result<TestSuite, LoadError> {
    let tree: Value = serde_yaml::from_str(source).map_err(|source| LoadError::Yaml {
        path: "<inline>".into(),
        source,
    })?;
    parse_tree(tree)
}

/// Accepts either `{constants?, tests}` or a bare list of tests.
pub fn parse_tree(tree: Value) -> Result<TestSuite, LoadError> {
    let (constants, tests) = match tree {
        Value::Array(tests) => (Constants::new(), tests),
        Value::Object(mut root) => {
            let constants = match root.remove("constants") {
                None | Some(Value::Null) => Constants::new(),
                Some(Value::Object(constants)) => constants,
                Some(other) => {
                    return Err(LoadError::Malformed {
                        message: format!(
                            "`constants` must be a mapping, found {}",
                            describe(&other)
                        ),
                    })
                }
            };
            let tests = match root.remove("tests") {
                Some(Value::Array(tests)) => tests,
                Some(other) => {
                    return Err(LoadError::Malformed {
                        message: format!("`tests` must be a list, found {}", describe(&other)),
                    })
                }
                None => {
                    return Err(LoadError::Malformed {
                        message: "no `tests` section found".to_string(),
                    })
                }
            };
            (constants, tests)
        }
        Value::Null => {
            return Err(LoadError::Malformed {
                message: "the file is empty".to_string(),
            })
        }
        other => {
            return Err(LoadError::Malformed {
                message: format!("expected a mapping or a list, found {}", describe(&other)),
            })
        }
    };

    let entries = tests
        .into_iter()
        .enumerate()
        .map(|(index, raw)| parse_entry(index, raw, &constants))
        .collect();

    Ok(TestSuite {
        constants: Arc::new(constants),
        tests: entries,
    })
}

fn parse_entry(index: usize, raw: Value, constants: &Constants) -> TestEntry {
    let fallback_name = format!("#{}", index + 1);
    let fields = match raw {
        Value::Object(fields) => fields,
        other => {
            return TestEntry::Invalid {
                name: fallback_name,
                error: unexpected("test", "a mapping", &other),
            }
        }
    };

    let name = match fields.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
        Some(Value::String(_)) | None => {
            return TestEntry::Invalid {
                name: fallback_name,
                error: SpecError::MissingField {
                    field: "name".to_string(),
                },
            }
        }
        Some(other) => {
            return TestEntry::Invalid {
                name: fallback_name,
                error: unexpected("name", "a string", other),
            }
        }
    };

    match parse_case(name.clone(), &fields).and_then(|case| check_constants(case, constants)) {
        Ok(case) => TestEntry::Ready(case),
        Err(error) => TestEntry::Invalid { name, error },
    }
}

fn parse_case(name: String, fields: &Map<String, Value>) -> Result<TestCase, SpecError> {
    let description = optional_string(fields, "description")?;
    let log = optional_string(fields, "log")?
        .map(|level| LogLevel::parse_lenient(&level))
        .unwrap_or_default();

    let request = match fields.get("request") {
        Some(Value::Object(request)) => parse_request(request)?,
        Some(other) => return Err(unexpected("request", "a mapping", other)),
        None => return Err(missing("request")),
    };

    let expected = match fields.get("expected") {
        Some(Value::Object(expected)) => parse_expected(expected)?,
        Some(other) => return Err(unexpected("expected", "a mapping", other)),
        None => return Err(missing("expected")),
    };

    Ok(TestCase {
        name,
        description,
        log,
        request,
        expected,
    })
}

/// Rejects placeholders that name no declared constant.
fn check_constants(case: TestCase, constants: &Constants) -> Result<TestCase, SpecError> {
    if let Some(unknown) = case
        .constant_names()
        .into_iter()
        .find(|name| !constants.contains_key(*name))
    {
        return Err(SpecError::UnknownConstant {
            name: unknown.to_string(),
        });
    }
    Ok(case)
}

// ============================================================================
// REQUEST
// ============================================================================

fn parse_request(fields: &Map<String, Value>) -> Result<RequestSpec, SpecError> {
    let method = optional_string(fields, "request.method")?
        .map(|raw| raw.parse::<Method>())
        .transpose()?;

    let endpoint = match fields.get("endpoint") {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => Some(Template::parse(raw)),
        Some(other) => {
            return Err(SpecError::malformed(
                "request.endpoint",
                format!("expected a string, found {}", describe(other)),
            ))
        }
    };

    Ok(RequestSpec {
        method,
        endpoint,
        params: parse_pairs(fields, "params")?,
        headers: parse_pairs(fields, "headers")?,
        body: match fields.get("body") {
            None | Some(Value::Null) => None,
            Some(body) => Some(value_ref(body, "request.body")?),
        },
    })
}

fn parse_pairs(
    fields: &Map<String, Value>,
    section: &str,
) -> Result<Vec<(String, ValueRef)>, SpecError> {
    let field = format!("request.{section}");
    match fields.get(section) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(pairs)) => pairs
            .iter()
            .map(|(key, value)| {
                let value = value_ref(value, &format!("{field}.{key}"))?;
                Ok::<_, SpecError>((key.clone(), value))
            })
            .collect(),
        Some(other) => Err(SpecError::malformed(
            field,
            format!("expected a mapping, found {}", describe(other)),
        )),
    }
}

// ============================================================================
// EXPECTATIONS
// ============================================================================

fn parse_expected(fields: &Map<String, Value>) -> Result<ExpectationSpec, SpecError> {
    let status = match fields.get("status") {
        None | Some(Value::Null) => None,
        Some(Value::Number(number)) => Some(
            number
                .as_u64()
                .and_then(|code| u16::try_from(code).ok())
                .ok_or_else(|| {
                    SpecError::malformed(
                        "expected.status",
                        format!("`{number}` is not a valid status code"),
                    )
                })?,
        ),
        Some(other) => {
            return Err(SpecError::malformed(
                "expected.status",
                format!("expected an integer, found {}", describe(other)),
            ))
        }
    };

    let response = match fields.get("response") {
        None | Some(Value::Null) => None,
        Some(Value::Object(response)) => Some(parse_response(response)?),
        Some(other) => {
            return Err(SpecError::malformed(
                "expected.response",
                format!("expected a mapping, found {}", describe(other)),
            ))
        }
    };

    Ok(ExpectationSpec { status, response })
}

fn parse_response(fields: &Map<String, Value>) -> Result<ResponseExpectation, SpecError> {
    let kind = match fields.get("type") {
        None | Some(Value::Null) => BodyKind::default(),
        Some(Value::String(raw)) => raw.parse()?,
        Some(other) => {
            return Err(SpecError::malformed(
                "expected.response.type",
                format!("expected a string, found {}", describe(other)),
            ))
        }
    };

    let rules = match fields.get("json") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(rules)) => rules.iter().map(parse_rule).collect::<Result<_, _>>()?,
        Some(other) => {
            return Err(SpecError::malformed(
                "expected.response.json",
                format!("expected a list of rules, found {}", describe(other)),
            ))
        }
    };

    Ok(ResponseExpectation { kind, rules })
}

fn parse_rule(raw: &Value) -> Result<FieldRule, SpecError> {
    let Value::Object(fields) = raw else {
        return Err(SpecError::malformed(
            "expected.response.json",
            format!("each rule must be a mapping, found {}", describe(raw)),
        ));
    };

    let key_text = match fields.get("key") {
        Some(Value::String(key)) => key.as_str(),
        Some(other) => {
            return Err(SpecError::malformed(
                "expected.response.json.key",
                format!("expected a string, found {}", describe(other)),
            ))
        }
        None => return Err(missing("expected.response.json.key")),
    };
    let key = JsonPath::parse(key_text).map_err(|err| SpecError::InvalidPath {
        path: key_text.to_string(),
        message: err.to_string(),
    })?;

    let mut validators = Vec::new();
    for (name, operand) in fields.iter().filter(|(name, _)| name.as_str() != "key") {
        let kind = ValidatorKind::from_name(name).ok_or_else(|| SpecError::UnknownValidator {
            key: key_text.to_string(),
            name: name.clone(),
        })?;
        let operand = value_ref(operand, &format!("expected.response.json.{name}"))?;
        if let Some(literal) = operand.as_literal() {
            kind.check_operand(literal)
                .map_err(|message| SpecError::InvalidOperand {
                    key: key_text.to_string(),
                    validator: name.clone(),
                    message,
                })?;
        }
        validators.push(Validator { kind, operand });
    }

    Ok(FieldRule { key, validators })
}

// ============================================================================
// VALUE REFERENCES
// ============================================================================

/// Classifies a raw tree node. Structures without any reference collapse back
/// into a single literal so they are cloned, not rebuilt, at execution time.
pub fn value_ref(raw: &Value, field: &str) -> Result<ValueRef, SpecError> {
    match raw {
        Value::String(text) => {
            let template = Template::parse(text);
            Ok(match template.sole_placeholder() {
                Some(name) => ValueRef::Constant(name.to_string()),
                None if template.is_literal() => ValueRef::Literal(raw.clone()),
                None => ValueRef::Template(template),
            })
        }
        Value::Object(fields) if fields.len() == 1 && fields.contains_key("response_from") => {
            response_ref(&fields["response_from"], field).map(ValueRef::Response)
        }
        Value::Object(fields) => {
            let entries = fields
                .iter()
                .map(|(key, value)| Ok::<_, SpecError>((key.clone(), value_ref(value, field)?)))
                .collect::<Result<Vec<_>, SpecError>>()?;
            if entries.iter().all(|(_, value)| value.as_literal().is_some()) {
                Ok(ValueRef::Literal(raw.clone()))
            } else {
                Ok(ValueRef::Map(entries))
            }
        }
        Value::Array(items) => {
            let items = items
                .iter()
                .map(|item| value_ref(item, field))
                .collect::<Result<Vec<_>, SpecError>>()?;
            if items.iter().all(|item| item.as_literal().is_some()) {
                Ok(ValueRef::Literal(raw.clone()))
            } else {
                Ok(ValueRef::List(items))
            }
        }
        _ => Ok(ValueRef::Literal(raw.clone())),
    }
}

/// Accepts `{name, key}` and the longer `{name, response: {json: [{key}]}}` form.
/// A missing key addresses the whole body.
fn response_ref(raw: &Value, field: &str) -> Result<ResponseRef, SpecError> {
    let malformed = |message: &str| SpecError::malformed(format!("{field}.response_from"), message);

    let Value::Object(fields) = raw else {
        return Err(malformed("expected a mapping with `name`"));
    };
    let test = match fields.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
        _ => return Err(malformed("`name` must name a test")),
    };

    let nested_key = fields
        .get("response")
        .and_then(|response| response.get("json"))
        .and_then(|rules| rules.get(0))
        .and_then(|rule| rule.get("key"));
    let key = match fields.get("key").or(nested_key) {
        None => "",
        Some(Value::String(key)) => key.as_str(),
        Some(_) => return Err(malformed("`key` must be a string")),
    };

    let path = JsonPath::parse(key).map_err(|err| SpecError::InvalidPath {
        path: key.to_string(),
        message: err.to_string(),
    })?;
    Ok(ResponseRef { test, path })
}

// ============================================================================
// HELPERS
// ============================================================================

fn unexpected(field: &str, wanted: &str, found: &Value) -> SpecError {
    SpecError::malformed(field, format!("expected {wanted}, found {}", describe(found)))
}

fn optional_string(fields: &Map<String, Value>, field: &str) -> Result<Option<String>, SpecError> {
    let key = field.rsplit('.').next().unwrap_or(field);
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(other) => Err(SpecError::malformed(
            field,
            format!("expected a string, found {}", describe(other)),
        )),
    }
}

fn missing(field: &str) -> SpecError {
    SpecError::MissingField {
        field: field.to_string(),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
