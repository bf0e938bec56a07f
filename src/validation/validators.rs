//! The closed set of field validators.
//!
//! Each kind has a YAML name in [`REGISTRY`], a load-time operand check, and one
//! evaluation function reached through the single match in [`ValidatorKind::apply`].
//! Evaluation returns `Err(explanation)` on mismatch; the engine adds the key.

use std::fmt;

use chrono::format::{parse, ParseError, ParseErrorKind, Parsed, StrftimeItems};
use regex::Regex;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidatorKind {
    Type,
    Equal,
    NotEqual,
    Contains,
    NotContains,
    Regex,
    DateFormat,
    Range,
    Empty,
    NotEmpty,
    Length,
}

/// YAML name of every validator, in documentation order.
pub const REGISTRY: &[(&str, ValidatorKind)] = &[
    ("type", ValidatorKind::Type),
    ("equal", ValidatorKind::Equal),
    ("not_equal", ValidatorKind::NotEqual),
    ("contains", ValidatorKind::Contains),
    ("not_contains", ValidatorKind::NotContains),
    ("regex", ValidatorKind::Regex),
    ("date_format", ValidatorKind::DateFormat),
    ("range", ValidatorKind::Range),
    ("empty", ValidatorKind::Empty),
    ("not_empty", ValidatorKind::NotEmpty),
    ("length", ValidatorKind::Length),
];

/// Type names accepted by the `type` validator.
pub const TYPE_NAMES: &[&str] = &["list", "dict", "str", "int", "float", "bool", "null"];

impl ValidatorKind {
    pub fn from_name(name: &str) -> Option<Self> {
        REGISTRY
            .iter()
            .find(|(registered, _)| *registered == name)
            .map(|(_, kind)| *kind)
    }

    pub fn name(&self) -> &'static str {
        REGISTRY
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    /// Validates an operand's shape. Runs at load time for literal operands and
    /// again at execution time for resolved ones.
    pub fn check_operand(&self, operand: &Value) -> Result<(), String> {
        match self {
            ValidatorKind::Type => match operand.as_str() {
                Some(name) if TYPE_NAMES.contains(&name) => Ok(()),
                Some(name) => Err(format!(
                    "unknown type `{name}` (expected one of {})",
                    TYPE_NAMES.join(", ")
                )),
                None => Err("type name must be a string".to_string()),
            },
            ValidatorKind::Regex => match operand.as_str() {
                Some(pattern) => Regex::new(pattern)
                    .map(|_| ())
                    .map_err(|err| format!("invalid pattern: {err}")),
                None => Err("pattern must be a string".to_string()),
            },
            ValidatorKind::DateFormat => match operand.as_str() {
                Some(format) if StrftimeItems::new(format).any(is_format_error) => {
                    Err(format!("invalid date format `{format}`"))
                }
                Some(_) => Ok(()),
                None => Err("date format must be a string".to_string()),
            },
            ValidatorKind::Range => RangeBounds::from_operand(operand).map(|_| ()),
            ValidatorKind::Empty | ValidatorKind::NotEmpty => match operand {
                Value::Bool(_) | Value::Null => Ok(()),
                _ => Err("expected `true` or `false`".to_string()),
            },
            ValidatorKind::Length => match operand.as_u64() {
                Some(_) => Ok(()),
                None => Err("length must be a non-negative integer".to_string()),
            },
            ValidatorKind::Equal
            | ValidatorKind::NotEqual
            | ValidatorKind::Contains
            | ValidatorKind::NotContains => Ok(()),
        }
    }

    /// Applies this validator to `actual` with an already resolved operand.
    pub fn apply(&self, actual: &Value, expected: &Value) -> Result<(), String> {
        self.check_operand(expected)?;
        match self {
            ValidatorKind::Type => check_type(actual, expected),
            ValidatorKind::Equal => check_equal(actual, expected, true),
            ValidatorKind::NotEqual => check_equal(actual, expected, false),
            ValidatorKind::Contains => check_membership(actual, expected, true),
            ValidatorKind::NotContains => check_membership(actual, expected, false),
            ValidatorKind::Regex => check_regex(actual, expected),
            ValidatorKind::DateFormat => check_date_format(actual, expected),
            ValidatorKind::Range => check_range(actual, expected),
            ValidatorKind::Empty => check_empty(actual, expected, true),
            ValidatorKind::NotEmpty => check_empty(actual, expected, false),
            ValidatorKind::Length => check_length(actual, expected),
        }
    }
}

impl fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// JSON HELPERS
// ============================================================================

/// Type name of a JSON value, using the names the `type` validator accepts.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(number) if number.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Structural equality where `1` and `1.0` compare equal.
pub fn json_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => match (a.as_u64(), b.as_u64()) {
                (Some(a), Some(b)) => a == b,
                _ => a.as_f64() == b.as_f64(),
            },
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| json_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| json_eq(x, y)))
        }
        _ => left == right,
    }
}

/// Renders a value for messages: strings bare, everything else as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn is_format_error(item: chrono::format::Item<'_>) -> bool {
    matches!(item, chrono::format::Item::Error)
}

// ============================================================================
// EVALUATION FUNCTIONS
// ============================================================================

fn check_type(actual: &Value, expected: &Value) -> Result<(), String> {
    let wanted = expected.as_str().unwrap_or_default();
    let found = type_name(actual);
    if found == wanted {
        Ok(())
    } else {
        Err(format!("expected type {wanted}, got {found}"))
    }
}

fn check_equal(actual: &Value, expected: &Value, should_match: bool) -> Result<(), String> {
    if json_eq(actual, expected) == should_match {
        return Ok(());
    }
    if should_match {
        Err(format!("expected {expected}, got {actual}"))
    } else {
        Err(format!("expected a value other than {expected}, got {actual}"))
    }
}

fn check_membership(actual: &Value, expected: &Value, should_contain: bool) -> Result<(), String> {
    let contained = match actual {
        Value::String(haystack) => haystack.contains(&display_value(expected)),
        Value::Array(items) => items.iter().any(|item| json_eq(item, expected)),
        Value::Object(map) => match expected {
            Value::String(key) => map.contains_key(key),
            _ => false,
        },
        other => {
            return Err(format!(
                "cannot test membership in {} {other} (expected str, list or dict)",
                type_name(other)
            ))
        }
    };
    if contained == should_contain {
        return Ok(());
    }
    let action = if should_contain { "contain" } else { "not contain" };
    Err(format!(
        "{} should {action} {expected}, got {actual}",
        type_name(actual)
    ))
}

fn check_regex(actual: &Value, expected: &Value) -> Result<(), String> {
    let pattern = expected.as_str().unwrap_or_default();
    let regex = Regex::new(pattern).map_err(|err| format!("invalid pattern: {err}"))?;
    let subject = display_value(actual);
    if regex.is_match(&subject) {
        Ok(())
    } else {
        Err(format!("{actual} does not match /{pattern}/"))
    }
}

fn check_date_format(actual: &Value, expected: &Value) -> Result<(), String> {
    let format = expected.as_str().unwrap_or_default();
    let Value::String(text) = actual else {
        return Err(format!("expected a date string, got {}", type_name(actual)));
    };
    let mismatch =
        |err: ParseError| format!("\"{text}\" does not match date format `{format}` ({err})");
    let mut parsed = Parsed::default();
    parse(&mut parsed, text, StrftimeItems::new(format)).map_err(mismatch)?;
    calendar_date(&parsed).map_err(mismatch)
}

/// Fields that parsed individually must still name a real calendar day.
/// A format without a year is checked against 1900.
fn calendar_date(parsed: &Parsed) -> Result<(), ParseError> {
    match parsed.to_naive_date() {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == ParseErrorKind::NotEnough => {
            let mut defaulted = parsed.clone();
            if defaulted.set_year(1900).is_err() {
                return Ok(());
            }
            match defaulted.to_naive_date() {
                Err(err) if err.kind() != ParseErrorKind::NotEnough => Err(err),
                _ => Ok(()),
            }
        }
        Err(err) => Err(err),
    }
}

fn check_range(actual: &Value, expected: &Value) -> Result<(), String> {
    let bounds = RangeBounds::from_operand(expected)?;
    let Some(number) = actual.as_f64() else {
        return Err(format!("expected a number, got {}", type_name(actual)));
    };
    let above_min = bounds.min.map_or(true, |min| number >= min);
    let below_max = bounds.max.map_or(true, |max| number <= max);
    if above_min && below_max {
        Ok(())
    } else {
        Err(format!("{actual} is outside {bounds}"))
    }
}

fn check_empty(actual: &Value, expected: &Value, should_be_empty: bool) -> Result<(), String> {
    // `empty: false` reads as "must not be empty", and vice versa.
    let should_be_empty = match expected {
        Value::Bool(false) => !should_be_empty,
        _ => should_be_empty,
    };
    let is_empty = match actual {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    };
    if is_empty == should_be_empty {
        return Ok(());
    }
    let state = if should_be_empty { "empty" } else { "not empty" };
    Err(format!("expected {state}, got {actual}"))
}

fn check_length(actual: &Value, expected: &Value) -> Result<(), String> {
    let wanted = expected.as_u64().unwrap_or_default();
    let found = match actual {
        Value::String(text) => text.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => {
            return Err(format!(
                "cannot take the length of {} (expected str, list or dict)",
                type_name(other)
            ))
        }
    };
    if found as u64 == wanted {
        Ok(())
    } else {
        Err(format!("expected length {wanted}, got {found}"))
    }
}

// ============================================================================
// RANGE OPERAND
// ============================================================================

/// `range: {min, max}` or the positional `range: [min, max]`; either bound may be omitted or null.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RangeBounds {
    min: Option<f64>,
    max: Option<f64>,
}

impl RangeBounds {
    fn from_operand(operand: &Value) -> Result<Self, String> {
        let bound = |value: Option<&Value>, name: &str| -> Result<Option<f64>, String> {
            match value {
                None | Some(Value::Null) => Ok(None),
                Some(Value::Number(number)) => Ok(number.as_f64()),
                Some(other) => Err(format!("range `{name}` must be a number, got {other}")),
            }
        };
        let bounds = match operand {
            Value::Object(map) => {
                if let Some(extra) = map.keys().find(|key| *key != "min" && *key != "max") {
                    return Err(format!("unexpected range field `{extra}`"));
                }
                RangeBounds {
                    min: bound(map.get("min"), "min")?,
                    max: bound(map.get("max"), "max")?,
                }
            }
            Value::Array(items) if items.len() == 2 => RangeBounds {
                min: bound(items.first(), "min")?,
                max: bound(items.get(1), "max")?,
            },
            _ => return Err("range must be {min, max} or [min, max]".to_string()),
        };
        if bounds.min.is_none() && bounds.max.is_none() {
            return Err("range needs at least one of `min` or `max`".to_string());
        }
        Ok(bounds)
    }
}

impl fmt::Display for RangeBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |bound: Option<f64>| bound.map_or_else(|| "..".to_string(), |b| b.to_string());
        write!(f, "[{}, {}]", show(self.min), show(self.max))
    }
}
