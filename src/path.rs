//! Dotted/bracketed paths into a JSON response body, e.g. `cards[0].name`.
//!
//! Grammar:
//! ```text
//! path    := "" | segment ("." segment)*
//! segment := identifier ("[" integer "]")*
//! ```
//! The first segment may omit its identifier (`[0].name`) to index into a body
//! whose root is a list.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// One navigation step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    Field(String),
    Index(usize),
}

/// Why a path could not be parsed or followed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("malformed path `{path}`: {message}")]
    Syntax { path: String, message: String },

    #[error("`{at}` not found: {reason}")]
    NotFound { at: String, reason: String },
}

/// A parsed path, ready to be evaluated against any number of trees.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JsonPath {
    raw: String,
    steps: Vec<Step>,
}

impl JsonPath {
    /// Parses `raw` into navigation steps.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use apicheck::path::{JsonPath, Step};
    /// let path = JsonPath::parse("cards[0].name").unwrap();
    /// assert_eq!(
    ///     path.steps(),
    ///     &[Step::Field("cards".into()), Step::Index(0), Step::Field("name".into())]
    /// );
    /// assert!(JsonPath::parse("").unwrap().is_root());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let trimmed = raw.trim();
        let mut steps = Vec::new();
        if trimmed.is_empty() {
            return Ok(Self {
                raw: String::new(),
                steps,
            });
        }

        let syntax = |message: &str| PathError::Syntax {
            path: trimmed.to_string(),
            message: message.to_string(),
        };

        for (position, segment) in trimmed.split('.').enumerate() {
            let (name, mut rest) = match segment.find('[') {
                Some(open) => segment.split_at(open),
                None => (segment, ""),
            };
            if name.is_empty() && (position > 0 || rest.is_empty()) {
                return Err(syntax("empty segment"));
            }
            if name.contains(']') {
                return Err(syntax("unexpected `]`"));
            }
            if !name.is_empty() {
                steps.push(Step::Field(name.to_string()));
            }

            while !rest.is_empty() {
                let Some(inner) = rest.strip_prefix('[') else {
                    return Err(syntax("expected `[` after index"));
                };
                let Some(close) = inner.find(']') else {
                    return Err(syntax("unclosed `[`"));
                };
                let index = inner[..close]
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| syntax("index must be a non-negative integer"))?;
                steps.push(Step::Index(index));
                rest = &inner[close + 1..];
            }
        }

        Ok(Self {
            raw: trimmed.to_string(),
            steps,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// True for the empty path, which denotes the whole body.
    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    /// Walks `root` left to right and returns the addressed node.
    pub fn evaluate<'v>(&self, root: &'v Value) -> Result<&'v Value, PathError> {
        let mut current = root;
        let mut walked = String::new();

        for step in &self.steps {
            match step {
                Step::Field(name) => {
                    if !walked.is_empty() {
                        walked.push('.');
                    }
                    walked.push_str(name);
                    current = match current {
                        Value::Object(map) => map.get(name).ok_or_else(|| PathError::NotFound {
                            at: walked.clone(),
                            reason: "no such field".to_string(),
                        })?,
                        other => {
                            return Err(PathError::NotFound {
                                at: walked,
                                reason: format!("cannot read a field of {}", kind_of(other)),
                            })
                        }
                    };
                }
                Step::Index(index) => {
                    walked.push_str(&format!("[{index}]"));
                    current = match current {
                        Value::Array(items) => {
                            items.get(*index).ok_or_else(|| PathError::NotFound {
                                at: walked.clone(),
                                reason: format!("index out of range (length {})", items.len()),
                            })?
                        }
                        other => {
                            return Err(PathError::NotFound {
                                at: walked,
                                reason: format!("cannot index into {}", kind_of(other)),
                            })
                        }
                    };
                }
            }
        }

        Ok(current)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.raw)
        }
    }
}

/// Parses and evaluates in one go.
pub fn evaluate(root: &Value, path: &str) -> Result<Value, PathError> {
    JsonPath::parse(path)?.evaluate(root).cloned()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
