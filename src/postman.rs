//! Converts Postman collections (v2.x) into apicheck suites.
//!
//! Collection variables become constants and nested folders flatten into
//! `Parent > Child` test names. Only requests with at least one saved example
//! response are converted: the example provides the expected status and a
//! starter rule on the first key of its JSON body.

use std::fs;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::validation::type_name;

#[derive(Debug, Error, Diagnostic)]
pub enum PostmanError {
    #[error("failed to read collection '{path}'")]
    #[diagnostic(code(apicheck::postman::io))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}' is not a valid Postman collection")]
    #[diagnostic(
        code(apicheck::postman::json),
        help("export the collection from Postman as Collection v2.1")
    )]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize the converted suite")]
    #[diagnostic(code(apicheck::postman::yaml))]
    Serialize(#[source] serde_yaml::Error),

    #[error("failed to write '{path}'")]
    #[diagnostic(code(apicheck::postman::write))]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// COLLECTION FORMAT
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub item: Vec<Item>,
    #[serde(default)]
    pub variable: Vec<KeyValue>,
}

/// A folder (has `item`) or a request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub item: Option<Vec<Item>>,
    #[serde(default)]
    pub request: Option<Request>,
    #[serde(default)]
    pub response: Vec<SavedResponse>,
    #[serde(default)]
    pub description: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub url: Option<Url>,
    #[serde(default)]
    pub header: Vec<KeyValue>,
    #[serde(default)]
    pub body: Option<Body>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Url {
    Raw(String),
    Detailed {
        #[serde(default)]
        raw: String,
        #[serde(default)]
        query: Vec<KeyValue>,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Body {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub raw: Option<String>,
    #[serde(default)]
    pub urlencoded: Vec<KeyValue>,
    #[serde(default)]
    pub formdata: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyValue {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub disabled: bool,
}

impl KeyValue {
    fn text(&self) -> String {
        match &self.value {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SavedResponse {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub body: Option<String>,
}

// ============================================================================
// CONVERSION
// ============================================================================

/// The converted suite plus the names of requests that were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub suite: Value,
    pub skipped: Vec<String>,
}

impl Conversion {
    pub fn converted(&self) -> usize {
        self.suite["tests"].as_array().map_or(0, Vec::len)
    }

    pub fn to_yaml(&self) -> Result<String, PostmanError> {
        serde_yaml::to_string(&self.suite).map_err(PostmanError::Serialize)
    }
}

/// Reads `input`, converts it and writes the suite to `output`.
pub fn convert_file(input: &Path, output: &Path) -> Result<Conversion, PostmanError> {
    let source = fs::read_to_string(input).map_err(|source| PostmanError::Read {
        path: input.to_path_buf(),
        source,
    })?;
    let collection: Collection =
        serde_json::from_str(&source).map_err(|source| PostmanError::Parse {
            path: input.to_path_buf(),
            source,
        })?;

    let conversion = convert(&collection);
    fs::write(output, conversion.to_yaml()?).map_err(|source| PostmanError::Write {
        path: output.to_path_buf(),
        source,
    })?;
    info!(
        converted = conversion.converted(),
        skipped = conversion.skipped.len(),
        output = %output.display(),
        "conversion complete"
    );
    Ok(conversion)
}

pub fn convert(collection: &Collection) -> Conversion {
    let constants: Map<String, Value> = collection
        .variable
        .iter()
        .filter(|variable| !variable.key.is_empty())
        .map(|variable| (variable.key.clone(), Value::String(variable.text())))
        .collect();

    let mut tests = Vec::new();
    let mut skipped = Vec::new();
    collect_items(&collection.item, "", &mut tests, &mut skipped);

    Conversion {
        suite: json!({ "constants": constants, "tests": tests }),
        skipped,
    }
}

fn collect_items(items: &[Item], parent: &str, tests: &mut Vec<Value>, skipped: &mut Vec<String>) {
    for item in items {
        let name = if parent.is_empty() {
            item.name.clone()
        } else {
            format!("{parent} > {}", item.name)
        };
        match &item.item {
            Some(children) => collect_items(children, &name, tests, skipped),
            None => match convert_request(item, &name) {
                Some(test) => tests.push(test),
                None => {
                    debug!(request = %name, "skipping request without a saved response");
                    skipped.push(name);
                }
            },
        }
    }
}

fn convert_request(item: &Item, name: &str) -> Option<Value> {
    let example = item.response.first()?;
    let request = item.request.clone().unwrap_or_default();

    let (endpoint, mut params) = match &request.url {
        None => (String::new(), Map::new()),
        Some(Url::Raw(raw)) => split_query(raw),
        Some(Url::Detailed { raw, query }) => {
            let (endpoint, mut params) = split_query(raw);
            for param in query.iter().filter(|param| !param.disabled && !param.key.is_empty()) {
                params.insert(param.key.clone(), Value::String(param.text()));
            }
            (endpoint, params)
        }
    };

    let headers: Map<String, Value> = request
        .header
        .iter()
        .filter(|header| !header.disabled && !header.key.is_empty())
        .map(|header| (header.key.clone(), Value::String(header.text())))
        .collect();

    let description = match &item.description {
        Some(Value::String(text)) if !text.is_empty() => text.clone(),
        _ => format!("Verify that the {name} endpoint works as expected."),
    };

    let mut request_out = Map::new();
    request_out.insert(
        "method".into(),
        Value::String(request.method.as_deref().unwrap_or("GET").to_ascii_uppercase()),
    );
    request_out.insert("endpoint".into(), Value::String(endpoint));
    if !params.is_empty() {
        request_out.insert("params".into(), Value::Object(params));
    }
    if !headers.is_empty() {
        request_out.insert("headers".into(), Value::Object(headers));
    }
    if let Some(body) = request.body.as_ref().and_then(convert_body) {
        request_out.insert("body".into(), body);
    }

    let mut response = Map::new();
    response.insert("type".into(), json!("json"));
    if let Some(rule) = example.body.as_deref().and_then(first_key_rule) {
        response.insert("json".into(), json!([rule]));
    }

    Some(json!({
        "name": format!("Test {name}"),
        "description": description,
        "request": request_out,
        "expected": {
            "status": example.code.unwrap_or(200),
            "response": response,
        },
    }))
}

/// Splits a raw URL into the part before `?` and its decoded query parameters.
fn split_query(raw: &str) -> (String, Map<String, Value>) {
    let Some((endpoint, query)) = raw.split_once('?') else {
        return (raw.to_string(), Map::new());
    };
    let mut params = Map::new();
    // Parsed against a dummy base only to percent-decode the pairs.
    if let Ok(parsed) = reqwest::Url::parse(&format!("http://collection.invalid/?{query}")) {
        for (key, value) in parsed.query_pairs() {
            // The first occurrence of a repeated key wins.
            if !key.is_empty() && !params.contains_key(key.as_ref()) {
                params.insert(key.into_owned(), Value::String(value.into_owned()));
            }
        }
    }
    (endpoint.to_string(), params)
}

fn convert_body(body: &Body) -> Option<Value> {
    let pairs = |fields: &[KeyValue]| -> Value {
        Value::Object(
            fields
                .iter()
                .filter(|field| !field.disabled && !field.key.is_empty())
                .map(|field| (field.key.clone(), Value::String(field.text())))
                .collect(),
        )
    };
    let converted = match body.mode.as_deref() {
        Some("raw") => {
            let raw = body.raw.clone().unwrap_or_default();
            serde_json::from_str(&raw).unwrap_or(Value::String(raw))
        }
        Some("urlencoded") => pairs(&body.urlencoded),
        Some("formdata") => pairs(&body.formdata),
        _ => return None,
    };
    let is_empty = match &converted {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };
    (!is_empty).then_some(converted)
}

/// A `type` (and, for sized values, `length`) rule on the first key of a JSON object body.
fn first_key_rule(body: &str) -> Option<Value> {
    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) else {
        return None;
    };
    let (key, value) = fields.iter().next()?;
    let mut rule = Map::new();
    rule.insert("key".into(), Value::String(key.clone()));
    rule.insert("type".into(), Value::String(type_name(value).to_string()));
    let length = match value {
        Value::String(text) => Some(text.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    };
    if let Some(length) = length {
        rule.insert("length".into(), json!(length));
    }
    Some(Value::Object(rule))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::{parse_tree, Method, TestEntry};

    fn collection() -> Collection {
        serde_json::from_value(json!({
            "info": {"name": "Cards"},
            "variable": [{"key": "base_url", "value": "https://api.example.test"}],
            "item": [
                {
                    "name": "Cards",
                    "item": [
                        {
                            "name": "Search",
                            "request": {
                                "method": "get",
                                "url": {
                                    "raw": "{{base_url}}/cards?name=Black%20Lotus&page=1",
                                    "query": [{"key": "page", "value": "2"}]
                                },
                                "header": [
                                    {"key": "Accept", "value": "application/json"},
                                    {"key": "X-Debug", "value": "1", "disabled": true}
                                ]
                            },
                            "response": [{"code": 200, "body": "{\"cards\": [1, 2, 3], \"total\": 3}"}]
                        },
                        {
                            "name": "Draft",
                            "request": {"method": "POST", "url": "{{base_url}}/drafts"}
                        }
                    ]
                },
                {
                    "name": "Create deck",
                    "request": {
                        "method": "POST",
                        "url": "{{base_url}}/decks",
                        "body": {"mode": "raw", "raw": "{\"name\": \"vintage\"}"}
                    },
                    "response": [{"code": 201, "body": "created"}]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn converts_folders_requests_and_examples() {
        let conversion = convert(&collection());
        assert_eq!(conversion.converted(), 2);
        assert_eq!(conversion.skipped, vec!["Cards > Draft".to_string()]);

        let search = &conversion.suite["tests"][0];
        assert_eq!(search["name"], "Test Cards > Search");
        assert_eq!(search["request"]["method"], "GET");
        assert_eq!(search["request"]["endpoint"], "{{base_url}}/cards");
        assert_eq!(search["request"]["params"], json!({"name": "Black Lotus", "page": "2"}));
        assert_eq!(search["request"]["headers"], json!({"Accept": "application/json"}));
        assert_eq!(
            search["expected"]["response"]["json"],
            json!([{"key": "cards", "type": "list", "length": 3}])
        );

        let create = &conversion.suite["tests"][1];
        assert_eq!(create["request"]["body"], json!({"name": "vintage"}));
        assert_eq!(create["expected"]["status"], 201);
        assert!(create["expected"]["response"].get("json").is_none());
    }

    #[test]
    fn converted_suite_loads() {
        let conversion = convert(&collection());
        let yaml = conversion.to_yaml().unwrap();
        let tree: Value = serde_yaml::from_str(&yaml).unwrap();
        let suite = parse_tree(tree).unwrap();
        assert_eq!(suite.tests.len(), 2);
        let TestEntry::Ready(search) = &suite.tests[0] else {
            panic!("search should parse: {:?}", suite.tests[0]);
        };
        assert_eq!(search.request.method, Some(Method::Get));
    }
}
