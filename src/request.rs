//! Builds a concrete HTTP request from a declarative [`RequestSpec`].

use reqwest::Url;
use serde_json::Value;

use crate::errors::{RunError, SpecError};
use crate::resolve::{render, resolve, resolve_text};
use crate::runner::RunContext;
use crate::suite::{Method, RequestSpec};
use crate::validation::display_value;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A fully resolved request, ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcreteRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl ConcreteRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Resolves every part of `spec` against `ctx`.
///
/// Params are appended to the URL query for every method. A list value repeats
/// its key once per element. The body is always sent as JSON.
pub fn build(spec: &RequestSpec, ctx: &RunContext) -> Result<ConcreteRequest, RunError> {
    let method = spec
        .method
        .ok_or_else(|| SpecError::invalid_request("`method` is required"))?;
    let endpoint = spec
        .endpoint
        .as_ref()
        .ok_or_else(|| SpecError::invalid_request("`endpoint` is required"))?;

    let endpoint = render(endpoint, ctx)?;
    let mut url = Url::parse(&endpoint).map_err(|err| {
        SpecError::invalid_request(format!("endpoint `{endpoint}` is not an absolute URL: {err}"))
    })?;
    if url.cannot_be_a_base() {
        let message = format!("endpoint `{endpoint}` is not an absolute URL");
        return Err(SpecError::invalid_request(message).into());
    }

    if !spec.params.is_empty() {
        let mut pairs = Vec::new();
        for (key, value) in &spec.params {
            match resolve(value, ctx)? {
                Value::Array(items) => {
                    pairs.extend(items.iter().map(|item| (key.clone(), query_text(item))))
                }
                other => pairs.push((key.clone(), query_text(&other))),
            }
        }
        url.query_pairs_mut().extend_pairs(pairs);
    }

    let mut headers = spec
        .headers
        .iter()
        .map(|(key, value)| Ok::<_, RunError>((key.clone(), resolve_text(value, ctx)?)))
        .collect::<Result<Vec<_>, RunError>>()?;

    let body = match &spec.body {
        Some(body) => {
            let body = resolve(body, ctx)?;
            let has_content_type = headers
                .iter()
                .any(|(key, _)| key.eq_ignore_ascii_case("content-type"));
            if !has_content_type {
                headers.push(("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string()));
            }
            Some(body.to_string())
        }
        None => None,
    };

    Ok(ConcreteRequest {
        method,
        url: url.into(),
        headers,
        body,
    })
}

fn query_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => display_value(other),
    }
}
