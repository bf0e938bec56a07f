//! The HTTP collaborator the orchestrator sends requests through.
//!
//! [`Transport`] is the seam tests replace with a stub; [`HttpTransport`] is the
//! real implementation over a blocking `reqwest` client.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::errors::TransportError;
use crate::request::ConcreteRequest;
use crate::suite::Method;

/// A response as the transport returns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

pub trait Transport: Send + Sync {
    /// Sends one request. `timeout` bounds the whole exchange when given.
    fn send(
        &self,
        request: &ConcreteRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportError>;
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
            Method::Connect => reqwest::Method::CONNECT,
            Method::Trace => reqwest::Method::TRACE,
        }
    }
}

/// Sends requests over the network with one shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|err| {
                TransportError::InvalidRequest(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        request: &ConcreteRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportError> {
        let headers = build_headers(&request.headers)?;
        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().map_err(classify)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(key, value)| {
                (
                    key.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let bytes = response.bytes().map_err(classify)?;

        Ok(HttpResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

/// Converts header pairs, skipping empty names. A repeated name keeps every value.
pub fn build_headers(input: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();

    for (key, value) in input {
        if key.is_empty() {
            continue;
        }

        let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|err| {
            TransportError::InvalidRequest(format!("invalid header name `{key}`: {err}"))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|err| {
            TransportError::InvalidRequest(format!("invalid header value for `{key}`: {err}"))
        })?;
        headers.append(header_name, header_value);
    }

    Ok(headers)
}

fn classify(err: reqwest::Error) -> TransportError {
    let message = err.to_string();
    if err.is_timeout() {
        TransportError::Timeout(message)
    } else if err.is_builder() {
        TransportError::InvalidRequest(message)
    } else if err.is_decode() || err.is_body() {
        TransportError::Decode(message)
    } else {
        TransportError::Connection(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_keep_repeats_and_skip_blank_names() {
        let input = vec![
            ("Accept".to_string(), "application/json".to_string()),
            (String::new(), "ignored".to_string()),
            ("X-Tag".to_string(), "a".to_string()),
            ("X-Tag".to_string(), "b".to_string()),
        ];
        let headers = build_headers(&input).unwrap();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get_all("x-tag").iter().count(), 2);
    }

    #[test]
    fn invalid_header_is_an_invalid_request() {
        let input = vec![("Bad Name".to_string(), "x".to_string())];
        assert!(matches!(
            build_headers(&input),
            Err(TransportError::InvalidRequest(_))
        ));
    }

    #[test]
    fn refused_connection_is_a_connection_error() {
        let transport = HttpTransport::new().unwrap();
        let request = ConcreteRequest {
            method: Method::Get,
            url: "http://127.0.0.1:1/".to_string(),
            headers: Vec::new(),
            body: None,
        };
        let result = transport.send(&request, Some(Duration::from_secs(5)));
        assert!(matches!(result, Err(TransportError::Connection(_))));
    }
}
