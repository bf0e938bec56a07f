//! # Shared fixtures for apicheck integration tests
//!
//! A scripted in-memory transport, so suites run without a network.

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use apicheck::errors::TransportError;
use apicheck::request::ConcreteRequest;
use apicheck::runner::{ExecutionRecord, Orchestrator, TestStatus};
use apicheck::suite::{parse_str, Method};
use apicheck::transport::{HttpResponse, Transport};

type Reply = Result<HttpResponse, TransportError>;

struct Route {
    method: Method,
    url: String,
    reply: Reply,
}

/// Answers requests from a fixed route table and records every call.
///
/// Routes match on method plus the exact URL, query string included. An
/// unmatched request gets a 404 with an empty JSON object.
#[derive(Default)]
pub struct StubTransport {
    routes: Vec<Route>,
    calls: Mutex<Vec<ConcreteRequest>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(mut self, method: Method, url: &str, status: u16, body: serde_json::Value) -> Self {
        self.routes.push(Route {
            method,
            url: url.to_string(),
            reply: Ok(HttpResponse {
                status,
                headers: vec![("content-type".to_string(), "application/json".to_string())],
                body: body.to_string(),
            }),
        });
        self
    }

    pub fn text(mut self, method: Method, url: &str, status: u16, body: &str) -> Self {
        self.routes.push(Route {
            method,
            url: url.to_string(),
            reply: Ok(HttpResponse {
                status,
                headers: vec![("content-type".to_string(), "text/plain".to_string())],
                body: body.to_string(),
            }),
        });
        self
    }

    pub fn fail(mut self, method: Method, url: &str, error: TransportError) -> Self {
        self.routes.push(Route {
            method,
            url: url.to_string(),
            reply: Err(error),
        });
        self
    }

    pub fn calls(&self) -> Vec<ConcreteRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Transport for StubTransport {
    fn send(&self, request: &ConcreteRequest, _timeout: Option<Duration>) -> Reply {
        self.calls.lock().unwrap().push(request.clone());
        self.routes
            .iter()
            .find(|route| route.method == request.method && route.url == request.url)
            .map(|route| route.reply.clone())
            .unwrap_or_else(|| {
                Ok(HttpResponse {
                    status: 404,
                    headers: Vec::new(),
                    body: "{}".to_string(),
                })
            })
    }
}

/// Parses `yaml` and runs it against `transport`.
pub fn run_yaml(transport: &StubTransport, yaml: &str) -> Vec<ExecutionRecord> {
    let suite = parse_str(yaml).expect("suite should load");
    Orchestrator::new(transport).run(&suite)
}

/// `(name, status)` pairs in report order.
pub fn statuses(records: &[ExecutionRecord]) -> Vec<(&str, TestStatus)> {
    records
        .iter()
        .map(|record| (record.name(), record.status()))
        .collect()
}

pub fn record<'r>(records: &'r [ExecutionRecord], name: &str) -> &'r ExecutionRecord {
    records
        .iter()
        .find(|record| record.name() == name)
        .unwrap_or_else(|| panic!("no record named {name}"))
}
