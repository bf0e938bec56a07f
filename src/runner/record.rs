//! The durable outcome of running one test.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::errors::RunError;
use crate::transport::HttpResponse;
use crate::validation::Failure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Pending,
    Passed,
    Failed,
    Error,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pending => "PENDING",
            TestStatus::Passed => "PASSED",
            TestStatus::Failed => "FAILED",
            TestStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A response as captured for validation and for later `response_from` lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// The parsed body, when it is valid JSON.
    pub json: Option<Value>,
}

impl CapturedResponse {
    pub fn from_http(response: HttpResponse) -> Self {
        let json = serde_json::from_str(&response.body).ok();
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
            json,
        }
    }

    /// The tree that paths are evaluated against: the JSON body, or the raw text as a string.
    pub fn tree(&self) -> Value {
        self.json
            .clone()
            .unwrap_or_else(|| Value::String(self.body.clone()))
    }
}

/// One test's execution record. Starts `Pending`; once finalized it is only read.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    name: String,
    status: TestStatus,
    response: Option<CapturedResponse>,
    failures: Vec<Failure>,
    error: Option<RunError>,
    execution_time: Option<Duration>,
    response_time: Option<Duration>,
}

impl ExecutionRecord {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Pending,
            response: None,
            failures: Vec::new(),
            error: None,
            execution_time: None,
            response_time: None,
        }
    }

    /// A record that never reached the transport, or whose transport call failed.
    pub fn errored(name: impl Into<String>, error: impl Into<RunError>) -> Self {
        Self {
            status: TestStatus::Error,
            error: Some(error.into()),
            ..Self::pending(name)
        }
    }

    pub(crate) fn with_response(mut self, response: CapturedResponse, elapsed: Duration) -> Self {
        self.response = Some(response);
        self.response_time = Some(elapsed);
        self
    }

    pub(crate) fn with_response_time(mut self, elapsed: Duration) -> Self {
        self.response_time = Some(elapsed);
        self
    }

    pub(crate) fn with_execution_time(mut self, elapsed: Duration) -> Self {
        self.execution_time = Some(elapsed);
        self
    }

    /// Finalizes a pending record from its validation failures.
    pub(crate) fn finish(mut self, failures: Vec<Failure>) -> Self {
        self.status = if failures.is_empty() {
            TestStatus::Passed
        } else {
            TestStatus::Failed
        };
        self.failures = failures;
        self
    }

    /// Finalizes a pending record as an error, keeping any captured response.
    pub(crate) fn fail_with(mut self, error: impl Into<RunError>) -> Self {
        self.status = TestStatus::Error;
        self.error = Some(error.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> TestStatus {
        self.status
    }

    pub fn response(&self) -> Option<&CapturedResponse> {
        self.response.as_ref()
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn error(&self) -> Option<&RunError> {
        self.error.as_ref()
    }

    pub fn execution_time(&self) -> Option<Duration> {
        self.execution_time
    }

    pub fn response_time(&self) -> Option<Duration> {
        self.response_time
    }

    /// Human-readable reasons, in the order they were found.
    pub fn failure_reasons(&self) -> Vec<String> {
        self.error
            .iter()
            .map(ToString::to_string)
            .chain(self.failures.iter().map(ToString::to_string))
            .collect()
    }
}
