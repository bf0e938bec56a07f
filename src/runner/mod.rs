//! Test run orchestration.
//!
//! The [`Orchestrator`] plans a suite with [`ExecutionPlan`], runs each test in
//! dependency order and owns the [`RunContext`] records are published to. A test
//! is published only after it has fully completed, so later tests never observe
//! a half-finished record.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, warn};

use crate::errors::{LoadError, RunError, SpecError, TransportError};
use crate::request::{self, ConcreteRequest};
use crate::resolve::require_passed;
use crate::suite::{self, BodyKind, LogLevel, TestCase, TestSuite};
use crate::transport::Transport;
use crate::validation::{validate, Failure};

pub mod context;
pub mod graph;
pub mod record;

pub use context::RunContext;
pub use graph::ExecutionPlan;
pub use record::{CapturedResponse, ExecutionRecord, TestStatus};

/// The records of one suite file, or the reason the file could not be loaded.
#[derive(Debug)]
pub struct SuiteReport {
    pub path: PathBuf,
    pub outcome: Result<Vec<ExecutionRecord>, LoadError>,
}

impl SuiteReport {
    pub fn records(&self) -> &[ExecutionRecord] {
        self.outcome.as_deref().unwrap_or(&[])
    }
}

pub struct Orchestrator<'t> {
    transport: &'t dyn Transport,
    timeout: Option<Duration>,
    cancel: Arc<AtomicBool>,
}

impl<'t> Orchestrator<'t> {
    pub fn new(transport: &'t dyn Transport) -> Self {
        Self {
            transport,
            timeout: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Shares an externally owned cancel flag.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// The flag that, once raised, stops any test that has not started yet.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    // ========================================================================
    // SUITES
    // ========================================================================

    /// Runs `suite` in a fresh context. Records come back in declaration order.
    pub fn run(&self, suite: &TestSuite) -> Vec<ExecutionRecord> {
        let mut ctx = RunContext::new(Arc::clone(&suite.constants));
        self.run_in(suite, &mut ctx)
    }

    /// Runs `suite`, publishing every finished record into `ctx`.
    pub fn run_in(&self, suite: &TestSuite, ctx: &mut RunContext) -> Vec<ExecutionRecord> {
        let plan = ExecutionPlan::build(suite);
        let mut records: Vec<Option<ExecutionRecord>> = vec![None; suite.tests.len()];

        for (index, error) in &plan.rejected {
            let name = suite.tests[*index].name();
            warn!(test = name, error = %error, "test rejected before execution");
            let record = ExecutionRecord::errored(name, error.clone());
            if !matches!(error, SpecError::DuplicateTest { .. }) {
                ctx.publish(record.clone());
            }
            records[*index] = Some(record);
        }

        for &index in &plan.order {
            let Some(case) = suite.tests[index].as_case() else {
                continue;
            };
            let record = if self.cancelled() {
                debug!(test = %case.name, "skipping test after cancellation");
                ExecutionRecord::errored(case.name.as_str(), RunError::Cancelled)
            } else {
                self.execute(case, ctx)
            };
            ctx.publish(record.clone());
            records[index] = Some(record);
        }

        records.into_iter().flatten().collect()
    }

    // ========================================================================
    // FILES
    // ========================================================================

    /// Loads and runs one suite file.
    pub fn run_file(&self, path: &Path) -> SuiteReport {
        let span = info_span!("suite", file = %path.display());
        let _guard = span.enter();

        let outcome = suite::load_file(path).map(|suite| {
            info!(tests = suite.tests.len(), "running suite");
            self.run(&suite)
        });
        if let Err(error) = &outcome {
            warn!(error = %error, "failed to load suite");
        }
        SuiteReport {
            path: path.to_path_buf(),
            outcome,
        }
    }

    /// Runs every file, each in its own context. With `parallel`, files run on
    /// separate threads; reports always come back in input order.
    pub fn run_files(&self, paths: &[PathBuf], parallel: bool) -> Vec<SuiteReport> {
        if !parallel || paths.len() < 2 {
            return paths.iter().map(|path| self.run_file(path)).collect();
        }

        std::thread::scope(|scope| {
            let handles: Vec<_> = paths
                .iter()
                .map(|path| (path, scope.spawn(move || self.run_file(path))))
                .collect();
            handles
                .into_iter()
                .map(|(path, handle)| {
                    handle.join().unwrap_or_else(|_| SuiteReport {
                        path: path.clone(),
                        outcome: Err(LoadError::Malformed {
                            message: "suite worker panicked".to_string(),
                        }),
                    })
                })
                .collect()
        })
    }

    // ========================================================================
    // SINGLE TEST
    // ========================================================================

    fn execute(&self, case: &TestCase, ctx: &RunContext) -> ExecutionRecord {
        let span = info_span!("test", name = %case.name);
        let _guard = span.enter();

        let started = Instant::now();
        let record = self.attempt(case, ctx).with_execution_time(started.elapsed());

        match record.error() {
            Some(error) => warn!(status = %record.status(), error = %error, "test errored"),
            None => info!(
                status = %record.status(),
                failures = record.failures().len(),
                "test finished"
            ),
        }
        for failure in record.failures() {
            debug!(%failure, "expectation failed");
        }
        record
    }

    fn attempt(&self, case: &TestCase, ctx: &RunContext) -> ExecutionRecord {
        for dependency in case.dependencies() {
            if let Err(error) = require_passed(&dependency, ctx) {
                return ExecutionRecord::errored(case.name.as_str(), error);
            }
        }

        let request = match request::build(&case.request, ctx) {
            Ok(request) => request,
            Err(error) => return ExecutionRecord::errored(case.name.as_str(), error),
        };
        dump_request(case.log, &request);

        let sent = Instant::now();
        let response = self.transport.send(&request, self.timeout);
        let elapsed = sent.elapsed();
        let response = match response {
            Ok(response) => response,
            Err(error) => {
                return ExecutionRecord::pending(case.name.as_str())
                    .with_response_time(elapsed)
                    .fail_with(error)
            }
        };

        let captured = CapturedResponse::from_http(response);
        dump(case.log, "response", &format!("{} {}", captured.status, captured.body));

        let expects_json = case
            .expected
            .response
            .as_ref()
            .is_some_and(|body| body.kind == BodyKind::Json);
        let body_error = (expects_json && captured.json.is_none()).then(|| {
            let error = serde_json::from_str::<serde_json::Value>(&captured.body)
                .err()
                .map_or_else(String::new, |err| err.to_string());
            TransportError::Decode(format!("response body is not valid JSON: {error}"))
        });

        let status_mismatch = case
            .expected
            .status
            .filter(|&wanted| wanted != captured.status)
            .map(|wanted| Failure::status_mismatch(wanted, captured.status));

        let pending = ExecutionRecord::pending(case.name.as_str()).with_response(captured, elapsed);
        if let Some(error) = body_error {
            // An unexpected status explains an undecodable body better than the decode error.
            return match status_mismatch {
                Some(mismatch) => pending.finish(vec![mismatch]),
                None => pending.fail_with(error),
            };
        }
        let failures = validate(&pending, &case.expected, ctx);
        pending.finish(failures)
    }
}

fn dump_request(level: LogLevel, request: &ConcreteRequest) {
    dump(level, "request", &format!("{} {}", request.method, request.url));
    for (key, value) in &request.headers {
        dump(level, "request header", &format!("{key}: {value}"));
    }
    if let Some(body) = &request.body {
        dump(level, "request body", body);
    }
}

/// `log: debug` on a test promotes its dumps to `info`.
fn dump(level: LogLevel, what: &str, text: &str) {
    match level {
        LogLevel::Debug => info!("{what}: {text}"),
        LogLevel::Info => debug!("{what}: {text}"),
    }
}
