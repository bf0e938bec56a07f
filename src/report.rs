//! Flattens execution records into reportable outcomes.

use serde::Serialize;

use crate::runner::{ExecutionRecord, SuiteReport, TestStatus};

/// One line of the final report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub file: String,
    pub name: String,
    pub status: TestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_ms: Option<u64>,
}

impl Outcome {
    pub fn from_record(file: impl Into<String>, record: &ExecutionRecord) -> Self {
        let reasons = record.failure_reasons();
        Self {
            file: file.into(),
            name: record.name().to_string(),
            status: record.status(),
            message: (!reasons.is_empty()).then(|| reasons.join("; ")),
            execution_ms: record.execution_time().map(|elapsed| elapsed.as_millis() as u64),
            response_ms: record.response_time().map(|elapsed| elapsed.as_millis() as u64),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

/// Per-status counts over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    /// Files that could not be loaded at all.
    pub broken_files: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.errored
    }

    /// True iff every test passed and every file loaded.
    pub fn success(&self) -> bool {
        self.failed == 0 && self.errored == 0 && self.broken_files == 0
    }
}

/// The outcomes of a run plus file-level load failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<Outcome>,
    pub load_errors: Vec<LoadFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadFailure {
    pub file: String,
    pub message: String,
}

impl RunReport {
    pub fn from_suites(suites: &[SuiteReport]) -> Self {
        let mut report = RunReport::default();
        for suite in suites {
            let file = suite.path.display().to_string();
            match &suite.outcome {
                Ok(records) => report.outcomes.extend(
                    records
                        .iter()
                        .map(|record| Outcome::from_record(file.as_str(), record)),
                ),
                Err(error) => report.load_errors.push(LoadFailure {
                    file,
                    message: format_error_chain(error),
                }),
            }
        }
        report
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            broken_files: self.load_errors.len(),
            ..Summary::default()
        };
        for outcome in &self.outcomes {
            match outcome.status {
                TestStatus::Passed => summary.passed += 1,
                TestStatus::Failed => summary.failed += 1,
                TestStatus::Error | TestStatus::Pending => summary.errored += 1,
            }
        }
        summary
    }
}

/// An error and its sources, joined with `: `.
fn format_error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
