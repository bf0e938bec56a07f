use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::record::ExecutionRecord;
use crate::suite::Constants;

/// Everything value resolution can see during one suite run: the suite's
/// constants and the records of tests that have already completed.
///
/// Owned by the orchestrator, which is the only writer. Each suite gets its own
/// context; contexts are never shared between suites.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    constants: Arc<Constants>,
    records: HashMap<String, ExecutionRecord>,
}

impl RunContext {
    pub fn new(constants: Arc<Constants>) -> Self {
        Self {
            constants,
            records: HashMap::new(),
        }
    }

    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    pub fn record(&self, name: &str) -> Option<&ExecutionRecord> {
        self.records.get(name)
    }

    pub fn completed(&self) -> usize {
        self.records.len()
    }

    /// Publishes a finalized record. The first record published under a name wins.
    pub(crate) fn publish(&mut self, record: ExecutionRecord) {
        self.records
            .entry(record.name().to_string())
            .or_insert(record);
    }
}
