//! apicheck: a declarative HTTP-API test interpreter.
//!
//! Suites are YAML files of tests. Each test describes one request and the
//! expectations its response must meet; tests may read values out of earlier
//! responses with `response_from`.

pub use crate::errors::{LoadError, ResolveError, RunError, SpecError, TransportError};

pub mod cli;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod path;
pub mod postman;
pub mod report;
pub mod request;
pub mod resolve;
pub mod runner;
pub mod suite;
pub mod transport;
pub mod validation;
