//! Run configuration shared by the CLI and library callers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default per-request timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format `{other}` (use `text` or `json`)")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Configuration for discovering, running and reporting suites.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Explicit suite files. Empty means "discover under `dir`".
    pub files: Vec<PathBuf>,
    pub dir: PathBuf,
    pub recursive: bool,
    /// `None` disables the per-request timeout.
    pub timeout: Option<Duration>,
    pub parallel: bool,
    pub format: OutputFormat,
    pub use_colors: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            dir: PathBuf::from("."),
            recursive: false,
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            parallel: false,
            format: OutputFormat::Text,
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }
}

impl RunConfig {
    /// A zero-second timeout means "no timeout".
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }
}
