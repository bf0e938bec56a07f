//! Command-line arguments and subcommands for the apicheck CLI.
//!
//! Running suites is the default action, so `apicheck cards.yml` and
//! `apicheck run cards.yml` are equivalent.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::config::{OutputFormat, RunConfig, DEFAULT_TIMEOUT_SECS};

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "apicheck",
    version,
    about = "Run declarative HTTP-API test suites written in YAML.",
    args_conflicts_with_subcommands = true
)]
pub struct ApicheckArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run: RunArgs,
}

impl ApicheckArgs {
    /// The `run` arguments, whether or not the subcommand was spelled out.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Run(self.run))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run test suites (the default).
    Run(RunArgs),
    /// Convert a Postman collection into a test suite.
    Convert {
        /// The exported Postman collection (JSON).
        collection: PathBuf,
        /// Where to write the YAML suite.
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Suite files to run. With none, every `.yml`/`.yaml` file in `--dir` runs.
    pub files: Vec<PathBuf>,

    /// Directory searched when no files are given.
    #[arg(long, env = "APICHECK_DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Also search subdirectories of `--dir`.
    #[arg(short, long)]
    pub recursive: bool,

    /// Per-request timeout in seconds; 0 disables it.
    #[arg(long, env = "APICHECK_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Run suite files concurrently.
    #[arg(long)]
    pub parallel: bool,

    /// Report format.
    #[arg(long, value_enum, default_value_t = FormatArg::Text)]
    pub format: FormatArg,

    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable coloured output.
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

impl RunArgs {
    pub fn to_config(&self) -> RunConfig {
        let defaults = RunConfig::default();
        RunConfig {
            files: self.files.clone(),
            dir: self.dir.clone(),
            recursive: self.recursive,
            parallel: self.parallel,
            format: self.format.into(),
            use_colors: defaults.use_colors && !self.no_color,
            ..defaults
        }
        .with_timeout_secs(self.timeout)
    }

    /// Default filter directive for the `apicheck` target when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn bare_files_mean_run() {
        let argv = ["apicheck", "a.yml", "b.yaml", "--timeout", "5"];
        let args = ApicheckArgs::try_parse_from(argv).unwrap();
        let Command::Run(run) = args.into_command() else {
            panic!("expected the run command");
        };
        let config = run.to_config();
        assert_eq!(config.files, vec![PathBuf::from("a.yml"), PathBuf::from("b.yaml")]);
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn convert_takes_two_paths() {
        let args =
            ApicheckArgs::try_parse_from(["apicheck", "convert", "c.json", "out.yml"]).unwrap();
        assert!(matches!(
            args.into_command(),
            Command::Convert { collection, output }
                if collection == PathBuf::from("c.json") && output == PathBuf::from("out.yml")
        ));
    }

    #[test]
    fn verbosity_flags() {
        let args = ApicheckArgs::try_parse_from(["apicheck", "-vv"]).unwrap();
        assert_eq!(args.run.log_level(), "trace");
        let args = ApicheckArgs::try_parse_from(["apicheck", "-q"]).unwrap();
        assert_eq!(args.run.log_level(), "error");
        assert!(ApicheckArgs::try_parse_from(["apicheck", "-q", "-v"]).is_err());
    }
}
