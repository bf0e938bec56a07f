use std::process::ExitCode;

fn main() -> miette::Result<ExitCode> {
    apicheck::cli::run()
}
