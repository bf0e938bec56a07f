//! Handles all user-facing output for the CLI.
//!
//! Reports render either as a coloured table with a summary line or as JSON.
//! Writers are generic over `WriteColor` so the table can be captured in tests.

use std::io::{self, Write};

use serde::Serialize;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::config::{OutputFormat, RunConfig};
use crate::report::{LoadFailure, Outcome, RunReport, Summary};
use crate::runner::TestStatus;

// ============================================================================
// ENTRY POINT
// ============================================================================

/// Prints `report` to stdout in the configured format.
pub fn print_report(report: &RunReport, config: &RunConfig) -> io::Result<()> {
    match config.format {
        OutputFormat::Json => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_json(&mut handle, report)
        }
        OutputFormat::Text => {
            let choice = if config.use_colors {
                ColorChoice::Auto
            } else {
                ColorChoice::Never
            };
            let mut stdout = StandardStream::stdout(choice);
            write_table(&mut stdout, report)
        }
    }
}

// ============================================================================
// JSON
// ============================================================================

#[derive(Serialize)]
struct JsonReport<'r> {
    summary: Summary,
    outcomes: &'r [Outcome],
    load_errors: &'r [LoadFailure],
}

pub fn write_json<W: Write>(out: &mut W, report: &RunReport) -> io::Result<()> {
    let json = JsonReport {
        summary: report.summary(),
        outcomes: &report.outcomes,
        load_errors: &report.load_errors,
    };
    serde_json::to_writer_pretty(&mut *out, &json)?;
    writeln!(out)
}

// ============================================================================
// TABLE
// ============================================================================

const HEADERS: [&str; 5] = ["Name", "Result", "Execution (s)", "Response (s)", "Error"];

pub fn write_table<W: WriteColor>(out: &mut W, report: &RunReport) -> io::Result<()> {
    for failure in &report.load_errors {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        write!(out, "LOAD ERROR")?;
        out.reset()?;
        writeln!(out, ": {} ({})", failure.file, failure.message)?;
    }

    let rows: Vec<[String; 5]> = report.outcomes.iter().map(row).collect();
    let mut widths = HEADERS.map(str::len);
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    if !rows.is_empty() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)).set_bold(true))?;
        write_cells(out, &HEADERS.map(String::from), &widths)?;
        out.reset()?;
        writeln!(out)?;
    }

    let mut current_file: Option<&str> = None;
    for (outcome, cells) in report.outcomes.iter().zip(&rows) {
        if current_file != Some(outcome.file.as_str()) {
            current_file = Some(outcome.file.as_str());
            out.set_color(ColorSpec::new().set_dimmed(true))?;
            writeln!(out, "[{}]", outcome.file)?;
            out.reset()?;
        }
        write_row(out, outcome.status, cells, &widths)?;
    }

    write_summary(out, &report.summary())
}

fn row(outcome: &Outcome) -> [String; 5] {
    let seconds = |millis: Option<u64>| {
        millis.map_or_else(|| "N/A".to_string(), |ms| format!("{:.2}", ms as f64 / 1000.0))
    };
    [
        outcome.name.clone(),
        result_label(outcome.status).to_string(),
        seconds(outcome.execution_ms),
        seconds(outcome.response_ms),
        outcome.message.clone().unwrap_or_default(),
    ]
}

fn result_label(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Passed => "OK",
        TestStatus::Failed => "Failed",
        TestStatus::Error | TestStatus::Pending => "Error",
    }
}

fn status_color(status: TestStatus) -> Color {
    match status {
        TestStatus::Passed => Color::Green,
        TestStatus::Failed => Color::Red,
        TestStatus::Error | TestStatus::Pending => Color::Yellow,
    }
}

fn write_cells<W: WriteColor>(
    out: &mut W,
    cells: &[String; 5],
    widths: &[usize; 5],
) -> io::Result<()> {
    for (index, (cell, &width)) in cells.iter().zip(widths).enumerate() {
        if index + 1 == cells.len() {
            write!(out, "{cell}")?;
        } else {
            write!(out, "{cell:<width$}  ")?;
        }
    }
    Ok(())
}

fn write_row<W: WriteColor>(
    out: &mut W,
    status: TestStatus,
    cells: &[String; 5],
    widths: &[usize; 5],
) -> io::Result<()> {
    write!(out, "{:<width$}  ", cells[0], width = widths[0])?;
    out.set_color(ColorSpec::new().set_fg(Some(status_color(status))).set_bold(true))?;
    write!(out, "{:<width$}", cells[1], width = widths[1])?;
    out.reset()?;
    out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
    write!(out, "  {:<width$}  ", cells[2], width = widths[2])?;
    out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
    write!(out, "{:<width$}  ", cells[3], width = widths[3])?;
    out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
    write!(out, "{}", cells[4])?;
    out.reset()?;
    writeln!(out)
}

fn write_summary<W: WriteColor>(out: &mut W, summary: &Summary) -> io::Result<()> {
    writeln!(out)?;
    write!(out, "Test summary: total {}, ", summary.total())?;
    let counts = [
        ("passed", summary.passed, Color::Green),
        ("failed", summary.failed, Color::Red),
        ("errors", summary.errored, Color::Yellow),
    ];
    for (index, (label, count, color)) in counts.into_iter().enumerate() {
        if index > 0 {
            write!(out, ", ")?;
        }
        out.set_color(ColorSpec::new().set_fg(Some(color)))?;
        write!(out, "{label}")?;
        out.reset()?;
        write!(out, " {count}")?;
    }
    if summary.broken_files > 0 {
        write!(out, ", unloadable files {}", summary.broken_files)?;
    }
    writeln!(out)
}
