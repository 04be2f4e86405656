//! What the CLI prints on stdout: module status rows, inspection reports and
//! the produced tarball. Progress and diagnostics go through tracing instead.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};
use portable_python_lib::inspect::InspectionReport;
use portable_python_lib::setup::{ModuleRow, ModuleStatus};

pub mod symbols {
  /// Module gets compiled
  pub const ACTIVE: &str = "+";
  /// Module does not apply to the target
  pub const SKIPPED: &str = "-";
  /// Module already provided by the host, or python passed inspection
  pub const OK: &str = "✓";
  pub const FAILED: &str = "✗";
  pub const UNKNOWN: &str = "?";
  pub const DETAIL: &str = "→";
}

/// Whole seconds, a build takes minutes
pub fn format_elapsed(elapsed: Duration) -> String {
  if elapsed < Duration::from_secs(1) {
    return format!("{}ms", elapsed.as_millis());
  }
  humantime::format_duration(Duration::from_secs(elapsed.as_secs())).to_string()
}

pub fn print_heading(message: &str) {
  println!("{}", message.if_supports_color(Stream::Stdout, |s| s.bold()));
}

/// `+ zlib 1.2.11`, `- gdbm 1.18.1 (linux only)` or `? foo (unknown module)`
pub fn module_row(row: &ModuleRow) -> String {
  let version = row.version.as_deref().map(|v| format!(" {v}")).unwrap_or_default();
  match &row.status {
    ModuleStatus::Active => format!("{} {}{}", symbols::ACTIVE, row.name, version),
    ModuleStatus::Skipped(reason) => format!("{} {}{} ({})", symbols::SKIPPED, row.name, version, reason),
    ModuleStatus::Unknown => format!("{} {} (unknown module)", symbols::UNKNOWN, row.name),
  }
}

pub fn print_module_rows(rows: &[ModuleRow]) {
  if rows.is_empty() {
    println!("  no external modules");
  }
  for row in rows {
    let line = module_row(row);
    match row.status {
      ModuleStatus::Active => println!("  {line}"),
      ModuleStatus::Skipped(_) => println!("  {}", line.if_supports_color(Stream::Stdout, |s| s.dimmed())),
      ModuleStatus::Unknown => println!("  {}", line.if_supports_color(Stream::Stdout, |s| s.yellow())),
    }
  }
}

pub fn print_inspection(report: &InspectionReport) {
  let rendered = report.to_string();
  if report.is_valid() {
    println!("{} {}", symbols::OK.if_supports_color(Stream::Stdout, |s| s.green()), rendered);
  } else {
    println!(
      "{} {}",
      symbols::FAILED.if_supports_color(Stream::Stdout, |s| s.red()),
      rendered.if_supports_color(Stream::Stdout, |s| s.red())
    );
  }
}

pub fn print_artifact(tarball: &Path, elapsed: Duration) {
  println!(
    "{} Built {} in {}",
    symbols::OK.if_supports_color(Stream::Stdout, |s| s.green()),
    tarball.display().if_supports_color(Stream::Stdout, |s| s.bold()),
    format_elapsed(elapsed)
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::FAILED.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{json}");
  Ok(())
}
