//! Inspect command implementation.
//!
//! Reports which optional modules a python can import, and which shared
//! libraries its compiled extensions link against.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use portable_python_lib::cmd::ProcessRunner;
use portable_python_lib::inspect::{InspectionReport, PythonInspector};
use portable_python_lib::platform::TargetSystem;

use crate::output::{print_inspection, print_json};

#[derive(Debug, Args)]
pub struct InspectArgs {
  /// Python executables to inspect
  #[arg(required = true)]
  pub pythons: Vec<PathBuf>,

  /// Modules to report on: "all", "+name,..." to add to the defaults, or a comma separated list
  #[arg(short, long)]
  pub modules: Option<String>,

  /// Output as JSON
  #[arg(long)]
  pub json: bool,
}

/// Pythons that can't be run are reported, not treated as errors
pub fn cmd_inspect(args: InspectArgs, target: Option<&str>) -> Result<()> {
  let target = TargetSystem::from_override(target);
  let inspector =
    PythonInspector::new(&ProcessRunner, &target, args.modules.as_deref()).context("Cannot set up inspection")?;
  let reports: Vec<InspectionReport> = args.pythons.iter().map(|python| inspector.inspect(python)).collect();

  if args.json {
    return print_json(&reports);
  }
  for report in &reports {
    print_inspection(report);
  }
  Ok(())
}
