//! Build command implementation.
//!
//! Resolves the module selection and prints what will be compiled. The
//! installed python is packaged into a tarball once it passed inspection.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use portable_python_lib::config::Config;
use portable_python_lib::logs::LogCapture;
use portable_python_lib::{BuildSetup, SetupOptions};
use tracing::debug;

use crate::output::{print_artifact, print_heading, print_inspection, print_json, print_module_rows};

#[derive(Debug, Args)]
pub struct BuildArgs {
  /// Python to build, e.g. "3.9.6", "cpython:3.9.6" or "latest"
  pub python: String,

  /// Folder where sources are downloaded and compiled
  #[arg(long, default_value = "build")]
  pub build: PathBuf,

  /// Folder where the final tarball is written
  #[arg(long, default_value = "dist")]
  pub dist: PathBuf,

  /// External modules to compile: "all", "none", a comma separated list, or "+name"/"-name" to adjust
  /// the auto-detected selection
  #[arg(short, long)]
  pub modules: Option<String>,

  /// Installation prefix, "{python_version}" gets replaced
  #[arg(long)]
  pub prefix: Option<String>,

  /// Keep previous build folders and resume from them (for debugging recipes)
  #[arg(long, env = "PP_X_DEBUG")]
  pub x_debug: bool,

  /// Print the module report as JSON
  #[arg(long)]
  pub json: bool,
}

pub fn cmd_build(
  args: BuildArgs,
  config_path: Option<&Path>,
  target: Option<String>,
  capture: LogCapture,
) -> Result<()> {
  let config = Config::load(config_path).context("Failed to load configuration")?;
  debug!(origins = ?config.origins().collect::<Vec<_>>(), "configuration loaded");
  let options = SetupOptions {
    build_root: args.build,
    dist_root: args.dist,
    modules: args.modules,
    prefix: args.prefix,
    target,
    config,
  };
  let setup = BuildSetup::new(&args.python, options)
    .with_context(|| format!("Cannot build '{}'", args.python))?
    .with_log_capture(capture);

  let report = setup.report();
  if args.json {
    print_json(&report)?;
  } else {
    print_heading(&format!(
      "Building {} for {} in {}",
      setup.python_spec(),
      setup.target(),
      setup
    ));
    print_module_rows(&report);
  }

  let start = Instant::now();
  let inspection = setup.compile(args.x_debug).context("Compilation failed")?;
  if !args.json {
    print_inspection(&inspection);
  }
  let tarball = setup.package().context("Packaging failed")?;
  print_artifact(tarball, start.elapsed());
  Ok(())
}
