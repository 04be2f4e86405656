mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use portable_python_lib::logs::LogCapture;
use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

use crate::cmd::{BuildArgs, InspectArgs, cmd_build, cmd_inspect, cmd_list};
use crate::output::print_error;

/// portable-python - Build self-contained, relocatable CPython distributions
#[derive(Parser)]
#[command(name = "portable-python")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// YAML configuration file
  #[arg(short, long, global = true, env = "PORTABLE_PYTHON_CONFIG")]
  config: Option<PathBuf>,

  /// Target system as "platform-arch" (defaults to the running host)
  #[arg(short, long, global = true)]
  target: Option<String>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Compile a python version and package it into a tarball
  Build(BuildArgs),

  /// Show which modules a python can import and which libraries its extensions link against
  Inspect(InspectArgs),

  /// List the external modules that can be compiled
  List {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
}

/// Console verbosity follows `--verbose` (or `RUST_LOG`)
fn console_layer<S>(verbose: bool) -> impl Layer<S>
where
  S: Subscriber + for<'a> LookupSpan<'a>,
{
  let filter = if verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
  };
  tracing_subscriber::fmt::layer()
    .with_writer(std::io::stderr)
    .with_target(false)
    .without_time()
    .with_filter(filter)
}

/// Module log files always get everything down to DEBUG, whatever the console shows
fn module_log_layer<S>(capture: &LogCapture) -> impl Layer<S>
where
  S: Subscriber + for<'a> LookupSpan<'a>,
{
  tracing_subscriber::fmt::layer()
    .with_writer(capture.clone())
    .with_ansi(false)
    .with_filter(LevelFilter::DEBUG)
}

fn init_logging(verbose: bool, capture: &LogCapture) {
  tracing_subscriber::registry()
    .with(console_layer(verbose))
    .with(module_log_layer(capture))
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let capture = LogCapture::new();
  init_logging(cli.verbose, &capture);

  let result = match cli.command {
    Commands::Build(args) => cmd_build(args, cli.config.as_deref(), cli.target, capture),
    Commands::Inspect(args) => cmd_inspect(args, cli.target.as_deref()),
    Commands::List { json } => cmd_list(cli.target.as_deref(), json),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{:#}", err));
      ExitCode::FAILURE
    }
  }
}
