//! Running external programs (configure, make, ...).
//!
//! Programs inherit the process environment, with the accumulated build
//! environment layered on top. Their stdout/stderr is streamed into the
//! current module's log file as it is produced.

use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use tracing::{debug, info};

use crate::logs::LogCapture;
use crate::module::BuildError;

/// One external program invocation
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
  pub program: &'a str,
  pub args: &'a [String],
  pub cwd: &'a Path,
  /// Overrides on top of the inherited process environment
  pub env: &'a BTreeMap<String, String>,
}

impl Invocation<'_> {
  /// Human readable command line, for logs and errors
  pub fn command_line(&self) -> String {
    let mut line = self.program.to_string();
    for arg in self.args {
      line.push(' ');
      line.push_str(arg);
    }
    line
  }

  /// Relative programs such as `./configure` are resolved against `cwd`
  fn resolved_program(&self) -> PathBuf {
    let program = Path::new(self.program);
    if self.program.starts_with("./") || self.program.starts_with("../") {
      self.cwd.join(program)
    } else {
      program.to_path_buf()
    }
  }

  fn command(&self) -> Command {
    let mut command = Command::new(self.resolved_program());
    command
      .args(self.args)
      .current_dir(self.cwd)
      .envs(self.env)
      .stdin(Stdio::null());
    command
  }

  fn spawn_error(&self, source: io::Error) -> BuildError {
    BuildError::Spawn {
      program: self.program.to_string(),
      source,
    }
  }
}

/// Runs external programs, swapped out in tests
pub trait Runner {
  /// Run to completion, output goes to `log`
  fn run(&self, invocation: &Invocation<'_>, log: &LogCapture) -> Result<(), BuildError>;

  /// Run to completion and return what the program printed on stdout
  fn capture(&self, invocation: &Invocation<'_>) -> Result<String, BuildError>;
}

/// Runs programs for real, as child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl Runner for ProcessRunner {
  fn run(&self, invocation: &Invocation<'_>, log: &LogCapture) -> Result<(), BuildError> {
    let cmd = invocation.command_line();
    info!(cmd = %cmd, cwd = ?invocation.cwd, "running");

    let mut child = invocation
      .command()
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|e| invocation.spawn_error(e))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    thread::scope(|scope| {
      let out = scope.spawn(|| stream_lines(stdout, log));
      let err = scope.spawn(|| stream_lines(stderr, log));
      for handle in [out, err] {
        handle
          .join()
          .unwrap_or_else(|_| Err(io::Error::other("log streaming thread panicked")))?;
      }
      Ok::<(), io::Error>(())
    })?;

    let status = child.wait()?;
    if !status.success() {
      return Err(BuildError::CmdFailed {
        cmd,
        code: status.code(),
      });
    }
    Ok(())
  }

  fn capture(&self, invocation: &Invocation<'_>) -> Result<String, BuildError> {
    let cmd = invocation.command_line();
    debug!(cmd = %cmd, "capturing output");

    let output = invocation.command().output().map_err(|e| invocation.spawn_error(e))?;
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if !stderr.is_empty() {
        debug!(stderr = %stderr.trim_end(), "command stderr");
      }
      return Err(BuildError::CmdFailed {
        cmd,
        code: output.status.code(),
      });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }
}

/// Copy `pipe` into `log` line by line, so that a hung or killed program still leaves its output behind
fn stream_lines<R: Read>(pipe: Option<R>, log: &LogCapture) -> io::Result<()> {
  let Some(pipe) = pipe else {
    return Ok(());
  };
  let mut reader = BufReader::new(pipe);
  let mut line = Vec::new();
  loop {
    line.clear();
    if reader.read_until(b'\n', &mut line)? == 0 {
      return Ok(());
    }
    log.append(&line)?;
  }
}
