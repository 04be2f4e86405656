//! State shared by all module compilations of one run.

use std::path::PathBuf;

use crate::cmd::Runner;
use crate::context::BuildContext;
use crate::fetch::Fetcher;
use crate::logs::LogCapture;
use crate::module::BuildEnv;

/// One sequential compile run: modules first, then python
pub struct CompileSession<'a> {
  pub ctx: &'a BuildContext,
  pub env: BuildEnv,
  pub runner: &'a dyn Runner,
  pub fetcher: &'a dyn Fetcher,
  pub logs: &'a LogCapture,
  /// Resume mode: modules already unpacked only get finalized again
  pub debug: bool,
  log_counter: u32,
}

impl<'a> CompileSession<'a> {
  pub fn new(
    ctx: &'a BuildContext,
    runner: &'a dyn Runner,
    fetcher: &'a dyn Fetcher,
    logs: &'a LogCapture,
    debug: bool,
  ) -> Self {
    Self {
      ctx,
      env: BuildEnv::new(),
      runner,
      fetcher,
      logs,
      debug,
      log_counter: 0,
    }
  }

  /// Log file for the next compilation, alphabetical order of the names follows compilation order
  pub fn next_log_path(&mut self, name: &str) -> PathBuf {
    self.log_counter += 1;
    self.ctx.folders.logs.join(format!("{:02}-{}.log", self.log_counter, name))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{CountingFetcher, RecordingRunner, test_context};
  use tempfile::TempDir;

  #[test]
  fn log_names_are_sequenced() {
    let temp = TempDir::new().unwrap();
    let ctx = test_context(temp.path(), "linux-x86_64");
    let (runner, fetcher, logs) = (RecordingRunner::default(), CountingFetcher::default(), LogCapture::new());
    let mut session = CompileSession::new(&ctx, &runner, &fetcher, &logs, false);

    let names: Vec<_> = ["zlib", "bzip2", "cpython"]
      .iter()
      .map(|name| session.next_log_path(name))
      .collect();
    assert_eq!(names[0], ctx.folders.logs.join("01-zlib.log"));
    assert_eq!(names[1], ctx.folders.logs.join("02-bzip2.log"));
    assert_eq!(names[2], ctx.folders.logs.join("03-cpython.log"));
  }
}
