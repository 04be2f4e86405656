//! Fakes and fixtures for tests that drive the compile pipeline without
//! touching the network or running real build tools.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use xz2::write::XzEncoder;

use crate::cmd::{Invocation, Runner};
use crate::config::Config;
use crate::context::{BuildContext, Folders};
use crate::fetch::Fetcher;
use crate::logs::LogCapture;
use crate::module::BuildError;
use crate::platform::TargetSystem;
use crate::version::{SupportedVersions, VersionSpec};

/// Context for cpython 3.9.6 with everything under `root`
pub fn test_context(root: &Path, target: &str) -> BuildContext {
  let spec = VersionSpec::parse("cpython:3.9.6", &SupportedVersions::default()).unwrap();
  let folders = Folders::new(&root.join("build"), &root.join("dist"), &spec).unwrap();
  BuildContext::new(spec, TargetSystem::from_override(Some(target)), folders, Config::default())
}

/// Write a tarball holding `files` under a single `top` folder, compression picked from the extension
pub fn write_tarball(path: &Path, top: &str, files: &[(&str, &str)]) {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  let file = File::create(path).unwrap();
  let name = path.to_string_lossy();
  if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
    append_files(GzEncoder::new(file, Compression::default()), top, files)
      .finish()
      .unwrap();
  } else if name.ends_with(".tar.xz") {
    append_files(XzEncoder::new(file, 6), top, files).finish().unwrap();
  } else {
    append_files(file, top, files).flush().unwrap();
  }
}

fn append_files<W: Write>(writer: W, top: &str, files: &[(&str, &str)]) -> W {
  let mut builder = tar::Builder::new(writer);
  for (name, content) in files {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o755);
    builder
      .append_data(&mut header, format!("{top}/{name}"), content.as_bytes())
      .unwrap();
  }
  builder.into_inner().unwrap()
}

/// A command seen by [`RecordingRunner`]
#[derive(Debug, Clone)]
pub struct Recorded {
  pub cmd: String,
  pub cwd: PathBuf,
  pub env: BTreeMap<String, String>,
}

/// Records invocations instead of running them, optionally failing on a command prefix
#[derive(Debug, Default)]
pub struct RecordingRunner {
  calls: RefCell<Vec<Recorded>>,
  fail_on: Option<String>,
  responses: Vec<(String, String)>,
}

impl RecordingRunner {
  pub fn failing_on(cmd_prefix: &str) -> Self {
    Self {
      fail_on: Some(cmd_prefix.to_string()),
      ..Self::default()
    }
  }

  /// Captured commands starting with `cmd_prefix` print `output`, unmatched ones fail
  pub fn responding(mut self, cmd_prefix: &str, output: &str) -> Self {
    self.responses.push((cmd_prefix.to_string(), output.to_string()));
    self
  }

  pub fn calls(&self) -> Vec<Recorded> {
    self.calls.borrow().clone()
  }

  pub fn commands(&self) -> Vec<String> {
    self.calls.borrow().iter().map(|c| c.cmd.clone()).collect()
  }
}

impl Runner for RecordingRunner {
  fn run(&self, invocation: &Invocation<'_>, log: &LogCapture) -> Result<(), BuildError> {
    let cmd = self.record(invocation);
    log.append(format!("$ {cmd}\n").as_bytes())?;
    match &self.fail_on {
      Some(prefix) if cmd.starts_with(prefix.as_str()) => Err(BuildError::CmdFailed { cmd, code: Some(2) }),
      _ => Ok(()),
    }
  }

  fn capture(&self, invocation: &Invocation<'_>) -> Result<String, BuildError> {
    let cmd = self.record(invocation);
    self
      .responses
      .iter()
      .find(|(prefix, _)| cmd.starts_with(prefix.as_str()))
      .map(|(_, output)| output.clone())
      .ok_or(BuildError::CmdFailed { cmd, code: Some(1) })
  }
}

impl RecordingRunner {
  fn record(&self, invocation: &Invocation<'_>) -> String {
    let cmd = invocation.command_line();
    self.calls.borrow_mut().push(Recorded {
      cmd: cmd.clone(),
      cwd: invocation.cwd.to_path_buf(),
      env: invocation.env.clone(),
    });
    cmd
  }
}

/// Counts downloads, each one produces a small source tarball
#[derive(Debug, Default)]
pub struct CountingFetcher {
  count: Cell<usize>,
}

impl CountingFetcher {
  pub fn count(&self) -> usize {
    self.count.get()
  }
}

impl Fetcher for CountingFetcher {
  fn fetch(&self, _url: &str, dest: &Path) -> Result<(), BuildError> {
    self.count.set(self.count.get() + 1);
    write_tarball(dest, "sources-1.0", &[("configure", "#!/bin/sh\n"), ("Makefile", "all:\n")]);
    Ok(())
  }
}
