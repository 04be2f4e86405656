//! Per-module log capture.
//!
//! A [`LogCapture`] is a cloneable handle to "the current module's log file".
//! The CLI plugs it into its tracing subscriber as a writer, and external tool
//! output is appended to it directly. [`LogCapture::attach`] opens a log file
//! and returns a [`LogGuard`]; the file is detached when the guard is dropped,
//! whichever way the module compilation ends.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, Default)]
struct Attached {
  generation: u64,
  file: Option<File>,
}

#[derive(Debug, Clone, Default)]
pub struct LogCapture {
  inner: Arc<Mutex<Attached>>,
}

impl LogCapture {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, Attached> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Start capturing into `path` (truncated if it already exists)
  pub fn attach(&self, path: &Path) -> io::Result<LogGuard> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut attached = self.lock();
    attached.generation += 1;
    attached.file = Some(file);
    Ok(LogGuard {
      capture: self.clone(),
      generation: attached.generation,
      path: path.to_path_buf(),
    })
  }

  pub fn is_attached(&self) -> bool {
    self.lock().file.is_some()
  }

  /// Append raw bytes to the attached log file, if any
  pub fn append(&self, bytes: &[u8]) -> io::Result<()> {
    match self.lock().file.as_mut() {
      Some(file) => file.write_all(bytes),
      None => Ok(()),
    }
  }
}

/// Keeps a log file attached to its [`LogCapture`] for as long as it lives
#[derive(Debug)]
pub struct LogGuard {
  capture: LogCapture,
  generation: u64,
  path: PathBuf,
}

impl LogGuard {
  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Drop for LogGuard {
  fn drop(&mut self) {
    let mut attached = self.capture.lock();
    // A newer attach() already replaced our file
    if attached.generation == self.generation
      && let Some(mut file) = attached.file.take()
    {
      let _ = file.flush();
    }
  }
}

/// Writer handed out to tracing-subscriber, discards everything while nothing is attached
pub struct CaptureWriter {
  capture: LogCapture,
}

impl Write for CaptureWriter {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.capture.append(buf)?;
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    match self.capture.lock().file.as_mut() {
      Some(file) => file.flush(),
      None => Ok(()),
    }
  }
}

impl<'a> MakeWriter<'a> for LogCapture {
  type Writer = CaptureWriter;

  fn make_writer(&'a self) -> Self::Writer {
    CaptureWriter { capture: self.clone() }
  }
}
