//! Error and value types shared by module builders.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while compiling a module.
#[derive(Debug, Error)]
pub enum BuildError {
  /// An external program (configure, make, ...) exited with a failure.
  #[error("command failed with exit code {code:?}: {cmd}")]
  CmdFailed { cmd: String, code: Option<i32> },

  /// An external program could not be started at all.
  #[error("could not run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// HTTP request failed while downloading a source tarball.
  #[error("fetch failed for {url}: {message}")]
  FetchFailed { url: String, message: String },

  /// Downloaded file is not an archive format we know how to unpack.
  #[error("unsupported archive format: {}", .0.display())]
  UnsupportedArchive(PathBuf),

  /// An archive entry would land outside of the folder it is unpacked into.
  #[error("refusing to unpack '{entry}' from {}: path escapes the destination", .archive.display())]
  UnsafeArchiveEntry { archive: PathBuf, entry: String },

  /// No build step is defined for the target platform.
  #[error("compiling on platform '{0}' is not yet supported")]
  UnsupportedPlatform(String),

  /// No python builder is registered for the requested family.
  #[error("no python builder for family '{0}'")]
  UnknownPython(String),

  #[error(transparent)]
  Config(#[from] crate::config::ConfigError),

  /// I/O error during compilation.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Where a module's sources come from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Source {
  pub url: String,
  pub version: String,
}

impl Source {
  pub fn new(url: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      version: version.into(),
    }
  }
}

/// Static facts about a module type: where it applies, and how to tell the OS already has it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModuleDescriptor {
  /// Platforms this module is restricted to (empty: all platforms)
  pub platforms: &'static [&'static str],
  /// Path templates whose existence means the OS already provides this library,
  /// `{include}` is replaced with the target's system include folder
  pub telltale: &'static [&'static str],
}

impl ModuleDescriptor {
  pub const fn new() -> Self {
    Self {
      platforms: &[],
      telltale: &[],
    }
  }

  pub const fn platforms(mut self, platforms: &'static [&'static str]) -> Self {
    self.platforms = platforms;
    self
  }

  pub const fn telltale(mut self, telltale: &'static [&'static str]) -> Self {
    self.telltale = telltale;
    self
  }

  pub fn has_telltale(&self) -> bool {
    !self.telltale.is_empty()
  }

  /// Reason why this module should not be built on `target`, if any
  pub fn skip_reason(&self, target: &crate::platform::TargetSystem) -> Option<String> {
    (!target.is_applicable(self)).then(|| format!("{} only", self.platforms.join("/")))
  }

  /// First telltale file found on the host, if any
  pub fn existing_telltale(&self, target: &crate::platform::TargetSystem) -> Option<PathBuf> {
    let include = target.sys_include().display().to_string();
    self
      .telltale
      .iter()
      .map(|template| PathBuf::from(template.replace("{include}", &include)))
      .find(|path| path.exists())
  }
}
