//! Checking a built python: which optional modules import, and which shared
//! libraries its compiled extensions link against.
//!
//! The python under inspection runs a small embedded script that reports
//! module versions as JSON. Every `.so` found in its `lib-dynload` folder is
//! then listed with `ldd` (linux) or `otool -L` (macOS), and the referenced
//! libraries are classified. A portable build must only reference base system
//! libraries.

mod libs;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cmd::{Invocation, Runner};
use crate::module::BuildError;
use crate::platform::TargetSystem;
use crate::util::ls_dir;

pub use libs::{LibType, LinkedLib, SoInfo, SysLibInfo};

/// Modules reported on by default
pub const DEFAULT_MODULES: &str =
  "_bz2,_ctypes,_curses,_dbm,_gdbm,_lzma,_tkinter,_sqlite3,_ssl,_uuid,pip,readline,setuptools,wheel,zlib";

/// Reported on top of [`DEFAULT_MODULES`] when asking for "all"
pub const ADDITIONAL_MODULES: &str = "_asyncio,_functools,_tracemalloc,dbm.gnu,ensurepip,ossaudiodev,spwd,tkinter,venv";

const REPORT_SCRIPT: &str = include_str!("report.py");

#[derive(Debug, Error)]
pub enum InspectError {
  #[error("invalid shared library pattern: {0}")]
  Pattern(#[from] regex::Error),
}

/// Python modules to report on: empty for the defaults, "all", "+extra,..." to add to the defaults, or an explicit list
pub fn resolved_module_names(names: Option<&str>) -> String {
  let names = names.map(str::trim).unwrap_or_default();
  if names.is_empty() {
    DEFAULT_MODULES.to_string()
  } else if names == "all" {
    format!("{DEFAULT_MODULES},{ADDITIONAL_MODULES}")
  } else if let Some(extra) = names.strip_prefix('+') {
    format!("{DEFAULT_MODULES},{extra}")
  } else {
    names.to_string()
  }
}

/// What the inspected python reported about one of its modules
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModuleInfo {
  pub version: Option<String>,
  pub version_field: Option<String>,
  pub path: Option<String>,
  pub note: Option<String>,
}

impl ModuleInfo {
  pub fn is_absent(&self) -> bool {
    self.version.as_deref().is_some_and(|v| v.starts_with('*'))
  }
}

#[derive(Debug, Deserialize)]
struct Payload {
  version: String,
  lib_dynload: PathBuf,
  #[serde(default)]
  report: BTreeMap<String, ModuleInfo>,
}

/// Outcome of inspecting one python installation
#[derive(Debug, Clone, Serialize)]
pub struct InspectionReport {
  pub python: PathBuf,
  pub version: Option<String>,
  /// Why the python could not be inspected at all
  pub problem: Option<String>,
  pub lib_dynload: Option<PathBuf>,
  pub modules: BTreeMap<String, ModuleInfo>,
  pub so_files: Vec<SoInfo>,
  #[serde(skip)]
  is_linux: bool,
}

impl InspectionReport {
  fn new(python: &Path, is_linux: bool) -> Self {
    Self {
      python: python.to_path_buf(),
      version: None,
      problem: None,
      lib_dynload: None,
      modules: BTreeMap::new(),
      so_files: Vec::new(),
      is_linux,
    }
  }

  pub fn problematic(&self) -> impl Iterator<Item = &SoInfo> {
    self.so_files.iter().filter(|so| so.is_problematic())
  }

  pub fn ok(&self) -> impl Iterator<Item = &SoInfo> {
    self.so_files.iter().filter(|so| !so.is_problematic())
  }

  /// Extensions referencing system libraries, not portable across linux distributions
  pub fn system_linked(&self) -> impl Iterator<Item = &SoInfo> {
    self
      .so_files
      .iter()
      .filter(move |so| self.is_linux && so.links(LibType::System).next().is_some())
  }

  /// A portable build has at least one usable extension, and no problematic ones
  pub fn is_valid(&self) -> bool {
    self.problem.is_none()
      && self.system_linked().next().is_none()
      && self.ok().next().is_some()
      && self.problematic().next().is_none()
  }

  /// One line summary, mentions the offending extensions when invalid
  pub fn summary(&self) -> String {
    if let Some(problem) = &self.problem {
      return problem.clone();
    }
    let mut summary = format!(
      ".so files: {} OK, {} problematic",
      self.ok().count(),
      self.problematic().count()
    );
    let problematic = short_names(self.problematic());
    if !problematic.is_empty() {
      summary.push_str(&format!(" ({problematic})"));
    }
    let system_linked = short_names(self.system_linked());
    if !system_linked.is_empty() {
      summary.push_str(&format!(", linked against system libraries: {system_linked}"));
    }
    summary
  }

  fn relative_path<'p>(&self, path: &'p str) -> &'p str {
    let root = self.lib_dynload.as_deref().and_then(Path::parent);
    root
      .and_then(|root| Path::new(path).strip_prefix(root).ok())
      .and_then(|relative| relative.to_str())
      .unwrap_or(path)
  }
}

fn short_names<'a>(so_files: impl Iterator<Item = &'a SoInfo>) -> String {
  so_files.map(SoInfo::short_name).collect::<Vec<_>>().join(" ")
}

impl fmt::Display for InspectionReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if let Some(problem) = &self.problem {
      return write!(f, "{}: {}", self.python.display(), problem);
    }

    writeln!(f, "{} ({}):", self.python.display(), self.version.as_deref().unwrap_or("?"))?;
    let width = self.modules.keys().map(String::len).max().unwrap_or(0).max("lib-dynload".len());
    if let Some(lib_dynload) = &self.lib_dynload {
      writeln!(f, "  {:>width$}  {}", "lib-dynload", lib_dynload.display())?;
    }
    for (name, info) in &self.modules {
      let mut parts = Vec::new();
      if let Some(version) = &info.version {
        parts.push(version.as_str());
      }
      if let Some(path) = &info.path {
        parts.push(self.relative_path(path));
      } else if let Some(note) = &info.note
        && !note.contains("No module named")
      {
        parts.push(note.as_str());
      }
      writeln!(f, "  {:>width$}  {}", name, parts.join(" "))?;
    }
    write!(f, "  {}", self.summary())?;
    for so in self.problematic() {
      write!(f, "\n  {so}")?;
    }
    Ok(())
  }
}

/// Runs a python and reports on its modules and compiled extensions
pub struct PythonInspector<'r> {
  runner: &'r dyn Runner,
  sys_libs: SysLibInfo,
  modules: String,
}

impl<'r> PythonInspector<'r> {
  /// `modules` as accepted by [`resolved_module_names`]
  pub fn new(runner: &'r dyn Runner, target: &TargetSystem, modules: Option<&str>) -> Result<Self, InspectError> {
    Ok(Self {
      runner,
      sys_libs: SysLibInfo::new(target)?,
      modules: resolved_module_names(modules),
    })
  }

  /// Never fails, a python that can't be run is reported via [`InspectionReport::problem`]
  pub fn inspect(&self, python: &Path) -> InspectionReport {
    let mut report = InspectionReport::new(python, self.sys_libs.is_linux());
    let program = python.display().to_string();
    let args = vec!["-c".to_string(), REPORT_SCRIPT.to_string(), self.modules.clone()];
    let output = match self.capture(&program, &args) {
      Ok(output) => output,
      Err(e) => {
        report.problem = Some(e.to_string());
        return report;
      }
    };

    let payload: Payload = match serde_json::from_str(output.trim()) {
      Ok(payload) => payload,
      Err(e) => {
        debug!(output = %output, "unexpected inspection output");
        report.problem = Some(format!("unexpected output from {program}: {e}"));
        return report;
      }
    };

    report.so_files = self.so_files(&payload.lib_dynload);
    report.version = Some(payload.version);
    report.lib_dynload = Some(payload.lib_dynload);
    report.modules = payload.report;
    report
  }

  fn so_files(&self, lib_dynload: &Path) -> Vec<SoInfo> {
    let entries = match ls_dir(lib_dynload) {
      Ok(entries) => entries,
      Err(e) => {
        warn!(folder = ?lib_dynload, error = %e, "cannot list lib-dynload");
        return Vec::new();
      }
    };
    entries
      .iter()
      .map(|entry| entry.path())
      .filter(|path| path.extension().is_some_and(|ext| ext == "so"))
      .map(|path| self.so_info(path))
      .collect()
  }

  fn so_info(&self, path: PathBuf) -> SoInfo {
    let mut failed = path.file_name().is_some_and(|n| n.to_string_lossy().contains("_failed"));
    let (program, leading) = self.sys_libs.listing_command();
    let mut args: Vec<String> = leading.iter().map(|a| a.to_string()).collect();
    args.push(path.display().to_string());
    let libs = match self.capture(program, &args) {
      Ok(output) if !output.trim().is_empty() => self.sys_libs.parse_listing(&output),
      Ok(_) => {
        failed = true;
        Vec::new()
      }
      Err(e) => {
        warn!(path = ?path, error = %e, "cannot list linked libraries");
        failed = true;
        Vec::new()
      }
    };
    SoInfo { path, failed, libs }
  }

  fn capture(&self, program: &str, args: &[String]) -> Result<String, BuildError> {
    let env = BTreeMap::new();
    let invocation = Invocation {
      program,
      args,
      cwd: Path::new("."),
      env: &env,
    };
    self.runner.capture(&invocation)
  }
}
