//! Build orchestration: which modules to build, and compiling them in order.
//!
//! A [`BuildSetup`] resolves the requested module selection into three
//! disjoint lists (active, skipped, unknown), then compiles every active
//! module followed by the python interpreter itself.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::cmd::{ProcessRunner, Runner};
use crate::config::{Config, ConfigError};
use crate::context::{BuildContext, Folders};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::inspect::{InspectError, InspectionReport, PythonInspector};
use crate::logs::LogCapture;
use crate::module::{BuildError, CompileSession, ModuleBuilder};
use crate::package::compress_folder;
use crate::platform::TargetSystem;
use crate::python::PythonBuilder;
use crate::recipes::{module_registry, python_registry};
use crate::registry::BuilderRegistry;
use crate::util::remove_path;
use crate::version::{SupportedVersions, VersionError, VersionSpec};

#[derive(Debug, Error)]
pub enum SetupError {
  #[error(transparent)]
  Version(#[from] VersionError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Build(#[from] BuildError),

  #[error("Unknown modules: {}", .0.join(", "))]
  UnknownModules(Vec<String>),

  #[error(transparent)]
  Inspect(#[from] InspectError),

  /// The compiled python is not portable
  #[error("Build failed: {0}")]
  BuildFailed(String),

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

/// Which external modules to build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSelection {
  None,
  All,
  /// Modules whose telltale is not found on this host
  Auto,
  Explicit(Vec<String>),
  /// Auto-detected modules, with "+name" / "-name" applied in order
  Adjusted(Vec<Adjustment>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Adjustment {
  Add(String),
  Remove(String),
}

impl Adjustment {
  pub fn name(&self) -> &str {
    match self {
      Self::Add(name) | Self::Remove(name) => name,
    }
  }
}

impl ModuleSelection {
  /// "none", "all", empty for auto-detection, or a comma/space separated list of names.
  ///
  /// As soon as one name starts with '+' or '-', the list adjusts the auto-detected selection instead.
  pub fn parse(text: Option<&str>) -> Self {
    let text = text.map(str::trim).unwrap_or_default();
    match text {
      "" => Self::Auto,
      "none" => Self::None,
      "all" => Self::All,
      _ => {
        let tokens: Vec<&str> = text.split([',', ' ', '\t', '\n']).map(str::trim).filter(|n| !n.is_empty()).collect();
        if tokens.iter().any(|t| t.starts_with(['+', '-'])) {
          let adjustments = tokens
            .iter()
            .map(|t| match t.strip_prefix('-') {
              Some(name) => Adjustment::Remove(name.to_string()),
              None => Adjustment::Add(t.trim_start_matches('+').to_string()),
            })
            .filter(|a| !a.name().is_empty())
            .collect();
          return Self::Adjusted(adjustments);
        }

        let mut names: Vec<String> = Vec::new();
        for name in tokens {
          if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
          }
        }
        Self::Explicit(names)
      }
    }
  }

  pub fn resolve(&self, registry: &BuilderRegistry, target: &TargetSystem) -> Vec<String> {
    match self {
      Self::None => Vec::new(),
      Self::All => registry.names().map(String::from).collect(),
      Self::Auto => registry.names_without_telltale(target).map(String::from).collect(),
      Self::Explicit(names) => names.clone(),
      Self::Adjusted(adjustments) => {
        let mut names: Vec<String> = registry.names_without_telltale(target).map(String::from).collect();
        for adjustment in adjustments {
          match adjustment {
            Adjustment::Add(name) if !names.contains(name) => names.push(name.clone()),
            Adjustment::Remove(name) => names.retain(|n| n != name),
            Adjustment::Add(_) => {}
          }
        }
        names
      }
    }
  }

  /// Names given explicitly, including removed ones
  pub fn mentioned(&self) -> Vec<&str> {
    match self {
      Self::Explicit(names) => names.iter().map(String::as_str).collect(),
      Self::Adjusted(adjustments) => adjustments.iter().map(Adjustment::name).collect(),
      Self::None | Self::All | Self::Auto => Vec::new(),
    }
  }
}

/// Inputs for a [`BuildSetup`]
#[derive(Debug, Clone)]
pub struct SetupOptions {
  pub build_root: PathBuf,
  pub dist_root: PathBuf,
  /// Module selection, falls back to the `modules` config setting
  pub modules: Option<String>,
  /// `--prefix` template, may contain `{python_version}`
  pub prefix: Option<String>,
  /// "platform-arch" override, defaults to the running host
  pub target: Option<String>,
  pub config: Config,
}

impl Default for SetupOptions {
  fn default() -> Self {
    Self {
      build_root: PathBuf::from("build"),
      dist_root: PathBuf::from("dist"),
      modules: None,
      prefix: None,
      target: None,
      config: Config::default(),
    }
  }
}

/// How a requested module was classified
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum ModuleStatus {
  Active,
  Skipped(String),
  Unknown,
}

impl fmt::Display for ModuleStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Active => write!(f, "active"),
      Self::Skipped(reason) => write!(f, "skipped: {reason}"),
      Self::Unknown => write!(f, "unknown"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleRow {
  pub name: String,
  pub version: Option<String>,
  #[serde(flatten)]
  pub status: ModuleStatus,
}

#[derive(Debug)]
pub struct BuildSetup {
  context: BuildContext,
  python: PythonBuilder,
  requested: Vec<String>,
  active: Vec<ModuleBuilder>,
  skipped: Vec<(ModuleBuilder, String)>,
  unknown: Vec<String>,
  logs: LogCapture,
}

impl BuildSetup {
  pub fn new(python_spec: &str, options: SetupOptions) -> Result<Self, SetupError> {
    Self::with_registries(python_spec, options, &module_registry(), &python_registry())
  }

  pub fn with_registries(
    python_spec: &str,
    options: SetupOptions,
    modules: &BuilderRegistry,
    pythons: &BuilderRegistry,
  ) -> Result<Self, SetupError> {
    let supported = SupportedVersions::default();
    let spec = VersionSpec::parse(python_spec, &supported)?;
    supported.validate(&spec)?;

    let target = TargetSystem::from_override(options.target.as_deref());
    let folders = Folders::new(&options.build_root, &options.dist_root, &spec)?;
    let config = options.config;

    // Surface bad config values now rather than halfway through a build
    config.get_str(&target, "macosx-deployment-target")?;
    config.get_bool(&target, "static")?;
    config.get_env(&target)?;
    config.get_list(&target, "cpython-configure")?;
    let configured_modules = config.get_str(&target, "modules")?;

    let mut context = BuildContext::new(spec, target, folders, config);
    context.prefix = options.prefix;

    let family = context.python.family().to_string();
    let python_builder = pythons
      .instantiate(&family, &context)
      .ok_or(BuildError::UnknownPython(family))?;
    let python = PythonBuilder::new(python_builder, &context);

    let selection = ModuleSelection::parse(options.modules.as_deref().or(configured_modules.as_deref()));
    let requested = selection.resolve(modules, &context.target);

    let mut active = Vec::new();
    let mut skipped = Vec::new();
    let mut unknown = Vec::new();
    for name in &requested {
      let Some(builder) = modules.instantiate(name, &context) else {
        unknown.push(name.clone());
        continue;
      };
      match builder.skip_reason(&context.target) {
        Some(reason) => {
          info!("Skipping {}: {}", builder, reason);
          skipped.push((builder, reason));
        }
        None => active.push(builder),
      }
    }
    // Removing a module that doesn't exist is a typo as well
    for name in selection.mentioned() {
      if !modules.contains(name) && !unknown.iter().any(|n| n == name) {
        unknown.push(name.to_string());
      }
    }
    context.active_modules = active.iter().map(|m: &ModuleBuilder| m.name().to_string()).collect();

    Ok(Self {
      context,
      python,
      requested,
      active,
      skipped,
      unknown,
      logs: LogCapture::new(),
    })
  }

  /// Capture per-module logs through `logs` (typically also plugged into the tracing subscriber)
  pub fn with_log_capture(mut self, logs: LogCapture) -> Self {
    self.logs = logs;
    self
  }

  pub fn context(&self) -> &BuildContext {
    &self.context
  }

  pub fn python_spec(&self) -> &VersionSpec {
    &self.context.python
  }

  pub fn target(&self) -> &TargetSystem {
    &self.context.target
  }

  pub fn folders(&self) -> &Folders {
    &self.context.folders
  }

  pub fn python(&self) -> &PythonBuilder {
    &self.python
  }

  pub fn active_modules(&self) -> impl Iterator<Item = &ModuleBuilder> {
    self.active.iter()
  }

  pub fn skipped_modules(&self) -> impl Iterator<Item = (&ModuleBuilder, &str)> {
    self.skipped.iter().map(|(m, reason)| (m, reason.as_str()))
  }

  pub fn unknown_modules(&self) -> &[String] {
    &self.unknown
  }

  /// One row per requested module, in request order
  pub fn report(&self) -> Vec<ModuleRow> {
    self
      .requested
      .iter()
      .map(|name| {
        if let Some(m) = self.active.iter().find(|m| m.name() == name) {
          ModuleRow {
            name: name.clone(),
            version: Some(m.version().to_string()),
            status: ModuleStatus::Active,
          }
        } else if let Some((m, reason)) = self.skipped.iter().find(|(m, _)| m.name() == name) {
          ModuleRow {
            name: name.clone(),
            version: Some(m.version().to_string()),
            status: ModuleStatus::Skipped(reason.clone()),
          }
        } else {
          ModuleRow {
            name: name.clone(),
            version: None,
            status: ModuleStatus::Unknown,
          }
        }
      })
      .collect()
  }

  /// Compile with real processes and HTTP downloads, then check that the result is portable
  pub fn compile(&self, debug: bool) -> Result<InspectionReport, SetupError> {
    self.compile_with(debug, &ProcessRunner, &HttpFetcher)?;
    self.verify_with(&ProcessRunner)
  }

  /// Compile all active modules, then python.
  ///
  /// The version's build folder is wiped first unless `debug` is set.
  pub fn compile_with(&self, debug: bool, runner: &dyn Runner, fetcher: &dyn Fetcher) -> Result<(), SetupError> {
    if !self.unknown.is_empty() {
      return Err(SetupError::UnknownModules(self.unknown.clone()));
    }

    let build = &self.context.folders.build;
    if !debug {
      remove_path(build)?;
    }
    fs::create_dir_all(build)?;

    let count = self.active.len();
    info!("Compiling {} external module{}", count, if count == 1 { "" } else { "s" });
    let mut session = CompileSession::new(&self.context, runner, fetcher, &self.logs, debug);
    for module in &self.active {
      module.compile(&mut session)?;
    }
    self.python.compile(&mut session)?;
    Ok(())
  }

  /// Inspect the freshly installed python, failing if it references non-portable libraries
  pub fn verify_with(&self, runner: &dyn Runner) -> Result<InspectionReport, SetupError> {
    let inspector = PythonInspector::new(runner, &self.context.target, None)?;
    let report = inspector.inspect(&self.python.bin_folder().join("python"));
    info!("Inspection report:\n{}", report);
    if !report.is_valid() {
      warn!(summary = %report.summary(), "compiled python is not portable");
      return Err(SetupError::BuildFailed(report.summary()));
    }
    Ok(report)
  }

  /// Compress the installed python into its distribution tarball
  pub fn package(&self) -> Result<&Path, SetupError> {
    let tarball = self.python.tarball_path();
    compress_folder(&self.python.install_folder(), tarball)?;
    Ok(tarball)
  }
}

impl fmt::Display for BuildSetup {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.context.folders.build.display())
  }
}
