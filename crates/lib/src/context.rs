//! Folder layout and the read-only context every module build sees.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{Config, ConfigError, DEFAULT_MACOSX_DEPLOYMENT_TARGET};
use crate::platform::TargetSystem;
use crate::version::VersionSpec;

/// Folders used by one build, all absolute.
///
/// Layout:
/// ```text
/// <build-root>/downloads/                 source tarballs, shared across versions
/// <build-root>/<family>-<version>/build/  one unpacked source tree per module
/// <build-root>/<family>-<version>/deps/   where external modules get installed
/// <build-root>/<family>-<version>/logs/   one log file per compiled module
/// <dist-root>/                            final tarballs
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folders {
  pub build_root: PathBuf,
  pub build: PathBuf,
  pub deps: PathBuf,
  pub downloads: PathBuf,
  pub logs: PathBuf,
  pub dist: PathBuf,
}

impl Folders {
  pub fn new(build_root: &Path, dist_root: &Path, spec: &VersionSpec) -> io::Result<Self> {
    let build_root = absolute(build_root)?;
    let build = build_root.join(spec.folder_name());
    Ok(Self {
      deps: build.join("deps"),
      downloads: build_root.join("downloads"),
      logs: build.join("logs"),
      dist: absolute(dist_root)?,
      build,
      build_root,
    })
  }

  /// Folder where module `name` gets unpacked and compiled
  pub fn module_build(&self, name: &str) -> PathBuf {
    self.build.join("build").join(name)
  }

  pub fn deps_lib(&self) -> PathBuf {
    self.deps.join("lib")
  }
}

fn absolute(path: &Path) -> io::Result<PathBuf> {
  let path = std::path::absolute(path)?;
  Ok(dunce::simplified(&path).to_path_buf())
}

/// Everything a module needs to know about the build it is part of
#[derive(Debug, Clone)]
pub struct BuildContext {
  pub python: VersionSpec,
  pub target: TargetSystem,
  pub folders: Folders,
  /// `--prefix` template for the python install, `{python_version}` gets substituted
  pub prefix: Option<String>,
  pub config: Config,
  /// Modules that will be compiled, in build order
  pub active_modules: Vec<String>,
}

impl BuildContext {
  pub fn new(python: VersionSpec, target: TargetSystem, folders: Folders, config: Config) -> Self {
    Self {
      python,
      target,
      folders,
      prefix: None,
      config,
      active_modules: Vec::new(),
    }
  }

  pub fn is_active_module(&self, name: &str) -> bool {
    self.active_modules.iter().any(|m| m == name)
  }

  pub fn deps(&self) -> &Path {
    &self.folders.deps
  }

  pub fn deployment_target(&self) -> Result<String, ConfigError> {
    Ok(
      self
        .config
        .get_str(&self.target, "macosx-deployment-target")?
        .unwrap_or_else(|| DEFAULT_MACOSX_DEPLOYMENT_TARGET.to_string()),
    )
  }

  /// Keep static libpython in the final distribution
  pub fn is_static(&self) -> Result<bool, ConfigError> {
    Ok(self.config.get_bool(&self.target, "static")?.unwrap_or(true))
  }

  pub fn extra_env(&self) -> Result<BTreeMap<String, String>, ConfigError> {
    self.config.get_env(&self.target)
  }
}
