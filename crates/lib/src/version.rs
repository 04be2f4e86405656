//! Python version specs and the curated list of supported versions.
//!
//! We don't track the entire history of releases: only a handful of recent,
//! non-EOL versions per family. Versions outside that list are still accepted
//! (with a warning) as long as they are well-formed final releases.

use std::fmt;

use semver::Version;
use thiserror::Error;
use tracing::warn;

/// Family assumed when a spec only gives a version (e.g. "3.9.6")
pub const DEFAULT_FAMILY: &str = "cpython";

/// Known to build correctly, newest first
pub const CPYTHON_VERSIONS: &[&str] = &["3.9.6", "3.9.5", "3.8.9", "3.7.9", "3.6.9"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
  #[error("invalid python spec: {0}")]
  Invalid(String),

  #[error("please provide full desired version: {0} is not good enough")]
  Incomplete(String),

  #[error("only final releases can be built, not {0}")]
  PreRelease(String),

  #[error("python family '{0}' is not yet supported")]
  UnsupportedFamily(String),
}

/// Which python to build: a family (e.g. "cpython") and an exact final version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSpec {
  family: String,
  version: Version,
}

impl VersionSpec {
  pub fn new(family: impl Into<String>, version: Version) -> Self {
    Self {
      family: family.into(),
      version,
    }
  }

  /// Parse a spec such as "cpython:3.9.6", "cpython-3.9.6", "3.9.6" or "latest"
  pub fn parse(text: &str, supported: &SupportedVersions) -> Result<Self, VersionError> {
    let text = text.trim();
    let (family, version) = split_spec(text);
    let family = family.to_ascii_lowercase();
    if family.is_empty() || !family.chars().all(|c| c.is_ascii_alphabetic()) {
      return Err(VersionError::Invalid(text.to_string()));
    }

    if version.is_empty() || version == "latest" {
      let latest = supported
        .family(&family)
        .and_then(PythonFamily::latest)
        .ok_or_else(|| VersionError::UnsupportedFamily(family.clone()))?;
      return Ok(Self::new(family, latest.clone()));
    }

    let release = version.split(['-', '+']).next().unwrap_or_default();
    let components = release.split('.').count();
    if components < 3 {
      return Err(VersionError::Incomplete(text.to_string()));
    }

    let parsed = Version::parse(version).map_err(|_| VersionError::Invalid(text.to_string()))?;
    if !parsed.pre.is_empty() {
      return Err(VersionError::PreRelease(text.to_string()));
    }
    if !parsed.build.is_empty() {
      return Err(VersionError::Invalid(text.to_string()));
    }

    Ok(Self::new(family, parsed))
  }

  pub fn family(&self) -> &str {
    &self.family
  }

  pub fn version(&self) -> &Version {
    &self.version
  }

  /// Folder-safe representation (e.g. "cpython-3.9.6")
  pub fn folder_name(&self) -> String {
    self.to_string().replace(':', "-")
  }
}

impl fmt::Display for VersionSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.family, self.version)
  }
}

fn split_spec(text: &str) -> (&str, &str) {
  if let Some((family, version)) = text.split_once(':') {
    return (family, version);
  }
  if text == "latest" || text.is_empty() {
    return (DEFAULT_FAMILY, text);
  }
  if text.starts_with(|c: char| c.is_ascii_alphabetic()) {
    return text.split_once('-').unwrap_or((text, ""));
  }
  (DEFAULT_FAMILY, text)
}

/// Known versions for a given family of pythons
#[derive(Debug, Clone)]
pub struct PythonFamily {
  pub name: String,
  /// Newest first
  pub versions: Vec<Version>,
}

impl PythonFamily {
  pub fn new(name: impl Into<String>, versions: &[&str]) -> Self {
    Self {
      name: name.into(),
      versions: versions.iter().filter_map(|v| Version::parse(v).ok()).collect(),
    }
  }

  pub fn latest(&self) -> Option<&Version> {
    self.versions.first()
  }
}

/// Supported python families and their versions
#[derive(Debug, Clone)]
pub struct SupportedVersions {
  families: Vec<PythonFamily>,
}

impl SupportedVersions {
  pub fn new(families: Vec<PythonFamily>) -> Self {
    Self { families }
  }

  pub fn family(&self, name: &str) -> Option<&PythonFamily> {
    self.families.iter().find(|f| f.name == name)
  }

  /// Unsupported families are fatal, unlisted versions only warrant a warning
  pub fn validate(&self, spec: &VersionSpec) -> Result<(), VersionError> {
    let family = self
      .family(spec.family())
      .ok_or_else(|| VersionError::UnsupportedFamily(spec.family().to_string()))?;
    if !family.versions.contains(spec.version()) {
      warn!(spec = %spec, "not in the supported list, your mileage may vary");
    }
    Ok(())
  }
}

impl Default for SupportedVersions {
  fn default() -> Self {
    Self::new(vec![PythonFamily::new(DEFAULT_FAMILY, CPYTHON_VERSIONS)])
  }
}
