//! Layered YAML configuration.
//!
//! A value is looked up from the most specific section to the least specific one:
//! `<platform>-<arch>.<key>`, then `<platform>.<key>`, then top-level `<key>`.
//! Sources are consulted in order, the built-in defaults last; first found wins.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::debug;

use crate::platform::TargetSystem;

/// Environment variable pointing to a config file (used by the CLI)
pub const CONFIG_ENV_VAR: &str = "PORTABLE_PYTHON_CONFIG";

pub const DEFAULT_MACOSX_DEPLOYMENT_TARGET: &str = "10.14";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid YAML in {origin}: {source}")]
  Parse {
    origin: String,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("config key '{key}' must be {expected}")]
  WrongType { key: String, expected: &'static str },
}

/// Settings from one config file
#[derive(Debug, Clone)]
struct ConfigSource {
  origin: String,
  data: Value,
}

impl ConfigSource {
  fn get(&self, path: &[&str]) -> Option<&Value> {
    let mut value = &self.data;
    for key in path {
      value = value.as_mapping()?.get(*key)?;
    }
    (!value.is_null()).then_some(value)
  }
}

#[derive(Debug, Clone)]
pub struct Config {
  sources: Vec<ConfigSource>,
}

impl Config {
  /// Load config from `path` (if any), on top of the built-in defaults
  pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
    let mut config = Self::default();
    if let Some(path) = path {
      let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
      })?;
      config.push_yaml(&path.display().to_string(), &text)?;
    }
    Ok(config)
  }

  /// Config from an in-memory YAML document, on top of the built-in defaults
  pub fn from_yaml_str(origin: &str, text: &str) -> Result<Self, ConfigError> {
    let mut config = Self::default();
    config.push_yaml(origin, text)?;
    Ok(config)
  }

  fn push_yaml(&mut self, origin: &str, text: &str) -> Result<(), ConfigError> {
    let data: Value = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
      origin: origin.to_string(),
      source,
    })?;
    debug!(origin = %origin, "loaded config");
    // Defaults stay last
    let position = self.sources.len().saturating_sub(1);
    self.sources.insert(
      position,
      ConfigSource {
        origin: origin.to_string(),
        data,
      },
    );
    Ok(())
  }

  /// Where settings come from, most specific first
  pub fn origins(&self) -> impl Iterator<Item = &str> {
    self.sources.iter().map(|s| s.origin.as_str())
  }

  /// Look up `key` for `target`, most specific setting wins
  pub fn get(&self, target: &TargetSystem, key: &str) -> Option<&Value> {
    let platform_arch = target.to_string();
    let paths: [&[&str]; 3] = [&[platform_arch.as_str(), key], &[target.platform(), key], &[key]];
    self
      .sources
      .iter()
      .find_map(|source| paths.iter().find_map(|path| source.get(path)))
  }

  pub fn get_str(&self, target: &TargetSystem, key: &str) -> Result<Option<String>, ConfigError> {
    self
      .get(target, key)
      .map(|v| {
        scalar_to_string(v).ok_or_else(|| ConfigError::WrongType {
          key: key.to_string(),
          expected: "a string",
        })
      })
      .transpose()
  }

  pub fn get_bool(&self, target: &TargetSystem, key: &str) -> Result<Option<bool>, ConfigError> {
    self
      .get(target, key)
      .map(|v| {
        v.as_bool().ok_or_else(|| ConfigError::WrongType {
          key: key.to_string(),
          expected: "a boolean",
        })
      })
      .transpose()
  }

  /// A list of strings, a single scalar is accepted as a one-item list
  pub fn get_list(&self, target: &TargetSystem, key: &str) -> Result<Vec<String>, ConfigError> {
    let wrong_type = || ConfigError::WrongType {
      key: key.to_string(),
      expected: "a list of strings",
    };
    match self.get(target, key) {
      None => Ok(Vec::new()),
      Some(Value::Sequence(items)) => items.iter().map(|v| scalar_to_string(v).ok_or_else(wrong_type)).collect(),
      Some(v) => scalar_to_string(v).map(|s| vec![s]).ok_or_else(wrong_type),
    }
  }

  /// Extra environment variables to export for `target`
  pub fn get_env(&self, target: &TargetSystem) -> Result<BTreeMap<String, String>, ConfigError> {
    let wrong_type = || ConfigError::WrongType {
      key: "env".to_string(),
      expected: "a mapping of names to values",
    };
    let Some(value) = self.get(target, "env") else {
      return Ok(BTreeMap::new());
    };
    let mapping = value.as_mapping().ok_or_else(wrong_type)?;
    let mut env = BTreeMap::new();
    for (k, v) in mapping {
      if v.is_null() {
        continue;
      }
      let name = k.as_str().ok_or_else(wrong_type)?;
      env.insert(name.to_string(), scalar_to_string(v).ok_or_else(wrong_type)?);
    }
    Ok(env)
  }
}

impl Default for Config {
  fn default() -> Self {
    let mut data = Mapping::new();
    data.insert(
      Value::from("macosx-deployment-target"),
      Value::from(DEFAULT_MACOSX_DEPLOYMENT_TARGET),
    );
    data.insert(Value::from("static"), Value::from(true));
    Self {
      sources: vec![ConfigSource {
        origin: "default".to_string(),
        data: Value::Mapping(data),
      }],
    }
  }
}

fn scalar_to_string(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}
