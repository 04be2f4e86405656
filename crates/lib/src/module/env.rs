//! Environment variables exported to external build tools.
//!
//! Each module contributes a list of [`Exporter`]s: a variable name plus a
//! function producing fragments for it. Fragments are joined with the path
//! list separator for `*PATH` variables, with a space otherwise. Variables
//! are computed in lexicographic order and accumulate in a [`BuildEnv`] that
//! lives for the whole compile run, so later modules see what earlier ones
//! exported.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::debug;

use crate::context::BuildContext;

#[cfg(windows)]
const PATH_LIST_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const PATH_LIST_SEPARATOR: &str = ":";

/// One piece of an exported value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
  /// Dropped if it does not exist on disk when the environment is computed
  Path(PathBuf),
  /// Dropped if empty
  Text(String),
}

impl Fragment {
  pub fn text(text: impl Into<String>) -> Self {
    Self::Text(text.into())
  }

  fn resolved(&self) -> Option<String> {
    match self {
      Self::Path(path) => path.exists().then(|| path.display().to_string()),
      Self::Text(text) => (!text.is_empty()).then(|| text.clone()),
    }
  }
}

type Produce = Box<dyn Fn(&BuildContext) -> Vec<Fragment> + Send + Sync>;

/// Produces the fragments of one environment variable
pub struct Exporter {
  pub var: &'static str,
  produce: Produce,
}

impl Exporter {
  pub fn new(var: &'static str, produce: impl Fn(&BuildContext) -> Vec<Fragment> + Send + Sync + 'static) -> Self {
    Self {
      var,
      produce: Box::new(produce),
    }
  }

  /// Exporter with a fixed textual value
  pub fn text(var: &'static str, value: &'static str) -> Self {
    Self::new(var, move |_| vec![Fragment::text(value)])
  }

  /// Joined value, `None` if no fragment survived
  pub fn value(&self, ctx: &BuildContext) -> Option<String> {
    let delimiter = if self.var.ends_with("PATH") {
      PATH_LIST_SEPARATOR
    } else {
      " "
    };
    let parts: Vec<String> = (self.produce)(ctx).iter().filter_map(Fragment::resolved).collect();
    (!parts.is_empty()).then(|| parts.join(delimiter))
  }
}

impl std::fmt::Debug for Exporter {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Exporter").field("var", &self.var).finish_non_exhaustive()
  }
}

fn deps_path(ctx: &BuildContext, relative: &str) -> Fragment {
  Fragment::Path(ctx.deps().join(relative))
}

/// Exporters every module gets
pub fn standard_exporters() -> Vec<Exporter> {
  vec![
    Exporter::new("ARCHFLAGS", |ctx| {
      vec![Fragment::text("-arch"), Fragment::text(ctx.target.arch_name())]
    }),
    // gcc and clang both look at CPATH for extra include folders
    Exporter::new("CPATH", |ctx| {
      vec![
        deps_path(ctx, "include"),
        deps_path(ctx, "include/readline"),
        deps_path(ctx, "include/uuid"),
        deps_path(ctx, "include/openssl"),
      ]
    }),
    Exporter::new("LIBRARY_PATH", |ctx| vec![deps_path(ctx, "lib")]),
    Exporter::new("LD_LIBRARY_PATH", |ctx| vec![deps_path(ctx, "lib")]),
    Exporter::new("MACOSX_DEPLOYMENT_TARGET", |ctx| {
      if !ctx.target.is_macos() {
        return Vec::new();
      }
      // Config values are validated when the build is set up
      let target = ctx
        .deployment_target()
        .unwrap_or_else(|_| crate::config::DEFAULT_MACOSX_DEPLOYMENT_TARGET.to_string());
      vec![Fragment::Text(target)]
    }),
    Exporter::new("PATH", |ctx| {
      vec![deps_path(ctx, "bin"), Fragment::text("/usr/bin"), Fragment::text("/bin")]
    }),
    Exporter::new("PKG_CONFIG_PATH", |ctx| vec![deps_path(ctx, "lib/pkgconfig")]),
  ]
}

/// Values of the standard exporters overlaid with `module_exporters`, sorted by variable name.
///
/// Variables whose exporter produced nothing are absent.
pub fn exported_vars(module_exporters: Vec<Exporter>, ctx: &BuildContext) -> BTreeMap<String, String> {
  let mut exporters: BTreeMap<&'static str, Exporter> = BTreeMap::new();
  for exporter in standard_exporters().into_iter().chain(module_exporters) {
    exporters.insert(exporter.var, exporter);
  }

  exporters
    .into_iter()
    .filter_map(|(var, exporter)| exporter.value(ctx).map(|value| (var.to_string(), value)))
    .collect()
}

/// Environment accumulated over a compile run, layered over the inherited process environment
#[derive(Debug, Clone, Default)]
pub struct BuildEnv {
  vars: BTreeMap<String, String>,
}

impl BuildEnv {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn vars(&self) -> &BTreeMap<String, String> {
    &self.vars
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.vars.get(name).map(String::as_str)
  }

  pub fn set(&mut self, name: &str, value: &str) {
    debug!("env {}={}", name, value);
    self.vars.insert(name.to_string(), value.to_string());
  }

  /// Apply a module's exported variables, then the `extra` ones it did not export itself
  pub fn apply(&mut self, exported: &BTreeMap<String, String>, extra: &BTreeMap<String, String>) {
    for (name, value) in exported {
      self.set(name, value);
    }
    for (name, value) in extra {
      if !exported.contains_key(name) {
        self.set(name, value);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::test_context;
  use tempfile::TempDir;

  #[test]
  fn path_vars_join_with_separator_in_order() {
    let temp = TempDir::new().unwrap();
    let ctx = test_context(temp.path(), "linux-x86_64");
    let a = temp.path().join("a");
    let b = temp.path().join("b");
    std::fs::create_dir_all(&a).unwrap();
    std::fs::create_dir_all(&b).unwrap();

    let (pa, pb) = (a.clone(), b.clone());
    let exporter = Exporter::new("CUSTOM_PATH", move |_| vec![Fragment::Path(pb.clone()), Fragment::Path(pa.clone())]);
    assert_eq!(
      exporter.value(&ctx).unwrap(),
      format!("{}{}{}", b.display(), PATH_LIST_SEPARATOR, a.display())
    );
  }

  #[test]
  fn other_vars_join_with_space() {
    let temp = TempDir::new().unwrap();
    let ctx = test_context(temp.path(), "linux-x86_64");
    let exporter = Exporter::new("CFLAGS", |_| vec![Fragment::text("-O2"), Fragment::text(""), Fragment::text("-g")]);
    assert_eq!(exporter.value(&ctx).as_deref(), Some("-O2 -g"));
  }

  #[test]
  fn missing_paths_leave_var_unset() {
    let temp = TempDir::new().unwrap();
    let ctx = test_context(temp.path(), "linux-x86_64");
    let missing = temp.path().join("nope");
    let exporter = Exporter::new("LIBRARY_PATH", move |_| vec![Fragment::Path(missing.clone())]);
    assert_eq!(exporter.value(&ctx), None);

    let vars = exported_vars(Vec::new(), &ctx);
    assert!(!vars.contains_key("LIBRARY_PATH"));
    assert!(!vars.contains_key("CPATH"));
    assert!(!vars.contains_key("MACOSX_DEPLOYMENT_TARGET"));
    assert_eq!(vars.get("PATH").map(String::as_str), Some("/usr/bin:/bin"));
    assert_eq!(vars.get("ARCHFLAGS").map(String::as_str), Some("-arch x86_64"));
  }

  #[test]
  fn standard_exports_pick_up_deps_folders() {
    let temp = TempDir::new().unwrap();
    let ctx = test_context(temp.path(), "darwin-arm64");
    std::fs::create_dir_all(ctx.deps().join("include/openssl")).unwrap();
    std::fs::create_dir_all(ctx.deps().join("lib/pkgconfig")).unwrap();

    let vars = exported_vars(Vec::new(), &ctx);
    let include = ctx.deps().join("include");
    assert_eq!(
      vars["CPATH"],
      format!("{}:{}", include.display(), include.join("openssl").display())
    );
    assert_eq!(vars["LIBRARY_PATH"], ctx.deps().join("lib").display().to_string());
    assert_eq!(vars["PKG_CONFIG_PATH"], ctx.deps().join("lib/pkgconfig").display().to_string());
    assert_eq!(vars["MACOSX_DEPLOYMENT_TARGET"], "10.14");
    assert_eq!(vars["ARCHFLAGS"], "-arch arm64");
  }

  #[test]
  fn module_exporters_override_standard_ones() {
    let temp = TempDir::new().unwrap();
    let ctx = test_context(temp.path(), "linux-x86_64");
    let vars = exported_vars(
      vec![Exporter::text("PATH", "/opt/bin"), Exporter::text("CFLAGS", "-DUSE_INTERP_RESULT")],
      &ctx,
    );
    assert_eq!(vars["PATH"], "/opt/bin");
    assert_eq!(vars["CFLAGS"], "-DUSE_INTERP_RESULT");
    let names: Vec<_> = vars.keys().cloned().collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
  }

  #[test]
  fn build_env_accumulates_and_keeps_exports_over_extras() {
    let mut env = BuildEnv::new();
    let exported = BTreeMap::from([("CFLAGS".to_string(), "-O2".to_string())]);
    let extra = BTreeMap::from([
      ("CFLAGS".to_string(), "-O0".to_string()),
      ("FOO".to_string(), "bar".to_string()),
    ]);
    env.apply(&exported, &extra);
    assert_eq!(env.get("CFLAGS"), Some("-O2"));
    assert_eq!(env.get("FOO"), Some("bar"));

    // Next module exports nothing: earlier values stay
    env.apply(&BTreeMap::new(), &BTreeMap::new());
    assert_eq!(env.get("CFLAGS"), Some("-O2"));
  }
}
