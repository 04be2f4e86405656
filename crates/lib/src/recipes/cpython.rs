//! CPython itself, plus the cleanup that makes the installed tree relocatable.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::context::BuildContext;
use crate::module::{BuildError, BuildStep, Exporter, Module, Source};
use crate::python::PythonLayout;
use crate::util::{ls_dir, remove_path};

const BASE_URL: &str = "https://www.python.org/ftp/python";

/// Scripts in `bin/` we don't ship, they can be pip installed if needed
const CLEANABLE_SCRIPTS: &[&str] = &["2to3", "easy_install", "idle3", "pip", "pydoc", "wheel"];

#[derive(Debug, Default)]
pub struct Cpython;

impl Module for Cpython {
  fn source(&self, ctx: &BuildContext) -> Source {
    let version = ctx.python.version().to_string();
    Source::new(format!("{BASE_URL}/{version}/Python-{version}.tar.xz"), version)
  }

  fn exporters(&self) -> Vec<Exporter> {
    vec![Exporter::text("CFLAGS", "-Wno-unused-command-line-argument")]
  }

  fn configure_prefix(&self, ctx: &BuildContext) -> Option<String> {
    Some(PythonLayout::new(ctx).prefix)
  }

  fn configure_args(&self, ctx: &BuildContext) -> Vec<String> {
    let deps = ctx.deps().display().to_string();
    let mut args = vec![
      "--with-ensurepip=upgrade".to_string(),
      "--enable-optimizations".to_string(),
      "--with-lto".to_string(),
    ];
    if ctx.is_active_module("openssl") {
      args.push(format!("--with-openssl={deps}"));
    }
    if ctx.is_active_module("tcl") {
      args.push(format!("--with-tcltk-includes=-I{deps}/include"));
      args.push(format!("--with-tcltk-libs=-L{deps}/lib"));
    }
    // Config values are validated when the build is set up
    args.extend(ctx.config.get_list(&ctx.target, "cpython-configure").unwrap_or_default());
    args
  }

  fn make_install_args(&self, ctx: &BuildContext) -> Vec<String> {
    vec![format!("DESTDIR={}", PythonLayout::new(ctx).destdir.display())]
  }

  fn finalize(&self, step: &mut BuildStep<'_, '_>) -> Result<(), BuildError> {
    let ctx = step.context();
    let layout = PythonLayout::new(ctx);
    let cleanup = Cleanup::new(ctx)?;
    let install = layout.install_folder();

    if ctx.is_active_module("openssl")
      && let Some(python) = installed_interpreter(&layout.bin_folder(), ctx)
    {
      // Needs ssl to reach PyPI
      step.run_path(&python, ["-mpip", "install", "-U", "pip", "setuptools", "wheel"])?;
    }
    cleanup.run(&install)?;
    if cleanup.is_static {
      symlink_static_libs(&install.join("lib"))?;
    }
    let main_python = correct_symlinks(&layout.bin_folder(), ctx)?;

    let python = layout.bin_folder().join(&main_python);
    if python.exists() {
      // Regenerate __pycache__
      step.run_path(&python, ["-mcompileall"])?;
    }
    Ok(())
  }
}

/// Test suites, caches and (unless building static) static-only artifacts
struct Cleanup {
  is_static: bool,
  basenames: Vec<String>,
  prefixes: Vec<String>,
  suffixes: Vec<String>,
}

impl Cleanup {
  fn new(ctx: &BuildContext) -> Result<Self, BuildError> {
    let is_static = ctx.is_static()?;
    let version = ctx.python.version();
    let mut basenames: Vec<String> = ["__phello__.foo.py", "__pycache__", "_bundled", "idle_test", "test", "tests"]
      .iter()
      .map(|s| s.to_string())
      .collect();
    let mut prefixes = Vec::new();
    if !is_static {
      basenames.push(format!("libpython{}.{}.a", version.major, version.minor));
      prefixes.push(format!("config-{}.{}-", version.major, version.minor));
    }
    Ok(Self {
      is_static,
      basenames,
      prefixes,
      // Extensions python failed to import at build time
      suffixes: vec!["_failed.so".to_string()],
    })
  }

  fn should_clean(&self, name: &str) -> bool {
    self.basenames.iter().any(|b| b == name)
      || self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
      || self.suffixes.iter().any(|s| name.ends_with(s.as_str()))
  }

  fn run(&self, root: &Path) -> io::Result<()> {
    if !root.is_dir() {
      return Ok(());
    }

    let mut cleaned = Vec::new();
    let mut walker = WalkDir::new(root).min_depth(1).into_iter();
    while let Some(entry) = walker.next() {
      let entry = entry.map_err(io::Error::other)?;
      let name = entry.file_name().to_string_lossy().to_string();
      if !self.should_clean(&name) {
        continue;
      }
      if entry.file_type().is_dir() {
        walker.skip_current_dir();
      }
      cleaned.push((name, entry.into_path()));
    }

    for (_, path) in &cleaned {
      remove_path(path)?;
    }
    if !cleaned.is_empty() {
      let mut names: Vec<&str> = cleaned.iter().map(|(name, _)| name.as_str()).collect();
      names.sort_unstable();
      names.dedup();
      info!(count = cleaned.len(), names = %names.join(" "), "cleaned build artifacts");
    }
    Ok(())
  }
}

/// `libpython*.a` gets installed twice, replace the deeper copy's twin with a symlink
fn symlink_static_libs(lib: &Path) -> io::Result<()> {
  if !lib.is_dir() {
    return Ok(());
  }

  let mut libs = Vec::new();
  for entry in WalkDir::new(lib) {
    let entry = entry.map_err(io::Error::other)?;
    if entry.file_type().is_file() && entry.file_name().to_string_lossy().starts_with("libpython") {
      libs.push(entry.into_path());
    }
  }

  if let [a, b] = libs.as_slice() {
    let (shorter, longer) = if a.as_os_str().len() <= b.as_os_str().len() {
      (a, b)
    } else {
      (b, a)
    };
    // They should be identical, double-check
    if fs::metadata(shorter)?.len() == fs::metadata(longer)?.len() {
      let target = match shorter.parent().and_then(|parent| longer.strip_prefix(parent).ok()) {
        Some(relative) => relative.to_path_buf(),
        None => longer.clone(),
      };
      debug!(link = ?shorter, target = ?target, "symlinking static lib");
      fs::remove_file(shorter)?;
      symlink(&target, shorter)?;
    }
  }
  Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  fs::copy(target, link).map(|_| ())
}

/// `bin/pythonX.Y` (or one of its aliases) if make install produced one
fn installed_interpreter(bin: &Path, ctx: &BuildContext) -> Option<PathBuf> {
  let version = ctx.python.version();
  [
    format!("python{}.{}", version.major, version.minor),
    format!("python{}", version.major),
    "python".to_string(),
  ]
  .into_iter()
  .map(|name| bin.join(name))
  .find(|path| path.exists())
}

/// Basename of the file `path` points to, following symlinks
fn actual_basename(path: &Path) -> String {
  let resolved = if path.is_symlink() {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
  } else {
    path.to_path_buf()
  };
  resolved
    .file_name()
    .map(|n| n.to_string_lossy().to_string())
    .unwrap_or_default()
}

/// Tidy up `bin/`: drop cleanable scripts, ensure `bin/python` exists, and make
/// python shebangs relocatable. Returns the basename of the main interpreter.
fn correct_symlinks(bin: &Path, ctx: &BuildContext) -> io::Result<String> {
  let version = ctx.python.version();
  let candidates = [
    "python".to_string(),
    format!("python{}", version.major),
    format!("python{}.{}", version.major, version.minor),
  ];

  let mut main_python: Option<String> = None;
  let mut all_files = BTreeMap::new();
  let mut regular_files: Vec<PathBuf> = Vec::new();
  for entry in ls_dir(bin)? {
    let name = entry.file_name().to_string_lossy().to_string();
    let path = entry.path();
    if CLEANABLE_SCRIPTS.iter().any(|prefix| name.starts_with(prefix)) {
      remove_path(&path)?;
      continue;
    }

    if main_python.is_none() && candidates.contains(&name) {
      main_python = Some(actual_basename(&path));
    }
    if !path.is_symlink() {
      regular_files.push(path.clone());
    }
    all_files.insert(name, path);
  }

  let Some(main_python) = main_python else {
    return Ok("python".to_string());
  };

  if !all_files.contains_key("python") {
    symlink(Path::new(&main_python), &bin.join("python"))?;
  }
  for path in regular_files {
    if path.file_name().is_some_and(|n| n.to_string_lossy() != main_python) {
      auto_correct_shebang(&main_python, &path)?;
    }
  }
  Ok(main_python)
}

/// Replace an absolute `#!.../bin/python` shebang with a `/bin/sh` trampoline to the sibling interpreter
fn auto_correct_shebang(main_python: &str, path: &Path) -> io::Result<()> {
  let content = fs::read(path)?;
  let Some(first_line_end) = content.iter().position(|b| *b == b'\n') else {
    return Ok(());
  };
  let first_line = String::from_utf8_lossy(&content[..first_line_end]);
  if !first_line.starts_with("#!") || !first_line.contains("bin/python") {
    return Ok(());
  }

  let mut rewritten = format!("#!/bin/sh\n\"exec\" \"$(dirname $0)/{main_python}\" \"$0\" \"$@\"\n").into_bytes();
  rewritten.extend_from_slice(&content[first_line_end + 1..]);
  fs::write(path, rewritten)?;
  info!(path = ?path, "auto-corrected shebang");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use crate::logs::LogCapture;
  use crate::module::{CompileSession, ModuleBuilder};
  use crate::util::testutil::{CountingFetcher, RecordingRunner, test_context};
  use tempfile::TempDir;

  #[test]
  fn configure_args_follow_active_modules_and_config() {
    let temp = TempDir::new().unwrap();
    let mut ctx = test_context(temp.path(), "linux-x86_64");
    let deps = ctx.deps().display().to_string();
    assert_eq!(
      Cpython.configure_args(&ctx),
      vec!["--with-ensurepip=upgrade", "--enable-optimizations", "--with-lto"]
    );

    ctx.active_modules = vec!["openssl".to_string(), "tcl".to_string()];
    ctx.config = Config::from_yaml_str("test", "cpython-configure: [--enable-shared]").unwrap();
    let args = Cpython.configure_args(&ctx);
    assert_eq!(
      args[3..],
      [
        format!("--with-openssl={deps}"),
        format!("--with-tcltk-includes=-I{deps}/include"),
        format!("--with-tcltk-libs=-L{deps}/lib"),
        "--enable-shared".to_string(),
      ]
    );
  }

  #[test]
  fn source_follows_requested_version() {
    let temp = TempDir::new().unwrap();
    let ctx = test_context(temp.path(), "linux-x86_64");
    let source = Cpython.source(&ctx);
    assert_eq!(source.url, "https://www.python.org/ftp/python/3.9.6/Python-3.9.6.tar.xz");
    assert_eq!(source.version, "3.9.6");
  }

  #[cfg(unix)]
  fn fake_install(install: &Path) {
    use std::os::unix::fs::symlink;

    let bin = install.join("bin");
    fs::create_dir_all(&bin).unwrap();
    fs::write(bin.join("python3.9"), b"\x7fELF binary").unwrap();
    symlink("python3.9", bin.join("python3")).unwrap();
    fs::write(bin.join("pip3"), b"#!/x/bin/python3.9\n").unwrap();
    fs::write(bin.join("2to3-3.9"), b"#!/x/bin/python3.9\n").unwrap();
    fs::write(bin.join("tool"), b"#!/x/3.9.6/bin/python3.9\nimport sys\n").unwrap();
    fs::write(bin.join("plain.sh"), b"#!/bin/sh\necho hi\n").unwrap();

    let lib = install.join("lib");
    let stdlib = lib.join("python3.9");
    let config = stdlib.join("config-3.9-x86_64-linux-gnu");
    for folder in [stdlib.join("test"), stdlib.join("json/__pycache__"), config.clone()] {
      fs::create_dir_all(folder).unwrap();
    }
    fs::write(stdlib.join("json/__init__.py"), b"").unwrap();
    fs::write(stdlib.join("test/test_x.py"), b"").unwrap();
    fs::write(lib.join("libpython3.9.a"), b"archive").unwrap();
    fs::write(config.join("libpython3.9.a"), b"archive").unwrap();
  }

  #[test]
  #[cfg(unix)]
  fn finalize_makes_install_relocatable() {
    let temp = TempDir::new().unwrap();
    let ctx = test_context(temp.path(), "linux-x86_64");
    let layout = PythonLayout::new(&ctx);
    let install = layout.install_folder();
    let builder = ModuleBuilder::attach("cpython", Box::new(Cpython), &ctx);
    fs::create_dir_all(builder.build_folder()).unwrap();
    fake_install(&install);

    let (runner, fetcher, logs) = (RecordingRunner::default(), CountingFetcher::default(), LogCapture::new());
    // Debug rerun with an existing build folder: finalize only
    let mut session = CompileSession::new(&ctx, &runner, &fetcher, &logs, true);
    builder.compile(&mut session).unwrap();

    let bin = layout.bin_folder();
    assert!(!bin.join("pip3").exists());
    assert!(!bin.join("2to3-3.9").exists());
    assert_eq!(fs::read_link(bin.join("python")).unwrap(), PathBuf::from("python3.9"));
    assert_eq!(
      fs::read_to_string(bin.join("tool")).unwrap(),
      "#!/bin/sh\n\"exec\" \"$(dirname $0)/python3.9\" \"$0\" \"$@\"\nimport sys\n"
    );
    assert_eq!(fs::read_to_string(bin.join("plain.sh")).unwrap(), "#!/bin/sh\necho hi\n");

    let stdlib = install.join("lib/python3.9");
    assert!(!stdlib.join("test").exists());
    assert!(!stdlib.join("json/__pycache__").exists());
    assert!(stdlib.join("json/__init__.py").exists());

    let static_lib = install.join("lib/libpython3.9.a");
    assert_eq!(
      fs::read_link(&static_lib).unwrap(),
      PathBuf::from("python3.9/config-3.9-x86_64-linux-gnu/libpython3.9.a")
    );
    assert_eq!(fs::read(&static_lib).unwrap(), b"archive");

    assert_eq!(
      runner.commands(),
      vec![format!("{} -mcompileall", bin.join("python3.9").display())]
    );
  }

  #[test]
  #[cfg(unix)]
  fn non_static_build_drops_static_artifacts() {
    let temp = TempDir::new().unwrap();
    let mut ctx = test_context(temp.path(), "linux-x86_64");
    ctx.config = Config::from_yaml_str("test", "static: false").unwrap();
    let install = PythonLayout::new(&ctx).install_folder();
    fake_install(&install);

    Cleanup::new(&ctx).unwrap().run(&install).unwrap();
    assert!(!install.join("lib/libpython3.9.a").exists());
    assert!(!install.join("lib/python3.9/config-3.9-x86_64-linux-gnu").exists());
  }

  #[test]
  #[cfg(unix)]
  fn finalize_upgrades_pip_when_ssl_is_available() {
    let temp = TempDir::new().unwrap();
    let mut ctx = test_context(temp.path(), "linux-x86_64");
    ctx.active_modules = vec!["openssl".to_string()];
    let layout = PythonLayout::new(&ctx);
    let builder = ModuleBuilder::attach("cpython", Box::new(Cpython), &ctx);
    fs::create_dir_all(builder.build_folder()).unwrap();
    fake_install(&layout.install_folder());

    let (runner, fetcher, logs) = (RecordingRunner::default(), CountingFetcher::default(), LogCapture::new());
    let mut session = CompileSession::new(&ctx, &runner, &fetcher, &logs, true);
    builder.compile(&mut session).unwrap();

    let python = layout.bin_folder().join("python3.9");
    assert_eq!(
      runner.commands(),
      vec![
        format!("{} -mpip install -U pip setuptools wheel", python.display()),
        format!("{} -mcompileall", python.display()),
      ]
    );
  }

  #[test]
  fn failed_extensions_are_cleaned() {
    let temp = TempDir::new().unwrap();
    let ctx = test_context(temp.path(), "linux-x86_64");
    let install = PythonLayout::new(&ctx).install_folder();
    let lib_dynload = install.join("lib/python3.9/lib-dynload");
    fs::create_dir_all(&lib_dynload).unwrap();
    let failed = lib_dynload.join("_ctypes.cpython-39-x86_64-linux-gnu_failed.so");
    let good = lib_dynload.join("_bz2.cpython-39-x86_64-linux-gnu.so");
    fs::write(&failed, b"").unwrap();
    fs::write(&good, b"").unwrap();

    Cleanup::new(&ctx).unwrap().run(&install).unwrap();
    assert!(!failed.exists());
    assert!(good.exists());
  }

  #[test]
  fn finalize_tolerates_missing_install() {
    let temp = TempDir::new().unwrap();
    let ctx = test_context(temp.path(), "linux-x86_64");
    let builder = ModuleBuilder::attach("cpython", Box::new(Cpython), &ctx);
    fs::create_dir_all(builder.build_folder()).unwrap();

    let (runner, fetcher, logs) = (RecordingRunner::default(), CountingFetcher::default(), LogCapture::new());
    let mut session = CompileSession::new(&ctx, &runner, &fetcher, &logs, true);
    builder.compile(&mut session).unwrap();
    assert!(runner.commands().is_empty());
  }
}
