//! The python interpreter build: install prefix, staging root, and final tarball location.

use std::path::{Path, PathBuf};

use crate::context::BuildContext;
use crate::module::{BuildError, CompileSession, ModuleBuilder};

/// Where the interpreter gets installed and packaged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonLayout {
  /// `--prefix` for configure, without leading or trailing slashes
  pub prefix: String,
  /// `DESTDIR` for make install
  pub destdir: PathBuf,
  pub tarball: PathBuf,
}

impl PythonLayout {
  pub fn new(ctx: &BuildContext) -> Self {
    let version = ctx.python.version().to_string();
    let (prefix, destdir) = match &ctx.prefix {
      Some(template) => (
        template.replace("{python_version}", &version).trim_matches('/').to_string(),
        ctx.folders.build.join("root"),
      ),
      None => (version.clone(), ctx.folders.build.clone()),
    };
    let tarball = ctx.folders.dist.join(format!(
      "{}-{}-{}-{}.tar.gz",
      ctx.python.family(),
      version,
      ctx.target.platform(),
      ctx.target.arch_name()
    ));
    Self {
      prefix,
      destdir,
      tarball,
    }
  }

  /// Folder holding the installed interpreter (`bin/`, `lib/`, ...)
  pub fn install_folder(&self) -> PathBuf {
    self.destdir.join(&self.prefix)
  }

  pub fn bin_folder(&self) -> PathBuf {
    self.install_folder().join("bin")
  }
}

/// The interpreter builder: a regular module builder plus its install layout
#[derive(Debug)]
pub struct PythonBuilder {
  builder: ModuleBuilder,
  layout: PythonLayout,
}

impl PythonBuilder {
  pub fn new(builder: ModuleBuilder, ctx: &BuildContext) -> Self {
    Self {
      builder,
      layout: PythonLayout::new(ctx),
    }
  }

  pub fn builder(&self) -> &ModuleBuilder {
    &self.builder
  }

  pub fn layout(&self) -> &PythonLayout {
    &self.layout
  }

  pub fn bin_folder(&self) -> PathBuf {
    self.layout.bin_folder()
  }

  pub fn install_folder(&self) -> PathBuf {
    self.layout.install_folder()
  }

  pub fn tarball_path(&self) -> &Path {
    &self.layout.tarball
  }

  pub fn compile(&self, session: &mut CompileSession<'_>) -> Result<(), BuildError> {
    self.builder.compile(session)
  }
}
