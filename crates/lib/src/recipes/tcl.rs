//! Tcl/Tk and Tix, needed for tkinter.

use tracing::debug;

use crate::context::BuildContext;
use crate::module::{BuildError, BuildStep, Exporter, Module, ModuleDescriptor, Source, configure_make_install};
use crate::util::{ls_dir, remove_path};

const TCLTK_VERSION: &str = "8.6.10";
const TCLTK_TELLTALE: &[&str] = &["{include}/tk", "{include}/tk.h"];

fn tcltk_descriptor() -> ModuleDescriptor {
  ModuleDescriptor::new().telltale(TCLTK_TELLTALE)
}

fn with_lib(ctx: &BuildContext, flag: &str) -> String {
  format!("{}={}", flag, ctx.deps().join("lib").display())
}

/// Default build, plus the private headers tkinter needs
fn build_with_private_headers<M: Module + ?Sized>(module: &M, step: &mut BuildStep<'_, '_>) -> Result<(), BuildError> {
  configure_make_install(module, step)?;
  step.run("make", ["install-private-headers"])
}

#[derive(Debug, Default)]
pub struct Tcl;

impl Module for Tcl {
  fn descriptor(&self) -> ModuleDescriptor {
    tcltk_descriptor()
  }

  fn source(&self, _ctx: &BuildContext) -> Source {
    Source::new(
      format!("https://prdownloads.sourceforge.net/tcl/tcl{TCLTK_VERSION}-src.tar.gz"),
      TCLTK_VERSION,
    )
  }

  fn configure_cwd(&self) -> Option<&str> {
    Some("unix")
  }

  fn configure_args(&self, _ctx: &BuildContext) -> Vec<String> {
    vec!["--enable-threads".to_string()]
  }

  // Bundled packages we don't want, they can pull in unwanted symbols
  fn prepare(&self, step: &mut BuildStep<'_, '_>) -> Result<(), BuildError> {
    for entry in ls_dir(&step.build_folder().join("pkgs"))? {
      let name = entry.file_name();
      if name.to_string_lossy().starts_with("sqlite") || name.to_string_lossy().starts_with("tdbc") {
        debug!(path = ?entry.path(), "removing bundled package");
        remove_path(&entry.path())?;
      }
    }
    Ok(())
  }

  fn build_linux(&self, step: &mut BuildStep<'_, '_>) -> Result<(), BuildError> {
    build_with_private_headers(self, step)
  }
}

#[derive(Debug, Default)]
pub struct Tk;

impl Module for Tk {
  fn descriptor(&self) -> ModuleDescriptor {
    tcltk_descriptor()
  }

  fn source(&self, _ctx: &BuildContext) -> Source {
    Source::new(
      format!("https://prdownloads.sourceforge.net/tcl/tk{TCLTK_VERSION}-src.tar.gz"),
      TCLTK_VERSION,
    )
  }

  fn configure_cwd(&self) -> Option<&str> {
    Some("unix")
  }

  fn configure_args(&self, ctx: &BuildContext) -> Vec<String> {
    vec![
      "--enable-threads".to_string(),
      with_lib(ctx, "--with-tcl"),
      "--without-x".to_string(),
    ]
  }

  fn build_linux(&self, step: &mut BuildStep<'_, '_>) -> Result<(), BuildError> {
    build_with_private_headers(self, step)
  }
}

#[derive(Debug, Default)]
pub struct Tix;

impl Module for Tix {
  fn descriptor(&self) -> ModuleDescriptor {
    tcltk_descriptor()
  }

  fn source(&self, _ctx: &BuildContext) -> Source {
    let version = "8.4.3.6";
    Source::new(
      format!("https://github.com/python/cpython-source-deps/archive/tix-{version}.tar.gz"),
      version,
    )
  }

  fn configure_program(&self) -> Option<&str> {
    Some("/bin/sh configure")
  }

  fn configure_args(&self, ctx: &BuildContext) -> Vec<String> {
    vec![
      "--enable-threads".to_string(),
      with_lib(ctx, "--with-tcl"),
      with_lib(ctx, "--with-tk"),
      "--without-x".to_string(),
    ]
  }

  // Avoids "no member named 'result' in 'struct Tcl_Interp'"
  fn exporters(&self) -> Vec<Exporter> {
    vec![Exporter::text("CFLAGS", "-DUSE_INTERP_RESULT")]
  }
}
