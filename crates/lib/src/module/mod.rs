//! Buildable modules: external C libraries and the python interpreter itself.
//!
//! Every concrete module implements [`Module`]. Most only need to say where
//! their sources live and which `./configure` flags they want; the default
//! build step is the usual `configure && make && make install` dance.

pub mod builder;
pub mod env;
pub mod session;
pub mod types;

pub use builder::{BuildStep, ModuleBuilder, configure_make_install};
pub use env::{BuildEnv, Exporter, Fragment};
pub use session::CompileSession;
pub use types::{BuildError, ModuleDescriptor, Source};

use crate::context::BuildContext;
use crate::util::fix_lib_permissions;

/// What a module can customize about its own build
pub trait Module: Send {
  /// Platform restriction and telltale files
  fn descriptor(&self) -> ModuleDescriptor {
    ModuleDescriptor::new()
  }

  /// Source tarball URL and version
  fn source(&self, ctx: &BuildContext) -> Source;

  /// Program to run for the configure step, `None` skips configure entirely.
  /// Split on whitespace, so `"/bin/sh configure"` works.
  fn configure_program(&self) -> Option<&str> {
    Some("./configure")
  }

  /// Folder (relative to the unpacked sources) where configure and make run
  fn configure_cwd(&self) -> Option<&str> {
    None
  }

  /// Value for `--prefix`, `None` to not pass one
  fn configure_prefix(&self, ctx: &BuildContext) -> Option<String> {
    Some(ctx.deps().display().to_string())
  }

  /// Extra flags for the configure program
  fn configure_args(&self, _ctx: &BuildContext) -> Vec<String> {
    Vec::new()
  }

  fn make_args(&self, _ctx: &BuildContext) -> Vec<String> {
    Vec::new()
  }

  fn make_install_args(&self, _ctx: &BuildContext) -> Vec<String> {
    Vec::new()
  }

  /// Environment contributions on top of the standard ones, a module exporter
  /// replaces a standard one for the same variable
  fn exporters(&self) -> Vec<Exporter> {
    Vec::new()
  }

  /// Runs right after unpacking, before the build step
  fn prepare(&self, _step: &mut BuildStep<'_, '_>) -> Result<(), BuildError> {
    Ok(())
  }

  fn build_linux(&self, step: &mut BuildStep<'_, '_>) -> Result<(), BuildError> {
    configure_make_install(self, step)
  }

  fn build_darwin(&self, step: &mut BuildStep<'_, '_>) -> Result<(), BuildError> {
    self.build_linux(step)
  }

  /// Runs after the build step, even when a debug rerun skipped it
  fn finalize(&self, step: &mut BuildStep<'_, '_>) -> Result<(), BuildError> {
    fix_lib_permissions(&step.context().folders.deps_lib())?;
    Ok(())
  }
}
