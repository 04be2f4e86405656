use crate::context::BuildContext;
use crate::module::{BuildError, BuildStep, Module, Source};

use super::{DEPS_PREFIX, args, deps_destdir};

/// See https://docs.python.org/3/library/bz2.html
#[derive(Debug, Default)]
pub struct Bzip2;

impl Module for Bzip2 {
  fn source(&self, _ctx: &BuildContext) -> Source {
    let version = "1.0.8";
    Source::new(format!("https://sourceware.org/pub/bzip2/bzip2-{version}.tar.gz"), version)
  }

  // No configure script, the Makefile takes PREFIX directly
  fn build_linux(&self, step: &mut BuildStep<'_, '_>) -> Result<(), BuildError> {
    let prefix = format!("PREFIX={}", step.context().deps().display());
    step.run("make", ["install".to_string(), prefix])
  }
}

#[derive(Debug, Default)]
pub struct Xz;

impl Module for Xz {
  fn source(&self, _ctx: &BuildContext) -> Source {
    let version = "5.2.5";
    Source::new(format!("https://tukaani.org/xz/xz-{version}.tar.gz"), version)
  }

  fn configure_prefix(&self, _ctx: &BuildContext) -> Option<String> {
    Some(DEPS_PREFIX.to_string())
  }

  fn configure_args(&self, _ctx: &BuildContext) -> Vec<String> {
    args(&[
      "--disable-xz",
      "--disable-xzdec",
      "--disable-lzmadec",
      "--disable-lzmainfo",
      "--disable-lzma-links",
      "--disable-scripts",
    ])
  }

  fn make_install_args(&self, ctx: &BuildContext) -> Vec<String> {
    deps_destdir(ctx)
  }
}

#[derive(Debug, Default)]
pub struct Zlib;

impl Module for Zlib {
  fn source(&self, _ctx: &BuildContext) -> Source {
    let version = "1.2.11";
    Source::new(format!("https://zlib.net/zlib-{version}.tar.gz"), version)
  }

  fn configure_prefix(&self, _ctx: &BuildContext) -> Option<String> {
    Some(DEPS_PREFIX.to_string())
  }

  fn make_install_args(&self, ctx: &BuildContext) -> Vec<String> {
    deps_destdir(ctx)
  }
}
