use crate::context::BuildContext;
use crate::module::{Module, Source};
use crate::platform::TargetSystem;

use super::{DEPS_PREFIX, args, deps_destdir};

#[derive(Debug, Default)]
pub struct LibFFI;

impl Module for LibFFI {
  fn source(&self, _ctx: &BuildContext) -> Source {
    let version = "3.4.2";
    Source::new(
      format!("https://github.com/libffi/libffi/releases/download/v{version}/libffi-{version}.tar.gz"),
      version,
    )
  }

  fn configure_prefix(&self, _ctx: &BuildContext) -> Option<String> {
    Some(DEPS_PREFIX.to_string())
  }

  fn configure_args(&self, _ctx: &BuildContext) -> Vec<String> {
    args(&["--disable-shared"])
  }

  fn make_install_args(&self, ctx: &BuildContext) -> Vec<String> {
    deps_destdir(ctx)
  }
}

#[derive(Debug, Default)]
pub struct Readline;

impl Module for Readline {
  fn source(&self, _ctx: &BuildContext) -> Source {
    let version = "8.1";
    Source::new(format!("https://ftp.gnu.org/gnu/readline/readline-{version}.tar.gz"), version)
  }

  fn configure_prefix(&self, _ctx: &BuildContext) -> Option<String> {
    Some(DEPS_PREFIX.to_string())
  }

  fn configure_args(&self, _ctx: &BuildContext) -> Vec<String> {
    args(&["--disable-shared", "--with-curses"])
  }

  fn make_install_args(&self, ctx: &BuildContext) -> Vec<String> {
    deps_destdir(ctx)
  }
}

#[derive(Debug, Default)]
pub struct Openssl;

impl Openssl {
  /// OpenSSL's own name for the target, as understood by `./Configure`
  pub fn compiler(target: &TargetSystem) -> String {
    if target.is_macos() {
      return format!("darwin64-{}-cc", target.arch_name());
    }
    format!("{}-{}", target.platform(), target.arch_name())
  }
}

impl Module for Openssl {
  fn source(&self, _ctx: &BuildContext) -> Source {
    let version = "1.1.1k";
    Source::new(format!("https://www.openssl.org/source/openssl-{version}.tar.gz"), version)
  }

  fn configure_program(&self) -> Option<&str> {
    Some("./Configure")
  }

  fn configure_prefix(&self, _ctx: &BuildContext) -> Option<String> {
    Some(DEPS_PREFIX.to_string())
  }

  fn configure_args(&self, ctx: &BuildContext) -> Vec<String> {
    vec![
      "--openssldir=/etc/ssl".to_string(),
      Self::compiler(&ctx.target),
      "no-shared".to_string(),
    ]
  }

  fn make_install_args(&self, ctx: &BuildContext) -> Vec<String> {
    deps_destdir(ctx)
  }
}

#[derive(Debug, Default)]
pub struct Uuid;

impl Module for Uuid {
  fn source(&self, _ctx: &BuildContext) -> Source {
    let version = "1.0.3";
    Source::new(
      format!("https://sourceforge.net/projects/libuuid/files/libuuid-{version}.tar.gz"),
      version,
    )
  }

  fn configure_prefix(&self, _ctx: &BuildContext) -> Option<String> {
    Some(DEPS_PREFIX.to_string())
  }

  fn configure_args(&self, _ctx: &BuildContext) -> Vec<String> {
    args(&["--disable-shared"])
  }

  fn make_install_args(&self, ctx: &BuildContext) -> Vec<String> {
    deps_destdir(ctx)
  }
}
