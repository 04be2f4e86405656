use crate::context::BuildContext;
use crate::module::{Module, ModuleDescriptor, Source};

use super::args;

/// Does not compile on macos (undefined `_history_list` symbol)
#[derive(Debug, Default)]
pub struct Gdbm;

impl Module for Gdbm {
  fn descriptor(&self) -> ModuleDescriptor {
    ModuleDescriptor::new()
      .platforms(&["linux"])
      .telltale(&["{include}/gdbm.h"])
  }

  fn source(&self, _ctx: &BuildContext) -> Source {
    let version = "1.18.1";
    Source::new(format!("https://ftp.gnu.org/gnu/gdbm/gdbm-{version}.tar.gz"), version)
  }

  // CPython looks for libgdbm_compat and gdbm-ndbm.h
  fn configure_args(&self, _ctx: &BuildContext) -> Vec<String> {
    args(&["--enable-libgdbm-compat"])
  }
}

/// See https://docs.python.org/3/library/dbm.html
#[derive(Debug, Default)]
pub struct Bdb;

impl Module for Bdb {
  fn source(&self, _ctx: &BuildContext) -> Source {
    let version = "6.2.32";
    Source::new(
      format!("https://ftp.osuosl.org/pub/blfs/conglomeration/db/db-{version}.tar.gz"),
      version,
    )
  }

  fn configure_cwd(&self) -> Option<&str> {
    Some("build_unix")
  }

  fn configure_program(&self) -> Option<&str> {
    Some("../dist/configure")
  }

  fn configure_args(&self, _ctx: &BuildContext) -> Vec<String> {
    args(&["--enable-dbm"])
  }
}

#[derive(Debug, Default)]
pub struct Sqlite;

impl Module for Sqlite {
  fn descriptor(&self) -> ModuleDescriptor {
    ModuleDescriptor::new().telltale(&["{include}/sqlite3.h"])
  }

  fn source(&self, _ctx: &BuildContext) -> Source {
    let version = "3.36.0";
    Source::new(
      format!("https://github.com/sqlite/sqlite/archive/refs/tags/version-{version}.tar.gz"),
      version,
    )
  }
}
