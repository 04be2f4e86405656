//! Concrete modules: where their sources live and how they differ from a plain
//! `./configure && make && make install`.

pub mod clibs;
pub mod compression;
pub mod cpython;
pub mod db;
pub mod tcl;
pub mod x11;

use crate::context::BuildContext;
use crate::registry::BuilderRegistry;

/// Register every external module, in the order `all` builds them
pub fn register_all(registry: &mut BuilderRegistry) {
  registry
    .register::<clibs::LibFFI>()
    .register::<clibs::Readline>()
    .register::<clibs::Openssl>()
    .register::<clibs::Uuid>()
    .register::<compression::Bzip2>()
    .register::<compression::Xz>()
    .register::<compression::Zlib>()
    .register::<db::Gdbm>()
    .register::<db::Bdb>()
    .register::<db::Sqlite>()
    .register::<tcl::Tcl>()
    .register::<tcl::Tk>()
    .register::<tcl::Tix>()
    .register::<x11::Xorgproto>()
    .register::<x11::Xproto>();
}

pub fn register_pythons(registry: &mut BuilderRegistry) {
  registry.register::<cpython::Cpython>();
}

pub fn module_registry() -> BuilderRegistry {
  let mut registry = BuilderRegistry::new("external module");
  register_all(&mut registry);
  registry
}

pub fn python_registry() -> BuilderRegistry {
  let mut registry = BuilderRegistry::new("python");
  register_pythons(&mut registry);
  registry
}

/// Prefix for modules installed with `make install DESTDIR=<deps parent>`
const DEPS_PREFIX: &str = "/deps";

/// `DESTDIR` pointing to the parent of the deps folder, pairs with [`DEPS_PREFIX`]
fn deps_destdir(ctx: &BuildContext) -> Vec<String> {
  let parent = ctx.deps().parent().unwrap_or(ctx.deps());
  vec![format!("DESTDIR={}", parent.display())]
}

fn args(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| s.to_string()).collect()
}
