use crate::context::BuildContext;
use crate::module::{Module, ModuleDescriptor, Source};

use super::{DEPS_PREFIX, deps_destdir};

const LINUX_ONLY: ModuleDescriptor = ModuleDescriptor::new().platforms(&["linux"]);

#[derive(Debug, Default)]
pub struct Xorgproto;

impl Module for Xorgproto {
  fn descriptor(&self) -> ModuleDescriptor {
    LINUX_ONLY
  }

  fn source(&self, _ctx: &BuildContext) -> Source {
    let version = "2019.1";
    Source::new(
      format!(
        "https://gitlab.freedesktop.org/xorg/proto/xorgproto/-/archive/xorgproto-{version}/xorgproto-xorgproto-{version}.tar.gz"
      ),
      version,
    )
  }

  fn configure_program(&self) -> Option<&str> {
    None
  }

  fn make_install_args(&self, ctx: &BuildContext) -> Vec<String> {
    deps_destdir(ctx)
  }
}

#[derive(Debug, Default)]
pub struct Xproto;

impl Module for Xproto {
  fn descriptor(&self) -> ModuleDescriptor {
    LINUX_ONLY
  }

  fn source(&self, _ctx: &BuildContext) -> Source {
    let version = "7.0.31";
    Source::new(
      format!("https://gitlab.freedesktop.org/xorg/proto/xproto/-/archive/xproto-{version}/xproto-xproto-{version}.tar.gz"),
      version,
    )
  }

  fn configure_prefix(&self, _ctx: &BuildContext) -> Option<String> {
    Some(DEPS_PREFIX.to_string())
  }

  fn make_install_args(&self, ctx: &BuildContext) -> Vec<String> {
    deps_destdir(ctx)
  }
}
