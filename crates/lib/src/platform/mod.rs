pub mod arch;
pub mod os;

use std::convert::Infallible;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

pub use arch::Arch;
pub use os::Os;

use crate::module::ModuleDescriptor;

/// Folder holding the macOS SDK installed with the command line tools
pub const MACOS_SDK_FOLDER: &str = "/Library/Developer/CommandLineTools/SDKs/MacOSX.sdk";

/// Target system (platform + architecture) we're compiling for (e.g., "linux-x86_64")
#[derive(Debug, Clone)]
pub struct TargetSystem {
  pub os: Os,
  pub arch: Arch,
  sys_include: OnceLock<PathBuf>,
}

impl TargetSystem {
  pub fn new(os: Os, arch: Arch) -> Self {
    Self {
      os,
      arch,
      sys_include: OnceLock::new(),
    }
  }

  /// The system we're running on
  pub fn current() -> Self {
    Self::new(Os::current(), Arch::current())
  }

  /// Target from an optional "platform-arch" override, missing parts default to the running host
  pub fn from_override(text: Option<&str>) -> Self {
    let text = text.map(str::trim).unwrap_or_default();
    let (platform, arch) = text.split_once('-').unwrap_or((text, ""));
    let os = if platform.is_empty() {
      Os::current()
    } else {
      Os::from_name(platform)
    };
    let arch = if arch.is_empty() {
      Arch::current()
    } else {
      Arch::from_name(arch)
    };
    Self::new(os, arch)
  }

  /// Platform name, as used in module platform restrictions (e.g., "linux", "darwin")
  pub fn platform(&self) -> &str {
    self.os.as_str()
  }

  /// Architecture name as the target's own toolchain spells it ("arm64" on macOS, "aarch64" on linux)
  pub fn arch_name(&self) -> &str {
    match (&self.os, &self.arch) {
      (Os::MacOs, Arch::Aarch64) => "arm64",
      (_, arch) => arch.as_str(),
    }
  }

  pub fn is_linux(&self) -> bool {
    self.os == Os::Linux
  }

  pub fn is_macos(&self) -> bool {
    self.os == Os::MacOs
  }

  /// SDK folder, macOS only
  pub fn sdk_folder(&self) -> Option<PathBuf> {
    self.is_macos().then(|| PathBuf::from(MACOS_SDK_FOLDER))
  }

  /// Root folder for system headers: an SDK path on macOS, `/usr/include` elsewhere
  pub fn sys_include(&self) -> &PathBuf {
    self.sys_include.get_or_init(|| match self.sdk_folder() {
      Some(sdk) => sdk.join("usr/include"),
      None => PathBuf::from("/usr/include"),
    })
  }

  /// Is a module with this descriptor buildable on this target?
  pub fn is_applicable(&self, descriptor: &ModuleDescriptor) -> bool {
    descriptor.platforms.is_empty() || descriptor.platforms.contains(&self.platform())
  }
}

impl PartialEq for TargetSystem {
  fn eq(&self, other: &Self) -> bool {
    self.os == other.os && self.arch == other.arch
  }
}

impl Eq for TargetSystem {}

impl Default for TargetSystem {
  fn default() -> Self {
    Self::current()
  }
}

impl FromStr for TargetSystem {
  type Err = Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(Self::from_override(Some(s)))
  }
}

impl fmt::Display for TargetSystem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.os, self.arch_name())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn override_format() {
    let target = TargetSystem::from_override(Some("darwin-arm64"));
    assert_eq!(target.os, Os::MacOs);
    assert_eq!(target.arch, Arch::Aarch64);
    assert_eq!(target.arch_name(), "arm64");
    assert_eq!(target.to_string(), "darwin-arm64");

    let target = TargetSystem::from_override(Some("linux-arm64"));
    assert_eq!(target.arch, Arch::Aarch64);
    assert_eq!(target.to_string(), "linux-aarch64");

    let target: TargetSystem = "linux-x86_64".parse().unwrap();
    assert!(target.is_linux());
    assert!(!target.is_macos());
  }

  #[test]
  fn missing_parts_default_to_host() {
    assert_eq!(TargetSystem::from_override(None), TargetSystem::current());
    assert_eq!(TargetSystem::from_override(Some("")), TargetSystem::current());

    let target = TargetSystem::from_override(Some("linux"));
    assert_eq!(target.os, Os::Linux);
    assert_eq!(target.arch, Arch::current());
  }

  #[test]
  fn sys_include_depends_on_platform() {
    let linux = TargetSystem::from_override(Some("linux-x86_64"));
    assert_eq!(linux.sys_include(), &PathBuf::from("/usr/include"));
    assert!(linux.sdk_folder().is_none());

    let macos = TargetSystem::from_override(Some("darwin-x86_64"));
    assert_eq!(
      macos.sys_include(),
      &PathBuf::from(MACOS_SDK_FOLDER).join("usr/include")
    );
  }

  #[test]
  fn applicability_follows_platform_restriction() {
    let linux = TargetSystem::from_override(Some("linux-x86_64"));
    let darwin = TargetSystem::from_override(Some("darwin-x86_64"));

    let anywhere = ModuleDescriptor::new();
    assert!(linux.is_applicable(&anywhere));
    assert!(darwin.is_applicable(&anywhere));

    let linux_only = ModuleDescriptor::new().platforms(&["linux"]);
    assert!(linux.is_applicable(&linux_only));
    assert!(!darwin.is_applicable(&linux_only));
  }
}
