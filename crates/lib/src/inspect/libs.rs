//! Classifying the shared libraries that compiled extensions link against.

use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;

use crate::platform::TargetSystem;

/// Always present on a linux target, similar to the manylinux policy
const LINUX_BASE_LIBS: &[&str] = &[
  "libc.so.6",
  "libcrypt.so.1",
  "libm.so.6",
  "libdl.so.2",
  "libpthread.so.0",
  "librt.so.1",
  "libnsl.so.1",
];

const LDD: (&str, &[&str]) = ("ldd", &[]);
const OTOOL: (&str, &[&str]) = ("otool", &["-L"]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LibType {
  /// Part of the base system, fine to reference from a portable build
  Base,
  /// Installed under a system folder, but not guaranteed to be present everywhere
  System,
  /// Could not be resolved
  Missing,
  /// Anything else, typically a path leaked from the build machine
  Other,
}

impl fmt::Display for LibType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Base => "base",
      Self::System => "system",
      Self::Missing => "missing",
      Self::Other => "other",
    };
    write!(f, "{name}")
  }
}

/// A library referenced by a compiled extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedLib {
  pub path: String,
  pub basename: String,
  pub version: Option<String>,
  pub lib_type: LibType,
}

impl LinkedLib {
  /// "ssl:1.1" for known locations, the full path for anything else
  pub fn short_name(&self) -> String {
    if self.lib_type == LibType::Other {
      return self.path.clone();
    }
    let name = self.basename.strip_prefix("lib").unwrap_or(&self.basename);
    let name = name.split('.').next().unwrap_or(name);
    match &self.version {
      Some(version) => format!("{name}:{version}"),
      None => name.to_string(),
    }
  }
}

/// One `.so` from `lib-dynload`, with the libraries it links against
#[derive(Debug, Clone, Serialize)]
pub struct SoInfo {
  pub path: PathBuf,
  /// Python could not load it at build time, or its libraries could not be listed
  pub failed: bool,
  pub libs: Vec<LinkedLib>,
}

impl SoInfo {
  pub fn short_name(&self) -> String {
    let name = self
      .path
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .unwrap_or_default();
    name.split('.').next().unwrap_or_default().to_string()
  }

  pub fn links(&self, lib_type: LibType) -> impl Iterator<Item = &LinkedLib> {
    self.libs.iter().filter(move |lib| lib.lib_type == lib_type)
  }

  pub fn is_problematic(&self) -> bool {
    self.failed || self.links(LibType::Missing).next().is_some() || self.links(LibType::Other).next().is_some()
  }
}

impl fmt::Display for SoInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}*.so", self.short_name())?;
    if self.failed {
      write!(f, " (failed)")?;
    }
    for lib_type in [LibType::Missing, LibType::Other, LibType::System] {
      let names: Vec<String> = self.links(lib_type).map(LinkedLib::short_name).collect();
      if !names.is_empty() {
        write!(f, " {lib_type}: {}", names.join(" "))?;
      }
    }
    Ok(())
  }
}

/// What counts as a base, system or foreign library on a target
#[derive(Debug)]
pub struct SysLibInfo {
  is_linux: bool,
  basenames: &'static [&'static str],
  rx_base_path: Regex,
  rx_syslib: Regex,
  rx_otool: Regex,
  rx_version: Regex,
}

impl SysLibInfo {
  pub fn new(target: &TargetSystem) -> Result<Self, regex::Error> {
    let mut base_paths = vec![r"@rpath/.+"];
    let (basenames, rx_syslib): (&'static [&'static str], &str) = if target.is_linux() {
      // linux-vdso is the kernel's virtual shared object
      base_paths.push(r"linux-vdso\.so.*");
      base_paths.push(r"/lib\d*/ld-linux-.+");
      (LINUX_BASE_LIBS, r"^(/usr)?/lib\d*/.+$")
    } else {
      base_paths.push(r"/usr/lib/libSystem\.B\.dylib");
      (&[], r"^/(usr/lib\d*|System/Library)/.+$")
    };

    Ok(Self {
      is_linux: target.is_linux(),
      basenames,
      rx_base_path: Regex::new(&format!("^({})$", base_paths.join("|")))?,
      rx_syslib: Regex::new(rx_syslib)?,
      rx_otool: Regex::new(r"^(\S+).+current version ([0-9.]+).*$")?,
      rx_version: Regex::new(r"^.*?([\d.]+)[^\d]*$")?,
    })
  }

  pub fn is_linux(&self) -> bool {
    self.is_linux
  }

  /// Program listing the libraries a `.so` links against, and its leading arguments
  pub fn listing_command(&self) -> (&'static str, &'static [&'static str]) {
    if self.is_linux { LDD } else { OTOOL }
  }

  pub fn lib_type(&self, path: &str, basename: &str) -> LibType {
    if path.is_empty() || path == "not found" {
      LibType::Missing
    } else if self.rx_base_path.is_match(path) || self.basenames.contains(&basename) {
      LibType::Base
    } else if self.rx_syslib.is_match(path) {
      LibType::System
    } else {
      LibType::Other
    }
  }

  /// Parse the output of [`Self::listing_command`]
  pub fn parse_listing(&self, output: &str) -> Vec<LinkedLib> {
    if self.is_linux {
      self.parse_ldd(output)
    } else {
      self.parse_otool(output)
    }
  }

  fn parse_ldd(&self, output: &str) -> Vec<LinkedLib> {
    let mut libs = Vec::new();
    for line in output.lines().map(str::trim) {
      if line.is_empty() || line == "statically linked" {
        continue;
      }
      let lib = match line.split_once("=>") {
        Some((basename, rest)) => {
          let path = rest.split_once('(').map_or(rest, |(path, _)| path).trim();
          self.linked_lib(path, None, Some(basename.trim()))
        }
        None => self.linked_lib(line.split(' ').next().unwrap_or(line), None, None),
      };
      libs.push(lib);
    }
    libs
  }

  fn parse_otool(&self, output: &str) -> Vec<LinkedLib> {
    output
      .lines()
      .filter_map(|line| self.rx_otool.captures(line.trim()))
      .map(|c| self.linked_lib(&c[1], Some(&c[2]), None))
      .collect()
  }

  fn linked_lib(&self, path: &str, version: Option<&str>, basename: Option<&str>) -> LinkedLib {
    let basename = match basename {
      Some(basename) if !basename.is_empty() => basename.to_string(),
      _ => Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default(),
    };
    let version = match version {
      Some(version) => Some(version.to_string()),
      None => self
        .rx_version
        .captures(&basename)
        .map(|c| c[1].trim_matches('.').to_string())
        .filter(|v| !v.is_empty()),
    };
    LinkedLib {
      lib_type: self.lib_type(path, &basename),
      path: path.to_string(),
      basename,
      version,
    }
  }
}
