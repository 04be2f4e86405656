use std::fmt;

/// Operating system family a python distribution is built for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
  /// Any platform name we don't know how to compile on (kept verbatim)
  Other(String),
}

impl Os {
  /// Detect the operating system we're running on
  pub fn current() -> Self {
    Self::from_name(std::env::consts::OS)
  }

  /// Parse a platform name as given on the command line (e.g. "linux", "darwin", "macos")
  pub fn from_name(name: &str) -> Self {
    match name.to_ascii_lowercase().as_str() {
      "linux" => Self::Linux,
      "darwin" | "macos" => Self::MacOs,
      "windows" => Self::Windows,
      other => Self::Other(other.to_string()),
    }
  }

  /// Returns the lowercase platform name used in folder and tarball names
  pub fn as_str(&self) -> &str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "darwin",
      Self::Windows => "windows",
      Self::Other(name) => name,
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
