use std::fmt;

/// CPU architecture a python distribution is built for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Arch {
  X86_64,
  Aarch64,
  Other(String),
}

impl Arch {
  /// Detect the CPU architecture we're running on
  pub fn current() -> Self {
    Self::from_name(std::env::consts::ARCH)
  }

  /// Parse an architecture name, "arm64" is accepted as an alias of "aarch64"
  pub fn from_name(name: &str) -> Self {
    match name.to_ascii_lowercase().as_str() {
      "x86_64" | "amd64" => Self::X86_64,
      "aarch64" | "arm64" => Self::Aarch64,
      other => Self::Other(other.to_string()),
    }
  }

  /// Returns the lowercase string identifier for this architecture
  pub fn as_str(&self) -> &str {
    match self {
      Self::X86_64 => "x86_64",
      Self::Aarch64 => "aarch64",
      Self::Other(name) => name,
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
