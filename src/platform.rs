//! Host platform detection for release archive names.
//!
//! Release archives are published per `(os, arch)` pair. Hosts outside the
//! published matrix resolve to `None` so the launcher can fall back to a
//! bare command name instead of failing.

use std::fmt;

/// Operating systems with published release archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    /// Linux distributions.
    Linux,
    /// macOS.
    Osx,
    /// Windows.
    Win,
}

impl Os {
    /// Maps a Rust `std::env::consts::OS` style name onto a release tag.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.to_ascii_lowercase();
        if lowered.contains("linux") {
            Some(Self::Linux)
        } else if lowered.contains("mac") || lowered == "darwin" {
            Some(Self::Osx)
        } else if lowered.contains("windows") {
            Some(Self::Win)
        } else {
            None
        }
    }

    /// Tag used in archive names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Osx => "osx",
            Self::Win => "win",
        }
    }
}

/// CPU architectures with published release archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    /// 64-bit x86.
    X86_64,
    /// 32-bit x86.
    X86_32,
}

impl Arch {
    /// Maps a Rust `std::env::consts::ARCH` style name onto a release tag.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "x86_64" | "amd64" => Some(Self::X86_64),
            "x86" | "x86_32" => Some(Self::X86_32),
            _ => None,
        }
    }

    /// Tag used in archive names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::X86_32 => "x86_32",
        }
    }
}

/// An `(os, arch)` pair with published release archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    /// Operating system tag.
    pub os: Os,
    /// Architecture tag.
    pub arch: Arch,
}

impl Platform {
    /// Builds a platform from raw OS and architecture names.
    ///
    /// Returns `None` when either value is outside the published matrix.
    #[must_use]
    pub fn from_names(os: &str, arch: &str) -> Option<Self> {
        Some(Self {
            os: Os::from_name(os)?,
            arch: Arch::from_name(arch)?,
        })
    }

    /// Detects the platform of the running process.
    #[must_use]
    pub fn current() -> Option<Self> {
        Self::from_names(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Name of the tool executable inside release archives for this platform.
    #[must_use]
    pub fn executable_name(self, tool: &str) -> String {
        match self.os {
            Os::Win => format!("{tool}.exe"),
            Os::Linux | Os::Osx => tool.to_owned(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os.as_str(), self.arch.as_str())
    }
}
