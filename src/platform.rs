use crate::error::{MvxError, Result};
use serde::{Deserialize, Serialize};

/// Operating systems the bootstrap can provision tools for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Mac,
    Windows,
}

impl Platform {
    pub fn current() -> Result<Self> {
        match std::env::consts::OS {
            "linux" => Ok(Platform::Linux),
            "macos" => Ok(Platform::Mac),
            "windows" => Ok(Platform::Windows),
            other => Err(MvxError::UnsupportedPlatform {
                os: other.to_string(),
                arch: std::env::consts::ARCH.to_string(),
            }),
        }
    }

    /// Key used when resolving platform-specific command scripts.
    pub fn script_key(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Mac => "darwin",
            Platform::Windows => "windows",
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Platform::Windows)
    }

    /// PATH entry separator for this platform.
    pub fn path_separator(&self) -> char {
        if self.is_windows() {
            ';'
        } else {
            ':'
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.script_key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    X64,
    Aarch64,
}

impl Architecture {
    pub fn current() -> Result<Self> {
        match std::env::consts::ARCH {
            "x86_64" | "amd64" => Ok(Architecture::X64),
            "aarch64" | "arm64" => Ok(Architecture::Aarch64),
            other => Err(MvxError::UnsupportedPlatform {
                os: std::env::consts::OS.to_string(),
                arch: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::X64 => "x64",
            Architecture::Aarch64 => "aarch64",
        }
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append the platform executable suffix to a bare binary name.
pub fn exe_name(platform: Platform, base: &str) -> String {
    if platform.is_windows() {
        format!("{}.exe", base)
    } else {
        base.to_string()
    }
}

/// Append the platform launcher-script suffix to a bare script name.
pub fn script_name(platform: Platform, base: &str, windows_ext: &str) -> String {
    if platform.is_windows() {
        format!("{}.{}", base, windows_ext)
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_platform_is_supported() {
        let platform = Platform::current().unwrap();
        assert!(!platform.script_key().is_empty());
    }

    #[test]
    fn exe_suffix_only_on_windows() {
        assert_eq!(exe_name(Platform::Linux, "java"), "java");
        assert_eq!(exe_name(Platform::Windows, "java"), "java.exe");
        assert_eq!(script_name(Platform::Windows, "mvn", "cmd"), "mvn.cmd");
        assert_eq!(script_name(Platform::Mac, "mvn", "cmd"), "mvn");
    }

    #[test]
    fn path_separator_matches_platform() {
        assert_eq!(Platform::Linux.path_separator(), ':');
        assert_eq!(Platform::Windows.path_separator(), ';');
    }
}
