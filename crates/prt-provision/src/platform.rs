//! Per-platform facts about the PRT package.
//!
//! Adding a platform means adding a variant here and filling in each match;
//! nothing else in the crate branches on the operating system.

use crate::errors::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackagePlatform {
    WindowsX64,
    MacX64,
}

/// How a downloaded archive gets unpacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnpackStrategy {
    /// PowerShell `Expand-Archive`.
    ExpandArchive,
    /// The external `unzip` utility.
    Unzip,
    /// In-process extraction with the `zip` crate.
    Builtin,
}

/// Where the installed core runtime keeps its version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    /// `VS_VERSIONINFO` resource embedded in the PE image.
    PeResource,
    /// JSON stamp written next to the library at install time.
    Stamp,
}

impl PackagePlatform {
    /// Platform of the current compile target.
    pub fn detect() -> Result<Self> {
        Self::from_target(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn from_target(os: &str, arch: &str) -> Result<Self> {
        match (os, arch) {
            ("windows", "x86_64") => Ok(PackagePlatform::WindowsX64),
            ("macos", "x86_64") => Ok(PackagePlatform::MacX64),
            _ => Err(ProvisionError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            }),
        }
    }

    /// Directory name used in the install layout (`lib/<name>/Release`).
    pub fn name(self) -> &'static str {
        match self {
            PackagePlatform::WindowsX64 => "Win64",
            PackagePlatform::MacX64 => "Mac",
        }
    }

    /// Toolchain token in the release archive name.
    pub fn naming_token(self) -> &'static str {
        match self {
            PackagePlatform::WindowsX64 => "win10-vc141-x86_64-rel-opt",
            PackagePlatform::MacX64 => "osx12-ac81-x86_64-rel-opt",
        }
    }

    /// Extension of dynamic libraries, including the dot.
    pub fn dynamic_lib_extension(self) -> &'static str {
        match self {
            PackagePlatform::WindowsX64 => ".dll",
            PackagePlatform::MacX64 => ".dylib",
        }
    }

    /// Extension of static import stubs, for platforms that link through them.
    pub fn import_lib_extension(self) -> Option<&'static str> {
        match self {
            PackagePlatform::WindowsX64 => Some(".lib"),
            PackagePlatform::MacX64 => None,
        }
    }

    pub fn lib_prefix(self) -> &'static str {
        match self {
            PackagePlatform::WindowsX64 => "",
            PackagePlatform::MacX64 => "lib",
        }
    }

    pub fn unpack_strategy(self) -> UnpackStrategy {
        match self {
            PackagePlatform::WindowsX64 => UnpackStrategy::ExpandArchive,
            PackagePlatform::MacX64 => UnpackStrategy::Unzip,
        }
    }

    pub fn version_source(self) -> VersionSource {
        match self {
            PackagePlatform::WindowsX64 => VersionSource::PeResource,
            PackagePlatform::MacX64 => VersionSource::Stamp,
        }
    }

    /// `com.esri.prt.core` -> `com.esri.prt.core.dll` / `libcom.esri.prt.core.dylib`
    pub fn library_file_name(self, stem: &str) -> String {
        format!("{}{}{}", self.lib_prefix(), stem, self.dynamic_lib_extension())
    }

    pub fn is_dynamic_lib(self, file_name: &str) -> bool {
        has_extension(file_name, self.dynamic_lib_extension())
    }

    pub fn is_import_lib(self, file_name: &str) -> bool {
        self.import_lib_extension()
            .is_some_and(|ext| has_extension(file_name, ext))
    }
}

// Windows file names are case-insensitive, so `.DLL` counts.
fn has_extension(file_name: &str, ext: &str) -> bool {
    file_name.len() > ext.len()
        && file_name
            .get(file_name.len() - ext.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(ext))
}

impl fmt::Display for PackagePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PackagePlatform {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "win64" | "windows" | "windows-x64" => Ok(PackagePlatform::WindowsX64),
            "mac" | "macos" | "mac-x64" => Ok(PackagePlatform::MacX64),
            other => Err(ProvisionError::UnsupportedPlatform {
                os: other.to_string(),
                arch: "x86_64".to_string(),
            }),
        }
    }
}
