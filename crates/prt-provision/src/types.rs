use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A PRT release, `major.minor.build` (e.g. 2.1.5705).
///
/// Field order matters: the derived `Ord` is lexicographic on the triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
}

impl PackageVersion {
    pub const fn new(major: u32, minor: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            build,
        }
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

impl FromStr for PackageVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(format!("expected major.minor.build, got {s:?}"));
        }
        let num = |p: &str| {
            p.parse::<u32>()
                .map_err(|_| format!("invalid version component {p:?} in {s:?}"))
        };
        Ok(Self::new(num(parts[0])?, num(parts[1])?, num(parts[2])?))
    }
}

impl TryFrom<String> for PackageVersion {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PackageVersion> for String {
    fn from(v: PackageVersion) -> Self {
        v.to_string()
    }
}

/// Role of a file found in a package tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    CoreRuntime,
    ImportLib,
    ExtensionRuntime,
    Unused,
}

impl Kind {
    /// Whether files of this kind end up in the install layout.
    pub fn is_installed(self) -> bool {
        !matches!(self, Kind::Unused)
    }
}

/// One classified file. `relative` is the path below its `lib/` or `bin/` root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryFile {
    pub path: PathBuf,
    pub relative: PathBuf,
    pub file_name: String,
    pub kind: Kind,
}

/// Runtime library the host build must ship, with the name it delay-loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeDependency {
    pub path: PathBuf,
    pub delay_load: String,
}
