//! Version stamp for platforms whose libraries carry no version resource.
//! Lives next to the library as `<file>.version`.

use super::EmbeddedVersion;
use crate::errors::{ProvisionError, Result};
use crate::types::PackageVersion;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct VersionStamp {
    major: u32,
    minor: u32,
    product_version: String,
}

pub fn stamp_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.file_name().unwrap_or_default().to_os_string();
    name.push(".version");
    artifact.with_file_name(name)
}

/// `Ok(None)` when no stamp exists.
pub fn read_stamp(artifact: &Path) -> Result<Option<EmbeddedVersion>> {
    let path = stamp_path(artifact);
    let bytes = match fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let stamp: VersionStamp =
        serde_json::from_slice(&bytes).map_err(|e| ProvisionError::parse(&path, e.to_string()))?;
    Ok(Some(EmbeddedVersion {
        file_major: stamp.major,
        file_minor: stamp.minor,
        product_version: stamp.product_version,
    }))
}

pub fn write_stamp(artifact: &Path, version: PackageVersion) -> Result<()> {
    let stamp = VersionStamp {
        major: version.major,
        minor: version.minor,
        product_version: format!("{}.{} {}", version.major, version.minor, version.build),
    };
    fs::write(stamp_path(artifact), serde_json::to_vec_pretty(&stamp)?)?;
    Ok(())
}
