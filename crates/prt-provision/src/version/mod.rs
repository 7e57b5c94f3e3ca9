//! Reads the version an installed core runtime was built as and compares it
//! to the version the build expects.

mod resource;
mod stamp;

pub use resource::read_pe_version;
pub use stamp::{read_stamp, stamp_path, write_stamp};

use crate::errors::{ProvisionError, Result};
use crate::platform::{PackagePlatform, VersionSource};
use crate::types::PackageVersion;
use std::path::Path;

/// Version fields as they appear in an artifact's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedVersion {
    pub file_major: u32,
    pub file_minor: u32,
    /// Free-form product version; its last whitespace-separated token is the build.
    pub product_version: String,
}

impl EmbeddedVersion {
    pub fn package_version(&self, artifact: &Path) -> Result<PackageVersion> {
        let last = self
            .product_version
            .split_whitespace()
            .last()
            .ok_or_else(|| ProvisionError::parse(artifact, "empty product version"))?;
        let build = last.parse::<u32>().map_err(|_| {
            ProvisionError::parse(
                artifact,
                format!(
                    "build number {last:?} in product version {:?} is not an integer",
                    self.product_version
                ),
            )
        })?;
        Ok(PackageVersion::new(self.file_major, self.file_minor, build))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    Missing,
    Mismatch(PackageVersion),
    Match,
}

/// Compare the artifact's embedded version to `expected`.
pub fn probe(
    artifact: &Path,
    platform: PackagePlatform,
    expected: PackageVersion,
) -> Result<ProbeResult> {
    if !artifact.is_file() {
        return Ok(ProbeResult::Missing);
    }

    let embedded = match platform.version_source() {
        VersionSource::PeResource => read_pe_version(artifact)?,
        VersionSource::Stamp => match read_stamp(artifact)? {
            Some(v) => v,
            // A core runtime we did not install; treat it as absent.
            None => return Ok(ProbeResult::Missing),
        },
    };

    let found = embedded.package_version(artifact)?;
    if found == expected {
        Ok(ProbeResult::Match)
    } else {
        tracing::info!(
            "Version {found} of {:?} does not match expected version {expected}",
            artifact.file_name().unwrap_or_default()
        );
        Ok(ProbeResult::Mismatch(found))
    }
}
