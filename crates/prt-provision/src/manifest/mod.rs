//! The dependency set handed to the host build.

pub mod verify;

use crate::errors::Result;
use crate::types::{PackageVersion, RuntimeDependency};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything the host build needs to consume the installed package.
/// All lists keep the order the files were found in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallManifest {
    pub version: PackageVersion,
    pub platform: String,
    pub runtime_dependencies: Vec<RuntimeDependency>,
    pub import_libraries: Vec<PathBuf>,
    pub include_paths: Vec<PathBuf>,
    /// Directories the loader should search at runtime.
    #[serde(default)]
    pub runtime_library_paths: Vec<PathBuf>,
}

impl InstallManifest {
    pub fn delay_load_names(&self) -> impl Iterator<Item = &str> {
        self.runtime_dependencies
            .iter()
            .map(|d| d.delay_load.as_str())
    }
}

/// Write the manifest as pretty JSON (via a temp file, so readers never see half of it).
pub fn write_manifest(path: &Path, manifest: &InstallManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(manifest)?)
        .with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<InstallManifest> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(serde_json::from_slice(&bytes)?)
}
