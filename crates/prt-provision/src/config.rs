use crate::errors::{ProvisionError, Result};
use crate::paths::default_install_root;
use crate::platform::{PackagePlatform, UnpackStrategy};
use crate::types::PackageVersion;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Official release location of the CityEngine SDK.
pub static DEFAULT_BASE_URL: Lazy<String> =
    Lazy::new(|| "https://github.com/Esri/esri-cityengine-sdk/releases/download".to_string());

pub const DEFAULT_PACKAGE: &str = "esri_ce_sdk";
pub const DEFAULT_CORE_RUNTIME: &str = "com.esri.prt.core";
pub const DEFAULT_VERSION: PackageVersion = PackageVersion::new(2, 1, 5705);

/// Extension libraries kept by default, as platform-neutral stems.
const DEFAULT_EXTENSION_STEMS: [&str; 3] =
    ["com.esri.prt.adaptors", "com.esri.prt.codecs", "VueExport"];

/// Download tuning. Defaults mirror the runtime installer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadOptions {
    /// Extra attempts after the first failure.
    pub retries: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub backoff_ms: u64,
    pub timeout_secs: u64,
    /// Lowercase hex SHA-256 of the archive, if known.
    pub sha256: Option<String>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff_ms: 500,
            timeout_secs: 600,
            sha256: None,
        }
    }
}

/// Everything one provisioning run needs. Load from JSON, then layer
/// environment and command line on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    pub install_root: PathBuf,
    /// `None` = platform of the compile target.
    pub platform: Option<PackagePlatform>,
    pub version: PackageVersion,
    pub package: String,
    pub base_url: String,
    /// Core runtime stem, without prefix or extension.
    pub core_runtime: String,
    /// Full file names. `None` = the defaults for the platform.
    pub extension_allow_list: Option<Vec<String>>,
    /// `None` = the platform's native unpack command.
    pub unpack: Option<UnpackStrategy>,
    pub download: DownloadOptions,
    /// Host binaries directory runtime libraries are staged into.
    pub staging_dir: Option<PathBuf>,
    /// Write the manifest JSON here after each successful run.
    pub manifest_file: Option<PathBuf>,
    pub offline: bool,
    /// Reinstall regardless of the installed version and overwrite every file.
    pub force: bool,
    /// Progress at `info` instead of `debug`.
    pub verbose: bool,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            install_root: default_install_root(),
            platform: None,
            version: DEFAULT_VERSION,
            package: DEFAULT_PACKAGE.to_string(),
            base_url: DEFAULT_BASE_URL.clone(),
            core_runtime: DEFAULT_CORE_RUNTIME.to_string(),
            extension_allow_list: None,
            unpack: None,
            download: DownloadOptions::default(),
            staging_dir: None,
            manifest_file: None,
            offline: false,
            force: false,
            verbose: false,
        }
    }
}

impl ProvisionConfig {
    pub fn new(install_root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
            ..Self::default()
        }
    }

    /// Read a JSON config file; missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .map_err(|e| ProvisionError::Config(format!("read {}: {e}", path.display())))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ProvisionError::Config(format!("{}: {e}", path.display())))
    }

    /// Apply `PRT_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(root) = get("PRT_INSTALL_ROOT") {
            self.install_root = PathBuf::from(root);
        }
        if let Some(url) = get("PRT_BASE_URL") {
            self.base_url = url;
        }
        if let Some(v) = get("PRT_VERSION") {
            self.version = v
                .parse()
                .map_err(|e| ProvisionError::Config(format!("PRT_VERSION: {e}")))?;
        }
        if let Some(sum) = get("PRT_SHA256") {
            self.download.sha256 = Some(sum.trim().to_lowercase());
        }
        if let Some(v) = get("PRT_OFFLINE") {
            self.offline = env_flag(&v);
        }
        if let Some(v) = get("PRT_VERBOSE") {
            self.verbose = env_flag(&v);
        }
        Ok(())
    }

    pub fn resolve_platform(&self) -> Result<PackagePlatform> {
        match self.platform {
            Some(p) => Ok(p),
            None => PackagePlatform::detect(),
        }
    }

    pub fn allow_list(&self, platform: PackagePlatform) -> ExtensionAllowList {
        match &self.extension_allow_list {
            Some(names) => ExtensionAllowList::new(names.iter().cloned()),
            None => ExtensionAllowList::defaults_for(platform),
        }
    }

    pub fn unpack_strategy(&self, platform: PackagePlatform) -> UnpackStrategy {
        self.unpack.unwrap_or_else(|| platform.unpack_strategy())
    }
}

fn env_flag(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Names of the extension libraries that get installed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionAllowList {
    names: BTreeSet<String>,
}

impl ExtensionAllowList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn defaults_for(platform: PackagePlatform) -> Self {
        Self::new(
            DEFAULT_EXTENSION_STEMS
                .iter()
                .map(|stem| platform.library_file_name(stem)),
        )
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.names.contains(file_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: ProvisionConfig = serde_json::from_str(
            r#"{ "install_root": "/tmp/prt", "version": "2.4.7316", "platform": "MacX64",
                 "download": { "retries": 0 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.install_root, PathBuf::from("/tmp/prt"));
        assert_eq!(cfg.version, PackageVersion::new(2, 4, 7316));
        assert_eq!(cfg.platform, Some(PackagePlatform::MacX64));
        assert_eq!(cfg.download.retries, 0);
        assert_eq!(cfg.download.timeout_secs, 600);
        assert_eq!(cfg.package, DEFAULT_PACKAGE);
        assert!(!cfg.verbose);
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("PRT_INSTALL_ROOT", "/opt/prt"),
            ("PRT_VERSION", "2.1.5704"),
            ("PRT_OFFLINE", "yes"),
            ("PRT_SHA256", " ABCD "),
        ]
        .into_iter()
        .collect();
        let mut cfg = ProvisionConfig::default();
        cfg.apply_env_from(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.install_root, PathBuf::from("/opt/prt"));
        assert_eq!(cfg.version, PackageVersion::new(2, 1, 5704));
        assert!(cfg.offline);
        assert!(!cfg.verbose);
        assert_eq!(cfg.download.sha256.as_deref(), Some("abcd"));
    }

    #[test]
    fn unreadable_or_invalid_file_is_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("absent").join("prt.json");
        let err = ProvisionConfig::load(&missing).unwrap_err();
        assert!(matches!(err, ProvisionError::Config(ref m) if m.contains("prt.json")), "{err:?}");

        let bad = tmp.path().join("prt.json");
        fs::write(&bad, b"{ not json").unwrap();
        let err = ProvisionConfig::load(&bad).unwrap_err();
        assert!(matches!(err, ProvisionError::Config(_)), "{err:?}");
    }

    #[test]
    fn bad_env_version_is_config_error() {
        let mut cfg = ProvisionConfig::default();
        let err = cfg
            .apply_env_from(|k| (k == "PRT_VERSION").then(|| "two".to_string()))
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Config(_)));
    }

    #[test]
    fn default_allow_list_is_platform_specific() {
        let win = ExtensionAllowList::defaults_for(PackagePlatform::WindowsX64);
        assert!(win.contains("com.esri.prt.codecs.dll"));
        assert!(win.contains("VueExport.dll"));
        let mac = ExtensionAllowList::defaults_for(PackagePlatform::MacX64);
        assert!(mac.contains("libcom.esri.prt.adaptors.dylib"));
        assert!(!mac.contains("com.esri.prt.adaptors.dll"));
    }

    #[test]
    fn explicit_allow_list_wins() {
        let cfg = ProvisionConfig {
            extension_allow_list: Some(vec!["ext-a.dll".into()]),
            ..ProvisionConfig::default()
        };
        let allow = cfg.allow_list(PackagePlatform::WindowsX64);
        assert!(allow.contains("ext-a.dll"));
        assert!(!allow.contains("com.esri.prt.codecs.dll"));
    }
}
