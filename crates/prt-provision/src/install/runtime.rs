use crate::config::{ExtensionAllowList, ProvisionConfig};
use crate::errors::Result;
use crate::manifest::verify::verify_archive_sha256;
use crate::manifest::{write_manifest, InstallManifest};
use crate::net::{archive_file_name, archive_stem, archive_url, fetch_archive, HttpTransport, Transport};
use crate::paths::InstallLayout;
use crate::platform::{PackagePlatform, VersionSource};
use crate::state::{ProvisionState, StateTrail};
use crate::types::{Kind, RuntimeDependency};
use crate::version::{probe, write_stamp, ProbeResult};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use super::classify::{classify, prune_unused, PackageTree};
use super::copy::{copy_file, copy_tree, ensure_tree_unlocked, locked_or_io, CopyPolicy, CopyStats};
use super::unzip::extract;

/// Progress lines: `info` when the run is verbose, `debug` otherwise.
macro_rules! progress {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub manifest: InstallManifest,
    pub trail: StateTrail,
    /// File copies into the install layout and the staging directory.
    pub copies: CopyStats,
    /// Unused extension libraries deleted from the extracted package.
    pub pruned: usize,
}

impl ProvisionReport {
    /// True when this run had to download and install the package.
    pub fn installed_package(&self) -> bool {
        self.trail.states().contains(&ProvisionState::Installing)
    }
}

/// Drives one provisioning run against an install root.
pub struct Provisioner<T: Transport> {
    config: ProvisionConfig,
    platform: PackagePlatform,
    allow: ExtensionAllowList,
    layout: InstallLayout,
    transport: T,
}

impl Provisioner<HttpTransport> {
    /// Provisioner that downloads over HTTPS (or copies `file://` URLs).
    pub fn new(config: ProvisionConfig) -> Result<Self> {
        let transport = HttpTransport::new(
            Duration::from_secs(config.download.timeout_secs),
            config.offline,
        )?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> Provisioner<T> {
    pub fn with_transport(config: ProvisionConfig, transport: T) -> Result<Self> {
        let platform = config.resolve_platform()?;
        let allow = config.allow_list(platform);
        let layout = InstallLayout::new(&config.install_root, platform, &config.core_runtime);
        Ok(Self {
            config,
            platform,
            allow,
            layout,
            transport,
        })
    }

    pub fn platform(&self) -> PackagePlatform {
        self.platform
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn download_url(&self) -> String {
        archive_url(
            &self.config.base_url,
            &self.config.package,
            self.config.version,
            self.platform,
        )
    }

    /// Compare what is installed to the configured version, without touching anything.
    pub fn probe_installed(&self) -> Result<ProbeResult> {
        if !self.layout.dirs_present() {
            return Ok(ProbeResult::Missing);
        }
        probe(&self.layout.core_runtime, self.platform, self.config.version)
    }

    /// Make sure the configured package version is installed and return its
    /// dependency set. Reinstalls on a missing or mismatched package; otherwise
    /// only enumerates the installed tree.
    pub fn provision(&self) -> Result<ProvisionReport> {
        let verbose = self.config.verbose;
        let mut trail = StateTrail::new();
        let mut copies = CopyStats::default();
        let mut pruned = 0;

        let found = if self.config.force {
            progress!(verbose, "forced reinstall of PRT {}", self.config.version);
            ProbeResult::Missing
        } else {
            self.probe_installed()?
        };

        match found {
            ProbeResult::Match => {
                progress!(verbose, "PRT {} already installed", self.config.version);
                trail.advance(ProvisionState::UpToDate);
            }
            ProbeResult::Missing => {
                progress!(verbose, "PRT not found in {}", self.layout.root.display());
                trail.advance(ProvisionState::Missing);
            }
            ProbeResult::Mismatch(found) => {
                progress!(
                    verbose,
                    "PRT {found} installed, {} required",
                    self.config.version
                );
                trail.advance(ProvisionState::VersionMismatch { found });
            }
        }

        if trail.current() != ProvisionState::UpToDate {
            trail.advance(ProvisionState::Installing);
            match self.install(&mut copies) {
                Ok(n) => pruned = n,
                Err(e) => {
                    trail.advance(ProvisionState::Failed);
                    tracing::error!("PRT installation failed: {e}");
                    return Err(e);
                }
            }
        }

        let manifest = match self.finish(&mut copies) {
            Ok(m) => m,
            Err(e) => {
                if trail.current() == ProvisionState::Installing {
                    trail.advance(ProvisionState::Failed);
                }
                return Err(e);
            }
        };
        trail.advance(ProvisionState::Installed);

        Ok(ProvisionReport {
            manifest,
            trail,
            copies,
            pruned,
        })
    }

    fn finish(&self, copies: &mut CopyStats) -> Result<InstallManifest> {
        let manifest = self.build_manifest(copies)?;
        if let Some(path) = &self.config.manifest_file {
            write_manifest(path, &manifest)?;
            progress!(self.config.verbose, "wrote manifest to {}", path.display());
        }
        Ok(manifest)
    }

    fn copy_policy(&self) -> CopyPolicy {
        if self.config.force {
            CopyPolicy::Always
        } else {
            CopyPolicy::IfNewer
        }
    }

    /// Replace the installed package with a freshly downloaded one.
    /// Returns the number of unused extension libraries pruned.
    fn install(&self, copies: &mut CopyStats) -> Result<usize> {
        let cfg = &self.config;
        let verbose = cfg.verbose;
        let layout = &self.layout;
        let policy = self.copy_policy();

        fs::create_dir_all(&layout.root)?;
        let old_tree = [&layout.lib_dir, &layout.bin_dir, &layout.include_dir];
        // check every old file before deleting any
        for dir in old_tree {
            ensure_tree_unlocked(dir)?;
        }
        for dir in old_tree {
            remove_dir_if_present(dir)?;
        }

        let url = self.download_url();
        let file_name = archive_file_name(&cfg.package, cfg.version, self.platform);
        let stem = archive_stem(&cfg.package, cfg.version, self.platform);
        // archive and extracted tree both live here; removed on every exit
        let scratch = tempfile::Builder::new()
            .prefix(&format!("{stem}-"))
            .tempdir_in(&layout.root)?;

        progress!(verbose, "downloading {url}");
        let archive = fetch_archive(
            &self.transport,
            &url,
            scratch.path(),
            &file_name,
            &cfg.download,
        )?;
        if let Some(want) = &cfg.download.sha256 {
            verify_archive_sha256(&archive, want)?;
        }

        let strategy = cfg.unpack_strategy(self.platform);
        progress!(verbose, "extracting {} ({strategy:?})", archive.display());
        let package_root = extract(strategy, &archive, &scratch.path().join(&stem))?;

        let tree = PackageTree::extracted(&package_root);
        let files = classify(&tree, self.platform, &self.allow)?;
        for f in files.iter().filter(|f| f.kind.is_installed()) {
            let dir = match f.kind {
                Kind::ExtensionRuntime => &layout.lib_dir,
                _ => &layout.bin_dir,
            };
            copies.record(copy_file(&f.path, &dir.join(&f.relative), policy)?);
        }
        let pruned = prune_unused(&files, &tree, self.platform)?;
        if !pruned.is_empty() {
            progress!(verbose, "removed {} unused extension libraries", pruned.len());
        }

        let include = package_root.join("include");
        if include.is_dir() {
            copy_tree(&include, &layout.include_dir, policy, copies)?;
        }

        // an installed set is recognized by both directories existing
        fs::create_dir_all(&layout.lib_dir)?;
        fs::create_dir_all(&layout.bin_dir)?;

        if !layout.core_runtime.is_file() {
            tracing::warn!(
                "package did not contain {}; the next run will reinstall",
                layout.core_runtime.display()
            );
        } else if self.platform.version_source() == VersionSource::Stamp {
            write_stamp(&layout.core_runtime, cfg.version)?;
        }

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            tracing::warn!("could not remove scratch {}: {e}", scratch_path.display());
        }

        progress!(verbose, "installed PRT {} into {}", cfg.version, layout.root.display());
        Ok(pruned.len())
    }

    /// Enumerate the installed tree into a manifest, staging runtime
    /// libraries first when a staging directory is configured.
    fn build_manifest(&self, copies: &mut CopyStats) -> Result<InstallManifest> {
        let tree = PackageTree {
            lib: self.layout.lib_dir.clone(),
            bin: self.layout.bin_dir.clone(),
        };
        let files = classify(&tree, self.platform, &self.allow)?;
        let staging = self.config.staging_dir.as_deref();
        let policy = self.copy_policy();

        let mut runtime_dependencies = Vec::new();
        let mut import_libraries = Vec::new();
        for f in files {
            match f.kind {
                Kind::CoreRuntime | Kind::ExtensionRuntime => {
                    let path = match staging {
                        Some(dir) => {
                            let staged = dir.join(&f.file_name);
                            copies.record(copy_file(&f.path, &staged, policy)?);
                            staged
                        }
                        None => f.path,
                    };
                    runtime_dependencies.push(RuntimeDependency {
                        path,
                        delay_load: f.file_name,
                    });
                }
                Kind::ImportLib => import_libraries.push(f.path),
                Kind::Unused => {}
            }
        }

        Ok(InstallManifest {
            version: self.config.version,
            platform: self.platform.name().to_string(),
            runtime_dependencies,
            import_libraries,
            include_paths: vec![self.layout.include_dir.clone()],
            runtime_library_paths: staging.map(Path::to_path_buf).into_iter().collect(),
        })
    }
}

fn remove_dir_if_present(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            tracing::debug!("removed {}", dir.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(locked_or_io(dir, e)),
    }
}
