use crate::platform::PackagePlatform;
use dirs::data_dir;
use std::path::{Path, PathBuf};

/// ~/.local/share/PrtProvision   (or platform-equivalent)
pub fn provision_home() -> PathBuf {
    data_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("PrtProvision")
}

/// ~/.local/share/PrtProvision/prt
pub fn default_install_root() -> PathBuf {
    provision_home().join("prt")
}

/// Where an installed package lives below the install root:
///
/// ```text
/// <root>/lib/<platform>/Release/...
/// <root>/bin/<platform>/Release/...
/// <root>/include/...
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    pub root: PathBuf,
    pub lib_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub include_dir: PathBuf,
    pub core_runtime: PathBuf,
}

impl InstallLayout {
    pub fn new(root: &Path, platform: PackagePlatform, core_runtime_stem: &str) -> Self {
        let lib_dir = root.join("lib").join(platform.name()).join("Release");
        let bin_dir = root.join("bin").join(platform.name()).join("Release");
        let core_runtime = bin_dir.join(platform.library_file_name(core_runtime_stem));
        Self {
            root: root.to_path_buf(),
            lib_dir,
            bin_dir,
            include_dir: root.join("include"),
            core_runtime,
        }
    }

    /// Both library directories are present (the core runtime may still be missing).
    pub fn dirs_present(&self) -> bool {
        self.lib_dir.is_dir() && self.bin_dir.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_build_convention() {
        let l = InstallLayout::new(Path::new("/m"), PackagePlatform::WindowsX64, "com.esri.prt.core");
        assert_eq!(l.lib_dir, Path::new("/m/lib/Win64/Release"));
        assert_eq!(l.bin_dir, Path::new("/m/bin/Win64/Release"));
        assert_eq!(l.include_dir, Path::new("/m/include"));
        assert_eq!(l.core_runtime, Path::new("/m/bin/Win64/Release/com.esri.prt.core.dll"));

        let mac = InstallLayout::new(Path::new("/m"), PackagePlatform::MacX64, "com.esri.prt.core");
        assert_eq!(
            mac.core_runtime,
            Path::new("/m/bin/Mac/Release/libcom.esri.prt.core.dylib")
        );
    }
}
