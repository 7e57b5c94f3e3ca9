use crate::config::ExtensionAllowList;
use crate::errors::Result;
use crate::platform::PackagePlatform;
use crate::types::{Kind, LibraryFile};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// The two subtrees that hold libraries: `bin/` (core runtime and import
/// stubs) and `lib/` (extensions). Either may be absent.
#[derive(Debug, Clone)]
pub struct PackageTree {
    pub lib: PathBuf,
    pub bin: PathBuf,
}

impl PackageTree {
    /// Layout of an unpacked archive.
    pub fn extracted(root: &Path) -> Self {
        Self {
            lib: root.join("lib"),
            bin: root.join("bin"),
        }
    }
}

#[derive(Clone, Copy)]
enum Subtree {
    Lib,
    Bin,
}

/// Classify every file below `tree.bin` and `tree.lib`, in sorted order.
/// Each file gets exactly one kind.
pub fn classify(
    tree: &PackageTree,
    platform: PackagePlatform,
    allow: &ExtensionAllowList,
) -> Result<Vec<LibraryFile>> {
    let mut files = Vec::new();
    for (root, subtree) in [(&tree.bin, Subtree::Bin), (&tree.lib, Subtree::Lib)] {
        for path in walk_files(root)? {
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let kind = kind_of(subtree, &file_name, platform, allow);
            if kind == Kind::Unused {
                tracing::debug!(file = %relative.display(), "not installed");
            }
            files.push(LibraryFile {
                path,
                relative,
                file_name,
                kind,
            });
        }
    }
    Ok(files)
}

fn kind_of(
    subtree: Subtree,
    file_name: &str,
    platform: PackagePlatform,
    allow: &ExtensionAllowList,
) -> Kind {
    let dynamic = platform.is_dynamic_lib(file_name);
    match subtree {
        Subtree::Bin if dynamic => Kind::CoreRuntime,
        Subtree::Bin if platform.is_import_lib(file_name) => Kind::ImportLib,
        Subtree::Lib if dynamic && allow.contains(file_name) => Kind::ExtensionRuntime,
        Subtree::Lib if dynamic => Kind::Unused,
        _ => {
            tracing::debug!("unrecognized file {file_name:?}, leaving it out");
            Kind::Unused
        }
    }
}

/// Unused extension libraries: dynamic libraries below `lib/` that the
/// allow list does not name.
pub fn is_unused_extension(file: &LibraryFile, tree: &PackageTree, platform: PackagePlatform) -> bool {
    file.kind == Kind::Unused && file.path.starts_with(&tree.lib) && platform.is_dynamic_lib(&file.file_name)
}

/// Delete unused extension libraries from the source tree; returns what was removed.
pub fn prune_unused(
    files: &[LibraryFile],
    tree: &PackageTree,
    platform: PackagePlatform,
) -> Result<Vec<PathBuf>> {
    let mut pruned = Vec::new();
    for f in files.iter().filter(|f| is_unused_extension(f, tree, platform)) {
        match fs::remove_file(&f.path) {
            Ok(()) => pruned.push(f.path.clone()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(pruned)
}

/// All regular files below `root`, sorted; a missing root yields nothing.
pub fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}
