use crate::errors::{ProvisionError, Result};
use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

const ERROR_SHARING_VIOLATION: i32 = 0x20;
const ERROR_LOCK_VIOLATION: i32 = 0x21;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyPolicy {
    /// Copy when the destination is missing or older than the source.
    IfNewer,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    Skipped,
}

/// Copies done and skipped during one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub copied: usize,
    pub skipped: usize,
}

impl CopyStats {
    pub fn record(&mut self, outcome: CopyOutcome) {
        match outcome {
            CopyOutcome::Copied => self.copied += 1,
            CopyOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Copy `src` to `dst` under `policy`.
///
/// The new contents are written to a sibling temp file and renamed over
/// `dst`, so `dst` is either fully replaced or left untouched. A destination
/// held open by another process fails with [`ProvisionError::FileLocked`].
pub fn copy_file(src: &Path, dst: &Path, policy: CopyPolicy) -> Result<CopyOutcome> {
    let dst_exists = dst.is_file();
    if dst_exists && policy == CopyPolicy::IfNewer && !is_newer(src, dst)? {
        return Ok(CopyOutcome::Skipped);
    }

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    if dst_exists {
        ensure_unlocked(dst)?;
    }

    let tmp = temp_sibling(dst);
    if let Err(e) = fs::copy(src, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp, dst) {
        let _ = fs::remove_file(&tmp);
        return Err(locked_or_io(dst, e));
    }
    Ok(CopyOutcome::Copied)
}

/// Recursively copy a directory tree file by file.
pub fn copy_tree(src: &Path, dst: &Path, policy: CopyPolicy, stats: &mut CopyStats) -> Result<()> {
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let to = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&to)?;
        } else {
            stats.record(copy_file(entry.path(), &to, policy)?);
        }
    }
    Ok(())
}

/// Fail with [`ProvisionError::FileLocked`] if any file below `dir` is held
/// by another process. A missing `dir` is fine.
pub fn ensure_tree_unlocked(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            ensure_unlocked(entry.path())?;
        }
    }
    Ok(())
}

/// Creation time, or modification time where the filesystem keeps no birth time.
fn stamp_of(path: &Path) -> io::Result<SystemTime> {
    let meta = fs::metadata(path)?;
    meta.created().or_else(|_| meta.modified())
}

fn is_newer(src: &Path, dst: &Path) -> Result<bool> {
    Ok(stamp_of(src)? > stamp_of(dst)?)
}

/// Probe for another process holding `dst`: open it for writing (without
/// truncating) and try to take an exclusive lock.
fn ensure_unlocked(dst: &Path) -> Result<()> {
    let f = OpenOptions::new()
        .write(true)
        .open(dst)
        .map_err(|e| locked_or_io(dst, e))?;
    f.try_lock_exclusive().map_err(|e| locked_or_io(dst, e))?;
    f.unlock()?;
    Ok(())
}

pub(crate) fn locked_or_io(dst: &Path, e: io::Error) -> ProvisionError {
    if is_lock_violation(&e) {
        ProvisionError::FileLocked {
            path: dst.to_path_buf(),
        }
    } else {
        ProvisionError::Io(e)
    }
}

pub fn is_lock_violation(e: &io::Error) -> bool {
    let code = e.raw_os_error();
    if cfg!(windows) && matches!(code, Some(ERROR_SHARING_VIOLATION | ERROR_LOCK_VIOLATION)) {
        return true;
    }
    code.is_some() && code == fs2::lock_contended_error().raw_os_error()
}

fn temp_sibling(dst: &Path) -> PathBuf {
    let mut name = std::ffi::OsString::from(".");
    name.push(dst.file_name().unwrap_or_default());
    name.push(".partial");
    dst.with_file_name(name)
}
