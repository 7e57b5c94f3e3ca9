use crate::errors::{ProvisionError, Result};
use crate::platform::UnpackStrategy;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use zip::ZipArchive;

/// Unpack `archive` into `dest` and return the package root inside it.
/// Blocks until the unpack command exits.
pub fn extract(strategy: UnpackStrategy, archive: &Path, dest: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dest)?;
    match strategy {
        UnpackStrategy::Builtin => unzip_into(archive, dest).map_err(|e| match e {
            ProvisionError::Zip(z) => extraction_failure(archive, "builtin unzip", z),
            other => other,
        })?,
        UnpackStrategy::ExpandArchive => run_unpacker(archive, expand_archive_command(archive, dest))?,
        UnpackStrategy::Unzip => run_unpacker(archive, unzip_command(archive, dest))?,
    }
    Ok(package_root(dest))
}

pub fn unzip_into(zip_path: &Path, dest: &Path) -> Result<()> {
    let f = fs::File::open(zip_path)?;
    let mut archive = ZipArchive::new(f)?;
    fs::create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let outpath = dest.join(file.mangled_name());
        if file.name().ends_with('/') {
            fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = fs::File::create(&outpath)?;
            std::io::copy(&mut file, &mut out)?;
        }
    }
    Ok(())
}

fn expand_archive_command(archive: &Path, dest: &Path) -> Command {
    let script = format!(
        "$ErrorActionPreference = 'Stop'; & {{ Expand-Archive -LiteralPath '{}' -DestinationPath '{}' -Force }}",
        ps_quote(archive),
        ps_quote(dest)
    );
    let mut cmd = Command::new("powershell");
    cmd.args(["-NoProfile", "-NonInteractive", "-Command", &script]);
    cmd
}

fn unzip_command(archive: &Path, dest: &Path) -> Command {
    let mut cmd = Command::new("unzip");
    cmd.arg("-q").arg(archive).arg("-d").arg(dest);
    cmd
}

// single-quoted PowerShell strings escape ' as ''
fn ps_quote(p: &Path) -> String {
    p.display().to_string().replace('\'', "''")
}

fn run_unpacker(archive: &Path, mut cmd: Command) -> Result<()> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    let out = cmd
        .output()
        .map_err(|e| extraction_failure(archive, &program, format!("failed to spawn: {e}")))?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(extraction_failure(
            archive,
            &program,
            format!("exited with {}: {}", out.status, stderr.trim()),
        ));
    }
    Ok(())
}

fn extraction_failure(archive: &Path, command: &str, detail: impl ToString) -> ProvisionError {
    ProvisionError::ExtractionFailure {
        archive: archive.to_path_buf(),
        command: command.to_string(),
        detail: detail.to_string(),
    }
}

/// Archives sometimes wrap everything in one top-level folder; step into it.
fn package_root(dest: &Path) -> PathBuf {
    if dest.join("lib").is_dir() || dest.join("bin").is_dir() {
        return dest.to_path_buf();
    }
    let dirs: Vec<PathBuf> = fs::read_dir(dest)
        .map(|rd| {
            rd.flatten()
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect()
        })
        .unwrap_or_default();
    match dirs.as_slice() {
        [only] => only.clone(),
        _ => dest.to_path_buf(),
    }
}
