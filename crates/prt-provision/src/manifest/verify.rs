use crate::errors::{ProvisionError, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Verify the sha256 of a downloaded archive against the configured digest.
pub fn verify_archive_sha256(archive: &Path, want: &str) -> Result<()> {
    let got = sha256_file(archive)?;
    let want = want.trim().to_lowercase();

    if got != want {
        return Err(ProvisionError::ChecksumMismatch {
            file: archive
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            got,
            want,
        });
    }
    Ok(())
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut f = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
