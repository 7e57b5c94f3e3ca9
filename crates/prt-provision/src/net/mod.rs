mod download;

pub use download::{download_to_path, HttpTransport, Transport};

use crate::config::DownloadOptions;
use crate::errors::Result;
use crate::platform::PackagePlatform;
use crate::types::PackageVersion;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// `esri_ce_sdk-2.1.5705-win10-vc141-x86_64-rel-opt` (no extension).
pub fn archive_stem(package: &str, version: PackageVersion, platform: PackagePlatform) -> String {
    format!("{package}-{version}-{}", platform.naming_token())
}

pub fn archive_file_name(
    package: &str,
    version: PackageVersion,
    platform: PackagePlatform,
) -> String {
    format!("{}.zip", archive_stem(package, version, platform))
}

/// `{base}/{version}/{archive}`; a trailing `/` on `base_url` is ignored.
pub fn archive_url(
    base_url: &str,
    package: &str,
    version: PackageVersion,
    platform: PackagePlatform,
) -> String {
    format!(
        "{}/{version}/{}",
        base_url.trim_end_matches('/'),
        archive_file_name(package, version, platform)
    )
}

/// Download the package archive into `dir`, retrying transient failures.
pub fn fetch_archive(
    transport: &dyn Transport,
    url: &str,
    dir: &Path,
    file_name: &str,
    opts: &DownloadOptions,
) -> Result<PathBuf> {
    let dest = dir.join(file_name);
    let mut delay = Duration::from_millis(opts.backoff_ms);
    let mut attempt = 0u32;

    loop {
        match transport.download(url, &dest) {
            Ok(bytes) => {
                tracing::debug!(bytes, dest = %dest.display(), "downloaded");
                return Ok(dest);
            }
            Err(e) if e.is_transient() && attempt < opts.retries => {
                attempt += 1;
                tracing::warn!(
                    "download attempt {attempt}/{} failed: {e}; retrying in {delay:?}",
                    opts.retries
                );
                thread::sleep(delay);
                delay = delay.saturating_mul(2);
            }
            Err(e) => return Err(e),
        }
    }
}
