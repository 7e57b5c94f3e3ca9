use crate::errors::{ProvisionError, Result};
use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::Url;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Something that can put the bytes behind a URL into a local file.
pub trait Transport {
    /// Download `url` to `dest`, returning the number of bytes written.
    /// `dest` must not be left half-written on failure.
    fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        (**self).download(url, dest)
    }
}

/// Blocking HTTPS with rustls; `file://` URLs are copied from disk.
pub struct HttpTransport {
    client: Client,
    offline: bool,
}

impl HttpTransport {
    pub fn new(timeout: Duration, offline: bool) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, offline })
    }
}

impl Transport for HttpTransport {
    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        if url.starts_with("file:") {
            return copy_local(url, dest);
        }
        if self.offline {
            return Err(ProvisionError::network(
                url,
                "offline mode is enabled and the package is not installed",
            ));
        }
        download_to_path(&self.client, url, dest)
    }
}

/// Local path of a `file://` URL (`file:///C:/x.zip` is `C:\x.zip` on Windows).
pub fn file_url_path(url: &str) -> Result<PathBuf> {
    let parsed = Url::parse(url).map_err(|e| ProvisionError::network(url, e))?;
    parsed
        .to_file_path()
        .map_err(|()| ProvisionError::network(url, "not a local file URL"))
}

fn copy_local(url: &str, dest: &Path) -> Result<u64> {
    let src = file_url_path(url)?;
    let file = fs::File::open(&src).map_err(|e| ProvisionError::network(url, e))?;
    let expected_len = file.metadata().ok().map(|m| m.len());
    write_body(url, file, expected_len, dest)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Stream `url` into `<dest>.part`, then rename into place.
pub fn download_to_path(client: &Client, url: &str, dest: &Path) -> Result<u64> {
    let resp = client
        .get(url)
        .send()
        .with_context(|| format!("GET {url}"))?;
    if !resp.status().is_success() {
        return Err(ProvisionError::network(
            url,
            format!("download failed: {}", resp.status()),
        ));
    }
    let expected_len = resp.content_length();
    write_body(url, resp, expected_len, dest)
}

/// Write `body` to `<dest>.part` and rename it over `dest` only when the
/// byte count matches `expected_len`. On any failure `dest` is untouched
/// and the `.part` file is gone.
fn write_body(
    url: &str,
    mut body: impl Read,
    expected_len: Option<u64>,
    dest: &Path,
) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let part = part_path(dest);
    let written = match stream_body(&mut body, &part) {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&part);
            return Err(ProvisionError::network(url, e));
        }
    };

    if let Some(want) = expected_len {
        if written != want {
            let _ = fs::remove_file(&part);
            return Err(ProvisionError::network(
                url,
                format!("partial download: got {written} of {want} bytes"),
            ));
        }
    }

    fs::rename(&part, dest)?;
    Ok(written)
}

fn stream_body(body: &mut impl Read, part: &Path) -> std::io::Result<u64> {
    let mut out = fs::File::create(part)?;
    let mut buf = [0u8; 128 * 1024];
    let mut total = 0u64;

    loop {
        let n = body.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
        total += n as u64;
    }
    out.flush()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn file_urls_copy_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("mirror").join("pkg.zip");
        fs::create_dir_all(src.parent().unwrap()).unwrap();
        fs::write(&src, b"zip-bytes").unwrap();

        let t = HttpTransport::new(Duration::from_secs(5), true).unwrap();
        let dest = tmp.path().join("dl").join("pkg.zip");
        let url = format!("file://{}", src.display());
        assert_eq!(t.download(&url, &dest).unwrap(), 9);
        assert_eq!(fs::read(&dest).unwrap(), b"zip-bytes");
    }

    #[test]
    fn offline_refuses_remote_urls() {
        let tmp = tempfile::tempdir().unwrap();
        let t = HttpTransport::new(Duration::from_secs(5), true).unwrap();
        let err = t
            .download("https://example.invalid/pkg.zip", &tmp.path().join("pkg.zip"))
            .unwrap_err();
        assert!(matches!(err, ProvisionError::NetworkFailure { .. }));
        assert!(!tmp.path().join("pkg.zip").exists());
    }

    #[test]
    fn short_body_is_partial_download() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("pkg.zip");
        let body = Cursor::new(vec![7u8; 10]);

        let err = write_body("https://x/pkg.zip", body, Some(64), &dest).unwrap_err();
        assert!(err.is_transient());
        match err {
            ProvisionError::NetworkFailure { reason, .. } => {
                assert!(reason.contains("got 10 of 64"), "{reason}")
            }
            other => panic!("expected NetworkFailure, got {other:?}"),
        }
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }

    #[test]
    fn full_body_replaces_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("pkg.zip");
        fs::write(&dest, b"stale").unwrap();

        let n = write_body("https://x/pkg.zip", Cursor::new(b"fresh!".to_vec()), Some(6), &dest)
            .unwrap();
        assert_eq!(n, 6);
        assert_eq!(fs::read(&dest).unwrap(), b"fresh!");
        assert!(!part_path(&dest).exists());

        // servers without Content-Length are taken at their word
        write_body("https://x/pkg.zip", Cursor::new(b"abc".to_vec()), None, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"abc");
    }

    #[test]
    fn missing_local_mirror_leaves_no_partial_file() {
        let tmp = tempfile::tempdir().unwrap();
        let t = HttpTransport::new(Duration::from_secs(5), true).unwrap();
        let dest = tmp.path().join("pkg.zip");
        let url = format!("file://{}", tmp.path().join("nope.zip").display());
        let err = t.download(&url, &dest).unwrap_err();
        assert!(matches!(err, ProvisionError::NetworkFailure { .. }));
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }

    #[cfg(unix)]
    #[test]
    fn file_urls_are_decoded() {
        assert_eq!(
            file_url_path("file:///srv/mirror/esri%20sdk/pkg.zip").unwrap(),
            Path::new("/srv/mirror/esri sdk/pkg.zip")
        );
    }

    #[cfg(windows)]
    #[test]
    fn file_urls_keep_drive_letters() {
        assert_eq!(
            file_url_path("file:///C:/mirror/pkg.zip").unwrap(),
            Path::new(r"C:\mirror\pkg.zip")
        );
    }

    #[test]
    fn part_file_is_sibling() {
        assert_eq!(part_path(Path::new("/a/b.zip")), Path::new("/a/b.zip.part"));
    }
}
