#![allow(dead_code)]

use prt_provision::{PackagePlatform, ProvisionConfig, Result, Transport, UnpackStrategy};
use std::cell::Cell;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;

/// Serves a fixture archive from disk and counts downloads.
pub struct FixtureTransport {
    archive: PathBuf,
    calls: Cell<u32>,
}

impl FixtureTransport {
    pub fn new(archive: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }

    pub fn serve(&mut self, archive: impl Into<PathBuf>) {
        self.archive = archive.into();
    }
}

impl Transport for FixtureTransport {
    fn download(&self, _url: &str, dest: &Path) -> Result<u64> {
        self.calls.set(self.calls.get() + 1);
        Ok(fs::copy(&self.archive, dest)?)
    }
}

/// Windows package config that unpacks in-process so it runs on any host.
pub fn windows_config(root: &Path) -> ProvisionConfig {
    let mut cfg = ProvisionConfig::new(root);
    cfg.platform = Some(PackagePlatform::WindowsX64);
    cfg.unpack = Some(UnpackStrategy::Builtin);
    cfg.download.backoff_ms = 1;
    cfg
}

pub fn write_zip(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let mut w = zip::ZipWriter::new(fs::File::create(path).unwrap());
    for (name, data) in entries {
        w.start_file(*name, FileOptions::default()).unwrap();
        w.write_all(data).unwrap();
    }
    w.finish().unwrap();
}

/// A Windows SDK package whose core runtime reports version `major.minor.build`.
pub fn windows_package(path: &Path, major: u32, minor: u32, build: u32, extensions: &[&str]) {
    let mut entries = vec![
        (
            "bin/com.esri.prt.core.dll".to_string(),
            version_image(major, minor, &format!("{major}.{minor}.0 {build}")),
        ),
        ("bin/com.esri.prt.core.lib".to_string(), b"import".to_vec()),
        ("bin/glutess.dll".to_string(), b"glutess".to_vec()),
        ("include/prt/API.h".to_string(), b"// prt api".to_vec()),
        ("include/prtx/Extension.h".to_string(), b"// prtx".to_vec()),
    ];
    for ext in extensions {
        entries.push((format!("lib/{ext}"), ext.as_bytes().to_vec()));
    }
    let borrowed: Vec<(&str, Vec<u8>)> = entries
        .iter()
        .map(|(n, d)| (n.as_str(), d.clone()))
        .collect();
    write_zip(path, &borrowed);
}

/// Bytes carrying a `VS_VERSIONINFO` fixed block and a `ProductVersion` string.
pub fn version_image(major: u32, minor: u32, product_version: &str) -> Vec<u8> {
    let mut out = b"MZ\x90\x00".to_vec();
    out.resize(128, 0);

    let mut fixed = [0u32; 13];
    fixed[0] = 0xFEEF_04BD;
    fixed[1] = 0x0001_0000;
    fixed[2] = (major << 16) | minor;
    for dw in fixed {
        out.extend_from_slice(&dw.to_le_bytes());
    }

    while out.len() % 4 != 0 {
        out.push(0);
    }
    let start = out.len();
    let value_words = product_version.encode_utf16().count() + 1;
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(&(value_words as u16).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&utf16z("ProductVersion"));
    while (out.len() - start) % 4 != 0 {
        out.push(0);
    }
    out.extend_from_slice(&utf16z(product_version));
    let len = (out.len() - start) as u16;
    out[start..start + 2].copy_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&[0u8; 16]);
    out
}

fn utf16z(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Everything left directly below `dir`, by name.
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
