//! Minimal reader for the `VS_VERSIONINFO` resource of a PE image.
//!
//! Instead of walking the resource directory we scan for the two pieces we
//! need: the `VS_FIXEDFILEINFO` block (found by its signature) for the file
//! major/minor, and the `ProductVersion` entry of the `StringFileInfo` table.

use super::EmbeddedVersion;
use crate::errors::{ProvisionError, Result};
use std::fs;
use std::path::Path;

const FIXED_FILE_INFO_SIGNATURE: u32 = 0xFEEF_04BD;
const PRODUCT_VERSION_KEY: &str = "ProductVersion";
// wLength + wValueLength + wType in front of every String entry
const STRING_HEADER_LEN: usize = 6;

pub fn read_pe_version(path: &Path) -> Result<EmbeddedVersion> {
    let bytes = fs::read(path)?;
    parse_version_resource(&bytes).map_err(|reason| ProvisionError::parse(path, reason))
}

fn parse_version_resource(bytes: &[u8]) -> std::result::Result<EmbeddedVersion, String> {
    let sig = find(bytes, &FIXED_FILE_INFO_SIGNATURE.to_le_bytes())
        .ok_or("no VS_FIXEDFILEINFO block")?;
    // dwSignature, dwStrucVersion, dwFileVersionMS
    let file_version_ms = read_u32(bytes, sig + 8).ok_or("truncated VS_FIXEDFILEINFO")?;

    let key = utf16_with_nul(PRODUCT_VERSION_KEY);
    let key_at = find(&bytes[sig..], &key)
        .map(|i| sig + i)
        .filter(|&i| i >= STRING_HEADER_LEN)
        .ok_or("no ProductVersion string")?;
    let entry_start = key_at - STRING_HEADER_LEN;
    let value_words = read_u16(bytes, entry_start + 2).ok_or("truncated ProductVersion")? as usize;
    if value_words == 0 {
        return Err("empty ProductVersion".to_string());
    }

    // the value starts at the next 32-bit boundary of the entry
    let mut value_at = key_at + key.len();
    value_at += (4 - (value_at - entry_start) % 4) % 4;

    let mut units = Vec::with_capacity(value_words);
    for i in 0..value_words {
        match read_u16(bytes, value_at + i * 2) {
            Some(0) => break,
            Some(u) => units.push(u),
            None => return Err("truncated ProductVersion".to_string()),
        }
    }
    let product_version =
        String::from_utf16(&units).map_err(|_| "ProductVersion is not valid UTF-16".to_string())?;

    Ok(EmbeddedVersion {
        file_major: file_version_ms >> 16,
        file_minor: file_version_ms & 0xFFFF,
        product_version,
    })
}

fn utf16_with_nul(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let b = bytes.get(at..at + 2)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 4)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn fake_version_image(major: u32, minor: u32, product_version: &str) -> Vec<u8> {
        let mut out = b"MZ\x90\x00".to_vec();
        out.resize(64, 0xCC);

        // VS_FIXEDFILEINFO: 13 DWORDs
        let mut fixed = [0u32; 13];
        fixed[0] = FIXED_FILE_INFO_SIGNATURE;
        fixed[1] = 0x0001_0000;
        fixed[2] = (major << 16) | minor;
        fixed[4] = (major << 16) | minor;
        for dw in fixed {
            out.extend_from_slice(&dw.to_le_bytes());
        }

        // an unrelated String entry first, like CompanyName
        push_string_entry(&mut out, "CompanyName", "Esri R&D Center Zurich");
        push_string_entry(&mut out, PRODUCT_VERSION_KEY, product_version);
        out.extend_from_slice(&[0u8; 16]);
        out
    }

    fn push_string_entry(out: &mut Vec<u8>, key: &str, value: &str) {
        while out.len() % 4 != 0 {
            out.push(0);
        }
        let start = out.len();
        let value_words = value.encode_utf16().count() + 1;
        out.extend_from_slice(&[0, 0]); // wLength, patched below
        out.extend_from_slice(&(value_words as u16).to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&utf16_with_nul(key));
        while (out.len() - start) % 4 != 0 {
            out.push(0);
        }
        out.extend_from_slice(&utf16_with_nul(value));
        let len = (out.len() - start) as u16;
        out[start..start + 2].copy_from_slice(&len.to_le_bytes());
    }

    #[test]
    fn reads_fixed_info_and_product_version() {
        let img = fake_version_image(2, 4, "2.4.0 7316");
        let v = parse_version_resource(&img).unwrap();
        assert_eq!(v.file_major, 2);
        assert_eq!(v.file_minor, 4);
        assert_eq!(v.product_version, "2.4.0 7316");
    }

    #[test]
    fn odd_length_values_are_read_whole() {
        // key/value lengths that need alignment padding
        let img = fake_version_image(10, 0, "10.0 build 123");
        let v = parse_version_resource(&img).unwrap();
        assert_eq!(v.file_major, 10);
        assert_eq!(v.product_version, "10.0 build 123");
    }

    #[test]
    fn missing_blocks_are_reported() {
        assert!(parse_version_resource(b"MZ not a versioned image")
            .unwrap_err()
            .contains("VS_FIXEDFILEINFO"));

        let mut img = fake_version_image(2, 1, "2.1.0 5705");
        let key = utf16_with_nul(PRODUCT_VERSION_KEY);
        let at = find(&img, &key).unwrap();
        img[at] = b'X';
        assert!(parse_version_resource(&img)
            .unwrap_err()
            .contains("ProductVersion"));
    }

    #[test]
    fn read_from_file_maps_to_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("plain.dll");
        std::fs::write(&p, b"MZ").unwrap();
        let err = read_pe_version(&p).unwrap_err();
        assert!(matches!(err, ProvisionError::ParseError { .. }));
    }
}
