//! Checksum sidecar parsing and hex digest helpers (SHA-256, SHA-1, MD5).

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Extract the hash from the content of a checksum sidecar file.
///
/// Only the first non-blank line is considered. Three layouts exist in the
/// wild:
/// - `MD5 (my-lib.jar) = 5eb63bbb...`: take the suffix after the last space
/// - `5eb63bbb...  my-lib.jar`: take the prefix before the first space
/// - `5eb63bbb...`: take the whole trimmed line
pub fn parse_checksum(content: &str) -> Option<String> {
    let line = content.lines().find(|l| !l.trim().is_empty())?.trim();

    if let Some(pos) = line.rfind(' ') {
        let (head, tail) = line.split_at(pos);
        let tail = &tail[1..];
        if head.trim_end().ends_with('=') && is_hex(tail) {
            return Some(tail.to_string());
        }
    }

    match line.split_once(' ') {
        Some((head, _)) => Some(head.to_string()),
        None => Some(line.to_string()),
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Lowercase hex rendering, two characters per byte, no separators.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_hash() {
        assert_eq!(parse_checksum("abc123\n").as_deref(), Some("abc123"));
    }

    #[test]
    fn hash_then_filename() {
        assert_eq!(
            parse_checksum("abc123  my-lib-1.0.jar\n").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn bsd_style_suffix() {
        assert_eq!(
            parse_checksum("MD5 (my-lib-1.0.jar) = 5eb63bbbe01eeed0\n").as_deref(),
            Some("5eb63bbbe01eeed0")
        );
    }

    #[test]
    fn bsd_style_requires_hex_suffix() {
        // The part after "= " is not hex, so fall back to first-space split.
        assert_eq!(
            parse_checksum("X = not-hex-here").as_deref(),
            Some("X")
        );
    }

    #[test]
    fn skips_blank_lines() {
        assert_eq!(parse_checksum("\n\n  \nabc123").as_deref(), Some("abc123"));
        assert_eq!(parse_checksum("   \n"), None);
    }

    #[test]
    fn sha256_known_value() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn sha1_known_value() {
        assert_eq!(
            sha1_hex(b"hello world"),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
    }

    #[test]
    fn md5_known_value() {
        assert_eq!(md5_hex(b"hello world"), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn hex_is_lowercase_two_chars_per_byte() {
        assert_eq!(to_hex(&[0x00, 0xff, 0x0a]), "00ff0a");
    }
}
