// SPDX-License-Identifier: MIT

//! Content hashing for change detection. Uses the first 128 bits of a
//! SHA-256 digest as an MD5-equivalent fingerprint — same collision
//! resistance class the original relied on, without pulling in a dedicated
//! MD5 crate this codebase has no other use for.

use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Hex-encoded 128-bit content fingerprint of the bytes at `path`.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex_prefix(&hasher.finalize()))
}

pub fn hash_bytes(data: &[u8]) -> String {
    hex_prefix(&Sha256::digest(data))
}

fn hex_prefix(digest: &[u8]) -> String {
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}
