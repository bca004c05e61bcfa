//! SHA-256 helpers.

use sha2::{Digest, Sha256};

pub const HASH_LEN: usize = 32;

/// SHA-256 of `data`.
pub fn hash256(data: &[u8]) -> [u8; HASH_LEN] {
    Sha256::digest(data).into()
}
