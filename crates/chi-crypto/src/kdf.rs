//! Key derivation: MD5(password) → Blowfish key
//!
//! The CHI format keys the cipher with the raw MD5 digest of the password:
//! no salt, no iterations. Files written by other tools depend on exactly
//! this, so it must not be strengthened here.

use md5::{Digest, Md5};
use zeroize::Zeroizing;

use crate::DIGEST_SIZE;

/// Derive the 128-bit Blowfish key for `password`. Wiped when dropped.
pub fn derive_key(password: &[u8]) -> Zeroizing<[u8; DIGEST_SIZE]> {
    Zeroizing::new(md5_digest(password))
}

/// MD5 digest, used both for key derivation and for the payload checksum.
pub fn md5_digest(data: &[u8]) -> [u8; DIGEST_SIZE] {
    let mut out = [0u8; DIGEST_SIZE];
    out.copy_from_slice(&Md5::digest(data));
    out
}
