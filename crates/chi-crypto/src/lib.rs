//! chi-crypto: codec for Tombo CHI encrypted notes
//!
//! Architecture: password → MD5 → Blowfish, chained with a fixed IV
//!
//! Envelope layout:
//! ```text
//! "BF01" || u32 LE plaintext length || CBC_IV="BLOWFISH"(nonce[8] || md5(payload)[16] || payload)
//! ```
//!
//! The format is legacy and weak (unsalted MD5 key, fixed IV, unkeyed
//! checksum). It exists for interoperability with existing note files.

pub mod backend;
pub mod blowfish;
pub mod chain;
pub mod envelope;
pub mod error;
pub mod kdf;
mod pi_tables;

#[cfg(test)]
mod test_vectors;

pub use backend::{Backend, BlockCipher, RustCryptoBlowfish};
pub use crate::blowfish::ReferenceBlowfish;
pub use chain::TailPadding;
pub use envelope::{open, seal, ChiCipher, CodecOptions, EnvelopeHeader, MAGIC};
pub use error::{ChiError, ChiResult};
pub use kdf::derive_key;

/// Blowfish block size in bytes
pub const BLOCK_SIZE: usize = 8;

/// One cipher block
pub type Block = [u8; BLOCK_SIZE];

/// MD5 digest size; also the derived key length
pub const DIGEST_SIZE: usize = 16;

/// Size of the random envelope nonce
pub const NONCE_SIZE: usize = 8;

/// Shortest key the Blowfish schedule accepts
pub const MIN_KEY_LEN: usize = 4;

/// Longest key the Blowfish schedule accepts
pub const MAX_KEY_LEN: usize = 56;
