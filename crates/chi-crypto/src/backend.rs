//! Block-cipher backends
//!
//! The codec only ever talks to [`BlockCipher`]. Two interchangeable
//! Blowfish implementations satisfy it:
//! - [`ReferenceBlowfish`]: portable, schedule built in this crate
//! - [`RustCryptoBlowfish`]: the RustCrypto `blowfish` crate
//!
//! The caller picks one with [`Backend`] when building a cipher; nothing is
//! selected globally.

use blowfish::cipher::generic_array::GenericArray;
use blowfish::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use serde::{Deserialize, Serialize};

use crate::blowfish::ReferenceBlowfish;
use crate::error::{ChiError, ChiResult};
use crate::{Block, MAX_KEY_LEN, MIN_KEY_LEN};

/// An 8-byte block primitive with an immutable, key-derived schedule.
pub trait BlockCipher {
    fn encrypt_block(&self, block: &mut Block);

    fn decrypt_block(&self, block: &mut Block);

    /// Short backend identifier, used in logs.
    fn name(&self) -> &'static str;
}

/// Blowfish from the RustCrypto `blowfish` crate (big-endian word order).
pub struct RustCryptoBlowfish {
    inner: blowfish::Blowfish,
}

impl RustCryptoBlowfish {
    pub fn new(key: &[u8]) -> ChiResult<Self> {
        if !(MIN_KEY_LEN..=MAX_KEY_LEN).contains(&key.len()) {
            return Err(ChiError::InvalidKeyLength { len: key.len() });
        }
        let inner = blowfish::Blowfish::new_from_slice(key)
            .map_err(|_| ChiError::InvalidKeyLength { len: key.len() })?;
        Ok(Self { inner })
    }
}

impl BlockCipher for RustCryptoBlowfish {
    fn encrypt_block(&self, block: &mut Block) {
        self.inner
            .encrypt_block(GenericArray::from_mut_slice(block.as_mut_slice()));
    }

    fn decrypt_block(&self, block: &mut Block) {
        self.inner
            .decrypt_block(GenericArray::from_mut_slice(block.as_mut_slice()));
    }

    fn name(&self) -> &'static str {
        "rustcrypto"
    }
}

impl std::fmt::Debug for RustCryptoBlowfish {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustCryptoBlowfish")
            .field("schedule", &"[REDACTED]")
            .finish()
    }
}

/// Which Blowfish implementation to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    /// Portable implementation in this crate (default)
    #[default]
    #[serde(rename = "reference")]
    Reference,
    /// RustCrypto `blowfish` crate
    #[serde(rename = "rustcrypto")]
    RustCrypto,
}

impl Backend {
    /// Run the key schedule for `key` on the selected implementation.
    pub fn setup(self, key: &[u8]) -> ChiResult<Box<dyn BlockCipher + Send + Sync>> {
        Ok(match self {
            Backend::Reference => Box::new(ReferenceBlowfish::new(key)?),
            Backend::RustCrypto => Box::new(RustCryptoBlowfish::new(key)?),
        })
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Reference => f.write_str("reference"),
            Backend::RustCrypto => f.write_str("rustcrypto"),
        }
    }
}
