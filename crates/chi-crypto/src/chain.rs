//! Chained block mode with a fixed initialization value
//!
//! CBC as used by CHI files:
//! ```text
//! R_0 = "BLOWFISH"
//! C_i = E(P_i ^ R_i)        R_{i+1} = C_i
//! P_i = D(C_i) ^ R_i
//! ```
//! A trailing partial block (encode only) is XORed with the register, padded
//! to eight bytes per [`TailPadding`], and encrypted without a second XOR.
//! The register lives on the stack of each call; nothing is shared.

use serde::{Deserialize, Serialize};

use crate::backend::BlockCipher;
use crate::error::{ChiError, ChiResult};
use crate::{Block, BLOCK_SIZE};

/// Initial chain register: ASCII "BLOWFISH".
pub const CHAIN_IV: Block = *b"BLOWFISH";

/// Source of the filler bytes for a trailing partial block.
///
/// Decoding never looks at the filler, so either policy decodes the same.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TailPadding {
    /// Repeat the XORed partial block onto itself (default).
    #[default]
    Wrap,
    /// Fill with the trailing bytes of the previous ciphertext block, the way
    /// Tombo itself pads.
    PreviousBlock,
}

/// Length of `encode` output for an input of `len` bytes.
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Encrypt `plaintext` in chained mode. Output is always a whole number of
/// blocks.
pub fn encode<C>(cipher: &C, plaintext: &[u8], padding: TailPadding) -> Vec<u8>
where
    C: BlockCipher + ?Sized,
{
    let mut register = CHAIN_IV;
    let mut out = Vec::with_capacity(padded_len(plaintext.len()));

    let mut chunks = plaintext.chunks_exact(BLOCK_SIZE);
    for chunk in chunks.by_ref() {
        let mut block = register;
        xor_in_place(&mut block, chunk);
        cipher.encrypt_block(&mut block);
        out.extend_from_slice(&block);
        register = block;
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let k = tail.len();
        let mut block = [0u8; BLOCK_SIZE];
        block[..k].copy_from_slice(&register[..k]);
        xor_in_place(&mut block[..k], tail);
        match padding {
            TailPadding::Wrap => {
                for i in k..BLOCK_SIZE {
                    block[i] = block[i % k];
                }
            }
            TailPadding::PreviousBlock => block[k..].copy_from_slice(&register[k..]),
        }
        cipher.encrypt_block(&mut block);
        out.extend_from_slice(&block);
    }

    out
}

/// Decrypt chained-mode `ciphertext`.
///
/// The result has the same length as the input; any tail filler added by
/// [`encode`] is returned as-is and must be cut by the caller.
pub fn decode<C>(cipher: &C, ciphertext: &[u8]) -> ChiResult<Vec<u8>>
where
    C: BlockCipher + ?Sized,
{
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(ChiError::CorruptedData(format!(
            "ciphertext length {} is not a multiple of {BLOCK_SIZE}",
            ciphertext.len()
        )));
    }

    let mut register = CHAIN_IV;
    let mut out = Vec::with_capacity(ciphertext.len());

    for chunk in ciphertext.chunks_exact(BLOCK_SIZE) {
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(chunk);
        cipher.decrypt_block(&mut block);
        xor_in_place(&mut block, &register);
        out.extend_from_slice(&block);
        register.copy_from_slice(chunk);
    }

    Ok(out)
}

fn xor_in_place(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}
