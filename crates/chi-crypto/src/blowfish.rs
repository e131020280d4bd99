//! Portable Blowfish block primitive
//!
//! Every instance starts from its own copy of the π tables in
//! [`crate::pi_tables`] and diffuses the key through them; the shared
//! constants are never mutated.

use zeroize::Zeroize;

use crate::backend::BlockCipher;
use crate::error::{ChiError, ChiResult};
use crate::pi_tables::{INIT_P, INIT_S};
use crate::{Block, MAX_KEY_LEN, MIN_KEY_LEN};

const ROUNDS: usize = 16;

/// Blowfish with a key-derived schedule: 18 subkeys and four S-boxes.
///
/// Immutable after [`ReferenceBlowfish::new`]; the schedule is zeroized on drop.
#[derive(Clone)]
pub struct ReferenceBlowfish {
    p: [u32; ROUNDS + 2],
    s: [[u32; 256]; 4],
}

impl ReferenceBlowfish {
    /// Run the key schedule for a 4..=56 byte key.
    pub fn new(key: &[u8]) -> ChiResult<Self> {
        if !(MIN_KEY_LEN..=MAX_KEY_LEN).contains(&key.len()) {
            return Err(ChiError::InvalidKeyLength { len: key.len() });
        }

        let mut cipher = Self {
            p: INIT_P,
            s: INIT_S,
        };

        // The key is repeated cyclically across all 72 subkey bytes.
        for (i, subkey) in cipher.p.iter_mut().enumerate() {
            let word = (0..4).fold(0u32, |word, j| {
                (word << 8) | u32::from(key[(i * 4 + j) % key.len()])
            });
            *subkey ^= word;
        }

        let (mut l, mut r) = (0u32, 0u32);
        for i in (0..ROUNDS + 2).step_by(2) {
            (l, r) = cipher.encrypt_words(l, r);
            cipher.p[i] = l;
            cipher.p[i + 1] = r;
        }
        for sbox in 0..4 {
            for i in (0..256).step_by(2) {
                (l, r) = cipher.encrypt_words(l, r);
                cipher.s[sbox][i] = l;
                cipher.s[sbox][i + 1] = r;
            }
        }

        tracing::trace!(key_len = key.len(), "blowfish key schedule ready");
        Ok(cipher)
    }

    #[inline]
    fn round_function(&self, x: u32) -> u32 {
        let [a, b, c, d] = x.to_be_bytes();
        let h = self.s[0][a as usize].wrapping_add(self.s[1][b as usize]);
        (h ^ self.s[2][c as usize]).wrapping_add(self.s[3][d as usize])
    }

    fn encrypt_words(&self, mut l: u32, mut r: u32) -> (u32, u32) {
        for i in 0..ROUNDS {
            l ^= self.p[i];
            r ^= self.round_function(l);
            std::mem::swap(&mut l, &mut r);
        }
        std::mem::swap(&mut l, &mut r);
        r ^= self.p[ROUNDS];
        l ^= self.p[ROUNDS + 1];
        (l, r)
    }

    fn decrypt_words(&self, mut l: u32, mut r: u32) -> (u32, u32) {
        for i in (2..ROUNDS + 2).rev() {
            l ^= self.p[i];
            r ^= self.round_function(l);
            std::mem::swap(&mut l, &mut r);
        }
        std::mem::swap(&mut l, &mut r);
        r ^= self.p[1];
        l ^= self.p[0];
        (l, r)
    }
}

fn split_block(block: &Block) -> (u32, u32) {
    let l = u32::from_be_bytes([block[0], block[1], block[2], block[3]]);
    let r = u32::from_be_bytes([block[4], block[5], block[6], block[7]]);
    (l, r)
}

fn join_block(block: &mut Block, l: u32, r: u32) {
    block[..4].copy_from_slice(&l.to_be_bytes());
    block[4..].copy_from_slice(&r.to_be_bytes());
}

impl BlockCipher for ReferenceBlowfish {
    fn encrypt_block(&self, block: &mut Block) {
        let (l, r) = split_block(block);
        let (l, r) = self.encrypt_words(l, r);
        join_block(block, l, r);
    }

    fn decrypt_block(&self, block: &mut Block) {
        let (l, r) = split_block(block);
        let (l, r) = self.decrypt_words(l, r);
        join_block(block, l, r);
    }

    fn name(&self) -> &'static str {
        "reference"
    }
}

impl Drop for ReferenceBlowfish {
    fn drop(&mut self) {
        self.p.zeroize();
        for sbox in self.s.iter_mut() {
            sbox.zeroize();
        }
    }
}

impl std::fmt::Debug for ReferenceBlowfish {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceBlowfish")
            .field("schedule", &"[REDACTED]")
            .finish()
    }
}
