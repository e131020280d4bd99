//! BF01 envelope: header framing, nonce, MD5 integrity check
//!
//! Binary format (little-endian length):
//! ```text
//! [4 bytes: "BF01"][4 bytes: plaintext length, u32 LE][N bytes: ciphertext]
//! ciphertext = chain(nonce[8] || md5(payload)[16] || payload), N % 8 == 0
//! ```
//!
//! Decoding walks magic → length → ciphertext → chain decode → payload →
//! digest check, failing at the first step that does not hold.

use rand::Rng;
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::backend::{Backend, BlockCipher};
use crate::chain::{self, TailPadding};
use crate::error::{ChiError, ChiResult};
use crate::kdf::{derive_key, md5_digest};
use crate::{DIGEST_SIZE, NONCE_SIZE};

/// Envelope magic tag.
pub const MAGIC: &[u8; 4] = b"BF01";

/// Magic plus the length field.
pub const HEADER_SIZE: usize = 8;

/// Nonce and digest in front of the payload inside the encrypted buffer.
pub const PREFIX_SIZE: usize = NONCE_SIZE + DIGEST_SIZE;

/// Characters the nonce is drawn from: ASCII letters, digits, punctuation.
const NONCE_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// The cleartext header of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub plaintext_len: u32,
}

impl EnvelopeHeader {
    /// Split `data` into its header and ciphertext.
    pub fn parse(data: &[u8]) -> ChiResult<(Self, &[u8])> {
        if data.len() < MAGIC.len() || &data[..MAGIC.len()] != MAGIC {
            return Err(ChiError::UnsupportedFormat);
        }
        if data.len() < HEADER_SIZE {
            return Err(ChiError::CorruptedData(format!(
                "truncated header: {} bytes (expected {HEADER_SIZE})",
                data.len()
            )));
        }
        let plaintext_len = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        Ok((Self { plaintext_len }, &data[HEADER_SIZE..]))
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..4].copy_from_slice(MAGIC);
        out[4..].copy_from_slice(&self.plaintext_len.to_le_bytes());
        out
    }
}

/// Ciphertext size for a payload of `plaintext_len` bytes (header excluded).
pub fn ciphertext_len(plaintext_len: usize) -> usize {
    chain::padded_len(PREFIX_SIZE + plaintext_len)
}

/// Generate a fresh 8-character printable nonce.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut rng = rand::thread_rng();
    let mut nonce = [0u8; NONCE_SIZE];
    for byte in nonce.iter_mut() {
        *byte = NONCE_ALPHABET[rng.gen_range(0..NONCE_ALPHABET.len())];
    }
    nonce
}

/// Codec choices made when a [`ChiCipher`] is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodecOptions {
    pub backend: Backend,
    pub tail_padding: TailPadding,
}

/// A password-keyed CHI codec.
///
/// Building one runs MD5 and the Blowfish key schedule once; afterwards it is
/// immutable and can encrypt and decrypt any number of envelopes, from any
/// number of threads.
pub struct ChiCipher {
    cipher: Box<dyn BlockCipher + Send + Sync>,
    tail_padding: TailPadding,
}

impl ChiCipher {
    /// Key a codec from `password` with the default backend and padding.
    pub fn new(password: &[u8]) -> ChiResult<Self> {
        Self::with_options(password, CodecOptions::default())
    }

    pub fn with_options(password: &[u8], options: CodecOptions) -> ChiResult<Self> {
        let key = derive_key(password);
        Self::from_key(key.as_slice(), options)
    }

    /// Key a codec directly, bypassing password derivation.
    ///
    /// `key` must be 4..=56 bytes.
    pub fn from_key(key: &[u8], options: CodecOptions) -> ChiResult<Self> {
        let cipher = options.backend.setup(key)?;
        Ok(Self {
            cipher,
            tail_padding: options.tail_padding,
        })
    }

    pub fn backend_name(&self) -> &'static str {
        self.cipher.name()
    }

    /// Seal `plaintext` into a BF01 envelope with a fresh nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> ChiResult<Vec<u8>> {
        self.encrypt_with_nonce(plaintext, &generate_nonce())
    }

    /// Seal with a caller-supplied nonce. Reusing a nonce with the same
    /// password and plaintext reproduces the same envelope.
    pub fn encrypt_with_nonce(
        &self,
        plaintext: &[u8],
        nonce: &[u8; NONCE_SIZE],
    ) -> ChiResult<Vec<u8>> {
        let plaintext_len = u32::try_from(plaintext.len()).map_err(|_| {
            ChiError::InvalidInput(format!(
                "plaintext of {} bytes exceeds the 32-bit length field",
                plaintext.len()
            ))
        })?;

        let mut buffer = Vec::with_capacity(PREFIX_SIZE + plaintext.len());
        buffer.extend_from_slice(nonce);
        buffer.extend_from_slice(&md5_digest(plaintext));
        buffer.extend_from_slice(plaintext);

        let ciphertext = chain::encode(self.cipher.as_ref(), &buffer, self.tail_padding);
        buffer.zeroize();

        let header = EnvelopeHeader { plaintext_len };
        let mut out = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&ciphertext);

        debug!(
            backend = self.cipher.name(),
            plaintext_len,
            envelope_len = out.len(),
            "sealed CHI envelope"
        );
        Ok(out)
    }

    /// Open a BF01 envelope and return the verified payload.
    pub fn decrypt(&self, data: &[u8]) -> ChiResult<Vec<u8>> {
        let (header, ciphertext) = EnvelopeHeader::parse(data)?;
        let mut buffer = chain::decode(self.cipher.as_ref(), ciphertext)?;

        // A declared length past the decoded data is not rejected here: the
        // clamped payload simply fails the digest check.
        let start = PREFIX_SIZE.min(buffer.len());
        let end = PREFIX_SIZE
            .checked_add(header.plaintext_len as usize)
            .map_or(buffer.len(), |end| end.min(buffer.len()));
        let payload = buffer[start..end].to_vec();
        let digest = md5_digest(&payload);
        let verified = buffer.get(NONCE_SIZE..PREFIX_SIZE) == Some(&digest[..]);
        buffer.zeroize();

        if !verified {
            warn!(
                backend = self.cipher.name(),
                envelope_len = data.len(),
                "CHI digest mismatch: wrong password or corrupted data"
            );
            return Err(ChiError::BadPasswordOrCorrupt);
        }

        debug!(
            backend = self.cipher.name(),
            plaintext_len = header.plaintext_len,
            "opened CHI envelope"
        );
        Ok(payload)
    }
}

impl std::fmt::Debug for ChiCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChiCipher")
            .field("backend", &self.cipher.name())
            .field("tail_padding", &self.tail_padding)
            .finish()
    }
}

/// Encrypt `plaintext` under `password` into a new envelope.
pub fn seal(password: &[u8], plaintext: &[u8]) -> ChiResult<Vec<u8>> {
    ChiCipher::new(password)?.encrypt(plaintext)
}

/// Decrypt and verify an envelope produced by [`seal`] or a compatible tool.
pub fn open(password: &[u8], data: &[u8]) -> ChiResult<Vec<u8>> {
    ChiCipher::new(password)?.decrypt(data)
}
