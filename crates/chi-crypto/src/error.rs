use thiserror::Error;

pub type ChiResult<T> = Result<T, ChiError>;

/// Failures of the CHI codec.
///
/// A wrong password and a damaged ciphertext both surface as a digest
/// mismatch after decoding; the format carries no other signal, so they
/// share `BadPasswordOrCorrupt`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChiError {
    #[error("invalid Blowfish key length: {len} bytes (expected 4..=56)")]
    InvalidKeyLength { len: usize },

    #[error("unsupported format: missing BF01 magic")]
    UnsupportedFormat,

    #[error("corrupted data: {0}")]
    CorruptedData(String),

    #[error("bad password or corrupted data: integrity digest mismatch")]
    BadPasswordOrCorrupt,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
