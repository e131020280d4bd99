use thiserror::Error;

pub type ToolResult<T> = Result<T, ToolError>;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("config error: {0}")]
    Config(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error(transparent)]
    Crypto(#[from] chi_crypto::ChiError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
