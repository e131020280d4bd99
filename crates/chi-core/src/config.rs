use serde::{Deserialize, Serialize};
use std::path::Path;

use chi_crypto::{Backend, CodecOptions, TailPadding};

use crate::error::{ToolError, ToolResult};
use crate::text::NoteEncoding;

/// Top-level tool configuration (loaded from chi.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChiConfig {
    pub cipher: CipherConfig,
    pub notes: NotesConfig,
    pub log: LogConfig,
}

impl ChiConfig {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> ToolResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| ToolError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn codec_options(&self) -> CodecOptions {
        CodecOptions {
            backend: self.cipher.backend,
            tail_padding: self.cipher.tail_padding,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    /// Blowfish implementation: "reference" or "rustcrypto"
    pub backend: Backend,
    /// Filler for a trailing partial block: "wrap" or "previous-block"
    pub tail_padding: TailPadding,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    /// Text encoding of note contents: "utf-8", "latin1" or "raw"
    pub encoding: NoteEncoding,
    /// Convert LF to CRLF before encrypting (Tombo on Windows expects CRLF)
    pub dos_newlines: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}
