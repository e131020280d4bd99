//! Note text helpers: line endings and character encodings
//!
//! Tombo stores notes as bytes in the platform's legacy encoding with CRLF
//! line endings. The codec itself never looks inside the payload; these
//! helpers convert at the edges.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::error::{ToolError, ToolResult};

/// Convert every LF not already preceded by CR into CRLF.
pub fn unix_to_dos(data: &[u8]) -> Vec<u8> {
    let extra = data.iter().filter(|&&b| b == b'\n').count();
    let mut out = Vec::with_capacity(data.len() + extra);
    let mut prev = 0u8;
    for &b in data {
        if b == b'\n' && prev != b'\r' {
            out.push(b'\r');
        }
        out.push(b);
        prev = b;
    }
    out
}

/// Character encoding of a note payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteEncoding {
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    /// ISO-8859-1: one byte per code point U+0000..=U+00FF
    #[serde(rename = "latin1")]
    Latin1,
    /// Bytes passed through untouched
    #[serde(rename = "raw")]
    Raw,
}

impl NoteEncoding {
    /// Transcode a decrypted payload to UTF-8 bytes for display.
    pub fn decode_to_utf8<'a>(&self, data: &'a [u8]) -> ToolResult<Cow<'a, [u8]>> {
        match self {
            NoteEncoding::Raw => Ok(Cow::Borrowed(data)),
            NoteEncoding::Utf8 => std::str::from_utf8(data)
                .map(|_| Cow::Borrowed(data))
                .map_err(|e| ToolError::Encoding(format!("note is not valid UTF-8: {e}"))),
            NoteEncoding::Latin1 => {
                if data.is_ascii() {
                    return Ok(Cow::Borrowed(data));
                }
                let text: String = data.iter().map(|&b| char::from(b)).collect();
                Ok(Cow::Owned(text.into_bytes()))
            }
        }
    }

    /// Encode `text` into payload bytes.
    pub fn encode<'a>(&self, text: &'a str) -> ToolResult<Cow<'a, [u8]>> {
        match self {
            NoteEncoding::Utf8 | NoteEncoding::Raw => Ok(Cow::Borrowed(text.as_bytes())),
            NoteEncoding::Latin1 => {
                if text.is_ascii() {
                    return Ok(Cow::Borrowed(text.as_bytes()));
                }
                text.chars()
                    .map(|c| {
                        u8::try_from(u32::from(c)).map_err(|_| {
                            ToolError::Encoding(format!("{c:?} cannot be encoded as latin1"))
                        })
                    })
                    .collect::<ToolResult<Vec<u8>>>()
                    .map(Cow::Owned)
            }
        }
    }
}

impl std::fmt::Display for NoteEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoteEncoding::Utf8 => f.write_str("utf-8"),
            NoteEncoding::Latin1 => f.write_str("latin1"),
            NoteEncoding::Raw => f.write_str("raw"),
        }
    }
}

impl std::str::FromStr for NoteEncoding {
    type Err = ToolError;

    fn from_str(s: &str) -> ToolResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(NoteEncoding::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(NoteEncoding::Latin1),
            "raw" => Ok(NoteEncoding::Raw),
            other => Err(ToolError::Encoding(format!("unknown note encoding: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unix_to_dos() {
        assert_eq!(unix_to_dos(b"a\nb\n"), b"a\r\nb\r\n");
        assert_eq!(unix_to_dos(b"already\r\ndos\r\n"), b"already\r\ndos\r\n");
        assert_eq!(unix_to_dos(b"mixed\r\nand\nlone\r"), b"mixed\r\nand\r\nlone\r");
        assert_eq!(unix_to_dos(b"\n\n"), b"\r\n\r\n");
        assert!(unix_to_dos(b"").is_empty());
    }

    #[test]
    fn test_utf8_passthrough_and_validation() {
        let note = "caf\u{e9}".as_bytes();
        assert!(matches!(
            NoteEncoding::Utf8.decode_to_utf8(note).unwrap(),
            Cow::Borrowed(_)
        ));
        let err = NoteEncoding::Utf8.decode_to_utf8(b"caf\xe9").unwrap_err();
        assert!(matches!(err, ToolError::Encoding(_)));
    }

    #[test]
    fn test_latin1_roundtrip() {
        let decoded = NoteEncoding::Latin1.decode_to_utf8(b"caf\xe9").unwrap();
        assert_eq!(&*decoded, "caf\u{e9}".as_bytes());

        let encoded = NoteEncoding::Latin1.encode("caf\u{e9}").unwrap();
        assert_eq!(&*encoded, b"caf\xe9");
    }

    #[test]
    fn test_latin1_rejects_wide_chars() {
        let err = NoteEncoding::Latin1.encode("\u{20ac}5").unwrap_err();
        assert!(matches!(err, ToolError::Encoding(_)));
    }

    #[test]
    fn test_raw_is_untouched() {
        let bytes = b"\xff\xfe\x00binary";
        assert_eq!(&*NoteEncoding::Raw.decode_to_utf8(bytes).unwrap(), bytes);
    }

    #[test]
    fn test_parse_encoding_names() {
        assert_eq!("UTF-8".parse::<NoteEncoding>().unwrap(), NoteEncoding::Utf8);
        assert_eq!("iso-8859-1".parse::<NoteEncoding>().unwrap(), NoteEncoding::Latin1);
        assert_eq!("raw".parse::<NoteEncoding>().unwrap(), NoteEncoding::Raw);
        assert!("cp1252".parse::<NoteEncoding>().is_err());
        assert_eq!(NoteEncoding::Latin1.to_string(), "latin1");
    }

    proptest! {
        #[test]
        fn latin1_decode_then_encode_is_identity(data in proptest::collection::vec(any::<u8>(), 0..=256)) {
            let text = NoteEncoding::Latin1.decode_to_utf8(&data).unwrap();
            let text = std::str::from_utf8(&text).unwrap().to_owned();
            let back = NoteEncoding::Latin1.encode(&text).unwrap();
            prop_assert_eq!(&*back, &data[..]);
        }

        #[test]
        fn unix_to_dos_leaves_no_bare_lf(data in proptest::collection::vec(any::<u8>(), 0..=256)) {
            let out = unix_to_dos(&data);
            for (i, &b) in out.iter().enumerate() {
                if b == b'\n' {
                    prop_assert!(i > 0 && out[i - 1] == b'\r');
                }
            }
        }
    }
}
