//! Output text encodings selectable by name.
//!
//! The host configures stream encodings with a string; the lookup is a
//! case-insensitive exact match against a fixed set. Any other name fails
//! without mutating engine state.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WardenError};

/// Text encoding applied when decoding captured stream bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputEncoding {
    /// 7-bit ASCII; bytes outside the range decode as replacement characters.
    Ascii,
    /// UTF-8 (the default).
    #[default]
    Utf8,
    /// UTF-16 little-endian ("unicode").
    Utf16Le,
    /// UTF-16 big-endian ("bigendianunicode").
    Utf16Be,
    /// UTF-32 little-endian.
    Utf32Le,
}

impl OutputEncoding {
    /// Look up an encoding by its accepted name, case-insensitively.
    ///
    /// Accepted names: `ascii`, `utf8`, `unicode`, `bigendianunicode`,
    /// `utf32`.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ascii" => Ok(Self::Ascii),
            "utf8" => Ok(Self::Utf8),
            "unicode" => Ok(Self::Utf16Le),
            "bigendianunicode" => Ok(Self::Utf16Be),
            "utf32" => Ok(Self::Utf32Le),
            _ => Err(WardenError::UnsupportedValue {
                kind: "encoding",
                value: name.to_string(),
            }),
        }
    }

    /// The canonical accepted name for this encoding.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::Utf8 => "utf8",
            Self::Utf16Le => "unicode",
            Self::Utf16Be => "bigendianunicode",
            Self::Utf32Le => "utf32",
        }
    }

    /// Decode raw stream bytes to text, substituting replacement characters
    /// for invalid sequences.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Self::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
                .collect(),
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Utf16Le => decode_utf16_units(bytes, u16::from_le_bytes),
            Self::Utf16Be => decode_utf16_units(bytes, u16::from_be_bytes),
            Self::Utf32Le => bytes
                .chunks(4)
                .map(|chunk| {
                    if chunk.len() == 4 {
                        let v = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                        char::from_u32(v).unwrap_or('\u{FFFD}')
                    } else {
                        '\u{FFFD}'
                    }
                })
                .collect(),
        }
    }
}

fn decode_utf16_units(bytes: &[u8], from_bytes: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|chunk| {
            if chunk.len() == 2 {
                from_bytes([chunk[0], chunk[1]])
            } else {
                // trailing odd byte
                0xFFFD
            }
        })
        .collect();
    char::decode_utf16(units)
        .map(|r| r.unwrap_or('\u{FFFD}'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_case_insensitive() {
        assert_eq!(OutputEncoding::from_name("UTF8").unwrap(), OutputEncoding::Utf8);
        assert_eq!(
            OutputEncoding::from_name("Unicode").unwrap(),
            OutputEncoding::Utf16Le
        );
        assert_eq!(
            OutputEncoding::from_name("BigEndianUnicode").unwrap(),
            OutputEncoding::Utf16Be
        );
        assert_eq!(OutputEncoding::from_name("ascii").unwrap(), OutputEncoding::Ascii);
        assert_eq!(OutputEncoding::from_name("utf32").unwrap(), OutputEncoding::Utf32Le);
    }

    #[test]
    fn test_from_name_rejects_unknown() {
        let err = OutputEncoding::from_name("latin1").unwrap_err();
        assert!(matches!(
            err,
            WardenError::UnsupportedValue { kind: "encoding", .. }
        ));
    }

    #[test]
    fn test_decode_utf8() {
        let enc = OutputEncoding::Utf8;
        assert_eq!(enc.decode("héllo".as_bytes()), "héllo");
    }

    #[test]
    fn test_decode_ascii_replaces_high_bytes() {
        let enc = OutputEncoding::Ascii;
        assert_eq!(enc.decode(b"ok\xFF"), "ok\u{FFFD}");
    }

    #[test]
    fn test_decode_utf16le() {
        let enc = OutputEncoding::Utf16Le;
        let bytes: Vec<u8> = "hi".encode_utf16().flat_map(u16::to_le_bytes).collect();
        assert_eq!(enc.decode(&bytes), "hi");
    }

    #[test]
    fn test_decode_utf16be() {
        let enc = OutputEncoding::Utf16Be;
        let bytes: Vec<u8> = "hi".encode_utf16().flat_map(u16::to_be_bytes).collect();
        assert_eq!(enc.decode(&bytes), "hi");
    }

    #[test]
    fn test_decode_utf32le() {
        let enc = OutputEncoding::Utf32Le;
        let bytes: Vec<u8> = "ab".chars().flat_map(|c| (c as u32).to_le_bytes()).collect();
        assert_eq!(enc.decode(&bytes), "ab");
    }

    #[test]
    fn test_default_is_utf8() {
        assert_eq!(OutputEncoding::default(), OutputEncoding::Utf8);
    }
}
