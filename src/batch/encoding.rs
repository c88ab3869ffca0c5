//! Text encoding detection and normalization for delimited files
//!
//! Files are sampled once to pick a default, but decoding is decided per
//! value: any value that is not valid UTF-8 is read as Windows-1252, the
//! WHATWG meaning of "latin1". A file whose first non-ASCII byte lies past the
//! sample therefore still decodes correctly.

use encoding_rs::WINDOWS_1252;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Bytes sampled from the head of a file for detection
const SAMPLE_SIZE: usize = 64 * 1024;

/// Detected source encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    Utf8,
    /// ISO-8859-1 and Windows-1252, decoded as Windows-1252
    Latin1,
    /// Detection failed; values are decoded as UTF-8 when valid
    Unknown,
}

impl TextEncoding {
    /// Detect the encoding of a file from its first bytes
    pub fn detect_file(path: &Path) -> Self {
        let mut sample = Vec::with_capacity(SAMPLE_SIZE);
        let read = File::open(path).and_then(|f| f.take(SAMPLE_SIZE as u64).read_to_end(&mut sample));
        match read {
            Ok(n) => Self::detect(&sample, n == SAMPLE_SIZE),
            Err(e) => {
                tracing::debug!("Encoding detection failed for {}: {}", path.display(), e);
                TextEncoding::Unknown
            }
        }
    }

    /// Detect the encoding of a byte sample.
    ///
    /// `truncated` allows an incomplete multi-byte sequence at the very end.
    pub fn detect(sample: &[u8], truncated: bool) -> Self {
        match std::str::from_utf8(sample) {
            Ok(_) => TextEncoding::Utf8,
            // error_len() is None only when the input ends mid-sequence
            Err(e) if truncated && e.error_len().is_none() => TextEncoding::Utf8,
            Err(_) => TextEncoding::Latin1,
        }
    }

    /// Decode raw bytes to UTF-8.
    ///
    /// `Latin1` always decodes as Windows-1252. `Utf8` and `Unknown` keep valid
    /// UTF-8 as is and fall back to Windows-1252 for anything else, so no byte
    /// is replaced with U+FFFD.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        match self {
            TextEncoding::Latin1 => decode_single_byte(bytes),
            TextEncoding::Utf8 | TextEncoding::Unknown => match std::str::from_utf8(bytes) {
                Ok(text) => Cow::Borrowed(text),
                Err(_) => decode_single_byte(bytes),
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "windows-1252",
            TextEncoding::Unknown => "unknown",
        }
    }
}

fn decode_single_byte(bytes: &[u8]) -> Cow<'_, str> {
    // Every byte maps to a code point, so decoding never fails
    WINDOWS_1252.decode_without_bom_handling(bytes).0
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_detect_utf8() {
        assert_eq!(TextEncoding::detect("café,naïve".as_bytes(), false), TextEncoding::Utf8);
        assert_eq!(TextEncoding::detect(b"plain ascii", false), TextEncoding::Utf8);
    }

    #[test]
    fn test_detect_latin1() {
        // "café" in ISO-8859-1
        assert_eq!(TextEncoding::detect(b"caf\xe9", false), TextEncoding::Latin1);
    }

    #[test]
    fn test_truncated_sequence_at_sample_boundary() {
        let mut sample = "abc".as_bytes().to_vec();
        sample.push(0xc3); // first byte of "é"
        assert_eq!(TextEncoding::detect(&sample, true), TextEncoding::Utf8);
        assert_eq!(TextEncoding::detect(&sample, false), TextEncoding::Latin1);
    }

    #[test]
    fn test_latin1_decodes_to_utf8() {
        let decoded = TextEncoding::Latin1.decode(b"Jos\xe9 M\xfcller");
        assert_eq!(decoded, "José Müller");
    }

    #[test]
    fn test_windows_1252_punctuation() {
        // Smart quotes, en dash and euro sign live in 0x80..=0x9F
        let decoded = TextEncoding::Latin1.decode(b"\x93Caf\xe9\x94 \x96 \x80");
        assert_eq!(decoded, "\u{201C}Caf\u{e9}\u{201D} \u{2013} \u{20AC}");
        assert!(!decoded.chars().any(|c| c.is_control()));
    }

    #[test]
    fn test_utf8_value_with_single_byte_text_falls_back() {
        let decoded = TextEncoding::Utf8.decode(b"Jos\xe9");
        assert_eq!(decoded, "José");
        assert!(!decoded.contains('\u{FFFD}'));
    }

    #[test]
    fn test_valid_utf8_is_borrowed() {
        let bytes = "Müller".as_bytes();
        assert!(matches!(TextEncoding::Utf8.decode(bytes), Cow::Borrowed("Müller")));
        assert!(matches!(TextEncoding::Unknown.decode(bytes), Cow::Borrowed("Müller")));
    }

    #[test]
    fn test_detect_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"name\nJos\xe9\n").unwrap();
        assert_eq!(TextEncoding::detect_file(file.path()), TextEncoding::Latin1);
        assert_eq!(
            TextEncoding::detect_file(Path::new("/nonexistent/file.csv")),
            TextEncoding::Unknown
        );
    }
}
