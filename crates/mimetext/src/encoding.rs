//! Transfer encodings used inside encoded words.
//!
//! Supports Base64 (`B`) and the RFC 2047 flavour of Quoted-Printable (`Q`).

use base64::Engine;
use base64::alphabet;
use base64::engine::DecodePaddingMode;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use std::fmt;

/// Base64 engine for decoding: padding is optional inside encoded words.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Transfer encoding of an encoded word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordEncoding {
    /// Base64 (`B`).
    Base64,
    /// RFC 2047 Quoted-Printable (`Q`).
    QuotedPrintable,
}

impl WordEncoding {
    /// Returns the wire letter for this encoding.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Base64 => 'B',
            Self::QuotedPrintable => 'Q',
        }
    }

    /// Parses a wire letter, case-insensitively.
    #[must_use]
    pub const fn from_letter(letter: u8) -> Option<Self> {
        match letter {
            b'B' | b'b' => Some(Self::Base64),
            b'Q' | b'q' => Some(Self::QuotedPrintable),
            _ => None,
        }
    }

    /// Returns the exact encoded length of `data`.
    #[must_use]
    pub fn encoded_len(self, data: &[u8]) -> usize {
        match self {
            Self::Base64 => base64_encoded_len(data.len()),
            Self::QuotedPrintable => data.iter().map(|&byte| q_encoded_len(byte)).sum(),
        }
    }

    /// Encodes `data`.
    #[must_use]
    pub fn encode(self, data: &[u8]) -> String {
        match self {
            Self::Base64 => encode_base64(data),
            Self::QuotedPrintable => encode_q(data),
        }
    }

    /// Decodes `data`, returning `None` if it is not valid for this encoding.
    ///
    /// Q decoding never fails; stray escape characters are kept literally.
    #[must_use]
    pub fn decode(self, data: &[u8]) -> Option<Vec<u8>> {
        match self {
            Self::Base64 => decode_base64(data),
            Self::QuotedPrintable => Some(decode_q(data)),
        }
    }
}

impl fmt::Display for WordEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data. Padding is optional.
#[must_use]
pub fn decode_base64(data: &[u8]) -> Option<Vec<u8>> {
    LENIENT_BASE64.decode(data).ok()
}

/// Returns the padded Base64 length of `input_len` bytes.
#[must_use]
pub const fn base64_encoded_len(input_len: usize) -> usize {
    input_len.div_ceil(3) * 4
}

/// Returns true if `byte` may appear unescaped in Q-encoded text.
#[must_use]
pub const fn is_q_safe(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'!' | b'*' | b'+' | b'-' | b'/')
}

/// Returns the Q-encoded length of a single byte (1 or 3).
#[must_use]
pub const fn q_encoded_len(byte: u8) -> usize {
    if byte == b' ' || is_q_safe(byte) { 1 } else { 3 }
}

/// Encodes data using the RFC 2047 `Q` encoding.
///
/// Space becomes `_`; everything outside letters, digits and `! * + - /`
/// is escaped as `=XX`.
#[must_use]
pub fn encode_q(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 3);

    for &byte in data {
        match byte {
            b' ' => result.push('_'),
            _ if is_q_safe(byte) => result.push(char::from(byte)),
            _ => {
                result.push('=');
                result.push(char::from(HEX_DIGITS[usize::from(byte >> 4)]));
                result.push(char::from(HEX_DIGITS[usize::from(byte & 0x0f)]));
            }
        }
    }

    result
}

/// Decodes RFC 2047 `Q` data.
///
/// Accepts lower-case hex digits; an `=` that does not start a valid escape
/// is kept as is.
#[must_use]
pub fn decode_q(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        match data[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' => {
                let high = data.get(i + 1).copied().and_then(hex_value);
                let low = data.get(i + 2).copied().and_then(hex_value);
                if let (Some(high), Some(low)) = (high, low) {
                    result.push((high << 4) | low);
                    i += 3;
                } else {
                    result.push(b'=');
                    i += 1;
                }
            }
            byte => {
                result.push(byte);
                i += 1;
            }
        }
    }

    result
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}

/// Returns the percentage (0-100) of 7-bit bytes in `data`.
///
/// Empty input counts as fully ASCII.
#[must_use]
pub fn ascii_percent(data: &[u8]) -> usize {
    if data.is_empty() {
        return 100;
    }
    let ascii = data.iter().filter(|byte| byte.is_ascii()).count();
    (100 * ascii) / data.len()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(encoded.as_bytes()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_unpadded() {
        assert_eq!(decode_base64(b"SGVsbG8").unwrap(), b"Hello");
        assert!(decode_base64(b"SGV$bG8=").is_none());
    }

    #[test]
    fn test_base64_encoded_len() {
        assert_eq!(base64_encoded_len(0), 0);
        assert_eq!(base64_encoded_len(1), 4);
        assert_eq!(base64_encoded_len(3), 4);
        assert_eq!(base64_encoded_len(4), 8);
        assert_eq!(base64_encoded_len(5), encode_base64(b"12345").len());
    }

    #[test]
    fn test_q_encode() {
        assert_eq!(encode_q(b"Hello World"), "Hello_World");
        assert_eq!(encode_q("Héllo".as_bytes()), "H=C3=A9llo");
        assert_eq!(encode_q(b"a=b_c?d"), "a=3Db=5Fc=3Fd");
        assert_eq!(encode_q(b"!*+-/"), "!*+-/");
        assert_eq!(encode_q(b"<a@b>,;:()[]\""), "=3Ca=40b=3E=2C=3B=3A=28=29=5B=5D=22");
        assert_eq!(encode_q(b"\r\n"), "=0D=0A");
    }

    #[test]
    fn test_q_encoded_len_matches_output() {
        let data: Vec<u8> = (0..=255).collect();
        let expected: usize = data.iter().map(|&b| q_encoded_len(b)).sum();
        assert_eq!(encode_q(&data).len(), expected);
        assert_eq!(WordEncoding::QuotedPrintable.encoded_len(&data), expected);
    }

    #[test]
    fn test_q_decode() {
        assert_eq!(decode_q(b"Hello_World"), b"Hello World");
        assert_eq!(decode_q(b"H=C3=A9llo"), "Héllo".as_bytes());
        assert_eq!(decode_q(b"h=c3=a9"), "hé".as_bytes());
    }

    #[test]
    fn test_q_decode_stray_equals() {
        assert_eq!(decode_q(b"a=b"), b"a=b");
        assert_eq!(decode_q(b"end="), b"end=");
        assert_eq!(decode_q(b"=4"), b"=4");
        assert_eq!(decode_q(b"=ZZ=41"), b"=ZZA");
    }

    #[test]
    fn test_word_encoding_letters() {
        assert_eq!(WordEncoding::from_letter(b'b'), Some(WordEncoding::Base64));
        assert_eq!(WordEncoding::from_letter(b'Q'), Some(WordEncoding::QuotedPrintable));
        assert_eq!(WordEncoding::from_letter(b'X'), None);
        assert_eq!(WordEncoding::Base64.to_string(), "B");
        assert_eq!(WordEncoding::QuotedPrintable.letter(), 'Q');
    }

    #[test]
    fn test_ascii_percent() {
        assert_eq!(ascii_percent(b""), 100);
        assert_eq!(ascii_percent(b"abcd"), 100);
        assert_eq!(ascii_percent(b"ab\xe9\xe9"), 50);
        assert_eq!(ascii_percent("Été".as_bytes()), 20);
    }
}
