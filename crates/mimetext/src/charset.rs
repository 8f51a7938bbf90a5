//! Character set identifiers.

use crate::encoding::WordEncoding;
use crate::error::Result;
use crate::transcode::Transcoder;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};

/// Charset-name substrings that force a transfer encoding.
///
/// Scanned in order; the first key found in the charset name wins.
const RECOMMENDED_ENCODINGS: &[(&str, WordEncoding)] = &[
    ("iso-8859", WordEncoding::QuotedPrintable),
    ("windows-125", WordEncoding::QuotedPrintable),
    ("koi8", WordEncoding::QuotedPrintable),
    ("iso-2022", WordEncoding::Base64),
    ("shift_jis", WordEncoding::Base64),
    ("shift-jis", WordEncoding::Base64),
    ("euc-jp", WordEncoding::Base64),
    ("euc-kr", WordEncoding::Base64),
    ("gb2312", WordEncoding::Base64),
    ("gbk", WordEncoding::Base64),
    ("gb18030", WordEncoding::Base64),
    ("big5", WordEncoding::Base64),
];

/// A named character encoding.
///
/// Names compare case-insensitively, so `UTF-8` and `utf-8` are the same
/// charset. The name is kept as given and used verbatim on the wire.
#[derive(Debug, Clone, Eq)]
pub struct Charset {
    name: String,
}

impl Charset {
    /// Creates a charset from its name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// `us-ascii`.
    #[must_use]
    pub fn us_ascii() -> Self {
        Self::new("us-ascii")
    }

    /// `utf-8`.
    #[must_use]
    pub fn utf_8() -> Self {
        Self::new("utf-8")
    }

    /// `iso-8859-1`.
    #[must_use]
    pub fn iso_8859_1() -> Self {
        Self::new("iso-8859-1")
    }

    /// Returns the charset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the transfer encoding this charset should always use, if any.
    #[must_use]
    pub fn recommended_encoding(&self) -> Option<WordEncoding> {
        let name = self.name.to_ascii_lowercase();
        RECOMMENDED_ENCODINGS
            .iter()
            .find(|(key, _)| name.contains(key))
            .map(|&(_, encoding)| encoding)
    }

    /// Converts `input` from one charset to another.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConversionUnavailable`](crate::Error::ConversionUnavailable)
    /// if no converter exists for the pair. Invalid input never fails.
    pub fn convert(input: &[u8], from: &Self, to: &Self) -> Result<Vec<u8>> {
        Ok(Transcoder::new(from, to)?.convert_bytes(input))
    }

    /// Converts a stream from one charset to another.
    ///
    /// # Errors
    ///
    /// Returns an error if no converter exists for the pair, or if reading
    /// or writing fails.
    pub fn convert_stream<R: Read, W: Write>(
        input: &mut R,
        output: &mut W,
        from: &Self,
        to: &Self,
    ) -> Result<()> {
        Transcoder::new(from, to)?.convert(input, output)
    }

    /// Encodes a Unicode string in this charset.
    ///
    /// # Errors
    ///
    /// Returns an error if this charset cannot be converted to.
    pub fn encode_str(&self, text: &str) -> Result<Vec<u8>> {
        Self::convert(text.as_bytes(), &Self::utf_8(), self)
    }

    /// Decodes bytes in this charset to a Unicode string.
    ///
    /// # Errors
    ///
    /// Returns an error if this charset cannot be converted from.
    pub fn decode_to_string(&self, bytes: &[u8]) -> Result<String> {
        let utf8 = Self::convert(bytes, self, &Self::utf_8())?;
        Ok(String::from_utf8_lossy(&utf8).into_owned())
    }
}

impl Default for Charset {
    fn default() -> Self {
        Self::us_ascii()
    }
}

impl PartialEq for Charset {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Hash for Charset {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.name.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for Charset {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Charset {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_case_insensitive_equality() {
        assert_eq!(Charset::new("UTF-8"), Charset::utf_8());
        assert_ne!(Charset::new("utf8"), Charset::utf_8());

        let mut set = HashSet::new();
        set.insert(Charset::new("ISO-8859-1"));
        assert!(set.contains(&Charset::iso_8859_1()));
    }

    #[test]
    fn test_name_kept_verbatim() {
        let charset = Charset::new("UTF-8");
        assert_eq!(charset.name(), "UTF-8");
        assert_eq!(charset.to_string(), "UTF-8");
    }

    #[test]
    fn test_recommended_encoding() {
        assert_eq!(
            Charset::iso_8859_1().recommended_encoding(),
            Some(WordEncoding::QuotedPrintable)
        );
        assert_eq!(
            Charset::new("ISO-8859-15").recommended_encoding(),
            Some(WordEncoding::QuotedPrintable)
        );
        assert_eq!(
            Charset::new("ISO-2022-JP").recommended_encoding(),
            Some(WordEncoding::Base64)
        );
        assert_eq!(
            Charset::new("Shift_JIS").recommended_encoding(),
            Some(WordEncoding::Base64)
        );
        assert_eq!(Charset::utf_8().recommended_encoding(), None);
        assert_eq!(Charset::us_ascii().recommended_encoding(), None);
    }

    #[test]
    fn test_default_is_us_ascii() {
        assert_eq!(Charset::default(), Charset::us_ascii());
    }

    #[test]
    fn test_convert() {
        let latin1 = Charset::convert("Été".as_bytes(), &Charset::utf_8(), &Charset::iso_8859_1())
            .unwrap();
        assert_eq!(latin1, b"\xc9t\xe9");

        let back = Charset::iso_8859_1().decode_to_string(&latin1).unwrap();
        assert_eq!(back, "Été");
    }

    #[test]
    fn test_encode_str() {
        assert_eq!(
            Charset::new("windows-1252").encode_str("€5").unwrap(),
            b"\x805"
        );
    }

    #[test]
    fn test_convert_stream() {
        let mut input: &[u8] = b"caf\xe9";
        let mut output = Vec::new();
        Charset::convert_stream(
            &mut input,
            &mut output,
            &Charset::iso_8859_1(),
            &Charset::utf_8(),
        )
        .unwrap();
        assert_eq!(output, "café".as_bytes());
    }

    #[test]
    fn test_convert_unknown_charset() {
        let err = Charset::convert(b"abc", &Charset::new("x-unknown"), &Charset::utf_8())
            .unwrap_err();
        assert!(err.is_conversion_unavailable());
    }
}
