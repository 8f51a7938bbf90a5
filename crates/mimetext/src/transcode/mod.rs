//! Streaming charset conversion.
//!
//! A [`Transcoder`] converts a byte stream between two charsets in blocks
//! of [`CHUNK_SIZE`] bytes. A character split across two blocks is held in
//! a small carry buffer until the rest of it arrives; invalid input is
//! replaced one byte at a time and never aborts the conversion.
//!
//! ```
//! use mimetext::{Charset, Transcoder};
//!
//! let mut transcoder = Transcoder::new(&Charset::iso_8859_1(), &Charset::utf_8())?;
//! let mut out = Vec::new();
//! transcoder.feed(b"caf\xe9", &mut out);
//! transcoder.finish(&mut out);
//! assert_eq!(out, "café".as_bytes());
//! # Ok::<(), mimetext::Error>(())
//! ```

mod backend;
mod writer;

pub use backend::{
    ConversionBackend, ConversionHandle, ConvertOutcome, ConvertStatus, EncodingRsBackend,
};
pub use writer::TranscodingWriter;

use crate::charset::Charset;
use crate::error::Result;
use crate::options::ConverterOptions;
use std::io::{self, Read, Write};

/// Block size used when converting streams.
pub const CHUNK_SIZE: usize = 4096;

/// Widest incomplete character any supported charset can leave behind.
pub const MAX_CHAR_WIDTH: usize = 4;

/// Bytes of an incomplete character waiting for the next block.
#[derive(Debug, Clone, Copy, Default)]
struct Carry {
    bytes: [u8; MAX_CHAR_WIDTH],
    len: usize,
}

impl Carry {
    fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Stores `tail`, returning false if it does not fit.
    fn store(&mut self, tail: &[u8]) -> bool {
        match self.bytes.get_mut(..tail.len()) {
            Some(slot) => {
                slot.copy_from_slice(tail);
                self.len = tail.len();
                true
            }
            None => false,
        }
    }

    fn take(&mut self) -> Vec<u8> {
        let taken = self.as_slice().to_vec();
        self.len = 0;
        taken
    }
}

/// A conversion session between two charsets.
///
/// Sessions are not shared; create one per stream.
pub struct Transcoder {
    handle: Box<dyn ConversionHandle>,
    from: Charset,
    to: Charset,
    carry: Carry,
    replacement: Vec<u8>,
    had_errors: bool,
}

impl Transcoder {
    /// Opens a session using the `encoding_rs` backend and default options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConversionUnavailable`](crate::Error::ConversionUnavailable)
    /// if the pair cannot be converted.
    pub fn new(from: &Charset, to: &Charset) -> Result<Self> {
        Self::with_options(from, to, &ConverterOptions::default())
    }

    /// Opens a session using the `encoding_rs` backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the pair cannot be converted.
    pub fn with_options(from: &Charset, to: &Charset, options: &ConverterOptions) -> Result<Self> {
        Self::with_backend(&EncodingRsBackend, from, to, options)
    }

    /// Opens a session on a custom backend.
    ///
    /// The replacement text is converted into `to` through the same backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot open the pair.
    pub fn with_backend(
        backend: &dyn ConversionBackend,
        from: &Charset,
        to: &Charset,
        options: &ConverterOptions,
    ) -> Result<Self> {
        let handle = backend.open(from, to)?;
        let mut replacement = Vec::new();
        if !options.invalid_sequence.is_empty() {
            let mut encoder = backend.open(&Charset::utf_8(), to)?;
            encoder.convert(options.invalid_sequence.as_bytes(), &mut replacement, true);
            encoder.finish(&mut replacement);
        }
        Ok(Self::with_handle(handle, from, to, replacement))
    }

    /// Wraps an already open handle.
    ///
    /// `replacement` is written, as is, for each invalid input byte.
    #[must_use]
    pub fn with_handle(
        handle: Box<dyn ConversionHandle>,
        from: &Charset,
        to: &Charset,
        replacement: Vec<u8>,
    ) -> Self {
        Self {
            handle,
            from: from.clone(),
            to: to.clone(),
            carry: Carry::default(),
            replacement,
            had_errors: false,
        }
    }

    /// Returns the source charset.
    #[must_use]
    pub const fn from_charset(&self) -> &Charset {
        &self.from
    }

    /// Returns the destination charset.
    #[must_use]
    pub const fn to_charset(&self) -> &Charset {
        &self.to
    }

    /// Returns true if any input was replaced so far.
    #[must_use]
    pub const fn had_errors(&self) -> bool {
        self.had_errors
    }

    /// Returns the bytes held back waiting for more input.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        self.carry.as_slice()
    }

    /// Converts the next block of input, appending the result to `out`.
    pub fn feed(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        if self.carry.len == 0 {
            self.drain(chunk, out, false);
        } else {
            let mut buffer = self.carry.take();
            buffer.extend_from_slice(chunk);
            self.drain(&buffer, out, false);
        }
    }

    /// Ends the input: replaces any unfinished character and flushes the
    /// converter's shift state. The session can then start a new stream.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        let rest = self.carry.take();
        self.drain(&rest, out, true);
        self.handle.finish(out);
    }

    /// Converts everything `input` yields into `output`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if reading or writing fails.
    pub fn convert<R: Read, W: Write>(&mut self, input: &mut R, output: &mut W) -> Result<()> {
        let mut block = vec![0u8; CHUNK_SIZE];
        let mut converted = Vec::with_capacity(CHUNK_SIZE * 2);

        loop {
            let read = match input.read(&mut block) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.feed(&block[..read], &mut converted);
            output.write_all(&converted)?;
            converted.clear();
        }

        self.finish(&mut converted);
        output.write_all(&converted)?;
        Ok(())
    }

    /// Converts a complete buffer, finishing the session.
    #[must_use]
    pub fn convert_bytes(&mut self, input: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(input.len());
        for chunk in input.chunks(CHUNK_SIZE) {
            self.feed(chunk, &mut out);
        }
        self.finish(&mut out);
        out
    }

    fn drain(&mut self, input: &[u8], out: &mut Vec<u8>, last: bool) {
        let mut offset = 0;
        let mut replaced = 0usize;

        loop {
            let rest = input.get(offset..).unwrap_or_default();
            let status = self.handle.convert(rest, out, last);
            offset += status.consumed;

            match status.outcome {
                ConvertOutcome::Complete => break,
                ConvertOutcome::Incomplete
                    if !last && self.carry.store(input.get(offset..).unwrap_or_default()) =>
                {
                    break;
                }
                ConvertOutcome::Incomplete => {
                    out.extend_from_slice(&self.replacement);
                    offset += 1;
                    replaced += 1;
                }
                ConvertOutcome::Invalid => {
                    out.extend_from_slice(&self.replacement);
                    replaced += 1;
                }
            }
        }

        if replaced > 0 {
            self.had_errors = true;
            tracing::debug!(
                replaced,
                from = self.from.name(),
                to = self.to.name(),
                "Replaced invalid input"
            );
        }
    }
}

impl std::fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcoder")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("pending", &self.pending())
            .field("had_errors", &self.had_errors)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn utf8_to(to: &str) -> Transcoder {
        Transcoder::new(&Charset::utf_8(), &Charset::new(to)).unwrap()
    }

    #[test]
    fn test_split_character_is_carried() {
        let mut transcoder = utf8_to("utf-8");
        let mut out = Vec::new();
        let euro = "€".as_bytes();

        transcoder.feed(&euro[..1], &mut out);
        assert!(out.is_empty());
        assert_eq!(transcoder.pending(), &euro[..1]);

        transcoder.feed(&euro[1..2], &mut out);
        assert_eq!(transcoder.pending(), &euro[..2]);

        transcoder.feed(&euro[2..], &mut out);
        assert!(transcoder.pending().is_empty());
        transcoder.finish(&mut out);

        assert_eq!(out, euro);
        assert!(!transcoder.had_errors());
    }

    #[test]
    fn test_invalid_byte_replaced() {
        let mut transcoder = utf8_to("utf-8");
        assert_eq!(transcoder.convert_bytes(b"a\xffb"), b"a?b");
        assert!(transcoder.had_errors());
    }

    #[test]
    fn test_truncated_tail_replaced_per_byte() {
        let mut transcoder = utf8_to("utf-8");
        assert_eq!(transcoder.convert_bytes(b"ok\xe2\x82"), b"ok??");
    }

    #[test]
    fn test_custom_replacement() {
        let options = ConverterOptions::new().with_invalid_sequence("\u{fffd}");
        let mut transcoder =
            Transcoder::with_options(&Charset::utf_8(), &Charset::utf_8(), &options).unwrap();
        assert_eq!(transcoder.convert_bytes(b"x\xffy"), "x\u{fffd}y".as_bytes());
    }

    #[test]
    fn test_empty_replacement_drops_invalid_bytes() {
        let options = ConverterOptions::new().with_invalid_sequence("");
        let mut transcoder =
            Transcoder::with_options(&Charset::utf_8(), &Charset::utf_8(), &options).unwrap();
        assert_eq!(transcoder.convert_bytes(b"x\xff\xfey"), b"xy");
    }

    #[test]
    fn test_stream_conversion() {
        let text = "é".repeat(CHUNK_SIZE);
        let mut input = text.as_bytes();
        let mut output = Vec::new();
        utf8_to("iso-8859-1").convert(&mut input, &mut output).unwrap();
        assert_eq!(output, vec![0xe9; CHUNK_SIZE]);
    }

    #[test]
    fn test_session_reusable_after_finish() {
        let mut transcoder = utf8_to("iso-2022-jp");
        let first = transcoder.convert_bytes("\u{65e5}".as_bytes());
        let second = transcoder.convert_bytes("\u{65e5}".as_bytes());
        assert_eq!(first, second);
    }

    #[test]
    fn test_iso_2022_jp_every_split() {
        let text = "日本語テキスト";
        let bytes = Charset::new("iso-2022-jp").encode_str(text).unwrap();
        let from = Charset::new("iso-2022-jp");

        for split in 0..=bytes.len() {
            let mut transcoder = Transcoder::new(&from, &Charset::utf_8()).unwrap();
            let mut out = Vec::new();
            transcoder.feed(&bytes[..split], &mut out);
            transcoder.feed(&bytes[split..], &mut out);
            transcoder.finish(&mut out);
            assert_eq!(out, text.as_bytes(), "split at {split}");
            assert!(!transcoder.had_errors(), "split at {split}");
        }
    }

    #[test]
    fn test_iso_2022_jp_longer_than_one_block() {
        let text = "日本語".repeat(1000);
        let charset = Charset::new("iso-2022-jp");
        let bytes = charset.encode_str(&text).unwrap();
        assert!(bytes.len() > CHUNK_SIZE);
        assert_eq!(charset.decode_to_string(&bytes).unwrap(), text);
    }

    #[test]
    fn test_replacement_leaves_shift_mode() {
        let mut transcoder = utf8_to("iso-2022-jp");
        let out = transcoder.convert_bytes(b"\xe6\x97\xa5\xff\xe6\x97\xa5");
        assert!(transcoder.had_errors());
        assert_eq!(
            Charset::new("iso-2022-jp").decode_to_string(&out).unwrap(),
            "日?日"
        );
    }

    #[test]
    fn test_invalid_after_held_bytes() {
        let mut transcoder = utf8_to("utf-8");
        let mut out = Vec::new();
        transcoder.feed(b"a\xe2", &mut out);
        transcoder.feed(b"(b", &mut out);
        transcoder.finish(&mut out);
        assert_eq!(out, b"a?(b");
    }

    #[test]
    fn test_carry_capacity() {
        let mut carry = Carry::default();
        assert!(carry.store(b"\xf0\x9f\x98"));
        assert!(!carry.store(b"12345"));
        assert_eq!(carry.take(), b"\xf0\x9f\x98");
        assert!(carry.as_slice().is_empty());
    }

    struct Upper;

    impl ConversionHandle for Upper {
        fn convert(&mut self, input: &[u8], output: &mut Vec<u8>, _last: bool) -> ConvertStatus {
            let valid = input.iter().take_while(|b| b.is_ascii()).count();
            output.extend(input[..valid].iter().map(u8::to_ascii_uppercase));
            if valid == input.len() {
                ConvertStatus::complete(valid)
            } else {
                ConvertStatus::invalid(valid + 1)
            }
        }

        fn finish(&mut self, _output: &mut Vec<u8>) {}
    }

    #[test]
    fn test_pluggable_handle() {
        let charset = Charset::us_ascii();
        let mut transcoder =
            Transcoder::with_handle(Box::new(Upper), &charset, &charset, b"#".to_vec());
        assert_eq!(transcoder.convert_bytes(b"ab\x80c"), b"AB#C");
    }
}
