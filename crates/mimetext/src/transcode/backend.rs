//! Conversion backends.
//!
//! A backend opens a [`ConversionHandle`] for a pair of charsets. The handle
//! converts as much of its input as it can and reports where it stopped;
//! recovery from bad input is left to the [`Transcoder`](super::Transcoder).

use super::MAX_CHAR_WIDTH;
use crate::charset::Charset;
use crate::error::{Error, Result};
use encoding_rs::{Decoder, DecoderResult, Encoder, EncoderResult, Encoding};

/// How a conversion call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertOutcome {
    /// All input was converted.
    Complete,
    /// The input ends with the start of a character that needs more bytes.
    Incomplete,
    /// Invalid input was rejected; one replacement is due.
    Invalid,
}

/// Result of [`ConversionHandle::convert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertStatus {
    /// Number of input bytes used.
    ///
    /// For [`ConvertOutcome::Incomplete`] this is the offset of the
    /// unfinished character, which is left for the next call. For
    /// [`ConvertOutcome::Invalid`] it includes the rejected byte, if the
    /// rejected byte belongs to this input.
    pub consumed: usize,
    /// Why conversion stopped.
    pub outcome: ConvertOutcome,
}

impl ConvertStatus {
    /// All of `consumed` bytes were converted.
    #[must_use]
    pub const fn complete(consumed: usize) -> Self {
        Self {
            consumed,
            outcome: ConvertOutcome::Complete,
        }
    }

    /// The bytes from `offset` on start a character that is not finished yet.
    #[must_use]
    pub const fn incomplete(offset: usize) -> Self {
        Self {
            consumed: offset,
            outcome: ConvertOutcome::Incomplete,
        }
    }

    /// Conversion stopped after rejecting invalid input.
    #[must_use]
    pub const fn invalid(consumed: usize) -> Self {
        Self {
            consumed,
            outcome: ConvertOutcome::Invalid,
        }
    }
}

/// An open conversion between two charsets.
///
/// A handle sees the stream as one continuous sequence of bytes, so it
/// may keep decoder state (shift modes, partial characters) across calls.
/// Closing the handle is `Drop`.
pub trait ConversionHandle: Send {
    /// Converts a prefix of `input`, appending the result to `output`.
    ///
    /// Each [`ConvertOutcome::Invalid`] status stands for one rejected byte
    /// and must make progress. With `last` set no more input follows: bytes
    /// that can no longer complete a character are reported as invalid and
    /// nothing is left incomplete.
    fn convert(&mut self, input: &[u8], output: &mut Vec<u8>, last: bool) -> ConvertStatus;

    /// Flushes any output shift state and resets the handle for reuse.
    fn finish(&mut self, output: &mut Vec<u8>);
}

/// Opens conversion handles.
pub trait ConversionBackend {
    /// Opens a handle converting `from` into `to`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConversionUnavailable`] if the pair is not supported.
    fn open(&self, from: &Charset, to: &Charset) -> Result<Box<dyn ConversionHandle>>;
}

/// Backend built on `encoding_rs`.
///
/// Charsets are looked up by their WHATWG labels. Labels that resolve to
/// the `replacement` encoding are unavailable, as are destinations that
/// `encoding_rs` cannot encode into (UTF-16).
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodingRsBackend;

impl EncodingRsBackend {
    /// Resolves a charset to an `encoding_rs` encoding.
    #[must_use]
    pub fn lookup(charset: &Charset) -> Option<&'static Encoding> {
        Encoding::for_label_no_replacement(charset.name().trim().as_bytes())
    }
}

impl ConversionBackend for EncodingRsBackend {
    fn open(&self, from: &Charset, to: &Charset) -> Result<Box<dyn ConversionHandle>> {
        let unavailable = || Error::unavailable(from.name(), to.name());

        let source = Self::lookup(from).ok_or_else(unavailable)?;
        let dest = Self::lookup(to).ok_or_else(unavailable)?;
        if dest.output_encoding() != dest {
            return Err(unavailable());
        }

        tracing::trace!(from = source.name(), to = dest.name(), "Opened conversion");
        Ok(Box::new(EncodingRsHandle::new(source, dest)))
    }
}

/// Input the decoder has already been through, in stream order.
///
/// After a malformed sequence the decoder is past bytes the caller will
/// hand back on the next calls; they are replayed from here instead of
/// being decoded twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Backlog {
    /// Rejected bytes from earlier calls still owed a replacement.
    owed: usize,
    /// Rejected bytes at the front of the next input.
    rejected: usize,
    /// Accepted bytes after those.
    accepted: usize,
}

impl Backlog {
    /// Pops the next rejection, returning how many input bytes it covers.
    fn next_rejection(&mut self) -> Option<usize> {
        if self.owed > 0 {
            self.owed -= 1;
            Some(0)
        } else if self.rejected > 0 {
            self.rejected -= 1;
            Some(1)
        } else {
            None
        }
    }
}

/// Decodes into UTF-8, then encodes into the destination.
///
/// One decoder lives for the whole stream and alone decides what is valid,
/// so stateful charsets such as ISO-2022-JP keep their shift state across
/// calls.
struct EncodingRsHandle {
    source: &'static Encoding,
    dest: &'static Encoding,
    decoder: Decoder,
    encoder: Encoder,
    backlog: Backlog,
    scratch: String,
}

impl EncodingRsHandle {
    fn new(source: &'static Encoding, dest: &'static Encoding) -> Self {
        Self {
            source,
            dest,
            decoder: source.new_decoder_without_bom_handling(),
            encoder: dest.new_encoder(),
            backlog: Backlog::default(),
            scratch: String::new(),
        }
    }

    /// Length of the trailing bytes to hold back for the next call.
    ///
    /// Only affects how much output waits for more input; validity is
    /// decided by the session decoder.
    fn held_tail(&self, input: &[u8]) -> usize {
        (1..=MAX_CHAR_WIDTH.min(input.len()))
            .rev()
            .find(|&len| self.is_incomplete_prefix(&input[input.len() - len..]))
            .unwrap_or(0)
    }

    /// Returns true if `tail` decodes to nothing yet without an error.
    fn is_incomplete_prefix(&self, tail: &[u8]) -> bool {
        let mut decoder = self.source.new_decoder_without_bom_handling();
        let mut sink = String::new();
        reserve_utf8(&decoder, &mut sink, tail.len());
        let (result, read) = decoder.decode_to_string_without_replacement(tail, &mut sink, false);
        result == DecoderResult::InputEmpty && read == tail.len() && sink.is_empty()
    }

    /// Records a malformed sequence reported at `read` and returns the
    /// status for its first rejected byte.
    fn reject(&mut self, read: usize, bad: usize, extra: usize) -> ConvertStatus {
        let ends = read.saturating_sub(extra);
        let in_input = bad.min(ends);
        let start = ends - in_input;
        self.backlog = Backlog {
            owed: bad - in_input,
            rejected: in_input,
            accepted: read - ends,
        };
        let skipped = self.backlog.next_rejection().unwrap_or(0);
        ConvertStatus::invalid(start + skipped)
    }

    fn flush_scratch(&mut self, output: &mut Vec<u8>) {
        encode_text(&mut self.encoder, &self.scratch, output, false);
        self.scratch.clear();
    }

    /// Returns the output to its initial shift state.
    fn reset_encoder(&mut self, output: &mut Vec<u8>) {
        encode_text(&mut self.encoder, "", output, true);
        self.encoder = self.dest.new_encoder();
    }
}

impl ConversionHandle for EncodingRsHandle {
    fn convert(&mut self, input: &[u8], output: &mut Vec<u8>, last: bool) -> ConvertStatus {
        if let Some(skipped) = self.backlog.next_rejection() {
            return ConvertStatus::invalid(skipped);
        }

        let mut offset = std::mem::take(&mut self.backlog.accepted).min(input.len());
        let end = if last {
            input.len()
        } else {
            input.len() - self.held_tail(&input[offset..])
        };

        loop {
            reserve_utf8(&self.decoder, &mut self.scratch, end - offset);
            let (result, read) = self.decoder.decode_to_string_without_replacement(
                &input[offset..end],
                &mut self.scratch,
                last,
            );
            offset += read;

            match result {
                DecoderResult::InputEmpty => break,
                DecoderResult::OutputFull => {}
                DecoderResult::Malformed(bad, extra) => {
                    self.flush_scratch(output);
                    // Replacements go out in the initial shift state.
                    self.reset_encoder(output);
                    return self.reject(offset, usize::from(bad), usize::from(extra));
                }
            }
        }

        self.flush_scratch(output);
        if last {
            self.decoder = self.source.new_decoder_without_bom_handling();
        }
        if end < input.len() {
            ConvertStatus::incomplete(end)
        } else {
            ConvertStatus::complete(input.len())
        }
    }

    fn finish(&mut self, output: &mut Vec<u8>) {
        self.flush_scratch(output);
        self.reset_encoder(output);
        self.decoder = self.source.new_decoder_without_bom_handling();
        self.backlog = Backlog::default();
    }
}

/// Encodes `text`, writing `?` for characters the destination lacks.
fn encode_text(encoder: &mut Encoder, text: &str, output: &mut Vec<u8>, last: bool) {
    let mut offset = 0;
    loop {
        let rest = &text[offset..];
        let needed = encoder
            .max_buffer_length_from_utf8_without_replacement(rest.len())
            .unwrap_or(rest.len() * MAX_CHAR_WIDTH + 16);
        output.reserve(needed);

        let (result, read) = encoder.encode_from_utf8_to_vec_without_replacement(rest, output, last);
        offset += read;

        match result {
            EncoderResult::InputEmpty => break,
            EncoderResult::OutputFull => grow(output),
            EncoderResult::Unmappable(_) => encode_text(encoder, "?", output, false),
        }
    }
}

fn reserve_utf8(decoder: &Decoder, sink: &mut String, input_len: usize) {
    let needed = decoder
        .max_utf8_buffer_length_without_replacement(input_len)
        .unwrap_or(input_len * 3 + 16);
    sink.reserve(needed);
}

fn grow(output: &mut Vec<u8>) {
    let spare = output.capacity() - output.len();
    output.reserve(spare * 2 + 16);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn open(from: &str, to: &str) -> Box<dyn ConversionHandle> {
        EncodingRsBackend
            .open(&Charset::new(from), &Charset::new(to))
            .unwrap()
    }

    #[test]
    fn test_complete() {
        let mut handle = open("utf-8", "iso-8859-1");
        let mut out = Vec::new();
        let status = handle.convert("café".as_bytes(), &mut out, false);
        assert_eq!(status, ConvertStatus::complete(5));
        assert_eq!(out, b"caf\xe9");
    }

    #[test]
    fn test_incomplete_tail() {
        let mut handle = open("utf-8", "utf-8");
        let mut out = Vec::new();
        let status = handle.convert(b"ab\xe2\x82", &mut out, false);
        assert_eq!(status, ConvertStatus::incomplete(2));
        assert_eq!(out, b"ab");
    }

    #[test]
    fn test_invalid_sequence() {
        let mut handle = open("utf-8", "utf-8");
        let mut out = Vec::new();
        let status = handle.convert(b"ab\xffcd", &mut out, false);
        assert_eq!(status, ConvertStatus::invalid(3));
        assert_eq!(out, b"ab");

        let status = handle.convert(b"cd", &mut out, false);
        assert_eq!(status, ConvertStatus::complete(2));
        assert_eq!(out, b"abcd");
    }

    #[test]
    fn test_truncated_tail_rejected_per_byte_at_end() {
        let mut handle = open("utf-8", "utf-8");
        let mut out = Vec::new();
        let input = b"\xe2\x82";

        let first = handle.convert(input, &mut out, true);
        assert_eq!(first.outcome, ConvertOutcome::Invalid);
        let mut consumed = first.consumed;
        let mut rejections = 1;
        loop {
            let status = handle.convert(&input[consumed..], &mut out, true);
            consumed += status.consumed;
            if status.outcome == ConvertOutcome::Complete {
                break;
            }
            rejections += 1;
        }
        assert_eq!(rejections, 2);
        assert_eq!(consumed, 2);
        assert!(out.is_empty());
    }

    #[test]
    fn test_unmappable_becomes_question_mark() {
        let mut handle = open("utf-8", "iso-8859-1");
        let mut out = Vec::new();
        handle.convert("a\u{4e2d}b".as_bytes(), &mut out, false);
        assert_eq!(out, b"a?b");
    }

    #[test]
    fn test_unmappable_in_shift_mode_stays_decodable() {
        let mut handle = open("utf-8", "iso-2022-jp");
        let mut out = Vec::new();
        handle.convert("日\u{1f600}本".as_bytes(), &mut out, true);
        handle.finish(&mut out);
        let (decoded, _, had_errors) = encoding_rs::ISO_2022_JP.decode(&out);
        assert!(!had_errors);
        assert_eq!(decoded, "日?本");
    }

    #[test]
    fn test_shift_state_flushed() {
        let mut handle = open("utf-8", "iso-2022-jp");
        let mut out = Vec::new();
        handle.convert("\u{65e5}".as_bytes(), &mut out, false);
        handle.finish(&mut out);
        assert!(out.starts_with(b"\x1b$B"));
        assert!(out.ends_with(b"\x1b(B"));
    }

    #[test]
    fn test_shift_state_kept_across_calls() {
        let bytes = encoding_rs::ISO_2022_JP.encode("日本").0.into_owned();
        let mut handle = open("iso-2022-jp", "utf-8");
        let mut out = Vec::new();

        assert_eq!(handle.convert(&bytes[..5], &mut out, false), ConvertStatus::complete(5));
        // A lone JIS lead byte reads as ASCII to a fresh decoder.
        assert_eq!(handle.convert(&bytes[5..6], &mut out, false), ConvertStatus::complete(1));
        assert_eq!(out, "日".as_bytes());

        let status = handle.convert(&bytes[6..], &mut out, true);
        assert_eq!(status, ConvertStatus::complete(bytes.len() - 6));
        assert_eq!(out, "日本".as_bytes());
    }

    #[test]
    fn test_unavailable_pairs() {
        let backend = EncodingRsBackend;
        let utf8 = Charset::utf_8();
        assert!(backend.open(&Charset::new("x-bogus"), &utf8).is_err());
        assert!(backend.open(&utf8, &Charset::new("utf-16le")).is_err());
        assert!(backend.open(&Charset::new("iso-2022-kr"), &utf8).is_err());
        assert!(backend.open(&Charset::new("utf-16le"), &utf8).is_ok());
    }
}
