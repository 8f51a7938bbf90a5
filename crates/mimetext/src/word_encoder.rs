//! Splits a word into encoded chunks that fit a length budget.
//!
//! When the word's charset can be converted to and from UTF-8, the encoder
//! works on whole characters, so a multi-byte character is never cut in
//! half across two encoded words. Otherwise it falls back to raw bytes.

use crate::charset::Charset;
use crate::encoding::{WordEncoding, ascii_percent, q_encoded_len};
use crate::transcode::Transcoder;

/// Below this share of 7-bit bytes, Base64 is shorter than Q.
const BASE64_THRESHOLD_PERCENT: usize = 60;

/// Chooses the transfer encoding for `buffer` in `charset`.
///
/// The charset's recommendation wins; otherwise mostly-ASCII text uses Q
/// and everything else Base64.
#[must_use]
pub fn guess_best_encoding(buffer: &[u8], charset: &Charset) -> WordEncoding {
    charset.recommended_encoding().unwrap_or_else(|| {
        if ascii_percent(buffer) < BASE64_THRESHOLD_PERCENT {
            WordEncoding::Base64
        } else {
            WordEncoding::QuotedPrintable
        }
    })
}

/// Returns true if `buffer` cannot be written to a header as is.
///
/// That is the case for charsets that recommend an encoding, for any
/// 8-bit byte, for line breaks and for text that would read back as the
/// start of an encoded word.
#[must_use]
pub fn is_encoding_needed(buffer: &[u8], charset: &Charset) -> bool {
    charset.recommended_encoding().is_some()
        || buffer
            .iter()
            .any(|&byte| !byte.is_ascii() || byte == b'\r' || byte == b'\n')
        || buffer.windows(2).any(|pair| pair == b"=?")
}

enum Source {
    /// Decoded text, re-encoded into the charset chunk by chunk.
    Unicode {
        text: String,
        pos: usize,
        back: Transcoder,
    },
    /// Native bytes, cut wherever the budget ends.
    Raw { bytes: Vec<u8>, pos: usize },
}

/// An encoding session over a single word.
pub struct WordEncoder {
    charset: Charset,
    encoding: WordEncoding,
    source: Source,
}

impl WordEncoder {
    /// Starts encoding `buffer`, using the best encoding for its content.
    #[must_use]
    pub fn new(buffer: &[u8], charset: &Charset) -> Self {
        Self::with_encoding(buffer, charset, guess_best_encoding(buffer, charset))
    }

    /// Starts encoding `buffer` with a fixed transfer encoding.
    #[must_use]
    pub fn with_encoding(buffer: &[u8], charset: &Charset, encoding: WordEncoding) -> Self {
        let utf8 = Charset::utf_8();
        let source = match (
            Transcoder::new(charset, &utf8),
            Transcoder::new(&utf8, charset),
        ) {
            (Ok(mut forward), Ok(back)) => {
                let decoded = forward.convert_bytes(buffer);
                Source::Unicode {
                    text: String::from_utf8_lossy(&decoded).into_owned(),
                    pos: 0,
                    back,
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::debug!(charset = charset.name(), error = %e, "Encoding raw bytes");
                Source::Raw {
                    bytes: buffer.to_vec(),
                    pos: 0,
                }
            }
        };

        Self {
            charset: charset.clone(),
            encoding,
            source,
        }
    }

    /// Returns the transfer encoding in use.
    #[must_use]
    pub const fn encoding(&self) -> WordEncoding {
        self.encoding
    }

    /// Returns the charset being encoded.
    #[must_use]
    pub const fn charset(&self) -> &Charset {
        &self.charset
    }

    /// Returns true if chunks are cut at character boundaries.
    #[must_use]
    pub const fn is_unicode(&self) -> bool {
        matches!(self.source, Source::Unicode { .. })
    }

    /// Returns true once every byte has been handed out.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        match &self.source {
            Source::Unicode { text, pos, .. } => *pos >= text.len(),
            Source::Raw { bytes, pos } => *pos >= bytes.len(),
        }
    }

    /// Returns the next encoded chunk, at most `max_encoded_length` long.
    ///
    /// At least one character (or byte) is always taken, even if it alone
    /// exceeds the budget. Returns an empty string when exhausted or when
    /// the budget is zero.
    pub fn next_chunk(&mut self, max_encoded_length: usize) -> String {
        if max_encoded_length == 0 || self.is_exhausted() {
            return String::new();
        }
        let encoding = self.encoding;

        let bytes = match &mut self.source {
            Source::Unicode { text, pos, back } => {
                next_unicode_chunk(text, pos, back, encoding, max_encoded_length)
            }
            Source::Raw { bytes, pos } => {
                next_raw_chunk(bytes, pos, encoding, max_encoded_length)
            }
        };

        encoding.encode(&bytes)
    }
}

impl std::fmt::Debug for WordEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordEncoder")
            .field("charset", &self.charset)
            .field("encoding", &self.encoding)
            .field("unicode", &self.is_unicode())
            .finish_non_exhaustive()
    }
}

fn next_unicode_chunk(
    text: &str,
    pos: &mut usize,
    back: &mut Transcoder,
    encoding: WordEncoding,
    max: usize,
) -> Vec<u8> {
    let rest = &text[*pos..];
    let mut taken: Option<(usize, Vec<u8>)> = None;

    for (offset, ch) in rest.char_indices() {
        let end = offset + ch.len_utf8();
        let candidate = back.convert_bytes(&rest.as_bytes()[..end]);
        let len = encoding.encoded_len(&candidate);
        if len > max && taken.is_some() {
            break;
        }
        taken = Some((end, candidate));
        if len >= max {
            break;
        }
    }

    let (end, bytes) = taken.unwrap_or_default();
    *pos += end;
    bytes
}

fn next_raw_chunk(bytes: &[u8], pos: &mut usize, encoding: WordEncoding, max: usize) -> Vec<u8> {
    let rest = &bytes[*pos..];
    let take = match encoding {
        WordEncoding::Base64 => (max / 4 * 3).max(1),
        WordEncoding::QuotedPrintable => {
            let mut total = 0;
            let mut take = 0;
            for &byte in rest {
                let len = q_encoded_len(byte);
                if take > 0 && total + len > max {
                    break;
                }
                total += len;
                take += 1;
            }
            take
        }
    };

    let take = take.min(rest.len());
    *pos += take;
    rest[..take].to_vec()
}
