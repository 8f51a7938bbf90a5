//! Words: runs of header text sharing one charset.
//!
//! A word is either written as is (optionally quoted, folded at
//! whitespace) or as one or more RFC 2047 encoded words. The choice is
//! made per word by a small state machine:
//!
//! ```text
//! Quoting ──────────────────────────→ done
//! RawFold ── run longer than a line ─→ EncodedFold ──→ done
//!    └───────────────────────────────────────────────→ done
//! ```

mod parse;

pub(crate) use parse::parse_tokens;

use crate::charset::Charset;
use crate::encoding::WordEncoding;
use crate::error::Result;
use crate::options::GenerationOptions;
use crate::word_encoder::{WordEncoder, guess_best_encoding, is_encoding_needed};
use std::io::{self, Write};

/// Smallest payload worth starting an encoded word for.
const MIN_CHUNK_LENGTH: usize = 10;

const ENCODED_SUFFIX: &[u8] = b"?=";

/// Returns true for folding whitespace within a line.
pub(crate) const fn is_fws(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t')
}

/// A run of text in a single charset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    buffer: Vec<u8>,
    charset: Charset,
    language: Option<String>,
    encoding: Option<WordEncoding>,
}

impl Word {
    /// Creates a word from bytes already encoded in `charset`.
    #[must_use]
    pub fn new(buffer: impl Into<Vec<u8>>, charset: Charset) -> Self {
        Self {
            buffer: buffer.into(),
            charset,
            language: None,
            encoding: None,
        }
    }

    /// Sets the RFC 2231 language tag. Tagged words are always encoded.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Sets the transfer encoding. A word with a transfer encoding is
    /// always written as encoded words.
    ///
    /// Words parsed from encoded words keep the encoding they arrived in.
    #[must_use]
    pub const fn with_encoding(mut self, encoding: WordEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Returns the charset of the raw bytes.
    #[must_use]
    pub const fn charset(&self) -> &Charset {
        &self.charset
    }

    /// Returns the language tag, if any.
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Returns the preferred transfer encoding, if one was set.
    #[must_use]
    pub const fn encoding(&self) -> Option<WordEncoding> {
        self.encoding
    }

    /// Returns true if the word has no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub(crate) fn push_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Returns the content converted to `charset`.
    ///
    /// # Errors
    ///
    /// Returns an error if no converter exists between the two charsets.
    pub fn converted_text(&self, charset: &Charset) -> Result<Vec<u8>> {
        if self.charset == *charset {
            return Ok(self.buffer.clone());
        }
        Charset::convert(&self.buffer, &self.charset, charset)
    }

    /// Returns the content as a Unicode string.
    ///
    /// # Errors
    ///
    /// Returns an error if the word's charset cannot be converted to UTF-8.
    pub fn to_unicode(&self) -> Result<String> {
        let utf8 = self.converted_text(&Charset::utf_8())?;
        Ok(String::from_utf8_lossy(&utf8).into_owned())
    }

    /// Returns true if this word will be written as encoded words.
    #[must_use]
    pub fn needs_encoding(&self, options: &GenerationOptions) -> bool {
        if options.force_no_encoding {
            false
        } else if options.force_encoding {
            true
        } else {
            self.language.is_some()
                || self.encoding.is_some()
                || is_encoding_needed(&self.buffer, &self.charset)
        }
    }

    /// Writes the word, folding as needed.
    ///
    /// `cur_line_pos` is the column the word starts at. Returns the column
    /// after the word. Trailing whitespace may be held in `state` until the
    /// next word is written; call [`GeneratorState::finish`] at the end.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails.
    pub fn generate<W: Write + ?Sized>(
        &self,
        out: &mut W,
        options: &GenerationOptions,
        cur_line_pos: usize,
        state: &mut GeneratorState,
    ) -> io::Result<usize> {
        let mut buf = Vec::new();
        let pos = self.append_to(&mut buf, options, cur_line_pos, state);
        out.write_all(&buf)?;
        Ok(pos)
    }

    /// Appends the generated form to `out`. Returns the column after it.
    pub(crate) fn append_to(
        &self,
        out: &mut Vec<u8>,
        options: &GenerationOptions,
        cur_line_pos: usize,
        state: &mut GeneratorState,
    ) -> usize {
        if self.buffer.is_empty() {
            return cur_line_pos;
        }

        let mut fold = self.initial_state(options, cur_line_pos);
        loop {
            let step = match fold {
                FoldState::Quoting => self.write_quoted(out, cur_line_pos, state),
                FoldState::RawFold => self.write_raw(out, options, cur_line_pos, state),
                FoldState::EncodedFold => self.write_encoded(out, options, cur_line_pos, state),
            };
            match step {
                Step::Done(pos) => return pos,
                Step::Enter(next) => fold = next,
            }
        }
    }

    fn initial_state(&self, options: &GenerationOptions, cur_line_pos: usize) -> FoldState {
        if self.needs_encoding(options) {
            FoldState::EncodedFold
        } else if options.quote_if_possible
            && !self.buffer.iter().any(|&b| b == b'"' || b == b'\\')
            && cur_line_pos + 2 + self.buffer.len() <= options.max_line_length
        {
            FoldState::Quoting
        } else {
            FoldState::RawFold
        }
    }

    fn write_quoted(
        &self,
        out: &mut Vec<u8>,
        cur_line_pos: usize,
        state: &mut GeneratorState,
    ) -> Step {
        if let Some(ws) = state.pending_whitespace.take() {
            out.push(ws);
        }
        out.push(b'"');
        out.extend_from_slice(&self.buffer);
        out.push(b'"');

        state.is_first_word = false;
        state.previous_word_encoded = false;
        state.last_char_is_space = false;
        Step::Done(cur_line_pos + 2 + self.buffer.len())
    }

    fn write_raw(
        &self,
        out: &mut Vec<u8>,
        options: &GenerationOptions,
        cur_line_pos: usize,
        state: &mut GeneratorState,
    ) -> Step {
        let max = options.max_line_length;
        if !options.force_no_encoding && longest_run(&self.buffer) >= max {
            tracing::debug!(max, len = self.buffer.len(), "Unfoldable run, encoding word");
            return Step::Enter(FoldState::EncodedFold);
        }

        // The held-back whitespace is already counted in the column.
        let mut text = Vec::with_capacity(self.buffer.len() + 1);
        let mut line_len = cur_line_pos;
        if let Some(ws) = state.pending_whitespace.take() {
            text.push(ws);
            line_len = line_len.saturating_sub(1);
        }
        text.extend_from_slice(&self.buffer);

        let mut start = 0;
        let mut last_ws = None;
        let mut i = 0;
        while i < text.len() {
            if line_len + (i - start) + 1 > max {
                let candidate = if is_fws(text[i]) { Some(i) } else { last_ws };
                if let Some(ws) = candidate.filter(|&ws| ws > start || line_len > 1) {
                    out.extend_from_slice(&text[start..ws]);
                    out.extend_from_slice(b"\r\n");
                    out.push(text[ws]);
                    line_len = 1;
                    start = ws + 1;
                    i = start;
                    last_ws = None;
                    continue;
                }
            }
            if is_fws(text[i]) {
                last_ws = Some(i);
            }
            i += 1;
        }

        let mut end = text.len();
        if end > start && is_fws(text[end - 1]) {
            end -= 1;
            state.pending_whitespace = Some(text[end]);
        }
        out.extend_from_slice(&text[start..end]);

        state.is_first_word = false;
        state.previous_word_encoded = false;
        state.last_char_is_space = text.last().is_some_and(|&b| is_fws(b));
        Step::Done(line_len + (text.len() - start))
    }

    fn write_encoded(
        &self,
        out: &mut Vec<u8>,
        options: &GenerationOptions,
        cur_line_pos: usize,
        state: &mut GeneratorState,
    ) -> Step {
        let encoding = self
            .encoding
            .unwrap_or_else(|| guess_best_encoding(&self.buffer, &self.charset));
        let mut encoder = WordEncoder::with_encoding(&self.buffer, &self.charset, encoding);
        let prefix = self.encoded_prefix(encoding);
        let overhead = prefix.len() + ENCODED_SUFFIX.len();
        let max = options.encoded_line_length();

        let pending = state.pending_whitespace.take();
        let needs_separator = !state.is_first_word
            && state.previous_word_encoded
            && !state.last_char_is_space
            && pending.is_none();
        let can_fold = pending.is_some() || state.is_first_word || state.previous_word_encoded;

        let mut line = cur_line_pos;
        if can_fold
            && line > 1
            && line + usize::from(needs_separator) + overhead + MIN_CHUNK_LENGTH > max
        {
            out.extend_from_slice(b"\r\n");
            out.push(pending.unwrap_or(b' '));
            line = 1;
        } else if let Some(ws) = pending {
            out.push(ws);
        } else if needs_separator {
            out.push(b' ');
            line += 1;
        }

        // A budget too small for one character still takes one, so lines
        // only overflow when a single character cannot fit.
        let mut first = true;
        loop {
            let budget = if first {
                max.saturating_sub(line + overhead)
            } else {
                max.saturating_sub(1 + overhead)
            };
            let chunk = encoder.next_chunk(budget.max(1));
            if chunk.is_empty() {
                break;
            }
            if !first {
                out.extend_from_slice(b"\r\n ");
                line = 1;
            }
            out.extend_from_slice(prefix.as_bytes());
            out.extend_from_slice(chunk.as_bytes());
            out.extend_from_slice(ENCODED_SUFFIX);
            line += overhead + chunk.len();
            first = false;
        }

        state.is_first_word = false;
        state.previous_word_encoded = true;
        state.last_char_is_space = false;
        Step::Done(line)
    }

    fn encoded_prefix(&self, encoding: WordEncoding) -> String {
        match &self.language {
            Some(language) => format!("=?{}*{language}?{}?", self.charset, encoding.letter()),
            None => format!("=?{}?{}?", self.charset, encoding.letter()),
        }
    }
}

/// Folding strategy for one word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FoldState {
    Quoting,
    RawFold,
    EncodedFold,
}

enum Step {
    Done(usize),
    Enter(FoldState),
}

/// Length of the longest run without folding whitespace.
fn longest_run(buffer: &[u8]) -> usize {
    buffer
        .split(|&b| is_fws(b))
        .map(<[u8]>::len)
        .max()
        .unwrap_or(0)
}

/// State carried between the words of one generation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorState {
    is_first_word: bool,
    previous_word_encoded: bool,
    last_char_is_space: bool,
    pending_whitespace: Option<u8>,
}

impl GeneratorState {
    /// Creates the state for a new pass.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            is_first_word: true,
            previous_word_encoded: false,
            last_char_is_space: false,
            pending_whitespace: None,
        }
    }

    /// Returns true if no word has been written yet.
    #[must_use]
    pub const fn is_first_word(&self) -> bool {
        self.is_first_word
    }

    /// Returns true if the last word was written encoded.
    #[must_use]
    pub const fn previous_word_encoded(&self) -> bool {
        self.previous_word_encoded
    }

    /// Returns true if the last word ended with whitespace.
    #[must_use]
    pub const fn last_char_is_space(&self) -> bool {
        self.last_char_is_space
    }

    /// Returns the whitespace held back from the last word.
    #[must_use]
    pub const fn pending_whitespace(&self) -> Option<u8> {
        self.pending_whitespace
    }

    /// Writes any held-back whitespace.
    ///
    /// The column returned by the last [`Word::generate`] already counts it.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails.
    pub fn finish<W: Write + ?Sized>(&mut self, out: &mut W) -> io::Result<()> {
        if let Some(ws) = self.pending_whitespace.take() {
            out.write_all(&[ws])?;
        }
        Ok(())
    }

    pub(crate) fn append_pending(&mut self, out: &mut Vec<u8>) {
        out.extend(self.pending_whitespace.take());
    }
}

impl Default for GeneratorState {
    fn default() -> Self {
        Self::new()
    }
}
