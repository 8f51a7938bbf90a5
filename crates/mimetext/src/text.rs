//! Header text as a sequence of words.

use crate::charset::Charset;
use crate::encoding::ascii_percent;
use crate::error::Result;
use crate::options::GenerationOptions;
use crate::word::{GeneratorState, Word, is_fws, parse_tokens};
use crate::word_encoder::is_encoding_needed;
use std::fmt;
use std::io::{self, Write};

/// Below this share of 7-bit bytes, a string is kept as a single word.
const SPLIT_THRESHOLD_PERCENT: usize = 60;

/// Unstructured header text, possibly mixing charsets.
///
/// ```
/// use mimetext::{Charset, GenerationOptions, Text};
///
/// let text = Text::from_unicode("Hello Été bar", &Charset::utf_8())?;
/// let encoded = text.encode(&GenerationOptions::default());
/// assert_eq!(encoded, b"Hello =?utf-8?B?w4l0w6k=?= bar");
///
/// let decoded = Text::decode(&encoded);
/// assert_eq!(decoded.to_unicode()?, "Hello Été bar");
/// # Ok::<(), mimetext::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Text {
    words: Vec<Word>,
}

impl Text {
    /// Creates an empty text.
    #[must_use]
    pub const fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Builds a text from bytes in `charset`.
    ///
    /// Mostly-ASCII input is split at whitespace so that only the parts
    /// that need it get encoded. Other input, and input in a charset that
    /// always needs encoding, becomes a single word.
    #[must_use]
    pub fn create_from_string(bytes: &[u8], charset: &Charset) -> Self {
        let mut text = Self::new();
        if bytes.is_empty() {
            return text;
        }
        if charset.recommended_encoding().is_some()
            || ascii_percent(bytes) < SPLIT_THRESHOLD_PERCENT
        {
            text.append_word(Word::new(bytes, charset.clone()));
            return text;
        }

        let mut splitter = Splitter::new(charset);
        let mut pos = 0;
        while pos < bytes.len() {
            let ws_len = bytes[pos..].iter().take_while(|&&b| is_fws(b)).count();
            let ws = &bytes[pos..pos + ws_len];
            pos += ws_len;

            let token_len = bytes[pos..].iter().take_while(|&&b| !is_fws(b)).count();
            let token = &bytes[pos..pos + token_len];
            pos += token_len;

            splitter.push(ws, token);
        }
        text.words = splitter.finish();
        text
    }

    /// Builds a text from a Unicode string, encoding it in `charset`.
    ///
    /// # Errors
    ///
    /// Returns an error if `charset` cannot be converted to.
    pub fn from_unicode(text: &str, charset: &Charset) -> Result<Self> {
        let bytes = charset.encode_str(text)?;
        Ok(Self::create_from_string(&bytes, charset))
    }

    /// Parses header text, decoding any encoded words.
    #[must_use]
    pub fn decode(input: &[u8]) -> Self {
        let mut text = Self::new();
        text.parse(input, 0, input.len());
        text
    }

    /// Parses `buffer[pos..end]`, appending the words found.
    ///
    /// Returns the position parsing stopped at.
    pub fn parse(&mut self, buffer: &[u8], pos: usize, end: usize) -> usize {
        let end = end.min(buffer.len());
        let pos = pos.min(end);
        parse_tokens(&buffer[pos..end], &mut self.words);
        end
    }

    /// Writes the text folded to `max_line_length`, starting at column
    /// `cur_line_pos`. Returns the final column.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails.
    pub fn generate<W: Write + ?Sized>(
        &self,
        out: &mut W,
        max_line_length: usize,
        cur_line_pos: usize,
    ) -> io::Result<usize> {
        let options = GenerationOptions::builder()
            .max_line_length(max_line_length)
            .build();
        self.generate_with_options(out, &options, cur_line_pos)
    }

    /// Writes the text using `options`, starting at column `cur_line_pos`.
    /// Returns the final column.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails.
    pub fn generate_with_options<W: Write + ?Sized>(
        &self,
        out: &mut W,
        options: &GenerationOptions,
        cur_line_pos: usize,
    ) -> io::Result<usize> {
        let mut buf = Vec::new();
        let pos = self.append_to(&mut buf, options, cur_line_pos);
        out.write_all(&buf)?;
        Ok(pos)
    }

    /// Returns the generated form, starting at column 0.
    #[must_use]
    pub fn encode(&self, options: &GenerationOptions) -> Vec<u8> {
        let mut out = Vec::new();
        self.append_to(&mut out, options, 0);
        out
    }

    fn append_to(
        &self,
        out: &mut Vec<u8>,
        options: &GenerationOptions,
        cur_line_pos: usize,
    ) -> usize {
        let mut state = GeneratorState::new();
        let mut pos = cur_line_pos;
        for word in &self.words {
            pos = word.append_to(out, options, pos, &mut state);
        }
        state.append_pending(out);
        pos
    }

    /// Returns the words.
    #[must_use]
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Returns the number of words.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Returns the word at `index`.
    #[must_use]
    pub fn word_at(&self, index: usize) -> Option<&Word> {
        self.words.get(index)
    }

    /// Appends a word.
    pub fn append_word(&mut self, word: Word) {
        self.words.push(word);
    }

    /// Inserts a word before `index`, or at the end if `index` is past it.
    pub fn insert_word_before(&mut self, index: usize, word: Word) {
        let index = index.min(self.words.len());
        self.words.insert(index, word);
    }

    /// Removes and returns the word at `index`.
    pub fn remove_word(&mut self, index: usize) -> Option<Word> {
        (index < self.words.len()).then(|| self.words.remove(index))
    }

    /// Removes all words.
    pub fn remove_all_words(&mut self) {
        self.words.clear();
    }

    /// Returns true if there are no words.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Returns the raw bytes of all words, whatever their charsets.
    #[must_use]
    pub fn whole_buffer(&self) -> Vec<u8> {
        self.words
            .iter()
            .flat_map(|word| word.buffer().iter().copied())
            .collect()
    }

    /// Returns the content of all words converted to `charset`.
    ///
    /// # Errors
    ///
    /// Returns an error if any word's charset cannot be converted.
    pub fn converted_text(&self, charset: &Charset) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for word in &self.words {
            out.extend(word.converted_text(charset)?);
        }
        Ok(out)
    }

    /// Returns the content as a Unicode string.
    ///
    /// # Errors
    ///
    /// Returns an error if any word's charset cannot be converted to UTF-8.
    pub fn to_unicode(&self) -> Result<String> {
        let utf8 = self.converted_text(&Charset::utf_8())?;
        Ok(String::from_utf8_lossy(&utf8).into_owned())
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for word in &self.words {
            match word.to_unicode() {
                Ok(text) => f.write_str(&text)?,
                Err(_) => f.write_str(&String::from_utf8_lossy(word.buffer()))?,
            }
        }
        Ok(())
    }
}

impl FromIterator<Word> for Text {
    fn from_iter<I: IntoIterator<Item = Word>>(iter: I) -> Self {
        Self {
            words: iter.into_iter().collect(),
        }
    }
}

/// Groups whitespace-separated tokens into plain and encoded words.
struct Splitter<'a> {
    charset: &'a Charset,
    words: Vec<Word>,
    current: Option<(bool, Word)>,
}

impl<'a> Splitter<'a> {
    const fn new(charset: &'a Charset) -> Self {
        Self {
            charset,
            words: Vec::new(),
            current: None,
        }
    }

    /// Adds a token and the whitespace before it. Whitespace on the border
    /// between plain and encoded text goes to the plain word.
    fn push(&mut self, ws: &[u8], token: &[u8]) {
        if token.is_empty() {
            self.push_trailing(ws);
            return;
        }
        let encode = is_encoding_needed(token, self.charset);

        match &mut self.current {
            Some((encoded, word)) if *encoded == encode => {
                word.push_bytes(ws);
                word.push_bytes(token);
            }
            Some((false, word)) => {
                word.push_bytes(ws);
                self.start(true, &[], token);
            }
            Some((true, _)) => self.start(false, ws, token),
            None if encode && !ws.is_empty() => {
                self.start(false, ws, &[]);
                self.start(true, &[], token);
            }
            None => self.start(encode, ws, token),
        }
    }

    fn push_trailing(&mut self, ws: &[u8]) {
        match &mut self.current {
            Some((false, word)) => word.push_bytes(ws),
            _ if ws.is_empty() => {}
            _ => self.start(false, ws, &[]),
        }
    }

    fn start(&mut self, encoded: bool, ws: &[u8], token: &[u8]) {
        let charset = if encoded {
            self.charset.clone()
        } else {
            Charset::us_ascii()
        };
        let word = Word::new([ws, token].concat(), charset);
        if let Some((_, previous)) = self.current.take() {
            self.words.push(previous);
        }
        self.current = Some((encoded, word));
    }

    fn finish(mut self) -> Vec<Word> {
        if let Some((_, word)) = self.current.take() {
            self.words.push(word);
        }
        self.words
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::encoding::WordEncoding;

    fn buffers(text: &Text) -> Vec<&[u8]> {
        text.words().iter().map(Word::buffer).collect()
    }

    #[test]
    fn test_split_mixed_text() {
        let text = Text::create_from_string("Hello Été bar".as_bytes(), &Charset::utf_8());
        assert_eq!(
            buffers(&text),
            vec![&b"Hello "[..], "Été".as_bytes(), &b" bar"[..]]
        );
        assert_eq!(text.word_at(0).unwrap().charset(), &Charset::us_ascii());
        assert_eq!(text.word_at(1).unwrap().charset(), &Charset::utf_8());
    }

    #[test]
    fn test_encoded_tokens_merge_with_inner_whitespace() {
        let text = Text::create_from_string("hello Été été world".as_bytes(), &Charset::utf_8());
        assert_eq!(
            buffers(&text),
            vec![&b"hello "[..], "Été été".as_bytes(), &b" world"[..]]
        );
    }

    #[test]
    fn test_leading_and_trailing_whitespace() {
        let text = Text::create_from_string("  Été  ".as_bytes(), &Charset::utf_8());
        assert_eq!(buffers(&text), vec![&b"  "[..], "Été".as_bytes(), &b"  "[..]]);

        let text = Text::create_from_string(b"  plain  ", &Charset::utf_8());
        assert_eq!(buffers(&text), vec![&b"  plain  "[..]]);
    }

    #[test]
    fn test_single_word_when_mostly_8bit() {
        let text = Text::create_from_string("日本 語".as_bytes(), &Charset::utf_8());
        assert_eq!(text.word_count(), 1);

        let text = Text::create_from_string(b"plain ascii", &Charset::iso_8859_1());
        assert_eq!(text.word_count(), 1);
    }

    #[test]
    fn test_empty() {
        let text = Text::create_from_string(b"", &Charset::utf_8());
        assert!(text.is_empty());
        assert!(text.encode(&GenerationOptions::default()).is_empty());
        assert_eq!(Text::decode(b"").word_count(), 0);
    }

    #[test]
    fn test_generate_mixed() {
        let text = Text::from_unicode("Hello Été bar", &Charset::utf_8()).unwrap();
        assert_eq!(
            text.encode(&GenerationOptions::default()),
            b"Hello =?utf-8?B?w4l0w6k=?= bar"
        );
    }

    #[test]
    fn test_generate_returns_column() {
        let text = Text::create_from_string(b"Hello world", &Charset::us_ascii());
        let mut out = Vec::new();
        let pos = text.generate(&mut out, 76, 9).unwrap();
        assert_eq!(pos, 20);
    }

    #[test]
    fn test_decode_roundtrip_words() {
        let input = b"=?utf-8?B?w4l0w6k=?= =?utf-8?Q?Fran=C3=A7ois?=";
        let text = Text::decode(input);
        assert_eq!(text.word_count(), 2);
        assert_eq!(text.to_unicode().unwrap(), "ÉtéFrançois");
        assert_eq!(text.word_at(0).unwrap().encoding(), Some(WordEncoding::Base64));
        assert_eq!(text.encode(&GenerationOptions::default()), input);
    }

    #[test]
    fn test_parse_range() {
        let mut text = Text::new();
        let header = b"Subject: =?utf-8?Q?hi?=\r\n";
        let end = text.parse(header, 9, header.len() - 2);
        assert_eq!(end, header.len() - 2);
        assert_eq!(text.to_unicode().unwrap(), "hi");
    }

    #[test]
    fn test_word_editing() {
        let mut text = Text::decode(b"one two");
        text.append_word(Word::new(" three", Charset::us_ascii()));
        text.insert_word_before(0, Word::new("zero ", Charset::us_ascii()));
        assert_eq!(text.whole_buffer(), b"zero one two three");
        assert_eq!(text.word_count(), 3);

        let removed = text.remove_word(0).unwrap();
        assert_eq!(removed.buffer(), b"zero ");
        assert!(text.remove_word(10).is_none());

        text.remove_all_words();
        assert!(text.is_empty());
    }

    #[test]
    fn test_display_mixed_charsets() {
        let text: Text = [
            Word::new(&b"caf\xe9 "[..], Charset::iso_8859_1()),
            Word::new("crème", Charset::utf_8()),
        ]
        .into_iter()
        .collect();
        assert_eq!(text.to_string(), "café crème");
        assert_eq!(
            text.converted_text(&Charset::iso_8859_1()).unwrap(),
            b"caf\xe9 cr\xe8me"
        );
    }
}
