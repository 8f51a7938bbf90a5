//! Scanner for header text containing encoded words.

use super::{Word, is_fws};
use crate::charset::Charset;
use crate::encoding::WordEncoding;

/// A piece of header text.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    /// SP, TAB, CR and LF.
    Whitespace(&'a [u8]),
    /// A well-formed encoded word.
    Encoded(Word),
    /// Anything else, kept verbatim.
    Literal(&'a [u8]),
}

/// Outcome of scanning at an `=?` opener.
#[derive(Debug)]
enum Scan {
    Valid(Word, usize),
    /// Shaped like an encoded word but unusable; holds its length.
    Malformed(usize),
    NotAWord,
}

const fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n')
}

struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn starts_word_at(&self, pos: usize) -> bool {
        self.input.get(pos..pos + 2) == Some(b"=?".as_slice())
    }

    fn next_token(&mut self) -> Option<Token<'a>> {
        let start = self.pos;
        let byte = *self.input.get(start)?;

        if is_whitespace(byte) {
            let len = self.input[start..]
                .iter()
                .take_while(|&&b| is_whitespace(b))
                .count();
            self.pos += len;
            return Some(Token::Whitespace(&self.input[start..self.pos]));
        }

        if self.starts_word_at(start) {
            match scan_encoded(&self.input[start..]) {
                Scan::Valid(word, len) => {
                    self.pos += len;
                    return Some(Token::Encoded(word));
                }
                Scan::Malformed(len) => {
                    self.pos += len;
                    let token = &self.input[start..self.pos];
                    tracing::trace!(
                        token = %String::from_utf8_lossy(token),
                        "Malformed encoded word kept as text"
                    );
                    return Some(Token::Literal(token));
                }
                Scan::NotAWord => self.pos += 2,
            }
        }

        while let Some(&b) = self.input.get(self.pos) {
            if is_whitespace(b) || self.starts_word_at(self.pos) {
                break;
            }
            self.pos += 1;
        }
        Some(Token::Literal(&self.input[start..self.pos]))
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

/// Scans `=?charset[*language]?encoding?data?=` at the start of `input`.
fn scan_encoded(input: &[u8]) -> Scan {
    let Some(fields) = split_fields(input) else {
        return Scan::NotAWord;
    };
    let [charset, encoding, data] = fields;
    let len = charset.len() + encoding.len() + data.len() + 6;

    let (name, language) = match charset.iter().position(|&b| b == b'*') {
        Some(star) => (&charset[..star], Some(&charset[star + 1..])),
        None => (charset, None),
    };
    if name.is_empty() {
        return Scan::Malformed(len);
    }
    let Some(encoding) = (match encoding {
        [letter] => WordEncoding::from_letter(*letter),
        _ => None,
    }) else {
        return Scan::Malformed(len);
    };
    let Some(buffer) = encoding.decode(data) else {
        return Scan::Malformed(len);
    };

    let mut word = Word::new(
        buffer,
        Charset::new(String::from_utf8_lossy(name).into_owned()),
    )
    .with_encoding(encoding);
    if let Some(language) = language.filter(|l| !l.is_empty()) {
        word = word.with_language(String::from_utf8_lossy(language).into_owned());
    }
    Scan::Valid(word, len)
}

/// Splits an encoded word into its three `?`-delimited fields.
///
/// Returns `None` unless the input starts with `=?`, the fields hold no
/// whitespace and the data is closed by `?=`.
fn split_fields(input: &[u8]) -> Option<[&[u8]; 3]> {
    let body = input.strip_prefix(b"=?")?;
    let mut fields = [&body[..0]; 3];
    let mut rest = body;

    for field in &mut fields {
        let end = rest
            .iter()
            .position(|&b| b == b'?' || is_whitespace(b))
            .filter(|&end| rest[end] == b'?')?;
        *field = &rest[..end];
        rest = &rest[end + 1..];
    }

    (rest.first() == Some(&b'=')).then_some(fields)
}

/// Parses header text into words, appending them to `words`.
///
/// Whitespace between two encoded words is dropped. Other whitespace is
/// kept with line breaks removed. Adjacent unencoded pieces form a single
/// word, tagged UTF-8 if they hold valid non-ASCII UTF-8 and US-ASCII
/// otherwise.
pub(crate) fn parse_tokens(input: &[u8], words: &mut Vec<Word>) {
    let mut literal = Vec::new();
    let mut pending: Option<&[u8]> = None;
    let mut previous_encoded = false;

    for token in Scanner::new(input) {
        match token {
            Token::Whitespace(ws) => pending = Some(ws),
            Token::Encoded(word) => {
                if let Some(ws) = pending.take().filter(|_| !previous_encoded) {
                    unfold_into(&mut literal, ws);
                }
                flush_literal(&mut literal, words);
                words.push(word);
                previous_encoded = true;
            }
            Token::Literal(bytes) => {
                if let Some(ws) = pending.take() {
                    unfold_into(&mut literal, ws);
                }
                literal.extend_from_slice(bytes);
                previous_encoded = false;
            }
        }
    }

    if let Some(ws) = pending {
        unfold_into(&mut literal, ws);
    }
    flush_literal(&mut literal, words);
}

fn unfold_into(literal: &mut Vec<u8>, ws: &[u8]) {
    literal.extend(ws.iter().copied().filter(|&b| is_fws(b)));
}

fn flush_literal(literal: &mut Vec<u8>, words: &mut Vec<Word>) {
    if literal.is_empty() {
        return;
    }
    let bytes = std::mem::take(literal);
    let charset = if !bytes.is_ascii() && std::str::from_utf8(&bytes).is_ok() {
        Charset::utf_8()
    } else {
        Charset::us_ascii()
    };
    words.push(Word::new(bytes, charset));
}

impl Word {
    /// Parses a single encoded-word token such as `=?utf-8?Q?caf=C3=A9?=`.
    ///
    /// Returns `None` if `token` is not exactly one well-formed encoded word.
    #[must_use]
    pub fn parse_encoded(token: &[u8]) -> Option<Self> {
        match scan_encoded(token) {
            Scan::Valid(word, len) if len == token.len() => Some(word),
            _ => None,
        }
    }
}
