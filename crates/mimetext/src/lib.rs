//! # mimetext
//!
//! Encoding and decoding of non-ASCII email header text (RFC 2047).
//!
//! ## Features
//!
//! - **Encoded words**: `=?charset?B|Q?data?=` generation and lenient parsing,
//!   including RFC 2231 language tags
//! - **Header folding**: whitespace folding for plain text and line-limited
//!   encoded words that never split a multi-byte character
//! - **Charset transcoding**: streaming conversion between charsets with
//!   carry-over of characters split across blocks and per-byte replacement
//!   of invalid input
//! - **Raw UTF-8 headers**: unencoded 8-bit text is accepted when parsing
//!   (RFC 6532)
//!
//! ## Quick Start
//!
//! ### Encoding a Header
//!
//! ```
//! use mimetext::{Charset, GenerationOptions, Text};
//!
//! let text = Text::from_unicode("Re: Café meeting", &Charset::utf_8())?;
//! let encoded = text.encode(&GenerationOptions::default());
//! assert_eq!(encoded, b"Re: =?utf-8?Q?Caf=C3=A9?= meeting");
//! # Ok::<(), mimetext::Error>(())
//! ```
//!
//! ### Decoding a Header
//!
//! ```
//! use mimetext::Text;
//!
//! let text = Text::decode(b"=?iso-8859-1?Q?Andr=E9?= Pirard");
//! assert_eq!(text.to_unicode()?, "André Pirard");
//! # Ok::<(), mimetext::Error>(())
//! ```
//!
//! ### Folding to a Starting Column
//!
//! ```
//! use mimetext::{Charset, Text};
//!
//! let subject = "A fairly long subject line that will not fit on a single line";
//! let text = Text::create_from_string(subject.as_bytes(), &Charset::us_ascii());
//!
//! let mut out = b"Subject: ".to_vec();
//! let column = out.len();
//! text.generate(&mut out, 40, column)?;
//! assert!(out.split(|&b| b == b'\n').all(|line| line.len() <= 41));
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! ### Converting Between Charsets
//!
//! ```
//! use mimetext::{Charset, Transcoder, TranscodingWriter};
//! use std::io::Write;
//!
//! let transcoder = Transcoder::new(&Charset::utf_8(), &Charset::iso_8859_1())?;
//! let mut writer = TranscodingWriter::new(Vec::new(), transcoder);
//! writer.write_all("Grüße".as_bytes())?;
//! assert_eq!(writer.finish()?, b"Gr\xfc\xdfe");
//! # Ok::<(), mimetext::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod charset;
mod error;
mod options;
mod text;
mod word;
mod word_encoder;

pub mod encoding;
pub mod transcode;

pub use charset::Charset;
pub use encoding::WordEncoding;
pub use error::{Error, Result};
pub use options::{
    ConverterOptions, DEFAULT_INVALID_SEQUENCE, GenerationOptions, GenerationOptionsBuilder,
    MAX_ENCODED_LINE_LENGTH,
};
pub use text::Text;
pub use transcode::{Transcoder, TranscodingWriter};
pub use word::{GeneratorState, Word};
pub use word_encoder::{WordEncoder, guess_best_encoding, is_encoding_needed};
