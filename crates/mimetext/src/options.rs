//! Configuration types for generation and conversion.

/// Maximum length of a physical line holding an encoded word (RFC 2047).
pub const MAX_ENCODED_LINE_LENGTH: usize = 76;

/// Default replacement text for invalid input sequences.
pub const DEFAULT_INVALID_SEQUENCE: &str = "?";

/// Options controlling how a [`Text`](crate::Text) is folded and encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GenerationOptions {
    /// Maximum physical line length.
    ///
    /// Lines holding encoded words never exceed
    /// [`MAX_ENCODED_LINE_LENGTH`], whatever this value is.
    pub max_line_length: usize,
    /// Encode every word, even plain ASCII.
    pub force_encoding: bool,
    /// Never encode; fold raw bytes only.
    pub force_no_encoding: bool,
    /// Quote short unencoded words instead of folding them.
    pub quote_if_possible: bool,
}

impl GenerationOptions {
    /// Creates options with the default line length and automatic encoding.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_line_length: MAX_ENCODED_LINE_LENGTH,
            force_encoding: false,
            force_no_encoding: false,
            quote_if_possible: false,
        }
    }

    /// Creates an options builder.
    #[must_use]
    pub const fn builder() -> GenerationOptionsBuilder {
        GenerationOptionsBuilder::new()
    }

    /// Returns the line budget for lines holding encoded words.
    #[must_use]
    pub fn encoded_line_length(&self) -> usize {
        self.max_line_length.min(MAX_ENCODED_LINE_LENGTH)
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`GenerationOptions`].
#[derive(Debug, Clone)]
pub struct GenerationOptionsBuilder {
    options: GenerationOptions,
}

impl GenerationOptionsBuilder {
    /// Creates a builder with default options.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            options: GenerationOptions::new(),
        }
    }

    /// Sets the maximum line length.
    #[must_use]
    pub const fn max_line_length(mut self, length: usize) -> Self {
        self.options.max_line_length = length;
        self
    }

    /// Forces encoding of every word.
    #[must_use]
    pub const fn force_encoding(mut self, force: bool) -> Self {
        self.options.force_encoding = force;
        self
    }

    /// Disables encoding entirely.
    #[must_use]
    pub const fn force_no_encoding(mut self, force: bool) -> Self {
        self.options.force_no_encoding = force;
        self
    }

    /// Quotes short unencoded words when possible.
    #[must_use]
    pub const fn quote_if_possible(mut self, quote: bool) -> Self {
        self.options.quote_if_possible = quote;
        self
    }

    /// Builds the options.
    #[must_use]
    pub const fn build(self) -> GenerationOptions {
        self.options
    }
}

impl Default for GenerationOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for charset conversion sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConverterOptions {
    /// Text emitted, converted to the destination charset, in place of each
    /// invalid input byte.
    pub invalid_sequence: String,
}

impl ConverterOptions {
    /// Creates options with the default `?` replacement.
    #[must_use]
    pub fn new() -> Self {
        Self {
            invalid_sequence: DEFAULT_INVALID_SEQUENCE.to_string(),
        }
    }

    /// Sets the replacement text.
    #[must_use]
    pub fn with_invalid_sequence(mut self, replacement: impl Into<String>) -> Self {
        self.invalid_sequence = replacement.into();
        self
    }
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self::new()
    }
}
