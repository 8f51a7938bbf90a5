//! Error types for codec operations.

use std::io;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Codec error types.
///
/// Only session setup and caller-supplied I/O can fail. Invalid input bytes
/// and malformed encoded words degrade to replacement characters or literal
/// text instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No converter exists for the requested charset pair.
    #[error("Conversion unavailable: {from} -> {to}")]
    ConversionUnavailable {
        /// Source charset name.
        from: String,
        /// Destination charset name.
        to: String,
    },

    /// I/O error from a caller-supplied reader or writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Creates a conversion-unavailable error for a charset pair.
    pub(crate) fn unavailable(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::ConversionUnavailable {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Returns true if this error reports a missing converter.
    #[must_use]
    pub const fn is_conversion_unavailable(&self) -> bool {
        matches!(self, Self::ConversionUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_display() {
        let err = Error::unavailable("x-klingon", "utf-8");
        assert_eq!(err.to_string(), "Conversion unavailable: x-klingon -> utf-8");
        assert!(err.is_conversion_unavailable());
    }

    #[test]
    fn test_io_from() {
        let err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "closed").into();
        assert!(!err.is_conversion_unavailable());
        assert!(err.to_string().starts_with("I/O error"));
    }
}
