//! Write-side adapter for [`Transcoder`].

use super::{CHUNK_SIZE, Transcoder};
use std::io::{self, Write};

/// A writer that converts everything written to it before passing it on.
///
/// Writes may split characters anywhere; incomplete characters are held
/// until the rest arrives. Call [`finish`](Self::finish) to flush the final
/// partial character and the converter's shift state.
///
/// Once the wrapped writer fails, the converted bytes of that write are
/// lost and every later call fails.
#[derive(Debug)]
pub struct TranscodingWriter<W: Write> {
    inner: W,
    transcoder: Transcoder,
    buffer: Vec<u8>,
    poisoned: bool,
}

fn poisoned() -> io::Error {
    io::Error::other("an earlier write to the inner writer failed")
}

impl<W: Write> TranscodingWriter<W> {
    /// Wraps `inner`, converting through `transcoder`.
    pub fn new(inner: W, transcoder: Transcoder) -> Self {
        Self {
            inner,
            transcoder,
            buffer: Vec::with_capacity(CHUNK_SIZE),
            poisoned: false,
        }
    }

    /// Returns the wrapped writer.
    pub const fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Returns the conversion session.
    pub const fn transcoder(&self) -> &Transcoder {
        &self.transcoder
    }

    /// Ends the stream and returns the wrapped writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the final bytes fails, or if an earlier
    /// write failed.
    pub fn finish(mut self) -> io::Result<W> {
        if self.poisoned {
            return Err(poisoned());
        }
        self.buffer.clear();
        self.transcoder.finish(&mut self.buffer);
        self.inner.write_all(&self.buffer)?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.buffer.clear();
        self.transcoder.feed(chunk, &mut self.buffer);
        let written = self.inner.write_all(&self.buffer);
        self.buffer.clear();
        if written.is_err() {
            self.poisoned = true;
        }
        written
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.poisoned {
            return Err(poisoned());
        }
        for chunk in buf.chunks(CHUNK_SIZE) {
            self.write_chunk(chunk)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
