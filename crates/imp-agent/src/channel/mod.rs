//! Line framing over a byte stream.
//!
//! A line ends at the first `\r` or `\n`. Empty lines between terminators are
//! skipped, so CR, LF and CRLF senders all frame identically. Lines longer
//! than the channel's limit are truncated: the excess is read and discarded
//! up to the next terminator so the following line starts cleanly, and the
//! returned [`Line`] is marked so callers never mistake the prefix for a
//! complete message.

use std::io::{self, BufRead, BufReader, Read, Write};

use thiserror::Error;
use tracing::warn;

const CHANNEL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::channel");

/// Errors surfaced by line reads and writes. Either kind means the peer
/// should be treated as disconnected.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Reading from the stream failed.
    #[error("failed to read line: {source}")]
    Read {
        #[source]
        source: io::Error,
    },
    /// Writing to the stream failed.
    #[error("failed to write line: {source}")]
    Write {
        #[source]
        source: io::Error,
    },
}

/// One framed line without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    bytes: Vec<u8>,
    truncated: bool,
}

impl Line {
    /// Bytes kept from the line, at most the channel limit.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns `true` when bytes past the channel limit were discarded.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Consumes the line, returning the kept bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Buffered line reader and writer over one connection.
#[derive(Debug)]
pub struct LineChannel<S> {
    reader: BufReader<S>,
    max_len: usize,
}

impl<S: Read + Write> LineChannel<S> {
    /// Wraps `stream`, returning at most `max_len` bytes per line.
    ///
    /// A limit of zero is raised to one byte.
    pub fn new(stream: S, max_len: usize) -> Self {
        Self {
            reader: BufReader::new(stream),
            max_len: max_len.max(1),
        }
    }

    /// Maximum number of bytes returned per line.
    #[must_use]
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Reads the next non-empty line without its terminator.
    ///
    /// Returns `Ok(None)` on a clean end of stream. Bytes that arrive before
    /// the peer closes without a terminator are returned as a final line.
    /// An overlong line yields its first `max_len` bytes, marked truncated.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Read`] when the stream fails.
    pub fn read_line(&mut self) -> Result<Option<Line>, ChannelError> {
        let mut line = Vec::new();
        let mut discarded = 0_usize;
        loop {
            let (consumed, terminated) = {
                let available = match self.reader.fill_buf() {
                    Ok(available) => available,
                    Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                    Err(source) => return Err(ChannelError::Read { source }),
                };
                if available.is_empty() {
                    if line.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(self.finish(line, discarded)));
                }
                let (chunk, consumed, terminated) =
                    match available.iter().position(|byte| is_terminator(*byte)) {
                        Some(end) => (available.get(..end).unwrap_or_default(), end + 1, true),
                        None => (available, available.len(), false),
                    };
                let room = self.max_len.saturating_sub(line.len());
                let kept = chunk.len().min(room);
                line.extend_from_slice(chunk.get(..kept).unwrap_or_default());
                discarded += chunk.len() - kept;
                (consumed, terminated)
            };
            self.reader.consume(consumed);

            if terminated {
                if line.is_empty() && discarded == 0 {
                    continue;
                }
                return Ok(Some(self.finish(line, discarded)));
            }
        }
    }

    /// Writes `text` verbatim, retrying partial writes until complete.
    ///
    /// The caller supplies the terminator.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Write`] when the stream fails.
    pub fn write_line(&mut self, text: &str) -> Result<usize, ChannelError> {
        let stream = self.reader.get_mut();
        stream
            .write_all(text.as_bytes())
            .and_then(|()| stream.flush())
            .map_err(|source| ChannelError::Write { source })?;
        Ok(text.len())
    }

    /// Borrows the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Unwraps the channel. Buffered but unread bytes are lost.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }

    fn finish(&self, bytes: Vec<u8>, discarded: usize) -> Line {
        if discarded > 0 {
            warn!(
                target: CHANNEL_TARGET,
                limit = self.max_len,
                kept = bytes.len(),
                discarded,
                "inbound line exceeded limit and was truncated"
            );
        }
        Line {
            bytes,
            truncated: discarded > 0,
        }
    }
}

fn is_terminator(byte: u8) -> bool {
    matches!(byte, b'\r' | b'\n')
}

#[cfg(test)]
mod tests;
