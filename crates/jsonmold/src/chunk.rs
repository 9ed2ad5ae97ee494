//! The byte window the tokenizer reads from.
//!
//! A [`ChunkBuffer`] either borrows a complete document or owns a growable
//! region that is refilled from an [`io::Read`]. Between refills the unread
//! tail of the previous window is moved to the front, so a token that
//! straddles two reads is always contiguous when it is lexed again.

use std::{borrow::Cow, fmt, io, mem};

use tracing::trace;

use crate::{
    Error,
    options::ReaderOptions,
    tokenizer::{TokenKind, TokenizerState},
};

/// Where a document comes from.
pub enum Source<'r> {
    /// A complete document. Never refilled.
    Slice(&'r [u8]),
    /// A pull-based stream. A read of zero bytes ends the document.
    Reader(Box<dyn io::Read + 'r>),
}

impl<'r> Source<'r> {
    /// Wraps any reader.
    pub fn reader(reader: impl io::Read + 'r) -> Self {
        Source::Reader(Box::new(reader))
    }
}

impl<'r> From<&'r [u8]> for Source<'r> {
    fn from(bytes: &'r [u8]) -> Self {
        Source::Slice(bytes)
    }
}

impl<'r> From<&'r str> for Source<'r> {
    fn from(text: &'r str) -> Self {
        Source::Slice(text.as_bytes())
    }
}

impl<'r> From<&'r Vec<u8>> for Source<'r> {
    fn from(bytes: &'r Vec<u8>) -> Self {
        Source::Slice(bytes)
    }
}

impl fmt::Debug for Source<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Slice(bytes) => f.debug_tuple("Slice").field(&bytes.len()).finish(),
            Source::Reader(_) => f.write_str("Reader"),
        }
    }
}

/// Cursor record left behind by [`TokenCursor::capture`](crate::TokenCursor::capture).
#[derive(Debug, Default)]
pub(crate) struct Captured {
    pub(crate) state: TokenizerState,
    pub(crate) last: TokenKind,
    pub(crate) last_offset: usize,
}

/// Owned or borrowed bytes plus the bookkeeping to resume tokenizing them.
///
/// `read_cursor <= valid <= capacity` always holds.
pub struct ChunkBuffer<'r> {
    bytes: Cow<'r, [u8]>,
    valid: usize,
    read_cursor: usize,
    origin: usize,
    reader: Option<Box<dyn io::Read + 'r>>,
    is_final: bool,
    max_depth: usize,
    refills: usize,
    pub(crate) captured: Captured,
}

impl<'r> ChunkBuffer<'r> {
    #[must_use]
    pub fn new(source: Source<'r>, options: &ReaderOptions) -> Self {
        match source {
            Source::Slice(bytes) => Self::from_slice(bytes, options),
            Source::Reader(reader) => Self::from_boxed_reader(reader, options),
        }
    }

    #[must_use]
    pub fn from_slice(bytes: &'r [u8], options: &ReaderOptions) -> Self {
        Self {
            valid: bytes.len(),
            bytes: Cow::Borrowed(bytes),
            read_cursor: 0,
            origin: 0,
            reader: None,
            is_final: true,
            max_depth: options.max_depth,
            refills: 0,
            captured: Captured::default(),
        }
    }

    pub fn from_reader(reader: impl io::Read + 'r, options: &ReaderOptions) -> Self {
        Self::from_boxed_reader(Box::new(reader), options)
    }

    fn from_boxed_reader(reader: Box<dyn io::Read + 'r>, options: &ReaderOptions) -> Self {
        Self {
            bytes: Cow::Owned(vec![0; options.buffer_capacity.max(1)]),
            valid: 0,
            read_cursor: 0,
            origin: 0,
            reader: Some(reader),
            is_final: false,
            max_depth: options.max_depth,
            refills: 0,
            captured: Captured::default(),
        }
    }

    /// Unconsumed valid bytes.
    #[must_use]
    pub fn window(&self) -> &[u8] {
        &self.bytes[self.read_cursor..self.valid]
    }

    /// Absolute document offset of the first byte of [`window`](Self::window).
    #[must_use]
    pub fn window_offset(&self) -> usize {
        self.origin + self.read_cursor
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn valid(&self) -> usize {
        self.valid
    }

    /// `true` once no further bytes will ever arrive.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Number of reads that returned data or signalled the end.
    #[must_use]
    pub fn refills(&self) -> usize {
        self.refills
    }

    pub(crate) fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub(crate) fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    pub(crate) fn consume(&mut self, count: usize) {
        debug_assert!(self.read_cursor + count <= self.valid);
        self.read_cursor += count;
    }

    /// Makes more bytes available after `window_offset`, an index into the
    /// buffer where the unread tail begins.
    ///
    /// The tail moves to the front of the buffer and new bytes are appended
    /// after it; when the tail already fills the buffer, its capacity is
    /// doubled first. Returns the new number of valid bytes, which are now
    /// all unread. A read of zero bytes marks the buffer final.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceRead`] when the reader fails with anything but
    /// [`io::ErrorKind::Interrupted`].
    pub fn more(&mut self, window_offset: usize) -> Result<usize, Error> {
        debug_assert!(window_offset <= self.valid);
        let Some(reader) = self.reader.as_mut() else {
            self.is_final = true;
            return Ok(self.valid);
        };

        let tail = self.valid - window_offset;
        let buf = self.bytes.to_mut();
        if tail == buf.len() {
            let grown = buf.len().max(1) * 2;
            trace!(target: "jsonmold", from = buf.len(), to = grown, "growing chunk buffer");
            buf.resize(grown, 0);
        }
        if window_offset > 0 {
            buf.copy_within(window_offset..self.valid, 0);
            self.origin += window_offset;
        }
        self.valid = tail;
        self.read_cursor = 0;

        let read = loop {
            match reader.read(&mut buf[tail..]) {
                Ok(read) => break read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(Error::SourceRead(err)),
            }
        };
        self.refills += 1;
        self.valid += read;
        if read == 0 {
            self.is_final = true;
        }
        #[cfg(any(test, feature = "fuzzing"))]
        assert!(
            self.read_cursor <= self.valid && self.valid <= buf.len(),
            "chunk buffer positions out of order"
        );
        trace!(
            target: "jsonmold",
            read,
            valid = self.valid,
            capacity = buf.len(),
            offset = self.origin,
            "refilled chunk buffer"
        );
        Ok(self.valid)
    }

    pub(crate) fn take_captured(&mut self) -> Captured {
        mem::take(&mut self.captured)
    }
}

impl fmt::Debug for ChunkBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkBuffer")
            .field("window", &bstr::BStr::new(self.window()))
            .field("offset", &self.window_offset())
            .field("capacity", &self.capacity())
            .field("is_final", &self.is_final)
            .finish_non_exhaustive()
    }
}
