use std::{borrow::Cow, str::FromStr};

use bstr::BStr;

use crate::{
    Error,
    chunk::{Captured, ChunkBuffer},
    error::{DecodeError, SyntaxError, SyntaxErrorKind},
    tokenizer::{self, Lexed, RawToken, TokenKind, TokenizerState},
};

/// A forward-only position in a document.
///
/// The cursor is the only handle on its [`ChunkBuffer`] while it lives.
/// To hand the stream to another reader, [`capture`](Self::capture) it (which
/// consumes the cursor and returns the buffer) and let the other side
/// [`resume`](Self::resume) from the record left in the buffer:
///
/// ```rust
/// use jsonmold::{ChunkBuffer, ReaderOptions, TokenCursor, TokenKind};
///
/// let mut buffer = ChunkBuffer::from_slice(br#"{"a":[1,2]}"#, &ReaderOptions::default());
/// let mut cursor = TokenCursor::resume(&mut buffer);
/// assert_eq!(cursor.advance()?, TokenKind::StartObject);
///
/// let buffer = cursor.capture();
/// let mut inner = TokenCursor::resume(buffer);
/// assert_eq!(inner.advance()?, TokenKind::PropertyName);
/// assert_eq!(inner.str_value()?, "a");
/// # Ok::<(), jsonmold::Error>(())
/// ```
pub struct TokenCursor<'b, 'r> {
    buffer: &'b mut ChunkBuffer<'r>,
    state: TokenizerState,
    consumed: usize,
    token: RawToken,
    offset: usize,
    detached: bool,
}

impl<'b, 'r> TokenCursor<'b, 'r> {
    /// Rebuilds a cursor from the record the last [`capture`](Self::capture)
    /// left in `buffer`, or starts at the beginning of the document.
    pub fn resume(buffer: &'b mut ChunkBuffer<'r>) -> Self {
        let Captured {
            state,
            last,
            last_offset,
        } = buffer.take_captured();
        Self {
            buffer,
            state,
            consumed: 0,
            token: RawToken {
                kind: last,
                ..RawToken::default()
            },
            offset: last_offset,
            detached: last.has_payload(),
        }
    }

    /// Writes position and tokenizer state back into the buffer and gives
    /// the buffer up.
    pub fn capture(self) -> &'b mut ChunkBuffer<'r> {
        let Self {
            buffer,
            state,
            consumed,
            token,
            offset,
            ..
        } = self;
        buffer.consume(consumed);
        buffer.captured = Captured {
            state,
            last: token.kind,
            last_offset: offset,
        };
        buffer
    }

    /// Moves to the next token, refilling the buffer as often as needed.
    ///
    /// # Errors
    ///
    /// Syntax errors and reader failures.
    pub fn advance(&mut self) -> Result<TokenKind, Error> {
        loop {
            let lexed = tokenizer::next_token(
                &mut self.state,
                self.buffer.window(),
                self.consumed,
                self.buffer.is_final(),
                self.buffer.window_offset(),
                self.buffer.max_depth(),
            )?;
            match lexed {
                Lexed::Token(token) => {
                    self.offset = self.buffer.window_offset() + token.at;
                    self.consumed = token.next;
                    self.token = token;
                    self.detached = false;
                    return Ok(token.kind);
                }
                Lexed::NeedMore { skipped } => {
                    self.consumed += skipped;
                    let tail = self.buffer.read_cursor() + self.consumed;
                    self.consumed = 0;
                    self.buffer.more(tail)?;
                }
            }
        }
    }

    /// Kind of the current token.
    #[must_use]
    pub fn kind(&self) -> TokenKind {
        self.token.kind
    }

    /// Absolute byte offset of the current token.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of open containers, counting the one the current token opened.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.state.depth()
    }

    /// Raw bytes of the current token. Strings are returned without quotes
    /// and with escapes intact.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Detached`] when the cursor was resumed on a string or
    /// number token whose bytes were released by the capture.
    pub fn raw_value(&self) -> Result<&BStr, Error> {
        if self.detached {
            return Err(DecodeError::Detached.into());
        }
        let window = self.buffer.window();
        Ok(BStr::new(&window[self.token.start..self.token.end]))
    }

    /// Fails with [`DecodeError::UnexpectedToken`] unless the current token
    /// is `kind`.
    ///
    /// # Errors
    ///
    /// See above.
    pub fn expect(&self, kind: TokenKind, expected: &'static str) -> Result<(), Error> {
        if self.token.kind == kind {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    pub(crate) fn unexpected(&self, expected: &'static str) -> Error {
        DecodeError::UnexpectedToken {
            expected,
            found: self.token.kind,
        }
        .into()
    }

    /// Text of the current string or property name, unescaped.
    ///
    /// Borrows from the buffer unless the token contains escapes.
    ///
    /// # Errors
    ///
    /// Fails when the current token is neither a string nor a property name.
    pub fn str_value(&self) -> Result<Cow<'_, str>, Error> {
        if !matches!(self.token.kind, TokenKind::String | TokenKind::PropertyName) {
            return Err(self.unexpected("string"));
        }
        let raw: &[u8] = self.raw_value()?;
        if self.token.escaped {
            let mut text = String::with_capacity(raw.len());
            tokenizer::unescape(raw, &mut text).map_err(|kind| self.syntax(kind))?;
            Ok(Cow::Owned(text))
        } else {
            std::str::from_utf8(raw)
                .map(Cow::Borrowed)
                .map_err(|_| self.syntax(SyntaxErrorKind::InvalidUtf8))
        }
    }

    fn syntax(&self, kind: SyntaxErrorKind) -> Error {
        Error::Syntax(SyntaxError {
            kind,
            offset: self.offset,
        })
    }

    /// Parses the current number token with [`FromStr`]. `target` names the
    /// type in error messages.
    ///
    /// # Errors
    ///
    /// Fails when the token is not a number or does not fit `T`.
    pub fn number_value<T: FromStr>(&self, target: &'static str) -> Result<T, Error> {
        self.expect(TokenKind::Number, "number")?;
        let raw = self.raw_value()?;
        let text = std::str::from_utf8(raw).map_err(|_| self.syntax(SyntaxErrorKind::InvalidUtf8))?;
        text.parse().map_err(|_| {
            DecodeError::InvalidNumber {
                text: text.into(),
                target,
            }
            .into()
        })
    }

    /// # Errors
    ///
    /// Fails unless the current token is `true` or `false`.
    pub fn bool_value(&self) -> Result<bool, Error> {
        match self.token.kind {
            TokenKind::True => Ok(true),
            TokenKind::False => Ok(false),
            _ => Err(self.unexpected("boolean")),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.token.kind == TokenKind::Null
    }

    /// Compares the current string or property name with `expected`,
    /// unescaping first if needed.
    #[must_use]
    pub fn value_text_equals(&self, expected: &[u8]) -> bool {
        if !matches!(self.token.kind, TokenKind::String | TokenKind::PropertyName) {
            return false;
        }
        let Ok(raw) = self.raw_value() else {
            return false;
        };
        if !self.token.escaped {
            return raw == expected;
        }
        let mut text = String::with_capacity(raw.len());
        tokenizer::unescape(raw, &mut text).is_ok() && text.as_bytes() == expected
    }

    /// Skips the value the cursor is positioned on.
    ///
    /// On a container start this reads through the matching end; on a
    /// property name it skips the member's value; scalars are already
    /// complete and nothing is read.
    ///
    /// # Errors
    ///
    /// Syntax errors and reader failures inside the skipped value.
    pub fn skip_value(&mut self) -> Result<(), Error> {
        if self.token.kind == TokenKind::PropertyName {
            self.advance()?;
        }
        if !matches!(self.token.kind, TokenKind::StartObject | TokenKind::StartArray) {
            return Ok(());
        }
        let target = self.state.depth() - 1;
        while self.state.depth() > target {
            self.advance()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for TokenCursor<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCursor")
            .field("kind", &self.token.kind)
            .field("offset", &self.offset)
            .field("depth", &self.state.depth())
            .finish_non_exhaustive()
    }
}
