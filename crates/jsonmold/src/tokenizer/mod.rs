//! Resumable RFC 8259 tokenizer.
//!
//! Tokens are lexed atomically from a window of bytes. When the window ends
//! in the middle of a token the tokenizer answers [`Lexed::NeedMore`] without
//! touching its state; after the window has been refilled the same token is
//! lexed again from its first byte. All the state that survives between
//! tokens lives in [`TokenizerState`]: the stack of open containers and what
//! the grammar allows next.
//!
//! Whitespace and commas between tokens carry no payload, so a window that
//! ends inside such a gap reports how much of it was settled. The caller
//! drops those bytes instead of carrying them into the next refill; a
//! settled comma is remembered in the state as the member or element it
//! requires.

mod escape;
mod literal;

use std::fmt;

pub(crate) use escape::unescape;
use escape::Scan;
use literal::{Literal, Step};

use crate::error::{Expected, SyntaxError, SyntaxErrorKind};

/// The kind of the token a cursor is positioned on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// No token has been read yet.
    #[default]
    Unstarted,
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    /// An object member name; the `:` after it is part of the token.
    PropertyName,
    String,
    Number,
    True,
    False,
    Null,
    /// The root value is complete and only whitespace followed it.
    EndOfInput,
}

impl TokenKind {
    /// Whether the token's bytes are meaningful to value accessors.
    #[must_use]
    pub fn has_payload(self) -> bool {
        matches!(
            self,
            TokenKind::PropertyName | TokenKind::String | TokenKind::Number
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenKind::Unstarted => "nothing",
            TokenKind::StartObject => "start of object",
            TokenKind::EndObject => "end of object",
            TokenKind::StartArray => "start of array",
            TokenKind::EndArray => "end of array",
            TokenKind::PropertyName => "property name",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::EndOfInput => "end of input",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Expect {
    #[default]
    RootValue,
    /// Just after `{`: a member name or `}`.
    ObjectFirst,
    /// Just after a member name and its colon.
    PropertyValue,
    /// Just after `[`: a value or `]`.
    ArrayFirst,
    /// After a complete value inside a container.
    AfterValue,
    /// After a comma inside an object: a member name.
    Member,
    /// After a comma inside an array: a value.
    Element,
    /// The root value is complete.
    End,
}

/// Everything the tokenizer needs to continue where it stopped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TokenizerState {
    stack: Vec<Container>,
    expect: Expect,
}

impl TokenizerState {
    /// Number of open objects and arrays.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn after_value(&self) -> Expect {
        if self.stack.is_empty() {
            Expect::End
        } else {
            Expect::AfterValue
        }
    }

    fn apply(&mut self, token: &RawToken, max_depth: usize, base: usize) -> Result<(), SyntaxError> {
        match token.kind {
            TokenKind::StartObject | TokenKind::StartArray => {
                if self.stack.len() >= max_depth {
                    return Err(SyntaxError {
                        kind: SyntaxErrorKind::DepthLimitExceeded(max_depth),
                        offset: base + token.at,
                    });
                }
                if token.kind == TokenKind::StartObject {
                    self.stack.push(Container::Object);
                    self.expect = Expect::ObjectFirst;
                } else {
                    self.stack.push(Container::Array);
                    self.expect = Expect::ArrayFirst;
                }
            }
            TokenKind::EndObject | TokenKind::EndArray => {
                self.stack.pop();
                self.expect = self.after_value();
            }
            TokenKind::PropertyName => self.expect = Expect::PropertyValue,
            TokenKind::String
            | TokenKind::Number
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null => self.expect = self.after_value(),
            TokenKind::Unstarted | TokenKind::EndOfInput => {}
        }
        Ok(())
    }
}

/// A lexed token. Positions are indices into the window it was lexed from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawToken {
    pub(crate) kind: TokenKind,
    /// First byte of the token itself, after whitespace and separators.
    pub(crate) at: usize,
    /// Payload span: string contents without quotes, number or literal text.
    pub(crate) start: usize,
    pub(crate) end: usize,
    /// First byte after the token.
    pub(crate) next: usize,
    /// The string payload contains at least one backslash escape.
    pub(crate) escaped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lexed {
    Token(RawToken),
    /// The window ended before the next token did. The first `skipped`
    /// bytes after `pos` were separators and need not be seen again.
    NeedMore { skipped: usize },
}

/// Lexes the token starting at `pos` in `window`.
///
/// `base` is the absolute document offset of `window[0]`, used for error
/// positions. `state` changes when a token is returned, or when a comma was
/// settled before the window ran out.
pub(crate) fn next_token(
    state: &mut TokenizerState,
    window: &[u8],
    pos: usize,
    is_final: bool,
    base: usize,
    max_depth: usize,
) -> Result<Lexed, SyntaxError> {
    let mut lexer = Lexer {
        bytes: window,
        pos,
        is_final,
        base,
        settled: pos,
        resume: None,
    };
    match lexer.token(state) {
        Ok(token) => {
            state.apply(&token, max_depth, base)?;
            Ok(Lexed::Token(token))
        }
        Err(Halt::NeedMore) => {
            if let Some(expect) = lexer.resume {
                state.expect = expect;
            }
            Ok(Lexed::NeedMore {
                skipped: lexer.settled - pos,
            })
        }
        Err(Halt::Syntax(err)) => Err(err),
    }
}

/// Decodes the character at `index` for error messages.
pub(crate) fn char_at(bytes: &[u8], index: usize) -> char {
    let (c, _) = bstr::decode_utf8(&bytes[index.min(bytes.len())..]);
    c.unwrap_or(char::REPLACEMENT_CHARACTER)
}

enum Halt {
    NeedMore,
    Syntax(SyntaxError),
}

struct Lexer<'w> {
    bytes: &'w [u8],
    pos: usize,
    is_final: bool,
    base: usize,
    /// Everything before this index is separators already accounted for.
    settled: usize,
    /// Where to pick up if the window ends after `settled`.
    resume: Option<Expect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Number {
    Start,
    Sign,
    Zero,
    Integer,
    Point,
    Fraction,
    Exponent,
    ExponentSign,
    ExponentDigits,
}

impl Number {
    fn is_complete(self) -> bool {
        matches!(
            self,
            Number::Zero | Number::Integer | Number::Fraction | Number::ExponentDigits
        )
    }
}

impl Lexer<'_> {
    fn token(&mut self, state: &TokenizerState) -> Result<RawToken, Halt> {
        self.skip_whitespace();
        self.settled = self.pos;
        match state.expect {
            Expect::RootValue | Expect::PropertyValue => self.value(Expected::Value),
            Expect::ObjectFirst => match self.peek(Expected::PropertyNameOrObjectEnd)? {
                b'}' => Ok(self.structural(TokenKind::EndObject)),
                b'"' => self.property_name(),
                _ => Err(self.unexpected(self.pos, Expected::PropertyNameOrObjectEnd)),
            },
            Expect::ArrayFirst => match self.peek(Expected::ValueOrArrayEnd)? {
                b']' => Ok(self.structural(TokenKind::EndArray)),
                _ => self.value(Expected::ValueOrArrayEnd),
            },
            Expect::AfterValue => {
                let in_object = state.stack.last() == Some(&Container::Object);
                let expected = if in_object {
                    Expected::CommaOrObjectEnd
                } else {
                    Expected::CommaOrArrayEnd
                };
                match (self.peek(expected)?, in_object) {
                    (b',', true) => {
                        self.settle_comma(Expect::Member);
                        self.member()
                    }
                    (b',', false) => {
                        self.settle_comma(Expect::Element);
                        self.value(Expected::Value)
                    }
                    (b'}', true) => Ok(self.structural(TokenKind::EndObject)),
                    (b']', false) => Ok(self.structural(TokenKind::EndArray)),
                    _ => Err(self.unexpected(self.pos, expected)),
                }
            }
            Expect::Member => self.member(),
            Expect::Element => self.value(Expected::Value),
            Expect::End => {
                if self.pos < self.bytes.len() {
                    Err(self.unexpected(self.pos, Expected::EndOfInput))
                } else if self.is_final {
                    Ok(RawToken {
                        kind: TokenKind::EndOfInput,
                        at: self.pos,
                        start: self.pos,
                        end: self.pos,
                        next: self.pos,
                        escaped: false,
                    })
                } else {
                    Err(Halt::NeedMore)
                }
            }
        }
    }

    fn settle_comma(&mut self, next: Expect) {
        self.pos += 1;
        self.skip_whitespace();
        self.settled = self.pos;
        self.resume = Some(next);
    }

    fn member(&mut self) -> Result<RawToken, Halt> {
        match self.peek(Expected::PropertyName)? {
            b'"' => self.property_name(),
            _ => Err(self.unexpected(self.pos, Expected::PropertyName)),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.bytes.get(self.pos) {
            self.pos += 1;
        }
    }

    fn peek(&self, expected: Expected) -> Result<u8, Halt> {
        match self.bytes.get(self.pos) {
            Some(&b) => Ok(b),
            None => Err(self.exhausted(self.pos, expected)),
        }
    }

    /// The window ended at `at`: either wait for more or fail for good.
    fn exhausted(&self, at: usize, expected: Expected) -> Halt {
        if self.is_final {
            self.error(at, SyntaxErrorKind::UnexpectedEndOfInput { expected })
        } else {
            Halt::NeedMore
        }
    }

    fn unexpected(&self, at: usize, expected: Expected) -> Halt {
        self.error(
            at,
            SyntaxErrorKind::UnexpectedCharacter {
                found: char_at(self.bytes, at),
                expected,
            },
        )
    }

    fn error(&self, at: usize, kind: SyntaxErrorKind) -> Halt {
        Halt::Syntax(SyntaxError {
            kind,
            offset: self.base + at,
        })
    }

    fn structural(&mut self, kind: TokenKind) -> RawToken {
        let at = self.pos;
        self.pos += 1;
        RawToken {
            kind,
            at,
            start: at,
            end: self.pos,
            next: self.pos,
            escaped: false,
        }
    }

    fn value(&mut self, expected: Expected) -> Result<RawToken, Halt> {
        match self.peek(expected)? {
            b'{' => Ok(self.structural(TokenKind::StartObject)),
            b'[' => Ok(self.structural(TokenKind::StartArray)),
            b'"' => {
                let at = self.pos;
                let (start, end, escaped) = self.string()?;
                Ok(RawToken {
                    kind: TokenKind::String,
                    at,
                    start,
                    end,
                    next: self.pos,
                    escaped,
                })
            }
            b'-' | b'0'..=b'9' => self.number(),
            b't' => self.literal(Literal::True),
            b'f' => self.literal(Literal::False),
            b'n' => self.literal(Literal::Null),
            _ => Err(self.unexpected(self.pos, expected)),
        }
    }

    fn property_name(&mut self) -> Result<RawToken, Halt> {
        let at = self.pos;
        let (start, end, escaped) = self.string()?;
        self.skip_whitespace();
        match self.peek(Expected::Colon)? {
            b':' => self.pos += 1,
            _ => return Err(self.unexpected(self.pos, Expected::Colon)),
        }
        Ok(RawToken {
            kind: TokenKind::PropertyName,
            at,
            start,
            end,
            next: self.pos,
            escaped,
        })
    }

    /// Lexes a string whose opening quote is at `pos`. Returns the payload
    /// span and whether it contains escapes.
    fn string(&mut self) -> Result<(usize, usize, bool), Halt> {
        let start = self.pos + 1;
        let mut index = start;
        let mut escaped = false;
        loop {
            let Some(found) = memchr::memchr2(b'"', b'\\', &self.bytes[index..]) else {
                self.reject_control(index, self.bytes.len())?;
                return Err(self.exhausted(self.bytes.len(), Expected::StringCharacter));
            };
            let special = index + found;
            self.reject_control(index, special)?;
            if self.bytes[special] == b'"' {
                if let Err(err) = std::str::from_utf8(&self.bytes[start..special]) {
                    return Err(self.error(start + err.valid_up_to(), SyntaxErrorKind::InvalidUtf8));
                }
                self.pos = special + 1;
                return Ok((start, special, escaped));
            }
            escaped = true;
            match escape::scan(&self.bytes[special..]) {
                Scan::Len(len) => index = special + len,
                Scan::NeedMore(expected) => {
                    return Err(self.exhausted(self.bytes.len(), expected));
                }
                Scan::Invalid { at, kind } => return Err(self.error(special + at, kind)),
            }
        }
    }

    fn reject_control(&self, from: usize, to: usize) -> Result<(), Halt> {
        match self.bytes[from..to].iter().position(|&b| b < 0x20) {
            Some(index) => Err(self.error(
                from + index,
                SyntaxErrorKind::ControlCharacter(char::from(self.bytes[from + index])),
            )),
            None => Ok(()),
        }
    }

    fn number(&mut self) -> Result<RawToken, Halt> {
        let at = self.pos;
        let mut index = at;
        let mut state = Number::Start;
        loop {
            let Some(&b) = self.bytes.get(index) else {
                if !self.is_final {
                    return Err(Halt::NeedMore);
                }
                if state.is_complete() {
                    break;
                }
                return Err(self.error(
                    index,
                    SyntaxErrorKind::UnexpectedEndOfInput {
                        expected: Expected::Digit,
                    },
                ));
            };
            state = match (state, b) {
                (Number::Start, b'-') => Number::Sign,
                (Number::Start | Number::Sign, b'0') => Number::Zero,
                (Number::Start | Number::Sign | Number::Integer, b'0'..=b'9') => Number::Integer,
                (Number::Zero | Number::Integer, b'.') => Number::Point,
                (Number::Point | Number::Fraction, b'0'..=b'9') => Number::Fraction,
                (Number::Zero | Number::Integer | Number::Fraction, b'e' | b'E') => {
                    Number::Exponent
                }
                (Number::Exponent, b'+' | b'-') => Number::ExponentSign,
                (
                    Number::Exponent | Number::ExponentSign | Number::ExponentDigits,
                    b'0'..=b'9',
                ) => Number::ExponentDigits,
                (state, _) if state.is_complete() => break,
                _ => return Err(self.unexpected(index, Expected::Digit)),
            };
            index += 1;
        }
        self.pos = index;
        Ok(RawToken {
            kind: TokenKind::Number,
            at,
            start: at,
            end: index,
            next: index,
            escaped: false,
        })
    }

    fn literal(&mut self, literal: Literal) -> Result<RawToken, Halt> {
        let at = self.pos;
        let expected = Expected::Literal(literal.text());
        match literal.step(&self.bytes[at..]) {
            Step::Done(len) => {
                self.pos = at + len;
                Ok(RawToken {
                    kind: literal.kind(),
                    at,
                    start: at,
                    end: self.pos,
                    next: self.pos,
                    escaped: false,
                })
            }
            Step::NeedMore => Err(self.exhausted(self.bytes.len(), expected)),
            Step::Reject(index) => Err(self.unexpected(at + index, expected)),
        }
    }
}
