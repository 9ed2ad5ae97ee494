use std::{fmt, io, sync::Arc};

use thiserror::Error;

use crate::tokenizer::TokenKind;

/// Everything that can go wrong while compiling a schema or materializing a
/// document.
///
/// Every variant aborts the current call; no partially built graph is ever
/// returned.
#[derive(Debug, Error)]
pub enum Error {
    /// The reader failed; `Interrupted` reads are retried and never end up
    /// here.
    #[error("source read failure: {0}")]
    SourceRead(#[from] io::Error),
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    /// A member's value could not be decoded into its field.
    #[error("{entity}.{field}: {source}")]
    SchemaMismatch {
        entity: &'static str,
        field: Arc<str>,
        #[source]
        source: DecodeError,
    },
    /// A decode failure outside any member, such as a root that is not an
    /// object.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("entity type `{0}` is not registered")]
    UnknownEntityType(&'static str),
    /// A shared run asked for an entity type that was never compiled.
    #[error("entity type `{0}` has not been compiled")]
    NotCompiled(&'static str),
    #[error("{entity}.{field}: no decoder registered as `{decoder}`")]
    UnknownDecoder {
        entity: &'static str,
        field: Arc<str>,
        decoder: &'static str,
    },
    #[error("{entity}.{field}: decoder `{decoder}` produces `{found}` but the field takes `{expected}`")]
    IncompatibleDecoder {
        entity: &'static str,
        field: Arc<str>,
        decoder: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{entity}: field `{field}` is declared twice")]
    DuplicateField { entity: &'static str, field: Arc<str> },
}

impl Error {
    /// Absolute byte offset of the failure, when the error came from the
    /// tokenizer.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::Syntax(err) => Some(err.offset),
            _ => None,
        }
    }

    /// Attaches a field to decode failures. Anything else passes through.
    pub(crate) fn in_field(self, entity: &'static str, field: &Arc<str>) -> Self {
        match self {
            Error::Decode(source) => Error::SchemaMismatch {
                entity,
                field: Arc::clone(field),
                source,
            },
            other => other,
        }
    }
}

/// A value was well-formed JSON but not what the reader wanted.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: TokenKind,
    },
    #[error("`{text}` is not a valid {target}")]
    InvalidNumber { text: Box<str>, target: &'static str },
    #[error("invalid {kind}: {text:?}")]
    InvalidValue { kind: &'static str, text: Box<str> },
    #[error("missing member `{0}`")]
    MissingMember(&'static str),
    #[error("value is not a `{0}`")]
    TypeMismatch(&'static str),
    #[error("token payload was released by a capture")]
    Detached,
    #[error("{0}")]
    Custom(Box<str>),
}

impl DecodeError {
    /// Builds a [`DecodeError::Custom`] from any displayable message.
    pub fn custom(message: impl fmt::Display) -> Self {
        DecodeError::Custom(message.to_string().into_boxed_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} at byte {offset}")]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub offset: usize,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    #[error("unexpected character {found:?}, expected {expected}")]
    UnexpectedCharacter { found: char, expected: Expected },
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEndOfInput { expected: Expected },
    #[error("invalid escape character {0:?}")]
    InvalidEscape(char),
    #[error("invalid unicode escape sequence \\u{0:04X}")]
    InvalidUnicodeEscape(u32),
    #[error("unescaped control character {0:?} in string")]
    ControlCharacter(char),
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,
    #[error("nesting exceeds {0} levels")]
    DepthLimitExceeded(usize),
}

/// What the tokenizer was prepared to accept when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    Value,
    PropertyName,
    PropertyNameOrObjectEnd,
    Colon,
    CommaOrObjectEnd,
    CommaOrArrayEnd,
    ValueOrArrayEnd,
    Literal(&'static str),
    Digit,
    HexDigit,
    StringCharacter,
    EndOfInput,
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Value => f.write_str("a value"),
            Expected::PropertyName => f.write_str("a property name"),
            Expected::PropertyNameOrObjectEnd => f.write_str("a property name or '}'"),
            Expected::Colon => f.write_str("':'"),
            Expected::CommaOrObjectEnd => f.write_str("',' or '}'"),
            Expected::CommaOrArrayEnd => f.write_str("',' or ']'"),
            Expected::ValueOrArrayEnd => f.write_str("a value or ']'"),
            Expected::Literal(literal) => write!(f, "`{literal}`"),
            Expected::Digit => f.write_str("a digit"),
            Expected::HexDigit => f.write_str("a hex digit"),
            Expected::StringCharacter => f.write_str("a string character"),
            Expected::EndOfInput => f.write_str("end of input"),
        }
    }
}
