//! Decoders turn the token(s) under a cursor into one Rust value.
//!
//! A decoder starts on the first token of its value and must finish on the
//! last one: single-token decoders read the current token and return, while
//! multi-token decoders (such as [`JsonValueDecoder`](crate::JsonValueDecoder))
//! keep advancing until their own closing token.

use std::{any::Any, fmt, marker::PhantomData, str::FromStr};

use crate::{Error, TokenCursor, TokenKind};

/// Decodes one value from a cursor.
///
/// Decoders are shared by every materializer holding the registry, possibly
/// across threads, so they must be `Send + Sync`.
pub trait ValueDecoder: Send + Sync + 'static {
    type Output: 'static;

    /// # Errors
    ///
    /// Fails when the tokens do not form a valid `Output`. Failures are
    /// reported as [`Error::Decode`]; the compiled procedure attaches the
    /// entity and field.
    fn decode(&self, cursor: &mut TokenCursor<'_, '_>) -> Result<Self::Output, Error>;
}

/// Type-erased decoder as stored in a registry.
pub(crate) trait ErasedDecode: Send + Sync {
    fn decode_any(&self, cursor: &mut TokenCursor<'_, '_>) -> Result<Box<dyn Any>, Error>;
}

impl<D: ValueDecoder> ErasedDecode for D {
    fn decode_any(&self, cursor: &mut TokenCursor<'_, '_>) -> Result<Box<dyn Any>, Error> {
        Ok(Box::new(self.decode(cursor)?))
    }
}

/// Typed name of a registered decoder.
///
/// Schemas refer to decoders by id; the output type travels with the id so
/// field setters are checked against it when the schema is built.
pub struct DecoderId<T> {
    name: &'static str,
    _output: PhantomData<fn() -> T>,
}

impl<T> DecoderId<T> {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _output: PhantomData,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for DecoderId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DecoderId<T> {}

impl<T> fmt::Debug for DecoderId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DecoderId").field(&self.name).finish()
    }
}

pub const I32: DecoderId<i32> = DecoderId::new("i32");
pub const I64: DecoderId<i64> = DecoderId::new("i64");
pub const U32: DecoderId<u32> = DecoderId::new("u32");
pub const U64: DecoderId<u64> = DecoderId::new("u64");
pub const F32: DecoderId<f32> = DecoderId::new("f32");
pub const F64: DecoderId<f64> = DecoderId::new("f64");
pub const BOOL: DecoderId<bool> = DecoderId::new("bool");
pub const STRING: DecoderId<String> = DecoderId::new("string");
pub const NULLABLE_I32: DecoderId<Option<i32>> = DecoderId::new("i32?");
pub const NULLABLE_I64: DecoderId<Option<i64>> = DecoderId::new("i64?");
pub const NULLABLE_F64: DecoderId<Option<f64>> = DecoderId::new("f64?");
pub const NULLABLE_BOOL: DecoderId<Option<bool>> = DecoderId::new("bool?");
pub const NULLABLE_STRING: DecoderId<Option<String>> = DecoderId::new("string?");

/// Any number type with a [`FromStr`] that accepts JSON number text.
pub struct NumberDecoder<T>(PhantomData<fn() -> T>);

impl<T> NumberDecoder<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for NumberDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FromStr + 'static> ValueDecoder for NumberDecoder<T> {
    type Output = T;

    fn decode(&self, cursor: &mut TokenCursor<'_, '_>) -> Result<T, Error> {
        cursor.number_value(std::any::type_name::<T>())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StringDecoder;

impl ValueDecoder for StringDecoder {
    type Output = String;

    fn decode(&self, cursor: &mut TokenCursor<'_, '_>) -> Result<String, Error> {
        cursor.expect(TokenKind::String, "string")?;
        Ok(cursor.str_value()?.into_owned())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BoolDecoder;

impl ValueDecoder for BoolDecoder {
    type Output = bool;

    fn decode(&self, cursor: &mut TokenCursor<'_, '_>) -> Result<bool, Error> {
        cursor.bool_value()
    }
}

/// Maps `null` to `None` and everything else through `D`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Nullable<D>(pub D);

impl<D: ValueDecoder> ValueDecoder for Nullable<D> {
    type Output = Option<D::Output>;

    fn decode(&self, cursor: &mut TokenCursor<'_, '_>) -> Result<Self::Output, Error> {
        if cursor.is_null() {
            Ok(None)
        } else {
            self.0.decode(cursor).map(Some)
        }
    }
}

/// A decoder backed by a closure. Built with [`decoder_fn`].
pub struct FnDecoder<F, T> {
    f: F,
    _output: PhantomData<fn() -> T>,
}

/// Wraps a closure as a [`ValueDecoder`].
///
/// ```rust
/// use jsonmold::{DecoderId, Registry, TokenKind, decoder_fn};
///
/// const UPPER: DecoderId<String> = DecoderId::new("upper");
///
/// let mut registry = Registry::new();
/// registry.register_decoder(UPPER, decoder_fn(|cursor| {
///     cursor.expect(TokenKind::String, "string")?;
///     Ok(cursor.str_value()?.to_uppercase())
/// }));
/// ```
pub fn decoder_fn<T, F>(f: F) -> FnDecoder<F, T>
where
    T: 'static,
    F: Fn(&mut TokenCursor<'_, '_>) -> Result<T, Error> + Send + Sync + 'static,
{
    FnDecoder {
        f,
        _output: PhantomData,
    }
}

impl<T, F> ValueDecoder for FnDecoder<F, T>
where
    T: 'static,
    F: Fn(&mut TokenCursor<'_, '_>) -> Result<T, Error> + Send + Sync + 'static,
{
    type Output = T;

    fn decode(&self, cursor: &mut TokenCursor<'_, '_>) -> Result<T, Error> {
        (self.f)(cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::{BoolDecoder, Nullable, NumberDecoder, StringDecoder, decoder_fn, ValueDecoder};
    use crate::{ChunkBuffer, DecodeError, Error, ReaderOptions, TokenCursor, TokenKind};

    fn decode_root<D: ValueDecoder>(decoder: &D, doc: &str) -> Result<D::Output, Error> {
        let mut buffer = ChunkBuffer::from_slice(doc.as_bytes(), &ReaderOptions::default());
        let mut cursor = TokenCursor::resume(&mut buffer);
        cursor.advance()?;
        decoder.decode(&mut cursor)
    }

    #[test]
    fn numbers() {
        assert_eq!(decode_root(&NumberDecoder::<i32>::new(), "-17").unwrap(), -17);
        assert_eq!(decode_root(&NumberDecoder::<u64>::new(), "18446744073709551615").unwrap(), u64::MAX);
        assert_eq!(decode_root(&NumberDecoder::<f64>::new(), "2.5e-1").unwrap(), 0.25);
        assert!(matches!(
            decode_root(&NumberDecoder::<i32>::new(), "1.5"),
            Err(Error::Decode(DecodeError::InvalidNumber { .. }))
        ));
        assert!(matches!(
            decode_root(&NumberDecoder::<u32>::new(), "-1"),
            Err(Error::Decode(DecodeError::InvalidNumber { .. }))
        ));
        assert!(matches!(
            decode_root(&NumberDecoder::<i64>::new(), "\"1\""),
            Err(Error::Decode(DecodeError::UnexpectedToken {
                found: TokenKind::String,
                ..
            }))
        ));
    }

    #[test]
    fn strings_and_bools() {
        assert_eq!(decode_root(&StringDecoder, "\"a\\nb\"").unwrap(), "a\nb");
        assert!(decode_root(&StringDecoder, "12").is_err());
        assert!(decode_root(&BoolDecoder, "false").is_ok_and(|b| !b));
        assert!(decode_root(&BoolDecoder, "null").is_err());
    }

    #[test]
    fn nullable() {
        let decoder = Nullable(StringDecoder);
        assert_eq!(decode_root(&decoder, "null").unwrap(), None);
        assert_eq!(decode_root(&decoder, "\"x\"").unwrap(), Some("x".to_string()));
    }

    #[test]
    fn closures() {
        let doubled = decoder_fn(|cursor| Ok(cursor.number_value::<i32>("i32")? * 2));
        assert_eq!(decode_root(&doubled, "21").unwrap(), 42);
    }
}
