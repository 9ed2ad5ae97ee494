//! Dynamic JSON values.
//!
//! [`Value`] holds any JSON document fragment. Schemas use it through
//! [`JsonValueDecoder`] for members whose shape is not known up front.

use std::collections::BTreeMap;

use crate::{DecoderId, Error, TokenCursor, TokenKind, decode::ValueDecoder};

pub type Map = BTreeMap<String, Value>;
pub type Array = Vec<Value>;

/// Id under which [`Registry::new`](crate::Registry::new) registers
/// [`JsonValueDecoder`].
pub const VALUE: DecoderId<Value> = DecoderId::new("value");

/// A JSON value as defined by [RFC 8259].
///
/// # Examples
///
/// ```
/// use jsonmold::{Map, Value};
///
/// let mut map = Map::new();
/// map.insert("key".to_string(), Value::from("value"));
/// let v = Value::Object(map);
/// assert_eq!(v.get("key").and_then(Value::as_str), Some("value"));
/// ```
///
/// [RFC 8259]: https://datatracker.ietf.org/doc/html/rfc8259
#[cfg_attr(any(test, feature = "serde"), derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(any(test, feature = "serde"), serde(untagged))]
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Array),
    Object(Map),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Array(v)
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Self::Object(v)
    }
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Member `key` of an object; `None` for anything else.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Object(map) => map.get(key),
            _ => None,
        }
    }
}

/// Containers still being filled while decoding.
enum Frame {
    Array(Array),
    Object(Map, Option<String>),
}

/// Reads any JSON value into a [`Value`] tree, consuming tokens up to and
/// including the value's closing token.
///
/// Nesting is tracked on an explicit stack, so deep documents are bounded by
/// [`ReaderOptions::max_depth`](crate::ReaderOptions::max_depth) rather than
/// by the call stack.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonValueDecoder;

impl ValueDecoder for JsonValueDecoder {
    type Output = Value;

    fn decode(&self, cursor: &mut TokenCursor<'_, '_>) -> Result<Value, Error> {
        let mut stack: Vec<Frame> = Vec::new();
        loop {
            let value = match cursor.kind() {
                TokenKind::StartObject => {
                    stack.push(Frame::Object(Map::new(), None));
                    cursor.advance()?;
                    continue;
                }
                TokenKind::StartArray => {
                    stack.push(Frame::Array(Array::new()));
                    cursor.advance()?;
                    continue;
                }
                TokenKind::PropertyName => {
                    let key = cursor.str_value()?.into_owned();
                    if let Some(Frame::Object(_, pending)) = stack.last_mut() {
                        *pending = Some(key);
                    }
                    cursor.advance()?;
                    continue;
                }
                TokenKind::EndObject => match stack.pop() {
                    Some(Frame::Object(map, _)) => Value::Object(map),
                    _ => return Err(cursor.unexpected("value")),
                },
                TokenKind::EndArray => match stack.pop() {
                    Some(Frame::Array(items)) => Value::Array(items),
                    _ => return Err(cursor.unexpected("value")),
                },
                TokenKind::String => Value::String(cursor.str_value()?.into_owned()),
                TokenKind::Number => Value::Number(cursor.number_value("f64")?),
                TokenKind::True => Value::Boolean(true),
                TokenKind::False => Value::Boolean(false),
                TokenKind::Null => Value::Null,
                TokenKind::Unstarted | TokenKind::EndOfInput => {
                    return Err(cursor.unexpected("value"));
                }
            };

            match stack.last_mut() {
                None => return Ok(value),
                Some(Frame::Array(items)) => items.push(value),
                Some(Frame::Object(map, pending)) => {
                    if let Some(key) = pending.take() {
                        map.insert(key, value);
                    }
                }
            }
            cursor.advance()?;
        }
    }
}
