//! Streams JSON documents into typed object graphs.
//!
//! Entity types are described once in a [`Registry`] as ordered member lists
//! ([`EntitySchema`]). A [`Materializer`] compiles each schema into a
//! procedure on first use and then reads documents in a single forward pass
//! over a [`ChunkBuffer`], which is refilled from a reader as the tokenizer
//! asks for more bytes. Nested objects are read by the nested entity's own
//! procedure: the parent captures its [`TokenCursor`] into the buffer, the
//! child resumes from that record, and the parent resumes after the child
//! returns.
//!
//! ```rust
//! use jsonmold::{EntitySchema, Materializer, Registry, decode};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Node {
//!     count: i32,
//!     tags: Vec<String>,
//!     child: Option<Box<Node>>,
//! }
//!
//! let mut registry = Registry::new();
//! registry.register_schema(
//!     EntitySchema::builder::<Node>()
//!         .scalar("Count", decode::I32, |n, v| n.count = v)
//!         .scalar_array("Tags", decode::STRING, |n, v| n.tags.push(v))
//!         .nested("Child", |n, v: Node| n.child = Some(Box::new(v)))
//!         .build()?,
//! );
//!
//! let mut materializer = Materializer::new(registry);
//! let doc = r#"{"Count":3,"Tags":["a","b"],"Child":{"Count":1}}"#;
//! let node: Node = materializer.from_reader(doc.as_bytes())?;
//! assert_eq!(node.tags, ["a", "b"]);
//! assert_eq!(node.child.map(|c| c.count), Some(1));
//! # Ok::<(), jsonmold::Error>(())
//! ```

#![allow(missing_docs)]

mod chunk;
mod compiler;
mod cursor;
pub mod decode;
mod error;
mod options;
mod schema;
mod tokenizer;
mod value;

#[doc(hidden)]
pub mod chunk_utils;

#[cfg(test)]
mod tests;

pub use chunk::{ChunkBuffer, Source};
pub use compiler::{Materializer, ProcedureId};
pub use cursor::TokenCursor;
pub use decode::{DecoderId, ValueDecoder, decoder_fn};
pub use error::{DecodeError, Error, Expected, SyntaxError, SyntaxErrorKind};
pub use options::ReaderOptions;
pub use schema::{
    EntitySchema, EntityTypeId, FieldDescriptor, FieldKind, RegisteredDecoder, Registry,
    SchemaBuilder, SchemaRegistry,
};
pub use tokenizer::{TokenKind, TokenizerState};
pub use value::{Array, JsonValueDecoder, Map, VALUE, Value};
