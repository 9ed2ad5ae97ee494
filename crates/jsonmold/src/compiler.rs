//! Compiles entity schemas into reusable procedures and runs them.
//!
//! Each entity type is compiled once into a [`CompiledEntity`]: its members
//! with their names, a resolved action (decoder or nested procedure) and the
//! setter. Procedures live in a table addressed by [`ProcedureId`]; nested
//! members refer to their child's id, which is how self-referential and
//! mutually recursive schemas compile without looping.
//!
//! Running a procedure threads the document through the capture/resume
//! protocol: the frame reading a member captures its cursor right before the
//! nested procedure runs and resumes right after it returns.

use std::{
    any::{Any, type_name},
    collections::HashMap,
    io,
    sync::Arc,
};

use tracing::{debug, trace};

use crate::{
    DecodeError, Error, ReaderOptions, TokenCursor, TokenKind,
    chunk::{ChunkBuffer, Source},
    decode::ErasedDecode,
    schema::{EntityTypeId, FieldDescriptor, FieldKind, Registry, SchemaRegistry, Setter},
};

/// Index of a compiled procedure in a [`Materializer`]'s table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcedureId(usize);

enum Action {
    Scalar(Arc<dyn ErasedDecode>),
    ScalarArray(Arc<dyn ErasedDecode>),
    Nested(ProcedureId),
    NestedArray(ProcedureId),
}

struct CompiledField {
    name: Arc<str>,
    action: Action,
    assign: Setter,
}

struct CompiledEntity {
    entity: EntityTypeId,
    construct: fn() -> Box<dyn Any>,
    fields: Box<[CompiledField]>,
}

/// Reads documents into entities described by a [`SchemaRegistry`].
///
/// Procedures are compiled on first use and kept for the lifetime of the
/// materializer. Once the entity types a process needs are compiled, the
/// materializer can be shared and read through
/// [`materialize_compiled`](Self::materialize_compiled), which only takes
/// `&self`.
///
/// ```rust
/// use jsonmold::{EntitySchema, Materializer, Registry, decode};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Search {
///     count: i32,
///     term: String,
/// }
///
/// let mut registry = Registry::new();
/// registry.register_schema(
///     EntitySchema::builder::<Search>()
///         .scalar("Count", decode::I32, |s, v| s.count = v)
///         .scalar("Term", decode::STRING, |s, v| s.term = v)
///         .build()?,
/// );
///
/// let mut materializer = Materializer::new(registry);
/// let search: Search = materializer.from_slice(br#"{"Term":"rust","Count":3}"#)?;
/// assert_eq!(search, Search { count: 3, term: "rust".into() });
/// # Ok::<(), jsonmold::Error>(())
/// ```
pub struct Materializer<R = Registry> {
    registry: R,
    options: ReaderOptions,
    procedures: Vec<CompiledEntity>,
    cache: HashMap<EntityTypeId, ProcedureId>,
}

impl<R: SchemaRegistry> Materializer<R> {
    #[must_use]
    pub fn new(registry: R) -> Self {
        Self::with_options(registry, ReaderOptions::default())
    }

    #[must_use]
    pub fn with_options(registry: R, options: ReaderOptions) -> Self {
        Self {
            registry,
            options,
            procedures: Vec::new(),
            cache: HashMap::new(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &R {
        &self.registry
    }

    #[must_use]
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Number of compiled procedures.
    #[must_use]
    pub fn compiled_len(&self) -> usize {
        self.procedures.len()
    }

    /// The procedure for `entity`, if it has been compiled.
    #[must_use]
    pub fn procedure(&self, entity: EntityTypeId) -> Option<ProcedureId> {
        self.cache.get(&entity).copied()
    }

    /// Compiles `T` and everything it references.
    ///
    /// # Errors
    ///
    /// See [`compile_entity`](Self::compile_entity).
    pub fn compile<T: 'static>(&mut self) -> Result<ProcedureId, Error> {
        self.compile_entity(EntityTypeId::of::<T>())
    }

    /// Returns the procedure for `entity`, compiling it and any entities it
    /// references first. A failed compilation leaves the table as it was.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownEntityType`], [`Error::UnknownDecoder`] and
    /// [`Error::IncompatibleDecoder`] for misconfigured schemas.
    pub fn compile_entity(&mut self, entity: EntityTypeId) -> Result<ProcedureId, Error> {
        let mark = self.procedures.len();
        let result = self.compile_inner(entity);
        if result.is_err() {
            self.procedures.truncate(mark);
            self.cache.retain(|_, id| id.0 < mark);
        }
        result
    }

    fn compile_inner(&mut self, entity: EntityTypeId) -> Result<ProcedureId, Error> {
        if let Some(&id) = self.cache.get(&entity) {
            return Ok(id);
        }
        let schema = self
            .registry
            .schema(entity)
            .ok_or(Error::UnknownEntityType(entity.name()))?;
        let construct = schema.construct;
        let descriptors = schema.fields().to_vec();

        // Registered before the members so self references find it.
        let id = ProcedureId(self.procedures.len());
        self.procedures.push(CompiledEntity {
            entity,
            construct,
            fields: Box::default(),
        });
        self.cache.insert(entity, id);

        let mut fields = Vec::with_capacity(descriptors.len());
        for field in descriptors {
            let action = match field.kind() {
                FieldKind::Scalar(decoder) => Action::Scalar(self.resolve(entity, &field, decoder)?),
                FieldKind::ScalarArray(decoder) => {
                    Action::ScalarArray(self.resolve(entity, &field, decoder)?)
                }
                FieldKind::Nested(child) => Action::Nested(self.compile_inner(child)?),
                FieldKind::NestedArray(child) => Action::NestedArray(self.compile_inner(child)?),
            };
            fields.push(CompiledField {
                name: Arc::clone(field.shared_name()),
                action,
                assign: field.assign,
            });
        }
        debug!(
            target: "jsonmold",
            entity = entity.name(),
            fields = fields.len(),
            procedure = id.0,
            "compiled entity"
        );
        self.procedures[id.0].fields = fields.into_boxed_slice();
        Ok(id)
    }

    fn resolve(
        &self,
        entity: EntityTypeId,
        field: &FieldDescriptor,
        decoder: &'static str,
    ) -> Result<Arc<dyn ErasedDecode>, Error> {
        let registered = self
            .registry
            .decoder(decoder)
            .ok_or_else(|| Error::UnknownDecoder {
                entity: entity.name(),
                field: Arc::clone(field.shared_name()),
                decoder,
            })?;
        if registered.output.id != field.accepts.id {
            return Err(Error::IncompatibleDecoder {
                entity: entity.name(),
                field: Arc::clone(field.shared_name()),
                decoder,
                expected: field.accepts.name,
                found: registered.output.name,
            });
        }
        Ok(Arc::clone(&registered.decoder))
    }

    /// Reads one document whose root is an object into a `T`.
    ///
    /// # Errors
    ///
    /// Compile errors for `T`, syntax and reader errors, and
    /// [`Error::SchemaMismatch`] when a member's value has the wrong shape.
    pub fn materialize<'r, T: 'static>(&mut self, source: impl Into<Source<'r>>) -> Result<T, Error> {
        let value = self.materialize_any(EntityTypeId::of::<T>(), source)?;
        value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| DecodeError::TypeMismatch(type_name::<T>()).into())
    }

    /// # Errors
    ///
    /// See [`materialize`](Self::materialize).
    #[allow(clippy::wrong_self_convention)]
    pub fn from_slice<T: 'static>(&mut self, bytes: &[u8]) -> Result<T, Error> {
        self.materialize(bytes)
    }

    /// # Errors
    ///
    /// See [`materialize`](Self::materialize).
    #[allow(clippy::wrong_self_convention)]
    pub fn from_reader<T: 'static>(&mut self, reader: impl io::Read) -> Result<T, Error> {
        self.materialize(Source::reader(reader))
    }

    /// Type-erased [`materialize`](Self::materialize); the box holds an
    /// instance of `entity`'s type.
    ///
    /// # Errors
    ///
    /// See [`materialize`](Self::materialize).
    pub fn materialize_any<'r>(
        &mut self,
        entity: EntityTypeId,
        source: impl Into<Source<'r>>,
    ) -> Result<Box<dyn Any>, Error> {
        let id = self.compile_entity(entity)?;
        self.read_root(id, source.into())
    }

    /// Reads one document into a `T` that was compiled earlier, without
    /// compiling anything.
    ///
    /// ```rust
    /// use std::sync::OnceLock;
    ///
    /// use jsonmold::{EntitySchema, Materializer, Registry, decode};
    ///
    /// #[derive(Debug, Default)]
    /// struct Ping {
    ///     seq: u32,
    /// }
    ///
    /// static PINGS: OnceLock<Materializer> = OnceLock::new();
    ///
    /// let pings = PINGS.get_or_init(|| {
    ///     let mut registry = Registry::new();
    ///     registry.register_schema(
    ///         EntitySchema::builder::<Ping>()
    ///             .scalar("seq", decode::U32, |p, v| p.seq = v)
    ///             .build()
    ///             .unwrap(),
    ///     );
    ///     let mut materializer = Materializer::new(registry);
    ///     materializer.compile::<Ping>().unwrap();
    ///     materializer
    /// });
    /// let ping: Ping = pings.materialize_compiled(r#"{"seq":7}"#)?;
    /// assert_eq!(ping.seq, 7);
    /// # Ok::<(), jsonmold::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// [`Error::NotCompiled`] when `T` has no procedure yet, otherwise as
    /// [`materialize`](Self::materialize).
    pub fn materialize_compiled<'r, T: 'static>(&self, source: impl Into<Source<'r>>) -> Result<T, Error> {
        let value = self.materialize_compiled_any(EntityTypeId::of::<T>(), source)?;
        value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| DecodeError::TypeMismatch(type_name::<T>()).into())
    }

    /// Type-erased [`materialize_compiled`](Self::materialize_compiled).
    ///
    /// # Errors
    ///
    /// See [`materialize_compiled`](Self::materialize_compiled).
    pub fn materialize_compiled_any<'r>(
        &self,
        entity: EntityTypeId,
        source: impl Into<Source<'r>>,
    ) -> Result<Box<dyn Any>, Error> {
        let id = self
            .procedure(entity)
            .ok_or(Error::NotCompiled(entity.name()))?;
        self.read_root(id, source.into())
    }

    fn read_root(&self, id: ProcedureId, source: Source<'_>) -> Result<Box<dyn Any>, Error> {
        let entity = self.procedures[id.0].entity;
        let mut buffer = ChunkBuffer::new(source, &self.options);
        debug!(target: "jsonmold", entity = entity.name(), "materializing");

        let mut cursor = TokenCursor::resume(&mut buffer);
        if cursor.advance()? != TokenKind::StartObject {
            return Err(cursor.unexpected("object"));
        }
        let buffer = cursor.capture();
        let value = self.run(id, buffer)?;

        let mut cursor = TokenCursor::resume(buffer);
        let end = cursor.advance()?;
        debug_assert_eq!(end, TokenKind::EndOfInput);
        let buffer = cursor.capture();
        debug!(
            target: "jsonmold",
            entity = entity.name(),
            bytes = buffer.window_offset(),
            refills = buffer.refills(),
            "materialized"
        );
        Ok(value)
    }

    /// Runs procedure `id` on a buffer captured just after the entity's
    /// opening brace. Returns with the closing brace consumed and the cursor
    /// captured again.
    fn run(&self, id: ProcedureId, buffer: &mut ChunkBuffer<'_>) -> Result<Box<dyn Any>, Error> {
        let procedure = &self.procedures[id.0];
        let mut entity = (procedure.construct)();
        let mut cursor = TokenCursor::resume(buffer);
        loop {
            match cursor.advance()? {
                TokenKind::PropertyName => {
                    let field = {
                        let name = cursor.str_value()?;
                        procedure.fields.iter().find(|field| *field.name == *name)
                    };
                    match field {
                        Some(field) => {
                            cursor = self.read_field(procedure, field, cursor, entity.as_mut())?;
                        }
                        None => {
                            trace!(
                                target: "jsonmold",
                                entity = procedure.entity.name(),
                                offset = cursor.offset(),
                                "skipping unknown member"
                            );
                            cursor.skip_value()?;
                        }
                    }
                }
                TokenKind::EndObject => break,
                _ => return Err(cursor.unexpected("property name or end of object")),
            }
        }
        cursor.capture();
        Ok(entity)
    }

    fn read_field<'b, 'r>(
        &self,
        owner: &CompiledEntity,
        field: &CompiledField,
        mut cursor: TokenCursor<'b, 'r>,
        entity: &mut dyn Any,
    ) -> Result<TokenCursor<'b, 'r>, Error> {
        let in_field = |err: Error| err.in_field(owner.entity.name(), &field.name);
        let assign = |entity: &mut dyn Any, value: Box<dyn Any>| {
            (field.assign)(entity, value).map_err(|err| in_field(err.into()))
        };

        match &field.action {
            Action::Scalar(decoder) => {
                cursor.advance()?;
                let value = decoder.decode_any(&mut cursor).map_err(in_field)?;
                assign(entity, value)?;
            }
            Action::ScalarArray(decoder) => match cursor.advance()? {
                TokenKind::Null => {}
                TokenKind::StartArray => {
                    while cursor.advance()? != TokenKind::EndArray {
                        let value = decoder.decode_any(&mut cursor).map_err(in_field)?;
                        assign(entity, value)?;
                    }
                }
                _ => return Err(in_field(cursor.unexpected("array"))),
            },
            Action::Nested(child) => match cursor.advance()? {
                TokenKind::Null => {}
                TokenKind::StartObject => {
                    let buffer = cursor.capture();
                    let value = self.run(*child, buffer)?;
                    cursor = TokenCursor::resume(buffer);
                    assign(entity, value)?;
                }
                _ => return Err(in_field(cursor.unexpected("object"))),
            },
            Action::NestedArray(child) => match cursor.advance()? {
                TokenKind::Null => {}
                TokenKind::StartArray => loop {
                    match cursor.advance()? {
                        TokenKind::EndArray => break,
                        TokenKind::StartObject => {
                            let buffer = cursor.capture();
                            let value = self.run(*child, buffer)?;
                            cursor = TokenCursor::resume(buffer);
                            assign(entity, value)?;
                        }
                        _ => return Err(in_field(cursor.unexpected("object"))),
                    }
                },
                _ => return Err(in_field(cursor.unexpected("array"))),
            },
        }
        Ok(cursor)
    }
}
