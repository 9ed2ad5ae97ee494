//! Entity schemas and the registry that holds them.
//!
//! A schema lists, in order, the members an entity type reads from a JSON
//! object: each member has a name, a [`FieldKind`] saying how its value is
//! decoded, and a setter that stores the decoded value into the entity. The
//! typed [`SchemaBuilder`] ties each setter to the Rust type its decoder or
//! nested entity produces; the built [`EntitySchema`] is type-erased so a
//! registry can hold schemas for any number of types.

use std::{
    any::{Any, TypeId, type_name},
    collections::{HashMap, HashSet},
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    sync::Arc,
};

use crate::{
    DecodeError, Error,
    decode::{
        self, BoolDecoder, DecoderId, ErasedDecode, Nullable, NumberDecoder, StringDecoder,
        ValueDecoder,
    },
    value::{self, JsonValueDecoder},
};

/// Identity of an entity type: its [`TypeId`] plus a name for messages.
#[derive(Clone, Copy)]
pub struct EntityTypeId {
    id: TypeId,
    name: &'static str,
}

impl EntityTypeId {
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EntityTypeId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityTypeId {}

impl Hash for EntityTypeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EntityTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// How a member's value is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// One value read by the named decoder.
    Scalar(&'static str),
    /// An array, each element read by the named decoder.
    ScalarArray(&'static str),
    /// One nested object read by that entity's procedure.
    Nested(EntityTypeId),
    /// An array of nested objects.
    NestedArray(EntityTypeId),
}

/// Stores a decoded value into an entity.
pub(crate) type Setter =
    Arc<dyn Fn(&mut dyn Any, Box<dyn Any>) -> Result<(), DecodeError> + Send + Sync>;

/// Rust type a setter accepts.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Accepts {
    pub(crate) id: TypeId,
    pub(crate) name: &'static str,
}

impl Accepts {
    fn of<V: 'static>() -> Self {
        Self {
            id: TypeId::of::<V>(),
            name: type_name::<V>(),
        }
    }
}

/// One member of an [`EntitySchema`].
#[derive(Clone)]
pub struct FieldDescriptor {
    name: Arc<str>,
    kind: FieldKind,
    pub(crate) accepts: Accepts,
    pub(crate) assign: Setter,
}

impl FieldDescriptor {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> &Arc<str> {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("accepts", &self.accepts.name)
            .finish_non_exhaustive()
    }
}

fn setter<T: 'static, V: 'static>(set: impl Fn(&mut T, V) + Send + Sync + 'static) -> Setter {
    Arc::new(move |entity: &mut dyn Any, value: Box<dyn Any>| {
        let entity = entity
            .downcast_mut::<T>()
            .ok_or(DecodeError::TypeMismatch(type_name::<T>()))?;
        let value = value
            .downcast::<V>()
            .map_err(|_| DecodeError::TypeMismatch(type_name::<V>()))?;
        set(entity, *value);
        Ok(())
    })
}

fn construct<T: Default + 'static>() -> Box<dyn Any> {
    Box::new(T::default())
}

/// The ordered member list of one entity type.
pub struct EntitySchema {
    entity: EntityTypeId,
    pub(crate) construct: fn() -> Box<dyn Any>,
    fields: Vec<FieldDescriptor>,
}

impl EntitySchema {
    /// Starts a schema for `T`. Entities are created with
    /// [`Default::default`] before any member is read.
    #[must_use]
    pub fn builder<T: Default + 'static>() -> SchemaBuilder<T> {
        SchemaBuilder {
            fields: Vec::new(),
            _entity: PhantomData,
        }
    }

    #[must_use]
    pub fn entity(&self) -> EntityTypeId {
        self.entity
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}

impl fmt::Debug for EntitySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySchema")
            .field("entity", &self.entity)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Typed builder for an [`EntitySchema`].
///
/// ```rust
/// use jsonmold::{EntitySchema, decode};
///
/// #[derive(Default)]
/// struct Search {
///     count: i32,
///     term: String,
/// }
///
/// let schema = EntitySchema::builder::<Search>()
///     .scalar("Count", decode::I32, |s, v| s.count = v)
///     .scalar("Term", decode::STRING, |s, v| s.term = v)
///     .build()?;
/// assert_eq!(schema.fields().len(), 2);
/// # Ok::<(), jsonmold::Error>(())
/// ```
pub struct SchemaBuilder<T> {
    fields: Vec<FieldDescriptor>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Default + 'static> SchemaBuilder<T> {
    fn push(mut self, name: impl Into<Arc<str>>, kind: FieldKind, accepts: Accepts, assign: Setter) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            kind,
            accepts,
            assign,
        });
        self
    }

    /// A member read by `decoder` and stored with `set`.
    #[must_use]
    pub fn scalar<V: 'static>(
        self,
        name: impl Into<Arc<str>>,
        decoder: DecoderId<V>,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> Self {
        self.push(
            name,
            FieldKind::Scalar(decoder.name()),
            Accepts::of::<V>(),
            setter(set),
        )
    }

    /// An array member; `push` is called once per element, in order.
    #[must_use]
    pub fn scalar_array<V: 'static>(
        self,
        name: impl Into<Arc<str>>,
        decoder: DecoderId<V>,
        push: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> Self {
        self.push(
            name,
            FieldKind::ScalarArray(decoder.name()),
            Accepts::of::<V>(),
            setter(push),
        )
    }

    /// A nested object materialized as entity `C`.
    #[must_use]
    pub fn nested<C: 'static>(
        self,
        name: impl Into<Arc<str>>,
        set: impl Fn(&mut T, C) + Send + Sync + 'static,
    ) -> Self {
        self.push(
            name,
            FieldKind::Nested(EntityTypeId::of::<C>()),
            Accepts::of::<C>(),
            setter(set),
        )
    }

    /// An array of nested objects; `push` is called once per element.
    #[must_use]
    pub fn nested_array<C: 'static>(
        self,
        name: impl Into<Arc<str>>,
        push: impl Fn(&mut T, C) + Send + Sync + 'static,
    ) -> Self {
        self.push(
            name,
            FieldKind::NestedArray(EntityTypeId::of::<C>()),
            Accepts::of::<C>(),
            setter(push),
        )
    }

    /// # Errors
    ///
    /// [`Error::DuplicateField`] when two members share a name.
    pub fn build(self) -> Result<EntitySchema, Error> {
        let entity = EntityTypeId::of::<T>();
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_ref()) {
                return Err(Error::DuplicateField {
                    entity: entity.name(),
                    field: Arc::clone(&field.name),
                });
            }
        }
        Ok(EntitySchema {
            entity,
            construct: construct::<T>,
            fields: self.fields,
        })
    }
}

/// A decoder as held by a registry, with the type it produces.
#[derive(Clone)]
pub struct RegisteredDecoder {
    name: &'static str,
    pub(crate) output: Accepts,
    pub(crate) decoder: Arc<dyn ErasedDecode>,
}

impl RegisteredDecoder {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Name of the Rust type the decoder produces.
    #[must_use]
    pub fn output_type(&self) -> &'static str {
        self.output.name
    }
}

impl fmt::Debug for RegisteredDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredDecoder")
            .field("name", &self.name)
            .field("output", &self.output.name)
            .finish_non_exhaustive()
    }
}

/// Source of schemas and decoders for a [`Materializer`](crate::Materializer).
pub trait SchemaRegistry {
    fn schema(&self, entity: EntityTypeId) -> Option<&EntitySchema>;

    fn decoder(&self, name: &str) -> Option<&RegisteredDecoder>;
}

impl<R: SchemaRegistry + ?Sized> SchemaRegistry for &R {
    fn schema(&self, entity: EntityTypeId) -> Option<&EntitySchema> {
        (**self).schema(entity)
    }

    fn decoder(&self, name: &str) -> Option<&RegisteredDecoder> {
        (**self).decoder(name)
    }
}

/// The in-memory [`SchemaRegistry`]. Populate it before handing it to a
/// materializer.
#[derive(Default)]
pub struct Registry {
    schemas: HashMap<EntityTypeId, EntitySchema>,
    decoders: HashMap<&'static str, RegisteredDecoder>,
}

impl Registry {
    /// A registry with the decoders from [`decode`](crate::decode) and
    /// [`VALUE`](crate::value::VALUE) already registered.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry
            .register_decoder(decode::I32, NumberDecoder::new())
            .register_decoder(decode::I64, NumberDecoder::new())
            .register_decoder(decode::U32, NumberDecoder::new())
            .register_decoder(decode::U64, NumberDecoder::new())
            .register_decoder(decode::F32, NumberDecoder::new())
            .register_decoder(decode::F64, NumberDecoder::new())
            .register_decoder(decode::BOOL, BoolDecoder)
            .register_decoder(decode::STRING, StringDecoder)
            .register_decoder(decode::NULLABLE_I32, Nullable(NumberDecoder::new()))
            .register_decoder(decode::NULLABLE_I64, Nullable(NumberDecoder::new()))
            .register_decoder(decode::NULLABLE_F64, Nullable(NumberDecoder::new()))
            .register_decoder(decode::NULLABLE_BOOL, Nullable(BoolDecoder))
            .register_decoder(decode::NULLABLE_STRING, Nullable(StringDecoder))
            .register_decoder(value::VALUE, JsonValueDecoder);
        registry
    }

    /// A registry with nothing in it.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds or replaces the schema for its entity type.
    pub fn register_schema(&mut self, schema: EntitySchema) -> &mut Self {
        self.schemas.insert(schema.entity, schema);
        self
    }

    /// Adds or replaces the decoder registered under `id`.
    pub fn register_decoder<D: ValueDecoder>(&mut self, id: DecoderId<D::Output>, decoder: D) -> &mut Self {
        self.decoders.insert(
            id.name(),
            RegisteredDecoder {
                name: id.name(),
                output: Accepts::of::<D::Output>(),
                decoder: Arc::new(decoder),
            },
        );
        self
    }

    #[must_use]
    pub fn contains(&self, entity: EntityTypeId) -> bool {
        self.schemas.contains_key(&entity)
    }
}

impl SchemaRegistry for Registry {
    fn schema(&self, entity: EntityTypeId) -> Option<&EntitySchema> {
        self.schemas.get(&entity)
    }

    fn decoder(&self, name: &str) -> Option<&RegisteredDecoder> {
        self.decoders.get(name)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("schemas", &self.schemas.keys().collect::<Vec<_>>())
            .field("decoders", &self.decoders.keys().collect::<Vec<_>>())
            .finish()
    }
}
