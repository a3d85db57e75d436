//! # Declared Schemas
//!
//! Structs and enums describe themselves once; the registry derives their
//! handlers from that description.
//!
//! ```rust,ignore
//! impl Persist for Marker {
//!     fn type_info() -> TypeInfo {
//!         StructSchema::builder::<Self>("Marker")
//!             .field("label", |m| &m.label, |m, v| m.label = v)
//!             .computed("area", |m| m.w * m.h, |_, _| {})
//!             .build()
//!     }
//! }
//! ```

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::type_info::{cast, unbox, EnumOps, Persist, TypeInfo, TypeInfoFn, TypeShape};

/// Reads and writes one field of an erased owner.
pub trait FieldAccess: Send + Sync {
    /// Calls `f` with the current field value.
    fn with_value(&self, owner: &dyn Any, f: &mut dyn FnMut(&dyn Any));

    /// Stores a deserialized value into the field.
    fn assign(&self, owner: &mut dyn Any, value: Box<dyn Any>);
}

struct RefField<T, F> {
    get: fn(&T) -> &F,
    set: fn(&mut T, F),
}

impl<T: 'static, F: 'static> FieldAccess for RefField<T, F> {
    fn with_value(&self, owner: &dyn Any, f: &mut dyn FnMut(&dyn Any)) {
        f((self.get)(cast::<T>(owner)));
    }

    fn assign(&self, owner: &mut dyn Any, value: Box<dyn Any>) {
        let value = unbox::<F>(value);
        match owner.downcast_mut::<T>() {
            Some(owner) => (self.set)(owner, value),
            None => panic!("field setter for {} given another type", type_name::<T>()),
        }
    }
}

struct ComputedField<T, F> {
    get: fn(&T) -> F,
    set: fn(&mut T, F),
}

impl<T: 'static, F: 'static> FieldAccess for ComputedField<T, F> {
    fn with_value(&self, owner: &dyn Any, f: &mut dyn FnMut(&dyn Any)) {
        let value = (self.get)(cast::<T>(owner));
        f(&value);
    }

    fn assign(&self, owner: &mut dyn Any, value: Box<dyn Any>) {
        let value = unbox::<F>(value);
        match owner.downcast_mut::<T>() {
            Some(owner) => (self.set)(owner, value),
            None => panic!("field setter for {} given another type", type_name::<T>()),
        }
    }
}

/// One named field of a struct schema.
pub struct FieldSchema {
    name: &'static str,
    info: TypeInfoFn,
    access: Box<dyn FieldAccess>,
}

impl FieldSchema {
    /// Key the field is stored under.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Descriptor of the field's type.
    #[must_use]
    pub fn info(&self) -> TypeInfo {
        (self.info)()
    }

    /// Erased accessor.
    #[must_use]
    pub fn access(&self) -> &dyn FieldAccess {
        self.access.as_ref()
    }
}

/// Field list of a persisted struct.
pub struct StructSchema {
    name: &'static str,
    type_id: TypeId,
    fields: Vec<FieldSchema>,
    construct: fn() -> Box<dyn Any>,
}

impl StructSchema {
    /// Starts a schema for `T`. Fields missing from stored data keep the
    /// value from `T::default()`.
    #[must_use]
    pub fn builder<T: Default + 'static>(name: &'static str) -> StructSchemaBuilder<T> {
        StructSchemaBuilder {
            name,
            fields: Vec::new(),
            _owner: PhantomData,
        }
    }

    /// Struct name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Identity of the struct type.
    #[must_use]
    pub const fn owner_type_id(&self) -> TypeId {
        self.type_id
    }

    /// Declared fields, in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// A default-initialised instance.
    #[must_use]
    pub fn construct(&self) -> Box<dyn Any> {
        (self.construct)()
    }
}

impl fmt::Debug for StructSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructSchema")
            .field("name", &self.name)
            .field("fields", &self.fields.iter().map(|x| x.name).collect::<Vec<_>>())
            .finish()
    }
}

fn construct_default<T: Default + 'static>() -> Box<dyn Any> {
    Box::new(T::default())
}

/// Builder returned by [`StructSchema::builder`].
pub struct StructSchemaBuilder<T> {
    name: &'static str,
    fields: Vec<FieldSchema>,
    _owner: PhantomData<fn() -> T>,
}

impl<T: Default + 'static> StructSchemaBuilder<T> {
    /// Adds a field read by reference.
    ///
    /// # Panics
    ///
    /// Panics if a field with the same name was already declared.
    #[must_use]
    pub fn field<F: Persist>(self, name: &'static str, get: fn(&T) -> &F, set: fn(&mut T, F)) -> Self {
        self.push(name, F::type_info, Box::new(RefField { get, set }))
    }

    /// Adds a field whose stored value is computed from the owner, such as an
    /// encoded buffer.
    ///
    /// # Panics
    ///
    /// Panics if a field with the same name was already declared.
    #[must_use]
    pub fn computed<F: Persist>(self, name: &'static str, get: fn(&T) -> F, set: fn(&mut T, F)) -> Self {
        self.push(name, F::type_info, Box::new(ComputedField { get, set }))
    }

    fn push(mut self, name: &'static str, info: TypeInfoFn, access: Box<dyn FieldAccess>) -> Self {
        assert!(
            self.fields.iter().all(|f| f.name != name),
            "field `{name}` declared twice on {}",
            self.name
        );
        self.fields.push(FieldSchema { name, info, access });
        self
    }

    /// Finishes the schema.
    #[must_use]
    pub fn build(self) -> TypeInfo {
        let schema = StructSchema {
            name: self.name,
            type_id: TypeId::of::<T>(),
            fields: self.fields,
            construct: construct_default::<T>,
        };
        TypeInfo::new::<T>(TypeShape::Struct(Arc::new(schema))).with_name(self.name)
    }
}

/// A fieldless enum persisted as its variant name.
///
/// ```rust,ignore
/// #[derive(Clone, Copy, PartialEq)]
/// enum Mode { Survival, Creative }
///
/// impl PersistEnum for Mode {
///     const VARIANTS: &'static [(&'static str, Self)] =
///         &[("survival", Mode::Survival), ("creative", Mode::Creative)];
/// }
///
/// impl Persist for Mode {
///     fn type_info() -> TypeInfo { TypeInfo::enumeration::<Self>() }
/// }
/// ```
pub trait PersistEnum: Copy + PartialEq + 'static {
    /// Every variant with its stored name.
    const VARIANTS: &'static [(&'static str, Self)];
}

pub(crate) struct EnumTable<T>(PhantomData<fn() -> T>);

impl<T> EnumTable<T> {
    pub(crate) const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: PersistEnum> EnumOps for EnumTable<T> {
    fn variant_name(&self, value: &dyn Any) -> Option<&'static str> {
        let value = cast::<T>(value);
        T::VARIANTS
            .iter()
            .find(|(_, v)| v == value)
            .map(|(name, _)| *name)
    }

    fn from_name(&self, name: &str) -> Option<Box<dyn Any>> {
        T::VARIANTS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| Box::new(*v) as Box<dyn Any>)
    }
}
