//! # Type Descriptors
//!
//! Compile-time description of how a Rust type is shaped, so the registry can
//! pick a handler without runtime reflection.
//!
//! Every persistable type implements [`Persist`]. Standard scalars, sequences,
//! string-keyed maps, `Option` and `Box` are covered here; structs declare a
//! schema with [`StructSchema::builder`](crate::StructSchema::builder) and enums
//! go through [`TypeInfo::enumeration`].
//!
//! Element and field descriptors are stored as `fn() -> TypeInfo` so that a
//! type may mention itself (a tree node holding `Vec<Self>`) without building
//! an infinite descriptor.

use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::data::PersistedData;
use crate::schema::{EnumTable, PersistEnum, StructSchema};

/// A type whose values can be persisted.
pub trait Persist: 'static {
    /// Returns the descriptor the registry resolves a handler from.
    fn type_info() -> TypeInfo;
}

/// Lazily evaluated descriptor of a nested type.
pub type TypeInfoFn = fn() -> TypeInfo;

/// Describes one persistable type.
#[derive(Clone)]
pub struct TypeInfo {
    type_id: TypeId,
    name: &'static str,
    shape: TypeShape,
}

impl TypeInfo {
    pub(crate) fn new<T: 'static>(shape: TypeShape) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            shape,
        }
    }

    pub(crate) fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Descriptor for an enum persisted by variant name.
    #[must_use]
    pub fn enumeration<T: PersistEnum>() -> Self {
        Self::new::<T>(TypeShape::Enum(Arc::new(EnumTable::<T>::new())))
    }

    /// Descriptor for a type that exists in the data model but has no
    /// persisted form. The registry reports it as unsupported.
    #[must_use]
    pub fn opaque<T: 'static>() -> Self {
        Self::new::<T>(TypeShape::Opaque)
    }

    /// Identity of the described type.
    #[inline]
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Readable name, used in log output.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Structural shape.
    #[inline]
    #[must_use]
    pub const fn shape(&self) -> &TypeShape {
        &self.shape
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("shape", &self.shape.label())
            .finish()
    }
}

/// Structural classification of a type. Each built-in factory accepts one
/// shape.
#[derive(Clone)]
pub enum TypeShape {
    /// Primitive stored directly as a [`PersistedData`] leaf.
    Scalar(ScalarKind),
    /// Fieldless enum stored as its variant name.
    Enum(Arc<dyn EnumOps>),
    /// Fixed-length array; every element must deserialize.
    Array {
        /// Element descriptor.
        element: TypeInfoFn,
        /// Required element count.
        len: usize,
        /// Erased access to the array.
        ops: Arc<dyn SequenceOps>,
    },
    /// Growable homogeneous collection; bad elements are skipped.
    Collection {
        /// Kind of collection, for diagnostics.
        kind: CollectionKind,
        /// Element descriptor.
        element: TypeInfoFn,
        /// Erased access to the collection.
        ops: Arc<dyn SequenceOps>,
    },
    /// Map keyed by strings.
    StringMap {
        /// Value descriptor.
        value: TypeInfoFn,
        /// Erased access to the map.
        ops: Arc<dyn MapOps>,
    },
    /// Indirection that may be empty (`Option`) or never is (`Box`).
    Optional {
        /// Wrapped descriptor.
        inner: TypeInfoFn,
        /// Erased access to the wrapper.
        ops: Arc<dyn OptionalOps>,
    },
    /// Struct with a declared field schema.
    Struct(Arc<StructSchema>),
    /// Declared but not persistable.
    Opaque,
}

impl TypeShape {
    /// Short label of the shape.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Enum(_) => "enum",
            Self::Array { .. } => "array",
            Self::Collection { .. } => "collection",
            Self::StringMap { .. } => "string-map",
            Self::Optional { .. } => "optional",
            Self::Struct(_) => "struct",
            Self::Opaque => "opaque",
        }
    }
}

/// Primitive kinds. Each maps to exactly one Rust type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// `bool`
    Bool,
    /// `i8`
    I8,
    /// `i16`
    I16,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `u8`
    U8,
    /// `u16`
    U16,
    /// `u32`
    U32,
    /// `u64`, stored bit-cast into an `i64`
    U64,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// `String`
    String,
    /// `Box<[u8]>`, stored as a byte leaf
    Bytes,
    /// [`PersistedData`] passed through untouched
    Data,
}

/// Kinds of growable collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionKind {
    /// `Vec`
    List,
    /// `VecDeque`
    Queue,
    /// `BTreeSet`
    OrderedSet,
    /// `HashSet`
    HashSet,
}

/// Erased iteration and construction of a sequence.
pub trait SequenceOps: Send + Sync {
    /// Visits each element of `value` in order.
    fn for_each(&self, value: &dyn Any, f: &mut dyn FnMut(&dyn Any));

    /// Builds the sequence from deserialized elements. `None` if the element
    /// count does not fit.
    fn build(&self, items: Vec<Box<dyn Any>>) -> Option<Box<dyn Any>>;
}

/// Erased iteration and construction of a string-keyed map.
pub trait MapOps: Send + Sync {
    /// Visits each entry of `value`.
    fn for_each(&self, value: &dyn Any, f: &mut dyn FnMut(&str, &dyn Any));

    /// Builds the map from deserialized entries.
    fn build(&self, entries: Vec<(String, Box<dyn Any>)>) -> Box<dyn Any>;
}

/// Erased access to an indirection.
pub trait OptionalOps: Send + Sync {
    /// Returns the wrapped value, if any.
    fn get<'a>(&self, value: &'a dyn Any) -> Option<&'a dyn Any>;

    /// Wraps a deserialized value. `None` in means the empty wrapper; a
    /// wrapper that cannot be empty returns `None`.
    fn wrap(&self, inner: Option<Box<dyn Any>>) -> Option<Box<dyn Any>>;
}

/// Erased access to an enum's variant table.
pub trait EnumOps: Send + Sync {
    /// Name of the variant held by `value`.
    fn variant_name(&self, value: &dyn Any) -> Option<&'static str>;

    /// Variant with the given name.
    fn from_name(&self, name: &str) -> Option<Box<dyn Any>>;
}

/// Borrows `value` as `T`.
///
/// # Panics
///
/// Panics when `value` is not a `T`. Handlers only ever see values of the
/// type they were resolved for, so a mismatch is a bug in the caller.
pub(crate) fn cast<T: 'static>(value: &dyn Any) -> &T {
    match value.downcast_ref::<T>() {
        Some(v) => v,
        None => panic!(
            "type handler for {} invoked with a value of another type",
            type_name::<T>()
        ),
    }
}

/// Takes ownership of a deserialized `T`.
///
/// # Panics
///
/// Panics when `value` is not a `T`.
pub(crate) fn unbox<T: 'static>(value: Box<dyn Any>) -> T {
    match value.downcast::<T>() {
        Ok(v) => *v,
        Err(_) => panic!(
            "type handler produced a value that is not a {}",
            type_name::<T>()
        ),
    }
}

// =============================================================================
// Scalars
// =============================================================================

macro_rules! scalar {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Persist for $ty {
                fn type_info() -> TypeInfo {
                    TypeInfo::new::<$ty>(TypeShape::Scalar(ScalarKind::$kind))
                }
            }
        )*
    };
}

scalar! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    Box<[u8]> => Bytes,
    PersistedData => Data,
}

// =============================================================================
// Sequences
// =============================================================================

struct CollectionOps<C, T>(PhantomData<fn() -> (C, T)>);

impl<C, T> SequenceOps for CollectionOps<C, T>
where
    C: FromIterator<T> + 'static,
    T: 'static,
    for<'a> &'a C: IntoIterator<Item = &'a T>,
{
    fn for_each(&self, value: &dyn Any, f: &mut dyn FnMut(&dyn Any)) {
        for item in cast::<C>(value) {
            f(item);
        }
    }

    fn build(&self, items: Vec<Box<dyn Any>>) -> Option<Box<dyn Any>> {
        let collection: C = items.into_iter().map(unbox::<T>).collect();
        Some(Box::new(collection))
    }
}

fn collection<C, T>(kind: CollectionKind) -> TypeInfo
where
    C: FromIterator<T> + 'static,
    T: Persist,
    for<'a> &'a C: IntoIterator<Item = &'a T>,
{
    TypeInfo::new::<C>(TypeShape::Collection {
        kind,
        element: T::type_info,
        ops: Arc::new(CollectionOps::<C, T>(PhantomData)),
    })
}

impl<T: Persist> Persist for Vec<T> {
    fn type_info() -> TypeInfo {
        collection::<Self, T>(CollectionKind::List)
    }
}

impl<T: Persist> Persist for VecDeque<T> {
    fn type_info() -> TypeInfo {
        collection::<Self, T>(CollectionKind::Queue)
    }
}

impl<T: Persist + Ord> Persist for BTreeSet<T> {
    fn type_info() -> TypeInfo {
        collection::<Self, T>(CollectionKind::OrderedSet)
    }
}

impl<T: Persist + Eq + Hash> Persist for HashSet<T> {
    fn type_info() -> TypeInfo {
        collection::<Self, T>(CollectionKind::HashSet)
    }
}

struct ArrayOps<T, const N: usize>(PhantomData<fn() -> T>);

impl<T: 'static, const N: usize> SequenceOps for ArrayOps<T, N> {
    fn for_each(&self, value: &dyn Any, f: &mut dyn FnMut(&dyn Any)) {
        for item in cast::<[T; N]>(value) {
            f(item);
        }
    }

    fn build(&self, items: Vec<Box<dyn Any>>) -> Option<Box<dyn Any>> {
        let items: Vec<T> = items.into_iter().map(unbox::<T>).collect();
        let array: [T; N] = items.try_into().ok()?;
        Some(Box::new(array))
    }
}

impl<T: Persist, const N: usize> Persist for [T; N] {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<Self>(TypeShape::Array {
            element: T::type_info,
            len: N,
            ops: Arc::new(ArrayOps::<T, N>(PhantomData)),
        })
    }
}

// =============================================================================
// String-keyed maps
// =============================================================================

struct StringMapOps<M, V>(PhantomData<fn() -> (M, V)>);

impl<M, V> MapOps for StringMapOps<M, V>
where
    M: FromIterator<(String, V)> + 'static,
    V: 'static,
    for<'a> &'a M: IntoIterator<Item = (&'a String, &'a V)>,
{
    fn for_each(&self, value: &dyn Any, f: &mut dyn FnMut(&str, &dyn Any)) {
        for (key, item) in cast::<M>(value) {
            f(key, item);
        }
    }

    fn build(&self, entries: Vec<(String, Box<dyn Any>)>) -> Box<dyn Any> {
        let map: M = entries
            .into_iter()
            .map(|(key, item)| (key, unbox::<V>(item)))
            .collect();
        Box::new(map)
    }
}

impl<V: Persist> Persist for HashMap<String, V> {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<Self>(TypeShape::StringMap {
            value: V::type_info,
            ops: Arc::new(StringMapOps::<Self, V>(PhantomData)),
        })
    }
}

impl<V: Persist> Persist for BTreeMap<String, V> {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<Self>(TypeShape::StringMap {
            value: V::type_info,
            ops: Arc::new(StringMapOps::<Self, V>(PhantomData)),
        })
    }
}

// =============================================================================
// Indirections
// =============================================================================

struct OptionOps<T>(PhantomData<fn() -> T>);

impl<T: 'static> OptionalOps for OptionOps<T> {
    fn get<'a>(&self, value: &'a dyn Any) -> Option<&'a dyn Any> {
        cast::<Option<T>>(value).as_ref().map(|v| v as &dyn Any)
    }

    fn wrap(&self, inner: Option<Box<dyn Any>>) -> Option<Box<dyn Any>> {
        Some(Box::new(inner.map(unbox::<T>)))
    }
}

impl<T: Persist> Persist for Option<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<Self>(TypeShape::Optional {
            inner: T::type_info,
            ops: Arc::new(OptionOps::<T>(PhantomData)),
        })
    }
}

struct BoxOps<T>(PhantomData<fn() -> T>);

impl<T: 'static> OptionalOps for BoxOps<T> {
    fn get<'a>(&self, value: &'a dyn Any) -> Option<&'a dyn Any> {
        Some(&**cast::<Box<T>>(value) as &dyn Any)
    }

    fn wrap(&self, inner: Option<Box<dyn Any>>) -> Option<Box<dyn Any>> {
        inner.map(|v| Box::new(Box::new(unbox::<T>(v))) as Box<dyn Any>)
    }
}

impl<T: Persist> Persist for Box<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<Self>(TypeShape::Optional {
            inner: T::type_info,
            ops: Arc::new(BoxOps::<T>(PhantomData)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes_of_std_types() {
        assert_eq!(u16::type_info().shape().label(), "scalar");
        assert_eq!(Vec::<u8>::type_info().shape().label(), "collection");
        assert_eq!(<[i32; 4]>::type_info().shape().label(), "array");
        assert_eq!(HashMap::<String, f32>::type_info().shape().label(), "string-map");
        assert_eq!(Option::<String>::type_info().shape().label(), "optional");
        assert_eq!(Box::<bool>::type_info().shape().label(), "optional");
    }

    #[test]
    fn test_type_ids_distinguish_generic_instances() {
        assert_ne!(
            Vec::<u8>::type_info().type_id(),
            Vec::<u16>::type_info().type_id()
        );
    }

    #[test]
    fn test_collection_ops_visit_in_order() {
        let TypeShape::Collection { ops, .. } = Vec::<i32>::type_info().shape().clone() else {
            panic!("not a collection");
        };
        let v = vec![3, 1, 2];
        let mut seen = Vec::new();
        ops.for_each(&v, &mut |item| seen.push(*item.downcast_ref::<i32>().unwrap()));
        assert_eq!(seen, v);
    }

    #[test]
    #[should_panic(expected = "invoked with a value of another type")]
    fn test_cast_mismatch_panics() {
        let _ = cast::<u32>(&"not a number");
    }
}
