//! # Built-in Factories
//!
//! The default resolution chain, tried in this order:
//!
//! 1. [`ScalarFactory`]: primitives, strings, byte buffers
//! 2. [`EnumFactory`]: variant-name enums
//! 3. [`ArrayFactory`]: fixed-length arrays
//! 4. [`CollectionFactory`]: `Vec`, `VecDeque`, `BTreeSet`, `HashSet`
//! 5. [`StringMapFactory`]: `HashMap<String, _>`, `BTreeMap<String, _>`
//! 6. [`OptionalFactory`]: `Option<_>`, `Box<_>`
//! 7. [`StructFactory`]: declared struct schemas, always last

use std::any::Any;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::data::PersistedData;
use crate::handler::ErasedHandler;
use crate::registry::{Resolver, TypeHandlerFactory};
use crate::schema::StructSchema;
use crate::type_info::{
    cast, EnumOps, MapOps, OptionalOps, ScalarKind, SequenceOps, TypeInfo, TypeShape,
};

/// The built-in chain in resolution order.
pub(crate) fn builtin_chain() -> Vec<Arc<dyn TypeHandlerFactory>> {
    vec![
        Arc::new(ScalarFactory),
        Arc::new(EnumFactory),
        Arc::new(ArrayFactory),
        Arc::new(CollectionFactory),
        Arc::new(StringMapFactory),
        Arc::new(OptionalFactory),
        Arc::new(StructFactory),
    ]
}

// =============================================================================
// Scalars
// =============================================================================

/// Accepts [`TypeShape::Scalar`].
#[derive(Debug, Default)]
pub struct ScalarFactory;

impl TypeHandlerFactory for ScalarFactory {
    fn create(&self, info: &TypeInfo, _resolver: &mut Resolver<'_>) -> Option<Arc<dyn ErasedHandler>> {
        match info.shape() {
            TypeShape::Scalar(kind) => Some(Arc::new(ScalarHandler { kind: *kind })),
            _ => None,
        }
    }
}

struct ScalarHandler {
    kind: ScalarKind,
}

fn boxed<T: 'static>(value: T) -> Box<dyn Any> {
    Box::new(value)
}

fn int<T: TryFrom<i64> + 'static>(data: &PersistedData) -> Option<Box<dyn Any>> {
    data.as_i64().and_then(|i| T::try_from(i).ok()).map(boxed)
}

impl ErasedHandler for ScalarHandler {
    #[allow(clippy::cast_possible_wrap)]
    fn serialize(&self, value: &dyn Any) -> PersistedData {
        match self.kind {
            ScalarKind::Bool => PersistedData::Bool(*cast::<bool>(value)),
            ScalarKind::I8 => PersistedData::Integer(i64::from(*cast::<i8>(value))),
            ScalarKind::I16 => PersistedData::Integer(i64::from(*cast::<i16>(value))),
            ScalarKind::I32 => PersistedData::Integer(i64::from(*cast::<i32>(value))),
            ScalarKind::I64 => PersistedData::Integer(*cast::<i64>(value)),
            ScalarKind::U8 => PersistedData::Integer(i64::from(*cast::<u8>(value))),
            ScalarKind::U16 => PersistedData::Integer(i64::from(*cast::<u16>(value))),
            ScalarKind::U32 => PersistedData::Integer(i64::from(*cast::<u32>(value))),
            ScalarKind::U64 => PersistedData::Integer(*cast::<u64>(value) as i64),
            ScalarKind::F32 => PersistedData::Float(f64::from(*cast::<f32>(value))),
            ScalarKind::F64 => PersistedData::Float(*cast::<f64>(value)),
            ScalarKind::String => PersistedData::String(cast::<String>(value).clone()),
            ScalarKind::Bytes => PersistedData::Bytes(cast::<Box<[u8]>>(value).to_vec()),
            ScalarKind::Data => cast::<PersistedData>(value).clone(),
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn deserialize(&self, data: &PersistedData) -> Option<Box<dyn Any>> {
        match self.kind {
            ScalarKind::Bool => data.as_bool().map(boxed),
            ScalarKind::I8 => int::<i8>(data),
            ScalarKind::I16 => int::<i16>(data),
            ScalarKind::I32 => int::<i32>(data),
            ScalarKind::I64 => data.as_i64().map(boxed),
            ScalarKind::U8 => int::<u8>(data),
            ScalarKind::U16 => int::<u16>(data),
            ScalarKind::U32 => int::<u32>(data),
            ScalarKind::U64 => data.as_i64().map(|i| boxed(i as u64)),
            ScalarKind::F32 => data.as_f64().map(|f| boxed(f as f32)),
            ScalarKind::F64 => data.as_f64().map(boxed),
            ScalarKind::String => data.as_str().map(|s| boxed(s.to_owned())),
            ScalarKind::Bytes => data
                .as_bytes()
                .map(|b| boxed(b.to_vec().into_boxed_slice())),
            ScalarKind::Data => Some(boxed(data.clone())),
        }
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Accepts [`TypeShape::Enum`].
#[derive(Debug, Default)]
pub struct EnumFactory;

impl TypeHandlerFactory for EnumFactory {
    fn create(&self, info: &TypeInfo, _resolver: &mut Resolver<'_>) -> Option<Arc<dyn ErasedHandler>> {
        match info.shape() {
            TypeShape::Enum(ops) => Some(Arc::new(EnumHandler {
                name: info.name(),
                ops: Arc::clone(ops),
            })),
            _ => None,
        }
    }
}

struct EnumHandler {
    name: &'static str,
    ops: Arc<dyn EnumOps>,
}

impl ErasedHandler for EnumHandler {
    fn serialize(&self, value: &dyn Any) -> PersistedData {
        match self.ops.variant_name(value) {
            Some(variant) => PersistedData::String(variant.to_owned()),
            None => {
                warn!(type_name = self.name, "enum value missing from its variant table");
                PersistedData::Null
            }
        }
    }

    fn deserialize(&self, data: &PersistedData) -> Option<Box<dyn Any>> {
        let name = data.as_str()?;
        let value = self.ops.from_name(name);
        if value.is_none() {
            debug!(type_name = self.name, variant = name, "unknown enum variant");
        }
        value
    }
}

// =============================================================================
// Sequences
// =============================================================================

/// Accepts [`TypeShape::Array`].
#[derive(Debug, Default)]
pub struct ArrayFactory;

impl TypeHandlerFactory for ArrayFactory {
    fn create(&self, info: &TypeInfo, resolver: &mut Resolver<'_>) -> Option<Arc<dyn ErasedHandler>> {
        let TypeShape::Array { element, len, ops } = info.shape() else {
            return None;
        };
        let element = resolver.resolve(&element())?;
        Some(Arc::new(SequenceHandler {
            name: info.name(),
            element,
            ops: Arc::clone(ops),
            fixed_len: Some(*len),
        }))
    }
}

/// Accepts [`TypeShape::Collection`].
#[derive(Debug, Default)]
pub struct CollectionFactory;

impl TypeHandlerFactory for CollectionFactory {
    fn create(&self, info: &TypeInfo, resolver: &mut Resolver<'_>) -> Option<Arc<dyn ErasedHandler>> {
        let TypeShape::Collection { element, ops, .. } = info.shape() else {
            return None;
        };
        let element = resolver.resolve(&element())?;
        Some(Arc::new(SequenceHandler {
            name: info.name(),
            element,
            ops: Arc::clone(ops),
            fixed_len: None,
        }))
    }
}

struct SequenceHandler {
    name: &'static str,
    element: Arc<dyn ErasedHandler>,
    ops: Arc<dyn SequenceOps>,
    /// Arrays reject the whole value when any element is bad.
    fixed_len: Option<usize>,
}

impl ErasedHandler for SequenceHandler {
    fn serialize(&self, value: &dyn Any) -> PersistedData {
        let mut items = Vec::new();
        self.ops
            .for_each(value, &mut |item| items.push(self.element.serialize(item)));
        PersistedData::Array(items)
    }

    fn deserialize(&self, data: &PersistedData) -> Option<Box<dyn Any>> {
        let raw = data.as_array()?;
        if let Some(len) = self.fixed_len {
            if raw.len() != len {
                debug!(type_name = self.name, expected = len, found = raw.len(), "array length mismatch");
                return None;
            }
            let items = raw
                .iter()
                .map(|item| self.element.deserialize(item))
                .collect::<Option<Vec<_>>>()?;
            return self.ops.build(items);
        }

        let mut items = Vec::with_capacity(raw.len());
        for (index, item) in raw.iter().enumerate() {
            match self.element.deserialize(item) {
                Some(value) => items.push(value),
                None => warn!(type_name = self.name, index, "skipping malformed element"),
            }
        }
        self.ops.build(items)
    }
}

// =============================================================================
// Maps
// =============================================================================

/// Accepts [`TypeShape::StringMap`].
#[derive(Debug, Default)]
pub struct StringMapFactory;

impl TypeHandlerFactory for StringMapFactory {
    fn create(&self, info: &TypeInfo, resolver: &mut Resolver<'_>) -> Option<Arc<dyn ErasedHandler>> {
        let TypeShape::StringMap { value, ops } = info.shape() else {
            return None;
        };
        let value = resolver.resolve(&value())?;
        Some(Arc::new(StringMapHandler {
            name: info.name(),
            value,
            ops: Arc::clone(ops),
        }))
    }
}

struct StringMapHandler {
    name: &'static str,
    value: Arc<dyn ErasedHandler>,
    ops: Arc<dyn MapOps>,
}

impl ErasedHandler for StringMapHandler {
    fn serialize(&self, value: &dyn Any) -> PersistedData {
        let mut out = PersistedData::map();
        self.ops
            .for_each(value, &mut |key, item| out.insert(key, self.value.serialize(item)));
        out
    }

    fn deserialize(&self, data: &PersistedData) -> Option<Box<dyn Any>> {
        let raw = data.as_map()?;
        let mut entries = Vec::with_capacity(raw.len());
        for (key, item) in raw {
            match self.value.deserialize(item) {
                Some(value) => entries.push((key.clone(), value)),
                None => warn!(type_name = self.name, key = key.as_str(), "skipping malformed entry"),
            }
        }
        Some(self.ops.build(entries))
    }
}

// =============================================================================
// Indirections
// =============================================================================

/// Accepts [`TypeShape::Optional`].
#[derive(Debug, Default)]
pub struct OptionalFactory;

impl TypeHandlerFactory for OptionalFactory {
    fn create(&self, info: &TypeInfo, resolver: &mut Resolver<'_>) -> Option<Arc<dyn ErasedHandler>> {
        let TypeShape::Optional { inner, ops } = info.shape() else {
            return None;
        };
        let inner = resolver.resolve(&inner())?;
        Some(Arc::new(OptionalHandler {
            inner,
            ops: Arc::clone(ops),
        }))
    }
}

struct OptionalHandler {
    inner: Arc<dyn ErasedHandler>,
    ops: Arc<dyn OptionalOps>,
}

impl ErasedHandler for OptionalHandler {
    fn serialize(&self, value: &dyn Any) -> PersistedData {
        self.ops
            .get(value)
            .map_or(PersistedData::Null, |inner| self.inner.serialize(inner))
    }

    fn deserialize(&self, data: &PersistedData) -> Option<Box<dyn Any>> {
        if data.is_null() {
            return self.ops.wrap(None);
        }
        let inner = self.inner.deserialize(data)?;
        self.ops.wrap(Some(inner))
    }
}

// =============================================================================
// Mapped containers
// =============================================================================

/// Accepts [`TypeShape::Struct`]: the structural catch-all.
///
/// Never fails for a declared struct. Fields whose type cannot be handled
/// are left out of the persisted map and keep their default on load.
#[derive(Debug, Default)]
pub struct StructFactory;

impl TypeHandlerFactory for StructFactory {
    fn create(&self, info: &TypeInfo, resolver: &mut Resolver<'_>) -> Option<Arc<dyn ErasedHandler>> {
        let TypeShape::Struct(schema) = info.shape() else {
            return None;
        };
        let fields = schema
            .fields()
            .iter()
            .map(|field| {
                let handler = resolver.resolve(&field.info());
                if handler.is_none() {
                    debug!(
                        schema = schema.name(),
                        field = field.name(),
                        "field type unsupported, it will not be persisted"
                    );
                }
                handler
            })
            .collect();
        Some(Arc::new(StructHandler {
            schema: Arc::clone(schema),
            fields,
        }))
    }
}

struct StructHandler {
    schema: Arc<StructSchema>,
    /// Parallel to `schema.fields()`.
    fields: Vec<Option<Arc<dyn ErasedHandler>>>,
}

impl ErasedHandler for StructHandler {
    fn serialize(&self, value: &dyn Any) -> PersistedData {
        assert!(
            value.type_id() == self.schema.owner_type_id(),
            "type handler for {} invoked with a value of another type",
            self.schema.name()
        );
        let mut out = PersistedData::map();
        for (field, handler) in self.schema.fields().iter().zip(&self.fields) {
            let Some(handler) = handler else { continue };
            field
                .access()
                .with_value(value, &mut |v| out.insert(field.name(), handler.serialize(v)));
        }
        out
    }

    fn deserialize(&self, data: &PersistedData) -> Option<Box<dyn Any>> {
        let raw = data.as_map()?;
        let mut value = self.schema.construct();
        for (field, handler) in self.schema.fields().iter().zip(&self.fields) {
            let (Some(handler), Some(item)) = (handler, raw.get(field.name())) else {
                continue;
            };
            match handler.deserialize(item) {
                Some(v) => field.access().assign(&mut *value, v),
                None => warn!(
                    schema = self.schema.name(),
                    field = field.name(),
                    found = item.kind(),
                    "malformed field, keeping default"
                ),
            }
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeHandlerRegistry;
    use crate::type_info::Persist;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Joint {
        name: String,
        weight: Option<u32>,
    }

    impl Persist for Joint {
        fn type_info() -> TypeInfo {
            StructSchema::builder::<Self>("Joint")
                .field("name", |j| &j.name, |j, v| j.name = v)
                .field("weight", |j| &j.weight, |j, v| j.weight = v)
                .build()
        }
    }

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Rig {
        label: String,
        joints: Vec<Joint>,
    }

    impl Persist for Rig {
        fn type_info() -> TypeInfo {
            StructSchema::builder::<Self>("Rig")
                .field("label", |r| &r.label, |r, v| r.label = v)
                .field("joints", |r| &r.joints, |r, v| r.joints = v)
                .build()
        }
    }

    #[test]
    fn test_struct_roundtrip_through_handler() {
        let registry = TypeHandlerRegistry::new();
        let rig = Rig {
            label: "arm".into(),
            joints: vec![
                Joint {
                    name: "shoulder".into(),
                    weight: Some(3),
                },
                Joint {
                    name: "elbow".into(),
                    weight: None,
                },
            ],
        };

        let data = registry.serialize(&rig).unwrap();
        assert_eq!(data.get("label").and_then(PersistedData::as_str), Some("arm"));
        assert_eq!(data.get("joints").and_then(PersistedData::as_array).map(<[_]>::len), Some(2));

        let back: Rig = registry.deserialize(&data).unwrap();
        assert_eq!(back, rig);
    }

    #[test]
    fn test_struct_handler_accepts_only_its_type() {
        let registry = TypeHandlerRegistry::new();
        let handler = registry.get_handler(&Joint::type_info()).unwrap();
        let joint = Joint::default();
        assert!(handler.serialize(&joint).as_map().is_some());
    }

    #[test]
    #[should_panic(expected = "invoked with a value of another type")]
    fn test_struct_handler_rejects_other_type() {
        let registry = TypeHandlerRegistry::new();
        let handler = registry.get_handler(&Joint::type_info()).unwrap();
        let _ = handler.serialize(&Rig::default());
    }
}
