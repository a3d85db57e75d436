//! # Type Handlers
//!
//! A handler converts between one Rust type and [`PersistedData`]. Handlers
//! are stateless and shared behind `Arc`; the registry builds them once per
//! type.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use crate::data::PersistedData;
use crate::type_info::{cast, unbox};

/// Type-erased handler as stored in the registry.
pub trait ErasedHandler: Send + Sync {
    /// Converts a value to its persisted form.
    ///
    /// # Panics
    ///
    /// Panics when `value` is not of the type this handler was built for.
    fn serialize(&self, value: &dyn Any) -> PersistedData;

    /// Rebuilds a value. `None` when the data does not have the expected
    /// shape.
    fn deserialize(&self, data: &PersistedData) -> Option<Box<dyn Any>>;
}

/// User-supplied conversion for one type, registered with
/// [`TypeHandlerRegistry::register_handler`](crate::TypeHandlerRegistry::register_handler).
pub trait ValueHandler<T>: Send + Sync {
    /// Converts a value to its persisted form.
    fn serialize(&self, value: &T) -> PersistedData;

    /// Rebuilds a value, `None` on malformed input.
    fn deserialize(&self, data: &PersistedData) -> Option<T>;
}

/// Adapts a [`ValueHandler`] to the erased interface.
pub(crate) struct ValueAdapter<T, H> {
    inner: H,
    _value: PhantomData<fn() -> T>,
}

impl<T, H> ValueAdapter<T, H> {
    pub(crate) const fn new(inner: H) -> Self {
        Self {
            inner,
            _value: PhantomData,
        }
    }
}

impl<T: 'static, H: ValueHandler<T>> ErasedHandler for ValueAdapter<T, H> {
    fn serialize(&self, value: &dyn Any) -> PersistedData {
        self.inner.serialize(cast::<T>(value))
    }

    fn deserialize(&self, data: &PersistedData) -> Option<Box<dyn Any>> {
        self.inner
            .deserialize(data)
            .map(|v| Box::new(v) as Box<dyn Any>)
    }
}

/// Typed view over an erased handler.
pub struct TypeHandler<T> {
    erased: Arc<dyn ErasedHandler>,
    _value: PhantomData<fn() -> T>,
}

impl<T> Clone for TypeHandler<T> {
    fn clone(&self) -> Self {
        Self {
            erased: Arc::clone(&self.erased),
            _value: PhantomData,
        }
    }
}

impl<T> fmt::Debug for TypeHandler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeHandler")
            .field("type", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

impl<T: 'static> TypeHandler<T> {
    /// Wraps an erased handler known to handle `T`.
    #[must_use]
    pub fn from_erased(erased: Arc<dyn ErasedHandler>) -> Self {
        Self {
            erased,
            _value: PhantomData,
        }
    }

    /// Converts a value to its persisted form.
    #[must_use]
    pub fn serialize(&self, value: &T) -> PersistedData {
        self.erased.serialize(value)
    }

    /// Rebuilds a value, `None` on malformed input.
    #[must_use]
    pub fn deserialize(&self, data: &PersistedData) -> Option<T> {
        self.erased.deserialize(data).map(unbox::<T>)
    }

    /// Deep copy through the persisted form.
    #[must_use]
    pub fn copy(&self, value: &T) -> Option<T> {
        self.deserialize(&self.serialize(value))
    }

    /// The underlying erased handler.
    #[must_use]
    pub fn erased(&self) -> &Arc<dyn ErasedHandler> {
        &self.erased
    }
}

/// Forward reference to a handler that is still being built.
///
/// Handed out when resolution of a type recurses into that same type. Once
/// the outer construction completes the cell is filled and every copy
/// delegates to the real handler.
pub struct FutureHandler {
    type_name: &'static str,
    target: OnceLock<Arc<dyn ErasedHandler>>,
}

impl FutureHandler {
    /// Creates an empty cell.
    #[must_use]
    pub const fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            target: OnceLock::new(),
        }
    }

    /// Fills the cell. Later calls are ignored.
    pub fn resolve(&self, handler: Arc<dyn ErasedHandler>) {
        let _ = self.target.set(handler);
    }

    /// Returns true once the cell has been filled.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.target.get().is_some()
    }

    fn target(&self) -> &Arc<dyn ErasedHandler> {
        match self.target.get() {
            Some(target) => target,
            None => panic!(
                "forward handler for {} used before its construction finished",
                self.type_name
            ),
        }
    }
}

impl ErasedHandler for FutureHandler {
    fn serialize(&self, value: &dyn Any) -> PersistedData {
        self.target().serialize(value)
    }

    fn deserialize(&self, data: &PersistedData) -> Option<Box<dyn Any>> {
        self.target().deserialize(data)
    }
}

impl fmt::Debug for FutureHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureHandler")
            .field("type", &self.type_name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubler;

    impl ValueHandler<i32> for Doubler {
        fn serialize(&self, value: &i32) -> PersistedData {
            PersistedData::Integer(i64::from(*value) * 2)
        }

        fn deserialize(&self, data: &PersistedData) -> Option<i32> {
            data.as_i64().and_then(|v| i32::try_from(v / 2).ok())
        }
    }

    #[test]
    fn test_future_delegates_once_resolved() {
        let future = FutureHandler::new("i32");
        assert!(!future.is_resolved());
        future.resolve(Arc::new(ValueAdapter::<i32, _>::new(Doubler)));
        assert!(future.is_resolved());
        assert_eq!(future.serialize(&21i32), PersistedData::Integer(42));
    }

    #[test]
    #[should_panic(expected = "used before its construction finished")]
    fn test_unresolved_future_panics() {
        let future = FutureHandler::new("i32");
        let _ = future.serialize(&1i32);
    }

    #[test]
    fn test_typed_copy() {
        let handler =
            TypeHandler::<i32>::from_erased(Arc::new(ValueAdapter::<i32, _>::new(Doubler)));
        assert_eq!(handler.copy(&-8), Some(-8));
    }
}
