//! # Type Handler Registry
//!
//! Resolves a [`TypeHandler`] for any [`Persist`] type.
//!
//! ## Resolution
//!
//! 1. Cached handler, if the type was resolved before
//! 2. Handler registered for exactly this type
//! 3. User factories, most recently added first
//! 4. Built-in chain (see [`crate::factories`])
//!
//! A registry is an ordinary value owned by a world session; there is no
//! process-wide state.
//!
//! ## Self-reference
//!
//! While a type is under construction it sits in the resolver's pending
//! table. A nested request for the same type gets a [`FutureHandler`] that is
//! filled in once the outer construction returns. Handlers built during one
//! top-level request enter the cache together, after every forward cell they
//! may point to has been filled.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::data::PersistedData;
use crate::error::{PersistError, PersistResult};
use crate::factories::builtin_chain;
use crate::handler::{ErasedHandler, FutureHandler, TypeHandler, ValueAdapter, ValueHandler};
use crate::type_info::{Persist, TypeInfo};

/// Builds handlers for the types it accepts.
pub trait TypeHandlerFactory: Send + Sync {
    /// Returns a handler for `info`, or `None` to let the next factory try.
    /// Nested types must be resolved through `resolver`.
    fn create(&self, info: &TypeInfo, resolver: &mut Resolver<'_>) -> Option<Arc<dyn ErasedHandler>>;
}

/// Registry of type handlers.
pub struct TypeHandlerRegistry {
    /// Handlers registered for one exact type.
    specific: HashMap<TypeId, Arc<dyn ErasedHandler>>,
    /// User factories in registration order.
    factories: Vec<Arc<dyn TypeHandlerFactory>>,
    builtin: Vec<Arc<dyn TypeHandlerFactory>>,
    cache: RwLock<HashMap<TypeId, Arc<dyn ErasedHandler>>>,
    /// Types no factory accepts. Each is logged once.
    unsupported: Mutex<HashSet<TypeId>>,
}

impl TypeHandlerRegistry {
    /// Creates a registry with the built-in factory chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            specific: HashMap::new(),
            factories: Vec::new(),
            builtin: builtin_chain(),
            cache: RwLock::new(HashMap::new()),
            unsupported: Mutex::new(HashSet::new()),
        }
    }

    /// Uses `handler` for `T`, ahead of every factory. Replaces an earlier
    /// registration for the same type.
    pub fn register_handler<T: 'static>(&mut self, handler: impl ValueHandler<T> + 'static) {
        self.specific
            .insert(TypeId::of::<T>(), Arc::new(ValueAdapter::<T, _>::new(handler)));
        self.invalidate();
    }

    /// Adds a factory ahead of the built-in chain and of factories added
    /// before it.
    pub fn add_factory(&mut self, factory: impl TypeHandlerFactory + 'static) {
        self.factories.push(Arc::new(factory));
        self.invalidate();
    }

    /// A registry with the same registrations and an empty cache.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self {
            specific: self.specific.clone(),
            factories: self.factories.clone(),
            builtin: self.builtin.clone(),
            cache: RwLock::new(HashMap::new()),
            unsupported: Mutex::new(HashSet::new()),
        }
    }

    fn invalidate(&mut self) {
        self.cache.get_mut().clear();
        self.unsupported.get_mut().clear();
    }

    /// Resolves the erased handler described by `info`. `None` means no
    /// factory accepts the type; this is logged once per type.
    #[must_use]
    pub fn get_handler(&self, info: &TypeInfo) -> Option<Arc<dyn ErasedHandler>> {
        if let Some(handler) = self.cache.read().get(&info.type_id()) {
            return Some(Arc::clone(handler));
        }
        let mut resolver = Resolver::new(self);
        let handler = resolver.resolve(info);
        resolver.commit();
        handler
    }

    /// Resolves the typed handler for `T`.
    #[must_use]
    pub fn handler<T: Persist>(&self) -> Option<TypeHandler<T>> {
        self.get_handler(&T::type_info()).map(TypeHandler::from_erased)
    }

    /// Serializes `value` with the handler for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Unsupported`] if `T` has no handler.
    pub fn serialize<T: Persist>(&self, value: &T) -> PersistResult<PersistedData> {
        let info = T::type_info();
        self.get_handler(&info)
            .map(|h| h.serialize(value))
            .ok_or(PersistError::Unsupported(info.name()))
    }

    /// Deserializes a `T`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Unsupported`] if `T` has no handler, or
    /// [`PersistError::Rejected`] if `data` does not have the expected shape.
    pub fn deserialize<T: Persist>(&self, data: &PersistedData) -> PersistResult<T> {
        let info = T::type_info();
        let handler = self
            .get_handler(&info)
            .ok_or(PersistError::Unsupported(info.name()))?;
        handler
            .deserialize(data)
            .map(crate::type_info::unbox::<T>)
            .ok_or(PersistError::Rejected(info.name()))
    }

    /// Number of cached handlers.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }
}

impl Default for TypeHandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeHandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeHandlerRegistry")
            .field("specific", &self.specific.len())
            .field("factories", &self.factories.len())
            .field("cached", &self.cached_len())
            .finish()
    }
}

/// State of one top-level resolution, passed to factories for nested types.
pub struct Resolver<'r> {
    registry: &'r TypeHandlerRegistry,
    /// Types under construction and their forward cells.
    pending: HashMap<TypeId, Arc<FutureHandler>>,
    /// Handlers finished during this resolution, in completion order.
    created: Vec<(TypeId, Arc<dyn ErasedHandler>)>,
}

impl<'r> Resolver<'r> {
    fn new(registry: &'r TypeHandlerRegistry) -> Self {
        Self {
            registry,
            pending: HashMap::new(),
            created: Vec::new(),
        }
    }

    /// Resolves a nested type.
    pub fn resolve(&mut self, info: &TypeInfo) -> Option<Arc<dyn ErasedHandler>> {
        let type_id = info.type_id();

        if let Some(handler) = self.registry.cache.read().get(&type_id) {
            return Some(Arc::clone(handler));
        }
        if let Some((_, handler)) = self.created.iter().find(|(id, _)| *id == type_id) {
            return Some(Arc::clone(handler));
        }
        if let Some(future) = self.pending.get(&type_id) {
            debug!(type_name = info.name(), "self-reference, handing out forward handler");
            return Some(Arc::clone(future) as Arc<dyn ErasedHandler>);
        }
        if let Some(handler) = self.registry.specific.get(&type_id) {
            return Some(Arc::clone(handler));
        }
        if self.registry.unsupported.lock().contains(&type_id) {
            return None;
        }

        let future = Arc::new(FutureHandler::new(info.name()));
        self.pending.insert(type_id, Arc::clone(&future));
        let mark = self.created.len();

        let registry = self.registry;
        let built = registry
            .factories
            .iter()
            .rev()
            .chain(registry.builtin.iter())
            .find_map(|factory| factory.create(info, self));

        self.pending.remove(&type_id);
        if let Some(handler) = built {
            future.resolve(Arc::clone(&handler));
            self.created.push((type_id, Arc::clone(&handler)));
            Some(handler)
        } else {
            // Anything built since `mark` may hold the dead forward cell.
            self.created.truncate(mark);
            if registry.unsupported.lock().insert(type_id) {
                warn!(
                    type_name = info.name(),
                    shape = info.shape().label(),
                    "no type handler; values of this type are not persisted"
                );
            }
            None
        }
    }

    fn commit(self) {
        if self.created.is_empty() {
            return;
        }
        let mut cache = self.registry.cache.write();
        for (type_id, handler) in self.created {
            cache.entry(type_id).or_insert(handler);
        }
    }
}
