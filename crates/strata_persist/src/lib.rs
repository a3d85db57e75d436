//! # STRATA Persist
//!
//! Storage-agnostic value model and the registry that converts native Rust
//! values to and from it.
//!
//! ## Design Principles
//!
//! 1. **One shape on disk**: stores only ever read or write [`PersistedData`]
//! 2. **Explicit schemas**: a struct declares its fields once through
//!    [`StructSchema::builder`]; no per-type handler code is needed
//! 3. **Resilient**: unsupported or malformed values are skipped or defaulted,
//!    a save never aborts because of one field
//! 4. **Cycle safe**: self-referential types resolve through forward cells
//!
//! ## Core Components
//!
//! - [`PersistedData`]: null, bool, integer, float, string, bytes, array, map
//! - [`codec`]: framed binary encoding of a `PersistedData` tree
//! - [`Persist`] / [`TypeInfo`]: compile-time type descriptors
//! - [`TypeHandlerRegistry`]: factory chain resolving a [`TypeHandler`] per type
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_persist::{Persist, StructSchema, TypeHandlerRegistry, TypeInfo};
//!
//! #[derive(Default)]
//! struct Marker { label: String, weight: f32 }
//!
//! impl Persist for Marker {
//!     fn type_info() -> TypeInfo {
//!         StructSchema::builder::<Self>("Marker")
//!             .field("label", |m| &m.label, |m, v| m.label = v)
//!             .field("weight", |m| &m.weight, |m, v| m.weight = v)
//!             .build()
//!     }
//! }
//!
//! let registry = TypeHandlerRegistry::new();
//! let data = registry.serialize(&Marker::default()).unwrap();
//! let back: Marker = registry.deserialize(&data).unwrap();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod codec;
pub mod data;
pub mod error;
pub mod factories;
pub mod handler;
pub mod registry;
pub mod schema;
pub mod type_info;

pub use codec::{decode, encode, Compression};
pub use data::PersistedData;
pub use error::{PersistError, PersistResult};
pub use handler::{ErasedHandler, FutureHandler, TypeHandler, ValueHandler};
pub use registry::{Resolver, TypeHandlerFactory, TypeHandlerRegistry};
pub use schema::{FieldAccess, FieldSchema, PersistEnum, StructSchema, StructSchemaBuilder};
pub use type_info::{
    CollectionKind, EnumOps, MapOps, OptionalOps, Persist, ScalarKind, SequenceOps, TypeInfo,
    TypeInfoFn, TypeShape,
};
