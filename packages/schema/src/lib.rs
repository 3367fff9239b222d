//! # Schema Engine
//!
//! Loads per-entity-kind schema definitions and derives property
//! descriptors for document values.
//!
//! Schemas are structural classification only: required/read-only flags and
//! reference kinds come from the schema file, never from the current state
//! of a value. One schema node may describe many document nodes (all
//! elements of an array share the element schema).

pub mod descriptor;
pub mod node;
pub mod registry;

pub use descriptor::{PropertyDescriptor, ReferenceKind};
pub use node::{SchemaKind, SchemaMember, SchemaNode, MAX_SCHEMA_DEPTH};
pub use registry::{SchemaError, SchemaRegistry};
