//! Type-graph compiler.
//!
//! Declarative type schemas (simple, complex, enum, union and mapped types)
//! are imported from thunks, resolved into a graph of [`DataType`]s that may
//! refer to themselves and to each other, and registered in a [`Document`].
//! A resolved type can then be turned into a [`Codec`] that decodes and
//! encodes JSON values.
//!
//! ```no_run
//! use api_typegraph::{ComplexSchema, DocumentFactory, DocumentInit, FieldSchema};
//!
//! let node = ComplexSchema::named("Node")
//!     .field("value", FieldSchema::of("number").required())
//!     .field("next", FieldSchema::of("Node"));
//! let document = DocumentFactory::new()
//!     .create_document(DocumentInit::new().with_type(node))
//!     .unwrap();
//! let node = document.get_type("Node").unwrap();
//! ```
pub mod builtins;
pub mod codec;
pub mod config;
pub mod data_type;
pub mod description;
pub mod design_type;
pub mod document;
pub mod error;
mod export;
pub mod factory;
pub mod fetch;
pub mod path_de;
pub mod schema;
pub mod thunk;

pub use codec::{Codec, CodecError, CodecOptions, Direction, Issue, Partiality};
pub use config::FactoryConfig;
pub use data_type::{AdditionalFields, DataType, Field, TypeBody};
pub use description::DocumentDescription;
pub use design_type::{DesignType, DesignTypeMap, HasDesignType};
pub use document::{Document, DocumentId, DocumentInfo, TypeHandle};
pub use error::{DocumentError, ErrorKind};
pub use factory::{DocumentFactory, DocumentInit, DocumentReference, TypeDefinitions};
pub use fetch::{DefaultFetcher, DocumentFetcher};
pub use schema::{
    AdditionalFieldsSchema, ComplexSchema, EnumSchema, EnumValue, FieldSchema, Kind, MappedSchema,
    PartialRule, SimpleSchema, TypeRef, TypeSchema, UnionSchema,
};
pub use thunk::{CodecHooks, SourceId, Thunk, TypeSource};
