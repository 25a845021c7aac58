//! # schemagen
//!
//! Generate application scaffolding from relational schemas
//!
//! This crate provides a CLI tool and library that load a schema description,
//! infer the relationships between its tables (including many-to-many
//! associations through junction tables), and drive per-table artifact
//! generation for one of several target backends.

pub mod backend;
pub mod codegen;
pub mod config;
pub mod error;
pub mod introspect;
pub mod migration;
pub mod naming;
pub mod relations;
pub mod schema;
pub mod store;

pub mod prelude {
    pub use crate::backend::Backend;
    pub use crate::codegen::{
        ArtifactEmitter, ArtifactKind, CodeGenConfig, EntityContext, GenerationResult, Generator,
        TemplateEmitter,
    };
    pub use crate::config::GenConfig;
    pub use crate::error::SchemagenError;
    pub use crate::introspect::{Introspector, JsonIntrospector, TableFilter};
    pub use crate::migration::VersionAllocator;
    pub use crate::naming::{EntityNames, PathResolver};
    pub use crate::relations::{EntityRelations, RelationKind, Relationship, RelationshipGraph};
    pub use crate::schema::{
        Column, ForeignKey, Function, FunctionParam, Index, ReturnShape, ScalarKind, Schema, Table,
        TableKind,
    };
    pub use crate::store::{ArtifactStore, FsStore, MemoryStore};
}

#[cfg(feature = "postgres")]
pub use introspect::PostgresIntrospector;
