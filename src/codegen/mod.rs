//! Code generation
//!
//! The [`Generator`] walks the entity tables of a schema in declaration
//! order, resolves each table's relationships and names, asks an
//! [`ArtifactEmitter`] for the source text of every artifact kind, and
//! persists the results through an [`ArtifactStore`]. Failures are isolated
//! per table and per stored function and collected into a
//! [`GenerationResult`].

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use tracing::{debug, error, info, trace, warn};

use crate::backend::Backend;
use crate::error::SchemagenError;
use crate::migration::VersionAllocator;
use crate::naming::{EntityNames, PathResolver};
use crate::relations::{EntityRelations, RelationshipGraph};
use crate::schema::{Function, Schema, Table};
use crate::store::ArtifactStore;

pub mod template;

pub use template::TemplateEmitter;

/// One kind of generated source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Entity,
    Dto,
    Mapper,
    Repository,
    ServiceInterface,
    ServiceImpl,
    EndpointInterface,
    EndpointImpl,
    Migration,
    ServiceTest,
    DtoTest,
    EndpointTest,
    IntegrationTest,
}

impl ArtifactKind {
    /// Order in which artifacts are produced for every table
    pub const GENERATION_ORDER: [ArtifactKind; 13] = [
        ArtifactKind::Entity,
        ArtifactKind::Dto,
        ArtifactKind::Mapper,
        ArtifactKind::Repository,
        ArtifactKind::ServiceInterface,
        ArtifactKind::ServiceImpl,
        ArtifactKind::EndpointInterface,
        ArtifactKind::EndpointImpl,
        ArtifactKind::Migration,
        ArtifactKind::ServiceTest,
        ArtifactKind::DtoTest,
        ArtifactKind::EndpointTest,
        ArtifactKind::IntegrationTest,
    ];

    /// Appended to the entity name to form the artifact's type/file name
    pub fn suffix(&self) -> &'static str {
        match self {
            ArtifactKind::Entity => "",
            ArtifactKind::Dto => "Dto",
            ArtifactKind::Mapper => "Mapper",
            ArtifactKind::Repository => "Repository",
            ArtifactKind::ServiceInterface => "Service",
            ArtifactKind::ServiceImpl => "ServiceImpl",
            ArtifactKind::EndpointInterface => "Api",
            ArtifactKind::EndpointImpl => "Controller",
            ArtifactKind::Migration => "",
            ArtifactKind::ServiceTest => "ServiceTest",
            ArtifactKind::DtoTest => "DtoTest",
            ArtifactKind::EndpointTest => "ControllerTest",
            ArtifactKind::IntegrationTest => "IntegrationTest",
        }
    }

    pub fn is_interface(&self) -> bool {
        matches!(
            self,
            ArtifactKind::Repository
                | ArtifactKind::ServiceInterface
                | ArtifactKind::EndpointInterface
        )
    }

    pub fn is_test(&self) -> bool {
        matches!(
            self,
            ArtifactKind::ServiceTest
                | ArtifactKind::DtoTest
                | ArtifactKind::EndpointTest
                | ArtifactKind::IntegrationTest
        )
    }

    /// The artifact a test artifact exercises
    pub fn subject(&self) -> Option<ArtifactKind> {
        match self {
            ArtifactKind::ServiceTest => Some(ArtifactKind::ServiceImpl),
            ArtifactKind::DtoTest => Some(ArtifactKind::Dto),
            ArtifactKind::EndpointTest => Some(ArtifactKind::EndpointImpl),
            ArtifactKind::IntegrationTest => Some(ArtifactKind::EndpointImpl),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactKind::Entity => "entity",
            ArtifactKind::Dto => "DTO",
            ArtifactKind::Mapper => "mapper",
            ArtifactKind::Repository => "repository",
            ArtifactKind::ServiceInterface => "service interface",
            ArtifactKind::ServiceImpl => "service implementation",
            ArtifactKind::EndpointInterface => "endpoint interface",
            ArtifactKind::EndpointImpl => "endpoint implementation",
            ArtifactKind::Migration => "migration",
            ArtifactKind::ServiceTest => "service test",
            ArtifactKind::DtoTest => "DTO test",
            ArtifactKind::EndpointTest => "endpoint test",
            ArtifactKind::IntegrationTest => "integration test",
        };
        f.write_str(name)
    }
}

/// Everything an emitter receives for one artifact of one table
#[derive(Debug, Clone, Copy)]
pub struct EntityContext<'a> {
    pub schema: &'a Schema,
    pub table: &'a Table,
    pub names: &'a EntityNames,
    pub backend: Backend,
    pub relations: &'a EntityRelations,
    /// Stored functions owned by the table, for the data-access artifact
    pub functions: &'a [&'a Function],
    /// Set only for [`ArtifactKind::Migration`]
    pub migration_version: Option<u64>,
}

/// Turns a resolved table into source text. Implementations are
/// backend-specific template sets; the generator treats them as opaque.
pub trait ArtifactEmitter {
    fn emit(&self, kind: ArtifactKind, ctx: &EntityContext<'_>) -> Result<String, SchemagenError>;
}

/// Configuration for code generation
#[derive(Debug, Clone)]
pub struct CodeGenConfig {
    /// Root directory every artifact path is relative to
    pub output_root: PathBuf,
    pub backend: Backend,
    /// Module for tables that declare no grouping
    pub default_module: String,
    /// Migration directory, relative to `output_root`
    pub migrations_dir: PathBuf,
}

impl CodeGenConfig {
    pub fn new(output_root: PathBuf) -> Self {
        Self {
            output_root,
            backend: Backend::default(),
            default_module: "app".to_string(),
            migrations_dir: PathBuf::from("db/migration"),
        }
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_default_module(mut self, module: impl Into<String>) -> Self {
        self.default_module = module.into();
        self
    }

    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    pub fn path_resolver(&self) -> PathResolver {
        PathResolver::new(&self.output_root, self.backend, &self.migrations_dir)
    }
}

/// Outcome of one generation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationResult {
    /// Every artifact written, in write order
    pub written: Vec<PathBuf>,
    /// Schema violations and isolated per-table / per-function failures
    pub errors: Vec<String>,
    /// One `<function> -> <signature>` line per stored function
    pub notes: Vec<String>,
}

impl GenerationResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Drives artifact generation for a whole schema
pub struct Generator<E, S> {
    emitter: E,
    store: S,
    config: CodeGenConfig,
}

impl<E, S> Generator<E, S>
where
    E: ArtifactEmitter,
    S: ArtifactStore,
{
    pub fn new(emitter: E, store: S, config: CodeGenConfig) -> Self {
        Self {
            emitter,
            store,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Generate every artifact for every entity table. Never fails: all
    /// expected failure modes end up in [`GenerationResult::errors`].
    pub fn generate(&mut self, schema: &Schema) -> GenerationResult {
        let paths = self.config.path_resolver();
        info!(
            schema = ?schema.name,
            backend = %self.config.backend,
            output = ?paths.root(),
            "Generating artifacts"
        );

        let mut result = GenerationResult::default();

        for violation in schema.validate() {
            warn!(violation = %violation, "Schema validation");
            result.errors.push(format!("Schema validation: {}", violation));
        }

        let graph = RelationshipGraph::build(schema);
        let allocator = VersionAllocator::new(paths.migrations_dir());
        // (module, entity) -> table that produced it
        let mut claimed: HashMap<(String, String), String> = HashMap::new();

        for table in schema.entity_tables() {
            debug!(table = ?table.name, "Generating table");
            let outcome = self.generate_table(
                schema,
                table,
                &graph,
                &paths,
                &allocator,
                &mut claimed,
                &mut result.written,
            );
            if let Err(e) = outcome {
                warn!(table = ?table.name, error = %e, "Table generation failed, continuing");
                result.errors.push(e.to_string());
            }
        }

        self.process_functions(schema, &mut result);

        info!(
            written = result.written.len(),
            errors = result.errors.len(),
            notes = result.notes.len(),
            "Generation complete"
        );
        result
    }

    /// Render all artifacts of one table in memory, then write them. A
    /// rendering or write failure leaves the store as it was before the
    /// table and consumes no version.
    #[allow(clippy::too_many_arguments)]
    fn generate_table(
        &mut self,
        schema: &Schema,
        table: &Table,
        graph: &RelationshipGraph<'_>,
        paths: &PathResolver,
        allocator: &VersionAllocator,
        claimed: &mut HashMap<(String, String), String>,
        written: &mut Vec<PathBuf>,
    ) -> Result<(), SchemagenError> {
        let codegen_error = |message: String| SchemagenError::CodeGen {
            table: table.name.clone(),
            message,
        };

        let names = EntityNames::resolve(table, self.config.backend, &self.config.default_module);
        let key = (names.module.clone(), names.entity.clone());
        if let Some(owner) = claimed.get(&key) {
            return Err(codegen_error(format!(
                "entity name '{}' in module '{}' is already generated for table '{}'",
                names.entity, names.module, owner
            )));
        }

        let relations = graph.for_table(&table.name);
        let functions = schema.functions_for_table(&table.name);
        let version = allocator
            .next_version(&self.store)
            .map_err(|e| codegen_error(format!("failed to allocate migration version: {}", e)))?;

        let base = EntityContext {
            schema,
            table,
            names: &names,
            backend: self.config.backend,
            relations: &relations,
            functions: &functions,
            migration_version: None,
        };

        let mut rendered = Vec::with_capacity(ArtifactKind::GENERATION_ORDER.len());
        for kind in ArtifactKind::GENERATION_ORDER {
            let (path, ctx) = match kind {
                ArtifactKind::Migration => (
                    paths.migration_path(version, &table.name),
                    EntityContext {
                        migration_version: Some(version),
                        ..base
                    },
                ),
                _ => (paths.artifact_path(kind, &names), base),
            };

            let source = self
                .emitter
                .emit(kind, &ctx)
                .map_err(|e| SchemagenError::Emit {
                    table: table.name.clone(),
                    kind,
                    message: e.to_string(),
                })?;
            rendered.push((path, source));
        }

        // Prior contents of every path this table touches, for rollback
        let mut touched: Vec<(PathBuf, Option<String>)> = Vec::with_capacity(rendered.len());
        for (path, source) in rendered {
            let previous = match self.store.read(&path) {
                Ok(previous) => previous,
                Err(e) => {
                    self.rollback(&table.name, touched);
                    return Err(codegen_error(format!("failed to read {}: {}", path.display(), e)));
                }
            };
            touched.push((path.clone(), previous));

            if let Err(e) = self.store.write(&path, &source) {
                self.rollback(&table.name, touched);
                return Err(codegen_error(format!("failed to write {}: {}", path.display(), e)));
            }
            debug!(table = ?table.name, path = ?path, "Wrote artifact");
        }

        claimed.insert(key, table.name.clone());
        written.extend(touched.into_iter().map(|(path, _)| path));

        Ok(())
    }

    /// Put every path a failed table touched back to its earlier state
    fn rollback(&mut self, table: &str, touched: Vec<(PathBuf, Option<String>)>) {
        for (path, previous) in touched.into_iter().rev() {
            let restored = match &previous {
                Some(contents) => self.store.write(&path, contents),
                None => self.store.remove(&path),
            };
            match restored {
                Ok(()) => trace!(table = ?table, path = ?path, "Rolled back artifact"),
                Err(e) => error!(table = ?table, path = ?path, error = ?e, "Failed to roll back artifact"),
            }
        }
        warn!(table = ?table, "Rolled back partially written table");
    }

    fn process_functions(&self, schema: &Schema, result: &mut GenerationResult) {
        for function in schema.functions() {
            match self.config.backend.function_signature(schema, function) {
                Ok(signature) => {
                    debug!(function = ?function.name, signature = %signature, "Synthesized function method");
                    result.notes.push(format!("{} -> {}", function.name, signature));
                }
                Err(e) => {
                    warn!(function = ?function.name, error = %e, "Function processing failed, continuing");
                    result.errors.push(e.to_string());
                }
            }
        }
    }
}
