//! Default template emitter
//!
//! Renders small skeletons for every artifact kind with minijinja. Real
//! per-backend template sets plug in through [`ArtifactEmitter`] instead.

use minijinja::{context, Environment, Value};
use tracing::trace;

use crate::codegen::{ArtifactEmitter, ArtifactKind, EntityContext};
use crate::error::SchemagenError;
use crate::naming::{entity_name, pluralize, to_snake_case};
use crate::relations::{RelationKind, Relationship};
use crate::schema::{Schema, Table};

/// Minimal minijinja-backed emitter shared by all backends
pub struct TemplateEmitter {
    env: Environment<'static>,
}

impl TemplateEmitter {
    pub fn new() -> Result<Self, SchemagenError> {
        let mut env = Environment::new();

        for (name, source) in [
            ("source", include_str!("templates/source.jinja")),
            ("migration", include_str!("templates/migration.sql.jinja")),
            ("test", include_str!("templates/test.jinja")),
        ] {
            env.add_template(name, source)
                .map_err(|e| SchemagenError::Template(format!("failed to load '{}': {}", name, e)))?;
        }

        Ok(Self { env })
    }

    fn render(&self, name: &str, ctx: Value) -> Result<String, SchemagenError> {
        let template = self
            .env
            .get_template(name)
            .map_err(|e| SchemagenError::Template(e.to_string()))?;
        template
            .render(ctx)
            .map_err(|e| SchemagenError::Template(format!("render error: {}", e)))
    }

    fn source_context(&self, kind: ArtifactKind, ctx: &EntityContext<'_>) -> Value {
        let backend = ctx.backend;
        let names = ctx.names;

        let fields = match kind {
            ArtifactKind::Entity | ArtifactKind::Dto => {
                let mut fields: Vec<String> = ctx
                    .table
                    .columns()
                    .iter()
                    .map(|col| {
                        backend.field_declaration(
                            &backend.member_name(&col.name),
                            &backend.scalar_type(&col.kind),
                            col.nullable,
                        )
                    })
                    .collect();
                if kind == ArtifactKind::Entity {
                    fields.extend(relation_fields(ctx));
                }
                fields
            }
            _ => Vec::new(),
        };

        let relations = match kind {
            ArtifactKind::Entity | ArtifactKind::Mapper => describe_relations(ctx),
            _ => Vec::new(),
        };

        let methods: Vec<String> = match kind {
            ArtifactKind::Repository => ctx
                .functions
                .iter()
                .filter_map(|f| backend.function_signature(ctx.schema, f).ok())
                .collect(),
            _ => Vec::new(),
        };

        let route = match kind {
            ArtifactKind::EndpointInterface | ArtifactKind::EndpointImpl => {
                Some(resource_route(&names.plural))
            }
            _ => None,
        };

        context! {
            header => kind.to_string(),
            table => &ctx.table.name,
            namespace => backend.namespace_declaration(&names.module, backend.subpackage(kind)),
            declaration => backend.type_declaration(kind.is_interface()),
            type_name => format!("{}{}", names.entity, kind.suffix()),
            route => route,
            fields => fields,
            relations => relations,
            methods => methods,
        }
    }

    fn test_context(&self, kind: ArtifactKind, ctx: &EntityContext<'_>) -> Value {
        let backend = ctx.backend;
        let names = ctx.names;
        let subject = kind.subject().unwrap_or(ArtifactKind::Entity);
        let route = resource_route(&names.plural);

        let cases: Vec<String> = match kind {
            ArtifactKind::DtoTest => ctx
                .table
                .columns()
                .iter()
                .map(|col| format!("maps {}", backend.member_name(&col.name)))
                .collect(),
            ArtifactKind::ServiceTest => ["create", "find by id", "find all", "update", "delete"]
                .iter()
                .map(|op| format!("{} {}", op, names.variable))
                .collect(),
            ArtifactKind::EndpointTest => vec![
                format!("GET {}", route),
                format!("GET {}/{{id}}", route),
                format!("POST {}", route),
                format!("PUT {}/{{id}}", route),
                format!("DELETE {}/{{id}}", route),
            ],
            _ => vec![format!("create, read, update and delete through {}", route)],
        };

        context! {
            header => kind.to_string(),
            subject => format!("{}{}", names.entity, subject.suffix()),
            namespace => backend.namespace_declaration(&names.module, backend.subpackage(kind)),
            declaration => backend.type_declaration(false),
            type_name => format!("{}{}", names.entity, kind.suffix()),
            cases => cases,
        }
    }

    fn migration_context(&self, ctx: &EntityContext<'_>) -> Result<Value, SchemagenError> {
        let version = ctx.migration_version.ok_or_else(|| SchemagenError::CodeGen {
            table: ctx.table.name.clone(),
            message: "migration rendered without a version".to_string(),
        })?;

        let mut tables = vec![table_ddl(ctx.schema, ctx.table)];
        tables.extend(
            owned_junctions(ctx.schema, ctx.table)
                .into_iter()
                .map(|junction| table_ddl(ctx.schema, junction)),
        );

        Ok(context! {
            version => version,
            table => &ctx.table.name,
            tables => tables,
        })
    }
}

impl ArtifactEmitter for TemplateEmitter {
    fn emit(&self, kind: ArtifactKind, ctx: &EntityContext<'_>) -> Result<String, SchemagenError> {
        trace!(table = ?ctx.table.name, kind = %kind, "Rendering artifact");
        match kind {
            ArtifactKind::Migration => {
                let value = self.migration_context(ctx)?;
                self.render("migration", value)
            }
            k if k.is_test() => self.render("test", self.test_context(k, ctx)),
            k => self.render("source", self.source_context(k, ctx)),
        }
    }
}

fn resource_route(plural: &str) -> String {
    format!("/api/{}", to_snake_case(plural).replace('_', "-"))
}

/// Strip a trailing `_id` from a key column, e.g. `manager_id` -> `manager`
fn key_stem(column: &str) -> &str {
    column
        .strip_suffix("_id")
        .filter(|stem| !stem.is_empty())
        .unwrap_or(column)
}

fn relation_fields(ctx: &EntityContext<'_>) -> Vec<String> {
    let backend = ctx.backend;
    let relations = ctx
        .relations
        .outgoing
        .iter()
        .chain(&ctx.relations.incoming)
        .chain(&ctx.relations.many_to_many);

    relations
        .map(|rel| {
            let target = entity_name(&rel.target);
            match &rel.kind {
                RelationKind::ManyToOne { column, .. } => backend.field_declaration(
                    &backend.member_name(key_stem(column)),
                    &target,
                    true,
                ),
                RelationKind::OneToMany { column, .. } if rel.is_self_referential() => {
                    backend.field_declaration(
                        &backend.member_name(&pluralize(&format!("{}_report", key_stem(column)))),
                        &backend.list_type(&target),
                        false,
                    )
                }
                RelationKind::OneToMany { .. } => backend.field_declaration(
                    &backend.member_name(&pluralize(&target)),
                    &backend.list_type(&target),
                    false,
                ),
                RelationKind::ManyToMany { other_key, .. } => backend.field_declaration(
                    &backend.member_name(&pluralize(key_stem(other_key))),
                    &backend.list_type(&target),
                    false,
                ),
            }
        })
        .collect()
}

fn describe_relations(ctx: &EntityContext<'_>) -> Vec<String> {
    ctx.relations
        .outgoing
        .iter()
        .chain(&ctx.relations.incoming)
        .chain(&ctx.relations.many_to_many)
        .map(describe)
        .collect()
}

fn describe(rel: &Relationship) -> String {
    match &rel.kind {
        RelationKind::ManyToOne {
            column,
            referenced_column,
        } => format!(
            "many-to-one {} via {}.{} -> {}.{}",
            rel.target, rel.source, column, rel.target, referenced_column
        ),
        RelationKind::OneToMany {
            column,
            referenced_column,
        } => format!(
            "one-to-many {} via {}.{} -> {}.{}",
            rel.target, rel.target, column, rel.source, referenced_column
        ),
        RelationKind::ManyToMany {
            junction,
            this_key,
            other_key,
        } => format!(
            "many-to-many {} through {} ({} <-> {})",
            rel.target, junction, this_key, other_key
        ),
    }
}

/// Junction tables whose DDL belongs to this table's migration: those whose
/// later-declared endpoint is this table, so both referenced tables exist
fn owned_junctions<'a>(schema: &'a Schema, table: &Table) -> Vec<&'a Table> {
    let position = |name: &str| schema.tables().iter().position(|t| t.name == name);
    let Some(own) = position(&table.name) else {
        return Vec::new();
    };

    schema
        .junction_tables()
        .into_iter()
        .filter(|junction| {
            let targets: Option<Vec<usize>> = junction
                .foreign_keys()
                .iter()
                .map(|fk| position(&fk.referenced_table))
                .collect();
            targets
                .and_then(|t| t.into_iter().max())
                .is_some_and(|last| last == own)
        })
        .collect()
}

fn table_ddl(schema: &Schema, table: &Table) -> Value {
    let mut lines: Vec<String> = table
        .columns()
        .iter()
        .map(|col| {
            let mut line = format!("{} {}", col.name, col.sql_type);
            if !col.nullable {
                line.push_str(" NOT NULL");
            }
            if col.unique {
                line.push_str(" UNIQUE");
            }
            if let Some(default) = &col.default {
                line.push_str(&format!(" DEFAULT {}", default));
            }
            line
        })
        .collect();

    let pk: Vec<&str> = table
        .primary_key_columns()
        .iter()
        .map(|col| col.name.as_str())
        .collect();
    if !pk.is_empty() {
        lines.push(format!("PRIMARY KEY ({})", pk.join(", ")));
    } else if table.is_junction() {
        let keys: Vec<&str> = table.foreign_keys().iter().map(|fk| fk.column.as_str()).collect();
        lines.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    for fk in table.foreign_keys() {
        lines.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            fk.column,
            fk.referenced_table,
            schema.referenced_column(fk)
        ));
    }

    let indexes: Vec<String> = table
        .indexes
        .iter()
        .map(|index| {
            format!(
                "CREATE {}INDEX {} ON {} ({});",
                if index.unique { "UNIQUE " } else { "" },
                index.name,
                table.name,
                index.columns.join(", ")
            )
        })
        .collect();

    context! {
        name => &table.name,
        lines => lines,
        indexes => indexes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::naming::EntityNames;
    use crate::relations::RelationshipGraph;
    use crate::schema::{Column, ForeignKey, Index};

    fn shop() -> Schema {
        Schema::new(
            "public",
            vec![
                Table::new(
                    "products",
                    vec![
                        Column::new("id", "bigint").primary_key(),
                        Column::new("name", "varchar(120)").not_null().unique(),
                    ],
                    vec![],
                )
                .with_indexes(vec![Index {
                    name: "idx_products_name".to_string(),
                    columns: vec!["name".to_string()],
                    unique: false,
                }]),
                Table::new(
                    "categories",
                    vec![Column::new("id", "bigint").primary_key(), Column::new("name", "text")],
                    vec![],
                ),
                Table::new(
                    "product_categories",
                    vec![Column::new("product_id", "bigint"), Column::new("category_id", "bigint")],
                    vec![
                        ForeignKey::new("product_id", "products"),
                        ForeignKey::new("category_id", "categories"),
                    ],
                ),
            ],
            vec![],
        )
    }

    fn render(schema: &Schema, table: &str, kind: ArtifactKind, backend: Backend) -> String {
        let table = schema.table_by_name(table).unwrap();
        let graph = RelationshipGraph::build(schema);
        let relations = graph.for_table(&table.name);
        let names = EntityNames::resolve(table, backend, "shop");
        let ctx = EntityContext {
            schema,
            table,
            names: &names,
            backend,
            relations: &relations,
            functions: &[],
            migration_version: Some(4),
        };
        TemplateEmitter::new().unwrap().emit(kind, &ctx).unwrap()
    }

    #[test]
    fn test_entity_skeleton() {
        let schema = shop();
        let code = render(&schema, "products", ArtifactKind::Entity, Backend::Java);

        assert!(code.contains("package shop.entity;"));
        assert!(code.contains("public class Product {"));
        assert!(code.contains("private Long id;"));
        assert!(code.contains("private List<Category> categories;"));
        assert!(code.contains("many-to-many categories through product_categories"));
    }

    #[test]
    fn test_endpoint_route() {
        let schema = shop();
        let code = render(&schema, "categories", ArtifactKind::EndpointInterface, Backend::TypeScript);

        assert!(code.contains("export interface CategoryApi {"));
        assert!(code.contains("route: /api/categories"));
    }

    #[test]
    fn test_migration_includes_owned_junction() {
        let schema = shop();

        let products = render(&schema, "products", ArtifactKind::Migration, Backend::Java);
        assert!(products.starts_with("-- V4: create table products"));
        assert!(products.contains("name varchar(120) NOT NULL UNIQUE"));
        assert!(products.contains("CREATE INDEX idx_products_name ON products (name);"));
        assert!(!products.contains("CREATE TABLE product_categories"));

        let categories = render(&schema, "categories", ArtifactKind::Migration, Backend::Java);
        assert!(categories.contains("CREATE TABLE product_categories"));
        assert!(categories.contains("PRIMARY KEY (product_id, category_id)"));
        assert!(categories.contains("FOREIGN KEY (category_id) REFERENCES categories (id)"));
    }

    #[test]
    fn test_test_skeleton() {
        let schema = shop();
        let code = render(&schema, "products", ArtifactKind::EndpointTest, Backend::CSharp);

        assert!(code.contains("namespace Shop.Tests.Controllers;"));
        assert!(code.contains("public class ProductControllerTest {"));
        assert!(code.contains("case: GET /api/products/{id}"));
    }
}
