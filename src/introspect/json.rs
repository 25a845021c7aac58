//! JSON schema descriptions
//!
//! Reads the normalized schema description an external SQL parser emits:
//!
//! ```json
//! {
//!   "name": "shop",
//!   "tables": [{
//!     "name": "orders",
//!     "module": "sales",
//!     "columns": [
//!       { "name": "id", "type": "bigserial", "primary_key": true },
//!       { "name": "customer_id", "type": "bigint", "nullable": false }
//!     ],
//!     "foreign_keys": [{ "column": "customer_id", "references": "customers" }],
//!     "indexes": [{ "name": "idx_orders_customer", "columns": ["customer_id"] }]
//!   }],
//!   "functions": [{
//!     "name": "order_total",
//!     "parameters": [{ "name": "order_id", "type": "bigint" }],
//!     "returns": "numeric"
//!   }]
//! }
//! ```

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::{debug, error, info, trace, warn};

use super::{infer_owner, Introspector, TableFilter};
use crate::prelude::{Schema, SchemagenError};
use crate::schema::{Column, ForeignKey, Function, FunctionParam, Index, ReturnShape, Table};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDef {
    #[serde(default = "default_schema_name")]
    name: String,
    tables: Vec<TableDef>,
    #[serde(default)]
    functions: Vec<FunctionDef>,
}

fn default_schema_name() -> String {
    "public".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableDef {
    name: String,
    #[serde(default)]
    module: Option<String>,
    columns: Vec<ColumnDef>,
    #[serde(default)]
    foreign_keys: Vec<ForeignKeyDef>,
    #[serde(default)]
    indexes: Vec<IndexDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ColumnDef {
    name: String,
    #[serde(rename = "type")]
    sql_type: String,
    /// Defaults to nullable unless part of the primary key
    #[serde(default)]
    nullable: Option<bool>,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    primary_key: bool,
    #[serde(default)]
    default: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ForeignKeyDef {
    column: String,
    references: String,
    #[serde(default)]
    references_column: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IndexDef {
    name: String,
    columns: Vec<String>,
    #[serde(default)]
    unique: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FunctionDef {
    name: String,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    parameters: Vec<ParamDef>,
    #[serde(default)]
    returns: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParamDef {
    name: String,
    #[serde(rename = "type")]
    sql_type: String,
}

impl From<ColumnDef> for Column {
    fn from(def: ColumnDef) -> Self {
        let mut column = Column::new(def.name, def.sql_type);
        if def.primary_key {
            column = column.primary_key();
        }
        if let Some(nullable) = def.nullable {
            column.nullable = nullable;
        }
        if def.unique {
            column = column.unique();
        }
        if let Some(default) = def.default {
            column = column.with_default(default);
        }
        column
    }
}

impl From<TableDef> for Table {
    fn from(def: TableDef) -> Self {
        let columns = def.columns.into_iter().map(Column::from).collect();
        let foreign_keys = def
            .foreign_keys
            .into_iter()
            .map(|fk| ForeignKey {
                column: fk.column,
                referenced_table: fk.references,
                referenced_column: fk.references_column,
            })
            .collect();
        let indexes = def
            .indexes
            .into_iter()
            .map(|ix| Index {
                name: ix.name,
                columns: ix.columns,
                unique: ix.unique,
            })
            .collect();

        let mut table = Table::new(def.name, columns, foreign_keys).with_indexes(indexes);
        table.module = def.module;
        table
    }
}

impl From<FunctionDef> for Function {
    fn from(def: FunctionDef) -> Self {
        Function {
            name: def.name,
            table: def.table,
            parameters: def
                .parameters
                .into_iter()
                .map(|p| FunctionParam::new(p.name, p.sql_type))
                .collect(),
            returns: def
                .returns
                .as_deref()
                .map(ReturnShape::parse)
                .unwrap_or(ReturnShape::Void),
        }
    }
}

/// Parse a schema description, applying the filter
pub fn parse_schema(text: &str, filter: &TableFilter) -> Result<Schema, SchemagenError> {
    let def: SchemaDef = serde_json::from_str(text).map_err(|e| {
        error!(error = ?e, "Invalid schema description");
        SchemagenError::SchemaLoad(e.to_string())
    })?;
    trace!(
        tables = def.tables.len(),
        functions = def.functions.len(),
        "Parsed schema description"
    );

    let tables: Vec<Table> = def.tables.into_iter().map(Table::from).collect();
    let mut functions: Vec<Function> = def.functions.into_iter().map(Function::from).collect();

    for function in functions.iter_mut().filter(|f| f.table.is_none()) {
        function.table = infer_owner(function, tables.iter().map(|t| t.name.as_str()));
        if let Some(owner) = &function.table {
            debug!(function = ?function.name, table = ?owner, "Inferred function owner");
        }
    }

    let (tables, functions) = filter.apply(tables, functions);
    Ok(Schema::new(def.name, tables, functions))
}

/// Reads a schema description file
#[derive(Debug, Clone)]
pub struct JsonIntrospector {
    path: PathBuf,
}

impl JsonIntrospector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Introspector for JsonIntrospector {
    fn introspect(&mut self, filter: &TableFilter) -> Result<Schema, SchemagenError> {
        info!(path = ?self.path, "Loading schema description");

        let text = fs::read_to_string(&self.path).map_err(|e| {
            error!(path = ?self.path, error = ?e, "Failed to read schema description");
            SchemagenError::SchemaLoad(format!("{}: {}", self.path.display(), e))
        })?;

        let schema = parse_schema(&text, filter)?;

        for violation in schema.validate() {
            warn!(violation = %violation, "Schema validation");
        }

        info!(
            schema = ?schema.name,
            tables = schema.tables().len(),
            junctions = schema.junction_tables().len(),
            functions = schema.functions().len(),
            "Schema description loaded"
        );
        Ok(schema)
    }
}
