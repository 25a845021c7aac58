use postgres::Client;
use tracing::{debug, error, info, trace};

use super::{infer_owner, Introspector, TableFilter};
use crate::prelude::SchemagenError;
use crate::schema::{Column, ForeignKey, Function, FunctionParam, Index, ReturnShape, Schema, Table};

/// PostgreSQL introspector
pub struct PostgresIntrospector<'a> {
    client: &'a mut Client,
    schema_name: String,
}

impl<'a> PostgresIntrospector<'a> {
    pub fn new(client: &'a mut Client, schema_name: impl Into<String>) -> Self {
        Self {
            client,
            schema_name: schema_name.into(),
        }
    }

    fn query_error(&self, what: &str, e: postgres::Error) -> SchemagenError {
        error!(schema = ?self.schema_name, error = ?e, "Failed to query {}", what);
        SchemagenError::Introspection {
            schema: self.schema_name.clone(),
            message: format!("Failed to query {}: {}", what, e),
        }
    }
}

impl Introspector for PostgresIntrospector<'_> {
    fn introspect(&mut self, filter: &TableFilter) -> Result<Schema, SchemagenError> {
        info!(schema = ?self.schema_name, "Starting schema introspection");

        let all_table_names = self.query_tables()?;
        debug!(count = ?all_table_names.len(), "Found all tables");

        let mut tables = Vec::with_capacity(all_table_names.len());
        for table_name in all_table_names {
            debug!(table = ?table_name, "Introspecting table");

            let columns = self.query_columns(&table_name)?;
            trace!(table = ?table_name, columns = ?columns.len(), "Found columns");

            let foreign_keys = self.query_foreign_keys(&table_name)?;
            trace!(table = ?table_name, foreign_keys = ?foreign_keys.len(), "Found foreign keys");

            let indexes = self.query_indexes(&table_name)?;
            trace!(table = ?table_name, indexes = ?indexes.len(), "Found indexes");

            tables.push(Table::new(table_name, columns, foreign_keys).with_indexes(indexes));
        }

        let mut functions = self.query_functions()?;
        debug!(count = ?functions.len(), "Found functions");
        for function in &mut functions {
            function.table = infer_owner(function, tables.iter().map(|t| t.name.as_str()));
        }

        let (tables, functions) = filter.apply(tables, functions);
        debug!(count = ?tables.len(), "Tables after filtering");

        let schema = Schema::new(self.schema_name.clone(), tables, functions);
        info!(
            schema = ?self.schema_name,
            tables = ?schema.tables().len(),
            junctions = ?schema.junction_tables().len(),
            functions = ?schema.functions().len(),
            "Schema introspection complete"
        );

        Ok(schema)
    }
}

impl PostgresIntrospector<'_> {
    /// Query all table names in the schema
    fn query_tables(&mut self) -> Result<Vec<String>, SchemagenError> {
        let sql = r#"
            SELECT c.relname::text AS table_name
            FROM pg_class c
            JOIN pg_namespace n ON n.oid = c.relnamespace
            WHERE c.relkind = 'r'
                AND n.nspname = $1
            ORDER BY c.oid
        "#;

        let rows = self
            .client
            .query(sql, &[&self.schema_name])
            .map_err(|e| self.query_error("tables", e))?;

        Ok(rows.iter().map(|row| row.get("table_name")).collect())
    }

    /// Query columns with primary key and single-column unique flags
    fn query_columns(&mut self, table_name: &str) -> Result<Vec<Column>, SchemagenError> {
        let sql = r#"
            SELECT
                a.attname::text AS column_name,
                format_type(a.atttypid, a.atttypmod) AS data_type,
                NOT a.attnotnull AS is_nullable,
                pg_get_expr(d.adbin, d.adrelid) AS default_value,
                a.attidentity <> '' AS is_identity,
                EXISTS (
                    SELECT 1 FROM pg_constraint con
                    WHERE con.conrelid = c.oid AND con.contype = 'p'
                        AND a.attnum = ANY(con.conkey)
                ) AS is_primary,
                EXISTS (
                    SELECT 1 FROM pg_constraint con
                    WHERE con.conrelid = c.oid AND con.contype = 'u'
                        AND con.conkey = ARRAY[a.attnum]
                ) AS is_unique
            FROM pg_attribute a
            JOIN pg_class c ON c.oid = a.attrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            LEFT JOIN pg_attrdef d ON d.adrelid = c.oid AND d.adnum = a.attnum
            WHERE c.relname = $1
                AND n.nspname = $2
                AND a.attnum > 0
                AND NOT a.attisdropped
            ORDER BY a.attnum
        "#;

        let rows = self
            .client
            .query(sql, &[&table_name, &self.schema_name])
            .map_err(|e| self.query_error(&format!("columns of '{}'", table_name), e))?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.get("column_name");
            let data_type: String = row.get("data_type");
            let default_value: Option<String> = row.get("default_value");

            let mut column = Column::new(name, data_type);
            column.nullable = row.get("is_nullable");
            column.unique = row.get("is_unique");
            if let Some(default) = default_value {
                column = column.with_default(default);
            }
            if row.get::<_, bool>("is_identity") {
                column.auto_generated = true;
            }
            if row.get::<_, bool>("is_primary") {
                column = column.primary_key();
            }

            trace!(
                column = ?column.name,
                sql_type = ?column.sql_type,
                kind = ?column.kind,
                nullable = ?column.nullable,
                primary_key = ?column.primary_key,
                "Parsed column"
            );
            columns.push(column);
        }

        Ok(columns)
    }

    /// Query single-column foreign keys declared on a table
    fn query_foreign_keys(&mut self, table_name: &str) -> Result<Vec<ForeignKey>, SchemagenError> {
        let sql = r#"
            SELECT
                a.attname::text AS column_name,
                rc.relname::text AS referenced_table,
                ra.attname::text AS referenced_column
            FROM pg_constraint con
            JOIN pg_class c ON c.oid = con.conrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            JOIN pg_class rc ON rc.oid = con.confrelid
            JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = con.conkey[1]
            JOIN pg_attribute ra ON ra.attrelid = con.confrelid AND ra.attnum = con.confkey[1]
            WHERE con.contype = 'f'
                AND array_length(con.conkey, 1) = 1
                AND c.relname = $1
                AND n.nspname = $2
            ORDER BY con.conname
        "#;

        let rows = self
            .client
            .query(sql, &[&table_name, &self.schema_name])
            .map_err(|e| self.query_error(&format!("foreign keys of '{}'", table_name), e))?;

        Ok(rows
            .iter()
            .map(|row| ForeignKey {
                column: row.get("column_name"),
                referenced_table: row.get("referenced_table"),
                referenced_column: Some(row.get("referenced_column")),
            })
            .collect())
    }

    /// Query non-primary indexes on a table
    fn query_indexes(&mut self, table_name: &str) -> Result<Vec<Index>, SchemagenError> {
        let sql = r#"
            SELECT
                i.relname::text AS index_name,
                ix.indisunique AS is_unique,
                array_agg(a.attname::text ORDER BY array_position(ix.indkey::int2[], a.attnum)) AS columns
            FROM pg_index ix
            JOIN pg_class t ON t.oid = ix.indrelid
            JOIN pg_class i ON i.oid = ix.indexrelid
            JOIN pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
            WHERE t.relname = $1
                AND n.nspname = $2
                AND NOT ix.indisprimary
            GROUP BY i.relname, ix.indisunique
            ORDER BY i.relname
        "#;

        let rows = self
            .client
            .query(sql, &[&table_name, &self.schema_name])
            .map_err(|e| self.query_error(&format!("indexes of '{}'", table_name), e))?;

        Ok(rows
            .iter()
            .map(|row| Index {
                name: row.get("index_name"),
                columns: row.get("columns"),
                unique: row.get("is_unique"),
            })
            .collect())
    }

    /// Query plain functions defined in the schema
    fn query_functions(&mut self) -> Result<Vec<Function>, SchemagenError> {
        let sql = r#"
            SELECT
                p.proname::text AS function_name,
                pg_get_function_result(p.oid) AS result_type,
                COALESCE(p.proargnames::text[], ARRAY[]::text[]) AS arg_names,
                ARRAY(
                    SELECT format_type(t.type_oid, NULL)
                    FROM unnest(p.proargtypes::oid[]) WITH ORDINALITY AS t(type_oid, ord)
                    ORDER BY t.ord
                ) AS arg_types
            FROM pg_proc p
            JOIN pg_namespace n ON n.oid = p.pronamespace
            WHERE n.nspname = $1
                AND p.prokind = 'f'
            ORDER BY p.proname
        "#;

        let rows = self
            .client
            .query(sql, &[&self.schema_name])
            .map_err(|e| self.query_error("functions", e))?;

        let mut functions = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.get("function_name");
            let result_type: Option<String> = row.get("result_type");
            let arg_names: Vec<String> = row.get("arg_names");
            let arg_types: Vec<String> = row.get("arg_types");

            let parameters = arg_types
                .into_iter()
                .enumerate()
                .map(|(i, sql_type)| {
                    let param_name = arg_names
                        .get(i)
                        .filter(|n| !n.is_empty())
                        .cloned()
                        .unwrap_or_else(|| format!("arg{}", i + 1));
                    FunctionParam::new(param_name, sql_type)
                })
                .collect();

            trace!(function = ?name, result = ?result_type, "Found function");
            functions.push(Function {
                name,
                table: None,
                parameters,
                returns: ReturnShape::parse(result_type.as_deref().unwrap_or("void")),
            });
        }

        Ok(functions)
    }
}
