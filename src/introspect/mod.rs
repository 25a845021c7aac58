//! Schema sources
//!
//! This module provides the producers of a [`Schema`]: a JSON schema
//! description reader and, behind the `postgres` feature, a live database
//! introspector.

use crate::naming::singularize;
use crate::prelude::{Schema, SchemagenError};
use crate::schema::{Function, ReturnShape, Table};

pub mod json;

pub use json::JsonIntrospector;

/// Filters to apply during introspection
#[derive(Debug, Default, Clone)]
pub struct TableFilter {
    /// Only include these tables (if Some)
    pub include: Option<Vec<String>>,
    /// Exclude these tables
    pub exclude: Option<Vec<String>>,
}

impl TableFilter {
    /// Check if a table should be included
    pub fn should_include(&self, table_name: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.iter().any(|t| t == table_name) {
                return false;
            }
        }

        if let Some(exclude) = &self.exclude {
            if exclude.iter().any(|t| t == table_name) {
                return false;
            }
        }

        true
    }

    pub fn is_active(&self) -> bool {
        self.include.is_some() || self.exclude.is_some()
    }

    /// Drop filtered tables, and the functions owned by them
    pub fn apply(&self, tables: Vec<Table>, functions: Vec<Function>) -> (Vec<Table>, Vec<Function>) {
        let tables: Vec<Table> = tables
            .into_iter()
            .filter(|t| self.should_include(&t.name))
            .collect();
        let functions = functions
            .into_iter()
            .filter(|f| match &f.table {
                Some(owner) => tables.iter().any(|t| t.name.eq_ignore_ascii_case(owner)),
                None => true,
            })
            .collect();
        (tables, functions)
    }
}

/// Trait for schema source implementations
pub trait Introspector {
    /// Produce a schema, applying the table filter
    fn introspect(&mut self, filter: &TableFilter) -> Result<Schema, SchemagenError>;
}

/// Guess the table a stored function belongs to: the table whose rows it
/// returns, or the table whose singular name prefixes its first parameter
/// (`order_id` -> `orders`)
pub fn infer_owner<'a>(function: &Function, table_names: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let names: Vec<&str> = table_names.into_iter().collect();

    if let ReturnShape::SetOf(returned) = &function.returns {
        if let Some(name) = names.iter().find(|n| n.eq_ignore_ascii_case(returned)) {
            return Some(name.to_string());
        }
    }

    let first = function.parameters.first()?;
    let stem = first.name.to_lowercase();
    let stem = stem.strip_suffix("_id")?;
    names
        .iter()
        .find(|n| singularize(&n.to_lowercase()) == stem)
        .map(|n| n.to_string())
}

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PostgresIntrospector;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, FunctionParam, ScalarKind};

    fn function(params: &[&str], returns: ReturnShape) -> Function {
        Function {
            name: "f".to_string(),
            table: None,
            parameters: params.iter().map(|p| FunctionParam::new(*p, "bigint")).collect(),
            returns,
        }
    }

    #[test]
    fn test_should_include() {
        let filter = TableFilter {
            include: Some(vec!["users".to_string(), "posts".to_string()]),
            exclude: Some(vec!["posts".to_string()]),
        };
        assert!(filter.should_include("users"));
        assert!(!filter.should_include("posts"));
        assert!(!filter.should_include("tags"));
        assert!(TableFilter::default().should_include("anything"));
    }

    #[test]
    fn test_apply_drops_owned_functions() {
        let filter = TableFilter {
            include: None,
            exclude: Some(vec!["audit_log".to_string()]),
        };
        let tables = vec![
            Table::new("users", vec![Column::new("id", "bigint").primary_key()], vec![]),
            Table::new("audit_log", vec![Column::new("id", "bigint").primary_key()], vec![]),
        ];
        let mut kept = function(&[], ReturnShape::Void);
        kept.table = Some("Users".to_string());
        let mut dropped = function(&[], ReturnShape::Void);
        dropped.table = Some("audit_log".to_string());
        let free = function(&[], ReturnShape::Void);

        let (tables, functions) = filter.apply(tables, vec![kept, dropped, free]);

        assert_eq!(tables.len(), 1);
        assert_eq!(functions.len(), 2);
        assert!(functions.iter().all(|f| f.table.as_deref() != Some("audit_log")));
    }

    #[test]
    fn test_infer_owner() {
        let tables = ["orders", "categories"];

        let by_param = function(&["order_id", "limit"], ReturnShape::Scalar(ScalarKind::Decimal));
        assert_eq!(infer_owner(&by_param, tables), Some("orders".to_string()));

        let by_category = function(&["category_id"], ReturnShape::Void);
        assert_eq!(infer_owner(&by_category, tables), Some("categories".to_string()));

        let by_rows = function(&[], ReturnShape::SetOf("ORDERS".to_string()));
        assert_eq!(infer_owner(&by_rows, tables), Some("orders".to_string()));

        let orphan = function(&["threshold"], ReturnShape::Void);
        assert_eq!(infer_owner(&orphan, tables), None);
    }
}
