//! Schema data structures
//!
//! These types represent the relational schema and form the contract between
//! introspection (produces) and code generation (consumes). A [`Schema`] is
//! built once and never mutated afterwards; the derived lookups it carries
//! (table by name, functions by owning table) and each table's
//! [`TableKind`] are computed at construction.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

/// Scalar kind a column's SQL type maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarKind {
    SmallInt,
    Integer,
    BigInt,
    Boolean,
    Text,
    Varchar,
    Char,
    Real,
    Double,
    Decimal,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    Uuid,
    Json,
    Binary,
    Array(Box<ScalarKind>),
    /// Unrecognised type name, assumed to be a user-defined enum
    Enum(String),
}

impl ScalarKind {
    /// Map a SQL type string (e.g. `character varying(255)`) to a scalar kind
    pub fn from_sql(type_str: &str) -> Self {
        let lower = type_str.to_lowercase();
        let trimmed = lower.trim();

        if let Some(inner) = trimmed.strip_suffix("[]") {
            return ScalarKind::Array(Box::new(ScalarKind::from_sql(inner)));
        }

        if trimmed.starts_with("character varying") || trimmed.starts_with("varchar") {
            return ScalarKind::Varchar;
        }
        if trimmed.starts_with("character(") || trimmed.starts_with("char(") {
            return ScalarKind::Char;
        }
        if trimmed.starts_with("numeric") || trimmed.starts_with("decimal") {
            return ScalarKind::Decimal;
        }
        if trimmed.starts_with("timestamp") {
            if trimmed.contains("with time zone") || trimmed == "timestamptz" {
                return ScalarKind::TimestampTz;
            }
            return ScalarKind::Timestamp;
        }
        if trimmed.starts_with("time ") || trimmed == "time" || trimmed == "timetz" {
            return ScalarKind::Time;
        }

        match trimmed {
            "smallint" | "int2" | "smallserial" => ScalarKind::SmallInt,
            "integer" | "int" | "int4" | "serial" => ScalarKind::Integer,
            "bigint" | "int8" | "bigserial" => ScalarKind::BigInt,
            "boolean" | "bool" => ScalarKind::Boolean,
            "text" => ScalarKind::Text,
            "char" | "character" => ScalarKind::Char,
            "real" | "float4" => ScalarKind::Real,
            "double precision" | "float8" | "float" => ScalarKind::Double,
            "date" => ScalarKind::Date,
            "uuid" => ScalarKind::Uuid,
            "json" | "jsonb" => ScalarKind::Json,
            "bytea" | "blob" => ScalarKind::Binary,
            _ => ScalarKind::Enum(type_str.trim().to_string()),
        }
    }
}

/// Extract `(length_or_precision, scale)` from a type like `varchar(255)` or
/// `numeric(10,2)`
pub fn type_modifiers(type_str: &str) -> (Option<u32>, Option<u32>) {
    let Some(start) = type_str.find('(') else {
        return (None, None);
    };
    let Some(end) = type_str[start..].find(')') else {
        return (None, None);
    };
    let mut parts = type_str[start + 1..start + end].split(',');
    let first = parts.next().and_then(|p| p.trim().parse().ok());
    let second = parts.next().and_then(|p| p.trim().parse().ok());
    (first, second)
}

/// A table column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// SQL type as declared
    pub sql_type: String,
    pub kind: ScalarKind,
    pub nullable: bool,
    pub unique: bool,
    /// Character length for string types
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    /// Default literal as written in the DDL
    pub default: Option<String>,
    pub primary_key: bool,
    /// Column is auto-generated (SERIAL, BIGSERIAL, IDENTITY)
    pub auto_generated: bool,
}

impl Column {
    /// Create a nullable column, deriving the scalar kind and type modifiers
    /// from the SQL type string
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        let sql_type = sql_type.into();
        let kind = ScalarKind::from_sql(&sql_type);
        let (first, second) = type_modifiers(&sql_type);
        let (length, precision, scale) = match kind {
            ScalarKind::Decimal => (None, first, second),
            _ => (first, None, None),
        };
        let lower = sql_type.to_lowercase();

        Self {
            name: name.into(),
            auto_generated: lower.contains("serial"),
            sql_type,
            kind,
            nullable: true,
            unique: false,
            length,
            precision,
            scale,
            default: None,
            primary_key: false,
        }
    }

    /// Mark as primary key (implies NOT NULL)
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        let default = default.into();
        let lower = default.to_lowercase();
        if lower.contains("nextval(") || lower.contains("generated") {
            self.auto_generated = true;
        }
        self.default = Some(default);
        self
    }
}

/// A foreign key owned by exactly one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Owning column on the declaring table
    pub column: String,
    pub referenced_table: String,
    /// `None` means the referenced table's primary key
    pub referenced_column: Option<String>,
}

impl ForeignKey {
    pub fn new(column: impl Into<String>, referenced_table: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            referenced_table: referenced_table.into(),
            referenced_column: None,
        }
    }

    pub fn referencing(mut self, column: impl Into<String>) -> Self {
        self.referenced_column = Some(column.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Whether a table is a business entity or a pure many-to-many bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Entity,
    Junction,
}

/// Database table
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    /// Declared grouping used as the output module, if any
    pub module: Option<String>,
    pub indexes: Vec<Index>,
    columns: Vec<Column>,
    foreign_keys: Vec<ForeignKey>,
    kind: TableKind,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>, foreign_keys: Vec<ForeignKey>) -> Self {
        let kind = classify(&columns, &foreign_keys);
        Self {
            name: name.into(),
            module: None,
            columns,
            foreign_keys,
            indexes: Vec::new(),
            kind,
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_indexes(mut self, indexes: Vec<Index>) -> Self {
        self.indexes = indexes;
        self
    }

    /// Add a column; the table is reclassified
    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self.kind = classify(&self.columns, &self.foreign_keys);
        self
    }

    /// Add a foreign key; the table is reclassified
    pub fn with_foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self.kind = classify(&self.columns, &self.foreign_keys);
        self
    }

    /// Columns in declaration order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn is_junction(&self) -> bool {
        self.kind == TableKind::Junction
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|col| col.name == name)
    }

    /// Get primary key columns in declaration order
    pub fn primary_key_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|col| col.primary_key).collect()
    }

    /// Name of the column other tables reference by default: the first
    /// primary key column, or the first column by convention
    pub fn identity_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|col| col.primary_key)
            .or_else(|| self.columns.first())
            .map(|col| col.name.as_str())
    }

    pub fn foreign_key_for(&self, column: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.column == column)
    }

    /// Columns that are neither primary key nor foreign key columns
    pub fn business_columns(&self) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|col| !col.primary_key && self.foreign_key_for(&col.name).is_none())
            .collect()
    }
}

/// Junction iff exactly two foreign keys and every column is a key column
fn classify(columns: &[Column], foreign_keys: &[ForeignKey]) -> TableKind {
    if foreign_keys.len() != 2 {
        return TableKind::Entity;
    }
    let only_keys = columns
        .iter()
        .all(|col| col.primary_key || foreign_keys.iter().any(|fk| fk.column == col.name));
    if only_keys {
        TableKind::Junction
    } else {
        TableKind::Entity
    }
}

/// Stored function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionParam {
    pub name: String,
    pub sql_type: String,
    pub kind: ScalarKind,
}

impl FunctionParam {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        let sql_type = sql_type.into();
        Self {
            name: name.into(),
            kind: ScalarKind::from_sql(&sql_type),
            sql_type,
        }
    }
}

/// What a stored function returns
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnShape {
    Void,
    Scalar(ScalarKind),
    /// `SETOF <table>` / `TABLE(...)` of an entity table's rows
    SetOf(String),
}

impl ReturnShape {
    /// Parse a return type as the catalog reports it: `void`,
    /// `SETOF <table>`, `TABLE(...)` or a scalar type
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let lower = trimmed.to_lowercase();
        if lower.is_empty() || lower == "void" {
            return ReturnShape::Void;
        }
        if trimmed.get(..6).is_some_and(|p| p.eq_ignore_ascii_case("setof ")) {
            let table = trimmed[6..].trim();
            // Drop a schema qualifier
            let table = table.rsplit('.').next().unwrap_or(table);
            return ReturnShape::SetOf(table.to_string());
        }
        if lower.starts_with("table(") || lower.starts_with("table (") {
            // Anonymous row type with no entity behind it
            return ReturnShape::Scalar(ScalarKind::Json);
        }
        ReturnShape::Scalar(ScalarKind::from_sql(trimmed))
    }
}

/// A stored function, attached to its owning table's data-access artifact
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    /// Owning table as written in the source catalog
    pub table: Option<String>,
    pub parameters: Vec<FunctionParam>,
    pub returns: ReturnShape,
}

/// A complete database schema
#[derive(Debug, Clone)]
pub struct Schema {
    pub name: String,
    tables: Vec<Table>,
    functions: Vec<Function>,
    table_index: HashMap<String, usize>,
    /// Keyed by lower-cased owning table name
    functions_by_table: IndexMap<String, Vec<usize>>,
}

impl Schema {
    pub fn new(name: impl Into<String>, tables: Vec<Table>, functions: Vec<Function>) -> Self {
        let mut table_index = HashMap::with_capacity(tables.len());
        for (i, table) in tables.iter().enumerate() {
            // First declaration wins; duplicates are reported by validate()
            table_index.entry(table.name.clone()).or_insert(i);
        }

        let mut functions_by_table: IndexMap<String, Vec<usize>> = IndexMap::new();
        for (i, function) in functions.iter().enumerate() {
            if let Some(owner) = &function.table {
                functions_by_table
                    .entry(owner.to_lowercase())
                    .or_default()
                    .push(i);
            }
        }

        Self {
            name: name.into(),
            tables,
            functions,
            table_index,
            functions_by_table,
        }
    }

    /// All tables in declaration order
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Entity tables in declaration order
    pub fn entity_tables(&self) -> Vec<&Table> {
        self.tables.iter().filter(|t| !t.is_junction()).collect()
    }

    /// Junction tables in declaration order
    pub fn junction_tables(&self) -> Vec<&Table> {
        self.tables.iter().filter(|t| t.is_junction()).collect()
    }

    /// Exact, case-sensitive lookup
    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.table_index.get(name).map(|&i| &self.tables[i])
    }

    /// Functions grouped by lower-cased owning table name, in declaration
    /// order of first appearance
    pub fn functions_by_table(&self) -> IndexMap<&str, Vec<&Function>> {
        self.functions_by_table
            .iter()
            .map(|(owner, idxs)| {
                (
                    owner.as_str(),
                    idxs.iter().map(|&i| &self.functions[i]).collect(),
                )
            })
            .collect()
    }

    /// Functions owned by a table, matched case-insensitively
    pub fn functions_for_table(&self, table: &str) -> Vec<&Function> {
        self.functions_by_table
            .get(&table.to_lowercase())
            .map(|idxs| idxs.iter().map(|&i| &self.functions[i]).collect())
            .unwrap_or_default()
    }

    /// Column a foreign key points at, resolving the primary key default
    pub fn referenced_column(&self, fk: &ForeignKey) -> String {
        if let Some(column) = &fk.referenced_column {
            return column.clone();
        }
        self.table_by_name(&fk.referenced_table)
            .and_then(|t| t.identity_column())
            .unwrap_or("id")
            .to_string()
    }

    /// Report structural violations without failing
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for table in &self.tables {
            if !seen.insert(table.name.as_str()) {
                errors.push(format!("Duplicate table name '{}'", table.name));
            }

            let mut columns = HashSet::new();
            for col in table.columns() {
                if !columns.insert(col.name.as_str()) {
                    errors.push(format!(
                        "Table '{}' declares column '{}' more than once",
                        table.name, col.name
                    ));
                }
            }

            if !table.is_junction() && table.columns().iter().all(|col| !col.primary_key) {
                errors.push(format!("Table '{}' has no primary key column", table.name));
            }

            for fk in table.foreign_keys() {
                if table.column(&fk.column).is_none() {
                    errors.push(format!(
                        "Foreign key on '{}' uses unknown column '{}'",
                        table.name, fk.column
                    ));
                }
                match self.table_by_name(&fk.referenced_table) {
                    None => errors.push(format!(
                        "Foreign key {}.{} references unknown table '{}'",
                        table.name, fk.column, fk.referenced_table
                    )),
                    Some(target) => {
                        if let Some(ref_col) = &fk.referenced_column {
                            if target.column(ref_col).is_none() {
                                errors.push(format!(
                                    "Foreign key {}.{} references unknown column {}.{}",
                                    table.name, fk.column, target.name, ref_col
                                ));
                            }
                        }
                    }
                }
            }

            // Tables built only from FK columns look like junctions but only
            // bridge with exactly two FKs
            let bridge_shaped = table.business_columns().is_empty()
                && table
                    .primary_key_columns()
                    .iter()
                    .all(|col| table.foreign_key_for(&col.name).is_some());
            if bridge_shaped && !table.foreign_keys().is_empty() && table.foreign_keys().len() != 2 {
                errors.push(format!(
                    "Table '{}' has only key columns but {} foreign key(s); a junction table needs exactly 2",
                    table.name,
                    table.foreign_keys().len()
                ));
            }
        }

        for function in &self.functions {
            if let Some(owner) = &function.table {
                let known = self
                    .tables
                    .iter()
                    .any(|t| t.name.to_lowercase() == owner.to_lowercase());
                if !known {
                    errors.push(format!(
                        "Function '{}' is owned by unknown table '{}'",
                        function.name, owner
                    ));
                }
            }
        }

        errors
    }
}
