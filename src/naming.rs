//! Naming and placement
//!
//! Pure functions mapping table names to the identifiers every artifact of a
//! table shares, plus the path resolver that places artifacts on disk. No
//! text generation happens here.

use std::path::{Path, PathBuf};

use heck::{ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};

use crate::backend::Backend;
use crate::codegen::ArtifactKind;
use crate::schema::Table;

/// Convert any casing to PascalCase. Idempotent.
pub fn to_pascal_case(s: &str) -> String {
    s.to_upper_camel_case()
}

/// Convert any casing to camelCase. Idempotent.
pub fn to_camel_case(s: &str) -> String {
    s.to_lower_camel_case()
}

/// Convert any casing to snake_case. Idempotent.
pub fn to_snake_case(s: &str) -> String {
    s.to_snake_case()
}

/// Best-effort English singular (basic heuristic)
///
/// `ies` becomes `y`, `xes`/`ches`/`shes`/`sses` drop `es`, a trailing `s`
/// is dropped unless the word ends in `ss`, `us` or `is`.
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{}y", stem);
        }
    }
    for suffix in ["sses", "shes", "ches", "xes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    match word.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}

/// Best-effort English plural
///
/// | ending | rule |
/// |---|---|
/// | `y` | `y` -> `ies` |
/// | `s`, `x`, `ch`, `sh` | append `es` |
/// | anything else | append `s` |
///
/// Words already ending in `es` (which covers `ies`) are returned unchanged.
/// Irregular plurals are not recognised: `people` becomes `peoples`.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }

    let lower = word.to_lowercase();
    if lower.ends_with("es") {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix(['y', 'Y']) {
        return format!("{}ies", stem);
    }
    if lower.ends_with('s') || lower.ends_with('x') || lower.ends_with("ch") || lower.ends_with("sh") {
        return format!("{}es", word);
    }
    format!("{}s", word)
}

/// Canonical singular type name for a table, e.g. `order_items` -> `OrderItem`
pub fn entity_name(table_name: &str) -> String {
    to_pascal_case(&singularize(&to_snake_case(table_name)))
}

/// Identifiers shared by every artifact generated for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityNames {
    pub table: String,
    /// Singular PascalCase type name
    pub entity: String,
    /// Plural PascalCase form, for collection wrappers and list endpoints
    pub plural: String,
    /// Singular member/variable name in the backend's member casing
    pub variable: String,
    /// Plural member/variable name in the backend's member casing
    pub collection: String,
    /// Module segment in the backend's casing
    pub module: String,
}

impl EntityNames {
    pub fn resolve(table: &Table, backend: Backend, default_module: &str) -> Self {
        let entity = entity_name(&table.name);
        let plural = pluralize(&entity);
        let module = table.module.as_deref().unwrap_or(default_module);

        Self {
            table: table.name.clone(),
            variable: backend.member_name(&entity),
            collection: backend.member_name(&plural),
            module: backend.module_segment(module),
            entity,
            plural,
        }
    }
}

/// Places artifacts under `<root>/<module>/<subpackage>/<Entity><suffix>.<ext>`
/// and migrations under `<root>/<migrations_dir>/`
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    backend: Backend,
    migrations_dir: PathBuf,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>, backend: Backend, migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            backend,
            migrations_dir: migrations_dir.into(),
        }
    }

    pub fn artifact_path(&self, kind: ArtifactKind, names: &EntityNames) -> PathBuf {
        let file_name = format!(
            "{}{}.{}",
            names.entity,
            kind.suffix(),
            self.backend.extension()
        );
        self.root
            .join(&names.module)
            .join(self.backend.subpackage(kind))
            .join(file_name)
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.root.join(&self.migrations_dir)
    }

    /// `V<version>__create_<table_name>_table.sql`
    pub fn migration_path(&self, version: u64, table_name: &str) -> PathBuf {
        self.migrations_dir().join(migration_file_name(version, table_name))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

pub fn migration_file_name(version: u64, table_name: &str) -> String {
    format!("V{}__create_{}_table.sql", version, to_snake_case(table_name))
}
