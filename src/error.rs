use thiserror::Error;

use crate::codegen::ArtifactKind;

/// schemagen errors
#[derive(Error, Debug)]
pub enum SchemagenError {
    #[error("Failed to introspect schema '{schema}': {message}")]
    Introspection { schema: String, message: String },

    #[error("Failed to load schema description: {0}")]
    SchemaLoad(String),

    #[error("Code generation failed for table '{table}': {message}")]
    CodeGen { table: String, message: String },

    #[error("Failed to emit {kind} for table '{table}': {message}")]
    Emit {
        table: String,
        kind: ArtifactKind,
        message: String,
    },

    #[error("Failed to allocate migration version in '{dir}': {message}")]
    Migration { dir: String, message: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Failed to process function '{function}': {message}")]
    Function { function: String, message: String },

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
