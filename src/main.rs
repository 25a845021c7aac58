use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use schemagen::backend::Backend;
use schemagen::codegen::{Generator, TemplateEmitter};
use schemagen::config::GenConfig;
use schemagen::introspect::{Introspector, JsonIntrospector, TableFilter};
use schemagen::schema::Schema;
use schemagen::store::FsStore;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Language {
    Java,
    Kotlin,
    Csharp,
    Typescript,
}

impl From<Language> for Backend {
    fn from(language: Language) -> Self {
        match language {
            Language::Java => Backend::Java,
            Language::Kotlin => Backend::Kotlin,
            Language::Csharp => Backend::CSharp,
            Language::Typescript => Backend::TypeScript,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "schemagen")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Schema description (JSON); omit with --postgres
    schema: Option<PathBuf>,

    /// Target backend [default: from SCHEMAGEN_BACKEND, else java]
    #[arg(short, long, value_enum)]
    backend: Option<Language>,

    /// Output root directory [default: from SCHEMAGEN_OUTPUT, else ./generated]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Module for tables without a declared grouping
    #[arg(long)]
    module: Option<String>,

    /// Migration directory, relative to the output root
    #[arg(long)]
    migrations_dir: Option<PathBuf>,

    /// Introspect a live PostgreSQL database (DATABASE_URL) instead of a file
    #[arg(long)]
    postgres: bool,

    /// Database schema to introspect with --postgres
    #[arg(long, default_value = "public")]
    db_schema: String,

    /// Path to .env file
    #[arg(long, default_value = "./.env")]
    env_file: PathBuf,

    /// Comma-separated list of tables to include (default: all)
    #[arg(long, value_delimiter = ',')]
    tables: Option<Vec<String>>,

    /// Comma-separated list of tables to exclude
    #[arg(long, value_delimiter = ',')]
    exclude: Option<Vec<String>>,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            error!(error = ?e, "Fatal error");
            std::process::exit(1);
        }
    }
}

/// Returns whether the run finished without accumulated errors
fn run() -> Result<bool> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    info!("schemagen v{}", env!("CARGO_PKG_VERSION"));

    let mut config = GenConfig::load(&cli.env_file).context("Failed to load configuration")?;
    if let Some(backend) = cli.backend {
        config.backend = backend.into();
    }
    if let Some(output) = cli.output {
        config.output_root = output;
    }
    if let Some(module) = cli.module {
        config.default_module = module;
    }
    if let Some(dir) = cli.migrations_dir {
        config.migrations_dir = dir;
    }
    debug!(config = ?config.codegen_config(), "Code generation config");

    let filter = TableFilter {
        include: cli.tables,
        exclude: cli.exclude,
    };
    if filter.is_active() {
        debug!(filter = ?filter, "Table filter configured");
    }

    let schema = if cli.postgres {
        introspect_postgres(&config, &cli.db_schema, &filter)?
    } else {
        let Some(path) = cli.schema else {
            bail!("A schema description file is required unless --postgres is given");
        };
        JsonIntrospector::new(&path)
            .introspect(&filter)
            .with_context(|| format!("Failed to load schema from {}", path.display()))?
    };

    if schema.entity_tables().is_empty() {
        warn!("No entity tables found after filtering");
        return Ok(true);
    }

    for table in schema.tables() {
        debug!(
            table = ?table.name,
            kind = ?table.kind(),
            columns = ?table.columns().len(),
            foreign_keys = ?table.foreign_keys().len(),
            "Table"
        );
    }

    let emitter = TemplateEmitter::new().context("Failed to load templates")?;
    let mut generator = Generator::new(emitter, FsStore, config.codegen_config());
    let result = generator.generate(&schema);

    for note in &result.notes {
        info!(note = %note, "Function");
    }
    for e in &result.errors {
        warn!(error = %e, "Generation error");
    }
    info!(
        written = result.written.len(),
        errors = result.errors.len(),
        output = ?config.output_root,
        "Done"
    );

    Ok(result.is_clean())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[cfg(feature = "postgres")]
fn introspect_postgres(config: &GenConfig, schema_name: &str, filter: &TableFilter) -> Result<Schema> {
    use postgres::NoTls;
    use schemagen::PostgresIntrospector;

    let Some(url) = config.database_url.as_deref() else {
        bail!("DATABASE_URL must be set to use --postgres");
    };
    let redacted = config.redacted_database_url().unwrap_or_default();
    info!(connection = ?redacted, "Connecting to PostgreSQL");

    let mut client = postgres::Client::connect(url, NoTls)
        .with_context(|| format!("Failed to connect to PostgreSQL at {}", redacted))?;

    info!("Connected to database");

    let mut introspector = PostgresIntrospector::new(&mut client, schema_name);
    let schema = introspector
        .introspect(filter)
        .context("Failed to introspect schema")?;

    Ok(schema)
}

#[cfg(not(feature = "postgres"))]
fn introspect_postgres(_config: &GenConfig, _schema_name: &str, _filter: &TableFilter) -> Result<Schema> {
    bail!("PostgreSQL support not enabled. Rebuild with --features postgres")
}
