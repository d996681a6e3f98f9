//! CLI command implementations
//!
//! Commands are thin: they load files, build a `Database` and run a single
//! session. No state is kept between invocations.

use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{DatabaseOptions, StoreConfig};
use crate::database::Database;
use crate::schema::{FieldRole, SchemaLoader};
use crate::session::Session;
use crate::state::DatabaseState;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{read_operations, write_error, write_response};

/// Kind of one operation line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Insert,
    Update,
    Upsert,
    Delete,
    DeleteAll,
}

/// One operation line of `apply`
#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    pub op: OpKind,
    pub table: String,
    #[serde(default)]
    pub data: Value,
}

impl Operation {
    /// Apply to `session`. Returns the affected ids or the delete count.
    pub fn apply(self, session: &mut Session) -> crate::errors::StoreResult<Value> {
        match self.op {
            OpKind::Insert => session.insert(&self.table, self.data).map(|ids| json!(ids)),
            OpKind::Update => session.update(&self.table, self.data).map(|ids| json!(ids)),
            OpKind::Upsert => session.upsert(&self.table, self.data).map(|ids| json!(ids)),
            OpKind::Delete => session.delete(&self.table, self.data).map(|n| json!(n)),
            OpKind::DeleteAll => session.delete_all(&self.table).map(|n| json!(n)),
        }
    }
}

/// Parse arguments, install logging and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.log_level.as_deref());

    match run_command(cli.command) {
        Ok(()) => Ok(()),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Run a parsed command
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Check { schema, config } => check(&schema, config.as_deref()),
        Command::Apply {
            schema,
            state,
            config,
        } => apply(&schema, state.as_deref(), config.as_deref()),
    }
}

/// Install the stderr subscriber. An explicit level wins over RUST_LOG.
fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new("warn"));

    // a subscriber may already be installed (tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .compact()
        .try_init();
}

/// Build the database for `schema_path`
pub fn open_database(schema_path: &Path, config_path: Option<&Path>) -> CliResult<Database> {
    let definition = SchemaLoader::load(schema_path)?;
    let config = match config_path {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    Ok(Database::new(&definition, DatabaseOptions::new(config))?)
}

/// `check`: print a summary of the connected schema
pub fn check(schema_path: &Path, config_path: Option<&Path>) -> CliResult<()> {
    let db = open_database(schema_path, config_path)?;
    write_response(describe(&db))
}

/// Tables with their keys, foreign keys and relations
pub fn describe(db: &Database) -> Value {
    let tables: Vec<Value> = db
        .schema()
        .tables()
        .map(|table| {
            let keys: Vec<&str> = table.key_fields().into_iter().map(|f| f.name()).collect();
            let foreign_keys: Vec<Value> = table
                .foreign_key_fields()
                .map(|f| {
                    json!({
                        "field": f.name(),
                        "references": f.references(),
                        "unique": f.is_unique(),
                    })
                })
                .collect();
            let stamps: Vec<&str> = table
                .fields()
                .iter()
                .filter(|f| f.role() == FieldRole::Modified)
                .map(|f| f.name())
                .collect();
            let relations: Vec<Value> = table
                .relations()
                .iter()
                .map(|r| {
                    json!({
                        "name": r.name,
                        "table": r.table,
                        "field": r.field,
                        "cascade": r.cascade,
                        "unique": r.unique,
                    })
                })
                .collect();

            json!({
                "name": table.name(),
                "key": keys,
                "foreignKeys": foreign_keys,
                "modified": stamps,
                "relations": relations,
            })
        })
        .collect();

    json!({ "tables": tables })
}

/// `apply`: run stdin operations in one session and print the new state
pub fn apply(
    schema_path: &Path,
    state_path: Option<&Path>,
    config_path: Option<&Path>,
) -> CliResult<()> {
    let db = open_database(schema_path, config_path)?;
    let state = match state_path {
        Some(path) => load_state(path)?,
        None => db.initial_state(),
    };

    let stdin = io::stdin();
    let (next, applied) = apply_lines(&db, &state, read_operations(stdin.lock()))?;

    info!(applied, "operations applied");
    write_response(json!({
        "applied": applied,
        "state": serde_json::to_value(&next)?,
    }))
}

/// Apply numbered operation lines in one session and commit.
/// Stops at the first failing line; nothing is committed then.
pub fn apply_lines(
    db: &Database,
    state: &DatabaseState,
    lines: impl Iterator<Item = (usize, CliResult<Value>)>,
) -> CliResult<(DatabaseState, usize)> {
    let mut session = db.session(state);
    let mut applied = 0;

    for (line_no, line) in lines {
        let operation: Operation = serde_json::from_value(line?)
            .map_err(|e| CliError::invalid_operation(line_no, e))?;
        operation
            .apply(&mut session)
            .map_err(|e| CliError::store_error(line_no, &e))?;
        applied += 1;
    }

    Ok((session.commit()?, applied))
}

/// Read a persisted `DatabaseState`
pub fn load_state(path: &Path) -> CliResult<DatabaseState> {
    let content = fs::read_to_string(path).map_err(|e| {
        CliError::config_error(format!("failed to read state '{}': {}", path.display(), e))
    })?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::config_error(format!("invalid state JSON: {}", e)))
}
