//! Database configuration
//!
//! `StoreConfig` holds the serializable settings and can be loaded from a
//! JSON file. `DatabaseOptions` wraps it together with the hooks a host
//! registers in code (record comparer, key generator, normalize hooks).

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};
use crate::normalize::NormalizeContext;
use crate::value::Row;

/// Compares a stored row with its candidate replacement. Returns true if
/// they are equal, in which case the write is skipped.
pub type RecordComparer = Arc<dyn Fn(&Row, &Row) -> bool + Send + Sync>;

/// Produces a primary key for a row of the named table that has none.
pub type KeyGenerator = Arc<dyn Fn(&str, &Row) -> Option<String> + Send + Sync>;

/// Reshapes a row before it is normalized. May route extra records to
/// other tables through `NormalizeContext::emit`.
pub type NormalizeHook =
    Arc<dyn Fn(Row, &mut NormalizeContext) -> StoreResult<Row> + Send + Sync>;

/// How a scalar nested relation value is turned into a row when the
/// related table does not have exactly one other foreign key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarRelation {
    /// Promote to `{<primary key field>: value}`
    #[default]
    PrimaryKey,
    /// Fail with a normalization error
    Reject,
}

/// Serializable store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Joins the parts of a multi-field primary key
    #[serde(default = "default_key_separator")]
    pub key_separator: String,

    /// Maximum nesting depth of a single normalization call
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Resolution of ambiguous scalar nested relation values
    #[serde(default)]
    pub scalar_relation: ScalarRelation,
}

fn default_key_separator() -> String {
    ":".to_string()
}
fn default_max_depth() -> usize {
    64
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_separator: default_key_separator(),
            max_depth: default_max_depth(),
            scalar_relation: ScalarRelation::default(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> StoreResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            StoreError::argument(format!("failed to read config '{}': {}", path.display(), e))
        })?;

        let config: StoreConfig = serde_json::from_str(&content)
            .map_err(|e| StoreError::argument(format!("invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate settings
    pub fn validate(&self) -> StoreResult<()> {
        if self.key_separator.is_empty() {
            return Err(StoreError::argument("key_separator must not be empty"));
        }

        if self.max_depth == 0 {
            return Err(StoreError::argument("max_depth must be > 0"));
        }

        Ok(())
    }
}

/// Settings plus host hooks, fixed at database construction
#[derive(Clone, Default)]
pub struct DatabaseOptions {
    pub config: StoreConfig,
    comparer: Option<RecordComparer>,
    key_generator: Option<KeyGenerator>,
    normalize_hooks: BTreeMap<String, NormalizeHook>,
}

impl DatabaseOptions {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Replace the record comparer used when a table has no modified stamps
    pub fn with_comparer(
        mut self,
        comparer: impl Fn(&Row, &Row) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.comparer = Some(Arc::new(comparer));
        self
    }

    /// Generate primary keys for inserted rows that carry none
    pub fn with_key_generator(
        mut self,
        generator: impl Fn(&str, &Row) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.key_generator = Some(Arc::new(generator));
        self
    }

    /// Register a normalize hook for one table
    pub fn with_normalize_hook(
        mut self,
        table: impl Into<String>,
        hook: impl Fn(Row, &mut NormalizeContext) -> StoreResult<Row> + Send + Sync + 'static,
    ) -> Self {
        self.normalize_hooks.insert(table.into(), Arc::new(hook));
        self
    }

    pub fn comparer(&self) -> Option<&RecordComparer> {
        self.comparer.as_ref()
    }

    pub fn key_generator(&self) -> Option<&KeyGenerator> {
        self.key_generator.as_ref()
    }

    pub fn normalize_hook(&self, table: &str) -> Option<&NormalizeHook> {
        self.normalize_hooks.get(table)
    }

    /// Tables that have a normalize hook registered
    pub fn hooked_tables(&self) -> impl Iterator<Item = &str> {
        self.normalize_hooks.keys().map(String::as_str)
    }

    /// Compare two rows with the configured comparer or the default one
    pub fn rows_equal(&self, prev: &Row, next: &Row) -> bool {
        match &self.comparer {
            Some(cmp) => cmp(prev, next),
            None => crate::value::rows_equal(prev, next),
        }
    }
}

impl fmt::Debug for DatabaseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseOptions")
            .field("config", &self.config)
            .field("comparer", &self.comparer.is_some())
            .field("key_generator", &self.key_generator.is_some())
            .field("normalize_hooks", &self.normalize_hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Key generator producing random UUIDv4 strings
pub fn uuid_key_generator() -> impl Fn(&str, &Row) -> Option<String> + Send + Sync + 'static {
    |_table, _row| Some(uuid::Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.key_separator, ":");
        assert_eq!(config.max_depth, 64);
        assert_eq!(config.scalar_relation, ScalarRelation::PrimaryKey);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_partial_json() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"scalar_relation": "reject"}"#).unwrap();
        assert_eq!(config.scalar_relation, ScalarRelation::Reject);
        assert_eq!(config.max_depth, 64);
    }

    #[test]
    fn test_config_load_rejects_zero_depth() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_depth": 0}}"#).unwrap();

        let err = StoreConfig::load(file.path()).unwrap_err();
        assert_eq!(err.code(), "NORMDB_ARGUMENT_INVALID");
    }

    #[test]
    fn test_config_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"key_separator": "/"}}"#).unwrap();

        let config = StoreConfig::load(file.path()).unwrap();
        assert_eq!(config.key_separator, "/");
    }

    #[test]
    fn test_uuid_generator_produces_distinct_keys() {
        let generate = uuid_key_generator();
        let row = Row::new();
        let a = generate("T", &row).unwrap();
        let b = generate("T", &row).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_custom_comparer() {
        let options = DatabaseOptions::default().with_comparer(|_, _| true);
        let mut a = Row::new();
        a.insert("x".into(), serde_json::json!(1));
        assert!(options.rows_equal(&a, &Row::new()));
    }
}
