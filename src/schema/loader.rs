//! Schema loader for reading declarative schemas from disk

use std::fs;
use std::path::Path;

use crate::errors::{StoreError, StoreResult};

use super::types::SchemaDefinition;

/// Reads a schema definition from a JSON file.
pub struct SchemaLoader;

impl SchemaLoader {
    /// Loads and parses the schema at `path`.
    ///
    /// Missing or malformed files fail with an argument error naming the
    /// path.
    pub fn load(path: &Path) -> StoreResult<SchemaDefinition> {
        let content = fs::read_to_string(path).map_err(|e| {
            StoreError::argument(format!("failed to read schema '{}': {}", path.display(), e))
        })?;

        SchemaDefinition::from_json_str(&content).map_err(|e| {
            StoreError::argument(format!("malformed schema file '{}': {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_schema_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"User": {{"id": {{"pk": true}}}}, "Post": {{"id": {{"pk": true}}, "author": {{"references": "User"}}}}}}"#
        )
        .unwrap();

        let schema = SchemaLoader::load(file.path()).unwrap();
        assert_eq!(schema.tables.len(), 2);
        assert_eq!(schema.tables[0].0, "User");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SchemaLoader::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("nope.json"));
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let err = SchemaLoader::load(file.path()).unwrap_err();
        assert_eq!(err.code(), "NORMDB_ARGUMENT_INVALID");
    }
}
