//! Table schema
//!
//! Field lists are built from declarations (pass 1); reverse relations are
//! attached by `SchemaGraph::connect` (pass 2). After that the schema is
//! shared behind an `Arc` and never mutated.

use serde_json::Value;

use crate::errors::{StoreError, StoreResult};
use crate::value::{row_key, Row};

use super::field::FieldSchema;
use super::types::TableDef;

/// A foreign key on another table (or this one) that points at this table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Accessor name on the referenced side, if declared
    pub name: Option<String>,
    /// Table owning the foreign key
    pub table: String,
    /// Foreign key field (schema name, also its index name)
    pub field: String,
    /// Row key the foreign key is stored under
    pub field_name: String,
    pub unique: bool,
    pub cascade: bool,
}

/// Current value of one foreign key on a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyValue<'a> {
    pub field: &'a str,
    pub value: Option<String>,
    pub references: &'a str,
    pub unique: bool,
    pub not_null: bool,
}

/// Schema of one table
#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    fields: Vec<FieldSchema>,
    relations: Vec<Relation>,
}

impl TableSchema {
    /// Pass 1: build the table's own fields
    pub fn from_def(name: &str, def: &TableDef) -> StoreResult<Self> {
        if name.is_empty() {
            return Err(StoreError::argument("table name must not be empty"));
        }

        let mut fields: Vec<FieldSchema> = Vec::with_capacity(def.fields.len());
        for (field_name, field_def) in &def.fields {
            let field = FieldSchema::from_def(name, field_name, field_def)?;

            if fields.iter().any(|f| f.name() == field.name()) {
                return Err(StoreError::argument(format!(
                    "table '{}' declares field '{}' twice",
                    name, field_name
                )));
            }
            if fields.iter().any(|f| f.field_name() == field.field_name()) {
                return Err(StoreError::argument(format!(
                    "table '{}' stores two fields under '{}'",
                    name,
                    field.field_name()
                )));
            }

            fields.push(field);
        }

        Ok(Self {
            name: name.to_string(),
            fields,
            relations: Vec::new(),
        })
    }

    /// Pass 2: attach the reverse relations pointing at this table
    pub(crate) fn connect(&mut self, relations: Vec<Relation>) {
        self.relations = relations;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn primary_key_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.is_pk())
    }

    pub fn foreign_key_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.is_fk())
    }

    /// Fields the primary key is composed from: declared PK fields, or
    /// every foreign key when none is declared.
    pub fn key_fields(&self) -> Vec<&FieldSchema> {
        let pks: Vec<_> = self.primary_key_fields().collect();
        if pks.is_empty() {
            self.foreign_key_fields().collect()
        } else {
            pks
        }
    }

    pub fn has_declared_primary_key(&self) -> bool {
        self.fields.iter().any(|f| f.is_pk())
    }

    /// Row key of the single PK field, if exactly one is declared
    pub fn single_key_field(&self) -> Option<&str> {
        let mut pks = self.primary_key_fields();
        match (pks.next(), pks.next()) {
            (Some(field), None) => Some(field.field_name()),
            _ => None,
        }
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Named reverse relation
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations
            .iter()
            .find(|r| r.name.as_deref() == Some(name))
    }

    /// Composes the primary key of `row`.
    ///
    /// Parts are joined with `separator` in field order. Returns `None` if
    /// the table has no key fields or any part is missing.
    pub fn get_primary_key(&self, row: &Row, separator: &str) -> Option<String> {
        let fields = self.key_fields();
        if fields.is_empty() {
            return None;
        }

        let mut parts = Vec::with_capacity(fields.len());
        for field in fields {
            parts.push(row_key(row, field.field_name())?);
        }
        Some(parts.join(separator))
    }

    /// Like `get_primary_key`, failing with a normalization error
    pub fn require_primary_key(&self, row: &Row, separator: &str) -> StoreResult<String> {
        self.get_primary_key(row, separator)
            .ok_or_else(|| StoreError::missing_primary_key(&self.name))
    }

    /// Current value of every foreign key on `row`
    pub fn get_foreign_keys(&self, row: &Row) -> Vec<ForeignKeyValue<'_>> {
        self.foreign_key_fields()
            .filter_map(|field| {
                let fk = field.foreign()?;
                Some(ForeignKeyValue {
                    field: field.name(),
                    value: row_key(row, field.field_name()),
                    references: &fk.references,
                    unique: fk.unique,
                    not_null: fk.not_null,
                })
            })
            .collect()
    }

    /// Whether `next` differs from `prev`.
    ///
    /// Tables with modified stamps compare only the stamps; others defer
    /// to `rows_equal`.
    pub fn is_modified(
        &self,
        prev: &Row,
        next: &Row,
        rows_equal: impl Fn(&Row, &Row) -> bool,
    ) -> bool {
        let mut stamps = self.fields.iter().filter(|f| f.is_modified_stamp()).peekable();
        if stamps.peek().is_none() {
            return !rows_equal(prev, next);
        }

        stamps.any(|f| prev.get(f.field_name()) != next.get(f.field_name()))
    }

    /// Primary key fields of an existing row, used to address it in an update
    pub fn key_patch(&self, row: &Row) -> Row {
        let mut patch = Row::new();
        for field in self.key_fields() {
            let value = row.get(field.field_name()).cloned().unwrap_or(Value::Null);
            patch.insert(field.field_name().to_string(), value);
        }
        patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::FieldDef;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn post_schema() -> TableSchema {
        let def = TableDef::new()
            .field("id", FieldDef::primary_key())
            .field("title", FieldDef::attribute())
            .field("author", FieldDef::references("User").relation_name("posts"));
        TableSchema::from_def("Post", &def).unwrap()
    }

    #[test]
    fn test_primary_key_single() {
        let schema = post_schema();
        assert_eq!(
            schema.get_primary_key(&row(json!({"id": "p1"})), ":"),
            Some("p1".to_string())
        );
        assert_eq!(
            schema.get_primary_key(&row(json!({"id": 7})), ":"),
            Some("7".to_string())
        );
        assert_eq!(schema.get_primary_key(&row(json!({"title": "x"})), ":"), None);
    }

    #[test]
    fn test_primary_key_composite() {
        let def = TableDef::new()
            .field("org", FieldDef::primary_key())
            .field("slug", FieldDef::primary_key());
        let schema = TableSchema::from_def("Page", &def).unwrap();

        let key = schema.get_primary_key(&row(json!({"slug": "home", "org": "acme"})), ":");
        assert_eq!(key, Some("acme:home".to_string()));
        assert_eq!(schema.get_primary_key(&row(json!({"org": "acme"})), ":"), None);
    }

    #[test]
    fn test_primary_key_falls_back_to_foreign_keys() {
        let def = TableDef::new()
            .field("user", FieldDef::references("User"))
            .field("tag", FieldDef::references("Tag"));
        let schema = TableSchema::from_def("UserTag", &def).unwrap();

        let key = schema.get_primary_key(&row(json!({"user": "u1", "tag": "t1"})), "/");
        assert_eq!(key, Some("u1/t1".to_string()));
        assert!(!schema.has_declared_primary_key());
    }

    #[test]
    fn test_require_primary_key_error() {
        let err = post_schema()
            .require_primary_key(&row(json!({})), ":")
            .unwrap_err();
        assert_eq!(err.code(), "NORMDB_NORMALIZATION_FAILED");
        assert!(err.to_string().contains("Post"));
    }

    #[test]
    fn test_get_foreign_keys() {
        let schema = post_schema();
        let fks = schema.get_foreign_keys(&row(json!({"id": "p1", "author": "u1"})));
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].field, "author");
        assert_eq!(fks[0].value.as_deref(), Some("u1"));
        assert_eq!(fks[0].references, "User");
        assert!(!fks[0].unique);
    }

    #[test]
    fn test_is_modified_with_stamps() {
        let def = TableDef::new()
            .field("id", FieldDef::primary_key())
            .field("rev", FieldDef::modified());
        let schema = TableSchema::from_def("Doc", &def).unwrap();

        let a = row(json!({"id": "d", "rev": 1, "body": "a"}));
        let b = row(json!({"id": "d", "rev": 1, "body": "b"}));
        let c = row(json!({"id": "d", "rev": 2, "body": "a"}));

        assert!(!schema.is_modified(&a, &b, crate::value::rows_equal));
        assert!(schema.is_modified(&a, &c, crate::value::rows_equal));
    }

    #[test]
    fn test_is_modified_without_stamps() {
        let schema = post_schema();
        let a = row(json!({"id": "p", "title": "a"}));
        let b = row(json!({"id": "p", "title": "b"}));

        assert!(!schema.is_modified(&a, &a.clone(), crate::value::rows_equal));
        assert!(schema.is_modified(&a, &b, crate::value::rows_equal));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let def = TableDef::new()
            .field("id", FieldDef::primary_key())
            .field("id", FieldDef::attribute());
        assert!(TableSchema::from_def("T", &def).is_err());
    }

    #[test]
    fn test_key_patch() {
        let schema = post_schema();
        let patch = schema.key_patch(&row(json!({"id": "p1", "title": "x"})));
        assert_eq!(Value::Object(patch), json!({"id": "p1"}));
    }
}
