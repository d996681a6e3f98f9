//! Declarative schema definitions
//!
//! A schema maps table names to ordered field declarations:
//!
//! ```json
//! {
//!   "User": { "id": { "pk": true } },
//!   "Post": {
//!     "id": { "pk": true },
//!     "author": { "references": "User", "relationName": "posts", "cascade": true }
//!   }
//! }
//! ```
//!
//! Field order is significant: multi-part primary keys are joined in
//! declaration order.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{StoreError, StoreResult};
use crate::value::Row;

/// Explicit field role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Plain attribute
    Attr,
    /// Primary key part
    Pk,
    /// Foreign key (requires `references`)
    Fk,
    /// Modified stamp used for change detection
    Modified,
}

/// A value derived from the row during normalization
#[derive(Clone)]
pub struct ComputedValue(Arc<dyn Fn(&Row) -> Value + Send + Sync>);

impl ComputedValue {
    pub fn new(f: impl Fn(&Row) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn compute(&self, row: &Row) -> Value {
        (self.0)(row)
    }
}

impl fmt::Debug for ComputedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComputedValue(..)")
    }
}

/// Field declaration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldDef {
    /// Part of the primary key
    pub pk: bool,
    /// Explicit role
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    /// Key under which the value is stored in the row
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    /// Name of the record accessor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prop_name: Option<String>,
    /// Referenced table (makes this a foreign key)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
    /// Name of the reverse relation exposed on the referenced table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_name: Option<String>,
    /// Delete dependent rows when the referenced row is deleted
    pub cascade: bool,
    /// At most one row per referenced id
    pub unique: bool,
    /// Foreign key must hold a valid id on every written row
    pub not_null: bool,
    /// Computed value, registered in code only
    #[serde(skip)]
    pub value: Option<ComputedValue>,
}

impl FieldDef {
    /// Plain attribute
    pub fn attribute() -> Self {
        Self::default()
    }

    /// Primary key field
    pub fn primary_key() -> Self {
        Self {
            pk: true,
            ..Self::default()
        }
    }

    /// Foreign key referencing `table`
    pub fn references(table: impl Into<String>) -> Self {
        Self {
            references: Some(table.into()),
            ..Self::default()
        }
    }

    /// Modified stamp
    pub fn modified() -> Self {
        Self {
            field_type: Some(FieldType::Modified),
            ..Self::default()
        }
    }

    pub fn relation_name(mut self, name: impl Into<String>) -> Self {
        self.relation_name = Some(name.into());
        self
    }

    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }

    pub fn prop_name(mut self, name: impl Into<String>) -> Self {
        self.prop_name = Some(name.into());
        self
    }

    pub fn cascade(mut self) -> Self {
        self.cascade = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn computed(mut self, f: impl Fn(&Row) -> Value + Send + Sync + 'static) -> Self {
        self.value = Some(ComputedValue::new(f));
        self
    }
}

/// Ordered field declarations of one table
#[derive(Debug, Clone, Default)]
pub struct TableDef {
    pub fields: Vec<(String, FieldDef)>,
}

impl TableDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        self.fields.push((name.into(), def));
        self
    }
}

/// Ordered table declarations
#[derive(Debug, Clone, Default)]
pub struct SchemaDefinition {
    pub tables: Vec<(String, TableDef)>,
}

impl SchemaDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: impl Into<String>, def: TableDef) -> Self {
        self.tables.push((name.into(), def));
        self
    }

    /// Parse a schema from its JSON form, keeping declaration order
    pub fn from_json(value: &Value) -> StoreResult<Self> {
        let tables = value
            .as_object()
            .ok_or_else(|| StoreError::argument("schema must be a JSON object of tables"))?;

        let mut schema = SchemaDefinition::new();
        for (table_name, fields) in tables {
            let fields = fields.as_object().ok_or_else(|| {
                StoreError::argument(format!("table '{}' must be an object of fields", table_name))
            })?;

            let mut table = TableDef::new();
            for (field_name, decl) in fields {
                let def: FieldDef = serde_json::from_value(decl.clone()).map_err(|e| {
                    StoreError::argument(format!(
                        "invalid declaration for '{}.{}': {}",
                        table_name, field_name, e
                    ))
                })?;
                table = table.field(field_name.clone(), def);
            }
            schema = schema.table(table_name.clone(), table);
        }

        Ok(schema)
    }

    pub fn from_json_str(s: &str) -> StoreResult<Self> {
        let value: Value = serde_json::from_str(s)
            .map_err(|e| StoreError::argument(format!("invalid schema JSON: {}", e)))?;
        Self::from_json(&value)
    }
}
